//! Registration of vertex-uses on the working line, each paired with a dual
//! use of the same vertex in the other shell.

use tracing::{debug, instrument, trace};

use super::context::{IntersectContext, Side};
use super::error::{IntersectError, Invariant};
use crate::geometry::predicates::{point_segment_3d, SegmentProximity};
use crate::topology::brep::{FaceUseId, Model, ShellId, VertexId, VertexUseId};
use crate::topology::mutators::{make_point_loop, split_edge};
use crate::topology::primitives::make_lone_vertex_use;
use crate::Tol;

impl IntersectContext {
    /// Put `vu` on its shell's list at `dist`, then find or make its dual in
    /// the other shell and put that on the other list at the same distance.
    /// A supplied `dual_hint` is checked and used as is. Returns the dual.
    #[instrument(skip(self, model))]
    pub fn enlist(
        &mut self,
        model: &mut Model,
        vu: VertexUseId,
        dual_hint: Option<VertexUseId>,
        dist: f64,
    ) -> Result<VertexUseId, IntersectError> {
        let side = self.side_of(model, vu)?;
        let own_face = self.face(side);
        let vu_face = model.vu_face_use(vu)?;
        if vu_face != own_face {
            return Err(match (own_face, vu_face) {
                (Some(expected), _) => Invariant::VertexUseOffFace { vu, expected },
                (None, face) => Invariant::WireVertexUseInFace { vu, fu: face },
            }
            .into());
        }
        self.list_mut(side).insert_unique(vu, dist);

        let v = model.vu_vertex(vu)?;
        let dual_side = side.other();
        let dual_shell = self.shell(dual_side);
        let dual_face = self.face(dual_side);

        let dual = match dual_hint {
            Some(hint) => {
                check_dual(model, vu, hint, dual_shell, dual_face)?;
                hint
            }
            None => match dual_face {
                Some(fu) => make_dualvu(model, v, fu, self.tol())?,
                None => match model.find_v_in_shell(v, dual_shell)? {
                    Some(found) => found,
                    None => make_lone_vertex_use(model, dual_shell, v)?,
                },
            },
        };
        self.list_mut(dual_side).insert_unique(dual, dist);

        trace!(?vu, ?dual, ?v, dist, "enlisted vertex-use");
        Ok(dual)
    }
}

fn check_dual(
    model: &Model,
    vu: VertexUseId,
    dual: VertexUseId,
    dual_shell: ShellId,
    dual_face: Option<FaceUseId>,
) -> Result<(), IntersectError> {
    if model.vu_vertex(dual)? != model.vu_vertex(vu)? {
        return Err(Invariant::DualMismatch {
            vu,
            dual,
            reason: "different vertex",
        }
        .into());
    }
    if model.vu_shell(dual)? != dual_shell {
        return Err(Invariant::DualMismatch {
            vu,
            dual,
            reason: "wrong shell",
        }
        .into());
    }
    if let Some(fu) = dual_face {
        if model.vu_face_use(dual)? != Some(fu) {
            return Err(Invariant::DualMismatch {
                vu,
                dual,
                reason: "wrong face",
            }
            .into());
        }
    }
    Ok(())
}

/// A use of `v` in `fu`: an existing one, else the start of a new piece of an
/// edge whose interior passes within tolerance of `v`, else a new point loop.
#[instrument(skip(model, tol))]
pub fn make_dualvu(model: &mut Model, v: VertexId, fu: FaceUseId, tol: &Tol) -> Result<VertexUseId, IntersectError> {
    if let Some(vu) = model.find_vu_in_face(v, fu)? {
        return Ok(vu);
    }
    let p = model.point_of(v)?;
    for eu in model.face_edge_uses(fu)? {
        let (a, b) = model.eu_points(eu)?;
        if let SegmentProximity::Interior { .. } = point_segment_3d(&p, &a, &b, tol) {
            let new_eu = split_edge(model, eu, Some(v), p)?;
            debug!(?eu, ?v, "split edge for dual vertex-use");
            return Ok(model.edge_use(new_eu)?.start);
        }
    }
    Ok(make_point_loop(model, fu, v)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IntersectConfig;
    use crate::geometry::point::Point3d;
    use crate::geometry::vector::Vec3;
    use crate::intersect::resolve::IntersectLine;
    use crate::topology::brep::VertexUseParent;
    use crate::topology::primitives::{make_face, make_lone_vertex, make_shell};

    fn cfg() -> IntersectConfig {
        IntersectConfig::new(Tol::new(1e-6).unwrap())
    }

    fn square(model: &mut Model, x0: f64) -> FaceUseId {
        let shell = make_shell(model);
        make_face(
            model,
            shell,
            &[
                Point3d::new(x0, 0.0, 0.0),
                Point3d::new(x0 + 1.0, 0.0, 0.0),
                Point3d::new(x0 + 1.0, 1.0, 0.0),
                Point3d::new(x0, 1.0, 0.0),
            ],
        )
        .unwrap()
    }

    fn context(model: &Model, fu1: FaceUseId, fu2: FaceUseId) -> IntersectContext {
        let line = IntersectLine {
            pt: Point3d::ORIGIN,
            dir: Vec3::X,
        };
        IntersectContext::new(
            cfg(),
            (model.face_uses[fu1].shell, Some(fu1)),
            (model.face_uses[fu2].shell, Some(fu2)),
            line,
        )
    }

    #[test]
    fn test_enlist_makes_point_loop_dual() {
        let mut model = Model::new();
        let fu1 = square(&mut model, 0.0);
        let fu2 = square(&mut model, 5.0);
        let mut ctx = context(&model, fu1, fu2);
        let v = model.face_vertices(fu1).unwrap()[0];
        let vu = model.find_vu_in_face(v, fu1).unwrap().unwrap();
        let dual = ctx.enlist(&mut model, vu, None, 0.0).unwrap();
        assert_eq!(model.vu_vertex(dual).unwrap(), v);
        assert_eq!(model.vu_face_use(dual).unwrap(), Some(fu2));
        assert!(ctx.l1.contains(vu));
        assert!(ctx.l2.contains(dual));
        let point_loops = model.face_point_loops(fu2).unwrap();
        assert_eq!(point_loops.len(), 1);
    }

    #[test]
    fn test_enlist_splits_edge_under_vertex() {
        let mut model = Model::new();
        let fu1 = square(&mut model, 0.0);
        let fu2 = square(&mut model, 1.0);
        let mut ctx = context(&model, fu1, fu2);
        // (1, 0.5, 0) is not yet on fu2's left edge, which runs x = 1.
        let shell1 = model.face_uses[fu1].shell;
        let edges_before = model.edge_count();
        let lone = make_lone_vertex(&mut model, shell1, Point3d::new(1.0, 0.5, 0.0)).unwrap();
        let v = model.vu_vertex(lone).unwrap();
        let dual = make_dualvu(&mut model, v, fu2, ctx.tol()).unwrap();
        assert_eq!(model.vu_face_use(dual).unwrap(), Some(fu2));
        assert_eq!(model.edge_count(), edges_before + 1);
        // A second request finds the same use.
        assert_eq!(make_dualvu(&mut model, v, fu2, ctx.tol()).unwrap(), dual);
        ctx.l2.insert_unique(dual, 0.5);
        assert_eq!(ctx.l2.len(), 1);
    }

    #[test]
    fn test_enlist_rejects_foreign_vertex_use() {
        let mut model = Model::new();
        let fu1 = square(&mut model, 0.0);
        let fu2 = square(&mut model, 5.0);
        let stranger = make_shell(&mut model);
        let vu = make_lone_vertex(&mut model, stranger, Point3d::new(0.5, 0.5, 0.0)).unwrap();
        let mut ctx = context(&model, fu1, fu2);
        let err = ctx.enlist(&mut model, vu, None, 0.0).unwrap_err();
        assert!(matches!(err, IntersectError::Invariant(Invariant::ForeignVertexUse { .. })));
    }

    #[test]
    fn test_enlist_rejects_bad_dual_hint() {
        let mut model = Model::new();
        let fu1 = square(&mut model, 0.0);
        let fu2 = square(&mut model, 5.0);
        let mut ctx = context(&model, fu1, fu2);
        let vs1 = model.face_vertices(fu1).unwrap();
        let vs2 = model.face_vertices(fu2).unwrap();
        let vu = model.find_vu_in_face(vs1[0], fu1).unwrap().unwrap();
        let wrong = model.find_vu_in_face(vs2[0], fu2).unwrap().unwrap();
        let err = ctx.enlist(&mut model, vu, Some(wrong), 0.0).unwrap_err();
        assert!(matches!(
            err,
            IntersectError::Invariant(Invariant::DualMismatch { reason: "different vertex", .. })
        ));
    }

    #[test]
    fn test_enlist_is_idempotent() {
        let mut model = Model::new();
        let fu1 = square(&mut model, 0.0);
        let fu2 = square(&mut model, 5.0);
        let mut ctx = context(&model, fu1, fu2);
        let v = model.face_vertices(fu1).unwrap()[2];
        let vu = model.find_vu_in_face(v, fu1).unwrap().unwrap();
        let d1 = ctx.enlist(&mut model, vu, None, 1.0).unwrap();
        let generation = model.generation();
        let d2 = ctx.enlist(&mut model, vu, None, 1.0).unwrap();
        assert_eq!(d1, d2);
        assert_eq!(model.generation(), generation);
        assert_eq!((ctx.l1.len(), ctx.l2.len()), (1, 1));
        assert!(matches!(model.vertex_uses[d1].parent, VertexUseParent::LoopUse(_)));
    }
}
