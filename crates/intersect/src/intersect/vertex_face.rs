use tracing::{debug, info, instrument};

use super::context::IntersectContext;
use super::error::IntersectError;
use super::face_face::{report_failure, IntersectOutcome};
use super::resolve::IntersectLine;
use crate::config::IntersectConfig;
use crate::geometry::predicates::{point_segment_3d, SegmentProximity};
use crate::topology::brep::{FaceUseId, Model, VertexUseId};
use crate::topology::classify::{classify_point_in_face, PointClass};
use crate::topology::mutators::{fuse_vertices, kill_zero_length_edges, split_edge};

/// Intersect a vertex (normally a lone one) with face-use `fu`. When the
/// vertex touches the face it ends up used by the face and both uses are
/// enlisted.
#[instrument(skip(model, cfg))]
pub fn intersect_vertex_face(
    model: &mut Model,
    cfg: &IntersectConfig,
    vu: VertexUseId,
    fu: FaceUseId,
) -> Result<IntersectOutcome, IntersectError> {
    let result = vertex_face(model, cfg, vu, fu);
    match &result {
        Ok(outcome) => info!(enlisted = outcome.enlisted(), "vertex/face intersected"),
        Err(err) => report_failure(model, err),
    }
    result
}

pub(crate) fn vertex_face(
    model: &mut Model,
    cfg: &IntersectConfig,
    vu: VertexUseId,
    fu: FaceUseId,
) -> Result<IntersectOutcome, IntersectError> {
    let tol = cfg.tol;
    let v = model.vu_vertex(vu)?;
    let p = model.point_of(v)?;
    let plane = model.face_use_plane(fu)?;
    if !tol.is_zero(plane.distance_to_point(&p))
        || !model.face_use_bbox(fu)?.expanded(tol.dist).contains_point(&p)
    {
        return Ok(IntersectOutcome::NoOverlap);
    }

    let line = IntersectLine {
        pt: p,
        dir: plane.normal,
    };
    let mut ctx = IntersectContext::new(
        *cfg,
        (model.vu_shell(vu)?, model.vu_face_use(vu)?),
        (model.face_use(fu)?.shell, Some(fu)),
        line,
    );

    // A point loop on this vertex, or on one within tolerance.
    for (_, lvu) in model.face_point_loops(fu)? {
        let lv = model.vu_vertex(lvu)?;
        if lv != v {
            if !tol.points_coincident(&p, &model.point_of(lv)?) {
                continue;
            }
            fuse_vertices(model, lv, v)?;
            debug!(keep = ?lv, drop = ?v, "fused vertex into point loop");
        }
        ctx.enlist(model, vu, Some(lvu), 0.0)?;
        return Ok(IntersectOutcome::Point(ctx.into_report()));
    }

    // An edge of the face starting at the vertex.
    for eu in model.face_edge_uses(fu)? {
        let start = model.edge_use(eu)?.start;
        if model.vu_vertex(start)? == v {
            ctx.enlist(model, vu, Some(start), 0.0)?;
            return Ok(IntersectOutcome::Point(ctx.into_report()));
        }
    }

    // An edge passing through the vertex.
    for eu in model.face_edge_uses(fu)? {
        let (a, b) = model.eu_points(eu)?;
        let dual = match point_segment_3d(&p, &a, &b, &tol) {
            SegmentProximity::AtStart => Some(model.edge_use(eu)?.start),
            SegmentProximity::AtEnd => Some(model.eu_end_vu(eu)?),
            SegmentProximity::Interior { .. } => {
                let new_eu = split_edge(model, eu, Some(v), p)?;
                debug!(?eu, ?v, "split face edge at vertex");
                Some(model.edge_use(new_eu)?.start)
            }
            SegmentProximity::Off { .. } => None,
        };
        let Some(dual) = dual else {
            continue;
        };
        let dv = model.vu_vertex(dual)?;
        if dv != v {
            fuse_vertices(model, dv, v)?;
            kill_zero_length_edges(model, dv)?;
            debug!(keep = ?dv, drop = ?v, "fused vertex into edge end");
        }
        ctx.enlist(model, vu, Some(dual), 0.0)?;
        return Ok(IntersectOutcome::Point(ctx.into_report()));
    }

    if classify_point_in_face(model, fu, &p, &tol)? != PointClass::Inside {
        return Ok(IntersectOutcome::NoOverlap);
    }
    ctx.enlist(model, vu, None, 0.0)?;
    Ok(IntersectOutcome::Point(ctx.into_report()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::point::Point3d;
    use crate::topology::brep::VertexUseParent;
    use crate::topology::primitives::{make_face, make_lone_vertex, make_shell};
    use crate::Tol;

    fn cfg() -> IntersectConfig {
        IntersectConfig::new(Tol::new(1e-6).unwrap())
    }

    fn square(model: &mut Model) -> FaceUseId {
        let shell = make_shell(model);
        make_face(
            model,
            shell,
            &[
                Point3d::new(0.0, 0.0, 0.0),
                Point3d::new(1.0, 0.0, 0.0),
                Point3d::new(1.0, 1.0, 0.0),
                Point3d::new(0.0, 1.0, 0.0),
            ],
        )
        .unwrap()
    }

    fn lone(model: &mut Model, p: Point3d) -> VertexUseId {
        let shell = make_shell(model);
        make_lone_vertex(model, shell, p).unwrap()
    }

    #[test]
    fn test_vertex_inside_gets_point_loop() {
        let mut model = Model::new();
        let fu = square(&mut model);
        let vu = lone(&mut model, Point3d::new(0.5, 0.5, 0.0));
        let IntersectOutcome::Point(report) = intersect_vertex_face(&mut model, &cfg(), vu, fu).unwrap() else {
            panic!("expected a point");
        };
        let dual = report.list2.vertex_uses()[0];
        assert!(matches!(model.vertex_uses[dual].parent, VertexUseParent::LoopUse(_)));
        assert_eq!(model.vu_vertex(dual).unwrap(), model.vu_vertex(vu).unwrap());

        // A second pass finds the point loop instead of making another.
        intersect_vertex_face(&mut model, &cfg(), vu, fu).unwrap();
        assert_eq!(model.face_point_loops(fu).unwrap().len(), 1);
    }

    #[test]
    fn test_vertex_on_edge_splits_it() {
        let mut model = Model::new();
        let fu = square(&mut model);
        let vu = lone(&mut model, Point3d::new(0.5, 0.0, 0.0));
        let edges = model.edge_count();
        let outcome = intersect_vertex_face(&mut model, &cfg(), vu, fu).unwrap();
        assert_eq!(outcome.enlisted(), 2);
        assert_eq!(model.edge_count(), edges + 1);
        assert!(model.face_point_loops(fu).unwrap().is_empty());
    }

    #[test]
    fn test_vertex_near_corner_is_fused() {
        let mut model = Model::new();
        let fu = square(&mut model);
        let vu = lone(&mut model, Point3d::new(1.0 + 5e-7, 1.0, 0.0));
        let vertices = model.vertex_count();
        intersect_vertex_face(&mut model, &cfg(), vu, fu).unwrap();
        assert_eq!(model.vertex_count(), vertices - 1);
        let v = model.vu_vertex(vu).unwrap();
        assert!(model.find_vu_in_face(v, fu).unwrap().is_some());
    }

    #[test]
    fn test_vertex_off_plane_or_outside() {
        let mut model = Model::new();
        let fu = square(&mut model);
        let above = lone(&mut model, Point3d::new(0.5, 0.5, 0.1));
        let beside = lone(&mut model, Point3d::new(2.0, 0.5, 0.0));
        assert_eq!(
            intersect_vertex_face(&mut model, &cfg(), above, fu).unwrap(),
            IntersectOutcome::NoOverlap
        );
        assert_eq!(
            intersect_vertex_face(&mut model, &cfg(), beside, fu).unwrap(),
            IntersectOutcome::NoOverlap
        );
    }
}
