//! One edge against one face: the edge is either already an edge of the face,
//! lies in the face's plane, or pierces it.

use tracing::{debug, info, instrument};

use super::context::IntersectContext;
use super::cutter::FaceCutter;
use super::error::{IntersectError, Invariant};
use super::face_face::{cut_and_report, report_failure, IntersectOutcome};
use super::resolve::IntersectLine;
use super::walker::{colinear, isect_line_face};
use crate::config::IntersectConfig;
use crate::geometry::point::Point3d;
use crate::geometry::predicates::line_plane_parameter;
use crate::geometry::transform::BoundingBox;
use crate::topology::brep::{EdgeUseId, FaceUseId, Model, ShellId, TopologyError, VertexUseId};
use crate::topology::classify::{classify_point_in_face, PointClass};
use crate::topology::mutators::{join_radial, split_edge};

/// Intersect the edge under `eu` with face-use `fu`.
///
/// `eu_face` is the face-use `eu` belongs to, if the caller wants that face
/// walked as well; `None` for a wire edge or to skip it.
#[instrument(skip(model, cfg, cutter))]
pub fn intersect_edge_face(
    model: &mut Model,
    cfg: &IntersectConfig,
    eu: EdgeUseId,
    fu: FaceUseId,
    eu_face: Option<FaceUseId>,
    cutter: &mut dyn FaceCutter,
) -> Result<IntersectOutcome, IntersectError> {
    let result = edge_face(model, cfg, eu, fu, eu_face, cutter);
    match &result {
        Ok(outcome) => info!(enlisted = outcome.enlisted(), "edge/face intersected"),
        Err(err) => report_failure(model, err),
    }
    result
}

pub(crate) fn edge_face(
    model: &mut Model,
    cfg: &IntersectConfig,
    eu: EdgeUseId,
    fu: FaceUseId,
    eu_face: Option<FaceUseId>,
    cutter: &mut dyn FaceCutter,
) -> Result<IntersectOutcome, IntersectError> {
    let tol = cfg.tol;
    let own = model.eu_face_use(eu)?;
    if own == Some(fu) || (eu_face.is_some() && eu_face != own) {
        return Err(TopologyError::WrongParent {
            what: "edge-use outside the face-use given for it",
        }
        .into());
    }

    let (va, vb) = model.eu_endpoints(eu)?;
    let (pa, pb) = model.eu_points(eu)?;
    if va == vb || tol.points_coincident(&pa, &pb) {
        debug!(?eu, "skipping zero-length edge");
        return Ok(IntersectOutcome::NoOverlap);
    }

    if let Some(shared) = model.find_edge_between(va, vb, fu)? {
        if model.edge_use(shared)?.edge != model.edge_use(eu)?.edge {
            join_radial(model, shared, eu)?;
        }
        debug!(?eu, ?shared, "edge topology already shared");
        return Ok(IntersectOutcome::SharedTopology);
    }

    let edge_box = BoundingBox::from_points([&pa, &pb]).expanded(tol.dist);
    if !edge_box.intersects(&model.face_use_bbox(fu)?) {
        return Ok(IntersectOutcome::NoOverlap);
    }

    let sides = EdgeSides {
        s1: model.eu_shell(eu)?,
        own,
        s2: model.face_use(fu)?.shell,
        fu,
    };
    let plane = model.face_use_plane(fu)?;
    let da = plane.distance_to_point(&pa);
    let db = plane.distance_to_point(&pb);
    if tol.is_zero(da) && tol.is_zero(db) {
        in_plane(model, cfg, eu, &sides, eu_face, cutter)
    } else if (da > tol.dist && db > tol.dist) || (da < -tol.dist && db < -tol.dist) {
        Ok(IntersectOutcome::NoOverlap)
    } else {
        pierce(model, cfg, eu, &sides, (da, db))
    }
}

struct EdgeSides {
    s1: ShellId,
    own: Option<FaceUseId>,
    s2: ShellId,
    fu: FaceUseId,
}

impl EdgeSides {
    fn context(&self, cfg: &IntersectConfig, line: IntersectLine) -> IntersectContext {
        IntersectContext::new(*cfg, (self.s1, self.own), (self.s2, Some(self.fu)), line)
    }
}

/// The edge lies in the face's plane: its own line is the working line.
fn in_plane(
    model: &mut Model,
    cfg: &IntersectConfig,
    eu: EdgeUseId,
    sides: &EdgeSides,
    eu_face: Option<FaceUseId>,
    cutter: &mut dyn FaceCutter,
) -> Result<IntersectOutcome, IntersectError> {
    let line = model.eu_line(eu)?;
    let face_box = model.face_use_bbox(sides.fu)?.expanded(cfg.tol.dist);
    // Start where the edge line enters the face box.
    let Some((t_in, _)) = face_box.line_span(&line.origin, &line.direction) else {
        return Ok(IntersectOutcome::NoOverlap);
    };
    let ray = IntersectLine {
        pt: line.evaluate(t_in),
        dir: line.direction,
    };

    let mut ctx = sides.context(cfg, ray);
    ctx.on_eg = Some(model.eu_geom(eu)?);
    isect_line_face(&mut ctx, model, sides.fu, sides.own)?;
    if let Some(of) = eu_face {
        isect_line_face(&mut ctx, model, of, Some(sides.fu))?;
    }
    // Ends of the edge itself that sit inside the face.
    colinear(&mut ctx, model)?;
    Ok(IntersectOutcome::Line(cut_and_report(ctx, model, cutter)?))
}

/// The edge crosses the face's plane at one point.
fn pierce(
    model: &mut Model,
    cfg: &IntersectConfig,
    eu: EdgeUseId,
    sides: &EdgeSides,
    (da, db): (f64, f64),
) -> Result<IntersectOutcome, IntersectError> {
    let tol = cfg.tol;
    let (va, vb) = model.eu_endpoints(eu)?;
    let (pa, pb) = model.eu_points(eu)?;
    let vu_a = model.edge_use(eu)?.start;
    let vu_b = model.eu_end_vu(eu)?;
    let span = pb - pa;
    let dir = span.normalized().ok_or(Invariant::NoLineDirection)?;

    let (end_hit, p): (Option<VertexUseId>, Point3d) = if tol.is_zero(da) {
        (Some(vu_a), pa)
    } else if tol.is_zero(db) {
        (Some(vu_b), pb)
    } else {
        let plane = model.face_use_plane(sides.fu)?;
        let Some(t) = line_plane_parameter(&pa, &span, &plane) else {
            return Ok(IntersectOutcome::NoOverlap);
        };
        (None, pa + span * t)
    };

    let mut ctx = sides.context(cfg, IntersectLine { pt: p, dir });
    ctx.proj.prep_edge(model, eu)?;
    let xa = ctx.proj.project(model, va)?.x;
    let xb = ctx.proj.project(model, vb)?.x;
    let xp = ctx.proj.project_point(&p).x;
    if xp < xa.min(xb) - tol.dist || xp > xa.max(xb) + tol.dist {
        return Ok(IntersectOutcome::NoOverlap);
    }
    if classify_point_in_face(model, sides.fu, &p, &tol)? == PointClass::Outside {
        return Ok(IntersectOutcome::NoOverlap);
    }

    let vu = match end_hit {
        Some(vu) => vu,
        None => match model.find_pt_in_shells(&p, &[sides.s1, sides.s2], &tol)? {
            Some(found) if found == va => vu_a,
            Some(found) if found == vb => vu_b,
            found => {
                let new_eu = split_edge(model, eu, found, p)?;
                model.edge_use(new_eu)?.start
            }
        },
    };
    let dual = ctx.enlist(model, vu, None, 0.0)?;
    debug!(?vu, ?dual, "edge pierces face");
    Ok(IntersectOutcome::Point(ctx.into_report()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intersect::cutter::RecordingCutter;
    use crate::topology::brep::VertexUseParent;
    use crate::topology::primitives::{make_face, make_face_from_vertices, make_shell, make_wire_edge};
    use crate::Tol;

    fn cfg() -> IntersectConfig {
        IntersectConfig::new(Tol::new(1e-6).unwrap())
    }

    fn unit_square(model: &mut Model) -> FaceUseId {
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

    fn wire(model: &mut Model, a: Point3d, b: Point3d) -> EdgeUseId {
        let shell = make_shell(model);
        let va = model.insert_vertex(a);
        let vb = model.insert_vertex(b);
        make_wire_edge(model, shell, va, vb).unwrap()
    }

    #[test]
    fn test_wire_pierces_face_interior() {
        let mut model = Model::new();
        let fu = unit_square(&mut model);
        let eu = wire(&mut model, Point3d::new(0.25, 0.5, -1.0), Point3d::new(0.25, 0.5, 1.0));
        let mut cutter = RecordingCutter::new();
        let outcome = intersect_edge_face(&mut model, &cfg(), eu, fu, None, &mut cutter).unwrap();
        let IntersectOutcome::Point(report) = outcome else {
            panic!("expected a pierce point");
        };
        assert_eq!((report.list1.len(), report.list2.len()), (1, 1));
        let dual = report.list2.vertex_uses()[0];
        assert!(matches!(model.vertex_uses[dual].parent, VertexUseParent::LoopUse(_)));
        let v = model.vu_vertex(dual).unwrap();
        assert!(model.point_of(v).unwrap().distance_to(&Point3d::new(0.25, 0.5, 0.0)) < 1e-9);
        // The wire now runs through the new vertex.
        assert_eq!(model.edges_at_vertex(v).unwrap().len(), 2);
        assert!(cutter.requests.is_empty());
    }

    #[test]
    fn test_wire_missing_face_is_no_overlap() {
        let mut model = Model::new();
        let fu = unit_square(&mut model);
        let eu = wire(&mut model, Point3d::new(0.5, 0.5, 0.5), Point3d::new(0.5, 0.5, 2.0));
        let mut cutter = RecordingCutter::new();
        let outcome = intersect_edge_face(&mut model, &cfg(), eu, fu, None, &mut cutter).unwrap();
        assert_eq!(outcome, IntersectOutcome::NoOverlap);
    }

    #[test]
    fn test_wire_in_plane_crosses_boundary() {
        let mut model = Model::new();
        let fu = unit_square(&mut model);
        let eu = wire(&mut model, Point3d::new(-1.0, 0.5, 0.0), Point3d::new(2.0, 0.5, 0.0));
        let mut cutter = RecordingCutter::new();
        let outcome = intersect_edge_face(&mut model, &cfg(), eu, fu, None, &mut cutter).unwrap();
        let IntersectOutcome::Line(report) = outcome else {
            panic!("expected a line outcome");
        };
        // Crossings at x = 0 and x = 1 in both the face and the wire.
        assert_eq!(report.list2.len(), 2);
        let mut wire_vertices: Vec<_> = report
            .list1
            .vertex_uses()
            .iter()
            .map(|&vu| model.vu_vertex(vu).unwrap())
            .collect();
        wire_vertices.sort();
        wire_vertices.dedup();
        assert_eq!(wire_vertices.len(), 2);
        assert_eq!(model.face_edge_uses(fu).unwrap().len(), 6);
        assert_eq!(cutter.requests.len(), 1);
    }

    #[test]
    fn test_shared_edge_is_joined() {
        let mut model = Model::new();
        let shell_a = make_shell(&mut model);
        let shell_b = make_shell(&mut model);
        let p = [
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(1.0, 0.0, 0.0),
            Point3d::new(1.0, 1.0, 0.0),
            Point3d::new(0.0, 0.0, 1.0),
        ];
        let v: Vec<_> = p.iter().map(|&q| model.insert_vertex(q)).collect();
        let a = make_face_from_vertices(&mut model, shell_a, &[v[0], v[1], v[2]]).unwrap();
        let b = make_face_from_vertices(&mut model, shell_b, &[v[1], v[0], v[3]]).unwrap();
        let eu = model.find_edge_between(v[0], v[1], a).unwrap().unwrap();
        let edges = model.edge_count();
        let mut cutter = RecordingCutter::new();
        let outcome = intersect_edge_face(&mut model, &cfg(), eu, b, Some(a), &mut cutter).unwrap();
        assert_eq!(outcome, IntersectOutcome::SharedTopology);
        assert_eq!(model.edge_count(), edges - 1);
        let other = model.find_edge_between(v[0], v[1], b).unwrap().unwrap();
        assert_eq!(model.edge_use(eu).unwrap().edge, model.edge_use(other).unwrap().edge);
    }

    #[test]
    fn test_wrong_face_for_edge_is_rejected() {
        let mut model = Model::new();
        let a = unit_square(&mut model);
        let b = unit_square(&mut model);
        let eu = model.face_edge_uses(a).unwrap()[0];
        let mut cutter = RecordingCutter::new();
        let err = intersect_edge_face(&mut model, &cfg(), eu, a, None, &mut cutter).unwrap_err();
        assert!(!err.is_invariant());
        let err = intersect_edge_face(&mut model, &cfg(), eu, a, Some(b), &mut cutter).unwrap_err();
        assert!(matches!(err, IntersectError::Topology(TopologyError::WrongParent { .. })));
    }
}
