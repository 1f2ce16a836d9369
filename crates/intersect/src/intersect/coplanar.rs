//! Two faces on one plane.
//!
//! Near-duplicate vertices across the faces are fused first. Every pair of
//! edges is then intersected directly in the first face's 2D frame until no
//! pair needs an edit. Finally each vertex of one face inside the other gets a
//! use there, and every edge of one face that runs inside the other is handed
//! to the cutter as a two-point line.

use tracing::{debug, instrument, trace};

use super::context::{IntersectContext, PairReport};
use super::cutter::FaceCutter;
use super::enlist::make_dualvu;
use super::error::{IntersectError, Invariant};
use super::face_face::cut_and_report;
use super::projection::ProjectionCache;
use super::resolve::IntersectLine;
use super::walker::repair_v_near_v;
use crate::config::IntersectConfig;
use crate::geometry::point::Point2d;
use crate::geometry::predicates::{point_segment_2d, segment_segment_2d, PointOnSegment, SegmentSegment2d};
use crate::topology::brep::{EdgeUseId, FaceUseId, Model, VertexId};
use crate::topology::classify::{classify_point_in_face, PointClass};
use crate::topology::mutators::{fuse_vertices, kill_zero_length_edges, split_edge};

#[instrument(skip(model, cfg, cutter))]
pub fn intersect_coplanar(
    model: &mut Model,
    cfg: &IntersectConfig,
    fu1: FaceUseId,
    fu2: FaceUseId,
    cutter: &mut dyn FaceCutter,
) -> Result<Vec<PairReport>, IntersectError> {
    let mut proj = ProjectionCache::new(cfg.tol, cfg.residual_factor);
    proj.prep_face(model, fu1)?;

    let fused = fuse_near_vertices(model, cfg, &mut proj, fu1, fu2)?;
    let edits = cross_edges(model, cfg, &mut proj, fu1, fu2)?;
    proj.release();
    debug!(fused, edits, "coplanar faces reconciled");

    give_duals(model, cfg, fu1, fu2)?;
    give_duals(model, cfg, fu2, fu1)?;

    let mut reports = Vec::new();
    let mut seen: Vec<(VertexId, VertexId)> = Vec::new();
    for (fu, other) in [(fu1, fu2), (fu2, fu1)] {
        for eu in model.face_edge_uses(fu)? {
            if let Some(report) = cut_edge_inside(model, cfg, eu, (fu1, fu2), other, &mut seen, cutter)? {
                reports.push(report);
            }
        }
    }
    Ok(reports)
}

/// Fuse each vertex of `fu2` into a vertex of `fu1` within the fuse reach,
/// when their in-plane separation is within tolerance.
fn fuse_near_vertices(
    model: &mut Model,
    cfg: &IntersectConfig,
    proj: &mut ProjectionCache,
    fu1: FaceUseId,
    fu2: FaceUseId,
) -> Result<usize, IntersectError> {
    let tol = cfg.tol;
    let reach = cfg.coplanar_fuse_factor * tol.dist;
    let mut fused = 0;
    'restart: loop {
        for v1 in model.face_vertices(fu1)? {
            for v2 in model.face_vertices(fu2)? {
                if v1 == v2 {
                    continue;
                }
                if model.point_of(v1)?.distance_to(&model.point_of(v2)?) > reach {
                    continue;
                }
                let (p1, p2) = (proj.project(model, v1)?, proj.project(model, v2)?);
                if (p2 - p1).length_squared() > tol.dist_sq {
                    continue;
                }
                fuse_vertices(model, v1, v2)?;
                kill_zero_length_edges(model, v1)?;
                fused += 1;
                continue 'restart;
            }
        }
        return Ok(fused);
    }
}

/// Pairwise segment intersection of the two faces' edges. Every edit restarts
/// the scan. Returns the number of edits.
fn cross_edges(
    model: &mut Model,
    cfg: &IntersectConfig,
    proj: &mut ProjectionCache,
    fu1: FaceUseId,
    fu2: FaceUseId,
) -> Result<usize, IntersectError> {
    let tol = cfg.tol;
    // Repairs need a context for their list bookkeeping; nothing is enlisted.
    let mut scratch = IntersectContext::new(
        *cfg,
        (model.face_use(fu1)?.shell, Some(fu1)),
        (model.face_use(fu2)?.shell, Some(fu2)),
        IntersectLine {
            pt: model.face_use_bbox(fu1)?.min,
            dir: model.face_use_plane(fu1)?.normal,
        },
    );
    let mut edits = 0;
    'restart: loop {
        let generation = model.generation();
        for e1 in model.face_edge_uses(fu1)? {
            for e2 in model.face_edge_uses(fu2)? {
                if model.edge_use(e1)?.edge == model.edge_use(e2)?.edge {
                    continue;
                }
                let seg1 = Segment::of(model, proj, e1)?;
                let seg2 = Segment::of(model, proj, e2)?;
                let relation = segment_segment_2d(&seg1.a2, &(seg1.b2 - seg1.a2), &seg2.a2, &(seg2.b2 - seg2.a2), &tol);
                if relation == SegmentSegment2d::Disjoint {
                    continue;
                }
                trace!(?e1, ?e2, ?relation, "coplanar edge pair");
                // Touches and overlaps: ends of one edge on the other.
                touch(&mut scratch, model, &seg2, &seg1)?;
                if model.generation() == generation {
                    touch(&mut scratch, model, &seg1, &seg2)?;
                }
                if model.generation() == generation {
                    if let SegmentSegment2d::Crossing { t, .. } = relation {
                        cross(model, cfg, &seg1, &seg2, t)?;
                    }
                }
                if model.generation() != generation {
                    edits += 1;
                    continue 'restart;
                }
            }
        }
        return Ok(edits);
    }
}

/// One edge-use with its ends in 3D and in the projection frame.
struct Segment {
    eu: EdgeUseId,
    va: VertexId,
    vb: VertexId,
    a2: Point2d,
    b2: Point2d,
}

impl Segment {
    fn of(model: &Model, proj: &mut ProjectionCache, eu: EdgeUseId) -> Result<Self, IntersectError> {
        let (va, vb) = model.eu_endpoints(eu)?;
        Ok(Self {
            eu,
            va,
            vb,
            a2: proj.project(model, va)?,
            b2: proj.project(model, vb)?,
        })
    }
}

/// Ends of `from` that lie on `onto`: a repair when they meet an end of
/// `onto` at a different vertex, a split of `onto` when they meet its
/// interior. Stops after the first edit.
fn touch(ctx: &mut IntersectContext, model: &mut Model, from: &Segment, onto: &Segment) -> Result<(), IntersectError> {
    for (w, w2) in [(from.va, from.a2), (from.vb, from.b2)] {
        if w == onto.va || w == onto.vb {
            continue;
        }
        let tol = *ctx.tol();
        match point_segment_2d(&w2, &onto.a2, &onto.b2, &tol) {
            PointOnSegment::AtStart => return repair_v_near_v(ctx, model, onto.va, w),
            PointOnSegment::AtEnd => return repair_v_near_v(ctx, model, onto.vb, w),
            PointOnSegment::Interior { .. } => {
                let p = model.point_of(w)?;
                split_edge(model, onto.eu, Some(w), p)?;
                debug!(eu = ?onto.eu, vertex = ?w, "split edge at touching end");
                return Ok(());
            }
            PointOnSegment::OutsideSpan | PointOnSegment::OffLine => {}
        }
    }
    Ok(())
}

/// A proper crossing inside both edges: one new (or found) vertex splits both.
fn cross(model: &mut Model, cfg: &IntersectConfig, seg1: &Segment, seg2: &Segment, t: f64) -> Result<(), IntersectError> {
    let tol = cfg.tol;
    let (a, b) = model.eu_points(seg1.eu)?;
    let p = a.lerp(&b, t);
    for v in [seg1.va, seg1.vb, seg2.va, seg2.vb] {
        if tol.points_coincident(&p, &model.point_of(v)?) {
            return Ok(());
        }
    }
    let shells = [model.eu_shell(seg1.eu)?, model.eu_shell(seg2.eu)?];
    let found = model.find_pt_in_shells(&p, &shells, &tol)?;
    let new_eu = split_edge(model, seg1.eu, found, p)?;
    let v = model.vu_vertex(model.edge_use(new_eu)?.start)?;
    split_edge(model, seg2.eu, Some(v), p)?;
    debug!(?v, e1 = ?seg1.eu, e2 = ?seg2.eu, "split crossing coplanar edges");
    Ok(())
}

/// Every vertex of `fu` that is not outside `other` gets a use in `other`.
fn give_duals(model: &mut Model, cfg: &IntersectConfig, fu: FaceUseId, other: FaceUseId) -> Result<(), IntersectError> {
    for v in model.face_vertices(fu)? {
        if model.find_vu_in_face(v, other)?.is_some() {
            continue;
        }
        let p = model.point_of(v)?;
        if classify_point_in_face(model, other, &p, &cfg.tol)? == PointClass::Outside {
            continue;
        }
        make_dualvu(model, v, other, &cfg.tol)?;
    }
    Ok(())
}

/// Hand `eu` to the cutter when both its ends are used by `other` and its
/// midpoint is not outside it. Each vertex pair is cut once.
fn cut_edge_inside(
    model: &mut Model,
    cfg: &IntersectConfig,
    eu: EdgeUseId,
    (fu1, fu2): (FaceUseId, FaceUseId),
    other: FaceUseId,
    seen: &mut Vec<(VertexId, VertexId)>,
    cutter: &mut dyn FaceCutter,
) -> Result<Option<PairReport>, IntersectError> {
    if !model.edge_uses.contains_key(eu) {
        return Ok(None);
    }
    let (va, vb) = model.eu_endpoints(eu)?;
    let key = if va <= vb { (va, vb) } else { (vb, va) };
    if seen.contains(&key) {
        return Ok(None);
    }
    let (Some(dual_a), Some(dual_b)) = (model.find_vu_in_face(va, other)?, model.find_vu_in_face(vb, other)?) else {
        return Ok(None);
    };
    let (pa, pb) = model.eu_points(eu)?;
    if classify_point_in_face(model, other, &pa.midpoint(&pb), &cfg.tol)? == PointClass::Outside {
        return Ok(None);
    }
    seen.push(key);

    let dir = (pb - pa).normalized().ok_or(Invariant::NoLineDirection)?;
    let mut ctx = IntersectContext::new(
        *cfg,
        (model.face_use(fu1)?.shell, Some(fu1)),
        (model.face_use(fu2)?.shell, Some(fu2)),
        IntersectLine { pt: pa, dir },
    );
    ctx.on_eg = Some(model.eu_geom(eu)?);
    let start = model.edge_use(eu)?.start;
    let end = model.eu_end_vu(eu)?;
    ctx.enlist(model, start, Some(dual_a), 0.0)?;
    ctx.enlist(model, end, Some(dual_b), 1.0)?;
    Ok(Some(cut_and_report(ctx, model, cutter)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::point::Point3d;
    use crate::intersect::cutter::RecordingCutter;
    use crate::topology::primitives::{make_face, make_shell};
    use crate::Tol;

    fn cfg() -> IntersectConfig {
        IntersectConfig::new(Tol::new(1e-6).unwrap())
    }

    fn rect(model: &mut Model, x0: f64, y0: f64, x1: f64, y1: f64) -> FaceUseId {
        let shell = make_shell(model);
        make_face(
            model,
            shell,
            &[
                Point3d::new(x0, y0, 0.0),
                Point3d::new(x1, y0, 0.0),
                Point3d::new(x1, y1, 0.0),
                Point3d::new(x0, y1, 0.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_overlapping_squares_share_crossings() {
        let mut model = Model::new();
        let a = rect(&mut model, 0.0, 0.0, 2.0, 2.0);
        let b = rect(&mut model, 1.0, 1.0, 3.0, 3.0);
        let mut cutter = RecordingCutter::new();
        let reports = intersect_coplanar(&mut model, &cfg(), a, b, &mut cutter).unwrap();

        // Crossings at (2,1) and (1,2) split two edges of each square.
        assert_eq!(model.face_edge_uses(a).unwrap().len(), 6);
        assert_eq!(model.face_edge_uses(b).unwrap().len(), 6);
        for p in [Point3d::new(2.0, 1.0, 0.0), Point3d::new(1.0, 2.0, 0.0)] {
            let shells = [model.face_uses[a].shell, model.face_uses[b].shell];
            let v = model.find_pt_in_shells(&p, &shells, &cfg().tol).unwrap().unwrap();
            assert!(model.find_vu_in_face(v, a).unwrap().is_some());
            assert!(model.find_vu_in_face(v, b).unwrap().is_some());
        }
        // The corners inside the other square got point loops.
        assert_eq!(model.face_point_loops(a).unwrap().len(), 1);
        assert_eq!(model.face_point_loops(b).unwrap().len(), 1);
        // a's pieces (2,1)-(2,2), (2,2)-(1,2) and b's (2,1)-(1,1), (1,1)-(1,2).
        assert_eq!(reports.len(), 4);
        assert_eq!(cutter.requests.len(), 4);
        assert!(reports.iter().all(|r| r.list1.len() == 2 && r.list2.len() == 2));
    }

    #[test]
    fn test_near_duplicate_corner_is_fused() {
        let mut model = Model::new();
        let a = rect(&mut model, 0.0, 0.0, 1.0, 1.0);
        let b = rect(&mut model, 1.0 + 5e-7, 0.0, 2.0, 1.0);
        let before = model.vertex_count();
        let mut cutter = RecordingCutter::new();
        let reports = intersect_coplanar(&mut model, &cfg(), a, b, &mut cutter).unwrap();
        assert_eq!(model.vertex_count(), before - 2);
        // The shared side is an edge of both faces.
        assert_eq!(reports.len(), 1);
    }

    #[test]
    fn test_rerun_changes_nothing() {
        let mut model = Model::new();
        let a = rect(&mut model, 0.0, 0.0, 2.0, 2.0);
        let b = rect(&mut model, 1.0, 1.0, 3.0, 3.0);
        let mut cutter = RecordingCutter::new();
        intersect_coplanar(&mut model, &cfg(), a, b, &mut cutter).unwrap();
        let (vertices, edges, generation) = (model.vertex_count(), model.edge_count(), model.generation());
        intersect_coplanar(&mut model, &cfg(), a, b, &mut cutter).unwrap();
        assert_eq!((model.vertex_count(), model.edge_count()), (vertices, edges));
        assert_eq!(model.generation(), generation);
    }
}
