//! Two whole shells against each other: every face pair inside the shells'
//! common box, then each shell's wire edges and lone vertices against
//! everything in the other shell.
//!
//! A closed chain of wire edges stands in for a wire loop, so it is handled
//! one edge at a time like any other wire edge.

use serde::Serialize;
use tracing::{debug, info, instrument};

use super::context::IntersectContext;
use super::cutter::FaceCutter;
use super::edge_face::edge_face;
use super::error::{IntersectError, Invariant};
use super::face_face::{face_pair, report_failure, IntersectOutcome};
use super::resolve::IntersectLine;
use super::vertex_face::vertex_face;
use crate::config::IntersectConfig;
use crate::geometry::point::Point3d;
use crate::geometry::predicates::{point_segment_3d, segment_segment_3d, SegmentProximity, SegmentSegment3d};
use crate::geometry::transform::BoundingBox;
use crate::geometry::vector::Vec3;
use crate::topology::brep::{EdgeId, EdgeUseId, Model, ShellId, TopologyError, VertexId, VertexUseId};
use crate::topology::mutators::{fuse_vertices, join_radial, kill_zero_length_edges, split_edge};
use crate::Tol;

/// Everything that met when two shells were intersected.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShellsReport {
    /// Face/face outcomes, misses left out.
    pub faces: Vec<IntersectOutcome>,
    /// Outcomes involving a wire edge or a lone vertex, misses left out.
    pub wires: Vec<IntersectOutcome>,
}

impl ShellsReport {
    pub fn enlisted(&self) -> usize {
        self.faces.iter().chain(&self.wires).map(IntersectOutcome::enlisted).sum()
    }
}

fn keep(list: &mut Vec<IntersectOutcome>, outcome: IntersectOutcome) {
    if outcome != IntersectOutcome::NoOverlap {
        list.push(outcome);
    }
}

/// Intersect shell `s1` with shell `s2`.
///
/// Faces are intersected pairwise through the same path as
/// [`intersect_faces`](super::face_face::intersect_faces). Wire edges that
/// cross, touch or overlap are broken at their common vertices, and lone
/// vertices lying on an edge or face become vertices of it. On an error the
/// model may be partly edited and should be discarded.
#[instrument(skip(model, cfg, cutter))]
pub fn intersect_shells(
    model: &mut Model,
    cfg: &IntersectConfig,
    s1: ShellId,
    s2: ShellId,
    cutter: &mut dyn FaceCutter,
) -> Result<ShellsReport, IntersectError> {
    let result = shell_pair(model, cfg, s1, s2, cutter);
    match &result {
        Ok(report) => info!(
            faces = report.faces.len(),
            wires = report.wires.len(),
            enlisted = report.enlisted(),
            "shells intersected"
        ),
        Err(err) => report_failure(model, err),
    }
    result
}

fn shell_pair(
    model: &mut Model,
    cfg: &IntersectConfig,
    s1: ShellId,
    s2: ShellId,
    cutter: &mut dyn FaceCutter,
) -> Result<ShellsReport, IntersectError> {
    if s1 == s2 {
        return Err(TopologyError::WrongParent {
            what: "shell intersected with itself",
        }
        .into());
    }
    let tol = cfg.tol;
    let mut report = ShellsReport::default();
    let box1 = model.shell_bbox(s1)?.expanded(tol.dist);
    let box2 = model.shell_bbox(s2)?.expanded(tol.dist);
    if !box1.intersects(&box2) {
        debug!("shell boxes apart");
        return Ok(report);
    }
    let window = box1.intersection(&box2);

    let mut faces2 = Vec::new();
    for &fu in &model.shell(s2)?.face_uses {
        if model.face_use_bbox(fu)?.expanded(tol.dist).intersects(&window) {
            faces2.push(fu);
        }
    }

    for fu1 in model.shell(s1)?.face_uses.clone() {
        if !model.face_uses.contains_key(fu1) || !model.face_use_bbox(fu1)?.expanded(tol.dist).intersects(&window) {
            continue;
        }
        for &fu2 in &faces2 {
            if model.face_uses.contains_key(fu2) {
                keep(&mut report.faces, face_pair(model, cfg, fu1, fu2, cutter)?);
            }
        }
        for eu2 in model.shell_wire_edges(s2)? {
            if model.edge_uses.contains_key(eu2) {
                keep(&mut report.wires, edge_face(model, cfg, eu2, fu1, None, cutter)?);
            }
        }
        for vu2 in model.shell(s2)?.lone_vertices.clone() {
            if model.vertex_uses.contains_key(vu2) {
                keep(&mut report.wires, vertex_face(model, cfg, vu2, fu1)?);
            }
        }
    }

    // Pieces split off a wire edge join the shell's list, so they are
    // picked up here too.
    let mut done: Vec<EdgeId> = Vec::new();
    loop {
        let mut next = None;
        for eu in model.shell_wire_edges(s1)? {
            if !done.contains(&model.edge_use(eu)?.edge) {
                next = Some(eu);
                break;
            }
        }
        let Some(eu1) = next else { break };
        let before = model.edge_use(eu1)?.edge;
        wire_edge_shell(model, cfg, eu1, s2, &window, cutter, &mut report)?;
        done.push(before);
        if let Some(eu) = model.edge_uses.get(eu1) {
            done.push(eu.edge);
        }
    }

    for vu1 in model.shell(s1)?.lone_vertices.clone() {
        if !model.vertex_uses.contains_key(vu1) || !window.contains_point(&model.point_of(model.vu_vertex(vu1)?)?) {
            continue;
        }
        for &fu2 in &faces2 {
            if model.face_uses.contains_key(fu2) && model.vertex_uses.contains_key(vu1) {
                keep(&mut report.wires, vertex_face(model, cfg, vu1, fu2)?);
            }
        }
        for eu2 in model.shell_wire_edges(s2)? {
            if let Some(outcome) = vertex_on_edge(model, cfg, vu1, eu2)? {
                report.wires.push(outcome);
            }
        }
        for vu2 in model.shell(s2)?.lone_vertices.clone() {
            if let Some(outcome) = vertex_pair(model, cfg, vu1, vu2)? {
                report.wires.push(outcome);
            }
        }
    }
    Ok(report)
}

/// One wire edge of one shell against everything in shell `s2`.
fn wire_edge_shell(
    model: &mut Model,
    cfg: &IntersectConfig,
    eu1: EdgeUseId,
    s2: ShellId,
    window: &BoundingBox,
    cutter: &mut dyn FaceCutter,
    report: &mut ShellsReport,
) -> Result<(), IntersectError> {
    let tol = cfg.tol;
    if let Some(eu2) = model.find_matching_eu_in_shell(eu1, s2)? {
        join_radial(model, eu2, eu1)?;
        debug!(?eu1, ?eu2, "wire edge already an edge of the other shell");
        report.wires.push(IntersectOutcome::SharedTopology);
        return Ok(());
    }
    let (a, b) = model.eu_points(eu1)?;
    if !BoundingBox::from_points([&a, &b]).expanded(tol.dist).intersects(window) {
        return Ok(());
    }

    for fu2 in model.shell(s2)?.face_uses.clone() {
        if !model.edge_uses.contains_key(eu1) {
            return Ok(());
        }
        if model.face_uses.contains_key(fu2) {
            keep(&mut report.wires, edge_face(model, cfg, eu1, fu2, None, cutter)?);
        }
    }

    // Indexes into the live list so pieces split off the other shell's wires
    // are visited as well. A shift can revisit an edge, never skip one.
    let mut i = 0;
    loop {
        let Some(&eu2) = model.shell_wire_edges(s2)?.get(i) else {
            break;
        };
        i += 1;
        if !model.edge_uses.contains_key(eu1) {
            return Ok(());
        }
        if let Some(outcome) = wire_edge_pair(model, cfg, eu1, eu2)? {
            report.wires.push(outcome);
        }
    }

    for vu2 in model.shell(s2)?.lone_vertices.clone() {
        if !model.edge_uses.contains_key(eu1) {
            return Ok(());
        }
        if let Some(outcome) = vertex_on_edge(model, cfg, vu2, eu1)? {
            report.wires.push(outcome);
        }
    }
    Ok(())
}

/// Two wire edges from different shells. Returns `None` when they miss or
/// already meet only at a common vertex.
fn wire_edge_pair(
    model: &mut Model,
    cfg: &IntersectConfig,
    eu1: EdgeUseId,
    eu2: EdgeUseId,
) -> Result<Option<IntersectOutcome>, IntersectError> {
    let tol = cfg.tol;
    let (v1a, v1b) = model.eu_endpoints(eu1)?;
    let (v2a, v2b) = model.eu_endpoints(eu2)?;
    if (v1a == v2a && v1b == v2b) || (v1a == v2b && v1b == v2a) {
        if model.edge_use(eu1)?.edge == model.edge_use(eu2)?.edge {
            return Ok(None);
        }
        join_radial(model, eu2, eu1)?;
        debug!(?eu1, ?eu2, "joined wire edges with common ends");
        return Ok(Some(IntersectOutcome::SharedTopology));
    }

    let (a, b) = model.eu_points(eu1)?;
    let (c, d) = model.eu_points(eu2)?;
    let dir = (b - a).normalized().ok_or(Invariant::NoLineDirection)?;
    let line = IntersectLine { pt: a, dir };
    let s1 = model.eu_shell(eu1)?;
    let s2 = model.eu_shell(eu2)?;

    match segment_segment_3d(&a, &b, &c, &d, &tol) {
        SegmentSegment3d::Disjoint => Ok(None),
        SegmentSegment3d::Crossing { t, .. } => {
            let Some(v) = meet_at(model, &tol, eu1, eu2, a.lerp(&b, t))? else {
                return Ok(None);
            };
            let mut ctx = IntersectContext::new(*cfg, (s1, None), (s2, None), line);
            enlist_wire_vertex(&mut ctx, model, v)?;
            debug!(?eu1, ?eu2, ?v, "wire edges cross");
            Ok(Some(IntersectOutcome::Point(ctx.into_report())))
        }
        SegmentSegment3d::Colinear { .. } => {
            // Each end of one edge that lies on the other becomes a vertex of
            // it. Later pieces are met again when the split-off edges are
            // visited.
            let mut touched = Vec::new();
            for w in [v2a, v2b] {
                if let Some(v) = vertex_onto(model, &tol, w, eu1)? {
                    touched.push(v);
                }
            }
            for w in [v1a, v1b] {
                if !model.edge_uses.contains_key(eu2) {
                    break;
                }
                if let Some(v) = vertex_onto(model, &tol, w, eu2)? {
                    touched.push(v);
                }
            }
            if touched.is_empty() {
                return Ok(None);
            }
            let mut ctx = IntersectContext::new(*cfg, (s1, None), (s2, None), line);
            for v in touched {
                if model.vertices.contains_key(v) {
                    enlist_wire_vertex(&mut ctx, model, v)?;
                }
            }
            debug!(?eu1, ?eu2, "wire edges overlap");
            Ok(Some(IntersectOutcome::Line(ctx.into_report())))
        }
    }
}

/// Make `p` a vertex of both edges, fusing with an end either edge already
/// has there. Returns `None` when the edges already share that vertex.
fn meet_at(
    model: &mut Model,
    tol: &Tol,
    eu1: EdgeUseId,
    eu2: EdgeUseId,
    p: Point3d,
) -> Result<Option<VertexId>, IntersectError> {
    let end1 = end_near(model, tol, eu1, &p)?;
    let end2 = end_near(model, tol, eu2, &p)?;
    let v = match (end1, end2) {
        (Some(x), Some(y)) if x == y => return Ok(None),
        (Some(x), Some(y)) => {
            fuse_vertices(model, x, y)?;
            kill_zero_length_edges(model, x)?;
            x
        }
        (Some(x), None) => {
            split_edge(model, eu2, Some(x), p)?;
            x
        }
        (None, Some(y)) => {
            split_edge(model, eu1, Some(y), p)?;
            y
        }
        (None, None) => {
            let piece = split_edge(model, eu1, None, p)?;
            let v = model.vu_vertex(model.edge_use(piece)?.start)?;
            split_edge(model, eu2, Some(v), p)?;
            v
        }
    };
    Ok(Some(v))
}

fn end_near(model: &Model, tol: &Tol, eu: EdgeUseId, p: &Point3d) -> Result<Option<VertexId>, IntersectError> {
    let (va, vb) = model.eu_endpoints(eu)?;
    for v in [va, vb] {
        if tol.points_coincident(p, &model.point_of(v)?) {
            return Ok(Some(v));
        }
    }
    Ok(None)
}

/// Put vertex `w` on the edge under `eu`: fuse it with an end it touches or
/// split the edge at it. Returns the vertex that now lies on the edge.
fn vertex_onto(model: &mut Model, tol: &Tol, w: VertexId, eu: EdgeUseId) -> Result<Option<VertexId>, IntersectError> {
    if !model.vertices.contains_key(w) {
        return Ok(None);
    }
    let (va, vb) = model.eu_endpoints(eu)?;
    if w == va || w == vb {
        return Ok(None);
    }
    let p = model.point_of(w)?;
    let (a, b) = model.eu_points(eu)?;
    let kept = match point_segment_3d(&p, &a, &b, tol) {
        SegmentProximity::AtStart => va,
        SegmentProximity::AtEnd => vb,
        SegmentProximity::Interior { .. } => {
            split_edge(model, eu, Some(w), p)?;
            return Ok(Some(w));
        }
        SegmentProximity::Off { .. } => return Ok(None),
    };
    fuse_vertices(model, kept, w)?;
    kill_zero_length_edges(model, kept)?;
    Ok(Some(kept))
}

/// A wire use of `v` in shell `s`, if there is one.
fn wire_use(model: &Model, v: VertexId, s: ShellId) -> Result<Option<VertexUseId>, IntersectError> {
    for &vu in &model.vertex(v)?.uses {
        if model.vu_face_use(vu)?.is_none() && model.vu_shell(vu)? == s {
            return Ok(Some(vu));
        }
    }
    Ok(None)
}

fn enlist_wire_vertex(ctx: &mut IntersectContext, model: &mut Model, v: VertexId) -> Result<(), IntersectError> {
    let (Some(vu1), Some(vu2)) = (wire_use(model, v, ctx.s1)?, wire_use(model, v, ctx.s2)?) else {
        return Ok(());
    };
    let dist = ctx.line.distance_of(&model.point_of(v)?);
    ctx.enlist(model, vu1, Some(vu2), dist)?;
    Ok(())
}

/// A lone vertex against a wire edge of another shell. Returns `None` when
/// the vertex is off the edge or already one of its ends.
fn vertex_on_edge(
    model: &mut Model,
    cfg: &IntersectConfig,
    vu: VertexUseId,
    eu: EdgeUseId,
) -> Result<Option<IntersectOutcome>, IntersectError> {
    if !model.vertex_uses.contains_key(vu) || !model.edge_uses.contains_key(eu) {
        return Ok(None);
    }
    let tol = cfg.tol;
    let w = model.vu_vertex(vu)?;
    let Some(v) = vertex_onto(model, &tol, w, eu)? else {
        return Ok(None);
    };
    let (a, b) = model.eu_points(eu)?;
    let dir = (b - a).normalized().ok_or(Invariant::NoLineDirection)?;
    let p = model.point_of(v)?;
    let mut ctx = IntersectContext::new(
        *cfg,
        (model.vu_shell(vu)?, None),
        (model.eu_shell(eu)?, None),
        IntersectLine { pt: p, dir },
    );
    let dual = wire_use(model, v, ctx.s2)?;
    ctx.enlist(model, vu, dual, 0.0)?;
    debug!(?vu, ?eu, ?v, "lone vertex on wire edge");
    Ok(Some(IntersectOutcome::Point(ctx.into_report())))
}

/// Two lone vertices from different shells within tolerance become one.
fn vertex_pair(
    model: &mut Model,
    cfg: &IntersectConfig,
    vu1: VertexUseId,
    vu2: VertexUseId,
) -> Result<Option<IntersectOutcome>, IntersectError> {
    if !model.vertex_uses.contains_key(vu1) || !model.vertex_uses.contains_key(vu2) {
        return Ok(None);
    }
    let v1 = model.vu_vertex(vu1)?;
    let v2 = model.vu_vertex(vu2)?;
    let p = model.point_of(v1)?;
    if v1 == v2 || !cfg.tol.points_coincident(&p, &model.point_of(v2)?) {
        return Ok(None);
    }
    fuse_vertices(model, v1, v2)?;
    // No line runs through a single point; any unit direction will do.
    let mut ctx = IntersectContext::new(
        *cfg,
        (model.vu_shell(vu1)?, None),
        (model.vu_shell(vu2)?, None),
        IntersectLine { pt: p, dir: Vec3::X },
    );
    ctx.enlist(model, vu1, Some(vu2), 0.0)?;
    debug!(?v1, ?v2, "fused lone vertices");
    Ok(Some(IntersectOutcome::Point(ctx.into_report())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intersect::cutter::RecordingCutter;
    use crate::topology::primitives::{make_box_shell, make_lone_vertex, make_shell, make_wire_edge};

    fn cfg() -> IntersectConfig {
        IntersectConfig::new(Tol::new(1e-6).unwrap())
    }

    fn wire(model: &mut Model, shell: ShellId, a: (f64, f64, f64), b: (f64, f64, f64)) -> EdgeUseId {
        let va = model.insert_vertex(Point3d::new(a.0, a.1, a.2));
        let vb = model.insert_vertex(Point3d::new(b.0, b.1, b.2));
        make_wire_edge(model, shell, va, vb).unwrap()
    }

    #[test]
    fn test_same_shell_is_rejected() {
        let mut model = Model::new();
        let s = make_shell(&mut model);
        let mut cutter = RecordingCutter::new();
        let err = intersect_shells(&mut model, &cfg(), s, s, &mut cutter).unwrap_err();
        assert!(!err.is_invariant());
    }

    #[test]
    fn test_far_shells_report_nothing() {
        let mut model = Model::new();
        let solid = make_box_shell(&mut model, Point3d::ORIGIN, Point3d::new(1.0, 1.0, 1.0)).unwrap();
        let w = make_shell(&mut model);
        wire(&mut model, w, (5.0, 5.0, 5.0), (6.0, 5.0, 5.0));
        let mut cutter = RecordingCutter::new();
        let report = intersect_shells(&mut model, &cfg(), solid, w, &mut cutter).unwrap();
        assert_eq!(report, ShellsReport::default());
        assert!(cutter.requests.is_empty());
    }

    #[test]
    fn test_crossing_wires_share_a_new_vertex() {
        let mut model = Model::new();
        let s1 = make_shell(&mut model);
        let s2 = make_shell(&mut model);
        let eu1 = wire(&mut model, s1, (0.0, 0.0, 0.0), (2.0, 0.0, 0.0));
        let eu2 = wire(&mut model, s2, (1.0, -1.0, 0.0), (1.0, 1.0, 0.0));
        let mut cutter = RecordingCutter::new();
        let report = intersect_shells(&mut model, &cfg(), s1, s2, &mut cutter).unwrap();

        assert_eq!(report.wires.len(), 1);
        let IntersectOutcome::Point(pair) = &report.wires[0] else {
            panic!("expected a crossing point");
        };
        assert_eq!((pair.list1.len(), pair.list2.len()), (1, 1));
        let v = model.vu_vertex(pair.list1.vertex_uses()[0]).unwrap();
        assert_eq!(model.vu_vertex(pair.list2.vertex_uses()[0]).unwrap(), v);
        assert_eq!(model.point_of(v).unwrap(), Point3d::new(1.0, 0.0, 0.0));
        assert_eq!(model.eu_endpoints(eu1).unwrap().1, v);
        assert_eq!(model.eu_endpoints(eu2).unwrap().1, v);
        assert_eq!(model.shell_wire_edges(s1).unwrap().len(), 2);
        assert_eq!(model.shell_wire_edges(s2).unwrap().len(), 2);
    }

    #[test]
    fn test_wire_ending_on_another_splits_it() {
        let mut model = Model::new();
        let s1 = make_shell(&mut model);
        let s2 = make_shell(&mut model);
        let eu1 = wire(&mut model, s1, (0.0, 0.0, 0.0), (2.0, 0.0, 0.0));
        let eu2 = wire(&mut model, s2, (1.0, 0.0, 0.0), (1.0, 1.0, 0.0));
        let tip = model.eu_endpoints(eu2).unwrap().0;
        let mut cutter = RecordingCutter::new();
        intersect_shells(&mut model, &cfg(), s1, s2, &mut cutter).unwrap();

        assert_eq!(model.eu_endpoints(eu1).unwrap().1, tip);
        assert_eq!(model.shell_wire_edges(s1).unwrap().len(), 2);
        assert_eq!(model.shell_wire_edges(s2).unwrap().len(), 1);
    }

    #[test]
    fn test_overlapping_wires_break_at_each_others_ends() {
        let mut model = Model::new();
        let s1 = make_shell(&mut model);
        let s2 = make_shell(&mut model);
        wire(&mut model, s1, (0.0, 0.0, 0.0), (2.0, 0.0, 0.0));
        wire(&mut model, s2, (1.0, 0.0, 0.0), (3.0, 0.0, 0.0));
        let mut cutter = RecordingCutter::new();
        let report = intersect_shells(&mut model, &cfg(), s1, s2, &mut cutter).unwrap();

        assert!(report.wires.iter().any(|o| matches!(o, IntersectOutcome::Line(_))));
        // 0..1 and 1..2 in the first shell, 1..2 and 2..3 in the second,
        // with the common piece joined into one edge.
        assert_eq!(model.shell_wire_edges(s1).unwrap().len(), 2);
        assert_eq!(model.shell_wire_edges(s2).unwrap().len(), 2);
        let shared = model
            .edges
            .values()
            .filter(|e| {
                let shells: Vec<ShellId> = e.uses.iter().map(|&u| model.eu_shell(u).unwrap()).collect();
                shells.contains(&s1) && shells.contains(&s2)
            })
            .count();
        assert_eq!(shared, 1);
        assert_eq!(model.vertex_count(), 4);
    }

    #[test]
    fn test_lone_vertices_fuse() {
        let mut model = Model::new();
        let s1 = make_shell(&mut model);
        let s2 = make_shell(&mut model);
        let vu1 = make_lone_vertex(&mut model, s1, Point3d::new(1.0, 1.0, 1.0)).unwrap();
        let vu2 = make_lone_vertex(&mut model, s2, Point3d::new(1.0, 1.0, 1.0 + 1e-8)).unwrap();
        let mut cutter = RecordingCutter::new();
        let report = intersect_shells(&mut model, &cfg(), s1, s2, &mut cutter).unwrap();

        assert_eq!(report.enlisted(), 2);
        assert_eq!(model.vu_vertex(vu1).unwrap(), model.vu_vertex(vu2).unwrap());
        assert_eq!(model.vertex_count(), 1);
    }
}
