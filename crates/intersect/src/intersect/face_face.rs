use serde::Serialize;
use tracing::{debug, error, info, instrument, trace, warn, Level};

use super::context::{IntersectContext, PairReport};
use super::coplanar::intersect_coplanar;
use super::cutter::FaceCutter;
use super::error::{IntersectError, Invariant};
use super::resolve::{resolve_line, Resolution};
use super::walker::isect_line_face;
use crate::config::IntersectConfig;
use crate::topology::brep::{FaceUseId, Model};

/// How one pair of boundary pieces met.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum IntersectOutcome {
    /// Bounding boxes are apart, or the pieces miss each other.
    NoOverlap,
    /// Parallel planes that are apart.
    ParallelDistinct,
    /// The edge was already an edge of the face.
    SharedTopology,
    /// A single crossing point (an edge piercing a face, or a vertex on one).
    Point(PairReport),
    /// Crossings along one line, handed to the cutter.
    Line(PairReport),
    /// Coplanar faces: one report per edge handed to the cutter.
    Coplanar(Vec<PairReport>),
}

impl IntersectOutcome {
    /// Vertex-uses enlisted on both sides.
    pub fn enlisted(&self) -> usize {
        match self {
            IntersectOutcome::Point(r) | IntersectOutcome::Line(r) => r.enlisted(),
            IntersectOutcome::Coplanar(rs) => rs.iter().map(PairReport::enlisted).sum(),
            _ => 0,
        }
    }
}

/// Intersect two faces and make the result shared topology.
///
/// Every crossing of the faces' common line with either face's boundary
/// becomes a vertex used by both faces, listed in order along the line, and
/// the lists are handed to `cutter`. On an error the model may be partly
/// edited and should be discarded.
#[instrument(skip(model, cfg, cutter))]
pub fn intersect_faces(
    model: &mut Model,
    cfg: &IntersectConfig,
    fu1: FaceUseId,
    fu2: FaceUseId,
    cutter: &mut dyn FaceCutter,
) -> Result<IntersectOutcome, IntersectError> {
    let result = face_pair(model, cfg, fu1, fu2, cutter);
    match &result {
        Ok(outcome) => info!(enlisted = outcome.enlisted(), "face pair intersected"),
        Err(err) => report_failure(model, err),
    }
    result
}

pub(crate) fn face_pair(
    model: &mut Model,
    cfg: &IntersectConfig,
    fu1: FaceUseId,
    fu2: FaceUseId,
    cutter: &mut dyn FaceCutter,
) -> Result<IntersectOutcome, IntersectError> {
    let tol = cfg.tol;
    let box1 = model.face_use_bbox(fu1)?.expanded(tol.dist);
    let box2 = model.face_use_bbox(fu2)?.expanded(tol.dist);
    if !box1.intersects(&box2) {
        debug!("face boxes apart");
        return Ok(IntersectOutcome::NoOverlap);
    }

    match resolve_line(model, fu1, fu2, &tol)? {
        Resolution::ParallelDistinct => Ok(IntersectOutcome::ParallelDistinct),
        Resolution::Degenerate => Err(Invariant::SingularLine.into()),
        Resolution::Coplanar => {
            let reports = intersect_coplanar(model, cfg, fu1, fu2, cutter)?;
            Ok(IntersectOutcome::Coplanar(reports))
        }
        Resolution::Line(line) => {
            let s1 = model.face_use(fu1)?.shell;
            let s2 = model.face_use(fu2)?.shell;
            let mut ctx = IntersectContext::new(*cfg, (s1, Some(fu1)), (s2, Some(fu2)), line);
            isect_line_face(&mut ctx, model, fu1, Some(fu2))?;
            isect_line_face(&mut ctx, model, fu2, Some(fu1))?;
            Ok(IntersectOutcome::Line(cut_and_report(ctx, model, cutter)?))
        }
    }
}

/// Hand non-empty lists to the cutter and close the context.
pub(crate) fn cut_and_report(
    mut ctx: IntersectContext,
    model: &mut Model,
    cutter: &mut dyn FaceCutter,
) -> Result<PairReport, IntersectError> {
    ctx.purge_dead(model);
    if !ctx.l1.is_empty() || !ctx.l2.is_empty() {
        let request = ctx.cut_request();
        ctx.on_eg = cutter.cut(model, &request)?;
    }
    Ok(ctx.into_report())
}

/// Log an aborted run. Invariant failures also dump the model at TRACE.
pub(crate) fn report_failure(model: &Model, err: &IntersectError) {
    if !err.is_invariant() {
        warn!(%err, "intersection aborted by a topology edit");
        return;
    }
    error!(%err, "intersection invariant violated");
    if tracing::enabled!(Level::TRACE) {
        match model.snapshot_json() {
            Ok(snapshot) => trace!(%snapshot, "model at failure"),
            Err(e) => warn!(%e, "model snapshot failed"),
        }
    }
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

    fn face(model: &mut Model, pts: &[(f64, f64, f64)]) -> FaceUseId {
        let shell = make_shell(model);
        let pts: Vec<Point3d> = pts.iter().map(|&(x, y, z)| Point3d::new(x, y, z)).collect();
        make_face(model, shell, &pts).unwrap()
    }

    #[test]
    fn test_far_faces_do_not_overlap() {
        let mut model = Model::new();
        let a = face(&mut model, &[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (1.0, 1.0, 0.0)]);
        let b = face(&mut model, &[(5.0, 0.0, 0.0), (5.0, 1.0, 0.0), (5.0, 1.0, 1.0)]);
        let mut cutter = RecordingCutter::new();
        let outcome = intersect_faces(&mut model, &cfg(), a, b, &mut cutter).unwrap();
        assert_eq!(outcome, IntersectOutcome::NoOverlap);
        assert!(cutter.requests.is_empty());
    }

    #[test]
    fn test_parallel_faces_are_distinct() {
        let mut model = Model::new();
        // Tilted so the boxes overlap even though the planes are apart.
        let a = face(&mut model, &[(0.0, 0.0, 0.0), (1.0, 0.0, -1.0), (1.0, 1.0, -1.0)]);
        let b = face(&mut model, &[(0.0, 0.0, 0.5), (1.0, 0.0, -0.5), (1.0, 1.0, -0.5)]);
        let mut cutter = RecordingCutter::new();
        let outcome = intersect_faces(&mut model, &cfg(), a, b, &mut cutter).unwrap();
        assert_eq!(outcome, IntersectOutcome::ParallelDistinct);
    }

    #[test]
    fn test_crossing_faces_reach_the_cutter() {
        let mut model = Model::new();
        let a = face(&mut model, &[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (1.0, 1.0, 0.0), (0.0, 1.0, 0.0)]);
        let b = face(&mut model, &[(0.5, -0.5, -0.5), (0.5, 1.5, -0.5), (0.5, 1.5, 0.5), (0.5, -0.5, 0.5)]);
        let mut cutter = RecordingCutter::new();
        let outcome = intersect_faces(&mut model, &cfg(), a, b, &mut cutter).unwrap();
        let IntersectOutcome::Line(report) = outcome else {
            panic!("expected a line outcome");
        };
        assert_eq!(report.list1.len(), 2);
        assert_eq!(report.list2.len(), 2);
        assert_eq!(cutter.requests.len(), 1);
        assert_eq!(cutter.requests[0].fu1, Some(a));
    }
}
