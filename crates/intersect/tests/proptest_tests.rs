//! Property-based tests for the intersection engine using the `proptest` crate.

use proptest::prelude::*;

use cad_intersect::geometry::point::Point3d;
use cad_intersect::geometry::vector::Vec3;
use cad_intersect::intersect::context::{IntersectContext, PairReport};
use cad_intersect::intersect::projection::ProjectionCache;
use cad_intersect::intersect::resolve::IntersectLine;
use cad_intersect::intersect::walker::repair_v_near_v;
use cad_intersect::topology::brep::{FaceUseId, VertexId, VertexUseId};
use cad_intersect::topology::primitives::{make_face, make_lone_vertex, make_shell};
use cad_intersect::{intersect_faces, IntersectConfig, IntersectError, IntersectOutcome, Invariant, Model, RecordingCutter, Tol};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

const TOL: f64 = 1e-6;

fn cfg() -> IntersectConfig {
    IntersectConfig::new(Tol::new(TOL).unwrap())
}

/// Where a vertical rectangle in the plane `x = c` sits against the unit
/// square on `z = 0`: its `c`, and its span in y.
fn arb_crossing() -> impl Strategy<Value = (f64, f64, f64)> {
    (0.05f64..0.95, -1.0f64..0.4, 0.6f64..2.0)
}

fn arb_angle() -> impl Strategy<Value = f64> {
    -std::f64::consts::PI..std::f64::consts::PI
}

fn face(model: &mut Model, pts: &[(f64, f64, f64)]) -> FaceUseId {
    let shell = make_shell(model);
    let pts: Vec<Point3d> = pts.iter().map(|&(x, y, z)| Point3d::new(x, y, z)).collect();
    make_face(model, shell, &pts).unwrap()
}

fn crossing_pair(model: &mut Model, c: f64, y0: f64, y1: f64) -> (FaceUseId, FaceUseId) {
    let a = face(model, &[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (1.0, 1.0, 0.0), (0.0, 1.0, 0.0)]);
    let b = face(model, &[(c, y0, -0.5), (c, y1, -0.5), (c, y1, 0.5), (c, y0, 0.5)]);
    (a, b)
}

fn line_report(outcome: IntersectOutcome) -> PairReport {
    match outcome {
        IntersectOutcome::Line(report) => report,
        other => panic!("expected a line outcome, got {other:?}"),
    }
}

fn vertices_of(model: &Model, report: &PairReport) -> (Vec<VertexId>, Vec<VertexId>) {
    let side = |vus: &[VertexUseId]| -> Vec<VertexId> { vus.iter().map(|&vu| model.vu_vertex(vu).unwrap()).collect() };
    (side(report.list1.vertex_uses()), side(report.list2.vertex_uses()))
}

// ---------------------------------------------------------------------------
// 1. Duality: every enlisted vertex-use has a use of its vertex in the other list
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn enlisted_uses_have_duals((c, y0, y1) in arb_crossing()) {
        let mut model = Model::new();
        let (a, b) = crossing_pair(&mut model, c, y0, y1);
        let mut cutter = RecordingCutter::new();
        let report = line_report(intersect_faces(&mut model, &cfg(), a, b, &mut cutter).unwrap());
        prop_assert!(!report.list1.is_empty());
        let (v1, v2) = vertices_of(&model, &report);
        for v in &v1 {
            prop_assert!(v2.contains(v), "vertex {:?} missing from list 2", v);
        }
        for v in &v2 {
            prop_assert!(v1.contains(v), "vertex {:?} missing from list 1", v);
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Shell exclusivity: each list holds only its own shell's uses, and a use
//    from a third shell is refused
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn lists_respect_shells((c, y0, y1) in arb_crossing()) {
        let mut model = Model::new();
        let (a, b) = crossing_pair(&mut model, c, y0, y1);
        let mut cutter = RecordingCutter::new();
        let report = line_report(intersect_faces(&mut model, &cfg(), a, b, &mut cutter).unwrap());
        let (s1, s2) = (model.face_uses[a].shell, model.face_uses[b].shell);
        for &vu in report.list1.vertex_uses() {
            prop_assert_eq!(model.vu_shell(vu).unwrap(), s1);
        }
        for &vu in report.list2.vertex_uses() {
            prop_assert_eq!(model.vu_shell(vu).unwrap(), s2);
        }
    }

    #[test]
    fn foreign_use_is_refused(x in -5.0f64..5.0, y in -5.0f64..5.0) {
        let mut model = Model::new();
        let (a, b) = crossing_pair(&mut model, 0.5, -0.5, 1.5);
        let stranger = make_shell(&mut model);
        let vu = make_lone_vertex(&mut model, stranger, Point3d::new(x, y, 0.0)).unwrap();
        let line = IntersectLine { pt: Point3d::ORIGIN, dir: Vec3::Y };
        let mut ctx = IntersectContext::new(
            cfg(),
            (model.face_uses[a].shell, Some(a)),
            (model.face_uses[b].shell, Some(b)),
            line,
        );
        let err = ctx.enlist(&mut model, vu, None, 0.0).unwrap_err();
        prop_assert!(err.is_invariant());
        let is_foreign = matches!(err, IntersectError::Invariant(Invariant::ForeignVertexUse { .. }));
        prop_assert!(is_foreign);
        prop_assert!(ctx.l1.is_empty() && ctx.l2.is_empty());
    }
}

// ---------------------------------------------------------------------------
// 3. Idempotence: a second pass over an intersected pair adds no topology
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn second_pass_is_idle((c, y0, y1) in arb_crossing()) {
        let mut model = Model::new();
        let (a, b) = crossing_pair(&mut model, c, y0, y1);
        let mut cutter = RecordingCutter::new();
        intersect_faces(&mut model, &cfg(), a, b, &mut cutter).unwrap();
        let (vertices, edges) = (model.vertex_count(), model.edge_count());
        intersect_faces(&mut model, &cfg(), a, b, &mut cutter).unwrap();
        prop_assert_eq!(model.vertex_count(), vertices);
        prop_assert_eq!(model.edge_count(), edges);
    }
}

// ---------------------------------------------------------------------------
// 4. Projection round-trip: project then unproject reproduces coplanar points
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn projection_round_trip(
        a in arb_angle(),
        b in arb_angle(),
        (ox, oy, oz) in (-100.0f64..100.0, -100.0f64..100.0, -100.0f64..100.0),
        s in 0.0f64..1.0,
        t in 0.0f64..1.0,
    ) {
        let u = Vec3::new(a.cos(), a.sin(), 0.0);
        let w = Vec3::new(-a.sin() * b.cos(), a.cos() * b.cos(), b.sin());
        let o = Point3d::new(ox, oy, oz);
        let corners = [o, o + u * 2.0, o + w * 2.0];

        let mut model = Model::new();
        let shell = make_shell(&mut model);
        let fu = make_face(&mut model, shell, &corners).unwrap();
        let p = o + u * s + w * t;
        let vu = make_lone_vertex(&mut model, shell, p).unwrap();
        let v = model.vu_vertex(vu).unwrap();

        let mut cache = ProjectionCache::new(cfg().tol, cfg().residual_factor);
        cache.prep_face(&model, fu).unwrap();
        let p2 = cache.project(&model, v).unwrap();
        let back = cache.unproject(&p2);
        prop_assert!(back.distance_to(&p) <= TOL, "{:?} came back as {:?}", p, back);
    }
}

// ---------------------------------------------------------------------------
// 5. Repair boundedness: fuse within ten tolerances, refuse beyond
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn repair_is_bounded(k in 0.1f64..30.0, (dx, dy, dz) in (-1.0f64..1.0, -1.0f64..1.0, -1.0f64..1.0)) {
        prop_assume!((k - 10.0).abs() > 0.1);
        let Some(dir) = Vec3::new(dx, dy, dz).normalized() else {
            return Ok(());
        };
        let mut model = Model::new();
        let (a, b) = crossing_pair(&mut model, 0.5, -0.5, 1.5);
        let shell = model.face_uses[a].shell;
        let origin = Point3d::new(7.0, 7.0, 7.0);
        let keep = make_lone_vertex(&mut model, shell, origin).unwrap();
        let drop = make_lone_vertex(&mut model, shell, origin + dir * (k * TOL)).unwrap();
        let (vk, vd) = (model.vu_vertex(keep).unwrap(), model.vu_vertex(drop).unwrap());

        let line = IntersectLine { pt: Point3d::ORIGIN, dir: Vec3::Y };
        let mut ctx = IntersectContext::new(
            cfg(),
            (shell, Some(a)),
            (model.face_uses[b].shell, Some(b)),
            line,
        );
        let result = repair_v_near_v(&mut ctx, &mut model, vk, vd);
        if k < 10.0 {
            prop_assert!(result.is_ok());
            prop_assert!(!model.vertices.contains_key(vd));
            prop_assert_eq!(model.vu_vertex(drop).unwrap(), vk);
        } else {
            let out_of_reach = matches!(
                result,
                Err(IntersectError::Invariant(Invariant::RepairOutOfReach { .. }))
            );
            prop_assert!(out_of_reach);
            prop_assert!(model.vertices.contains_key(vd));
        }
    }
}
