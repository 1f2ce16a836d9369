use serde::{Deserialize, Serialize};

use super::brep::*;
use crate::geometry::point::Point3d;
use crate::geometry::predicates::{point_segment_3d, SegmentProximity};
use crate::geometry::surfaces::Plane;
use crate::Tol;

/// Position of a point relative to a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointClass {
    Inside,
    OnBoundary,
    Outside,
}

/// Classify `p` against face-use `fu`. Points off the face plane by more than
/// tolerance are outside. Edge loops flagged as holes subtract from the
/// region; a point loop counts only at its own location.
pub fn classify_point_in_face(model: &Model, fu: FaceUseId, p: &Point3d, tol: &Tol) -> Result<PointClass, TopologyError> {
    let plane = model.face_use_plane(fu)?;
    if plane.distance_to_point(p).abs() > tol.dist {
        return Ok(PointClass::Outside);
    }
    if !model.face_use_bbox(fu)?.expanded(tol.dist).contains_point(p) {
        return Ok(PointClass::Outside);
    }

    let mut in_outer = false;
    let mut in_hole = false;
    for &lu in &model.face_use(fu)?.loops {
        let lu = model.loop_use(lu)?;
        match &lu.kind {
            LoopKind::Point(vu) => {
                let q = model.point_of(model.vu_vertex(*vu)?)?;
                if tol.points_coincident(p, &q) {
                    return Ok(PointClass::OnBoundary);
                }
            }
            LoopKind::Edges(eus) => {
                let polygon = eus
                    .iter()
                    .map(|&eu| model.point_of(model.vu_vertex(model.edge_use(eu)?.start)?))
                    .collect::<Result<Vec<_>, _>>()?;
                if on_polygon_boundary(p, &polygon, tol) {
                    return Ok(PointClass::OnBoundary);
                }
                if polygon.len() >= 3 && polygon_contains(&plane, p, &polygon) {
                    if lu.hole {
                        in_hole = true;
                    } else {
                        in_outer = true;
                    }
                }
            }
        }
    }

    Ok(if in_outer && !in_hole {
        PointClass::Inside
    } else {
        PointClass::Outside
    })
}

fn on_polygon_boundary(p: &Point3d, polygon: &[Point3d], tol: &Tol) -> bool {
    (0..polygon.len()).any(|i| {
        let a = &polygon[i];
        let b = &polygon[(i + 1) % polygon.len()];
        !matches!(point_segment_3d(p, a, b, tol), SegmentProximity::Off { .. })
    })
}

/// Even-odd ray casting in the plane's own (u, v) frame.
fn polygon_contains(plane: &Plane, p: &Point3d, polygon: &[Point3d]) -> bool {
    let (px, py) = plane.parameters_of(p);
    let flat: Vec<(f64, f64)> = polygon.iter().map(|q| plane.parameters_of(q)).collect();
    let mut inside = false;
    let mut j = flat.len() - 1;
    for i in 0..flat.len() {
        let (xi, yi) = flat[i];
        let (xj, yj) = flat[j];
        if ((yi > py) != (yj > py)) && (px < (xj - xi) * (py - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}
