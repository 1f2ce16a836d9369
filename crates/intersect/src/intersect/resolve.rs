use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::error::{IntersectError, Invariant};
use crate::geometry::curves::Line3d;
use crate::geometry::point::Point3d;
use crate::geometry::predicates::three_plane_point;
use crate::geometry::surfaces::Plane;
use crate::geometry::vector::Vec3;
use crate::topology::brep::{FaceUseId, Model};
use crate::Tol;

/// The working line of a face pair: a start point and a unit direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntersectLine {
    pub pt: Point3d,
    pub dir: Vec3,
}

impl IntersectLine {
    pub fn at(&self, t: f64) -> Point3d {
        self.pt + self.dir * t
    }

    /// Signed distance of the foot of `p` from the start point.
    pub fn distance_of(&self, p: &Point3d) -> f64 {
        (*p - self.pt).dot(&self.dir)
    }

    pub fn as_line(&self) -> Line3d {
        Line3d {
            origin: self.pt,
            direction: self.dir,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    Line(IntersectLine),
    /// Same plane within tolerance.
    Coplanar,
    /// Parallel planes that are apart.
    ParallelDistinct,
    /// The three-plane solve for the start point was singular.
    Degenerate,
}

/// Decide how the planes of `fu1` and `fu2` meet.
///
/// A returned line starts on the axis-aligned plane through the minimum
/// corner of both faces' vertices, with its direction's dominant component
/// positive, so every vertex of either face sits at a non-negative distance
/// along it.
#[instrument(skip(model, tol))]
pub fn resolve_line(model: &Model, fu1: FaceUseId, fu2: FaceUseId, tol: &Tol) -> Result<Resolution, IntersectError> {
    if model.face_use_geom(fu1)? == model.face_use_geom(fu2)? {
        return Ok(Resolution::Coplanar);
    }
    let pl1 = model.face_use_plane(fu1)?;
    let pl2 = model.face_use_plane(fu2)?;

    let loop_pts1 = loop_start_points(model, fu1)?;
    let loop_pts2 = loop_start_points(model, fu2)?;
    let parallel = uniform_distance(&loop_pts1, &pl2, tol) && uniform_distance(&loop_pts2, &pl1, tol);

    let aligned_offset = if pl1.normal.dot(&pl2.normal) >= 0.0 {
        pl2.offset
    } else {
        -pl2.offset
    };
    let coplanar = all_within(model, fu2, &pl1, tol)?
        && all_within(model, fu1, &pl2, tol)?
        && (pl1.offset - aligned_offset).abs() <= tol.dist;

    match (coplanar, parallel) {
        (true, false) => return Err(Invariant::CoplanarNotParallel.into()),
        (true, true) => return Ok(Resolution::Coplanar),
        (false, true) => return Ok(Resolution::ParallelDistinct),
        (false, false) => {}
    }

    let mut rpp_min = Point3d::new(f64::MAX, f64::MAX, f64::MAX);
    for p in loop_pts1.iter().chain(&loop_pts2) {
        rpp_min = rpp_min.min(p);
    }

    let Some(mut dir) = pl1.normal.cross(&pl2.normal).normalized() else {
        return Ok(Resolution::Degenerate);
    };
    let axis = dir.dominant_axis();
    if dir.axis(axis) < 0.0 {
        dir = -dir;
    }
    let normal = match axis {
        0 => Vec3::X,
        1 => Vec3::Y,
        _ => Vec3::Z,
    };
    let start_plane = Plane {
        normal,
        offset: rpp_min.axis(axis),
    };
    let Some(pt) = three_plane_point(&pl1, &pl2, &start_plane) else {
        return Ok(Resolution::Degenerate);
    };

    debug!(?pt, ?dir, axis, "resolved intersection line");
    Ok(Resolution::Line(IntersectLine { pt, dir }))
}

fn loop_start_points(model: &Model, fu: FaceUseId) -> Result<Vec<Point3d>, IntersectError> {
    let mut out = Vec::new();
    for eu in model.face_edge_uses(fu)? {
        out.push(model.point_of(model.vu_vertex(model.edge_use(eu)?.start)?)?);
    }
    Ok(out)
}

/// Each distance must stay within tolerance of the running mean, which
/// includes the distance itself.
fn uniform_distance(points: &[Point3d], plane: &Plane, tol: &Tol) -> bool {
    let mut total = 0.0;
    for (i, p) in points.iter().enumerate() {
        let d = plane.distance_to_point(p);
        total += d;
        let mean = total / (i + 1) as f64;
        if (d - mean).abs() > tol.dist {
            return false;
        }
    }
    true
}

fn all_within(model: &Model, fu: FaceUseId, plane: &Plane, tol: &Tol) -> Result<bool, IntersectError> {
    for v in model.face_vertices(fu)? {
        if plane.distance_to_point(&model.point_of(v)?).abs() > tol.dist {
            return Ok(false);
        }
    }
    Ok(true)
}
