use nalgebra::{Isometry3, Rotation3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::point::Point3d;
use super::vector::Vec3;

// ─── Rigid Frames ───────────────────────────────────────────────────────────

/// A rigid motion from model space into a local working frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidFrame {
    iso: Isometry3<f64>,
}

impl RigidFrame {
    pub fn identity() -> Self {
        Self {
            iso: Isometry3::identity(),
        }
    }

    /// Frame in which `normal` maps to +Z and `center` (after rotation) has
    /// its X/Y moved to the origin. Z keeps `z_offset` subtracted so that
    /// points on the plane land near z = 0.
    pub fn plane_to_xy(normal: &Vec3, center: &Point3d, z_offset: f64) -> Self {
        let rotation = rotation_onto(normal, &Vector3::z());
        let c = rotation * center.to_na();
        let translation = Translation3::new(-c.x, -c.y, -z_offset);
        Self {
            iso: Isometry3::from_parts(translation, UnitQuaternion::from_rotation_matrix(&rotation)),
        }
    }

    /// Frame in which `direction` maps to +X and `origin` to the origin.
    pub fn line_to_x(origin: &Point3d, direction: &Vec3) -> Self {
        let rotation = rotation_onto(direction, &Vector3::x());
        let o = rotation * origin.to_na();
        let translation = Translation3::new(-o.x, -o.y, -o.z);
        Self {
            iso: Isometry3::from_parts(translation, UnitQuaternion::from_rotation_matrix(&rotation)),
        }
    }

    pub fn to_local(&self, p: &Point3d) -> Point3d {
        Point3d::from_na(&self.iso.transform_point(&p.to_na()))
    }

    pub fn to_local_dir(&self, v: &Vec3) -> Vec3 {
        Vec3::from_na(&self.iso.transform_vector(&v.to_na()))
    }

    pub fn to_world(&self, p: &Point3d) -> Point3d {
        Point3d::from_na(&self.iso.inverse_transform_point(&p.to_na()))
    }
}

/// Rotation taking `from` onto the unit axis `to`. Antiparallel inputs get a
/// half turn about an axis perpendicular to `to`.
fn rotation_onto(from: &Vec3, to: &Vector3<f64>) -> Rotation3<f64> {
    let f = from.to_na();
    Rotation3::rotation_between(&f, to).unwrap_or_else(|| {
        let perp = if to.x.abs() < 0.9 { Vector3::x_axis() } else { Vector3::y_axis() };
        Rotation3::from_axis_angle(&perp, std::f64::consts::PI)
    })
}

// ─── Bounding Boxes ─────────────────────────────────────────────────────────

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3d,
    pub max: Point3d,
}

impl BoundingBox {
    pub fn new(min: Point3d, max: Point3d) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Point3d::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3d::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3d>) -> Self {
        let mut bb = Self::empty();
        for p in points {
            bb.expand_to_include(p);
        }
        bb
    }

    pub fn expand_to_include(&mut self, p: &Point3d) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(&other.min),
            max: self.max.max(&other.max),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// The overlap of two boxes; empty when they are apart.
    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            min: self.min.max(&other.min),
            max: self.max.min(&other.max),
        }
    }

    pub fn contains_point(&self, p: &Point3d) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    pub fn center(&self) -> Point3d {
        self.min.midpoint(&self.max)
    }

    pub fn expanded(&self, margin: f64) -> Self {
        let m = Vec3::new(margin, margin, margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Slab test of the line `origin + t * dir`. Returns the entry and exit
    /// parameters `(t_min, t_max)`, or `None` if the line misses the box.
    /// Axes where `dir` is near zero only check that the origin is inside
    /// the slab.
    pub fn line_span(&self, origin: &Point3d, dir: &Vec3) -> Option<(f64, f64)> {
        let mut t_min = f64::NEG_INFINITY;
        let mut t_max = f64::INFINITY;
        for axis in 0..3 {
            let o = origin.axis(axis);
            let d = dir.axis(axis);
            let (lo, hi) = (self.min.axis(axis), self.max.axis(axis));
            if d.abs() < 1e-20 {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let mut t0 = (lo - o) / d;
            let mut t1 = (hi - o) / d;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some((t_min, t_max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_plane_frame_flattens_plane() {
        let normal = Vec3::new(1.0, 1.0, 0.0).normalized().unwrap();
        let center = Point3d::new(1.0, 1.0, 0.0);
        let offset = normal.dot(&center.to_vec3());
        let frame = RigidFrame::plane_to_xy(&normal, &center, offset);

        let on_plane = Point3d::new(2.0, 0.0, 5.0);
        let local = frame.to_local(&on_plane);
        assert!(local.z.abs() < 1e-12);
        assert_abs_diff_eq!(frame.to_world(&local), on_plane, epsilon = 1e-12);
        assert_abs_diff_eq!(frame.to_local_dir(&normal), Vec3::Z, epsilon = 1e-12);
    }

    #[test]
    fn test_plane_frame_antiparallel_normal() {
        let frame = RigidFrame::plane_to_xy(&(-Vec3::Z), &Point3d::ORIGIN, 0.0);
        assert_abs_diff_eq!(frame.to_local_dir(&(-Vec3::Z)), Vec3::Z, epsilon = 1e-12);
    }

    #[test]
    fn test_line_frame() {
        let dir = Vec3::new(0.0, 3.0, 4.0).normalized().unwrap();
        let origin = Point3d::new(1.0, 2.0, 3.0);
        let frame = RigidFrame::line_to_x(&origin, &dir);
        assert_abs_diff_eq!(frame.to_local(&origin), Point3d::ORIGIN, epsilon = 1e-12);
        let local = frame.to_local(&(origin + dir * 2.0));
        assert_abs_diff_eq!(local, Point3d::new(2.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_bounding_box_intersects() {
        let a = BoundingBox::new(Point3d::new(0.0, 0.0, 0.0), Point3d::new(2.0, 2.0, 2.0));
        let b = BoundingBox::new(Point3d::new(1.0, 1.0, 1.0), Point3d::new(3.0, 3.0, 3.0));
        let c = BoundingBox::new(Point3d::new(5.0, 5.0, 5.0), Point3d::new(6.0, 6.0, 6.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(BoundingBox::empty().is_empty());
    }

    #[test]
    fn test_line_span() {
        let bb = BoundingBox::new(Point3d::new(0.0, 0.0, 0.0), Point3d::new(1.0, 1.0, 1.0));
        let (t0, t1) = bb
            .line_span(&Point3d::new(-1.0, 0.5, 0.5), &Vec3::X)
            .unwrap();
        assert!((t0 - 1.0).abs() < 1e-12);
        assert!((t1 - 2.0).abs() < 1e-12);
        assert!(bb.line_span(&Point3d::new(-1.0, 2.0, 0.5), &Vec3::X).is_none());
    }
}
