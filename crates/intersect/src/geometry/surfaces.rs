use serde::{Deserialize, Serialize};

use super::point::Point3d;
use super::vector::Vec3;

/// An infinite plane in normal/offset form: `normal . p == offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vec3,
    pub offset: f64,
}

impl Plane {
    pub fn from_point_normal(point: Point3d, normal: Vec3) -> Option<Self> {
        let normal = normal.normalized()?;
        Some(Self {
            normal,
            offset: normal.dot(&point.to_vec3()),
        })
    }

    /// Best-fit plane of a closed polygon using Newell's method. The normal
    /// follows the right-hand rule over the point order. `None` for fewer than
    /// three points or a polygon with no area.
    pub fn newell(points: &[Point3d]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }
        let mut n = Vec3::ZERO;
        let mut centroid = Vec3::ZERO;
        for (i, a) in points.iter().enumerate() {
            let b = points[(i + 1) % points.len()];
            n.x += (a.y - b.y) * (a.z + b.z);
            n.y += (a.z - b.z) * (a.x + b.x);
            n.z += (a.x - b.x) * (a.y + b.y);
            centroid = centroid + a.to_vec3();
        }
        let centroid = centroid / points.len() as f64;
        let normal = n.normalized()?;
        Some(Self {
            normal,
            offset: normal.dot(&centroid),
        })
    }

    /// Signed distance, positive on the side the normal points to.
    pub fn distance_to_point(&self, p: &Point3d) -> f64 {
        self.normal.dot(&p.to_vec3()) - self.offset
    }

    pub fn project_point(&self, p: &Point3d) -> Point3d {
        *p - self.normal * self.distance_to_point(p)
    }

    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            offset: -self.offset,
        }
    }

    /// An orthonormal in-plane basis `(u, v)` with `u x v == normal`.
    pub fn basis(&self) -> (Vec3, Vec3) {
        let seed = if self.normal.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
        let u = seed.reject_from(&self.normal);
        let u = u / u.length();
        let v = self.normal.cross(&u);
        (u, v)
    }

    /// In-plane coordinates of `p` in the `basis()` frame.
    pub fn parameters_of(&self, p: &Point3d) -> (f64, f64) {
        let (u, v) = self.basis();
        let w = p.to_vec3();
        (w.dot(&u), w.dot(&v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newell_ccw_square() {
        let pts = [
            Point3d::new(0.0, 0.0, 2.0),
            Point3d::new(1.0, 0.0, 2.0),
            Point3d::new(1.0, 1.0, 2.0),
            Point3d::new(0.0, 1.0, 2.0),
        ];
        let plane = Plane::newell(&pts).unwrap();
        assert!((plane.normal.z - 1.0).abs() < 1e-12);
        assert!((plane.offset - 2.0).abs() < 1e-12);
        assert!(plane.distance_to_point(&Point3d::new(0.3, 0.3, 2.5)) > 0.0);
    }

    #[test]
    fn test_newell_rejects_collinear() {
        let pts = [
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(1.0, 0.0, 0.0),
            Point3d::new(2.0, 0.0, 0.0),
        ];
        assert!(Plane::newell(&pts).is_none());
    }

    #[test]
    fn test_basis_is_orthonormal() {
        let plane = Plane::from_point_normal(Point3d::ORIGIN, Vec3::new(1.0, 2.0, 3.0)).unwrap();
        let (u, v) = plane.basis();
        assert!(u.dot(&v).abs() < 1e-12);
        assert!(u.dot(&plane.normal).abs() < 1e-12);
        assert!((u.cross(&v).dot(&plane.normal) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_project_point() {
        let plane = Plane::from_point_normal(Point3d::new(0.0, 0.0, 1.0), Vec3::Z).unwrap();
        let p = plane.project_point(&Point3d::new(4.0, 5.0, 9.0));
        assert!((p.z - 1.0).abs() < 1e-12);
        assert!((p.x - 4.0).abs() < 1e-12);
    }
}
