use serde::{Deserialize, Serialize};

use super::point::Point3d;
use super::vector::Vec3;
use crate::Tol;

/// An infinite line with a unit direction. This is the geometry carried by
/// every edge in the kernel and by the working line of an intersection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line3d {
    pub origin: Point3d,
    pub direction: Vec3,
}

impl Line3d {
    /// Returns `None` when `direction` has no usable length.
    pub fn new(origin: Point3d, direction: Vec3) -> Option<Self> {
        direction
            .normalized()
            .map(|direction| Self { origin, direction })
    }

    /// The line through `a` toward `b`.
    pub fn through(a: Point3d, b: Point3d) -> Option<Self> {
        Self::new(a, b - a)
    }

    pub fn evaluate(&self, t: f64) -> Point3d {
        self.origin + self.direction * t
    }

    /// Signed distance of the foot of `p` from the origin along the line.
    pub fn parameter_of(&self, p: &Point3d) -> f64 {
        (*p - self.origin).dot(&self.direction)
    }

    pub fn closest_point(&self, p: &Point3d) -> (Point3d, f64) {
        let t = self.parameter_of(p);
        (self.evaluate(t), t)
    }

    pub fn distance_squared_to_point(&self, p: &Point3d) -> f64 {
        let (closest, _) = self.closest_point(p);
        p.distance_squared_to(&closest)
    }

    pub fn distance_to_point(&self, p: &Point3d) -> f64 {
        self.distance_squared_to_point(p).sqrt()
    }

    /// Whether `p` lies on the line within tolerance.
    pub fn contains(&self, p: &Point3d, tol: &Tol) -> bool {
        self.distance_squared_to_point(p) <= tol.dist_sq
    }

    /// Two lines are colinear when each one's origin lies on the other and
    /// the directions agree over `span`, the length of interest.
    pub fn is_colinear_with(&self, other: &Self, span: f64, tol: &Tol) -> bool {
        if !self.contains(&other.origin, tol) || !other.contains(&self.origin, tol) {
            return false;
        }
        let far = other.evaluate(span.max(1.0));
        self.contains(&far, tol)
    }

    pub fn reversed(&self) -> Self {
        Self {
            origin: self.origin,
            direction: -self.direction,
        }
    }
}
