pub mod config;
pub mod geometry;
pub mod intersect;
pub mod topology;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use config::IntersectConfig;
pub use intersect::cutter::{FaceCutter, RecordingCutter};
pub use intersect::error::{IntersectError, Invariant};
pub use intersect::face_face::{intersect_faces, IntersectOutcome};
pub use intersect::edge_face::intersect_edge_face;
pub use intersect::shells::{intersect_shells, ShellsReport};
pub use intersect::vertex_face::intersect_vertex_face;
pub use topology::brep::Model;

/// The tolerance record shared by every predicate and comparison. Has no
/// `Default`; callers supply the model's tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tol {
    /// Distances at or below this are treated as zero.
    pub dist: f64,
    /// `dist * dist`, for comparisons against squared distances.
    pub dist_sq: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum ToleranceError {
    #[error("tolerance distance must be finite and positive, got {0}")]
    InvalidDistance(f64),
    #[error("squared tolerance {dist_sq} does not match distance {dist}")]
    Mismatch { dist: f64, dist_sq: f64 },
}

impl Tol {
    pub fn new(dist: f64) -> Result<Self, ToleranceError> {
        if !dist.is_finite() || dist <= 0.0 {
            return Err(ToleranceError::InvalidDistance(dist));
        }
        Ok(Self {
            dist,
            dist_sq: dist * dist,
        })
    }

    /// Accepts an explicitly supplied pair, checked for consistency.
    pub fn from_parts(dist: f64, dist_sq: f64) -> Result<Self, ToleranceError> {
        let tol = Self::new(dist)?;
        if (tol.dist_sq - dist_sq).abs() > tol.dist_sq * 1e-6 {
            return Err(ToleranceError::Mismatch { dist, dist_sq });
        }
        Ok(Self { dist, dist_sq })
    }

    pub fn is_zero(&self, length: f64) -> bool {
        length.abs() <= self.dist
    }

    pub fn points_coincident(&self, a: &geometry::point::Point3d, b: &geometry::point::Point3d) -> bool {
        a.distance_squared_to(b) <= self.dist_sq
    }
}
