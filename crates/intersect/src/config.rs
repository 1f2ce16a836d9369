//! Engine configuration.

use crate::Tol;

/// Settings for one intersection run. A context copies these at creation and
/// never changes them afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectConfig {
    /// Distance tolerance used by every predicate.
    pub tol: Tol,
    /// Two independently computed crossing points closer than
    /// `repair_factor * tol.dist` are fused; farther apart is fatal.
    pub repair_factor: f64,
    /// Out-of-plane residual (in tolerance units) above which projecting a
    /// vertex onto a face is fatal.
    pub residual_factor: f64,
    /// Reach of the vertex fuse that starts the coplanar path, in tolerance units.
    pub coplanar_fuse_factor: f64,
}

impl IntersectConfig {
    pub fn new(tol: Tol) -> Self {
        Self {
            tol,
            repair_factor: 10.0,
            residual_factor: 10.0,
            coplanar_fuse_factor: 2.0,
        }
    }

    pub fn with_repair_factor(self, repair_factor: f64) -> Self {
        Self {
            repair_factor,
            ..self
        }
    }

    pub fn with_residual_factor(self, residual_factor: f64) -> Self {
        Self {
            residual_factor,
            ..self
        }
    }

    /// Largest separation the repair step will fuse.
    pub fn repair_reach(&self) -> f64 {
        self.repair_factor * self.tol.dist
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_reach() {
        let cfg = IntersectConfig::new(Tol::new(0.01).unwrap());
        assert!((cfg.repair_reach() - 0.1).abs() < 1e-12);
        let strict = cfg.with_repair_factor(2.0);
        assert!((strict.repair_reach() - 0.02).abs() < 1e-12);
        assert_eq!(strict.tol, cfg.tol);
    }
}
