use thiserror::Error;

use crate::topology::brep::{EdgeGeomId, FaceUseId, ShellId, TopologyError, VertexId, VertexUseId};

/// Failure of an intersection run. Every variant aborts the run; the model
/// may be left partially edited and the boolean driver must discard it.
#[derive(Debug, Error)]
pub enum IntersectError {
    /// A broken engine invariant: corrupt topology or geometry.
    #[error("intersection invariant violated: {0}")]
    Invariant(#[from] Invariant),

    /// A topology edit was refused.
    #[error("topology edit failed: {0}")]
    Topology(#[from] TopologyError),
}

impl IntersectError {
    pub fn is_invariant(&self) -> bool {
        matches!(self, IntersectError::Invariant(_))
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum Invariant {
    #[error("vertex-use {vu:?} is reachable from neither shell {s1:?} nor {s2:?}")]
    ForeignVertexUse {
        vu: VertexUseId,
        s1: ShellId,
        s2: ShellId,
    },

    #[error("vertex-use {vu:?} is not in face-use {expected:?}")]
    VertexUseOffFace { vu: VertexUseId, expected: FaceUseId },

    #[error("wire-side vertex-use {vu:?} lies in face-use {fu:?}")]
    WireVertexUseInFace { vu: VertexUseId, fu: Option<FaceUseId> },

    #[error("dual {dual:?} of {vu:?} rejected: {reason}")]
    DualMismatch {
        vu: VertexUseId,
        dual: VertexUseId,
        reason: &'static str,
    },

    #[error("vertex {vertex:?} projects {residual} off the face plane (limit {limit})")]
    ProjectionResidual {
        vertex: VertexId,
        residual: f64,
        limit: f64,
    },

    #[error("three-plane solve for the intersection line is singular")]
    SingularLine,

    #[error("faces are coplanar but not parallel")]
    CoplanarNotParallel,

    #[error("vertices {keep:?} and {drop:?} are {distance} apart, beyond repair reach {reach}")]
    RepairOutOfReach {
        keep: VertexId,
        drop: VertexId,
        distance: f64,
        reach: f64,
    },

    #[error("common-vertex search given the same line geometry {0:?} twice")]
    SameEdgeGeometry(EdgeGeomId),

    #[error("vertex {vertex:?} is {distance} off its edge line {geom:?}")]
    VertexOffEdgeLine {
        vertex: VertexId,
        geom: EdgeGeomId,
        distance: f64,
    },

    #[error("crossing reuses vertex {0:?}, an end of the edge it would split")]
    ZeroLengthSplit(VertexId),

    #[error("intersection line has no direction")]
    NoLineDirection,

    #[error("projection requested before a face or edge was prepared")]
    ProjectionInactive,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invariant_is_distinguished() {
        let err: IntersectError = Invariant::SingularLine.into();
        assert!(err.is_invariant());
        let err: IntersectError = TopologyError::ZeroLengthEdge.into();
        assert!(!err.is_invariant());
        assert!(err.to_string().contains("zero-length"));
    }
}
