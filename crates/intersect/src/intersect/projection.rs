//! Lazily filled 2D coordinates of vertices, in the frame of the face (or
//! wire edge) currently being walked.

use tracing::{debug, trace};

use super::error::{IntersectError, Invariant};
use crate::geometry::point::{Point2d, Point3d};
use crate::geometry::surfaces::Plane;
use crate::geometry::transform::RigidFrame;
use crate::geometry::vector::{Vec2, Vec3};
use crate::topology::brep::{EdgeId, EdgeUseId, FaceId, FaceUseId, Model, VertexId};
use crate::Tol;

/// What the cache is currently projecting onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionTarget {
    Face(FaceId),
    Edge(EdgeId),
}

#[derive(Debug, Clone)]
pub struct ProjectionCache {
    tol: Tol,
    residual_factor: f64,
    active: Option<ProjectionTarget>,
    frame: RigidFrame,
    /// Set in face mode, for the out-of-plane residual check.
    plane: Option<Plane>,
    /// Local coordinates by vertex index.
    slots: Vec<Option<Point3d>>,
}

impl ProjectionCache {
    pub fn new(tol: Tol, residual_factor: f64) -> Self {
        Self {
            tol,
            residual_factor,
            active: None,
            frame: RigidFrame::identity(),
            plane: None,
            slots: Vec::new(),
        }
    }

    pub fn active(&self) -> Option<ProjectionTarget> {
        self.active
    }

    /// Point the cache at the plane of `fu`. Returns false when it was already
    /// prepared for that face.
    pub fn prep_face(&mut self, model: &Model, fu: FaceUseId) -> Result<bool, IntersectError> {
        let face = model.face_use(fu)?.face;
        let target = ProjectionTarget::Face(face);
        if self.active == Some(target) {
            return Ok(false);
        }
        let plane = model.face_use_plane(fu)?;
        // Centering on the face keeps local coordinates small.
        let center = model.face_use_bbox(fu)?.center();
        self.frame = RigidFrame::plane_to_xy(&plane.normal, &center, plane.offset);
        self.plane = Some(plane);
        self.reset(model, target);
        Ok(true)
    }

    /// Point the cache at the line of the edge under `eu`.
    pub fn prep_edge(&mut self, model: &Model, eu: EdgeUseId) -> Result<bool, IntersectError> {
        let edge = model.edge_use(eu)?.edge;
        let target = ProjectionTarget::Edge(edge);
        if self.active == Some(target) {
            return Ok(false);
        }
        let line = model.eu_line(eu)?;
        self.frame = RigidFrame::line_to_x(&line.origin, &line.direction);
        self.plane = None;
        self.reset(model, target);
        Ok(true)
    }

    fn reset(&mut self, model: &Model, target: ProjectionTarget) {
        self.active = Some(target);
        self.slots.clear();
        self.slots.resize(2 * model.max_index().max(1), None);
        debug!(?target, slots = self.slots.len(), "projection cache prepared");
    }

    /// Forget the active target and every cached coordinate.
    pub fn release(&mut self) {
        self.active = None;
        self.plane = None;
        self.slots = Vec::new();
    }

    /// 2D coordinates of `v` in the active frame, computed once per vertex.
    pub fn project(&mut self, model: &Model, v: VertexId) -> Result<Point2d, IntersectError> {
        if self.active.is_none() {
            return Err(Invariant::ProjectionInactive.into());
        }
        let vertex = model.vertex(v)?;
        let index = vertex.index;
        if index >= self.slots.len() {
            let grown = (self.slots.len() * 4).max(index + 1);
            self.slots.resize(grown, None);
        }
        if let Some(local) = self.slots[index] {
            return Ok(Point2d::new(local.x, local.y));
        }

        let local = self.frame.to_local(&vertex.point);
        if let Some(plane) = &self.plane {
            if local.z.abs() > self.tol.dist {
                let off_plane = plane.distance_to_point(&vertex.point).abs();
                let limit = self.residual_factor * self.tol.dist;
                if off_plane > self.tol.dist && local.z.abs() > limit {
                    return Err(Invariant::ProjectionResidual {
                        vertex: v,
                        residual: local.z.abs(),
                        limit,
                    }
                    .into());
                }
            }
        }
        trace!(?v, x = local.x, y = local.y, "projected vertex");
        self.slots[index] = Some(local);
        Ok(Point2d::new(local.x, local.y))
    }

    /// Project an arbitrary point, uncached.
    pub fn project_point(&self, p: &Point3d) -> Point2d {
        let local = self.frame.to_local(p);
        Point2d::new(local.x, local.y)
    }

    pub fn project_dir(&self, d: &Vec3) -> Vec2 {
        let local = self.frame.to_local_dir(d);
        Vec2::new(local.x, local.y)
    }

    /// Back to model space, taking the point to lie on the active plane or line.
    pub fn unproject(&self, p: &Point2d) -> Point3d {
        self.frame.to_world(&Point3d::new(p.x, p.y, 0.0))
    }
}
