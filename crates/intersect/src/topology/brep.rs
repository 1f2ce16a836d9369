use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

use crate::geometry::curves::Line3d;
use crate::geometry::point::Point3d;
use crate::geometry::surfaces::Plane;
use crate::geometry::transform::BoundingBox;
use crate::Tol;

// ─── Entity Keys ─────────────────────────────────────────────────────────────

new_key_type! {
    pub struct VertexId;
    pub struct VertexUseId;
    pub struct EdgeId;
    pub struct EdgeUseId;
    pub struct EdgeGeomId;
    pub struct LoopId;
    pub struct LoopUseId;
    pub struct FaceId;
    pub struct FaceUseId;
    pub struct FaceGeomId;
    pub struct ShellId;
}

// ─── Topological Entities ───────────────────────────────────────────────────

/// A location shared by every use that touches it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    pub point: Point3d,
    /// Dense per-model index, used to key projection caches.
    pub index: usize,
    pub uses: Vec<VertexUseId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VertexUseParent {
    /// Start of an edge-use.
    EdgeUse(EdgeUseId),
    /// The single vertex of a point loop.
    LoopUse(LoopUseId),
    /// A lone vertex directly in a shell.
    Shell(ShellId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexUse {
    pub vertex: VertexId,
    pub parent: VertexUseParent,
}

/// Line geometry, shared by every edge that lies on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeGeom {
    pub line: Line3d,
    pub edges: Vec<EdgeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub geom: EdgeGeomId,
    /// Every use of this edge, in radial order.
    pub uses: Vec<EdgeUseId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeUseParent {
    LoopUse(LoopUseId),
    /// Wire edge directly in a shell.
    Shell(ShellId),
}

/// One directed traversal of an edge. The end of a loop edge-use is the start
/// of its successor in the loop. The end of a wire edge-use is the start of
/// its mate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeUse {
    pub edge: EdgeId,
    pub start: VertexUseId,
    /// The use of the same edge running the other way, if one exists.
    pub mate: Option<EdgeUseId>,
    pub parent: EdgeUseParent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loop {
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoopKind {
    /// A closed cycle of edge-uses.
    Edges(Vec<EdgeUseId>),
    /// A degenerate loop holding one vertex.
    Point(VertexUseId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopUse {
    pub lp: LoopId,
    pub face_use: FaceUseId,
    /// Edge loops only: true for an inner boundary.
    pub hole: bool,
    pub kind: LoopKind,
}

/// Plane geometry, shared by every face that lies on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceGeom {
    pub plane: Plane,
    pub faces: Vec<FaceId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Face {
    pub geom: FaceGeomId,
    /// The face normal opposes its plane geometry's normal.
    pub flip: bool,
    pub bbox: BoundingBox,
    pub face_use: FaceUseId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceUse {
    pub face: FaceId,
    pub shell: ShellId,
    pub loops: Vec<LoopUseId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Shell {
    pub face_uses: Vec<FaceUseId>,
    pub wire_edges: Vec<EdgeUseId>,
    pub lone_vertices: Vec<VertexUseId>,
}

// ─── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TopologyError {
    #[error("stale {kind} handle")]
    StaleHandle { kind: &'static str },

    #[error("{what} has the wrong kind of parent")]
    WrongParent { what: &'static str },

    #[error("wire edge-use {0:?} has no mate")]
    MissingMate(EdgeUseId),

    #[error("edit would create a zero-length edge")]
    ZeroLengthEdge,

    #[error("edges do not join the same pair of vertices")]
    NotAdjacent,

    #[error("face boundary has no area")]
    DegenerateFace,
}

// ─── Model ──────────────────────────────────────────────────────────────────

/// Arena storage for the whole topology graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Model {
    pub vertices: SlotMap<VertexId, Vertex>,
    pub vertex_uses: SlotMap<VertexUseId, VertexUse>,
    pub edges: SlotMap<EdgeId, Edge>,
    pub edge_uses: SlotMap<EdgeUseId, EdgeUse>,
    pub edge_geoms: SlotMap<EdgeGeomId, EdgeGeom>,
    pub loops: SlotMap<LoopId, Loop>,
    pub loop_uses: SlotMap<LoopUseId, LoopUse>,
    pub faces: SlotMap<FaceId, Face>,
    pub face_uses: SlotMap<FaceUseId, FaceUse>,
    pub face_geoms: SlotMap<FaceGeomId, FaceGeom>,
    pub shells: SlotMap<ShellId, Shell>,
    next_index: usize,
    generation: u64,
}

macro_rules! checked_get {
    ($name:ident, $field:ident, $key:ty, $value:ty, $kind:literal) => {
        pub fn $name(&self, id: $key) -> Result<&$value, TopologyError> {
            self.$field
                .get(id)
                .ok_or(TopologyError::StaleHandle { kind: $kind })
        }
    };
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    checked_get!(vertex, vertices, VertexId, Vertex, "vertex");
    checked_get!(vertex_use, vertex_uses, VertexUseId, VertexUse, "vertex-use");
    checked_get!(edge, edges, EdgeId, Edge, "edge");
    checked_get!(edge_use, edge_uses, EdgeUseId, EdgeUse, "edge-use");
    checked_get!(edge_geom, edge_geoms, EdgeGeomId, EdgeGeom, "edge geometry");
    checked_get!(loop_use, loop_uses, LoopUseId, LoopUse, "loop-use");
    checked_get!(face, faces, FaceId, Face, "face");
    checked_get!(face_use, face_uses, FaceUseId, FaceUse, "face-use");
    checked_get!(face_geom, face_geoms, FaceGeomId, FaceGeom, "face geometry");
    checked_get!(shell, shells, ShellId, Shell, "shell");

    /// One past the largest vertex index handed out so far.
    pub fn max_index(&self) -> usize {
        self.next_index
    }

    /// Bumped by every structural edit.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn bump_generation(&mut self) {
        self.generation += 1;
    }

    pub(crate) fn insert_vertex(&mut self, point: Point3d) -> VertexId {
        let index = self.next_index;
        self.next_index += 1;
        self.vertices.insert(Vertex {
            point,
            index,
            uses: Vec::new(),
        })
    }

    pub fn point_of(&self, v: VertexId) -> Result<Point3d, TopologyError> {
        Ok(self.vertex(v)?.point)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// JSON dump of the whole graph, for diagnostics.
    pub fn snapshot_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    // ─── Use resolution ─────────────────────────────────────────────────────

    pub fn vu_vertex(&self, vu: VertexUseId) -> Result<VertexId, TopologyError> {
        Ok(self.vertex_use(vu)?.vertex)
    }

    /// The shell a vertex-use is reachable from.
    pub fn vu_shell(&self, vu: VertexUseId) -> Result<ShellId, TopologyError> {
        match self.vertex_use(vu)?.parent {
            VertexUseParent::EdgeUse(eu) => self.eu_shell(eu),
            VertexUseParent::LoopUse(lu) => self.lu_shell(lu),
            VertexUseParent::Shell(s) => Ok(s),
        }
    }

    /// The face-use a vertex-use lies in, if any.
    pub fn vu_face_use(&self, vu: VertexUseId) -> Result<Option<FaceUseId>, TopologyError> {
        match self.vertex_use(vu)?.parent {
            VertexUseParent::EdgeUse(eu) => self.eu_face_use(eu),
            VertexUseParent::LoopUse(lu) => Ok(Some(self.loop_use(lu)?.face_use)),
            VertexUseParent::Shell(_) => Ok(None),
        }
    }

    pub fn eu_shell(&self, eu: EdgeUseId) -> Result<ShellId, TopologyError> {
        match self.edge_use(eu)?.parent {
            EdgeUseParent::LoopUse(lu) => self.lu_shell(lu),
            EdgeUseParent::Shell(s) => Ok(s),
        }
    }

    pub fn eu_face_use(&self, eu: EdgeUseId) -> Result<Option<FaceUseId>, TopologyError> {
        match self.edge_use(eu)?.parent {
            EdgeUseParent::LoopUse(lu) => Ok(Some(self.loop_use(lu)?.face_use)),
            EdgeUseParent::Shell(_) => Ok(None),
        }
    }

    fn lu_shell(&self, lu: LoopUseId) -> Result<ShellId, TopologyError> {
        let fu = self.loop_use(lu)?.face_use;
        Ok(self.face_use(fu)?.shell)
    }

    pub fn eu_geom(&self, eu: EdgeUseId) -> Result<EdgeGeomId, TopologyError> {
        Ok(self.edge(self.edge_use(eu)?.edge)?.geom)
    }

    pub fn eu_line(&self, eu: EdgeUseId) -> Result<Line3d, TopologyError> {
        Ok(self.edge_geom(self.eu_geom(eu)?)?.line)
    }

    fn loop_edges(&self, lu: LoopUseId) -> Result<&[EdgeUseId], TopologyError> {
        match &self.loop_use(lu)?.kind {
            LoopKind::Edges(eus) => Ok(eus),
            LoopKind::Point(_) => Err(TopologyError::WrongParent { what: "point loop" }),
        }
    }

    /// The vertex-use at the far end of `eu`.
    pub fn eu_end_vu(&self, eu: EdgeUseId) -> Result<VertexUseId, TopologyError> {
        let e = self.edge_use(eu)?;
        match e.parent {
            EdgeUseParent::LoopUse(lu) => {
                let eus = self.loop_edges(lu)?;
                let pos = eus
                    .iter()
                    .position(|&x| x == eu)
                    .ok_or(TopologyError::StaleHandle { kind: "loop edge-use" })?;
                let next = eus[(pos + 1) % eus.len()];
                Ok(self.edge_use(next)?.start)
            }
            EdgeUseParent::Shell(_) => {
                let mate = e.mate.ok_or(TopologyError::MissingMate(eu))?;
                Ok(self.edge_use(mate)?.start)
            }
        }
    }

    /// The loop predecessor of a loop edge-use, whose end is `eu`'s start.
    pub fn eu_prev(&self, eu: EdgeUseId) -> Result<Option<EdgeUseId>, TopologyError> {
        match self.edge_use(eu)?.parent {
            EdgeUseParent::LoopUse(lu) => {
                let eus = self.loop_edges(lu)?;
                let pos = eus
                    .iter()
                    .position(|&x| x == eu)
                    .ok_or(TopologyError::StaleHandle { kind: "loop edge-use" })?;
                Ok(Some(eus[(pos + eus.len() - 1) % eus.len()]))
            }
            EdgeUseParent::Shell(_) => Ok(None),
        }
    }

    /// Start and end vertices of `eu`, in its direction.
    pub fn eu_endpoints(&self, eu: EdgeUseId) -> Result<(VertexId, VertexId), TopologyError> {
        let a = self.vu_vertex(self.edge_use(eu)?.start)?;
        let b = self.vu_vertex(self.eu_end_vu(eu)?)?;
        Ok((a, b))
    }

    pub fn eu_points(&self, eu: EdgeUseId) -> Result<(Point3d, Point3d), TopologyError> {
        let (a, b) = self.eu_endpoints(eu)?;
        Ok((self.point_of(a)?, self.point_of(b)?))
    }

    // ─── Face queries ───────────────────────────────────────────────────────

    /// Plane of a face-use, oriented by the face's flip flag.
    pub fn face_use_plane(&self, fu: FaceUseId) -> Result<Plane, TopologyError> {
        let face = self.face(self.face_use(fu)?.face)?;
        let plane = self.face_geom(face.geom)?.plane;
        Ok(if face.flip { plane.flipped() } else { plane })
    }

    pub fn face_use_geom(&self, fu: FaceUseId) -> Result<FaceGeomId, TopologyError> {
        Ok(self.face(self.face_use(fu)?.face)?.geom)
    }

    pub fn face_use_bbox(&self, fu: FaceUseId) -> Result<BoundingBox, TopologyError> {
        Ok(self.face(self.face_use(fu)?.face)?.bbox)
    }

    /// Every edge-use of every edge loop of the face-use, loop by loop.
    pub fn face_edge_uses(&self, fu: FaceUseId) -> Result<Vec<EdgeUseId>, TopologyError> {
        let mut out = Vec::new();
        for &lu in &self.face_use(fu)?.loops {
            if let LoopKind::Edges(eus) = &self.loop_use(lu)?.kind {
                out.extend_from_slice(eus);
            }
        }
        Ok(out)
    }

    /// Point loops of the face-use with their vertex-uses.
    pub fn face_point_loops(&self, fu: FaceUseId) -> Result<Vec<(LoopUseId, VertexUseId)>, TopologyError> {
        let mut out = Vec::new();
        for &lu in &self.face_use(fu)?.loops {
            if let LoopKind::Point(vu) = self.loop_use(lu)?.kind {
                out.push((lu, vu));
            }
        }
        Ok(out)
    }

    /// Distinct vertices of the face-use, in loop order.
    pub fn face_vertices(&self, fu: FaceUseId) -> Result<Vec<VertexId>, TopologyError> {
        let mut out: Vec<VertexId> = Vec::new();
        for eu in self.face_edge_uses(fu)? {
            let v = self.vu_vertex(self.edge_use(eu)?.start)?;
            if !out.contains(&v) {
                out.push(v);
            }
        }
        for (_, vu) in self.face_point_loops(fu)? {
            let v = self.vu_vertex(vu)?;
            if !out.contains(&v) {
                out.push(v);
            }
        }
        Ok(out)
    }

    /// Distinct line geometries used by the face-use's edges.
    pub fn face_edge_geoms(&self, fu: FaceUseId) -> Result<Vec<EdgeGeomId>, TopologyError> {
        let mut out: Vec<EdgeGeomId> = Vec::new();
        for eu in self.face_edge_uses(fu)? {
            let eg = self.eu_geom(eu)?;
            if !out.contains(&eg) {
                out.push(eg);
            }
        }
        Ok(out)
    }

    /// Recompute the cached boxes of a face and its loops from vertex positions.
    pub fn refresh_face_bounds(&mut self, face: FaceId) -> Result<(), TopologyError> {
        let fu = self.face(face)?.face_use;
        let mut face_box = BoundingBox::empty();
        let loops = self.face_use(fu)?.loops.clone();
        for lu in loops {
            let mut points = Vec::new();
            match &self.loop_use(lu)?.kind {
                LoopKind::Edges(eus) => {
                    for &eu in eus {
                        points.push(self.point_of(self.vu_vertex(self.edge_use(eu)?.start)?)?);
                    }
                }
                LoopKind::Point(vu) => points.push(self.point_of(self.vu_vertex(*vu)?)?),
            }
            let bb = BoundingBox::from_points(&points);
            face_box = face_box.union(&bb);
            let lp = self.loop_use(lu)?.lp;
            if let Some(l) = self.loops.get_mut(lp) {
                l.bbox = bb;
            }
        }
        if let Some(f) = self.faces.get_mut(face) {
            f.bbox = face_box;
        }
        Ok(())
    }

    // ─── Searches ───────────────────────────────────────────────────────────

    /// The use of `v` inside face-use `fu`, if there is one.
    pub fn find_vu_in_face(&self, v: VertexId, fu: FaceUseId) -> Result<Option<VertexUseId>, TopologyError> {
        for &vu in &self.vertex(v)?.uses {
            if self.vu_face_use(vu)? == Some(fu) {
                return Ok(Some(vu));
            }
        }
        Ok(None)
    }

    /// Any use of `v` reachable from shell `s`.
    pub fn find_v_in_shell(&self, v: VertexId, s: ShellId) -> Result<Option<VertexUseId>, TopologyError> {
        for &vu in &self.vertex(v)?.uses {
            if self.vu_shell(vu)? == s {
                return Ok(Some(vu));
            }
        }
        Ok(None)
    }

    /// The edge-use of `fu` joining `v1` and `v2` (either direction).
    pub fn find_edge_between(
        &self,
        v1: VertexId,
        v2: VertexId,
        fu: FaceUseId,
    ) -> Result<Option<EdgeUseId>, TopologyError> {
        for eu in self.face_edge_uses(fu)? {
            let (a, b) = self.eu_endpoints(eu)?;
            if (a == v1 && b == v2) || (a == v2 && b == v1) {
                return Ok(Some(eu));
            }
        }
        Ok(None)
    }

    /// The vertex nearest to `p` within tolerance among those used by
    /// `shells`. Faces whose box misses `p` are not scanned.
    pub fn find_pt_in_shells(
        &self,
        p: &Point3d,
        shells: &[ShellId],
        tol: &Tol,
    ) -> Result<Option<VertexId>, TopologyError> {
        let mut candidates: Vec<VertexId> = Vec::new();
        for &s in shells {
            let shell = self.shell(s)?;
            for &fu in &shell.face_uses {
                if self.face_use_bbox(fu)?.expanded(tol.dist).contains_point(p) {
                    candidates.extend(self.face_vertices(fu)?);
                }
            }
            // Both uses of a wire edge are listed, so this covers both ends.
            for &eu in &shell.wire_edges {
                candidates.push(self.vu_vertex(self.edge_use(eu)?.start)?);
            }
            for &vu in &shell.lone_vertices {
                candidates.push(self.vu_vertex(vu)?);
            }
        }

        let mut best: Option<(VertexId, f64)> = None;
        for v in candidates {
            let d = self.point_of(v)?.distance_squared_to(p);
            if d <= tol.dist_sq && best.is_none_or(|(_, bd)| d < bd) {
                best = Some((v, d));
            }
        }
        Ok(best.map(|(v, _)| v))
    }

    /// One use per wire edge of shell `s`, in the order the edges appear.
    pub fn shell_wire_edges(&self, s: ShellId) -> Result<Vec<EdgeUseId>, TopologyError> {
        let mut seen: Vec<EdgeId> = Vec::new();
        let mut out = Vec::new();
        for &eu in &self.shell(s)?.wire_edges {
            let e = self.edge_use(eu)?.edge;
            if !seen.contains(&e) {
                seen.push(e);
                out.push(eu);
            }
        }
        Ok(out)
    }

    /// Box around every face, wire edge and lone vertex of shell `s`.
    /// Empty for an empty shell.
    pub fn shell_bbox(&self, s: ShellId) -> Result<BoundingBox, TopologyError> {
        let shell = self.shell(s)?;
        let mut bb = BoundingBox::empty();
        for &fu in &shell.face_uses {
            bb = bb.union(&self.face_use_bbox(fu)?);
        }
        for &eu in &shell.wire_edges {
            bb.expand_to_include(&self.point_of(self.vu_vertex(self.edge_use(eu)?.start)?)?);
        }
        for &vu in &shell.lone_vertices {
            bb.expand_to_include(&self.point_of(self.vu_vertex(vu)?)?);
        }
        Ok(bb)
    }

    /// An edge-use anywhere in shell `s` joining the same two vertices as
    /// `eu`, other than `eu`'s own edge.
    pub fn find_matching_eu_in_shell(&self, eu: EdgeUseId, s: ShellId) -> Result<Option<EdgeUseId>, TopologyError> {
        let own = self.edge_use(eu)?.edge;
        let (a, b) = self.eu_endpoints(eu)?;
        for &vu in &self.vertex(a)?.uses {
            let VertexUseParent::EdgeUse(other) = self.vertex_use(vu)?.parent else {
                continue;
            };
            if self.edge_use(other)?.edge == own || self.eu_shell(other)? != s {
                continue;
            }
            let (c, d) = self.eu_endpoints(other)?;
            if (c == a && d == b) || (c == b && d == a) {
                return Ok(Some(other));
            }
        }
        Ok(None)
    }

    /// Every edge with an end at `v`.
    pub fn edges_at_vertex(&self, v: VertexId) -> Result<Vec<EdgeId>, TopologyError> {
        let mut out: Vec<EdgeId> = Vec::new();
        for &vu in &self.vertex(v)?.uses {
            if let VertexUseParent::EdgeUse(eu) = self.vertex_use(vu)?.parent {
                let mut incident = vec![self.edge_use(eu)?.edge];
                if let Some(prev) = self.eu_prev(eu)? {
                    incident.push(self.edge_use(prev)?.edge);
                }
                for e in incident {
                    if !out.contains(&e) {
                        out.push(e);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Both ends of an edge, taken from its first use.
    pub fn edge_endpoints(&self, e: EdgeId) -> Result<(VertexId, VertexId), TopologyError> {
        let first = *self
            .edge(e)?
            .uses
            .first()
            .ok_or(TopologyError::StaleHandle { kind: "edge without uses" })?;
        self.eu_endpoints(first)
    }
}

// ─── Topology Audit ─────────────────────────────────────────────────────────

/// A broken back-link or shape rule found by [`audit`].
#[derive(Debug, Clone, PartialEq)]
pub enum TopologyIssue {
    VertexUseBackLink { vu: VertexUseId },
    EdgeUseStartBackLink { eu: EdgeUseId },
    EdgeMembership { eu: EdgeUseId },
    MateDirection { eu: EdgeUseId },
    ZeroLengthEdgeUse { eu: EdgeUseId },
    VertexOffEdgeLine { edge: EdgeId, distance: f64 },
    EmptyLoop { lu: LoopUseId },
    Unresolvable { error: TopologyError },
}

/// Check every back-link and shape rule in the model.
pub fn audit(model: &Model, tol: &Tol) -> Vec<TopologyIssue> {
    let mut issues = Vec::new();

    for (v_id, v) in &model.vertices {
        for &vu in &v.uses {
            if model.vertex_uses.get(vu).map(|u| u.vertex) != Some(v_id) {
                issues.push(TopologyIssue::VertexUseBackLink { vu });
            }
        }
    }

    for (eu_id, eu) in &model.edge_uses {
        match model.vertex_uses.get(eu.start).map(|u| u.parent) {
            Some(VertexUseParent::EdgeUse(owner)) if owner == eu_id => {}
            _ => issues.push(TopologyIssue::EdgeUseStartBackLink { eu: eu_id }),
        }
        if !model.edges.get(eu.edge).is_some_and(|e| e.uses.contains(&eu_id)) {
            issues.push(TopologyIssue::EdgeMembership { eu: eu_id });
        }
        match model.eu_endpoints(eu_id) {
            Ok((a, b)) => {
                if a == b {
                    issues.push(TopologyIssue::ZeroLengthEdgeUse { eu: eu_id });
                }
                if let Some(mate) = eu.mate {
                    match model.eu_endpoints(mate) {
                        Ok((ma, mb)) if ma == b && mb == a => {}
                        _ => issues.push(TopologyIssue::MateDirection { eu: eu_id }),
                    }
                }
                if let Ok(line) = model.eu_line(eu_id) {
                    for v in [a, b] {
                        if let Ok(p) = model.point_of(v) {
                            let d = line.distance_to_point(&p);
                            if d > tol.dist {
                                issues.push(TopologyIssue::VertexOffEdgeLine {
                                    edge: eu.edge,
                                    distance: d,
                                });
                            }
                        }
                    }
                }
            }
            Err(error) => issues.push(TopologyIssue::Unresolvable { error }),
        }
    }

    for (lu_id, lu) in &model.loop_uses {
        if let LoopKind::Edges(eus) = &lu.kind {
            if eus.is_empty() {
                issues.push(TopologyIssue::EmptyLoop { lu: lu_id });
            }
        }
    }

    issues
}
