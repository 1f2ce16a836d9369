use serde::Serialize;

use super::cutter::CutRequest;
use super::error::{IntersectError, Invariant};
use super::projection::ProjectionCache;
use super::resolve::IntersectLine;
use crate::config::IntersectConfig;
use crate::topology::brep::{EdgeGeomId, FaceUseId, Model, ShellId, VertexUseId};
use crate::Tol;

/// An ordered set of vertex-uses with a distance along the working line
/// recorded for each.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VuList {
    vus: Vec<VertexUseId>,
    dist: Vec<f64>,
}

impl VuList {
    pub fn len(&self) -> usize {
        self.vus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vus.is_empty()
    }

    pub fn contains(&self, vu: VertexUseId) -> bool {
        self.vus.contains(&vu)
    }

    pub fn distance_of(&self, vu: VertexUseId) -> Option<f64> {
        self.vus.iter().position(|&x| x == vu).map(|i| self.dist[i])
    }

    pub fn vertex_uses(&self) -> &[VertexUseId] {
        &self.vus
    }

    pub fn iter(&self) -> impl Iterator<Item = (VertexUseId, f64)> + '_ {
        self.vus.iter().copied().zip(self.dist.iter().copied())
    }

    /// Entries sorted by distance along the line.
    pub fn sorted(&self) -> Vec<(VertexUseId, f64)> {
        let mut out: Vec<_> = self.iter().collect();
        out.sort_by(|a, b| a.1.total_cmp(&b.1));
        out
    }

    /// Append `vu` unless present; either way its slot records `dist`.
    /// Returns true when `vu` was new.
    pub(crate) fn insert_unique(&mut self, vu: VertexUseId, dist: f64) -> bool {
        match self.vus.iter().position(|&x| x == vu) {
            Some(i) => {
                self.dist[i] = dist;
                false
            }
            None => {
                self.vus.push(vu);
                self.dist.push(dist);
                true
            }
        }
    }

    /// Drop entries whose vertex-use no longer exists. Returns how many went.
    pub(crate) fn retain_live(&mut self, model: &Model) -> usize {
        let before = self.vus.len();
        let (vus, dist): (Vec<_>, Vec<_>) = self
            .iter()
            .filter(|&(vu, _)| model.vertex_uses.contains_key(vu))
            .unzip();
        self.vus = vus;
        self.dist = dist;
        before - self.vus.len()
    }
}

/// Which of the two shells an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    One,
    Two,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::One => Side::Two,
            Side::Two => Side::One,
        }
    }
}

/// Transient state of one face-pair (or edge/face) intersection. The model is
/// not held here; every operation borrows it alongside the context.
#[derive(Debug, Clone)]
pub struct IntersectContext {
    pub cfg: IntersectConfig,
    pub s1: ShellId,
    pub s2: ShellId,
    /// `None` when that side is a bare wire.
    pub fu1: Option<FaceUseId>,
    pub fu2: Option<FaceUseId>,
    pub line: IntersectLine,
    /// Line geometry the working line is known to lie on.
    pub on_eg: Option<EdgeGeomId>,
    pub proj: ProjectionCache,
    pub l1: VuList,
    pub l2: VuList,
}

impl IntersectContext {
    pub fn new(
        cfg: IntersectConfig,
        (s1, fu1): (ShellId, Option<FaceUseId>),
        (s2, fu2): (ShellId, Option<FaceUseId>),
        line: IntersectLine,
    ) -> Self {
        Self {
            cfg,
            s1,
            s2,
            fu1,
            fu2,
            line,
            on_eg: None,
            proj: ProjectionCache::new(cfg.tol, cfg.residual_factor),
            l1: VuList::default(),
            l2: VuList::default(),
        }
    }

    pub fn tol(&self) -> &Tol {
        &self.cfg.tol
    }

    pub fn shell(&self, side: Side) -> ShellId {
        match side {
            Side::One => self.s1,
            Side::Two => self.s2,
        }
    }

    pub fn face(&self, side: Side) -> Option<FaceUseId> {
        match side {
            Side::One => self.fu1,
            Side::Two => self.fu2,
        }
    }

    pub fn list(&self, side: Side) -> &VuList {
        match side {
            Side::One => &self.l1,
            Side::Two => &self.l2,
        }
    }

    pub(crate) fn list_mut(&mut self, side: Side) -> &mut VuList {
        match side {
            Side::One => &mut self.l1,
            Side::Two => &mut self.l2,
        }
    }

    /// The side whose shell `vu` is reachable from.
    pub fn side_of(&self, model: &Model, vu: VertexUseId) -> Result<Side, IntersectError> {
        let s = model.vu_shell(vu)?;
        if s == self.s1 {
            Ok(Side::One)
        } else if s == self.s2 {
            Ok(Side::Two)
        } else {
            Err(Invariant::ForeignVertexUse {
                vu,
                s1: self.s1,
                s2: self.s2,
            }
            .into())
        }
    }

    /// The face-use on the opposite side from `fu`.
    pub fn other_face(&self, fu: FaceUseId) -> Option<FaceUseId> {
        if self.fu1 == Some(fu) { self.fu2 } else { self.fu1 }
    }

    /// Remove vertex-uses destroyed by a repair from both lists.
    pub(crate) fn purge_dead(&mut self, model: &Model) -> usize {
        self.l1.retain_live(model) + self.l2.retain_live(model)
    }

    pub fn cut_request(&self) -> CutRequest {
        CutRequest::new(self.fu1, self.fu2, self.on_eg, &self.l1, &self.l2)
    }

    pub fn into_report(mut self) -> PairReport {
        self.proj.release();
        PairReport {
            list1: self.l1,
            list2: self.l2,
            on_eg: self.on_eg,
        }
    }
}

/// What one pair intersection enlisted, handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairReport {
    pub list1: VuList,
    pub list2: VuList,
    pub on_eg: Option<EdgeGeomId>,
}

impl PairReport {
    pub fn enlisted(&self) -> usize {
        self.list1.len() + self.list2.len()
    }
}
