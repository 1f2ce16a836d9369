//! Walk of one face's edges against the working line.
//!
//! Edges are visited one line geometry at a time. A crossing is first looked
//! for in the topology (a vertex already used by edges on both lines), then
//! computed in the face's 2D frame. Confirmed crossings become real vertices
//! on the face's edges and are enlisted with their duals. Any structural edit
//! invalidates the tabulated geometry list, so the scan restarts on a fresh
//! snapshot whenever the model generation moves.

use tracing::{debug, instrument, trace, warn};

use super::context::{IntersectContext, Side};
use super::error::{IntersectError, Invariant};
use crate::geometry::point::{Point2d, Point3d};
use crate::geometry::predicates::{line_line_2d, point_segment_2d, LineLine2d, PointOnSegment};
use crate::geometry::vector::Vec2;
use crate::topology::brep::{EdgeGeomId, EdgeUseId, FaceUseId, Model, ShellId, VertexId, VertexUseId};
use crate::topology::classify::{classify_point_in_face, PointClass};
use crate::topology::mutators::{fuse_vertices, join_edge_geom, kill_zero_length_edges, split_edge};

/// Outcome of processing one line geometry.
enum Scan {
    Done,
    /// A repair fused vertices; every tabulated handle is suspect.
    Retabulate,
}

/// Intersect the working line with every edge and point loop of `fu`.
/// `other` is the face on the opposite side, `None` when that side is a wire.
#[instrument(skip(ctx, model))]
pub fn isect_line_face(
    ctx: &mut IntersectContext,
    model: &mut Model,
    fu: FaceUseId,
    other: Option<FaceUseId>,
) -> Result<(), IntersectError> {
    ctx.proj.prep_face(model, fu)?;
    let pt2 = ctx.proj.project_point(&ctx.line.pt);
    let dir2 = ctx.proj.project_dir(&ctx.line.dir);
    let bbox = model.face_use_bbox(fu)?;
    let span = (bbox.max - bbox.min).length().max(ctx.tol().dist);

    let walk = LineWalk { fu, other, pt2, dir2, span };
    let mut resolved: Vec<EdgeGeomId> = Vec::new();
    'tabulate: loop {
        let generation = model.generation();
        let geoms = model.face_edge_geoms(fu)?;
        trace!(generation, geoms = geoms.len(), "tabulated edge geometries");
        for eg1 in geoms {
            if resolved.contains(&eg1) || !model.edge_geoms.contains_key(eg1) {
                continue;
            }
            let scan = if Some(eg1) == ctx.on_eg {
                colinear(ctx, model)?;
                Scan::Done
            } else {
                walk.process_geom(ctx, model, eg1)?
            };
            match scan {
                Scan::Done => {
                    if Some(eg1) != ctx.on_eg {
                        resolved.push(eg1);
                    }
                }
                Scan::Retabulate => {
                    resolved.clear();
                    continue 'tabulate;
                }
            }
            if model.generation() != generation {
                continue 'tabulate;
            }
        }
        break;
    }

    // Point loops with no edges.
    let line = ctx.line.as_line();
    for (_, vu) in model.face_point_loops(fu)? {
        if !model.vertex_uses.contains_key(vu) {
            continue;
        }
        let v = model.vu_vertex(vu)?;
        let p = model.point_of(v)?;
        if line.distance_squared_to_point(&p) > ctx.tol().dist_sq {
            continue;
        }
        if let Some(on) = ctx.on_eg {
            break_eg_on_v(ctx, model, on, v)?;
        }
        if model.vertex_uses.contains_key(vu) {
            let dist = ctx.line.distance_of(&p);
            ctx.enlist(model, vu, None, dist)?;
        }
    }
    Ok(())
}

/// Per-face constants of one walk.
struct LineWalk {
    fu: FaceUseId,
    other: Option<FaceUseId>,
    pt2: Point2d,
    dir2: Vec2,
    span: f64,
}

impl LineWalk {
    fn process_geom(&self, ctx: &mut IntersectContext, model: &mut Model, eg1: EdgeGeomId) -> Result<Scan, IntersectError> {
        let tol = *ctx.tol();
        let eg_line = model.edge_geom(eg1)?.line;
        let eg_pt2 = ctx.proj.project_point(&eg_line.origin);
        let eg_dir2 = ctx.proj.project_dir(&eg_line.direction) * self.span;

        let code = line_line_2d(&self.pt2, &self.dir2, &eg_pt2, &eg_dir2, &tol);
        if code == LineLine2d::Colinear {
            match ctx.on_eg {
                Some(on) => {
                    debug!(?on, ?eg1, "edge line colinear with working line, fusing geometry");
                    join_edge_geom(model, on, eg1)?;
                }
                None => ctx.on_eg = Some(eg1),
            }
            colinear(ctx, model)?;
            return Ok(Scan::Retabulate);
        }

        let mut hit_v: Option<VertexId> = None;
        if let Some(on) = ctx.on_eg {
            let on_line = model.edge_geom(on)?.line;
            if eg_line.is_colinear_with(&on_line, self.span, &tol) {
                debug!(?on, ?eg1, "3D check found colinear lines, fusing geometry");
                join_edge_geom(model, on, eg1)?;
                colinear(ctx, model)?;
                return Ok(Scan::Retabulate);
            }
            hit_v = common_v_2eg(ctx, model, eg1, on)?;
        }

        let hit = match hit_v {
            Some(v) => {
                let p3 = model.point_of(v)?;
                if !self.topology_hit_is_usable(ctx, model, &p3)? {
                    return Ok(Scan::Done);
                }
                Hit {
                    v: Some(v),
                    p3,
                    p2: ctx.proj.project(model, v)?,
                    dist: ctx.line.distance_of(&p3),
                }
            }
            None => match code {
                LineLine2d::Crossing { t, .. } => {
                    let hit3d = ctx.line.at(t);
                    if !model.face_use_bbox(self.fu)?.expanded(tol.dist).contains_point(&hit3d) {
                        return Ok(Scan::Done);
                    }
                    if self.outside_either(ctx, model, &hit3d)? {
                        return Ok(Scan::Done);
                    }
                    Hit {
                        v: None,
                        p3: hit3d,
                        p2: self.pt2 + self.dir2 * t,
                        dist: t,
                    }
                }
                _ => return Ok(Scan::Done),
            },
        };
        self.eu_search(ctx, model, eg1, hit)
    }

    /// A topological hit may lie on some other face that shares these
    /// planes; keep it only when it is on both faces.
    fn topology_hit_is_usable(&self, ctx: &IntersectContext, model: &Model, p: &Point3d) -> Result<bool, IntersectError> {
        let tol = ctx.tol();
        let in_own = model.face_use_bbox(self.fu)?.expanded(tol.dist).contains_point(p);
        let in_other = match self.other {
            Some(of) => model.face_use_bbox(of)?.expanded(tol.dist).contains_point(p),
            None => false,
        };
        if !in_own && !in_other {
            return Ok(false);
        }
        if model.face_use_plane(self.fu)?.distance_to_point(p).abs() > tol.dist {
            return Ok(false);
        }
        if let Some(of) = self.other {
            if model.face_use_plane(of)?.distance_to_point(p).abs() > tol.dist {
                return Ok(false);
            }
        }
        Ok(!self.outside_either(ctx, model, p)?)
    }

    fn outside_either(&self, ctx: &IntersectContext, model: &Model, p: &Point3d) -> Result<bool, IntersectError> {
        if classify_point_in_face(model, self.fu, p, ctx.tol())? == PointClass::Outside {
            return Ok(true);
        }
        if let Some(of) = self.other {
            if classify_point_in_face(model, of, p, ctx.tol())? == PointClass::Outside {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Enlist or create the vertex-uses of this face's edges on `eg1` at the
    /// crossing. Restarts over the (longer) edge list after every split.
    fn eu_search(
        &self,
        ctx: &mut IntersectContext,
        model: &mut Model,
        eg1: EdgeGeomId,
        mut hit: Hit,
    ) -> Result<Scan, IntersectError> {
        let tol = *ctx.tol();
        let line = ctx.line.as_line();
        'search: loop {
            for eu in face_eus_on_geom(model, self.fu, eg1)? {
                if !model.edge_uses.contains_key(eu) {
                    continue;
                }
                let vua = model.edge_use(eu)?.start;
                let vub = model.eu_end_vu(eu)?;
                let va = model.vu_vertex(vua)?;
                let vb = model.vu_vertex(vub)?;

                // Topology first.
                let mut on_end = false;
                for (vu, v) in [(vua, va), (vub, vb)] {
                    if Some(v) == hit.v {
                        ctx.enlist(model, vu, None, hit.dist)?;
                        on_end = true;
                    }
                }
                if on_end {
                    continue;
                }

                // Then the endpoints against the 3D line.
                if hit.v.is_none() {
                    let mut claimed = false;
                    for (vu, v) in [(vua, va), (vub, vb)] {
                        if line.distance_squared_to_point(&model.point_of(v)?) <= tol.dist_sq {
                            hit.v = Some(v);
                            ctx.enlist(model, vu, None, hit.dist)?;
                            claimed = true;
                            break;
                        }
                    }
                    if claimed {
                        continue;
                    }
                }

                // Then the hit point against the segment, in 2D.
                let a2 = ctx.proj.project(model, va)?;
                let b2 = ctx.proj.project(model, vb)?;
                let (vu, v) = match point_segment_2d(&hit.p2, &a2, &b2, &tol) {
                    PointOnSegment::OutsideSpan | PointOnSegment::OffLine => continue,
                    PointOnSegment::AtStart => (vua, va),
                    PointOnSegment::AtEnd => (vub, vb),
                    PointOnSegment::Interior { .. } => {
                        let at = match hit.v {
                            Some(hv) => Some(hv),
                            None => {
                                let found = model.find_pt_in_shells(&hit.p3, &[ctx.s1, ctx.s2], &tol)?;
                                if let Some(f) = found.filter(|&f| f == va || f == vb) {
                                    return Err(Invariant::ZeroLengthSplit(f).into());
                                }
                                found
                            }
                        };
                        let new_eu = split_edge(model, eu, at, hit.p3)?;
                        let vu_mid = model.edge_use(new_eu)?.start;
                        let v_mid = model.vu_vertex(vu_mid)?;
                        if hit.v.is_none() {
                            hit.v = Some(v_mid);
                            if let Some(on) = ctx.on_eg {
                                break_eg_on_v(ctx, model, on, v_mid)?;
                            }
                        }
                        if model.vertex_uses.contains_key(vu_mid) {
                            ctx.enlist(model, vu_mid, None, hit.dist)?;
                        }
                        continue 'search;
                    }
                };
                // The hit is at an endpoint by geometry.
                if let Some(hv) = hit.v {
                    repair_v_near_v(ctx, model, hv, v)?;
                    return Ok(Scan::Retabulate);
                }
                hit.v = Some(v);
                ctx.enlist(model, vu, None, hit.dist)?;
            }
            return Ok(Scan::Done);
        }
    }
}

/// A crossing of the working line with one edge line.
#[derive(Debug, Clone, Copy)]
struct Hit {
    /// Vertex already standing at the crossing, once known.
    v: Option<VertexId>,
    p3: Point3d,
    p2: Point2d,
    /// Distance along the working line.
    dist: f64,
}

fn face_eus_on_geom(model: &Model, fu: FaceUseId, eg: EdgeGeomId) -> Result<Vec<EdgeUseId>, IntersectError> {
    let mut out = Vec::new();
    for eu in model.face_edge_uses(fu)? {
        if model.eu_geom(eu)? == eg {
            out.push(eu);
        }
    }
    Ok(out)
}

/// Edge-uses on `eg` belonging to one side: those in `fu`, or the wire
/// edge-uses of `shell` when the side has no face.
fn side_eus_on_geom(
    model: &Model,
    eg: EdgeGeomId,
    shell: ShellId,
    fu: Option<FaceUseId>,
) -> Result<Vec<EdgeUseId>, IntersectError> {
    let mut out = Vec::new();
    for &e in &model.edge_geom(eg)?.edges {
        for &eu in &model.edge(e)?.uses {
            let keep = match fu {
                Some(fu) => model.eu_face_use(eu)? == Some(fu),
                None => model.eu_face_use(eu)?.is_none() && model.eu_shell(eu)? == shell,
            };
            if keep {
                out.push(eu);
            }
        }
    }
    Ok(out)
}

/// The working line lies on `on_eg`: enlist every endpoint of either side's
/// edges on that geometry that is on the line and not outside the other face.
pub(crate) fn colinear(ctx: &mut IntersectContext, model: &mut Model) -> Result<(), IntersectError> {
    let Some(on) = ctx.on_eg else {
        return Ok(());
    };
    let tol = *ctx.tol();
    let line = ctx.line.as_line();
    for side in [Side::One, Side::Two] {
        let other_face = ctx.face(side.other());
        let eus = side_eus_on_geom(model, on, ctx.shell(side), ctx.face(side))?;
        for eu in eus {
            if !model.edge_uses.contains_key(eu) {
                continue;
            }
            let ends: [VertexUseId; 2] = [model.edge_use(eu)?.start, model.eu_end_vu(eu)?];
            for vu in ends {
                let p = model.point_of(model.vu_vertex(vu)?)?;
                if line.distance_squared_to_point(&p) > tol.dist_sq {
                    continue;
                }
                if let Some(of) = other_face {
                    if model.face_use_plane(of)?.distance_to_point(&p).abs() > tol.dist {
                        continue;
                    }
                    if classify_point_in_face(model, of, &p, &tol)? == PointClass::Outside {
                        continue;
                    }
                }
                let dist = ctx.line.distance_of(&p);
                ctx.enlist(model, vu, None, dist)?;
            }
        }
    }
    Ok(())
}

/// A vertex used by edges on both `eg1` and `eg2`, if any. Two different
/// such vertices are repaired into one.
#[instrument(skip(ctx, model))]
pub fn common_v_2eg(
    ctx: &mut IntersectContext,
    model: &mut Model,
    eg1: EdgeGeomId,
    eg2: EdgeGeomId,
) -> Result<Option<VertexId>, IntersectError> {
    if eg1 == eg2 {
        return Err(Invariant::SameEdgeGeometry(eg1).into());
    }
    let reach = ctx.cfg.repair_reach();
    let mut hit: Option<VertexId> = None;
    'scan: loop {
        let line1 = model.edge_geom(eg1)?.line;
        for e in model.edge_geom(eg1)?.edges.clone() {
            let (a, b) = model.edge_endpoints(e)?;
            for v in [a, b] {
                let distance = line1.distance_to_point(&model.point_of(v)?);
                if distance > reach {
                    return Err(Invariant::VertexOffEdgeLine {
                        vertex: v,
                        geom: eg1,
                        distance,
                    }
                    .into());
                }
                let mut on1 = false;
                let mut on2 = false;
                for incident in model.edges_at_vertex(v)? {
                    let g = model.edge(incident)?.geom;
                    on1 |= g == eg1;
                    on2 |= g == eg2;
                }
                if !(on1 && on2) {
                    continue;
                }
                match hit {
                    None => hit = Some(v),
                    Some(h) if h == v => {}
                    Some(h) => {
                        repair_v_near_v(ctx, model, h, v)?;
                        continue 'scan;
                    }
                }
            }
        }
        return Ok(hit);
    }
}

/// Split every edge on `eg` that strictly spans `v`. An edge with an end
/// within tolerance of `v` has that end fused into `v` instead.
#[instrument(skip(ctx, model))]
pub fn break_eg_on_v(
    ctx: &mut IntersectContext,
    model: &mut Model,
    eg: EdgeGeomId,
    v: VertexId,
) -> Result<(), IntersectError> {
    let tol = *ctx.tol();
    let p = model.point_of(v)?;
    loop {
        let line = model.edge_geom(eg)?.line;
        let vdist = line.parameter_of(&p);
        let mut edited = false;
        for e in model.edge_geom(eg)?.edges.clone() {
            let Some(&eu) = model.edge(e)?.uses.first() else {
                continue;
            };
            let (va, vb) = model.eu_endpoints(eu)?;
            if v == va || v == vb {
                continue;
            }
            let (pa, pb) = (model.point_of(va)?, model.point_of(vb)?);
            if let Some(near) = [(va, pa), (vb, pb)].into_iter().find(|(_, q)| tol.points_coincident(&p, q)) {
                fuse_vertices(model, v, near.0)?;
                kill_zero_length_edges(model, v)?;
                ctx.purge_dead(model);
                edited = true;
                break;
            }
            let a = line.parameter_of(&pa);
            let b = line.parameter_of(&pb);
            if (a - vdist).abs() <= tol.dist || (b - vdist).abs() <= tol.dist {
                continue;
            }
            if vdist <= a.min(b) || vdist >= a.max(b) {
                continue;
            }
            split_edge(model, eu, Some(v), p)?;
            debug!(?eg, ?v, "broke edge on line geometry at vertex");
            edited = true;
            break;
        }
        if !edited {
            return Ok(());
        }
    }
}

/// Fuse `drop` into `keep` when they are within the repair reach. Farther
/// apart is an invariant violation.
#[instrument(skip(ctx, model))]
pub fn repair_v_near_v(
    ctx: &mut IntersectContext,
    model: &mut Model,
    keep: VertexId,
    drop: VertexId,
) -> Result<(), IntersectError> {
    if keep == drop {
        return Ok(());
    }
    let distance = model.point_of(keep)?.distance_to(&model.point_of(drop)?);
    let reach = ctx.cfg.repair_reach();
    if distance > reach {
        return Err(Invariant::RepairOutOfReach {
            keep,
            drop,
            distance,
            reach,
        }
        .into());
    }
    warn!(?keep, ?drop, distance, "fusing near-coincident crossing vertices");
    fuse_vertices(model, keep, drop)?;
    let killed = kill_zero_length_edges(model, keep)?;
    let purged = ctx.purge_dead(model);
    debug!(killed, purged, "repair cleanup");
    Ok(())
}
