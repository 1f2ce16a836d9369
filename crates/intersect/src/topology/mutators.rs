//! Structural edits used by the intersection engine.
//!
//! Every edit keeps the identity of every use it does not explicitly merge or
//! remove. Every edit bumps the model generation so in-flight scans restart.

use tracing::{debug, instrument};

use super::brep::*;
use crate::geometry::point::Point3d;

/// Split the edge under `eu` at a vertex. All radial uses of the edge are
/// split, not only `eu`. Pass `Some(v)` to split at an existing vertex, or
/// `None` to create one at `point`. Both halves keep the original line
/// geometry.
///
/// Returns the new edge-use that follows `eu` and starts at the split vertex.
#[instrument(skip(model, point))]
pub fn split_edge(
    model: &mut Model,
    eu: EdgeUseId,
    vertex: Option<VertexId>,
    point: Point3d,
) -> Result<EdgeUseId, TopologyError> {
    let edge_id = model.edge_use(eu)?.edge;
    let (a, b) = model.eu_endpoints(eu)?;
    let v = match vertex {
        Some(v) => {
            model.vertex(v)?;
            v
        }
        None => model.insert_vertex(point),
    };
    if v == a || v == b {
        return Err(TopologyError::ZeroLengthEdge);
    }

    let geom = model.edge(edge_id)?.geom;
    let new_edge = model.edges.insert(Edge {
        geom,
        uses: Vec::new(),
    });
    if let Some(g) = model.edge_geoms.get_mut(geom) {
        g.edges.push(new_edge);
    }

    let radial = model.edge(edge_id)?.uses.clone();
    let mut created = Vec::with_capacity(radial.len());
    let mut result = None;
    for u in radial {
        let forward = model.vu_vertex(model.edge_use(u)?.start)? == a;
        let parent = model.edge_use(u)?.parent;
        // The piece from the split vertex onward lies on `new_edge` when `u`
        // runs a->b and on the original edge when it runs b->a.
        let new_eu = model.edge_uses.insert(EdgeUse {
            edge: if forward { new_edge } else { edge_id },
            start: VertexUseId::default(),
            mate: None,
            parent,
        });
        let new_vu = model.vertex_uses.insert(VertexUse {
            vertex: v,
            parent: VertexUseParent::EdgeUse(new_eu),
        });
        model.edge_uses[new_eu].start = new_vu;
        model.vertices[v].uses.push(new_vu);
        if !forward {
            model.edge_uses[u].edge = new_edge;
        }
        insert_after(model, parent, u, new_eu)?;
        created.push(new_eu);
        if u == eu {
            result = Some(new_eu);
        }
    }

    let mut all = model.edge(edge_id)?.uses.clone();
    all.extend(created);
    let (on_old, on_new): (Vec<_>, Vec<_>) = all
        .into_iter()
        .partition(|&u| model.edge_uses[u].edge == edge_id);
    model.edges[edge_id].uses = on_old;
    model.edges[new_edge].uses = on_new;
    relink_mates(model, edge_id)?;
    relink_mates(model, new_edge)?;
    model.bump_generation();

    let new_eu = result.ok_or(TopologyError::StaleHandle { kind: "edge-use" })?;
    debug!(?new_eu, ?v, ?new_edge, "split edge at vertex");
    Ok(new_eu)
}

fn insert_after(
    model: &mut Model,
    parent: EdgeUseParent,
    anchor: EdgeUseId,
    new_eu: EdgeUseId,
) -> Result<(), TopologyError> {
    match parent {
        EdgeUseParent::LoopUse(lu) => {
            let lu = model
                .loop_uses
                .get_mut(lu)
                .ok_or(TopologyError::StaleHandle { kind: "loop-use" })?;
            match &mut lu.kind {
                LoopKind::Edges(eus) => {
                    let pos = eus
                        .iter()
                        .position(|&x| x == anchor)
                        .ok_or(TopologyError::StaleHandle { kind: "loop edge-use" })?;
                    eus.insert(pos + 1, new_eu);
                    Ok(())
                }
                LoopKind::Point(_) => Err(TopologyError::WrongParent { what: "point loop" }),
            }
        }
        EdgeUseParent::Shell(s) => {
            model
                .shells
                .get_mut(s)
                .ok_or(TopologyError::StaleHandle { kind: "shell" })?
                .wire_edges
                .push(new_eu);
            Ok(())
        }
    }
}

/// Pair the uses of an edge into mates: the i-th use running one way with the
/// i-th use running the other way.
pub(crate) fn relink_mates(model: &mut Model, edge: EdgeId) -> Result<(), TopologyError> {
    let uses = model.edge(edge)?.uses.clone();
    let Some(&first) = uses.first() else {
        return Ok(());
    };
    let reference = model.vu_vertex(model.edge_use(first)?.start)?;
    let mut forward = Vec::new();
    let mut backward = Vec::new();
    for &u in &uses {
        if model.vu_vertex(model.edge_use(u)?.start)? == reference {
            forward.push(u);
        } else {
            backward.push(u);
        }
    }
    for &u in &uses {
        model.edge_uses[u].mate = None;
    }
    for (&f, &r) in forward.iter().zip(backward.iter()) {
        model.edge_uses[f].mate = Some(r);
        model.edge_uses[r].mate = Some(f);
    }
    Ok(())
}

/// Fuse `drop` into `keep`: every use of `drop` now refers to `keep`, and
/// `drop` is removed. Edges that collapse to zero length are left for
/// [`kill_zero_length_edges`].
#[instrument(skip(model))]
pub fn fuse_vertices(model: &mut Model, keep: VertexId, drop: VertexId) -> Result<(), TopologyError> {
    if keep == drop {
        return Ok(());
    }
    model.vertex(keep)?;
    let moved = model
        .vertices
        .remove(drop)
        .ok_or(TopologyError::StaleHandle { kind: "vertex" })?
        .uses;

    let mut touched_faces = Vec::new();
    for &vu in &moved {
        if let Some(u) = model.vertex_uses.get_mut(vu) {
            u.vertex = keep;
        }
        if let Some(fu) = model.vu_face_use(vu)? {
            let face = model.face_use(fu)?.face;
            if !touched_faces.contains(&face) {
                touched_faces.push(face);
            }
        }
    }
    model.vertices[keep].uses.extend(moved);
    for face in touched_faces {
        model.refresh_face_bounds(face)?;
    }
    model.bump_generation();

    debug!(?keep, ?drop, "fused vertices");
    Ok(())
}

/// Make a point loop holding `v` in face-use `fu`. Returns its vertex-use.
#[instrument(skip(model))]
pub fn make_point_loop(model: &mut Model, fu: FaceUseId, v: VertexId) -> Result<VertexUseId, TopologyError> {
    let point = model.point_of(v)?;
    let face = model.face_use(fu)?.face;
    let lp = model.loops.insert(Loop {
        bbox: crate::geometry::transform::BoundingBox::from_points([&point]),
    });
    let lu = model.loop_uses.insert(LoopUse {
        lp,
        face_use: fu,
        hole: false,
        kind: LoopKind::Point(VertexUseId::default()),
    });
    let vu = model.vertex_uses.insert(VertexUse {
        vertex: v,
        parent: VertexUseParent::LoopUse(lu),
    });
    model.loop_uses[lu].kind = LoopKind::Point(vu);
    model.vertices[v].uses.push(vu);
    model.face_uses[fu].loops.push(lu);
    model.refresh_face_bounds(face)?;
    model.bump_generation();

    debug!(?lu, ?vu, "made point loop");
    Ok(vu)
}

/// Merge the edges under `eu1` and `eu2` into one radial edge. Both must join
/// the same two vertices. The surviving edge is `eu1`'s.
#[instrument(skip(model))]
pub fn join_radial(model: &mut Model, eu1: EdgeUseId, eu2: EdgeUseId) -> Result<(), TopologyError> {
    let keep = model.edge_use(eu1)?.edge;
    let drop = model.edge_use(eu2)?.edge;
    if keep == drop {
        return Ok(());
    }
    let (a, b) = model.eu_endpoints(eu1)?;
    let (c, d) = model.eu_endpoints(eu2)?;
    if !((a == c && b == d) || (a == d && b == c)) {
        return Err(TopologyError::NotAdjacent);
    }

    let dropped = model
        .edges
        .remove(drop)
        .ok_or(TopologyError::StaleHandle { kind: "edge" })?;
    for &u in &dropped.uses {
        model.edge_uses[u].edge = keep;
    }
    model.edges[keep].uses.extend(dropped.uses);
    detach_edge_from_geom(model, dropped.geom, drop);
    relink_mates(model, keep)?;
    model.bump_generation();

    debug!(?keep, ?drop, "joined edges radially");
    Ok(())
}

fn detach_edge_from_geom(model: &mut Model, geom: EdgeGeomId, edge: EdgeId) {
    let now_empty = match model.edge_geoms.get_mut(geom) {
        Some(g) => {
            g.edges.retain(|&e| e != edge);
            g.edges.is_empty()
        }
        None => false,
    };
    if now_empty {
        model.edge_geoms.remove(geom);
    }
}

/// Move every edge of line geometry `drop` onto `keep` and remove `drop`.
#[instrument(skip(model))]
pub fn join_edge_geom(model: &mut Model, keep: EdgeGeomId, drop: EdgeGeomId) -> Result<(), TopologyError> {
    if keep == drop {
        return Ok(());
    }
    model.edge_geom(keep)?;
    let dropped = model
        .edge_geoms
        .remove(drop)
        .ok_or(TopologyError::StaleHandle { kind: "edge geometry" })?;
    for &e in &dropped.edges {
        if let Some(edge) = model.edges.get_mut(e) {
            edge.geom = keep;
        }
    }
    model.edge_geoms[keep].edges.extend(dropped.edges);
    model.bump_generation();

    debug!(?keep, ?drop, "joined edge geometries");
    Ok(())
}

/// Remove every edge-use at `v` whose two ends are both `v`. A loop left with
/// no edges becomes a point loop on `v`. Returns the number of edge-uses
/// removed.
#[instrument(skip(model))]
pub fn kill_zero_length_edges(model: &mut Model, v: VertexId) -> Result<usize, TopologyError> {
    let mut doomed = Vec::new();
    for e in model.edges_at_vertex(v)? {
        for &u in &model.edge(e)?.uses {
            let (a, b) = model.eu_endpoints(u)?;
            if a == b {
                doomed.push(u);
            }
        }
    }
    if doomed.is_empty() {
        return Ok(0);
    }

    let mut touched_edges = Vec::new();
    let mut emptied_loops = Vec::new();
    for &u in &doomed {
        let Some(removed) = model.edge_uses.remove(u) else {
            continue;
        };
        if let Some(vu) = model.vertex_uses.remove(removed.start) {
            if let Some(vert) = model.vertices.get_mut(vu.vertex) {
                vert.uses.retain(|&x| x != removed.start);
            }
        }
        if let Some(edge) = model.edges.get_mut(removed.edge) {
            edge.uses.retain(|&x| x != u);
        }
        if !touched_edges.contains(&removed.edge) {
            touched_edges.push(removed.edge);
        }
        match removed.parent {
            EdgeUseParent::LoopUse(lu) => {
                if let Some(l) = model.loop_uses.get_mut(lu) {
                    if let LoopKind::Edges(eus) = &mut l.kind {
                        eus.retain(|&x| x != u);
                        if eus.is_empty() {
                            emptied_loops.push(lu);
                        }
                    }
                }
            }
            EdgeUseParent::Shell(s) => {
                if let Some(shell) = model.shells.get_mut(s) {
                    shell.wire_edges.retain(|&x| x != u);
                }
            }
        }
    }

    for e in touched_edges {
        let empty = model.edges.get(e).is_some_and(|edge| edge.uses.is_empty());
        if empty {
            if let Some(edge) = model.edges.remove(e) {
                detach_edge_from_geom(model, edge.geom, e);
            }
        } else if model.edges.contains_key(e) {
            relink_mates(model, e)?;
        }
    }

    for lu in emptied_loops {
        if !model.vertices.contains_key(v) {
            break;
        }
        let vu = model.vertex_uses.insert(VertexUse {
            vertex: v,
            parent: VertexUseParent::LoopUse(lu),
        });
        model.vertices[v].uses.push(vu);
        model.loop_uses[lu].kind = LoopKind::Point(vu);
    }

    if model.vertices.get(v).is_some_and(|vert| vert.uses.is_empty()) {
        model.vertices.remove(v);
    }
    model.bump_generation();

    debug!(?v, removed = doomed.len(), "killed zero-length edge-uses");
    Ok(doomed.len())
}
