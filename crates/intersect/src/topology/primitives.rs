use tracing::{info, instrument};

use super::brep::*;
use super::mutators::relink_mates;
use crate::geometry::curves::Line3d;
use crate::geometry::point::Point3d;
use crate::geometry::surfaces::Plane;
use crate::geometry::transform::BoundingBox;

pub fn make_shell(model: &mut Model) -> ShellId {
    model.shells.insert(Shell::default())
}

/// A new vertex at `point`, held by a lone vertex-use in `shell`.
pub fn make_lone_vertex(model: &mut Model, shell: ShellId, point: Point3d) -> Result<VertexUseId, TopologyError> {
    let v = model.insert_vertex(point);
    make_lone_vertex_use(model, shell, v)
}

/// A lone vertex-use of an existing vertex in `shell`.
pub fn make_lone_vertex_use(model: &mut Model, shell: ShellId, v: VertexId) -> Result<VertexUseId, TopologyError> {
    model.vertex(v)?;
    model.shell(shell)?;
    let vu = model.vertex_uses.insert(VertexUse {
        vertex: v,
        parent: VertexUseParent::Shell(shell),
    });
    model.vertices[v].uses.push(vu);
    model.shells[shell].lone_vertices.push(vu);
    model.bump_generation();
    Ok(vu)
}

/// A face on fresh vertices at `points`, wound so the normal follows the
/// right-hand rule.
#[instrument(skip(model, points), fields(n = points.len()))]
pub fn make_face(model: &mut Model, shell: ShellId, points: &[Point3d]) -> Result<FaceUseId, TopologyError> {
    let verts: Vec<VertexId> = points.iter().map(|&p| model.insert_vertex(p)).collect();
    make_face_from_vertices(model, shell, &verts)
}

/// A face bounded by one loop through existing vertices. Edges already present
/// in `shell` between consecutive vertices are shared radially, not duplicated.
#[instrument(skip(model, verts), fields(n = verts.len()))]
pub fn make_face_from_vertices(
    model: &mut Model,
    shell: ShellId,
    verts: &[VertexId],
) -> Result<FaceUseId, TopologyError> {
    model.shell(shell)?;
    let points = verts
        .iter()
        .map(|&v| model.point_of(v))
        .collect::<Result<Vec<_>, _>>()?;
    let plane = Plane::newell(&points).ok_or(TopologyError::DegenerateFace)?;

    let geom = model.face_geoms.insert(FaceGeom {
        plane,
        faces: Vec::new(),
    });
    let face = model.faces.insert(Face {
        geom,
        flip: false,
        bbox: BoundingBox::from_points(&points),
        face_use: FaceUseId::default(),
    });
    let fu = model.face_uses.insert(FaceUse {
        face,
        shell,
        loops: Vec::new(),
    });
    model.faces[face].face_use = fu;
    model.face_geoms[geom].faces.push(face);
    model.shells[shell].face_uses.push(fu);

    build_edge_loop(model, fu, verts, false)?;
    model.refresh_face_bounds(face)?;

    info!(?fu, vertices = verts.len(), "created face");
    Ok(fu)
}

/// Add an inner boundary through existing vertices to a face.
#[instrument(skip(model, verts))]
pub fn add_hole(model: &mut Model, fu: FaceUseId, verts: &[VertexId]) -> Result<LoopUseId, TopologyError> {
    let lu = build_edge_loop(model, fu, verts, true)?;
    let face = model.face_use(fu)?.face;
    model.refresh_face_bounds(face)?;
    Ok(lu)
}

fn build_edge_loop(
    model: &mut Model,
    fu: FaceUseId,
    verts: &[VertexId],
    hole: bool,
) -> Result<LoopUseId, TopologyError> {
    if verts.len() < 3 {
        return Err(TopologyError::DegenerateFace);
    }
    let shell = model.face_use(fu)?.shell;

    // Resolve each side's edge before the new loop exists, so the search only
    // sees edges already in the shell.
    let mut sides = Vec::with_capacity(verts.len());
    for (i, &a) in verts.iter().enumerate() {
        let b = verts[(i + 1) % verts.len()];
        if a == b {
            return Err(TopologyError::ZeroLengthEdge);
        }
        sides.push((a, find_shell_edge(model, shell, a, b)?));
    }

    let lp = model.loops.insert(Loop {
        bbox: BoundingBox::empty(),
    });
    let lu = model.loop_uses.insert(LoopUse {
        lp,
        face_use: fu,
        hole,
        kind: LoopKind::Edges(Vec::new()),
    });
    model.face_uses[fu].loops.push(lu);

    let mut eus = Vec::with_capacity(verts.len());
    let mut edges = Vec::with_capacity(verts.len());
    for (i, &(a, existing)) in sides.iter().enumerate() {
        let b = verts[(i + 1) % verts.len()];
        let edge = match existing {
            Some(e) => e,
            None => {
                let line = Line3d::through(model.point_of(a)?, model.point_of(b)?)
                    .ok_or(TopologyError::ZeroLengthEdge)?;
                let geom = model.edge_geoms.insert(EdgeGeom {
                    line,
                    edges: Vec::new(),
                });
                let e = model.edges.insert(Edge {
                    geom,
                    uses: Vec::new(),
                });
                model.edge_geoms[geom].edges.push(e);
                e
            }
        };
        let eu = model.edge_uses.insert(EdgeUse {
            edge,
            start: VertexUseId::default(),
            mate: None,
            parent: EdgeUseParent::LoopUse(lu),
        });
        let vu = model.vertex_uses.insert(VertexUse {
            vertex: a,
            parent: VertexUseParent::EdgeUse(eu),
        });
        model.edge_uses[eu].start = vu;
        model.vertices[a].uses.push(vu);
        model.edges[edge].uses.push(eu);
        eus.push(eu);
        if !edges.contains(&edge) {
            edges.push(edge);
        }
    }
    model.loop_uses[lu].kind = LoopKind::Edges(eus);
    for e in edges {
        relink_mates(model, e)?;
    }
    model.bump_generation();
    Ok(lu)
}

fn find_shell_edge(model: &Model, shell: ShellId, a: VertexId, b: VertexId) -> Result<Option<EdgeId>, TopologyError> {
    for &fu in &model.shell(shell)?.face_uses {
        if let Some(eu) = model.find_edge_between(a, b, fu)? {
            return Ok(Some(model.edge_use(eu)?.edge));
        }
    }
    Ok(None)
}

/// A wire edge from `a` to `b` directly in `shell`, as a pair of mated uses.
/// Returns the use running `a` to `b`.
#[instrument(skip(model))]
pub fn make_wire_edge(model: &mut Model, shell: ShellId, a: VertexId, b: VertexId) -> Result<EdgeUseId, TopologyError> {
    model.shell(shell)?;
    let line = Line3d::through(model.point_of(a)?, model.point_of(b)?).ok_or(TopologyError::ZeroLengthEdge)?;
    let geom = model.edge_geoms.insert(EdgeGeom {
        line,
        edges: Vec::new(),
    });
    let edge = model.edges.insert(Edge {
        geom,
        uses: Vec::new(),
    });
    model.edge_geoms[geom].edges.push(edge);

    let mut pair = [EdgeUseId::default(); 2];
    for (slot, v) in pair.iter_mut().zip([a, b]) {
        let eu = model.edge_uses.insert(EdgeUse {
            edge,
            start: VertexUseId::default(),
            mate: None,
            parent: EdgeUseParent::Shell(shell),
        });
        let vu = model.vertex_uses.insert(VertexUse {
            vertex: v,
            parent: VertexUseParent::EdgeUse(eu),
        });
        model.edge_uses[eu].start = vu;
        model.vertices[v].uses.push(vu);
        model.edges[edge].uses.push(eu);
        model.shells[shell].wire_edges.push(eu);
        *slot = eu;
    }
    model.edge_uses[pair[0]].mate = Some(pair[1]);
    model.edge_uses[pair[1]].mate = Some(pair[0]);
    model.bump_generation();
    Ok(pair[0])
}

/// A closed axis-aligned box shell with outward-facing faces and shared edges.
#[instrument(skip(model))]
pub fn make_box_shell(model: &mut Model, min: Point3d, max: Point3d) -> Result<ShellId, TopologyError> {
    let shell = make_shell(model);
    let corners = [
        Point3d::new(min.x, min.y, min.z),
        Point3d::new(max.x, min.y, min.z),
        Point3d::new(max.x, max.y, min.z),
        Point3d::new(min.x, max.y, min.z),
        Point3d::new(min.x, min.y, max.z),
        Point3d::new(max.x, min.y, max.z),
        Point3d::new(max.x, max.y, max.z),
        Point3d::new(min.x, max.y, max.z),
    ];
    let v: Vec<VertexId> = corners.iter().map(|&p| model.insert_vertex(p)).collect();
    let sides: [[usize; 4]; 6] = [
        [0, 3, 2, 1], // z = min
        [4, 5, 6, 7], // z = max
        [0, 4, 7, 3], // x = min
        [1, 2, 6, 5], // x = max
        [0, 1, 5, 4], // y = min
        [3, 7, 6, 2], // y = max
    ];
    for side in sides {
        let verts = side.map(|i| v[i]);
        make_face_from_vertices(model, shell, &verts)?;
    }
    Ok(shell)
}
