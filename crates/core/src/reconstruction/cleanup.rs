//! Topological mesh cleanup.
//!
//! [`clean_mesh`] applies the passes in a fixed order: degenerate
//! triangles, duplicated triangles, duplicated vertices, non-manifold
//! edges. Duplicates must be gone before the non-manifold pass, otherwise
//! repeated geometry is reported as extra triangles on an edge.

use crate::reconstruction::geometry::{coordinate_key, Mesh};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// What each cleanup pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub degenerate_triangles: usize,
    pub duplicated_triangles: usize,
    pub duplicated_vertices: usize,
    pub non_manifold_triangles: usize,
}

/// Run every cleanup pass in order.
pub fn clean_mesh(mesh: &mut Mesh) -> CleanupReport {
    CleanupReport {
        degenerate_triangles: remove_degenerate_triangles(mesh),
        duplicated_triangles: remove_duplicated_triangles(mesh),
        duplicated_vertices: remove_duplicated_vertices(mesh),
        non_manifold_triangles: remove_non_manifold_edges(mesh),
    }
}

/// Remove triangles that use a vertex index more than once.
pub fn remove_degenerate_triangles(mesh: &mut Mesh) -> usize {
    let before = mesh.triangles.len();
    mesh.triangles
        .retain(|t| t[0] != t[1] && t[1] != t[2] && t[0] != t[2]);
    before - mesh.triangles.len()
}

/// Remove triangles over the same vertex set as an earlier one, whatever
/// their winding.
pub fn remove_duplicated_triangles(mesh: &mut Mesh) -> usize {
    let before = mesh.triangles.len();
    let mut seen = HashSet::with_capacity(before);
    mesh.triangles.retain(|t| {
        let mut key = *t;
        key.sort_unstable();
        seen.insert(key)
    });
    before - mesh.triangles.len()
}

/// Merge vertices with identical coordinates into the first occurrence.
///
/// Triangle indices are rewritten; normals of merged vertices are dropped.
pub fn remove_duplicated_vertices(mesh: &mut Mesh) -> usize {
    let before = mesh.vertices.len();
    let mut first_by_position: HashMap<[u64; 3], usize> = HashMap::with_capacity(before);
    let mut remap = Vec::with_capacity(before);
    let mut keep = Vec::with_capacity(before);

    for (i, v) in mesh.vertices.iter().enumerate() {
        let next = first_by_position.len();
        let target = *first_by_position.entry(coordinate_key(v)).or_insert(next);
        if target == next {
            keep.push(i);
        }
        remap.push(target);
    }
    if keep.len() == before {
        return 0;
    }

    mesh.vertices = keep.iter().map(|&i| mesh.vertices[i]).collect();
    if let Some(normals) = mesh.vertex_normals.as_mut() {
        if normals.len() == before {
            *normals = keep.iter().map(|&i| normals[i]).collect();
        }
    }
    for t in mesh.triangles.iter_mut() {
        for v in t.iter_mut() {
            *v = remap[*v];
        }
    }
    before - mesh.vertices.len()
}

/// Make every edge manifold by deleting the smallest triangles on edges
/// shared by more than two.
pub fn remove_non_manifold_edges(mesh: &mut Mesh) -> usize {
    let mut edges: Vec<_> = mesh
        .edge_triangles()
        .into_iter()
        .filter(|(_, tris)| tris.len() > 2)
        .collect();
    if edges.is_empty() {
        return 0;
    }
    edges.sort_unstable_by_key(|(edge, _)| *edge);

    let areas: Vec<f64> = (0..mesh.triangles.len())
        .map(|t| mesh.triangle_area(t))
        .collect();
    let mut removed = HashSet::new();

    for (_, tris) in edges {
        let mut live: Vec<usize> = tris.into_iter().filter(|t| !removed.contains(t)).collect();
        if live.len() <= 2 {
            continue;
        }
        live.sort_by(|&a, &b| areas[a].total_cmp(&areas[b]).then(a.cmp(&b)));
        let excess = live.len() - 2;
        removed.extend(live.into_iter().take(excess));
    }

    let mut index = 0;
    mesh.triangles.retain(|_| {
        let keep = !removed.contains(&index);
        index += 1;
        keep
    });
    removed.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};

    /// Tetrahedron stored as a triangle soup: every face has its own copy of
    /// its three corners.
    fn tetrahedron_soup() -> Mesh {
        let corners = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let faces = [[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]];
        let mut vertices = Vec::new();
        let mut triangles = Vec::new();
        for face in faces {
            let base = vertices.len();
            vertices.extend(face.iter().map(|&c| corners[c]));
            triangles.push([base, base + 1, base + 2]);
        }
        Mesh::new(vertices, triangles)
    }

    #[test]
    fn test_soup_cleanup_order() {
        let mut mesh = tetrahedron_soup();
        assert_eq!(mesh.duplicated_vertex_count(), 8);

        let report = clean_mesh(&mut mesh);

        assert_eq!(report.duplicated_vertices, 8);
        assert_eq!(report.non_manifold_triangles, 0);
        assert_eq!(mesh.duplicated_vertex_count(), 0);
        assert!(mesh.non_manifold_edges().is_empty());
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_triangles(), 4);
    }

    #[test]
    fn test_degenerate_and_duplicated_triangles() {
        let mut mesh = Mesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [2, 1, 0], [0, 0, 1], [1, 2, 0]],
        );

        assert_eq!(remove_degenerate_triangles(&mut mesh), 1);
        assert_eq!(remove_duplicated_triangles(&mut mesh), 2);
        assert_eq!(mesh.triangles, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_duplicated_vertices_keep_normals_aligned() {
        let mut mesh = Mesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[2, 1, 3]],
        );
        mesh.vertex_normals = Some(vec![Vector3::x(), Vector3::y(), Vector3::z(), Vector3::y()]);

        assert_eq!(remove_duplicated_vertices(&mut mesh), 1);
        assert_eq!(mesh.triangles, vec![[0, 1, 2]]);
        assert_eq!(
            mesh.vertex_normals,
            Some(vec![Vector3::x(), Vector3::y(), Vector3::y()])
        );
    }

    #[test]
    fn test_non_manifold_edge_keeps_two_largest() {
        // Four fins on the edge (0, 1); the two smallest must go.
        let mut mesh = Mesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
                Point3::new(0.5, -3.0, 0.0),
                Point3::new(0.5, 0.0, 0.5),
                Point3::new(0.5, 0.0, -2.0),
            ],
            vec![[0, 1, 2], [1, 0, 3], [0, 1, 4], [1, 0, 5]],
        );
        assert_eq!(mesh.non_manifold_edges(), vec![(0, 1)]);

        assert_eq!(remove_non_manifold_edges(&mut mesh), 2);
        assert_eq!(mesh.triangles, vec![[1, 0, 3], [1, 0, 5]]);
        assert!(mesh.non_manifold_edges().is_empty());
    }
}
