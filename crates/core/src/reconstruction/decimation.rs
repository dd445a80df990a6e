//! Quadric-error mesh decimation (Garland and Heckbert).
//!
//! Every vertex accumulates the squared-distance quadrics of the planes of
//! its incident triangles. Edges are collapsed cheapest first into the point
//! minimizing the summed quadric, until the triangle budget is met. A
//! collapse that would flip or flatten a surviving triangle is skipped.

use crate::reconstruction::geometry::{edge_key, Mesh};
use nalgebra::{Matrix4, Point3, RowVector4, Vector3, Vector4};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use tracing::debug;

/// A pending edge collapse.
///
/// Ordered so that `BinaryHeap` pops the cheapest collapse first. The
/// version stamps go stale when either endpoint changes, which invalidates
/// the entry lazily.
#[derive(Debug, Clone)]
struct Collapse {
    cost: f64,
    keep: usize,
    remove: usize,
    versions: (u32, u32),
    position: Point3<f64>,
}

impl PartialEq for Collapse {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Collapse {}

impl PartialOrd for Collapse {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Collapse {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.keep.cmp(&self.keep))
            .then_with(|| other.remove.cmp(&self.remove))
    }
}

struct Decimator {
    positions: Vec<Point3<f64>>,
    quadrics: Vec<Matrix4<f64>>,
    versions: Vec<u32>,
    vertex_alive: Vec<bool>,
    vertex_triangles: Vec<Vec<usize>>,
    triangles: Vec<[usize; 3]>,
    triangle_alive: Vec<bool>,
    live_triangles: usize,
    heap: BinaryHeap<Collapse>,
}

/// Simplify `mesh` to at most `target_triangles` triangles.
///
/// Meshes already within budget are returned unchanged. Unreferenced
/// vertices are dropped from the result, and vertex normals are recomputed
/// when the input carried them. The budget may be missed when every
/// remaining collapse would fold the surface.
pub fn decimate(mesh: &Mesh, target_triangles: usize) -> Mesh {
    if mesh.num_triangles() <= target_triangles {
        return mesh.clone();
    }

    let mut decimator = Decimator::new(mesh);
    decimator.run(target_triangles);
    debug!(
        before = mesh.num_triangles(),
        after = decimator.live_triangles,
        target = target_triangles,
        "quadric decimation finished"
    );

    let mut result = decimator.into_mesh();
    if mesh.vertex_normals.is_some() {
        result.compute_vertex_normals();
    }
    result
}

impl Decimator {
    fn new(mesh: &Mesh) -> Self {
        let n = mesh.num_vertices();
        let mut quadrics = vec![Matrix4::zeros(); n];
        let mut vertex_triangles = vec![Vec::new(); n];

        for (t, tri) in mesh.triangles.iter().enumerate() {
            if let Some(plane) = plane_quadric(&mesh.vertices, tri) {
                for &v in tri {
                    quadrics[v] += plane;
                }
            }
            for &v in tri {
                vertex_triangles[v].push(t);
            }
        }

        let mut decimator = Self {
            positions: mesh.vertices.clone(),
            quadrics,
            versions: vec![0; n],
            vertex_alive: vec![true; n],
            vertex_triangles,
            triangles: mesh.triangles.clone(),
            triangle_alive: vec![true; mesh.num_triangles()],
            live_triangles: mesh.num_triangles(),
            heap: BinaryHeap::new(),
        };

        let mut edges = HashSet::new();
        for tri in &mesh.triangles {
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                if a != b {
                    edges.insert(edge_key(a, b));
                }
            }
        }
        for (a, b) in edges {
            let collapse = decimator.plan(a, b);
            decimator.heap.push(collapse);
        }
        decimator
    }

    fn run(&mut self, target: usize) {
        while self.live_triangles > target {
            let Some(collapse) = self.heap.pop() else {
                break;
            };
            let (keep, remove) = (collapse.keep, collapse.remove);
            if !self.vertex_alive[keep]
                || !self.vertex_alive[remove]
                || collapse.versions != (self.versions[keep], self.versions[remove])
            {
                continue;
            }
            if self.folds(keep, remove, &collapse.position) {
                continue;
            }
            self.collapse(keep, remove, collapse.position);
        }
    }

    fn plan(&self, a: usize, b: usize) -> Collapse {
        let q = self.quadrics[a] + self.quadrics[b];
        let position = optimal_position(&q).unwrap_or_else(|| {
            let (pa, pb) = (self.positions[a], self.positions[b]);
            let mid = Point3::from((pa.coords + pb.coords) * 0.5);
            [pa, pb, mid]
                .into_iter()
                .min_by(|x, y| quadric_error(&q, x).total_cmp(&quadric_error(&q, y)))
                .unwrap_or(mid)
        });

        Collapse {
            cost: quadric_error(&q, &position),
            keep: a,
            remove: b,
            versions: (self.versions[a], self.versions[b]),
            position,
        }
    }

    fn live_triangles_of(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
        self.vertex_triangles[v]
            .iter()
            .copied()
            .filter(move |&t| self.triangle_alive[t])
    }

    /// Whether moving both endpoints to `position` would flip or flatten a
    /// triangle that survives the collapse.
    fn folds(&self, keep: usize, remove: usize, position: &Point3<f64>) -> bool {
        for v in [keep, remove] {
            for t in self.live_triangles_of(v) {
                let tri = self.triangles[t];
                if tri.contains(&keep) && tri.contains(&remove) {
                    continue;
                }
                let corners = tri.map(|c| self.positions[c]);
                let before = normal_of(&corners);
                let moved = tri.map(|c| if c == v { *position } else { self.positions[c] });
                let after = normal_of(&moved);

                let scale = before.norm();
                if scale == 0.0 {
                    continue;
                }
                if after.norm() <= scale * 1e-9 || before.dot(&after) <= 0.0 {
                    return true;
                }
            }
        }
        false
    }

    fn collapse(&mut self, keep: usize, remove: usize, position: Point3<f64>) {
        let removed_triangles: Vec<usize> = self.live_triangles_of(remove).collect();
        for t in removed_triangles {
            if self.triangles[t].contains(&keep) {
                self.triangle_alive[t] = false;
                self.live_triangles -= 1;
            } else {
                for corner in self.triangles[t].iter_mut() {
                    if *corner == remove {
                        *corner = keep;
                    }
                }
                self.vertex_triangles[keep].push(t);
            }
        }

        self.vertex_alive[remove] = false;
        self.vertex_triangles[remove].clear();
        self.positions[keep] = position;
        self.quadrics[keep] = self.quadrics[keep] + self.quadrics[remove];
        self.versions[keep] += 1;
        self.versions[remove] += 1;

        let neighbors: HashSet<usize> = self
            .live_triangles_of(keep)
            .flat_map(|t| self.triangles[t])
            .filter(|&v| v != keep)
            .collect();
        for n in neighbors {
            let collapse = self.plan(keep, n);
            self.heap.push(collapse);
        }
    }

    fn into_mesh(self) -> Mesh {
        let mut remap = vec![usize::MAX; self.positions.len()];
        let mut vertices = Vec::new();
        let mut triangles = Vec::with_capacity(self.live_triangles);

        for (t, tri) in self.triangles.iter().enumerate() {
            if !self.triangle_alive[t] {
                continue;
            }
            let mapped = tri.map(|v| {
                if remap[v] == usize::MAX {
                    remap[v] = vertices.len();
                    vertices.push(self.positions[v]);
                }
                remap[v]
            });
            triangles.push(mapped);
        }

        Mesh::new(vertices, triangles)
    }
}

fn normal_of(corners: &[Point3<f64>; 3]) -> Vector3<f64> {
    (corners[1] - corners[0]).cross(&(corners[2] - corners[0]))
}

/// Fundamental error quadric of the triangle's plane.
fn plane_quadric(vertices: &[Point3<f64>], tri: &[usize; 3]) -> Option<Matrix4<f64>> {
    let corners = tri.map(|v| vertices[v]);
    let n = normal_of(&corners).try_normalize(f64::EPSILON)?;
    let d = -n.dot(&corners[0].coords);
    let plane = Vector4::new(n.x, n.y, n.z, d);
    Some(plane * plane.transpose())
}

fn quadric_error(q: &Matrix4<f64>, p: &Point3<f64>) -> f64 {
    let v = p.to_homogeneous();
    (v.transpose() * q * v)[0]
}

/// Point minimizing the quadric, or `None` if the system is singular.
fn optimal_position(q: &Matrix4<f64>) -> Option<Point3<f64>> {
    let mut m = *q;
    m.set_row(3, &RowVector4::new(0.0, 0.0, 0.0, 1.0));
    if m.determinant().abs() < 1e-12 {
        return None;
    }
    let v = m.try_inverse()? * Vector4::new(0.0, 0.0, 0.0, 1.0);
    Some(Point3::new(v.x, v.y, v.z))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `n` by `n` quads in the z = 0 plane, two triangles each.
    fn plane_mesh(n: usize) -> Mesh {
        let mut vertices = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                vertices.push(Point3::new(i as f64, j as f64, 0.0));
            }
        }
        let idx = |i: usize, j: usize| j * (n + 1) + i;
        let mut triangles = Vec::new();
        for j in 0..n {
            for i in 0..n {
                triangles.push([idx(i, j), idx(i + 1, j), idx(i + 1, j + 1)]);
                triangles.push([idx(i, j), idx(i + 1, j + 1), idx(i, j + 1)]);
            }
        }
        Mesh::new(vertices, triangles)
    }

    #[test]
    fn test_decimate_plane_within_budget() {
        let mesh = plane_mesh(20);
        assert_eq!(mesh.num_triangles(), 800);

        let simplified = decimate(&mesh, 200);

        assert!(simplified.num_triangles() <= 200, "got {}", simplified.num_triangles());
        assert!(simplified.num_triangles() > 0);
        for v in &simplified.vertices {
            assert!(v.z.abs() < 1e-9, "vertex {v:?} left the plane");
        }
        for t in &simplified.triangles {
            assert!(simplified.face_cross(t).z > 0.0, "triangle {t:?} was flipped");
        }
    }

    #[test]
    fn test_decimate_within_budget_is_identity() {
        let mesh = plane_mesh(3);
        assert_eq!(decimate(&mesh, 100), mesh);
    }

    #[test]
    fn test_optimal_position_corner() {
        // Three orthogonal planes through (1, 2, 3).
        let mut q = Matrix4::zeros();
        for (n, d) in [
            (Vector3::x(), -1.0),
            (Vector3::y(), -2.0),
            (Vector3::z(), -3.0),
        ] {
            let plane = Vector4::new(n.x, n.y, n.z, d);
            q += plane * plane.transpose();
        }
        let p = optimal_position(&q).unwrap();
        assert!((p - Point3::new(1.0, 2.0, 3.0)).norm() < 1e-9);
        assert!(quadric_error(&q, &p).abs() < 1e-9);
    }

    #[test]
    fn test_singular_quadric_has_no_optimum() {
        let plane = Vector4::new(0.0, 0.0, 1.0, 0.0);
        assert!(optimal_position(&(plane * plane.transpose())).is_none());
    }

    #[test]
    fn test_heap_pops_cheapest_first() {
        let mut heap = BinaryHeap::new();
        for (cost, keep) in [(3.0, 0), (1.0, 1), (2.0, 2)] {
            heap.push(Collapse {
                cost,
                keep,
                remove: 9,
                versions: (0, 0),
                position: Point3::origin(),
            });
        }
        let order: Vec<usize> = std::iter::from_fn(|| heap.pop().map(|c| c.keep)).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }
}
