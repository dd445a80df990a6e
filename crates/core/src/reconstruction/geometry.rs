//! Point cloud and triangle mesh containers.

use nalgebra::{Point3, Vector3};
use std::collections::{HashMap, HashSet};

/// Ordered set of 3-D points with optional per-point normals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<Point3<f64>>,
    pub normals: Option<Vec<Vector3<f64>>>,
}

impl PointCloud {
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        Self {
            points,
            normals: None,
        }
    }

    pub fn with_normals(points: Vec<Point3<f64>>, normals: Vec<Vector3<f64>>) -> Self {
        Self {
            points,
            normals: Some(normals),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether every point carries a normal.
    pub fn has_normals(&self) -> bool {
        self.normals
            .as_ref()
            .is_some_and(|normals| normals.len() == self.points.len())
    }

    pub fn centroid(&self) -> Point3<f64> {
        if self.points.is_empty() {
            return Point3::origin();
        }
        let sum = self
            .points
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords);
        Point3::from(sum / self.points.len() as f64)
    }
}

/// Undirected edge key with the smaller vertex index first.
pub type EdgeKey = (usize, usize);

pub fn edge_key(a: usize, b: usize) -> EdgeKey {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Triangle mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Point3<f64>>,
    pub triangles: Vec<[usize; 3]>,
    /// Per-vertex normals, either derived or carried over from the source cloud.
    pub vertex_normals: Option<Vec<Vector3<f64>>>,
}

impl Mesh {
    pub fn new(vertices: Vec<Point3<f64>>, triangles: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            triangles,
            vertex_normals: None,
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Unnormalized face normal; its length is twice the triangle area.
    pub fn face_cross(&self, triangle: &[usize; 3]) -> Vector3<f64> {
        let v0 = self.vertices[triangle[0]];
        let v1 = self.vertices[triangle[1]];
        let v2 = self.vertices[triangle[2]];
        (v1 - v0).cross(&(v2 - v0))
    }

    pub fn triangle_area(&self, index: usize) -> f64 {
        self.face_cross(&self.triangles[index]).norm() * 0.5
    }

    pub fn surface_area(&self) -> f64 {
        (0..self.triangles.len()).map(|i| self.triangle_area(i)).sum()
    }

    /// Compute vertex normals by averaging area-weighted face normals.
    pub fn compute_vertex_normals(&mut self) {
        let mut normals = vec![Vector3::zeros(); self.vertices.len()];
        for triangle in &self.triangles {
            let n = self.face_cross(triangle);
            for &v in triangle {
                normals[v] += n;
            }
        }
        for n in normals.iter_mut() {
            if let Some(unit) = n.try_normalize(f64::EPSILON) {
                *n = unit;
            }
        }
        self.vertex_normals = Some(normals);
    }

    /// Map from each undirected edge to the triangles using it.
    pub fn edge_triangles(&self) -> HashMap<EdgeKey, Vec<usize>> {
        let mut map: HashMap<EdgeKey, Vec<usize>> = HashMap::new();
        for (t, tri) in self.triangles.iter().enumerate() {
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                if a == b {
                    continue;
                }
                map.entry(edge_key(a, b)).or_default().push(t);
            }
        }
        map
    }

    /// Edges shared by more than two triangles.
    pub fn non_manifold_edges(&self) -> Vec<EdgeKey> {
        let mut edges: Vec<EdgeKey> = self
            .edge_triangles()
            .into_iter()
            .filter(|(_, tris)| tris.len() > 2)
            .map(|(edge, _)| edge)
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Number of vertices whose exact coordinates repeat an earlier vertex.
    pub fn duplicated_vertex_count(&self) -> usize {
        let mut seen = HashSet::with_capacity(self.vertices.len());
        self.vertices
            .iter()
            .filter(|v| !seen.insert(coordinate_key(v)))
            .count()
    }

    /// Axis-aligned bounds, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = *self.vertices.first()?;
        Some(self.vertices.iter().fold((first, first), |(min, max), v| {
            (min.inf(v), max.sup(v))
        }))
    }
}

/// Hashable key of exact coordinates. `-0.0` and `0.0` map to the same key.
pub fn coordinate_key(p: &Point3<f64>) -> [u64; 3] {
    [
        (p.x + 0.0).to_bits(),
        (p.y + 0.0).to_bits(),
        (p.z + 0.0).to_bits(),
    ]
}

/// Evenly distributed points on a sphere with outward normals.
pub fn fibonacci_sphere(center: Point3<f64>, radius: f64, count: usize) -> PointCloud {
    let golden_angle = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    let mut points = Vec::with_capacity(count);
    let mut normals = Vec::with_capacity(count);

    for i in 0..count {
        let y = 1.0 - (i as f64 + 0.5) / count as f64 * 2.0;
        let ring = (1.0 - y * y).max(0.0).sqrt();
        let theta = golden_angle * i as f64;
        let dir = Vector3::new(theta.cos() * ring, y, theta.sin() * ring);
        points.push(center + dir * radius);
        normals.push(dir);
    }

    PointCloud::with_normals(points, normals)
}
