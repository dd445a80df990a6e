//! Ball-pivoting surface reconstruction.
//!
//! A ball of radius `r` is rolled over the oriented point set. Three points
//! touched by the ball with no other point inside it form a triangle; the
//! ball then pivots around each boundary edge of the growing front until it
//! touches a new point. Several radii may be given, smallest first: each
//! larger ball first retries the border edges the smaller ball gave up on,
//! then continues the front, then looks for new seeds.

use crate::reconstruction::geometry::{edge_key, EdgeKey, Mesh};
use crate::reconstruction::spatial::PointIndex;
use nalgebra::{Point3, Vector3};
use std::collections::{HashMap, VecDeque};
use std::f64::consts::TAU;
use tracing::debug;

const EPS: f64 = 1e-16;

/// Ball radii scaled from the mean nearest-neighbour distance.
///
/// Returns `factor * average_spacing * scale` for every scale, in order.
pub fn pivot_radii(average_spacing: f64, factor: f64, scales: &[f64]) -> Vec<f64> {
    scales
        .iter()
        .map(|scale| factor * average_spacing * scale)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VertexKind {
    Orphan,
    Front,
    Inner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeKind {
    /// Used by one triangle and still on the front.
    Front,
    /// Used by one triangle; pivoting found nothing at the current radius.
    Border,
    /// Used by two triangles.
    Inner,
}

#[derive(Debug, Clone)]
struct Edge {
    source: usize,
    target: usize,
    triangles: [Option<usize>; 2],
    kind: EdgeKind,
}

#[derive(Debug, Clone)]
struct Triangle {
    vertices: [usize; 3],
    ball_center: Point3<f64>,
}

struct BallPivoting<'a> {
    points: &'a [Point3<f64>],
    normals: &'a [Vector3<f64>],
    index: PointIndex,
    vertex_kinds: Vec<VertexKind>,
    vertex_edges: Vec<Vec<usize>>,
    edges: Vec<Edge>,
    edge_lookup: HashMap<EdgeKey, usize>,
    triangles: Vec<Triangle>,
    faces: Vec<[usize; 3]>,
    front: VecDeque<usize>,
    border: Vec<usize>,
}

/// Reconstruct a triangle mesh from an oriented point set.
///
/// `normals` must have one entry per point. The returned mesh keeps every
/// input point as a vertex (unused ones included) and carries the input
/// normals as vertex normals. Faces are wound to agree with the normals.
pub fn ball_pivoting(points: &[Point3<f64>], normals: &[Vector3<f64>], radii: &[f64]) -> Mesh {
    let mut mesh = Mesh::new(points.to_vec(), Vec::new());
    mesh.vertex_normals = Some(normals.to_vec());
    if points.len() < 3 || normals.len() != points.len() {
        return mesh;
    }

    let mut bpa = BallPivoting::new(points, normals);
    for &radius in radii {
        if !(radius.is_finite() && radius > 0.0) {
            continue;
        }
        bpa.run_radius(radius);
        debug!(
            radius,
            triangles = bpa.faces.len(),
            border_edges = bpa.border.len(),
            "ball pivoting pass finished"
        );
    }

    mesh.triangles = bpa.faces;
    mesh
}

impl<'a> BallPivoting<'a> {
    fn new(points: &'a [Point3<f64>], normals: &'a [Vector3<f64>]) -> Self {
        Self {
            points,
            normals,
            index: PointIndex::new(points),
            vertex_kinds: vec![VertexKind::Orphan; points.len()],
            vertex_edges: vec![Vec::new(); points.len()],
            edges: Vec::new(),
            edge_lookup: HashMap::new(),
            triangles: Vec::new(),
            faces: Vec::new(),
            front: VecDeque::new(),
            border: Vec::new(),
        }
    }

    fn run_radius(&mut self, radius: f64) {
        self.reopen_border_edges(radius);
        if self.front.is_empty() {
            self.find_seed_triangles(radius);
        } else {
            self.expand_triangulation(radius);
            self.find_seed_triangles(radius);
        }
    }

    /// Move border edges back to the front where the larger ball fits.
    fn reopen_border_edges(&mut self, radius: f64) {
        let border = std::mem::take(&mut self.border);
        for edge_id in border {
            let reopen = self.edges[edge_id].triangles[0].is_some_and(|t| {
                let [a, b, c] = self.triangles[t].vertices;
                self.ball_center(a, b, c, radius)
                    .is_some_and(|center| self.ball_is_empty(&center, radius, &[a, b, c]))
            });
            if reopen {
                self.edges[edge_id].kind = EdgeKind::Front;
                self.front.push_back(edge_id);
            } else {
                self.border.push(edge_id);
            }
        }
    }

    fn find_seed_triangles(&mut self, radius: f64) {
        for v in 0..self.points.len() {
            if self.vertex_kinds[v] == VertexKind::Orphan && self.try_seed(v, radius) {
                self.expand_triangulation(radius);
            }
        }
    }

    fn try_seed(&mut self, v: usize, radius: f64) -> bool {
        let neighbors = self.sorted_neighbors(&self.points[v], 2.0 * radius);
        if neighbors.len() < 3 {
            return false;
        }

        for (i, &n0) in neighbors.iter().enumerate() {
            if n0 == v || self.vertex_kinds[n0] != VertexKind::Orphan {
                continue;
            }

            let mut found = None;
            for &n1 in &neighbors[i + 1..] {
                if n1 == v || self.vertex_kinds[n1] != VertexKind::Orphan {
                    continue;
                }
                if let Some(center) = self.try_triangle_seed(v, n0, n1, &neighbors, radius) {
                    found = Some((n1, center));
                    break;
                }
            }

            let Some((n1, center)) = found else {
                continue;
            };
            let blocked = [(v, n1), (n0, n1), (v, n0)].iter().any(|&(a, b)| {
                self.linking_edge(a, b)
                    .is_some_and(|e| self.edges[e].kind != EdgeKind::Front)
            });
            if blocked {
                continue;
            }

            self.create_triangle(v, n0, n1, center);
            for (a, b) in [(v, n1), (n0, n1), (v, n0)] {
                if let Some(e) = self.linking_edge(a, b) {
                    if self.edges[e].kind == EdgeKind::Front {
                        self.front.push_front(e);
                    }
                }
            }
            if !self.front.is_empty() {
                return true;
            }
        }
        false
    }

    fn try_triangle_seed(
        &self,
        v0: usize,
        v1: usize,
        v2: usize,
        neighbors: &[usize],
        radius: f64,
    ) -> Option<Point3<f64>> {
        if !self.is_compatible(v0, v1, v2) {
            return None;
        }
        let inner = [(v0, v2), (v1, v2)].iter().any(|&(a, b)| {
            self.linking_edge(a, b)
                .is_some_and(|e| self.edges[e].kind == EdgeKind::Inner)
        });
        if inner {
            return None;
        }

        let center = self.ball_center(v0, v1, v2, radius)?;
        let empty = neighbors.iter().all(|&n| {
            n == v0 || n == v1 || n == v2 || (center - self.points[n]).norm() >= radius - EPS
        });
        empty.then_some(center)
    }

    fn expand_triangulation(&mut self, radius: f64) {
        while let Some(edge_id) = self.front.pop_front() {
            if self.edges[edge_id].kind != EdgeKind::Front {
                continue;
            }
            let (source, target) = (self.edges[edge_id].source, self.edges[edge_id].target);

            let candidate = self.find_candidate(edge_id, radius).filter(|&(c, _)| {
                self.vertex_kinds[c] != VertexKind::Inner && self.is_compatible(c, source, target)
            });
            let Some((candidate, center)) = candidate else {
                self.mark_border(edge_id);
                continue;
            };

            let blocked = [source, target].iter().any(|&end| {
                self.linking_edge(candidate, end)
                    .is_some_and(|e| self.edges[e].kind != EdgeKind::Front)
            });
            if blocked {
                self.mark_border(edge_id);
                continue;
            }

            self.create_triangle(source, target, candidate, center);
            for end in [source, target] {
                if let Some(e) = self.linking_edge(candidate, end) {
                    if self.edges[e].kind == EdgeKind::Front {
                        self.front.push_front(e);
                    }
                }
            }
        }
    }

    fn mark_border(&mut self, edge_id: usize) {
        self.edges[edge_id].kind = EdgeKind::Border;
        self.border.push(edge_id);
    }

    /// Pivot the ball of the edge's triangle around the edge.
    ///
    /// Returns the first point hit together with the new ball center.
    fn find_candidate(&self, edge_id: usize, radius: f64) -> Option<(usize, Point3<f64>)> {
        let edge = &self.edges[edge_id];
        let triangle = &self.triangles[edge.triangles[0]?];
        let (src, tgt) = (edge.source, edge.target);
        let opposite = self.opposite_vertex(edge_id)?;

        let (ps, pt, po) = (self.points[src], self.points[tgt], self.points[opposite]);
        let mid = Point3::from((ps.coords + pt.coords) * 0.5);
        let axis = (pt - ps).try_normalize(EPS)?;
        let start = (triangle.ball_center - mid).try_normalize(EPS)?;

        let neighbors = self.sorted_neighbors(&mid, 2.0 * radius);
        let mut best: Option<(usize, Point3<f64>)> = None;
        let mut best_angle = TAU;

        for &c in &neighbors {
            if c == src || c == tgt || c == opposite {
                continue;
            }
            let pc = self.points[c];
            if points_coplanar(&ps, &pt, &po, &pc)
                && (segment_distance(&mid, &pc, &ps, &po) < 1e-12
                    || segment_distance(&mid, &pc, &pt, &po) < 1e-12)
            {
                continue;
            }

            let Some(center) = self.ball_center(src, tgt, c, radius) else {
                continue;
            };
            let Some(dir) = (center - mid).try_normalize(EPS) else {
                continue;
            };
            let mut angle = start.dot(&dir).clamp(-1.0, 1.0).acos();
            if start.cross(&dir).dot(&axis) < 0.0 {
                angle = TAU - angle;
            }
            if angle >= best_angle {
                continue;
            }

            let empty = neighbors.iter().all(|&n| {
                n == src || n == tgt || n == c || (center - self.points[n]).norm() >= radius - EPS
            });
            if empty {
                best_angle = angle;
                best = Some((c, center));
            }
        }
        best
    }

    fn create_triangle(&mut self, v0: usize, v1: usize, v2: usize, ball_center: Point3<f64>) {
        let triangle = self.triangles.len();
        self.triangles.push(Triangle {
            vertices: [v0, v1, v2],
            ball_center,
        });

        self.attach_edge(v0, v1, triangle);
        self.attach_edge(v1, v2, triangle);
        self.attach_edge(v2, v0, triangle);
        for v in [v0, v1, v2] {
            self.update_vertex_kind(v);
        }

        let outward = face_normal(&self.points[v0], &self.points[v1], &self.points[v2])
            .map_or(true, |n| n.dot(&self.normals[v0]) > -EPS);
        self.faces
            .push(if outward { [v0, v1, v2] } else { [v0, v2, v1] });
    }

    fn attach_edge(&mut self, v0: usize, v1: usize, triangle: usize) {
        let edge_id = match self.linking_edge(v0, v1) {
            Some(id) => id,
            None => {
                let id = self.edges.len();
                self.edges.push(Edge {
                    source: v0,
                    target: v1,
                    triangles: [None, None],
                    kind: EdgeKind::Front,
                });
                self.edge_lookup.insert(edge_key(v0, v1), id);
                self.vertex_edges[v0].push(id);
                self.vertex_edges[v1].push(id);
                id
            }
        };

        let edge = &mut self.edges[edge_id];
        let slots = edge.triangles;
        if slots.contains(&Some(triangle)) {
            return;
        }
        match slots {
            [None, _] => {
                edge.triangles[0] = Some(triangle);
                edge.kind = EdgeKind::Front;
                self.orient_edge(edge_id);
            }
            [Some(_), None] => {
                edge.triangles[1] = Some(triangle);
                edge.kind = EdgeKind::Inner;
            }
            // Guarded against by the callers' edge-kind checks.
            [Some(_), Some(_)] => debug!(edge_id, "edge already has two triangles"),
        }
    }

    /// Order the edge so that pivoting around source->target rotates away
    /// from its first triangle.
    fn orient_edge(&mut self, edge_id: usize) {
        let Some(opposite) = self.opposite_vertex(edge_id) else {
            return;
        };
        let edge = &self.edges[edge_id];
        let (ps, pt, po) = (
            self.points[edge.source],
            self.points[edge.target],
            self.points[opposite],
        );
        let Some(tri_normal) = (pt - ps).cross(&(po - ps)).try_normalize(EPS) else {
            return;
        };
        let point_normal = self.normals[edge.source] + self.normals[edge.target];
        if point_normal.dot(&tri_normal) < 0.0 {
            let edge = &mut self.edges[edge_id];
            std::mem::swap(&mut edge.source, &mut edge.target);
        }
    }

    fn opposite_vertex(&self, edge_id: usize) -> Option<usize> {
        let edge = &self.edges[edge_id];
        let triangle = &self.triangles[edge.triangles[0]?];
        triangle
            .vertices
            .iter()
            .copied()
            .find(|&v| v != edge.source && v != edge.target)
    }

    fn update_vertex_kind(&mut self, v: usize) {
        let edges = &self.vertex_edges[v];
        self.vertex_kinds[v] = if edges.is_empty() {
            VertexKind::Orphan
        } else if edges.iter().any(|&e| self.edges[e].kind != EdgeKind::Inner) {
            VertexKind::Front
        } else {
            VertexKind::Inner
        };
    }

    fn linking_edge(&self, a: usize, b: usize) -> Option<usize> {
        self.edge_lookup.get(&edge_key(a, b)).copied()
    }

    /// The triangle normal must not oppose any of the three point normals.
    fn is_compatible(&self, v0: usize, v1: usize, v2: usize) -> bool {
        let Some(mut normal) = face_normal(&self.points[v0], &self.points[v1], &self.points[v2]) else {
            return false;
        };
        if normal.dot(&self.normals[v0]) < -EPS {
            normal = -normal;
        }
        [v0, v1, v2]
            .iter()
            .all(|&v| normal.dot(&self.normals[v]) > -EPS)
    }

    /// Center of the ball of `radius` touching the three points, on the side
    /// their normals point to.
    fn ball_center(&self, i1: usize, i2: usize, i3: usize, radius: f64) -> Option<Point3<f64>> {
        let (v1, v2, v3) = (self.points[i1], self.points[i2], self.points[i3]);

        let c = (v2 - v1).norm_squared();
        let b = (v1 - v3).norm_squared();
        let a = (v3 - v2).norm_squared();

        let alpha = a * (b + c - a);
        let beta = b * (a + c - b);
        let gamma = c * (a + b - c);
        let abg = alpha + beta + gamma;
        if abg < EPS {
            return None;
        }
        let circumcenter = Point3::from((v1.coords * alpha + v2.coords * beta + v3.coords * gamma) / abg);

        let (sa, sb, sc) = (a.sqrt(), b.sqrt(), c.sqrt());
        let denom = (sa + sb + sc) * (sb + sc - sa) * (sc + sa - sb) * (sa + sb - sc);
        if denom <= 0.0 {
            return None;
        }
        let height2 = radius * radius - a * b * c / denom;
        if height2 < 0.0 {
            return None;
        }

        let mut tri_normal = (v2 - v1).cross(&(v3 - v1)).try_normalize(EPS)?;
        let point_normal = self.normals[i1] + self.normals[i2] + self.normals[i3];
        if tri_normal.dot(&point_normal) < 0.0 {
            tri_normal = -tri_normal;
        }
        Some(circumcenter + tri_normal * height2.sqrt())
    }

    fn ball_is_empty(&self, center: &Point3<f64>, radius: f64, allowed: &[usize]) -> bool {
        self.index
            .within_radius(center, radius)
            .into_iter()
            .all(|n| allowed.contains(&n) || (center - self.points[n]).norm() >= radius - EPS)
    }

    fn sorted_neighbors(&self, query: &Point3<f64>, radius: f64) -> Vec<usize> {
        let mut hits = self.index.within_radius(query, radius);
        hits.sort_by(|&a, &b| {
            let da = (self.points[a] - query).norm_squared();
            let db = (self.points[b] - query).norm_squared();
            da.total_cmp(&db).then(a.cmp(&b))
        });
        hits
    }
}

fn face_normal(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> Option<Vector3<f64>> {
    (p1 - p0).cross(&(p2 - p0)).try_normalize(EPS)
}

fn points_coplanar(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>, q: &Point3<f64>) -> bool {
    (p1 - p0).dot(&(p2 - p0).cross(&(q - p0))).abs() < 1e-12
}

/// Minimum distance between segments `p0p1` and `q0q1`.
fn segment_distance(p0: &Point3<f64>, p1: &Point3<f64>, q0: &Point3<f64>, q1: &Point3<f64>) -> f64 {
    let d1 = p1 - p0;
    let d2 = q1 - q0;
    let r = p0 - q0;
    let a = d1.norm_squared();
    let e = d2.norm_squared();
    let f = d2.dot(&r);

    let (s, t) = if a <= EPS && e <= EPS {
        (0.0, 0.0)
    } else if a <= EPS {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(&r);
        if e <= EPS {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(&d2);
            let denom = a * e - b * b;
            let mut s = if denom > EPS {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };

    ((p0 + d1 * s) - (q0 + d2 * t)).norm()
}
