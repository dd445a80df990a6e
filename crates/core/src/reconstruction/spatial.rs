//! Nearest-neighbour queries over a point set.

use nalgebra::Point3;
use rayon::prelude::*;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// R-tree entry: point index plus coordinates.
#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    index: usize,
    position: [f64; 3],
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        let dz = self.position[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// Spatial index over a fixed set of points.
pub struct PointIndex {
    tree: RTree<IndexedPoint>,
}

impl PointIndex {
    pub fn new(points: &[Point3<f64>]) -> Self {
        let entries = points
            .iter()
            .enumerate()
            .map(|(index, p)| IndexedPoint {
                index,
                position: [p.x, p.y, p.z],
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Indices of the `k` points closest to `query`, nearest first.
    ///
    /// A query at an indexed point returns that point first.
    pub fn k_nearest(&self, query: &Point3<f64>, k: usize) -> Vec<usize> {
        self.tree
            .nearest_neighbor_iter(&[query.x, query.y, query.z])
            .take(k)
            .map(|entry| entry.index)
            .collect()
    }

    /// Indices of all points within `radius` of `query`, in no particular order.
    pub fn within_radius(&self, query: &Point3<f64>, radius: f64) -> Vec<usize> {
        self.tree
            .locate_within_distance([query.x, query.y, query.z], radius * radius)
            .map(|entry| entry.index)
            .collect()
    }
}

/// Distance from each point to its nearest other point.
///
/// Coincident points report a distance of zero.
pub fn nearest_neighbor_distances(points: &[Point3<f64>]) -> Vec<f64> {
    let index = PointIndex::new(points);
    points
        .par_iter()
        .map(|p| {
            // The first hit is the query point itself (or a coincident twin).
            index
                .tree
                .nearest_neighbor_iter(&[p.x, p.y, p.z])
                .nth(1)
                .map_or(0.0, |entry| entry.distance_2(&[p.x, p.y, p.z]).sqrt())
        })
        .collect()
}

/// Mean nearest-neighbour distance, or `None` with fewer than two points.
pub fn average_spacing(points: &[Point3<f64>]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let distances = nearest_neighbor_distances(points);
    Some(distances.iter().sum::<f64>() / distances.len() as f64)
}
