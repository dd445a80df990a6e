//! Per-point normal estimation for clouds that come without normals.

use crate::reconstruction::geometry::PointCloud;
use crate::reconstruction::spatial::PointIndex;
use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};
use rayon::prelude::*;
use std::collections::VecDeque;

/// Estimate unit normals by local PCA and orient them consistently.
///
/// The normal of each point is the eigenvector of the smallest eigenvalue of
/// the covariance of its `k` nearest neighbours. Orientation is then
/// propagated across the neighbour graph, starting in every connected
/// component from the point farthest from the centroid, whose normal is made
/// to face away from the centroid.
pub fn estimate_normals(cloud: &mut PointCloud, k: usize) {
    if cloud.is_empty() {
        return;
    }
    let k = k.max(3).min(cloud.len());
    let index = PointIndex::new(&cloud.points);

    let neighborhoods: Vec<Vec<usize>> = cloud
        .points
        .par_iter()
        .map(|p| index.k_nearest(p, k))
        .collect();

    let mut normals: Vec<Vector3<f64>> = neighborhoods
        .par_iter()
        .map(|neighbors| pca_normal(&cloud.points, neighbors))
        .collect();

    orient_normals(&cloud.points, cloud.centroid(), &neighborhoods, &mut normals);
    cloud.normals = Some(normals);
}

fn pca_normal(points: &[Point3<f64>], neighbors: &[usize]) -> Vector3<f64> {
    if neighbors.len() < 3 {
        return Vector3::z();
    }

    let centroid = neighbors
        .iter()
        .fold(Vector3::zeros(), |acc, &i| acc + points[i].coords)
        / neighbors.len() as f64;

    let mut covariance = Matrix3::zeros();
    for &i in neighbors {
        let d = points[i].coords - centroid;
        covariance += d * d.transpose();
    }
    covariance /= neighbors.len() as f64;

    let eigen = SymmetricEigen::new(covariance);
    let (smallest, _) = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |best, (i, &value)| {
            if value < best.1 {
                (i, value)
            } else {
                best
            }
        });

    let normal = eigen.eigenvectors.column(smallest).into_owned();
    normal.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::z)
}

fn orient_normals(
    points: &[Point3<f64>],
    centroid: Point3<f64>,
    neighborhoods: &[Vec<usize>],
    normals: &mut [Vector3<f64>],
) {
    let n = points.len();

    // Seeds are tried from the outermost point inwards.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        let da = (points[a] - centroid).norm_squared();
        let db = (points[b] - centroid).norm_squared();
        db.total_cmp(&da)
    });

    let mut visited = vec![false; n];
    let mut queue = VecDeque::new();

    for seed in order {
        if visited[seed] {
            continue;
        }
        if normals[seed].dot(&(points[seed] - centroid)) < 0.0 {
            normals[seed] = -normals[seed];
        }
        visited[seed] = true;
        queue.push_back(seed);

        while let Some(i) = queue.pop_front() {
            for &j in &neighborhoods[i] {
                if visited[j] {
                    continue;
                }
                if normals[j].dot(&normals[i]) < 0.0 {
                    normals[j] = -normals[j];
                }
                visited[j] = true;
                queue.push_back(j);
            }
        }
    }
}
