//! Point-cloud to mesh reconstruction.
//!
//! The engine loads the dense point cloud produced by the pipeline,
//! estimates normals if the file has none, reconstructs a surface by ball
//! pivoting with radii scaled from the mean point spacing, and writes the
//! mesh next to the cloud. A decimated and cleaned copy is computed as well;
//! [`PersistedMesh`] selects which of the two is written.
//!
//! # Example
//!
//! ```rust,no_run
//! use rk_core::reconstruction::{ReconstructionEngine, ReconstructionRequest};
//! use rk_protocol::config_models::ReconstructionSettings;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = ReconstructionEngine::new(ReconstructionSettings::default());
//! let report = engine.reconstruct(&ReconstructionRequest::for_output_dir("out"))?;
//! println!("wrote {} triangles", report.written_triangles);
//! # Ok(())
//! # }
//! ```

pub mod ball_pivoting;
pub mod cleanup;
pub mod decimation;
pub mod error;
pub mod geometry;
pub mod normals;
pub mod ply;
pub mod spatial;

pub use cleanup::CleanupReport;
pub use error::{PlyError, ReconstructionError, ReconstructionResult};
pub use geometry::{Mesh, PointCloud};

use rk_protocol::config_models::{PersistedMesh, ReconstructionSettings};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Point cloud written by the pipeline into its output directory.
pub const POINT_CLOUD_FILE: &str = "scene_dense.ply";

/// Mesh written by the engine into the same directory.
pub const MESH_FILE: &str = "scene_dense_mesh.ply";

/// Source and destination of one reconstruction.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructionRequest {
    pub cloud_path: PathBuf,
    pub mesh_path: PathBuf,
    /// Overrides the configured decimation target.
    pub decimation_target: Option<usize>,
}

impl ReconstructionRequest {
    pub fn new(cloud_path: impl Into<PathBuf>, mesh_path: impl Into<PathBuf>) -> Self {
        Self {
            cloud_path: cloud_path.into(),
            mesh_path: mesh_path.into(),
            decimation_target: None,
        }
    }

    /// The standard artifact pair inside a pipeline output directory.
    pub fn for_output_dir(output_dir: impl AsRef<Path>) -> Self {
        let dir = output_dir.as_ref();
        Self::new(dir.join(POINT_CLOUD_FILE), dir.join(MESH_FILE))
    }

    pub fn with_decimation_target(mut self, target: usize) -> Self {
        self.decimation_target = Some(target);
        self
    }
}

/// Both meshes of a reconstruction, before anything is written.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// Raw ball-pivoting result.
    pub candidate: Mesh,
    /// Decimated copy after cleanup.
    pub cleaned: Mesh,
    pub average_spacing: f64,
    pub radii: Vec<f64>,
    pub estimated_normals: bool,
    pub cleanup: CleanupReport,
}

/// Summary of a completed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconstructionReport {
    pub points: usize,
    pub estimated_normals: bool,
    pub average_spacing: f64,
    pub radii: Vec<f64>,
    pub candidate_triangles: usize,
    pub cleaned_triangles: usize,
    pub cleanup: CleanupReport,
    pub persisted: PersistedMesh,
    pub mesh_path: PathBuf,
    pub written_triangles: usize,
}

/// Converts point clouds into triangle meshes.
#[derive(Debug, Clone, Default)]
pub struct ReconstructionEngine {
    settings: ReconstructionSettings,
}

impl ReconstructionEngine {
    pub fn new(settings: ReconstructionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ReconstructionSettings {
        &self.settings
    }

    /// Load, reconstruct and persist.
    ///
    /// # Errors
    ///
    /// - `ArtifactRead` if the cloud cannot be read or parsed
    /// - `InsufficientPoints` if it has fewer than three points
    /// - `ArtifactWrite` if the mesh cannot be written
    ///
    /// Nothing is written unless reconstruction succeeded.
    pub fn reconstruct(&self, request: &ReconstructionRequest) -> ReconstructionResult<ReconstructionReport> {
        info!(cloud = %request.cloud_path.display(), "loading point cloud");
        let cloud = load_point_cloud(&request.cloud_path)?;
        let points = cloud.len();

        let target = request
            .decimation_target
            .unwrap_or(self.settings.decimation_target);
        let result = self.reconstruct_cloud(cloud, target)?;

        let mesh = match self.settings.persist {
            PersistedMesh::Candidate => &result.candidate,
            PersistedMesh::Cleaned => &result.cleaned,
        };
        ply::write_mesh(&request.mesh_path, mesh, self.settings.format).map_err(|source| {
            ReconstructionError::ArtifactWrite {
                path: request.mesh_path.clone(),
                source,
            }
        })?;
        info!(
            mesh = %request.mesh_path.display(),
            triangles = mesh.num_triangles(),
            persisted = ?self.settings.persist,
            "mesh written"
        );

        Ok(ReconstructionReport {
            points,
            estimated_normals: result.estimated_normals,
            average_spacing: result.average_spacing,
            radii: result.radii.clone(),
            candidate_triangles: result.candidate.num_triangles(),
            cleaned_triangles: result.cleaned.num_triangles(),
            cleanup: result.cleanup,
            persisted: self.settings.persist,
            mesh_path: request.mesh_path.clone(),
            written_triangles: mesh.num_triangles(),
        })
    }

    /// Reconstruct in memory.
    ///
    /// Produces the ball-pivoting candidate and a copy decimated to
    /// `decimation_target` triangles and cleaned.
    pub fn reconstruct_cloud(
        &self,
        mut cloud: PointCloud,
        decimation_target: usize,
    ) -> ReconstructionResult<Reconstruction> {
        if cloud.len() < 3 {
            return Err(ReconstructionError::InsufficientPoints { found: cloud.len() });
        }

        let estimated_normals = !cloud.has_normals();
        if estimated_normals {
            info!(
                points = cloud.len(),
                neighbors = self.settings.normal_neighbors,
                "estimating normals"
            );
            normals::estimate_normals(&mut cloud, self.settings.normal_neighbors);
        } else if let Some(normals) = cloud.normals.as_mut() {
            for n in normals.iter_mut() {
                if let Some(unit) = n.try_normalize(f64::EPSILON) {
                    *n = unit;
                }
            }
        }

        let average_spacing = spatial::average_spacing(&cloud.points).unwrap_or(0.0);
        let radii = ball_pivoting::pivot_radii(
            average_spacing,
            self.settings.radius_factor,
            &self.settings.radius_scales,
        );
        debug!(average_spacing, ?radii, "pivot radii");

        let normals = cloud.normals.as_deref().unwrap_or_default();
        let candidate = ball_pivoting::ball_pivoting(&cloud.points, normals, &radii);
        info!(triangles = candidate.num_triangles(), "ball pivoting finished");

        let mut cleaned = decimation::decimate(&candidate, decimation_target);
        let cleanup = cleanup::clean_mesh(&mut cleaned);
        debug!(?cleanup, triangles = cleaned.num_triangles(), "cleaned copy ready");

        Ok(Reconstruction {
            candidate,
            cleaned,
            average_spacing,
            radii,
            estimated_normals,
            cleanup,
        })
    }
}

/// Read a point cloud artifact.
pub fn load_point_cloud(path: &Path) -> ReconstructionResult<PointCloud> {
    ply::read_point_cloud(path).map_err(|source| ReconstructionError::ArtifactRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a mesh artifact for display. No reconstruction is involved.
pub fn load_mesh(path: &Path) -> ReconstructionResult<Mesh> {
    ply::read_mesh(path).map_err(|source| ReconstructionError::ArtifactRead {
        path: path.to_path_buf(),
        source,
    })
}
