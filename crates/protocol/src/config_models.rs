//! Project configuration models for `.recon-kit/config.toml`.
//!
//! Every section and field is optional; missing values fall back to the
//! defaults defined here.
//!
//! # Example
//!
//! ```toml
//! # .recon-kit/config.toml
//! [pipeline]
//! program = "./tools/pipeline.sh"
//! poll_interval_ms = 1000
//!
//! [viewers.cloud]
//! program = "python3"
//! args = ["src/point_cloud_visualizer.py"]
//!
//! [reconstruction]
//! radius_factor = 3.0
//! decimation_target = 100000
//! persist = "candidate"
//! ```

use crate::display_models::DisplayKind;
use crate::job_models::PipelineOptions;
use serde::{Deserialize, Serialize};

/// Root of `.recon-kit/config.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ProjectConfig {
    pub pipeline: PipelineSettings,
    pub viewers: ViewerSettings,
    pub reconstruction: ReconstructionSettings,
}

/// How the external pipeline program is invoked and watched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    /// Executable path or bare program name looked up on `PATH`.
    pub program: String,

    /// Period of the completion poll.
    pub poll_interval_ms: u64,

    /// Number of trailing stderr lines kept as failure diagnostics.
    pub diagnostic_lines: usize,

    /// Default processing options.
    pub options: PipelineOptions,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            program: "./tools/pipeline.sh".to_string(),
            poll_interval_ms: 1000,
            diagnostic_lines: 20,
            options: PipelineOptions::default(),
        }
    }
}

/// Command prefix of one visualization program.
///
/// The supervisor appends the still-processing flag (`True`/`False`) and the
/// output directory to `args`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ViewerCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Viewer commands by kind.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ViewerSettings {
    pub cloud: ViewerCommand,
    pub mesh: ViewerCommand,
}

impl ViewerSettings {
    pub fn command(&self, kind: DisplayKind) -> &ViewerCommand {
        match kind {
            DisplayKind::Cloud => &self.cloud,
            DisplayKind::Mesh => &self.mesh,
        }
    }
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            cloud: ViewerCommand {
                program: "python3".to_string(),
                args: vec!["src/point_cloud_visualizer.py".to_string()],
            },
            mesh: ViewerCommand {
                program: "python3".to_string(),
                args: vec!["src/mesh_lib.py".to_string()],
            },
        }
    }
}

/// Which of the two meshes produced by a reconstruction is written to disk.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PersistedMesh {
    /// The raw ball-pivoting result; the cleaned copy is discarded.
    #[default]
    Candidate,

    /// The decimated and cleaned copy.
    Cleaned,
}

/// Encoding used when writing PLY artifacts.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlyEncoding {
    Ascii,
    #[default]
    Binary,
}

/// Tunables of the point cloud to mesh reconstruction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ReconstructionSettings {
    /// Neighbourhood size used when normals have to be estimated.
    pub normal_neighbors: usize,

    /// Smallest pivoting radius as a multiple of the mean nearest-neighbour distance.
    pub radius_factor: f64,

    /// Multipliers applied to the smallest radius, ascending.
    pub radius_scales: Vec<f64>,

    /// Triangle budget of the decimated mesh.
    pub decimation_target: usize,

    pub persist: PersistedMesh,

    pub format: PlyEncoding,
}

impl Default for ReconstructionSettings {
    fn default() -> Self {
        Self {
            normal_neighbors: 30,
            radius_factor: 3.0,
            radius_scales: vec![1.0, 2.0],
            decimation_target: 100_000,
            persist: PersistedMesh::Candidate,
            format: PlyEncoding::Binary,
        }
    }
}
