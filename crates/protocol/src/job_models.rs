//! Pipeline job state models.
//!
//! This module defines the structures for tracking one invocation of the
//! external reconstruction program, from the moment a start request is
//! accepted until its terminal state has been consumed by the controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Lifecycle state of the pipeline slot.
///
/// The state progresses through:
/// Idle -> Running -> Succeeded | Failed -> Idle
///
/// Only one job may be `Running` at a time.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// No job has been accepted, or the last one has been consumed.
    #[default]
    Idle,

    /// The external program has been launched and has not exited yet.
    Running,

    /// The external program exited with status 0.
    Succeeded,

    /// The external program exited with a non-zero status or could not be launched.
    Failed,
}

impl JobState {
    /// Whether this is one of the two terminal states.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// Export format requested from the dense reconstruction stage.
///
/// Passed to the pipeline program as `-x 0|1`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportType {
    Obj,
    #[default]
    Ply,
}

impl ExportType {
    /// Numeric flag value understood by the pipeline program.
    pub fn flag_value(self) -> u8 {
        match self {
            ExportType::Obj => 0,
            ExportType::Ply => 1,
        }
    }
}

/// Named processing options forwarded to the external pipeline program.
///
/// Every field maps to exactly one command line flag. Unset fields in a
/// config file fall back to the defaults below.
///
/// # Example
///
/// ```toml
/// [pipeline.options]
/// max_resolution = 2560
/// decimation_factor = 0.5
/// export_type = "obj"
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineOptions {
    /// Maximum image resolution used by dense reconstruction (`-m`).
    pub max_resolution: u32,

    /// Region-of-interest estimation mode (`-e`).
    pub estimate_roi: u32,

    /// Verbosity level of the pipeline program (`-v`).
    pub verbosity: u32,

    /// Mesh decimation factor in `[0, 1]` (`-s`).
    pub decimation_factor: f64,

    /// Remove intermediate depth maps after fusion (`-d`).
    pub remove_dense_maps: bool,

    /// Integrate only inside the estimated region of interest (`-r`).
    pub integrate_roi: bool,

    /// Number of mesh smoothing iterations (`-t`).
    pub smoothing_iterations: u32,

    /// Minimum distance in pixels between projected points (`-p`).
    pub min_point_distance: u32,

    /// Output format of the exported scene (`-x`).
    pub export_type: ExportType,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_resolution: 3200,
            estimate_roi: 2,
            verbosity: 2,
            decimation_factor: 1.0,
            remove_dense_maps: false,
            integrate_roi: false,
            smoothing_iterations: 2,
            min_point_distance: 2,
            export_type: ExportType::Ply,
        }
    }
}

/// Output stream a line of pipeline output was read from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Why a pipeline job ended in the `Failed` state.
///
/// Delivered through the same completion notification as success; the
/// diagnostic text captured from the program is preserved.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ExternalFailure {
    /// The program could not be resolved or spawned.
    Launch { program: String, reason: String },

    /// The program exited with a non-zero status.
    NonZeroExit { code: i32, diagnostics: String },

    /// The program was terminated by a signal before exiting.
    Signalled { diagnostics: String },

    /// The worker went away without reporting an outcome.
    WorkerLost,
}

impl std::fmt::Display for ExternalFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExternalFailure::Launch { program, reason } => {
                write!(f, "failed to launch '{program}': {reason}")
            }
            ExternalFailure::NonZeroExit { code, diagnostics } => {
                write!(f, "pipeline exited with code {code}")?;
                if !diagnostics.is_empty() {
                    write!(f, ": {diagnostics}")?;
                }
                Ok(())
            }
            ExternalFailure::Signalled { diagnostics } => {
                write!(f, "pipeline terminated by signal")?;
                if !diagnostics.is_empty() {
                    write!(f, ": {diagnostics}")?;
                }
                Ok(())
            }
            ExternalFailure::WorkerLost => write!(f, "pipeline worker exited without reporting"),
        }
    }
}

/// One invocation of the external reconstruction program.
///
/// Created when a start request is accepted and owned exclusively by the
/// orchestrator that created it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PipelineJob {
    /// Unique identifier for this job.
    pub id: Uuid,

    /// Directory holding the input images.
    pub input_dir: PathBuf,

    /// Directory receiving the reconstruction artifacts.
    pub output_dir: PathBuf,

    /// Processing options the job was started with.
    pub options: PipelineOptions,

    /// Current lifecycle state.
    pub state: JobState,

    /// Set once the terminal outcome has been observed.
    pub completed: bool,

    /// Exit status of the external program, when it exited normally.
    pub exit_code: Option<i32>,

    /// Failure description when `state` is `Failed`.
    pub failure: Option<ExternalFailure>,

    /// When the job was accepted.
    pub started_at: DateTime<Utc>,

    /// When the terminal state was observed.
    pub finished_at: Option<DateTime<Utc>>,
}
