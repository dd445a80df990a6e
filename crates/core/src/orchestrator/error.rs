//! Error types for the pipeline orchestrator.
//!
//! Both errors are raised before any job is created, so the orchestrator is
//! left exactly as it was when one is returned.

use thiserror::Error;
use uuid::Uuid;

/// Rejections of a start request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    /// A required path was empty.
    #[error("invalid input: {field} must not be empty")]
    InvalidInput { field: &'static str },

    /// A job is already running.
    #[error("pipeline job {job_id} is still running")]
    JobBusy { job_id: Uuid },
}
