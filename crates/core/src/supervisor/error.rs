//! Error types for visualization process supervision.

use rk_protocol::display_models::DisplayKind;
use thiserror::Error;

/// Errors returned to callers of the supervisor.
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// The factory could not start a visualization process.
    #[error("Failed to launch {kind} viewer '{program}': {source}")]
    Launch {
        kind: DisplayKind,
        program: String,
        source: std::io::Error,
    },
}

/// Failure to stop a process.
///
/// Termination is best-effort cleanup: these errors are logged by the
/// supervisor and never propagated out of `request` or `terminate_all`.
#[derive(Error, Debug)]
pub enum TerminationError {
    #[error("Failed to kill process {pid:?}: {source}")]
    Kill {
        pid: Option<u32>,
        source: std::io::Error,
    },

    #[error("Failed to reap process {pid:?}: {source}")]
    Wait {
        pid: Option<u32>,
        source: std::io::Error,
    },
}
