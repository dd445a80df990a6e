//! Notifications from the core to the controlling front end.
//!
//! The core never calls into the front end directly. Everything it has to
//! report is sent as an `Event` over a channel, so the front end stays
//! responsive while long-running work happens elsewhere.
//!
//! Uses tagged enum serialization:
//! ```json
//! {
//!   "type": "jobFinished",
//!   "payload": {
//!     "job_id": "uuid-here",
//!     "state": "SUCCEEDED",
//!     "exit_code": 0,
//!     "failure": null
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::display_models::DisplayKind;
use crate::job_models::{ExternalFailure, JobState, OutputStream};

/// Events sent from the core to the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// A start request was accepted and the pipeline program is launching.
    JobStarted {
        job_id: Uuid,
        input_dir: PathBuf,
        output_dir: PathBuf,
        /// Full argument vector passed to the program.
        args: Vec<String>,
    },

    /// One line of output from the pipeline program.
    JobOutput {
        job_id: Uuid,
        stream: OutputStream,
        line: String,
    },

    /// The job reached a terminal state.
    ///
    /// Emitted exactly once per job, whether it succeeded or failed.
    JobFinished {
        job_id: Uuid,
        state: JobState,
        exit_code: Option<i32>,
        failure: Option<ExternalFailure>,
    },

    /// A visualization process was started.
    DisplayStarted { kind: DisplayKind, pid: Option<u32> },

    /// A live visualization process was terminated to make room for a new one.
    DisplayReplaced {
        kind: DisplayKind,
        previous_pid: Option<u32>,
    },

    /// Application teardown began; live processes are being asked to exit.
    ShutdownRequested,
}
