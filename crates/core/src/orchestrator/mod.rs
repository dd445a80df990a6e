//! Pipeline orchestrator.
//!
//! Runs the external reconstruction program off the caller's thread and
//! exposes its completion as a non-blocking poll. At most one job runs at a
//! time. The orchestrator also owns the [`ProcessSupervisor`] for the
//! visualization processes it starts, and tears everything down on
//! [`PipelineOrchestrator::shutdown`] or drop.
//!
//! # Example
//!
//! ```rust,no_run
//! use rk_core::orchestrator::{PipelineOrchestrator, StartRequest};
//! use rk_protocol::config_models::PipelineSettings;
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (events_tx, _events_rx) = mpsc::unbounded_channel();
//! let mut orchestrator = PipelineOrchestrator::new(PipelineSettings::default(), events_tx);
//!
//! orchestrator.start(StartRequest::new("images", "out"))?;
//! if let Some(job) = orchestrator.wait().await {
//!     println!("job finished: {:?}", job.state);
//! }
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod error;
pub mod job;
pub mod worker;

pub use error::OrchestratorError;

use crate::supervisor::{ProcessSupervisor, SupervisorError, ViewerProcess};
use rk_protocol::config_models::{PipelineSettings, ViewerSettings};
use rk_protocol::display_models::{DisplayHandle, DisplayKind};
use rk_protocol::ipc::Event;
use rk_protocol::job_models::{JobState, PipelineJob, PipelineOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{info, warn};
use uuid::Uuid;
use worker::{spawn_worker, WorkerHandle, WorkerSpec};

/// A request to run the pipeline once.
#[derive(Debug, Clone, PartialEq)]
pub struct StartRequest {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub options: PipelineOptions,
}

impl StartRequest {
    /// Request with default processing options.
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }
}

/// Drives the external pipeline program.
pub struct PipelineOrchestrator {
    settings: PipelineSettings,
    viewers: ViewerSettings,
    events_tx: UnboundedSender<Event>,
    supervisor: ProcessSupervisor,
    job: Option<PipelineJob>,
    worker: Option<WorkerHandle>,
    shutdown_requested: bool,
}

impl PipelineOrchestrator {
    /// Create an idle orchestrator.
    ///
    /// # Arguments
    ///
    /// * `settings` - Program path, poll interval and diagnostic tail length
    /// * `events_tx` - Channel receiving every notification
    pub fn new(settings: PipelineSettings, events_tx: UnboundedSender<Event>) -> Self {
        Self {
            settings,
            viewers: ViewerSettings::default(),
            supervisor: ProcessSupervisor::with_events(events_tx.clone()),
            events_tx,
            job: None,
            worker: None,
            shutdown_requested: false,
        }
    }

    /// Use `viewers` for [`display`](Self::display) requests.
    pub fn with_viewers(mut self, viewers: ViewerSettings) -> Self {
        self.viewers = viewers;
        self
    }

    /// Accept a start request and launch the pipeline program.
    ///
    /// Returns as soon as the worker task is spawned. Must be called from
    /// within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if either directory is empty
    /// - `JobBusy` if a job is running or its completion has not been polled
    ///
    /// No job is created when an error is returned.
    pub fn start(&mut self, request: StartRequest) -> Result<Uuid, OrchestratorError> {
        if request.input_dir.as_os_str().is_empty() {
            return Err(OrchestratorError::InvalidInput { field: "input_dir" });
        }
        if request.output_dir.as_os_str().is_empty() {
            return Err(OrchestratorError::InvalidInput { field: "output_dir" });
        }
        if let Some(job) = &self.job {
            return Err(OrchestratorError::JobBusy { job_id: job.id });
        }

        let mut job = job::create_job(request.input_dir, request.output_dir, request.options);
        let args = command::build_args(&job.input_dir, &job.output_dir, &job.options);
        info!(job_id = %job.id, program = %self.settings.program, args = %args.join(" "), "starting pipeline");

        job::mark_running(&mut job, args.clone(), &self.events_tx);
        let worker = spawn_worker(
            WorkerSpec {
                job_id: job.id,
                program: self.settings.program.clone(),
                args,
                diagnostic_lines: self.settings.diagnostic_lines,
            },
            self.events_tx.clone(),
        );

        let job_id = job.id;
        self.job = Some(job);
        self.worker = Some(worker);
        Ok(job_id)
    }

    /// Check for completion without blocking.
    ///
    /// When the worker has reported, the job is moved to its terminal state,
    /// `JobFinished` is emitted and the orchestrator returns to `Idle`. The
    /// finished job is returned exactly once; later polls return `None`
    /// until a new job is started.
    pub fn poll(&mut self) -> Option<PipelineJob> {
        let received = match self.worker.as_mut()?.outcome_rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => None,
        };

        self.worker = None;
        let mut job = self.job.take()?;
        match received {
            Some(outcome) => job::finish(&mut job, outcome, &self.events_tx),
            None => job::fail_lost(&mut job, &self.events_tx),
        }

        match &job.failure {
            None => info!(job_id = %job.id, "pipeline succeeded"),
            Some(failure) => warn!(job_id = %job.id, %failure, "pipeline failed"),
        }
        Some(job)
    }

    /// Poll at the configured interval until the current job finishes.
    ///
    /// Returns `None` immediately when no job is running.
    pub async fn wait(&mut self) -> Option<PipelineJob> {
        self.job.as_ref()?;
        let period = Duration::from_millis(self.settings.poll_interval_ms.max(1));
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if let Some(job) = self.poll() {
                return Some(job);
            }
        }
    }

    /// Current state of the pipeline slot.
    pub fn state(&self) -> JobState {
        self.job.as_ref().map_or(JobState::Idle, |job| job.state)
    }

    /// The job occupying the slot, if any.
    pub fn current_job(&self) -> Option<&PipelineJob> {
        self.job.as_ref()
    }

    /// Start (or replace) the viewer of `kind` for `output_dir`.
    ///
    /// The viewer is told whether the pipeline is still processing.
    pub fn display(&self, kind: DisplayKind, output_dir: &Path) -> Result<DisplayHandle, SupervisorError> {
        let command = self.viewers.command(kind);
        let still_processing = self.state() == JobState::Running;
        self.supervisor
            .request(kind, || ViewerProcess::spawn(kind, command, still_processing, output_dir))
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    /// Ask the in-flight program and every viewer to exit.
    ///
    /// Does not wait for anything to exit. The worker still reports the
    /// killed job, so a later `poll` observes it as `Failed`.
    pub fn shutdown(&mut self) {
        if !self.shutdown_requested {
            self.shutdown_requested = true;
            info!("shutting down pipeline and viewers");
            let _ = self.events_tx.send(Event::ShutdownRequested);
        }
        if let Some(worker) = self.worker.as_mut() {
            worker.request_kill();
        }
        self.supervisor.terminate_all();
    }
}

impl Drop for PipelineOrchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
