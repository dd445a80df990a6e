//! Background execution of the pipeline program.
//!
//! The worker owns the child process. It forwards every output line as an
//! event and reports the terminal outcome with a single message on a oneshot
//! channel. The orchestrator never shares mutable state with it.

use crate::orchestrator::command::resolve_program;
use rk_protocol::ipc::Event;
use rk_protocol::job_models::{ExternalFailure, OutputStream};
use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Terminal message sent by the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub exit_code: Option<i32>,
    pub failure: Option<ExternalFailure>,
}

impl JobOutcome {
    fn from_status(status: ExitStatus, diagnostics: String) -> Self {
        match status.code() {
            Some(0) => Self {
                exit_code: Some(0),
                failure: None,
            },
            Some(code) => Self {
                exit_code: Some(code),
                failure: Some(ExternalFailure::NonZeroExit { code, diagnostics }),
            },
            None => Self {
                exit_code: None,
                failure: Some(ExternalFailure::Signalled { diagnostics }),
            },
        }
    }

    fn launch_failure(program: &str, reason: String) -> Self {
        Self {
            exit_code: None,
            failure: Some(ExternalFailure::Launch {
                program: program.to_string(),
                reason,
            }),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Everything needed to launch one job.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub job_id: Uuid,
    pub program: String,
    pub args: Vec<String>,
    pub diagnostic_lines: usize,
}

/// How long output readers may keep running once the program has exited.
///
/// Descendants that escaped the kill can hold the pipes open indefinitely.
const READER_GRACE: Duration = Duration::from_secs(2);

/// Orchestrator side of a running worker.
pub struct WorkerHandle {
    pub outcome_rx: oneshot::Receiver<JobOutcome>,
    kill_tx: Option<oneshot::Sender<()>>,
}

impl WorkerHandle {
    /// Ask the worker to kill the child. Does not wait.
    pub fn request_kill(&mut self) {
        if let Some(tx) = self.kill_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Spawn the worker task on the current tokio runtime.
pub fn spawn_worker(spec: WorkerSpec, events_tx: UnboundedSender<Event>) -> WorkerHandle {
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let (kill_tx, kill_rx) = oneshot::channel();

    tokio::spawn(async move {
        let outcome = run(spec, events_tx, kill_rx).await;
        // The receiver is gone when the orchestrator was dropped.
        let _ = outcome_tx.send(outcome);
    });

    WorkerHandle {
        outcome_rx,
        kill_tx: Some(kill_tx),
    }
}

async fn run(
    spec: WorkerSpec,
    events_tx: UnboundedSender<Event>,
    mut kill_rx: oneshot::Receiver<()>,
) -> JobOutcome {
    let program = match resolve_program(&spec.program) {
        Ok(path) => path,
        Err(e) => {
            warn!(job_id = %spec.job_id, program = %spec.program, error = %e, "pipeline program not found");
            return JobOutcome::launch_failure(&spec.program, e.to_string());
        }
    };

    let mut command = Command::new(&program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // The program gets its own process group so that a kill reaches the
    // stages it runs as subprocesses.
    #[cfg(unix)]
    command.process_group(0);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(job_id = %spec.job_id, program = %program.display(), error = %e, "failed to spawn pipeline");
            return JobOutcome::launch_failure(&spec.program, e.to_string());
        }
    };
    info!(job_id = %spec.job_id, pid = ?child.id(), "pipeline program launched");

    let stdout_task = child.stdout.take().map(|stdout| {
        tokio::spawn(forward_lines(
            stdout,
            spec.job_id,
            OutputStream::Stdout,
            events_tx.clone(),
            0,
        ))
    });
    let stderr_task = child.stderr.take().map(|stderr| {
        tokio::spawn(forward_lines(
            stderr,
            spec.job_id,
            OutputStream::Stderr,
            events_tx.clone(),
            spec.diagnostic_lines,
        ))
    });

    let status = tokio::select! {
        status = child.wait() => status,
        _ = &mut kill_rx => {
            info!(job_id = %spec.job_id, "killing pipeline program");
            if let Err(e) = kill_process_group(&mut child) {
                warn!(job_id = %spec.job_id, error = %e, "failed to kill pipeline program");
            }
            child.wait().await
        }
    };

    if let Some(task) = stdout_task {
        drain_reader(task, spec.job_id).await;
    }
    let diagnostics = match stderr_task {
        Some(task) => join_tail(drain_reader(task, spec.job_id).await),
        None => String::new(),
    };

    match status {
        Ok(status) => JobOutcome::from_status(status, diagnostics),
        Err(e) => {
            warn!(job_id = %spec.job_id, error = %e, "failed to wait for pipeline program");
            JobOutcome {
                exit_code: None,
                failure: Some(ExternalFailure::Signalled {
                    diagnostics: e.to_string(),
                }),
            }
        }
    }
}

/// Forward each line of `reader` as a `JobOutput` event.
///
/// Returns the last `keep` lines.
async fn forward_lines<R>(
    reader: R,
    job_id: Uuid,
    stream: OutputStream,
    events_tx: UnboundedSender<Event>,
    keep: usize,
) -> VecDeque<String>
where
    R: AsyncRead + Unpin,
{
    let mut tail = VecDeque::with_capacity(keep);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(%job_id, ?stream, error = %e, "stopped reading pipeline output");
                break;
            }
        }
        // Output is not required to be UTF-8; the pipe is drained regardless.
        let line = String::from_utf8_lossy(&buf)
            .trim_end_matches(['\n', '\r'])
            .to_string();
        debug!(%job_id, ?stream, "{line}");
        if keep > 0 {
            if tail.len() == keep {
                tail.pop_front();
            }
            tail.push_back(line.clone());
        }
        let _ = events_tx.send(Event::JobOutput {
            job_id,
            stream,
            line,
        });
    }

    tail
}

/// Wait for an output reader, giving up after [`READER_GRACE`].
///
/// An aborted reader loses its tail.
async fn drain_reader(mut task: JoinHandle<VecDeque<String>>, job_id: Uuid) -> VecDeque<String> {
    match tokio::time::timeout(READER_GRACE, &mut task).await {
        Ok(result) => result.unwrap_or_default(),
        Err(_) => {
            warn!(%job_id, "pipeline output still open after exit, detaching reader");
            task.abort();
            VecDeque::new()
        }
    }
}

/// Kill the program together with every process in its group.
#[cfg(unix)]
fn kill_process_group(child: &mut Child) -> std::io::Result<()> {
    let Some(pid) = child.id() else {
        // Already reaped.
        return Ok(());
    };
    let pgid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: kill(2) only takes plain integers. A negative pid addresses
    // the process group created with `process_group(0)` at spawn.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } == 0 {
        return Ok(());
    }
    let group_error = std::io::Error::last_os_error();
    debug!(pid, error = %group_error, "group kill failed, killing the program only");
    child.start_kill()
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) -> std::io::Result<()> {
    child.start_kill()
}

fn join_tail(tail: VecDeque<String>) -> String {
    Vec::from(tail).join("\n")
}
