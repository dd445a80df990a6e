//! Pipeline job state transitions.
//!
//! Each transition updates the job record and emits the matching event.

use crate::orchestrator::worker::JobOutcome;
use chrono::Utc;
use rk_protocol::ipc::Event;
use rk_protocol::job_models::{ExternalFailure, JobState, PipelineJob, PipelineOptions};
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Create a new job in the `Idle` state.
///
/// # Arguments
///
/// * `input_dir` - Directory holding the input images
/// * `output_dir` - Directory receiving the artifacts
/// * `options` - Processing options for this run
pub fn create_job(input_dir: PathBuf, output_dir: PathBuf, options: PipelineOptions) -> PipelineJob {
    PipelineJob {
        id: Uuid::new_v4(),
        input_dir,
        output_dir,
        options,
        state: JobState::Idle,
        completed: false,
        exit_code: None,
        failure: None,
        started_at: Utc::now(),
        finished_at: None,
    }
}

/// Transition the job to `Running` and emit `JobStarted`.
///
/// # Arguments
///
/// * `job` - The job being launched
/// * `args` - Argument vector passed to the program
/// * `events_tx` - Channel to the controller
pub fn mark_running(job: &mut PipelineJob, args: Vec<String>, events_tx: &UnboundedSender<Event>) {
    job.state = JobState::Running;
    let _ = events_tx.send(Event::JobStarted {
        job_id: job.id,
        input_dir: job.input_dir.clone(),
        output_dir: job.output_dir.clone(),
        args,
    });
}

/// Record the worker's outcome and emit the single `JobFinished` event.
///
/// # Arguments
///
/// * `job` - The running job
/// * `outcome` - Exit status and failure reported by the worker
/// * `events_tx` - Channel to the controller
pub fn finish(job: &mut PipelineJob, outcome: JobOutcome, events_tx: &UnboundedSender<Event>) {
    job.state = if outcome.succeeded() {
        JobState::Succeeded
    } else {
        JobState::Failed
    };
    job.completed = true;
    job.exit_code = outcome.exit_code;
    job.failure = outcome.failure;
    job.finished_at = Some(Utc::now());

    let _ = events_tx.send(Event::JobFinished {
        job_id: job.id,
        state: job.state,
        exit_code: job.exit_code,
        failure: job.failure.clone(),
    });
}

/// Fail the job because its worker disappeared without reporting.
pub fn fail_lost(job: &mut PipelineJob, events_tx: &UnboundedSender<Event>) {
    finish(
        job,
        JobOutcome {
            exit_code: None,
            failure: Some(ExternalFailure::WorkerLost),
        },
        events_tx,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn new_job() -> PipelineJob {
        create_job(
            PathBuf::from("in"),
            PathBuf::from("out"),
            PipelineOptions::default(),
        )
    }

    #[test]
    fn test_create_job() {
        let job = new_job();
        assert_eq!(job.state, JobState::Idle);
        assert!(!job.completed);
        assert!(job.exit_code.is_none());
        assert!(job.finished_at.is_none());
    }

    #[test]
    fn test_mark_running_emits_started() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut job = new_job();

        mark_running(&mut job, vec!["-i".to_string(), "in".to_string()], &tx);

        assert_eq!(job.state, JobState::Running);
        match rx.try_recv().unwrap() {
            Event::JobStarted { job_id, args, .. } => {
                assert_eq!(job_id, job.id);
                assert_eq!(args, vec!["-i", "in"]);
            }
            other => panic!("Expected JobStarted, got {other:?}"),
        }
    }

    #[test]
    fn test_finish_success() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut job = new_job();
        mark_running(&mut job, vec![], &tx);
        let _ = rx.try_recv();

        finish(
            &mut job,
            JobOutcome {
                exit_code: Some(0),
                failure: None,
            },
            &tx,
        );

        assert_eq!(job.state, JobState::Succeeded);
        assert!(job.completed);
        assert!(job.finished_at.is_some());
        assert!(matches!(
            rx.try_recv().unwrap(),
            Event::JobFinished {
                state: JobState::Succeeded,
                exit_code: Some(0),
                failure: None,
                ..
            }
        ));
    }

    #[test]
    fn test_fail_lost() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut job = new_job();

        fail_lost(&mut job, &tx);

        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.failure, Some(ExternalFailure::WorkerLost));
        assert!(matches!(
            rx.try_recv().unwrap(),
            Event::JobFinished {
                state: JobState::Failed,
                ..
            }
        ));
    }
}
