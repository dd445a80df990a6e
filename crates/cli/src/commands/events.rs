//! Console rendering of core events.

use colored::Colorize;
use rk_protocol::ipc::Event;
use rk_protocol::job_models::{JobState, OutputStream};
use tokio::sync::mpsc::UnboundedReceiver;

/// Print events until every sender is gone.
pub async fn print_events(mut rx: UnboundedReceiver<Event>) {
    while let Some(event) = rx.recv().await {
        if let Some(line) = render(&event) {
            match &event {
                Event::JobOutput { .. } => println!("{line}"),
                _ => eprintln!("{line}"),
            }
        }
    }
}

/// One console line for `event`, or `None` for events that are not shown.
pub fn render(event: &Event) -> Option<String> {
    Some(match event {
        Event::JobStarted { job_id, args, .. } => {
            format!("{} job {} ({})", "started".cyan().bold(), job_id, args.join(" "))
        }
        Event::JobOutput { stream, line, .. } => match stream {
            OutputStream::Stdout => line.clone(),
            OutputStream::Stderr => line.dimmed().to_string(),
        },
        Event::JobFinished {
            job_id,
            state,
            failure,
            ..
        } => match (state, failure) {
            (JobState::Succeeded, _) => format!("{} job {}", "succeeded".green().bold(), job_id),
            (_, Some(failure)) => format!("{} job {}: {}", "failed".red().bold(), job_id, failure),
            (state, None) => format!("job {job_id} finished as {state:?}"),
        },
        Event::DisplayStarted { kind, pid } => match pid {
            Some(pid) => format!("{} {kind} viewer (pid {pid})", "opened".cyan()),
            None => format!("{} {kind} viewer", "opened".cyan()),
        },
        Event::DisplayReplaced { kind, .. } => format!("{} previous {kind} viewer", "closed".yellow()),
        Event::ShutdownRequested => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_protocol::job_models::ExternalFailure;
    use uuid::Uuid;

    #[test]
    fn test_render_failure_includes_diagnostics() {
        colored::control::set_override(false);
        let event = Event::JobFinished {
            job_id: Uuid::nil(),
            state: JobState::Failed,
            exit_code: Some(2),
            failure: Some(ExternalFailure::NonZeroExit {
                code: 2,
                diagnostics: "no images found".to_string(),
            }),
        };

        let line = render(&event).unwrap();
        assert!(line.starts_with("failed job"));
        assert!(line.ends_with("pipeline exited with code 2: no images found"));
    }

    #[test]
    fn test_shutdown_is_silent() {
        assert!(render(&Event::ShutdownRequested).is_none());
    }
}
