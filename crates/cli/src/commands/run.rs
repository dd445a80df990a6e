use super::events::print_events;
use super::reconstruct::{print_report, run_engine};
use crate::cli::RunArgs;
use color_eyre::eyre::eyre;
use rk_core::orchestrator::{PipelineOrchestrator, StartRequest};
use rk_core::reconstruction::{ReconstructionEngine, ReconstructionRequest};
use rk_protocol::config_models::ProjectConfig;
use rk_protocol::job_models::JobState;
use tokio::sync::mpsc;
use tracing::info;

/// Run the pipeline once, polling at the configured interval.
///
/// Ctrl-C kills the pipeline program; the killed job is still reported.
pub async fn execute(config: ProjectConfig, args: RunArgs) -> color_eyre::Result<()> {
    let mut settings = config.pipeline;
    if let Some(program) = args.program {
        settings.program = program;
    }
    let options = args.options.apply(settings.options.clone());

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_events(events_rx));
    let mut orchestrator = PipelineOrchestrator::new(settings, events_tx).with_viewers(config.viewers);

    let request = StartRequest::new(&args.input, &args.output).with_options(options);
    orchestrator.start(request)?;

    let finished = tokio::select! {
        job = orchestrator.wait() => job,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            orchestrator.shutdown();
            orchestrator.wait().await
        }
    };

    // Dropping the orchestrator closes the event channel.
    drop(orchestrator);
    let _ = printer.await;

    let job = finished.ok_or_else(|| eyre!("pipeline job was lost"))?;
    if job.state != JobState::Succeeded {
        let reason = job
            .failure
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| format!("{:?}", job.state));
        return Err(eyre!("pipeline failed: {reason}"));
    }

    if args.mesh {
        let engine = ReconstructionEngine::new(config.reconstruction);
        let report = run_engine(engine, ReconstructionRequest::for_output_dir(&job.output_dir)).await?;
        print_report(&report, false)?;
    }
    Ok(())
}
