use crate::cli::{encoding, ReconstructArgs};
use color_eyre::eyre::{eyre, WrapErr};
use colored::Colorize;
use rk_core::reconstruction::{ReconstructionEngine, ReconstructionReport, ReconstructionRequest};
use rk_protocol::config_models::ReconstructionSettings;

pub async fn execute(mut settings: ReconstructionSettings, args: ReconstructArgs) -> color_eyre::Result<()> {
    let mut request = match (args.output, args.cloud, args.mesh) {
        (Some(output), _, _) => ReconstructionRequest::for_output_dir(output),
        (None, Some(cloud), Some(mesh)) => ReconstructionRequest::new(cloud, mesh),
        _ => return Err(eyre!("pass either --output or both --cloud and --mesh")),
    };
    if let Some(target) = args.target {
        request = request.with_decimation_target(target);
    }
    if let Some(persist) = args.persist {
        settings.persist = persist.into();
    }
    settings.format = encoding(args.ascii, settings.format);

    let report = run_engine(ReconstructionEngine::new(settings), request).await?;
    print_report(&report, args.json)
}

/// Run the engine on the blocking pool.
pub async fn run_engine(
    engine: ReconstructionEngine,
    request: ReconstructionRequest,
) -> color_eyre::Result<ReconstructionReport> {
    let report = tokio::task::spawn_blocking(move || engine.reconstruct(&request))
        .await
        .wrap_err("reconstruction task panicked")??;
    Ok(report)
}

pub fn print_report(report: &ReconstructionReport, json: bool) -> color_eyre::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{} {} ({} triangles, {:?})",
        "Wrote".green().bold(),
        report.mesh_path.display(),
        report.written_triangles,
        report.persisted
    );
    println!("  points:           {}", report.points);
    println!("  normals:          {}", if report.estimated_normals { "estimated" } else { "loaded" });
    println!("  mean spacing:     {:.6}", report.average_spacing);
    let radii: Vec<String> = report.radii.iter().map(|r| format!("{r:.6}")).collect();
    println!("  radii:            {}", radii.join(", "));
    println!("  candidate:        {} triangles", report.candidate_triangles);
    println!("  decimated+clean:  {} triangles", report.cleaned_triangles);
    Ok(())
}
