use crate::cli::ViewArgs;
use colored::Colorize;
use rk_core::reconstruction::{load_mesh, load_point_cloud, MESH_FILE, POINT_CLOUD_FILE};
use rk_core::supervisor::{ProcessSupervisor, ViewerProcess};
use rk_protocol::config_models::ViewerSettings;
use rk_protocol::display_models::DisplayKind;
use std::time::Duration;

/// Open a viewer and wait until it exits or Ctrl-C is pressed.
pub async fn execute(viewers: ViewerSettings, args: ViewArgs) -> color_eyre::Result<()> {
    let kind = DisplayKind::from(args.kind);

    // Fail early on a missing or corrupt artifact.
    match kind {
        DisplayKind::Cloud => {
            let cloud = load_point_cloud(&args.output.join(POINT_CLOUD_FILE))?;
            println!("{} {} points", "Loaded".cyan(), cloud.len());
        }
        DisplayKind::Mesh => {
            let mesh = load_mesh(&args.output.join(MESH_FILE))?;
            println!("{} {} triangles", "Loaded".cyan(), mesh.num_triangles());
        }
    }

    let supervisor = ProcessSupervisor::new();
    let command = viewers.command(kind);
    let handle = supervisor.request(kind, || ViewerProcess::spawn(kind, command, false, &args.output))?;
    if let Some(pid) = handle.pid {
        println!("{} {kind} viewer (pid {pid})", "Opened".green().bold());
    }

    let mut interval = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if !supervisor.is_alive(kind) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                supervisor.terminate_all();
                break;
            }
        }
    }
    Ok(())
}
