use crate::cli::InitArgs;
use colored::Colorize;
use rk_core::config::config_path;
use rk_core::init::{generate_project_structure, InitOptions};
use std::path::Path;

pub async fn execute(project: &Path, args: &InitArgs) -> color_eyre::Result<()> {
    generate_project_structure(InitOptions {
        target_dir: project.to_path_buf(),
        force: args.force,
    })
    .await?;

    println!(
        "{} {}",
        "Created".green().bold(),
        config_path(project).display()
    );
    Ok(())
}
