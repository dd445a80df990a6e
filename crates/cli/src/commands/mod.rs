//! Subcommand implementations.

mod events;
mod init;
mod inspect;
mod reconstruct;
mod run;
mod view;

use crate::cli::{Cli, Command};
use color_eyre::eyre::WrapErr;
use rk_core::config::load_config;

/// Run the selected subcommand.
pub async fn dispatch(cli: Cli) -> color_eyre::Result<()> {
    if let Command::Init(args) = &cli.command {
        return init::execute(&cli.project, args).await;
    }

    let config = load_config(&cli.project)
        .await
        .wrap_err("failed to load .recon-kit/config.toml")?;

    match cli.command {
        Command::Init(_) => Ok(()),
        Command::Run(args) => run::execute(config, args).await,
        Command::Reconstruct(args) => reconstruct::execute(config.reconstruction, args).await,
        Command::View(args) => view::execute(config.viewers, args).await,
        Command::Inspect(args) => inspect::execute(args),
    }
}
