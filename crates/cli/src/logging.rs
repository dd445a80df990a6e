//! Log output for the `recon-kit` binary.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// Without `-v`, `RUST_LOG` is honoured and defaults to `info`. Each `-v`
/// raises the level (`debug`, then `trace`) and overrides `RUST_LOG`.
pub fn init(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
