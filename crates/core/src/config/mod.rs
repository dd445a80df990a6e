//! Configuration loading and management.
//!
//! This module provides functionality to load and validate
//! `.recon-kit/config.toml`.

pub mod error;
pub mod loader;

pub use error::{ConfigError, ConfigResult};
pub use loader::{config_path, load_config, CONFIG_DIR};
