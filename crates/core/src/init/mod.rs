//! Initialization module for creating `.recon-kit` directory structures.
//!
//! Generates a `.recon-kit/` directory containing:
//! - The project configuration (`config.toml`)
//! - An example pipeline driver (`scripts/pipeline.sh`)
//!
//! # Example
//!
//! ```no_run
//! use rk_core::init::{InitOptions, generate_project_structure};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = InitOptions {
//!     target_dir: PathBuf::from("."),
//!     force: false,
//! };
//!
//! generate_project_structure(options).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod generator;
pub mod templates;

pub use error::{InitError, InitResult};
pub use generator::{generate_project_structure, InitOptions};
pub use templates::{get_template, list_templates};
