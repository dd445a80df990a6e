//! # rk-protocol
//!
//! Core protocol definitions and data models for recon-kit.
//!
//! This crate defines all shared data structures used for:
//! - Configuration file parsing (`.recon-kit/config.toml`)
//! - Pipeline job state and processing options
//! - Visualization process kinds
//! - Notifications sent from the core to the controlling front end
//!
//! ## Modules
//!
//! - [`config_models`]: Project configuration from config.toml
//! - [`job_models`]: Pipeline job state, options and failure descriptions
//! - [`display_models`]: Visualization process kinds and handles
//! - [`ipc`]: Events emitted by the core
//!
//! ## Design Principles
//!
//! - Minimal dependencies: Only serde, uuid and chrono
//! - Independent compilation: No dependencies on other recon-kit crates

pub mod config_models;
pub mod display_models;
pub mod ipc;
pub mod job_models;

// Re-export all public types for convenience
pub use config_models::*;
pub use display_models::*;
pub use ipc::*;
pub use job_models::*;
