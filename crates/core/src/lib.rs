//! # rk-core
//!
//! Core engine of recon-kit.
//!
//! This crate provides:
//! - Configuration loading from the `.recon-kit/` directory
//! - Orchestration of the external photogrammetry pipeline program
//! - Single-flight supervision of viewer processes
//! - Point cloud to mesh reconstruction by ball pivoting
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`init`]: `.recon-kit/` scaffolding from embedded templates
//! - [`orchestrator`]: Pipeline job lifecycle and completion polling
//! - [`supervisor`]: Viewer process registry
//! - [`reconstruction`]: Surface reconstruction, decimation, cleanup and PLY I/O

pub mod config;
pub mod init;
pub mod orchestrator;
pub mod reconstruction;
pub mod supervisor;
