//! Shared helpers for the integration tests.
//!
//! - Fixture scripts standing in for the pipeline program
//! - Event collection and assertions

pub mod assertions;
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
