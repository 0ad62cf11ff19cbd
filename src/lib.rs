//! Packageless
//!
//! This crate maps named packages onto container images plus a declarative
//! manifest, and installs, runs, upgrades and uninstalls them through a
//! container engine.

pub mod error;
pub mod config;
pub mod package;
pub mod engine;
pub mod alias;
pub mod layout;
pub mod lifecycle;
pub mod cli;

// Re-export core types for convenience
pub use error::*;
pub use config::Config;
pub use lifecycle::Orchestrator;

/// Version of this build of packageless
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
