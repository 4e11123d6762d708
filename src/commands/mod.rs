//! CLI command implementations for faas-inspector.
//!
//! This module provides implementations for all CLI subcommands:
//! - `invoke`: Local invocation harness
//! - `config`: Configuration file generation
//! - `check`: Host source validation

pub mod check;
pub mod config;
pub mod invoke;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use invoke::command_invoke;
