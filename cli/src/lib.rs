//! CLI utilities for voiceguard.
//!
//! This crate provides profile-based configuration and output formatting for
//! the command line tools.

pub mod config;
pub mod output;

pub use config::{load_config, Config, Profile};
pub use output::{Output, OutputFormat};
