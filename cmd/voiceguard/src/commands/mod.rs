//! CLI commands module.

mod analyze;
mod config;
mod util;

pub use analyze::AnalyzeCommand;
pub use config::ConfigCommand;

pub(crate) use util::*;
