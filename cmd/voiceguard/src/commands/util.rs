//! Shared helpers for commands.

use clap::ValueEnum;
use voiceguard_cli::{load_config, Config, Output, OutputFormat};
use voiceguard_detector::{LanguageGatePolicy, Residency};

use crate::Cli;

const APP_NAME: &str = "voiceguard";

/// Loads the configuration.
pub fn get_config(cli: &Cli) -> anyhow::Result<Config> {
    load_config(APP_NAME, cli.config.as_deref())
}

/// Output settings from the global flags.
pub fn output(cli: &Cli) -> Output {
    let format = if cli.json { OutputFormat::Json } else { OutputFormat::Yaml };
    Output::new(format, cli.output.clone())
}

/// Prints success message.
pub fn print_success(msg: &str) {
    eprintln!("\x1b[32m✓\x1b[0m {}", msg);
}

/// Language gate policy as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Detect the spoken language and flag mismatches
    Acoustic,
    /// Take the declared language on faith (lower memory)
    TrustCaller,
}

impl From<PolicyArg> for LanguageGatePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Acoustic => LanguageGatePolicy::AcousticDetection,
            PolicyArg::TrustCaller => LanguageGatePolicy::TrustCaller,
        }
    }
}

/// Classifier residency as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResidencyArg {
    /// Keep the classifier loaded between clips
    Cached,
    /// Load and release the classifier for every clip
    PerRequest,
}

impl From<ResidencyArg> for Residency {
    fn from(arg: ResidencyArg) -> Self {
        match arg {
            ResidencyArg::Cached => Residency::Cached,
            ResidencyArg::PerRequest => Residency::PerRequest,
        }
    }
}
