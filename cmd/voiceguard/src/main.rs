//! voiceguard CLI - HUMAN vs AI voice analysis from the command line.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{AnalyzeCommand, ConfigCommand};

/// voiceguard CLI - HUMAN vs AI voice analysis.
///
/// This tool classifies speech clips as HUMAN or AI-generated and flags clips
/// whose spoken language does not match the declared one.
///
/// Configuration is stored in ~/.voiceguard/voiceguard/ and supports multiple
/// profiles, similar to kubectl's context management.
#[derive(Parser)]
#[command(name = "voiceguard")]
#[command(about = "HUMAN vs AI voice analysis tool")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.voiceguard/voiceguard/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Profile name to use
    #[arg(short = 'p', long, global = true)]
    pub profile: Option<String>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<String>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage CLI configuration
    Config(ConfigCommand),
    /// Analyse audio clips
    Analyze(AnalyzeCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Config(cmd) => cmd.run(&cli).await,
        Commands::Analyze(cmd) => cmd.run(&cli).await,
    }
}
