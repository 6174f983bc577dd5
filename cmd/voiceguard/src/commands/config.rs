//! Configuration management commands.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use voiceguard_cli::Profile;
use voiceguard_detector::DetectorConfig;

use super::{get_config, output, print_success, PolicyArg, ResidencyArg};
use crate::Cli;

/// Manage CLI configuration.
///
/// Profiles bundle model artifacts with detector settings, similar to
/// kubectl's context management.
///
/// Configuration is stored in ~/.voiceguard/voiceguard/config.yaml
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Add or replace a profile
    #[command(name = "add-profile")]
    AddProfile {
        /// Profile name
        name: String,
        /// Classifier artifact (random forest JSON)
        #[arg(long)]
        classifier_model: PathBuf,
        /// Whisper checkpoint directory for language identification
        #[arg(long)]
        language_model: Option<PathBuf>,
        /// Language gate policy
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
        /// Classifier residency (default depends on the policy)
        #[arg(long, value_enum)]
        residency: Option<ResidencyArg>,
        /// Decoding ceiling in seconds (2-5)
        #[arg(long)]
        max_clip_secs: Option<f32>,
        /// Minimum detector probability for a language to count as detected
        #[arg(long)]
        language_threshold: Option<f32>,
        /// Confidence reported on a language mismatch
        #[arg(long)]
        mismatch_penalty: Option<f32>,
    },
    /// Delete a profile
    #[command(name = "delete-profile")]
    DeleteProfile {
        /// Profile name
        name: String,
    },
    /// Set the current profile
    #[command(name = "use-profile")]
    UseProfile {
        /// Profile name
        name: String,
    },
    /// Display the current profile
    #[command(name = "get-profile")]
    GetProfile,
    /// List all profiles
    #[command(name = "list-profiles", alias = "get-profiles")]
    ListProfiles,
    /// View the current configuration
    View,
}

impl ConfigCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.command {
            ConfigSubcommand::AddProfile {
                name,
                classifier_model,
                language_model,
                policy,
                residency,
                max_clip_secs,
                language_threshold,
                mismatch_penalty,
            } => {
                let mut cfg = get_config(cli)?;

                let defaults = DetectorConfig::default();
                let profile = Profile {
                    classifier_model: classifier_model.clone(),
                    language_model: language_model.clone(),
                    detector: DetectorConfig {
                        policy: policy.map(Into::into).unwrap_or(defaults.policy),
                        max_clip_secs: max_clip_secs.unwrap_or(defaults.max_clip_secs),
                        language_confidence_threshold: language_threshold
                            .unwrap_or(defaults.language_confidence_threshold),
                        mismatch_penalty: mismatch_penalty.unwrap_or(defaults.mismatch_penalty),
                        classifier_residency: residency.map(Into::into),
                    },
                    ..Default::default()
                };
                profile.validate()?;

                cfg.add_profile(name, profile)?;
                print_success(&format!("Profile \"{}\" added successfully", name));
                Ok(())
            }

            ConfigSubcommand::DeleteProfile { name } => {
                let mut cfg = get_config(cli)?;
                cfg.delete_profile(name)?;
                print_success(&format!("Profile \"{}\" deleted", name));
                Ok(())
            }

            ConfigSubcommand::UseProfile { name } => {
                let mut cfg = get_config(cli)?;
                cfg.use_profile(name)?;
                print_success(&format!("Switched to profile \"{}\"", name));
                Ok(())
            }

            ConfigSubcommand::GetProfile => {
                let cfg = get_config(cli)?;
                if cfg.current_profile.is_empty() {
                    println!("No current profile set");
                } else {
                    println!("{}", cfg.current_profile);
                }
                Ok(())
            }

            ConfigSubcommand::ListProfiles => {
                let cfg = get_config(cli)?;

                if cfg.profiles.is_empty() {
                    println!("No profiles configured");
                    return Ok(());
                }

                println!("{:<8} {:<20} {:<20} {}", "CURRENT", "NAME", "POLICY", "CLASSIFIER");
                for name in cfg.list_profiles() {
                    let Some(profile) = cfg.get_profile(name) else {
                        continue;
                    };
                    let current = if name == cfg.current_profile { "*" } else { "" };
                    println!(
                        "{:<8} {:<20} {:<20} {}",
                        current,
                        name,
                        profile.detector.policy,
                        profile.classifier_model.display()
                    );
                }

                Ok(())
            }

            ConfigSubcommand::View => {
                let cfg = get_config(cli)?;
                eprintln!("Config file: {}", cfg.path().display());
                output(cli).write(&cfg)
            }
        }
    }
}
