//! Configuration management for the voiceguard command line.
//!
//! Configuration is stored in ~/.voiceguard/{app_name}/config.yaml and holds
//! named profiles, one of which is current.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _};
use serde::{Deserialize, Serialize};
use voiceguard_detector::{Detector, DetectorConfig, LanguageGatePolicy, LifecycleObserver, ModelRepository};
use voiceguard_models::ModelSource;

/// Default base configuration directory name.
pub const DEFAULT_BASE_DIR: &str = ".voiceguard";
/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Application name (not serialized).
    #[serde(skip)]
    pub app_name: String,

    /// Name of the currently active profile.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_profile: String,

    /// Map of profile name to profile.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub profiles: HashMap<String, Profile>,

    /// Path to the config file (not serialized).
    #[serde(skip)]
    config_path: PathBuf,
}

/// Model artifacts plus detector settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Random forest JSON artifact.
    pub classifier_model: PathBuf,

    /// Whisper checkpoint directory (config.json, tokenizer.json,
    /// model.safetensors). Required under acoustic detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_model: Option<PathBuf>,

    #[serde(default)]
    pub detector: DetectorConfig,
}

impl Config {
    /// Gets the default config directory.
    pub fn default_config_dir(app_name: &str) -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR).join(app_name))
    }

    /// Gets the default config file path.
    pub fn default_config_path(app_name: &str) -> Option<PathBuf> {
        Self::default_config_dir(app_name).map(|dir| dir.join(DEFAULT_CONFIG_FILE))
    }

    /// Returns the config file path.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Saves the configuration to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&self.config_path, content)
            .with_context(|| format!("write {}", self.config_path.display()))?;
        Ok(())
    }

    /// Adds or replaces a profile.
    pub fn add_profile(&mut self, name: &str, mut profile: Profile) -> anyhow::Result<()> {
        profile.name = name.to_string();
        self.profiles.insert(name.to_string(), profile);
        if self.current_profile.is_empty() {
            self.current_profile = name.to_string();
        }
        self.save()
    }

    /// Deletes a profile.
    pub fn delete_profile(&mut self, name: &str) -> anyhow::Result<()> {
        if self.profiles.remove(name).is_none() {
            bail!("profile '{}' not found", name);
        }
        if self.current_profile == name {
            self.current_profile.clear();
        }
        self.save()
    }

    /// Sets the current profile.
    pub fn use_profile(&mut self, name: &str) -> anyhow::Result<()> {
        if !self.profiles.contains_key(name) {
            bail!("profile '{}' not found", name);
        }
        self.current_profile = name.to_string();
        self.save()
    }

    pub fn get_profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    /// Resolves the profile by name, or the current profile if no name is
    /// given.
    pub fn resolve_profile(&self, name: Option<&str>) -> anyhow::Result<&Profile> {
        let name = match name {
            Some(n) if !n.is_empty() => n,
            _ if !self.current_profile.is_empty() => self.current_profile.as_str(),
            _ => bail!("no profile selected; run 'config add-profile' or pass --profile"),
        };
        self.get_profile(name)
            .ok_or_else(|| anyhow::anyhow!("profile '{}' not found", name))
    }

    /// Lists profile names, sorted.
    pub fn list_profiles(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Profile {
    /// Builds a detector from this profile's artifacts. Nothing is loaded
    /// until the first analysis.
    pub fn build_detector(&self, observer: Option<Arc<dyn LifecycleObserver>>) -> anyhow::Result<Detector> {
        let mut models = self.repository()?;
        if let Some(observer) = observer {
            models = models.with_observer(observer);
        }
        Ok(Detector::new(self.detector.clone(), models))
    }

    /// Registers this profile's artifacts without loading them.
    pub fn repository(&self) -> anyhow::Result<ModelRepository> {
        self.validate()?;
        let mut models = ModelRepository::new(
            ModelSource::classifier_from_path(&self.classifier_model),
            self.detector.residency(),
        );
        if let Some(path) = &self.language_model {
            models = models.with_language_id(ModelSource::language_id_from_dir(path));
        }
        Ok(models)
    }

    /// Checks that the artifacts the policy needs are configured and the
    /// detector settings are in range.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.classifier_model.as_os_str().is_empty() {
            bail!("profile '{}': classifier_model is not set", self.name);
        }
        for (field, value) in [
            ("language_confidence_threshold", self.detector.language_confidence_threshold),
            ("mismatch_penalty", self.detector.mismatch_penalty),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("profile '{}': {} must be within [0, 1], got {}", self.name, field, value);
            }
        }
        if self.detector.policy == LanguageGatePolicy::AcousticDetection && self.language_model.is_none() {
            bail!(
                "profile '{}': language_model is required under {} (or use policy trust_caller)",
                self.name,
                self.detector.policy
            );
        }
        Ok(())
    }
}

/// Loads configuration for the specified app, creating an empty file on
/// first use.
pub fn load_config(app_name: &str, custom_path: Option<&str>) -> anyhow::Result<Config> {
    let config_path = config_path(app_name, custom_path)?;

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut cfg = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        serde_yaml::from_str(&content).with_context(|| format!("parse {}", config_path.display()))?
    } else {
        let cfg = Config::default();
        let content = serde_yaml::to_string(&cfg)?;
        std::fs::write(&config_path, content)?;
        cfg
    };

    cfg.app_name = app_name.to_string();
    cfg.config_path = config_path;

    Ok(cfg)
}

fn config_path(app_name: &str, custom_path: Option<&str>) -> anyhow::Result<PathBuf> {
    match custom_path {
        Some(p) => Ok(PathBuf::from(p)),
        None => Config::default_config_path(app_name).ok_or_else(|| anyhow::anyhow!("cannot determine config path")),
    }
}
