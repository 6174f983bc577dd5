use std::time::Duration;

use serde::{Deserialize, Serialize};
use voiceguard_audio::DecodeOptions;

use crate::explain::DEFAULT_MISMATCH_PENALTY;
use crate::language::{LanguageGatePolicy, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::lifecycle::Residency;

/// Detector tuning. Every field has a default, so an empty YAML/JSON
/// document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub policy: LanguageGatePolicy,

    /// Decoding ceiling in seconds, clamped to 2..=5.
    pub max_clip_secs: f32,

    pub language_confidence_threshold: f32,

    pub mismatch_penalty: f32,

    /// Unset means: per request under acoustic detection, cached under
    /// trust-the-caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier_residency: Option<Residency>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            policy: LanguageGatePolicy::default(),
            max_clip_secs: 3.0,
            language_confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            mismatch_penalty: DEFAULT_MISMATCH_PENALTY,
            classifier_residency: None,
        }
    }
}

impl DetectorConfig {
    /// Effective classifier residency.
    pub fn residency(&self) -> Residency {
        self.classifier_residency.unwrap_or(match self.policy {
            LanguageGatePolicy::AcousticDetection => Residency::PerRequest,
            LanguageGatePolicy::TrustCaller => Residency::Cached,
        })
    }

    pub fn decode_options(&self) -> DecodeOptions {
        match Duration::try_from_secs_f32(self.max_clip_secs) {
            Ok(d) => DecodeOptions::with_max_duration(d),
            Err(_) => DecodeOptions::default(),
        }
    }
}
