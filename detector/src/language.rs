//! Language gate: estimate or accept the spoken language.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;
use voiceguard_audio::fbank::{Config as LogMelConfig, Extractor as LogMelExtractor};
use voiceguard_audio::AudioClip;

use crate::error::AnalysisError;
use crate::lifecycle::ModelRepository;

/// Default probability below which a detection is considered unreliable.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.15;

/// Languages the detector reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    English,
    Hindi,
    Tamil,
    Telugu,
    Malayalam,
    /// Detected speech outside the supported set.
    Unknown,
}

impl Language {
    /// Languages a caller may declare.
    pub const SUPPORTED: [Language; 5] = [
        Language::English,
        Language::Hindi,
        Language::Tamil,
        Language::Telugu,
        Language::Malayalam,
    ];

    /// ISO 639-1 code; `"und"` for [`Language::Unknown`].
    pub fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Hindi => "hi",
            Self::Tamil => "ta",
            Self::Telugu => "te",
            Self::Malayalam => "ml",
            Self::Unknown => "und",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Hindi => "Hindi",
            Self::Tamil => "Tamil",
            Self::Telugu => "Telugu",
            Self::Malayalam => "Malayalam",
            Self::Unknown => "Unknown",
        }
    }

    /// Maps a detector language code to a supported language, or `Unknown`.
    pub fn from_code(code: &str) -> Self {
        Self::SUPPORTED
            .into_iter()
            .find(|l| l.code().eq_ignore_ascii_case(code.trim()))
            .unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = AnalysisError;

    /// Parses a declared language by name or code, case-insensitively.
    /// `Unknown` is never a valid declaration.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::SUPPORTED
            .into_iter()
            .find(|l| l.name().eq_ignore_ascii_case(s) || l.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| AnalysisError::UnsupportedLanguage(s.to_string()))
    }
}

/// How the spoken language is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageGatePolicy {
    /// Run the language identifier and compare against the declaration.
    #[default]
    AcousticDetection,
    /// Adopt the declared language without listening. Never loads the
    /// language identifier and can never report a mismatch.
    TrustCaller,
}

impl fmt::Display for LanguageGatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AcousticDetection => write!(f, "acoustic_detection"),
            Self::TrustCaller => write!(f, "trust_caller"),
        }
    }
}

/// Where a [`LanguageEstimate`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageSource {
    /// The identifier's top language cleared the threshold.
    Detected,
    /// The identifier was unsure; the declared language was substituted.
    DeclaredFallback,
    /// Trust-the-caller policy.
    Declared,
}

/// The resolved spoken language.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LanguageEstimate {
    pub language: Language,
    /// Probability in [0, 1] behind the estimate.
    pub confidence: f32,
    pub source: LanguageSource,
}

impl LanguageEstimate {
    /// Estimate under the trust-the-caller policy.
    pub fn declared(language: Language) -> Self {
        Self {
            language,
            confidence: 1.0,
            source: LanguageSource::Declared,
        }
    }

    /// Resolves an identifier's distribution against the declaration.
    ///
    /// Picks the most probable code (first wins on ties). Below `threshold`
    /// the declared language is used verbatim; otherwise the code is mapped
    /// into the supported set, with anything else becoming `Unknown`.
    pub fn resolve(probs: &[(String, f32)], declared: Language, threshold: f32) -> Self {
        let mut best: Option<(&str, f32)> = None;
        for (code, p) in probs {
            let p = if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 };
            if best.is_none_or(|(_, bp)| p > bp) {
                best = Some((code.as_str(), p));
            }
        }

        match best {
            Some((code, p)) if p >= threshold => Self {
                language: Language::from_code(code),
                confidence: p,
                source: LanguageSource::Detected,
            },
            other => Self {
                language: declared,
                confidence: other.map(|(_, p)| p).unwrap_or(0.0),
                source: LanguageSource::DeclaredFallback,
            },
        }
    }
}

/// Establishes the spoken language for one clip.
pub struct LanguageGate {
    policy: LanguageGatePolicy,
    threshold: f32,
    log_mel: LogMelExtractor,
}

impl LanguageGate {
    pub fn new(policy: LanguageGatePolicy, threshold: f32) -> Self {
        Self {
            policy,
            threshold,
            log_mel: LogMelExtractor::new(LogMelConfig::default()),
        }
    }

    pub fn policy(&self) -> LanguageGatePolicy {
        self.policy
    }

    /// Returns the language estimate for `clip`.
    ///
    /// Under acoustic detection the language identifier is acquired through
    /// `models` and released before this returns.
    pub fn estimate(
        &self,
        clip: &AudioClip,
        declared: Language,
        models: &ModelRepository,
    ) -> Result<LanguageEstimate, AnalysisError> {
        if self.policy == LanguageGatePolicy::TrustCaller {
            return Ok(LanguageEstimate::declared(declared));
        }

        let rate = self.log_mel.config().sample_rate as u32;
        let wave = clip.resampled(rate)?;
        let mel = self.log_mel.extract(&wave.samples, wave.sample_rate)?;
        drop(wave);

        let probs = models.use_language_id(|model| model.detect(&mel))?;
        let probs = probs.map_err(AnalysisError::Inference)?;
        let estimate = LanguageEstimate::resolve(&probs, declared, self.threshold);
        debug!(
            language = %estimate.language,
            confidence = estimate.confidence,
            source = ?estimate.source,
            "language gate: resolved"
        );
        Ok(estimate)
    }
}
