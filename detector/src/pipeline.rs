//! One-pass orchestration: decode, language gate, fingerprint, classify,
//! explain.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::{debug, warn};
use voiceguard_audio::{decode_file, DecodeOptions, Mfcc};

use crate::classifier::classify;
use crate::config::DetectorConfig;
use crate::error::AnalysisError;
use crate::explain::ExplanationSynthesizer;
use crate::language::{Language, LanguageGate};
use crate::lifecycle::ModelRepository;
use crate::report::{AnalysisReport, Outcome, Stage};

/// Runs the analysis pipeline against a shared [`ModelRepository`].
///
/// A `Detector` is `Sync`; concurrent calls share the repository's single
/// heavy-model slot.
pub struct Detector {
    config: DetectorConfig,
    decode: DecodeOptions,
    models: ModelRepository,
    gate: LanguageGate,
    mfcc: Mfcc,
    explainer: ExplanationSynthesizer,
}

impl Detector {
    pub fn new(config: DetectorConfig, models: ModelRepository) -> Self {
        Self {
            decode: config.decode_options(),
            gate: LanguageGate::new(config.policy, config.language_confidence_threshold),
            mfcc: Mfcc::default(),
            explainer: ExplanationSynthesizer::new(config.mismatch_penalty),
            config,
            models,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn models(&self) -> &ModelRepository {
        &self.models
    }

    /// Analyses the clip at `path` against the declared language.
    ///
    /// Never fails: internal errors yield the fallback report. The file is
    /// only read; its lifetime belongs to the caller.
    pub fn analyze(&self, path: impl AsRef<Path>, declared: &str) -> AnalysisReport {
        self.run(path, declared).into_report()
    }

    /// Like [`Detector::analyze`], but reports whether and where the run
    /// failed.
    pub fn run(&self, path: impl AsRef<Path>, declared: &str) -> Outcome {
        let path = path.as_ref();
        let mut stage = Stage::Decoding;
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run_stages(path, declared, &mut stage)))
            .unwrap_or_else(|payload| Err(AnalysisError::Internal(panic_message(payload))));

        match result {
            Ok(report) => {
                debug!(
                    path = %path.display(),
                    label = %report.label(),
                    confidence = report.confidence(),
                    "detector: done"
                );
                Outcome::Completed(report)
            }
            Err(error) => {
                warn!(
                    path = %path.display(),
                    %stage,
                    %error,
                    "detector: returning fallback report"
                );
                Outcome::failed(stage, error)
            }
        }
    }

    fn run_stages(&self, path: &Path, declared: &str, stage: &mut Stage) -> Result<AnalysisReport, AnalysisError> {
        *stage = Stage::Decoding;
        let declared: Language = declared.parse()?;
        let clip = decode_file(path, &self.decode)?;
        debug!(
            samples = clip.samples().len(),
            sample_rate = clip.sample_rate(),
            channels = clip.channels(),
            "detector: decoded"
        );

        *stage = Stage::LanguageGating;
        let estimate = self.gate.estimate(&clip, declared, &self.models)?;

        *stage = Stage::FeatureExtracting;
        let wave = clip.resampled(self.mfcc.config().sample_rate as u32)?;
        drop(clip);
        let features = self.mfcc.mean_coefficients(&wave.samples, wave.sample_rate)?;
        drop(wave);

        *stage = Stage::Classifying;
        let result = self.models.use_classifier(|model| classify(model, &features))??;
        debug!(label = %result.label, confidence = result.confidence, "detector: classified");

        *stage = Stage::Explaining;
        let explanation = self.explainer.synthesize(&result, &estimate, declared);

        *stage = Stage::Done;
        Ok(AnalysisReport::new(result.label, explanation.confidence, explanation.text))
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic during analysis".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Label;
    use crate::lifecycle::Residency;
    use voiceguard_models::{ModelSource, VoiceClassifier};

    fn unreachable_detector() -> Detector {
        let classifier: ModelSource<dyn VoiceClassifier> =
            ModelSource::from_fn("never", || panic!("classifier must not load"));
        Detector::new(DetectorConfig::default(), ModelRepository::new(classifier, Residency::PerRequest))
    }

    #[test]
    fn test_unsupported_language_falls_back_before_decoding() {
        let detector = unreachable_detector();
        let outcome = detector.run("/nonexistent.wav", "Klingon");
        match &outcome {
            Outcome::Fallback { stage, error, .. } => {
                assert_eq!(*stage, Stage::Decoding);
                assert!(matches!(error, AnalysisError::UnsupportedLanguage(_)));
            }
            Outcome::Completed(_) => panic!("expected fallback"),
        }
        assert_eq!(outcome.report().label(), Label::Human);
    }

    #[test]
    fn test_missing_file_is_fallback() {
        let report = unreachable_detector().analyze("/nonexistent/clip.mp3", "English");
        assert_eq!(report.label(), Label::Human);
        assert_eq!(report.confidence(), 0.5);
        assert!(report.explanation().starts_with("Analysis Error: decode error"));
    }

    #[test]
    fn test_panic_payloads_are_described() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(7u8)), "panic during analysis");
    }
}
