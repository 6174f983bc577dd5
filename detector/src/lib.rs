//! HUMAN vs AI voice classification with language-mismatch spoof detection.
//!
//! # Architecture
//!
//! [`Detector::analyze`] runs one clip through five stages:
//!
//! 1. decode: container bytes -> duration-capped mono [`voiceguard_audio::AudioClip`]
//! 2. [`LanguageGate::estimate`]: clip -> [`LanguageEstimate`]
//! 3. MFCC: clip -> 13-dimensional fingerprint
//! 4. [`classify`]: fingerprint -> [`ClassificationResult`]
//! 5. [`ExplanationSynthesizer::synthesize`]: verdict + language -> text
//!
//! Any error becomes the fallback report (HUMAN, 0.50, "Analysis Error: ..."),
//! so callers always receive an [`AnalysisReport`].
//!
//! # Model Residency
//!
//! The language identifier and the classifier are both heavy. A
//! [`ModelRepository`] loads them lazily into a single slot:
//!
//! ```text
//! acoustic detection:  [lang-id load .. release] -> [classifier load .. release]
//! trust the caller:                                 [classifier load .. cached]
//! ```
//!
//! The slot lock is held for each acquisition, so concurrent requests sharing
//! a repository never hold two heavy models at once.
//!
//! # Example
//!
//! ```no_run
//! use voiceguard_detector::{Detector, DetectorConfig, ModelRepository};
//! use voiceguard_models::ModelSource;
//!
//! let config = DetectorConfig::default();
//! let models = ModelRepository::new(
//!     ModelSource::classifier_from_path("voice_classifier.json"),
//!     config.residency(),
//! )
//! .with_language_id(ModelSource::language_id_from_dir("models/whisper-tiny"));
//!
//! let detector = Detector::new(config, models);
//! let report = detector.analyze("clip.mp3", "English");
//! println!("{} {:.2} {}", report.label(), report.confidence(), report.explanation());
//! ```

mod classifier;
mod config;
mod error;
mod explain;
mod language;
mod lifecycle;
mod pipeline;
mod report;

pub use classifier::{classify, ClassificationResult, Label};
pub use config::DetectorConfig;
pub use error::AnalysisError;
pub use explain::{Explanation, ExplanationSynthesizer, DEFAULT_MISMATCH_PENALTY};
pub use language::{
    Language, LanguageEstimate, LanguageGate, LanguageGatePolicy, LanguageSource, DEFAULT_CONFIDENCE_THRESHOLD,
};
pub use lifecycle::{HeavyModel, LifecycleEvent, LifecycleObserver, ModelCensus, ModelRepository, Residency};
pub use pipeline::Detector;
pub use report::{AnalysisReport, Outcome, Stage, FALLBACK_CONFIDENCE, FALLBACK_LABEL};
