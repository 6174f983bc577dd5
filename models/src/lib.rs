//! Pre-trained model artifacts consumed read-only by the voice detector.
//!
//! Two model families are supported:
//!
//! - [`RandomForest`]: binary voice classifier over the 13-dimensional
//!   MFCC fingerprint, stored as JSON and exposing `predict` /
//!   `predict_proba`.
//! - [`WhisperLanguageId`]: a multilingual Whisper checkpoint (safetensors)
//!   run with candle, producing a probability per language code.
//!
//! Models are not loaded when registered. A [`ModelSource`] is a cheap
//! handle that materialises the model only when [`ModelSource::load`] is
//! called, so the caller decides when the memory is paid for and when it is
//! released (by dropping the returned box).
//!
//! # Usage
//!
//! ```no_run
//! use voiceguard_models::{ModelSource, VoiceClassifier};
//!
//! let source = ModelSource::classifier_from_path("models/voice_classifier.json");
//! let model = source.load().unwrap();
//! let proba = model.predict_proba(&[0.0; 13]).unwrap();
//! drop(model);
//! ```

mod error;
pub mod forest;
pub mod model;
pub mod whisper;

pub use error::ModelError;
pub use forest::RandomForest;
pub use model::{LanguageIdentifier, ModelId, ModelSource, VoiceClassifier};
pub use whisper::WhisperLanguageId;
