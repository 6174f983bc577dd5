//! Model handles: register a model by ID, load it on demand.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use voiceguard_audio::LogMel;

use crate::error::ModelError;
use crate::forest::RandomForest;
use crate::whisper::WhisperLanguageId;

/// Identifies a model slot.
pub struct ModelId;

impl ModelId {
    /// Binary HUMAN/AI classifier.
    /// Input: [13] f32 (mean MFCC fingerprint)
    /// Output: per-class probabilities
    pub const VOICE_CLASSIFIER: &str = "voice-classifier";

    /// Spoken language identifier (Whisper checkpoint).
    /// Input: [T, 80] f32 log mel spectrogram, T <= 3000
    /// Output: probability per language code
    pub const LANGUAGE_ID: &str = "language-id";
}

/// A pre-trained classifier over a fixed-length feature vector.
///
/// Implementations must be safe for concurrent use and must never mutate
/// their parameters during inference.
pub trait VoiceClassifier: Send + Sync {
    /// Class labels in probability order.
    fn classes(&self) -> &[String];

    /// Returns one probability per class, summing to 1.
    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>, ModelError>;

    /// Returns the index of the most probable class and its probability.
    /// Ties resolve to the lowest index.
    fn predict(&self, features: &[f32]) -> Result<(usize, f32), ModelError> {
        let proba = self.predict_proba(features)?;
        let mut best = 0;
        for (i, &p) in proba.iter().enumerate() {
            if p > proba[best] {
                best = i;
            }
        }
        let p = proba
            .get(best)
            .copied()
            .ok_or_else(|| ModelError::Invalid("classifier returned no probabilities".into()))?;
        Ok((best, p))
    }
}

/// A pre-trained spoken language identifier.
pub trait LanguageIdentifier: Send + Sync {
    /// Returns `(language code, probability)` pairs covering every language
    /// the model knows.
    fn detect(&self, mel: &LogMel) -> Result<Vec<(String, f32)>, ModelError>;
}

type Loader<T> = dyn Fn() -> Result<Box<T>, ModelError> + Send + Sync;

/// A registered but not yet loaded model.
///
/// Cloning is cheap and never loads the model.
pub struct ModelSource<T: ?Sized> {
    id: String,
    location: Option<PathBuf>,
    loader: Arc<Loader<T>>,
}

impl<T: ?Sized> Clone for ModelSource<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            location: self.location.clone(),
            loader: Arc::clone(&self.loader),
        }
    }
}

impl<T: ?Sized> fmt::Debug for ModelSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSource")
            .field("id", &self.id)
            .field("location", &self.location)
            .finish()
    }
}

impl<T: ?Sized> ModelSource<T> {
    /// Registers a model backed by an arbitrary loader.
    pub fn from_fn<F>(id: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Result<Box<T>, ModelError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            location: None,
            loader: Arc::new(loader),
        }
    }

    /// Returns the model ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the artifact path for file-backed sources.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Materialises the model. Every call produces a fresh instance.
    pub fn load(&self) -> Result<Box<T>, ModelError> {
        (self.loader)()
    }
}

impl ModelSource<dyn VoiceClassifier> {
    /// Registers a [`RandomForest`] JSON artifact.
    pub fn classifier_from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let load_path = path.clone();
        let mut source = Self::from_fn(ModelId::VOICE_CLASSIFIER, move || {
            let forest = RandomForest::from_path(&load_path)?;
            Ok(Box::new(forest) as Box<dyn VoiceClassifier>)
        });
        source.location = Some(path);
        source
    }
}

impl ModelSource<dyn LanguageIdentifier> {
    /// Registers a [`WhisperLanguageId`] checkpoint directory.
    pub fn language_id_from_dir(dir: impl Into<PathBuf>) -> Self {
        let path = dir.into();
        let load_path = path.clone();
        let mut source = Self::from_fn(ModelId::LANGUAGE_ID, move || {
            let model = WhisperLanguageId::from_dir(&load_path)?;
            Ok(Box::new(model) as Box<dyn LanguageIdentifier>)
        });
        source.location = Some(path);
        source
    }
}

/// Reads an artifact file, mapping failures to [`ModelError::Io`].
pub(crate) fn read_artifact(path: &Path) -> Result<String, ModelError> {
    std::fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(Vec<f32>);

    impl VoiceClassifier for Fixed {
        fn classes(&self) -> &[String] {
            &[]
        }

        fn predict_proba(&self, _features: &[f32]) -> Result<Vec<f32>, ModelError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_predict_picks_max() {
        let model = Fixed(vec![0.3, 0.7]);
        assert_eq!(model.predict(&[]).unwrap(), (1, 0.7));
    }

    #[test]
    fn test_predict_tie_picks_first() {
        let model = Fixed(vec![0.5, 0.5]);
        assert_eq!(model.predict(&[]).unwrap().0, 0);
    }

    #[test]
    fn test_source_loads_lazily() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let source: ModelSource<dyn VoiceClassifier> = ModelSource::from_fn("mock", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(Fixed(vec![1.0])) as Box<dyn VoiceClassifier>)
        });

        let cloned = source.clone();
        assert_eq!(loads.load(Ordering::SeqCst), 0, "registration must not load");
        let _a = source.load().unwrap();
        let _b = cloned.load().unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(source.id(), "mock");
    }

    #[test]
    fn test_missing_artifact_is_io_error() {
        let source = ModelSource::classifier_from_path("/nonexistent/voice_classifier.json");
        assert_eq!(source.id(), ModelId::VOICE_CLASSIFIER);
        assert!(matches!(source.load(), Err(ModelError::Io { .. })));
    }

    #[test]
    fn test_language_id_source_loads_lazily() {
        let source = ModelSource::language_id_from_dir("/nonexistent/whisper-tiny");
        assert_eq!(source.id(), ModelId::LANGUAGE_ID);
        assert_eq!(source.location(), Some(Path::new("/nonexistent/whisper-tiny")));
        assert!(matches!(source.load(), Err(ModelError::Io { .. })));
    }
}
