//! Heavy-model residency.
//!
//! [`ModelRepository`] owns the registered model sources and a single
//! heavy-model slot. Every acquisition holds the slot lock for its whole
//! duration, so at most one heavy model is resident per repository, across
//! stages and across concurrent requests sharing it.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::info;
use voiceguard_models::{LanguageIdentifier, ModelError, ModelId, ModelSource, VoiceClassifier};

use crate::error::AnalysisError;

/// The models whose residency is managed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeavyModel {
    LanguageId,
    Classifier,
}

impl fmt::Display for HeavyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LanguageId => f.write_str(ModelId::LANGUAGE_ID),
            Self::Classifier => f.write_str(ModelId::VOICE_CLASSIFIER),
        }
    }
}

/// What happens to the classifier after a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Residency {
    /// Keep it in the slot until something else needs the slot.
    Cached,
    /// Release it before the call returns.
    PerRequest,
}

/// Hook notified on every load and release.
pub trait LifecycleObserver: Send + Sync {
    fn on_load(&self, model: HeavyModel);
    fn on_release(&self, model: HeavyModel);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Loaded(HeavyModel),
    Released(HeavyModel),
}

/// Observer that counts live models and records every transition.
#[derive(Debug, Default)]
pub struct ModelCensus {
    state: Mutex<CensusState>,
}

#[derive(Debug, Default)]
struct CensusState {
    live: usize,
    peak: usize,
    events: Vec<LifecycleEvent>,
}

impl ModelCensus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of models currently resident.
    pub fn live(&self) -> usize {
        self.state().live
    }

    /// Highest number of simultaneously resident models seen.
    pub fn peak(&self) -> usize {
        self.state().peak
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.state().events.clone()
    }

    /// Number of times `model` has been loaded.
    pub fn loads(&self, model: HeavyModel) -> usize {
        self.state()
            .events
            .iter()
            .filter(|e| **e == LifecycleEvent::Loaded(model))
            .count()
    }

    fn state(&self) -> MutexGuard<'_, CensusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LifecycleObserver for ModelCensus {
    fn on_load(&self, model: HeavyModel) {
        let mut state = self.state();
        state.live += 1;
        state.peak = state.peak.max(state.live);
        state.events.push(LifecycleEvent::Loaded(model));
    }

    fn on_release(&self, model: HeavyModel) {
        let mut state = self.state();
        state.live = state.live.saturating_sub(1);
        state.events.push(LifecycleEvent::Released(model));
    }
}

/// Registered models plus the single heavy-model slot.
pub struct ModelRepository {
    classifier: ModelSource<dyn VoiceClassifier>,
    language_id: Option<ModelSource<dyn LanguageIdentifier>>,
    residency: Residency,
    /// Holds the classifier between requests under [`Residency::Cached`].
    slot: Mutex<Option<Box<dyn VoiceClassifier>>>,
    observer: Option<Arc<dyn LifecycleObserver>>,
}

impl ModelRepository {
    /// Registers the classifier. Nothing is loaded until first use.
    pub fn new(classifier: ModelSource<dyn VoiceClassifier>, residency: Residency) -> Self {
        Self {
            classifier,
            language_id: None,
            residency,
            slot: Mutex::new(None),
            observer: None,
        }
    }

    /// Registers the language identifier used under acoustic detection.
    pub fn with_language_id(mut self, source: ModelSource<dyn LanguageIdentifier>) -> Self {
        self.language_id = Some(source);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn residency(&self) -> Residency {
        self.residency
    }

    pub fn has_language_id(&self) -> bool {
        self.language_id.is_some()
    }

    /// Reports whether a cached classifier currently occupies the slot.
    pub fn is_classifier_resident(&self) -> bool {
        self.lock().is_some()
    }

    /// Loads the language identifier, runs `f`, and releases it.
    ///
    /// A cached classifier is evicted first. The identifier is released
    /// before this returns, including when `f` panics.
    pub fn use_language_id<R>(&self, f: impl FnOnce(&dyn LanguageIdentifier) -> R) -> Result<R, AnalysisError> {
        let source = self.language_id.as_ref().ok_or_else(|| {
            AnalysisError::unavailable(
                ModelId::LANGUAGE_ID,
                ModelError::NotRegistered(ModelId::LANGUAGE_ID.to_string()),
            )
        })?;

        let mut slot = self.lock();
        self.evict(&mut slot);

        let model = source
            .load()
            .map_err(|e| AnalysisError::unavailable(source.id(), e))?;
        let model = Resident::new(model, HeavyModel::LanguageId, self.observer.as_ref());
        Ok(f(&*model))
    }

    /// Runs `f` against the classifier, loading it if the slot is empty.
    ///
    /// Under [`Residency::PerRequest`] the classifier is released before this
    /// returns; under [`Residency::Cached`] it stays in the slot.
    pub fn use_classifier<R>(&self, f: impl FnOnce(&dyn VoiceClassifier) -> R) -> Result<R, AnalysisError> {
        let mut slot = self.lock();
        if let Some(model) = slot.as_deref() {
            return Ok(f(model));
        }

        let model = self
            .classifier
            .load()
            .map_err(|e| AnalysisError::unavailable(self.classifier.id(), e))?;

        match self.residency {
            Residency::Cached => {
                self.notify_load(HeavyModel::Classifier);
                let model = slot.insert(model);
                Ok(f(&**model))
            }
            Residency::PerRequest => {
                let model = Resident::new(model, HeavyModel::Classifier, self.observer.as_ref());
                Ok(f(&*model))
            }
        }
    }

    /// Drops any cached model.
    pub fn release_all(&self) {
        let mut slot = self.lock();
        self.evict(&mut slot);
    }

    fn evict(&self, slot: &mut Option<Box<dyn VoiceClassifier>>) {
        if let Some(model) = slot.take() {
            drop(model);
            self.notify_release(HeavyModel::Classifier);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn VoiceClassifier>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify_load(&self, model: HeavyModel) {
        notify_load(self.observer.as_ref(), model);
    }

    fn notify_release(&self, model: HeavyModel) {
        notify_release(self.observer.as_ref(), model);
    }
}

impl fmt::Debug for ModelRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRepository")
            .field("classifier", &self.classifier)
            .field("language_id", &self.language_id)
            .field("residency", &self.residency)
            .finish_non_exhaustive()
    }
}

impl Drop for ModelRepository {
    fn drop(&mut self) {
        self.release_all();
    }
}

fn notify_load(observer: Option<&Arc<dyn LifecycleObserver>>, model: HeavyModel) {
    info!(%model, "lifecycle: loaded");
    if let Some(o) = observer {
        o.on_load(model);
    }
}

fn notify_release(observer: Option<&Arc<dyn LifecycleObserver>>, model: HeavyModel) {
    info!(%model, "lifecycle: released");
    if let Some(o) = observer {
        o.on_release(model);
    }
}

/// A model scoped to one acquisition. Dropping it frees the model and then
/// reports the release.
struct Resident<'a, T: ?Sized> {
    model: Option<Box<T>>,
    kind: HeavyModel,
    observer: Option<&'a Arc<dyn LifecycleObserver>>,
}

impl<'a, T: ?Sized> Resident<'a, T> {
    fn new(model: Box<T>, kind: HeavyModel, observer: Option<&'a Arc<dyn LifecycleObserver>>) -> Self {
        notify_load(observer, kind);
        Self {
            model: Some(model),
            kind,
            observer,
        }
    }
}

impl<T: ?Sized> Deref for Resident<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.model {
            Some(model) => model,
            None => unreachable!("model is only taken on drop"),
        }
    }
}

impl<T: ?Sized> Drop for Resident<'_, T> {
    fn drop(&mut self) {
        drop(self.model.take());
        notify_release(self.observer, self.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use voiceguard_audio::LogMel;

    struct Stub;

    impl VoiceClassifier for Stub {
        fn classes(&self) -> &[String] {
            &[]
        }

        fn predict_proba(&self, _features: &[f32]) -> Result<Vec<f32>, ModelError> {
            Ok(vec![1.0])
        }
    }

    impl LanguageIdentifier for Stub {
        fn detect(&self, _mel: &LogMel) -> Result<Vec<(String, f32)>, ModelError> {
            Ok(vec![("en".into(), 1.0)])
        }
    }

    fn repo(residency: Residency, census: &Arc<ModelCensus>) -> ModelRepository {
        let classifier = ModelSource::from_fn("stub-classifier", || Ok(Box::new(Stub) as Box<dyn VoiceClassifier>));
        let langid = ModelSource::from_fn("stub-langid", || Ok(Box::new(Stub) as Box<dyn LanguageIdentifier>));
        ModelRepository::new(classifier, residency)
            .with_language_id(langid)
            .with_observer(census.clone())
    }

    #[test]
    fn test_per_request_releases_after_each_call() {
        let census = Arc::new(ModelCensus::new());
        let repo = repo(Residency::PerRequest, &census);

        repo.use_classifier(|m| m.predict(&[]).unwrap()).unwrap();
        repo.use_classifier(|m| m.predict(&[]).unwrap()).unwrap();

        assert_eq!(census.loads(HeavyModel::Classifier), 2);
        assert_eq!(census.live(), 0);
        assert!(!repo.is_classifier_resident());
    }

    #[test]
    fn test_cached_loads_once() {
        let census = Arc::new(ModelCensus::new());
        let repo = repo(Residency::Cached, &census);

        for _ in 0..3 {
            repo.use_classifier(|_| ()).unwrap();
        }
        assert_eq!(census.loads(HeavyModel::Classifier), 1);
        assert_eq!(census.live(), 1);
        assert!(repo.is_classifier_resident());

        repo.release_all();
        assert_eq!(census.live(), 0);
    }

    #[test]
    fn test_language_id_evicts_cached_classifier() {
        let census = Arc::new(ModelCensus::new());
        let repo = repo(Residency::Cached, &census);

        repo.use_classifier(|_| ()).unwrap();
        repo.use_language_id(|_| ()).unwrap();
        repo.use_classifier(|_| ()).unwrap();

        use HeavyModel::*;
        use LifecycleEvent::*;
        assert_eq!(
            census.events(),
            vec![
                Loaded(Classifier),
                Released(Classifier),
                Loaded(LanguageId),
                Released(LanguageId),
                Loaded(Classifier),
            ]
        );
        assert_eq!(census.peak(), 1);
    }

    #[test]
    fn test_release_runs_on_panic() {
        let census = Arc::new(ModelCensus::new());
        let repo = repo(Residency::PerRequest, &census);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            repo.use_language_id(|_| panic!("boom")).unwrap();
        }));
        assert!(result.is_err());
        assert_eq!(census.live(), 0);

        // Poisoned slot is still usable.
        repo.use_classifier(|_| ()).unwrap();
        assert_eq!(census.live(), 0);
    }

    #[test]
    fn test_missing_language_id_is_unavailable() {
        let classifier = ModelSource::from_fn("stub", || Ok(Box::new(Stub) as Box<dyn VoiceClassifier>));
        let repo = ModelRepository::new(classifier, Residency::PerRequest);
        assert!(!repo.has_language_id());
        assert!(matches!(
            repo.use_language_id(|_| ()),
            Err(AnalysisError::ModelUnavailable { .. })
        ));
    }

    #[test]
    fn test_failed_load_is_unavailable_and_not_counted() {
        let census = Arc::new(ModelCensus::new());
        let classifier: ModelSource<dyn VoiceClassifier> =
            ModelSource::from_fn("broken", || Err(ModelError::Invalid("corrupt".into())));
        let repo = ModelRepository::new(classifier, Residency::Cached).with_observer(census.clone());

        let err = repo.use_classifier(|_| ()).unwrap_err();
        assert!(err.to_string().contains("broken"));
        assert_eq!(census.loads(HeavyModel::Classifier), 0);
    }

    #[test]
    fn test_residency_serde_names() {
        assert_eq!(serde_json::to_string(&Residency::PerRequest).unwrap(), "\"per_request\"");
        let r: Residency = serde_json::from_str("\"cached\"").unwrap();
        assert_eq!(r, Residency::Cached);
    }
}
