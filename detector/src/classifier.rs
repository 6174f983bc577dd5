//! HUMAN/AI classification over the MFCC fingerprint.

use std::fmt;

use serde::{Deserialize, Serialize};
use voiceguard_audio::FeatureVector;
use voiceguard_models::VoiceClassifier;

use crate::error::AnalysisError;
use crate::report::{FALLBACK_CONFIDENCE, FALLBACK_LABEL};

/// Verdict on who produced the voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "HUMAN")]
    Human,
    #[serde(rename = "AI")]
    Ai,
}

impl Label {
    /// Maps a classifier class name to a label, case-insensitively.
    pub fn from_class(class: &str) -> Option<Self> {
        match class.trim().to_ascii_uppercase().as_str() {
            "HUMAN" => Some(Self::Human),
            "AI" => Some(Self::Ai),
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Human => write!(f, "HUMAN"),
            Self::Ai => write!(f, "AI"),
        }
    }
}

/// A label and the probability mass the classifier assigned to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: Label,
    /// Always in [0, 1].
    pub confidence: f32,
}

impl Default for ClassificationResult {
    fn default() -> Self {
        Self {
            label: FALLBACK_LABEL,
            confidence: FALLBACK_CONFIDENCE,
        }
    }
}

/// Classifies a fingerprint.
///
/// The confidence is the maximum class posterior, and the label is the class
/// that posterior belongs to.
pub fn classify(model: &dyn VoiceClassifier, features: &FeatureVector) -> Result<ClassificationResult, AnalysisError> {
    let (index, p) = model
        .predict(features.as_slice())
        .map_err(AnalysisError::Inference)?;
    let class = model
        .classes()
        .get(index)
        .ok_or_else(|| AnalysisError::UnknownClass(format!("#{index}")))?;
    let label = Label::from_class(class).ok_or_else(|| AnalysisError::UnknownClass(class.clone()))?;
    let confidence = if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 };
    Ok(ClassificationResult { label, confidence })
}

#[cfg(test)]
mod tests {
    use super::*;
    use voiceguard_models::{ModelError, RandomForest};

    struct Fixed {
        classes: Vec<String>,
        proba: Vec<f32>,
    }

    impl VoiceClassifier for Fixed {
        fn classes(&self) -> &[String] {
            &self.classes
        }

        fn predict_proba(&self, _features: &[f32]) -> Result<Vec<f32>, ModelError> {
            Ok(self.proba.clone())
        }
    }

    fn fixed(classes: &[&str], proba: &[f32]) -> Fixed {
        Fixed {
            classes: classes.iter().map(|s| s.to_string()).collect(),
            proba: proba.to_vec(),
        }
    }

    fn fp() -> FeatureVector {
        FeatureVector::new(&[0.0; 13]).unwrap()
    }

    #[test]
    fn test_label_serde() {
        assert_eq!(serde_json::to_string(&Label::Human).unwrap(), "\"HUMAN\"");
        assert_eq!(serde_json::to_string(&Label::Ai).unwrap(), "\"AI\"");
        assert_eq!(Label::from_class("human"), Some(Label::Human));
        assert_eq!(Label::from_class("Ai"), Some(Label::Ai));
        assert_eq!(Label::from_class("robot"), None);
    }

    #[test]
    fn test_confidence_is_max_posterior_of_predicted_class() {
        let model = fixed(&["AI", "HUMAN"], &[0.27, 0.73]);
        let r = classify(&model, &fp()).unwrap();
        assert_eq!(r.label, Label::Human);
        assert!((r.confidence - 0.73).abs() < 1e-6);

        let model = fixed(&["HUMAN", "AI"], &[0.27, 0.73]);
        let r = classify(&model, &fp()).unwrap();
        assert_eq!(r.label, Label::Ai);
        assert!((r.confidence - 0.73).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_class_is_error() {
        let model = fixed(&["SPOOF", "HUMAN"], &[0.9, 0.1]);
        assert!(matches!(classify(&model, &fp()), Err(AnalysisError::UnknownClass(_))));

        let model = fixed(&["HUMAN"], &[0.1, 0.9]);
        assert!(matches!(classify(&model, &fp()), Err(AnalysisError::UnknownClass(_))));
    }

    #[test]
    fn test_confidence_range_over_forest() {
        let forest = RandomForest::from_json(
            r#"{"classes": ["AI", "HUMAN"], "n_features": 13, "trees": [
                {"nodes": [{"feature": 2, "threshold": 0.5, "left": 1, "right": 2},
                           {"value": [3.0, 1.0]}, {"value": [0.0, 2.0]}]}
            ]}"#,
        )
        .unwrap();
        for v in [-100.0f32, 0.0, 0.5, 0.51, 100.0] {
            let mut x = [0.0f32; 13];
            x[2] = v;
            let features = FeatureVector::new(&x).unwrap();
            let r = classify(&forest, &features).unwrap();
            let proba = forest.predict_proba(&x).unwrap();
            let max = proba.iter().cloned().fold(0.0f32, f32::max);
            assert!((0.0..=1.0).contains(&r.confidence));
            assert_eq!(r.confidence, max);
        }
    }

    #[test]
    fn test_default_is_fallback() {
        let r = ClassificationResult::default();
        assert_eq!(r.label, Label::Human);
        assert_eq!(r.confidence, 0.5);
    }
}
