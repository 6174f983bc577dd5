//! Caller-facing analysis record and the orchestrator's typed outcome.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classifier::Label;
use crate::error::AnalysisError;

/// Label reported when the pipeline fails.
pub const FALLBACK_LABEL: Label = Label::Human;

/// Confidence reported when the pipeline fails.
pub const FALLBACK_CONFIDENCE: f32 = 0.50;

/// The result handed to callers. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(rename = "classification")]
    label: Label,
    #[serde(rename = "confidenceScore")]
    confidence: f32,
    explanation: String,
}

impl AnalysisReport {
    /// Builds a report, clamping the confidence to [0, 1] and rounding it to
    /// two decimals.
    pub fn new(label: Label, confidence: f32, explanation: impl Into<String>) -> Self {
        Self {
            label,
            confidence: round2(confidence),
            explanation: explanation.into(),
        }
    }

    /// The fail-safe report for an internal error.
    pub fn fallback(err: &AnalysisError) -> Self {
        Self::new(FALLBACK_LABEL, FALLBACK_CONFIDENCE, format!("Analysis Error: {err}"))
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }
}

fn round2(x: f32) -> f32 {
    if !x.is_finite() {
        return 0.0;
    }
    ((x.clamp(0.0, 1.0) as f64 * 100.0).round() / 100.0) as f32
}

/// Pipeline stages, in order. `Failed` is reachable from any non-terminal
/// stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Decoding,
    LanguageGating,
    FeatureExtracting,
    Classifying,
    Explaining,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Decoding => "decoding",
            Self::LanguageGating => "language_gating",
            Self::FeatureExtracting => "feature_extracting",
            Self::Classifying => "classifying",
            Self::Explaining => "explaining",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What one pipeline run produced.
#[derive(Debug)]
pub enum Outcome {
    Completed(AnalysisReport),
    /// The run failed at `stage`; `report` is the fallback report.
    Fallback {
        report: AnalysisReport,
        stage: Stage,
        error: AnalysisError,
    },
}

impl Outcome {
    pub(crate) fn failed(stage: Stage, error: AnalysisError) -> Self {
        Self::Fallback {
            report: AnalysisReport::fallback(&error),
            stage,
            error,
        }
    }

    pub fn report(&self) -> &AnalysisReport {
        match self {
            Self::Completed(report) | Self::Fallback { report, .. } => report,
        }
    }

    pub fn into_report(self) -> AnalysisReport {
        match self {
            Self::Completed(report) | Self::Fallback { report, .. } => report,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    /// Terminal stage of the run.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Completed(_) => Stage::Done,
            Self::Fallback { .. } => Stage::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voiceguard_audio::DecodeError;

    #[test]
    fn test_confidence_is_rounded_and_clamped() {
        assert_eq!(AnalysisReport::new(Label::Ai, 0.8765, "x").confidence(), 0.88);
        assert_eq!(AnalysisReport::new(Label::Ai, 0.124, "x").confidence(), 0.12);
        assert_eq!(AnalysisReport::new(Label::Ai, 1.7, "x").confidence(), 1.0);
        assert_eq!(AnalysisReport::new(Label::Ai, -0.2, "x").confidence(), 0.0);
        assert_eq!(AnalysisReport::new(Label::Ai, f32::NAN, "x").confidence(), 0.0);
    }

    #[test]
    fn test_serializes_caller_field_names() {
        let report = AnalysisReport::new(Label::Ai, 0.91, "synthetic");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["classification"], "AI");
        assert_eq!(json["explanation"], "synthetic");
        assert!((json["confidenceScore"].as_f64().unwrap() - 0.91).abs() < 1e-6);
        assert_eq!(json.as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_fallback_report() {
        let err = AnalysisError::Decode(DecodeError::Empty);
        let outcome = Outcome::failed(Stage::Decoding, err);
        assert!(outcome.is_fallback());
        assert_eq!(outcome.stage(), Stage::Failed);

        let report = outcome.report();
        assert_eq!(report.label(), Label::Human);
        assert_eq!(report.confidence(), 0.5);
        assert!(report.explanation().starts_with("Analysis Error"));

        match outcome {
            Outcome::Fallback { stage, .. } => assert_eq!(stage, Stage::Decoding),
            Outcome::Completed(_) => unreachable!(),
        }
    }

    #[test]
    fn test_stage_terminality() {
        assert!(Stage::Done.is_terminal());
        assert!(Stage::Failed.is_terminal());
        assert!(!Stage::Classifying.is_terminal());
        assert_eq!(Stage::LanguageGating.to_string(), "language_gating");
    }
}
