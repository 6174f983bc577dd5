//! Explanation rules.

use serde::Serialize;

use crate::classifier::{ClassificationResult, Label};
use crate::language::{Language, LanguageEstimate, LanguageSource};

/// Confidence reported when the spoken and declared languages disagree.
pub const DEFAULT_MISMATCH_PENALTY: f32 = 0.40;

/// Explanation text plus the confidence to report alongside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub text: String,
    pub confidence: f32,
}

/// Turns a verdict and a language estimate into the caller-facing text.
#[derive(Debug, Clone, Copy)]
pub struct ExplanationSynthesizer {
    mismatch_penalty: f32,
}

impl Default for ExplanationSynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_MISMATCH_PENALTY)
    }
}

impl ExplanationSynthesizer {
    pub fn new(mismatch_penalty: f32) -> Self {
        Self { mismatch_penalty }
    }

    /// Builds the explanation.
    ///
    /// A detected language that differs from the declared one (and is not
    /// `Unknown`) replaces the verdict text with a spoofing alert and the
    /// confidence with the mismatch penalty. Only acoustic detection can
    /// produce that alert.
    pub fn synthesize(&self, result: &ClassificationResult, estimate: &LanguageEstimate, declared: Language) -> Explanation {
        if is_mismatch(estimate, declared) {
            return Explanation {
                text: format!(
                    "ALERT: Language Mismatch! Expected {declared} but detected {}. Potential spoofing.",
                    estimate.language
                ),
                confidence: self.mismatch_penalty,
            };
        }

        let qualifier = match estimate.source {
            LanguageSource::Detected => "",
            LanguageSource::DeclaredFallback => " (acoustic detection inconclusive)",
            LanguageSource::Declared => " (declared by caller, not acoustically verified)",
        };
        let verdict = match result.label {
            Label::Human => "Matches biological resonance and natural phonetic decay.",
            Label::Ai => "Detected synthetic texture and unnatural pitch consistency.",
        };
        Explanation {
            text: format!(
                "Vocal patterns analyzed for {} phonetics{qualifier}. {verdict}",
                estimate.language
            ),
            confidence: result.confidence,
        }
    }
}

fn is_mismatch(estimate: &LanguageEstimate, declared: Language) -> bool {
    estimate.source == LanguageSource::Detected
        && estimate.language != Language::Unknown
        && estimate.language != declared
}
