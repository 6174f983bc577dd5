use thiserror::Error;
use voiceguard_audio::{DecodeError, FeatureError};
use voiceguard_models::ModelError;

/// Errors raised inside the analysis pipeline.
///
/// None of these cross [`crate::Detector::analyze`]; they are converted
/// into the fallback report there.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("model unavailable: {id}: {source}")]
    ModelUnavailable {
        id: String,
        #[source]
        source: ModelError,
    },

    #[error("extraction error: {0}")]
    Extraction(#[from] FeatureError),

    #[error("inference error: {0}")]
    Inference(#[source] ModelError),

    #[error("classifier produced unknown class {0:?}")]
    UnknownClass(String),

    #[error("unsupported declared language {0:?}")]
    UnsupportedLanguage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    pub(crate) fn unavailable(id: &str, source: ModelError) -> Self {
        Self::ModelUnavailable {
            id: id.to_string(),
            source,
        }
    }
}
