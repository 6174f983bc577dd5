use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by model loading and inference.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model: cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model: cannot parse artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("model: invalid artifact: {0}")]
    Invalid(String),

    #[error("model: {0:?} not registered")]
    NotRegistered(String),

    #[error("model: bad input: {0}")]
    Input(String),

    #[error("model: inference backend: {0}")]
    Backend(#[from] candle_core::Error),
}
