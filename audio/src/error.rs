use thiserror::Error;

/// Errors returned while turning an audio byte stream into samples.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read audio: {0}")]
    Io(#[from] std::io::Error),

    #[error("audio stream is empty")]
    Empty,

    #[error("unsupported audio container: {0}")]
    Unsupported(String),

    #[error("no audio track found")]
    NoTrack,

    #[error("unknown sample rate")]
    UnknownSampleRate,

    #[error("decode failed: {0}")]
    Codec(String),

    #[error("resample failed: {0}")]
    Resample(String),
}

/// Errors returned by spectral feature extraction.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("waveform is empty")]
    EmptyWaveform,

    #[error("sample rate mismatch: expected {expected} Hz, got {got} Hz")]
    SampleRateMismatch { expected: u32, got: u32 },

    #[error("feature vector has wrong length: expected {expected}, got {got}")]
    WrongLength { expected: usize, got: usize },

    #[error("feature vector contains a non-finite value at index {index}")]
    NonFinite { index: usize },
}
