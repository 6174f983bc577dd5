//! Audio decoding and spectral feature extraction for voice analysis.
//!
//! This crate provides:
//!
//! - `decode`: container decoding into a duration-capped mono [`AudioClip`]
//! - `resample`: sample rate conversion
//! - `fbank`: log mel spectrogram for language identification
//! - `mfcc`: the 13-dimensional cepstral fingerprint
//!
//! # Example
//!
//! ```no_run
//! use voiceguard_audio::{decode_file, DecodeOptions, Mfcc};
//!
//! let clip = decode_file("sample.mp3", &DecodeOptions::default()).unwrap();
//! let wave = clip.resampled(22050).unwrap();
//! let fingerprint = Mfcc::default()
//!     .mean_coefficients(&wave.samples, wave.sample_rate)
//!     .unwrap();
//! assert_eq!(fingerprint.as_slice().len(), 13);
//! ```

pub mod decode;
mod error;
pub mod fbank;
pub mod mfcc;
pub mod resample;

pub use decode::{decode_bytes, decode_file, AudioClip, DecodeOptions, Waveform};
pub use error::{DecodeError, FeatureError};
pub use fbank::LogMel;
pub use mfcc::{FeatureVector, Mfcc, MfccConfig, NUM_COEFFICIENTS};
