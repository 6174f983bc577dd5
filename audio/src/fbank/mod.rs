//! Log mel spectrogram front-end for language identification.
//!
//! Output is a `[T, num_mels]` f32 matrix over a fixed analysis window.
//!
//! Default parameters follow the multilingual speech-model convention:
//! - SampleRate: 16000
//! - FFTSize: 400 (25ms)
//! - HopSize: 160 (10ms)
//! - NumMels: 80 (Slaney scale, 0 Hz to Nyquist)
//! - Window: 30 s (480000 samples, 3000 frames)
//! - Log compression: log10, 8.0 dynamic range, rescaled by (x + 4) / 4

pub mod mel;
pub mod stft;

use crate::error::FeatureError;

use mel::{mel_filter_bank, MelScale};
use stft::{power_spectrum, Padding};

/// Configuration for log mel extraction.
#[derive(Debug, Clone)]
pub struct Config {
    pub sample_rate: usize,
    pub fft_size: usize,
    pub hop_size: usize,
    pub num_mels: usize,
    /// Fixed analysis window in samples. Input is zero-padded or truncated
    /// to exactly this length.
    pub window_samples: usize,
    /// Values more than this many log10 units below the peak are clamped.
    pub dynamic_range: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            fft_size: 400,
            hop_size: 160,
            num_mels: 80,
            window_samples: 16000 * 30,
            dynamic_range: 8.0,
        }
    }
}

/// A log mel spectrogram: `frames[t][m]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogMel {
    pub frames: Vec<Vec<f32>>,
    pub num_mels: usize,
}

impl LogMel {
    /// Number of time frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Log mel spectrogram extractor.
pub struct Extractor {
    cfg: Config,
    mel_bank: Vec<Vec<f64>>,
}

impl Extractor {
    /// Creates a new extractor with the given config.
    pub fn new(cfg: Config) -> Self {
        let mel_bank = mel_filter_bank(
            cfg.num_mels,
            cfg.fft_size,
            cfg.sample_rate,
            0.0,
            cfg.sample_rate as f64 / 2.0,
            MelScale::Slaney,
        );
        Self { cfg, mel_bank }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Extracts the log mel spectrogram from normalized f32 PCM samples
    /// (range [-1, 1]) at the configured sample rate.
    ///
    /// Returns `[T][num_mels]` with `T = window_samples / hop_size`.
    pub fn extract(&self, pcm: &[f32], sample_rate: u32) -> Result<LogMel, FeatureError> {
        let cfg = &self.cfg;
        if sample_rate as usize != cfg.sample_rate {
            return Err(FeatureError::SampleRateMismatch {
                expected: cfg.sample_rate as u32,
                got: sample_rate,
            });
        }
        if pcm.is_empty() {
            return Err(FeatureError::EmptyWaveform);
        }

        let window = pad_or_trim(pcm, cfg.window_samples);
        let mut power = power_spectrum(&window, cfg.fft_size, cfg.hop_size, Padding::Reflect);
        // The trailing frame only sees padding.
        power.pop();

        let mut frames = Vec::with_capacity(power.len());
        let mut peak = f32::NEG_INFINITY;
        for spectrum in &power {
            let mut mel = vec![0.0f32; cfg.num_mels];
            for (m, filter) in self.mel_bank.iter().enumerate() {
                let sum: f64 = filter.iter().zip(spectrum).map(|(w, p)| w * p).sum();
                let v = sum.max(1e-10).log10() as f32;
                peak = peak.max(v);
                mel[m] = v;
            }
            frames.push(mel);
        }

        let floor = peak - cfg.dynamic_range;
        for frame in frames.iter_mut() {
            for v in frame.iter_mut() {
                *v = (v.max(floor) + 4.0) / 4.0;
            }
        }

        Ok(LogMel {
            frames,
            num_mels: cfg.num_mels,
        })
    }
}

/// Zero-pads or truncates `pcm` to exactly `len` samples.
pub fn pad_or_trim(pcm: &[f32], len: usize) -> Vec<f32> {
    let mut out = pcm[..pcm.len().min(len)].to_vec();
    out.resize(len, 0.0);
    out
}
