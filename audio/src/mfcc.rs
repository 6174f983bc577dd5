//! Mel-frequency cepstral coefficients and the 13-dimensional voice fingerprint.
//!
//! Pipeline per frame: power spectrum -> 128 Slaney mel bands -> dB with an
//! 80 dB floor below the clip peak -> orthonormal DCT-II -> first 13
//! coefficients. The fingerprint is the mean of each coefficient over time.

use std::f64::consts::PI;

use crate::error::FeatureError;
use crate::fbank::mel::{mel_filter_bank, MelScale};
use crate::fbank::stft::{power_spectrum, Padding};

/// Number of cepstral coefficients in a fingerprint.
pub const NUM_COEFFICIENTS: usize = 13;

/// A fixed-length, finite, 13-dimensional fingerprint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f32; NUM_COEFFICIENTS]);

impl FeatureVector {
    /// Validates `values` as a fingerprint.
    pub fn new(values: &[f32]) -> Result<Self, FeatureError> {
        if values.len() != NUM_COEFFICIENTS {
            return Err(FeatureError::WrongLength {
                expected: NUM_COEFFICIENTS,
                got: values.len(),
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(FeatureError::NonFinite { index });
        }
        let mut out = [0.0f32; NUM_COEFFICIENTS];
        out.copy_from_slice(values);
        Ok(Self(out))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

/// Configuration for MFCC extraction.
#[derive(Debug, Clone)]
pub struct MfccConfig {
    pub sample_rate: usize,
    pub fft_size: usize,
    pub hop_size: usize,
    pub num_mels: usize,
    /// dB floor below the clip peak.
    pub top_db: f64,
}

impl Default for MfccConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            fft_size: 2048,
            hop_size: 512,
            num_mels: 128,
            top_db: 80.0,
        }
    }
}

/// MFCC extractor with precomputed mel and DCT matrices.
pub struct Mfcc {
    cfg: MfccConfig,
    mel_bank: Vec<Vec<f64>>,
    dct: Vec<Vec<f64>>,
}

impl Mfcc {
    pub fn new(cfg: MfccConfig) -> Self {
        let mel_bank = mel_filter_bank(
            cfg.num_mels,
            cfg.fft_size,
            cfg.sample_rate,
            0.0,
            cfg.sample_rate as f64 / 2.0,
            MelScale::Slaney,
        );
        let dct = dct_matrix(NUM_COEFFICIENTS, cfg.num_mels);
        Self { cfg, mel_bank, dct }
    }

    pub fn config(&self) -> &MfccConfig {
        &self.cfg
    }

    /// Computes `[T][13]` coefficients from mono samples.
    pub fn coefficients(&self, pcm: &[f32], sample_rate: u32) -> Result<Vec<[f64; NUM_COEFFICIENTS]>, FeatureError> {
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

        let power = power_spectrum(pcm, cfg.fft_size, cfg.hop_size, Padding::Zeros);

        // Mel energies in dB.
        let mut mel_db: Vec<Vec<f64>> = Vec::with_capacity(power.len());
        let mut peak = f64::NEG_INFINITY;
        for spectrum in &power {
            let frame: Vec<f64> = self
                .mel_bank
                .iter()
                .map(|filter| {
                    let energy: f64 = filter.iter().zip(spectrum).map(|(w, p)| w * p).sum();
                    10.0 * energy.max(1e-10).log10()
                })
                .collect();
            peak = frame.iter().cloned().fold(peak, f64::max);
            mel_db.push(frame);
        }
        let floor = peak - cfg.top_db;

        let mut out = Vec::with_capacity(mel_db.len());
        for frame in &mel_db {
            let mut coeffs = [0.0f64; NUM_COEFFICIENTS];
            for (k, basis) in self.dct.iter().enumerate() {
                coeffs[k] = basis
                    .iter()
                    .zip(frame)
                    .map(|(b, &v)| b * v.max(floor))
                    .sum();
            }
            out.push(coeffs);
        }
        Ok(out)
    }

    /// Computes the fingerprint: each coefficient averaged across frames.
    pub fn mean_coefficients(&self, pcm: &[f32], sample_rate: u32) -> Result<FeatureVector, FeatureError> {
        let frames = self.coefficients(pcm, sample_rate)?;
        if frames.is_empty() {
            return Err(FeatureError::EmptyWaveform);
        }
        let t = frames.len() as f64;
        let mut mean = [0.0f32; NUM_COEFFICIENTS];
        for (k, slot) in mean.iter_mut().enumerate() {
            *slot = (frames.iter().map(|f| f[k]).sum::<f64>() / t) as f32;
        }
        FeatureVector::new(&mean)
    }
}

impl Default for Mfcc {
    fn default() -> Self {
        Self::new(MfccConfig::default())
    }
}

/// Orthonormal DCT-II basis: `[num_coeffs][n]`.
fn dct_matrix(num_coeffs: usize, n: usize) -> Vec<Vec<f64>> {
    (0..num_coeffs)
        .map(|k| {
            let scale = if k == 0 {
                (1.0 / n as f64).sqrt()
            } else {
                (2.0 / n as f64).sqrt()
            };
            (0..n)
                .map(|i| scale * (PI * k as f64 * (2 * i + 1) as f64 / (2 * n) as f64).cos())
                .collect()
        })
        .collect()
}
