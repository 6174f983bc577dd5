//! Mel-scale utilities and filterbank generation.

use std::f64::consts::PI;

/// Frequency warping used to place the mel filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MelScale {
    /// `2595 * log10(1 + hz / 700)`.
    Htk,
    /// Linear below 1 kHz, logarithmic above (Auditory Toolbox / librosa default).
    Slaney,
}

const SLANEY_F_SP: f64 = 200.0 / 3.0;
const SLANEY_MIN_LOG_HZ: f64 = 1000.0;
const SLANEY_MIN_LOG_MEL: f64 = SLANEY_MIN_LOG_HZ / SLANEY_F_SP;

fn slaney_log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Generates a periodic Hann window of the given length.
pub fn hann_window(n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

/// Converts frequency in Hz to the mel scale.
pub fn hz_to_mel(hz: f64, scale: MelScale) -> f64 {
    match scale {
        MelScale::Htk => 2595.0 * (1.0 + hz / 700.0).log10(),
        MelScale::Slaney => {
            if hz >= SLANEY_MIN_LOG_HZ {
                SLANEY_MIN_LOG_MEL + (hz / SLANEY_MIN_LOG_HZ).ln() / slaney_log_step()
            } else {
                hz / SLANEY_F_SP
            }
        }
    }
}

/// Converts a mel-scale frequency back to Hz.
pub fn mel_to_hz(mel: f64, scale: MelScale) -> f64 {
    match scale {
        MelScale::Htk => 700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0),
        MelScale::Slaney => {
            if mel >= SLANEY_MIN_LOG_MEL {
                SLANEY_MIN_LOG_HZ * (slaney_log_step() * (mel - SLANEY_MIN_LOG_MEL)).exp()
            } else {
                SLANEY_F_SP * mel
            }
        }
    }
}

/// Creates the mel filterbank matrix with Slaney area normalisation.
///
/// Returns `[num_mels][half_fft]` where `half_fft = fft_size / 2 + 1`.
/// Filters are continuous triangles over the FFT bin centre frequencies.
pub fn mel_filter_bank(
    num_mels: usize,
    fft_size: usize,
    sample_rate: usize,
    low_freq: f64,
    high_freq: f64,
    scale: MelScale,
) -> Vec<Vec<f64>> {
    let half_fft = fft_size / 2 + 1;
    let low_mel = hz_to_mel(low_freq, scale);
    let high_mel = hz_to_mel(high_freq, scale);

    // num_mels + 2 equally spaced mel points, back in Hz
    let step = (high_mel - low_mel) / (num_mels + 1) as f64;
    let hz_points: Vec<f64> = (0..num_mels + 2)
        .map(|i| mel_to_hz(low_mel + i as f64 * step, scale))
        .collect();

    let bin_hz: Vec<f64> = (0..half_fft)
        .map(|k| k as f64 * sample_rate as f64 / fft_size as f64)
        .collect();

    let mut bank = Vec::with_capacity(num_mels);
    for m in 0..num_mels {
        let left = hz_points[m];
        let center = hz_points[m + 1];
        let right = hz_points[m + 2];
        let enorm = 2.0 / (right - left);

        let filter = bin_hz
            .iter()
            .map(|&f| {
                let rising = (f - left) / (center - left);
                let falling = (right - f) / (right - center);
                rising.min(falling).max(0.0) * enorm
            })
            .collect();
        bank.push(filter);
    }
    bank
}
