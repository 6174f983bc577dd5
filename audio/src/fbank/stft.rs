//! Centred short-time power spectrum.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use super::mel::hann_window;

/// How the signal is extended by `n_fft / 2` samples on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    /// Mirror the signal without repeating the edge sample.
    Reflect,
    /// Pad with zeros.
    Zeros,
}

/// Computes `|STFT|^2` with a periodic Hann window.
///
/// Returns `[T][n_fft / 2 + 1]` where `T = 1 + len / hop`.
pub fn power_spectrum(samples: &[f32], n_fft: usize, hop: usize, padding: Padding) -> Vec<Vec<f64>> {
    if samples.is_empty() || n_fft == 0 || hop == 0 {
        return Vec::new();
    }

    let pad = n_fft / 2;
    let padded = pad_signal(samples, pad, padding);
    let num_frames = 1 + (padded.len() - n_fft) / hop;
    let half_fft = n_fft / 2 + 1;
    let window = hann_window(n_fft);

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n_fft);
    let mut buf = vec![Complex::new(0.0f64, 0.0f64); n_fft];

    let mut frames = Vec::with_capacity(num_frames);
    for t in 0..num_frames {
        let start = t * hop;
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = Complex::new(padded[start + i] * window[i], 0.0);
        }
        fft.process(&mut buf);
        frames.push(buf[..half_fft].iter().map(|c| c.norm_sqr()).collect());
    }
    frames
}

fn pad_signal(samples: &[f32], pad: usize, padding: Padding) -> Vec<f64> {
    let n = samples.len();
    let mut out = Vec::with_capacity(n + 2 * pad);
    let at = |i: isize| -> f64 {
        match padding {
            Padding::Zeros => {
                if i < 0 || i >= n as isize {
                    0.0
                } else {
                    samples[i as usize] as f64
                }
            }
            Padding::Reflect => samples[reflect_index(i, n)] as f64,
        }
    };
    for i in -(pad as isize)..(n + pad) as isize {
        out.push(at(i));
    }
    out
}

/// Maps an out-of-range index onto `0..n` by mirroring around the edges.
fn reflect_index(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let mut m = i.rem_euclid(period);
    if m >= n as isize {
        m = period - m;
    }
    m as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_reflect_index() {
        // [a b c d] reflected: ... c b | a b c d | c b ...
        assert_eq!(reflect_index(-1, 4), 1);
        assert_eq!(reflect_index(-2, 4), 2);
        assert_eq!(reflect_index(4, 4), 2);
        assert_eq!(reflect_index(5, 4), 1);
        assert_eq!(reflect_index(2, 4), 2);
    }

    #[test]
    fn test_frame_count() {
        let samples = vec![0.0f32; 16000];
        let spec = power_spectrum(&samples, 400, 160, Padding::Reflect);
        assert_eq!(spec.len(), 1 + 16000 / 160);
        assert_eq!(spec[0].len(), 201);
    }

    #[test]
    fn test_tone_peak_bin() {
        // 1 kHz at 16 kHz with n_fft 400 lands on bin 25.
        let samples: Vec<f32> = (0..4000)
            .map(|i| (2.0 * PI * 1000.0 * i as f64 / 16000.0).sin() as f32)
            .collect();
        let spec = power_spectrum(&samples, 400, 160, Padding::Zeros);
        let mid = &spec[spec.len() / 2];
        let peak = mid
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap();
        assert_eq!(peak, 25);
    }

    #[test]
    fn test_empty() {
        assert!(power_spectrum(&[], 400, 160, Padding::Zeros).is_empty());
    }
}
