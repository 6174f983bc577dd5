//! Sample rate conversion with rubato.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::DecodeError;

/// Input frames fed to rubato per call.
const CHUNK_SIZE: usize = 1024;

/// Resamples mono `samples` from `from_rate` to `to_rate`.
///
/// Output length is exactly `len * to_rate / from_rate` (rounded down).
/// Returns a copy of the input when the rates already match.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, DecodeError> {
    if from_rate == 0 || to_rate == 0 {
        return Err(DecodeError::Resample(format!(
            "invalid rates: {from_rate} -> {to_rate}"
        )));
    }
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_SIZE, 1)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let expected_len = (samples.len() as u64 * to_rate as u64 / from_rate as u64) as usize;
    let mut output = Vec::with_capacity(expected_len + CHUNK_SIZE * 2);

    for chunk in samples.chunks(CHUNK_SIZE) {
        let input = if chunk.len() < CHUNK_SIZE {
            let mut padded = chunk.to_vec();
            padded.resize(CHUNK_SIZE, 0.0);
            padded
        } else {
            chunk.to_vec()
        };

        let result = resampler
            .process(&[input], None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;
        if let Some(channel) = result.first() {
            output.extend_from_slice(channel);
        }
    }

    output.resize(expected_len, 0.0);
    Ok(output)
}
