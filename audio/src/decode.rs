//! Container decoding: audio byte stream -> mono f32 samples.
//!
//! Decoding stops as soon as the configured duration ceiling is reached, so
//! the cost of a request is bounded by the ceiling and not by the clip length.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::resample::resample;

/// Shortest duration ceiling accepted by [`DecodeOptions`].
pub const MIN_CLIP_DURATION: Duration = Duration::from_secs(2);

/// Longest duration ceiling accepted by [`DecodeOptions`].
pub const MAX_CLIP_DURATION: Duration = Duration::from_secs(5);

/// Controls how much of a clip is decoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeOptions {
    /// Duration ceiling. Audio past this point is silently dropped.
    pub max_duration: Duration,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(3),
        }
    }
}

impl DecodeOptions {
    /// Creates options with the given ceiling, clamped to
    /// [`MIN_CLIP_DURATION`]..=[`MAX_CLIP_DURATION`].
    pub fn with_max_duration(max_duration: Duration) -> Self {
        Self {
            max_duration: max_duration.clamp(MIN_CLIP_DURATION, MAX_CLIP_DURATION),
        }
    }

    fn ceiling(&self) -> Duration {
        self.max_duration.clamp(MIN_CLIP_DURATION, MAX_CLIP_DURATION)
    }
}

/// A decoded, duration-capped, mono clip at its native sample rate.
#[derive(Debug, Clone)]
pub struct AudioClip {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: usize,
}

/// An owned mono buffer at a specific sample rate, ready for a spectral
/// front-end.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    /// Creates a clip from mono samples.
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
        }
    }

    /// Mono samples in [-1, 1].
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Native sample rate of the source stream.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count of the source stream before down-mixing.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Duration of the decoded (possibly truncated) audio.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Returns a copy of the clip resampled to `target_rate`.
    pub fn resampled(&self, target_rate: u32) -> Result<Waveform, DecodeError> {
        let samples = resample(&self.samples, self.sample_rate, target_rate)?;
        Ok(Waveform {
            samples,
            sample_rate: target_rate,
        })
    }
}

/// Decodes the audio file at `path`.
///
/// The file extension, if any, is used as a probe hint; the container is
/// still sniffed from its content.
pub fn decode_file(path: impl AsRef<Path>, opts: &DecodeOptions) -> Result<AudioClip, DecodeError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Err(DecodeError::Empty);
    }

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    decode_source(Box::new(file), hint, opts)
}

/// Decodes an in-memory audio byte stream.
pub fn decode_bytes(data: Vec<u8>, opts: &DecodeOptions) -> Result<AudioClip, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::Empty);
    }
    decode_source(Box::new(Cursor::new(data)), Hint::new(), opts)
}

fn decode_source(
    source: Box<dyn MediaSource>,
    hint: Hint,
    opts: &DecodeOptions,
) -> Result<AudioClip, DecodeError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params
        .sample_rate
        .filter(|&r| r > 0)
        .ok_or(DecodeError::UnknownSampleRate)?;
    let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    let limit = (opts.ceiling().as_secs_f64() * sample_rate as f64) as usize;
    let mut samples: Vec<f32> = Vec::with_capacity(limit);

    while samples.len() < limit {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Codec(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(error = %e, "audio: skipping corrupt packet");
                continue;
            }
            Err(e) => return Err(DecodeError::Codec(e.to_string())),
        };

        let spec = *decoded.spec();
        let frames = decoded.frames();
        if frames == 0 {
            continue;
        }
        channels = spec.channels.count().max(1);

        let mut buf = SampleBuffer::<f32>::new(frames as u64, spec);
        buf.copy_interleaved_ref(decoded);

        if channels > 1 {
            for frame in buf.samples().chunks(channels) {
                samples.push(frame.iter().sum::<f32>() / channels as f32);
            }
        } else {
            samples.extend_from_slice(buf.samples());
        }
    }

    if samples.is_empty() {
        return Err(DecodeError::Empty);
    }
    samples.truncate(limit);
    samples.shrink_to_fit();

    debug!(
        samples = samples.len(),
        sample_rate,
        channels,
        duration_secs = samples.len() as f32 / sample_rate as f32,
        "audio: clip decoded"
    );

    Ok(AudioClip {
        samples,
        sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;
    use std::io::Write;

    /// Builds a 16-bit PCM WAV file in memory.
    fn wav_bytes(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
        out.extend_from_slice(&(channels * 2).to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    fn tone(seconds: f32, sample_rate: u32) -> Vec<i16> {
        let n = (seconds * sample_rate as f32) as usize;
        (0..n)
            .map(|i| ((2.0 * PI * 440.0 * i as f32 / sample_rate as f32).sin() * 12000.0) as i16)
            .collect()
    }

    #[test]
    fn test_options_are_clamped() {
        let short = DecodeOptions::with_max_duration(Duration::from_millis(500));
        assert_eq!(short.max_duration, MIN_CLIP_DURATION);
        let long = DecodeOptions::with_max_duration(Duration::from_secs(30));
        assert_eq!(long.max_duration, MAX_CLIP_DURATION);
        assert_eq!(DecodeOptions::default().max_duration, Duration::from_secs(3));
    }

    #[test]
    fn test_decodes_wav_bytes() {
        let data = wav_bytes(&tone(1.0, 16000), 16000, 1);
        let clip = decode_bytes(data, &DecodeOptions::default()).unwrap();
        assert_eq!(clip.sample_rate(), 16000);
        assert_eq!(clip.channels(), 1);
        assert_eq!(clip.samples().len(), 16000);
        assert!(clip.samples().iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn test_long_clip_is_truncated() {
        let data = wav_bytes(&tone(6.0, 8000), 8000, 1);
        let clip = decode_bytes(data, &DecodeOptions::default()).unwrap();
        assert_eq!(clip.samples().len(), 3 * 8000);
        assert_eq!(clip.duration(), Duration::from_secs(3));
    }

    #[test]
    fn test_stereo_is_downmixed() {
        // Left = +x, right = -x: the mono mix is silence.
        let mono = tone(0.5, 8000);
        let mut interleaved = Vec::with_capacity(mono.len() * 2);
        for s in &mono {
            interleaved.push(*s);
            interleaved.push(-*s);
        }
        let clip = decode_bytes(wav_bytes(&interleaved, 8000, 2), &DecodeOptions::default()).unwrap();
        assert_eq!(clip.channels(), 2);
        assert_eq!(clip.samples().len(), mono.len());
        assert!(clip.samples().iter().all(|s| s.abs() < 1e-3));
    }

    #[test]
    fn test_empty_stream_is_rejected() {
        assert!(matches!(
            decode_bytes(Vec::new(), &DecodeOptions::default()),
            Err(DecodeError::Empty)
        ));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let garbage = vec![0x42u8; 4096];
        assert!(decode_bytes(garbage, &DecodeOptions::default()).is_err());
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            decode_file(file.path(), &DecodeOptions::default()),
            Err(DecodeError::Empty)
        ));
    }

    #[test]
    fn test_decodes_wav_file() {
        let mut file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        file.write_all(&wav_bytes(&tone(1.0, 22050), 22050, 1)).unwrap();
        file.flush().unwrap();

        let clip = decode_file(file.path(), &DecodeOptions::default()).unwrap();
        assert_eq!(clip.sample_rate(), 22050);
        assert_eq!(clip.samples().len(), 22050);
    }

    #[test]
    fn test_resampled_changes_rate() {
        let clip = AudioClip::from_mono(vec![0.0; 8000], 8000);
        let wave = clip.resampled(16000).unwrap();
        assert_eq!(wave.sample_rate, 16000);
        assert_eq!(wave.samples.len(), 16000);
    }
}
