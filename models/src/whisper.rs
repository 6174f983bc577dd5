//! Spoken language identification with a pre-trained Whisper checkpoint.
//!
//! The encoder runs over one log mel window. A single decoder step from the
//! start-of-transcript token then yields next-token logits, and only the
//! `<|code|>` language tokens are kept and normalised with a softmax.
//!
//! A model directory holds the Hugging Face export of a checkpoint
//! (e.g. `openai/whisper-tiny`):
//!
//! ```text
//! whisper-tiny/
//!   config.json
//!   tokenizer.json
//!   model.safetensors
//! ```

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config};
use tokenizers::Tokenizer;
use tracing::debug;
use voiceguard_audio::LogMel;

use crate::error::ModelError;
use crate::model::{read_artifact, LanguageIdentifier};

pub const CONFIG_FILE: &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// Language codes of the multilingual vocabulary, in token order.
/// Codes the tokenizer does not know are skipped at load time.
pub const LANGUAGE_CODES: &[&str] = &[
    "en", "zh", "de", "es", "ru", "ko", "fr", "ja", "pt", "tr", "pl", "ca", "nl", "ar", "sv", "it", "id", "hi",
    "fi", "vi", "he", "uk", "el", "ms", "cs", "ro", "da", "hu", "ta", "no", "th", "ur", "hr", "bg", "lt", "la",
    "mi", "ml", "cy", "sk", "te", "fa", "lv", "bn", "sr", "az", "sl", "kn", "et", "mk", "br", "eu", "is", "hy",
    "ne", "mn", "bs", "kk", "sq", "sw", "gl", "mr", "pa", "si", "km", "sn", "yo", "so", "af", "oc", "ka", "be",
    "tg", "sd", "gu", "am", "yi", "lo", "uz", "fo", "ht", "ps", "tk", "nn", "mt", "sa", "lb", "my", "bo", "tl",
    "mg", "as", "tt", "haw", "ln", "ha", "ba", "jw", "su", "yue",
];

/// Whisper encoder plus one decoder step, restricted to language tokens.
pub struct WhisperLanguageId {
    // Forward passes mutate the key/value caches.
    model: Mutex<m::model::Whisper>,
    config: Config,
    device: Device,
    sot_token: u32,
    languages: Vec<(String, u32)>,
}

impl WhisperLanguageId {
    /// Loads a checkpoint directory on the CPU.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, ModelError> {
        let dir = dir.as_ref();
        let config: Config = serde_json::from_str(&read_artifact(&dir.join(CONFIG_FILE))?)?;

        let tokenizer_path = dir.join(TOKENIZER_FILE);
        let tokenizer = Tokenizer::from_bytes(read_artifact(&tokenizer_path)?)
            .map_err(|e| ModelError::Invalid(format!("{}: {e}", tokenizer_path.display())))?;

        let weights = dir.join(WEIGHTS_FILE);
        std::fs::metadata(&weights).map_err(|source| ModelError::Io {
            path: weights.clone(),
            source,
        })?;

        let device = Device::Cpu;
        // SAFETY: safetensors files are memory-mapped read-only
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[&weights], m::DTYPE, &device)? };

        let model = Self::load(config, &tokenizer, vb)?;
        debug!(
            path = %dir.display(),
            languages = model.languages.len(),
            mel_bins = model.config.num_mel_bins,
            "whisper: checkpoint loaded"
        );
        Ok(model)
    }

    /// Builds the model from already-opened parts.
    pub fn load(config: Config, tokenizer: &Tokenizer, vb: VarBuilder) -> Result<Self, ModelError> {
        let sot_token = tokenizer
            .token_to_id(m::SOT_TOKEN)
            .ok_or_else(|| ModelError::Invalid(format!("tokenizer has no {} token", m::SOT_TOKEN)))?;

        let languages: Vec<(String, u32)> = LANGUAGE_CODES
            .iter()
            .filter_map(|code| {
                tokenizer
                    .token_to_id(&format!("<|{code}|>"))
                    .map(|id| (code.to_string(), id))
            })
            .collect();
        if languages.is_empty() {
            return Err(ModelError::Invalid(
                "tokenizer has no language tokens (English-only checkpoint?)".into(),
            ));
        }
        if let Some((code, id)) = languages.iter().find(|(_, id)| *id as usize >= config.vocab_size) {
            return Err(ModelError::Invalid(format!(
                "token <|{code}|> ({id}) is outside the vocabulary of {}",
                config.vocab_size
            )));
        }

        let device = vb.device().clone();
        let model = m::model::Whisper::load(&vb, config.clone())?;
        Ok(Self {
            model: Mutex::new(model),
            config,
            device,
            sot_token,
            languages,
        })
    }

    /// Language codes this checkpoint can report.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.languages.iter().map(|(code, _)| code.as_str())
    }

    /// Packs `[T][n_mels]` frames into a `(1, n_mels, T)` tensor, keeping at
    /// most the frames the encoder has positions for.
    fn mel_tensor(&self, mel: &LogMel) -> Result<Tensor, ModelError> {
        let n_mels = self.config.num_mel_bins;
        if mel.is_empty() {
            return Err(ModelError::Input("empty spectrogram".into()));
        }
        if mel.num_mels != n_mels || mel.frames.iter().any(|f| f.len() != n_mels) {
            return Err(ModelError::Input(format!(
                "expected {n_mels} mel bands, got {}",
                mel.num_mels
            )));
        }

        let frames = &mel.frames[..mel.len().min(2 * self.config.max_source_positions)];
        let mut data = Vec::with_capacity(n_mels * frames.len());
        for band in 0..n_mels {
            data.extend(frames.iter().map(|f| f[band]));
        }
        Ok(Tensor::from_vec(data, (1, n_mels, frames.len()), &self.device)?)
    }
}

impl LanguageIdentifier for WhisperLanguageId {
    fn detect(&self, mel: &LogMel) -> Result<Vec<(String, f32)>, ModelError> {
        let mel = self.mel_tensor(mel)?;

        let logits = {
            let mut model = self.model.lock().unwrap_or_else(PoisonError::into_inner);
            let logits = next_token_logits(&mut model, &mel, self.sot_token, &self.device);
            model.reset_kv_cache();
            logits?
        };

        let selected: Vec<f32> = self
            .languages
            .iter()
            .map(|(_, id)| logits.get(*id as usize).copied().unwrap_or(f32::NEG_INFINITY))
            .collect();
        let probs = softmax(&selected);

        Ok(self
            .languages
            .iter()
            .map(|(code, _)| code.clone())
            .zip(probs)
            .collect())
    }
}

/// Encodes `mel` and returns the logits for the token after SOT.
fn next_token_logits(
    model: &mut m::model::Whisper,
    mel: &Tensor,
    sot_token: u32,
    device: &Device,
) -> Result<Vec<f32>, ModelError> {
    let audio_features = model.encoder.forward(mel, true)?;
    let tokens = Tensor::new(&[sot_token], device)?.unsqueeze(0)?;
    let hidden = model.decoder.forward(&tokens, &audio_features, true)?;
    let logits = model.decoder.final_linear(&hidden.squeeze(0)?)?;
    let last = logits.dim(0)? - 1;
    Ok(logits.get(last)?.to_vec1::<f32>()?)
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f64> = logits.iter().map(|&l| ((l - max) as f64).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| (e / sum) as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;

    const TINY_CONFIG: &str = r#"{
        "num_mel_bins": 80,
        "max_source_positions": 16,
        "d_model": 8,
        "encoder_attention_heads": 2,
        "encoder_layers": 1,
        "vocab_size": 8,
        "max_target_positions": 4,
        "decoder_attention_heads": 2,
        "decoder_layers": 1,
        "suppress_tokens": []
    }"#;

    const TINY_TOKENIZER: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": null,
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {
                "<unk>": 0,
                "<|startoftranscript|>": 1,
                "<|en|>": 2,
                "<|hi|>": 3,
                "<|ta|>": 4,
                "hello": 5
            },
            "unk_token": "<unk>"
        }
    }"#;

    fn tokenizer(json: &str) -> Tokenizer {
        Tokenizer::from_bytes(json).unwrap()
    }

    /// All-zero weights: every logit is 0, so languages are equally likely.
    fn zero_model() -> WhisperLanguageId {
        let config: Config = serde_json::from_str(TINY_CONFIG).unwrap();
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        WhisperLanguageId::load(config, &tokenizer(TINY_TOKENIZER), vb).unwrap()
    }

    fn mel(frames: usize, bands: usize) -> LogMel {
        LogMel {
            frames: vec![vec![0.25; bands]; frames],
            num_mels: bands,
        }
    }

    #[test]
    fn test_load_keeps_known_language_tokens() {
        let model = zero_model();
        assert_eq!(model.languages().collect::<Vec<_>>(), vec!["en", "hi", "ta"]);
        assert_eq!(model.sot_token, 1);
    }

    #[test]
    fn test_detect_distribution_over_language_tokens() {
        let model = zero_model();
        let probs = model.detect(&mel(20, 80)).unwrap();
        assert_eq!(probs.len(), 3);
        for (_, p) in &probs {
            assert!((p - 1.0 / 3.0).abs() < 1e-5, "got {probs:?}");
        }

        // Caches are flushed between calls.
        assert_eq!(model.detect(&mel(20, 80)).unwrap(), probs);
    }

    #[test]
    fn test_detect_truncates_to_encoder_positions() {
        let model = zero_model();
        assert!(model.detect(&mel(3000, 80)).is_ok());
    }

    #[test]
    fn test_detect_rejects_band_mismatch() {
        let model = zero_model();
        assert!(matches!(model.detect(&mel(20, 40)), Err(ModelError::Input(_))));
        assert!(matches!(model.detect(&mel(0, 80)), Err(ModelError::Input(_))));
    }

    #[test]
    fn test_load_rejects_english_only_tokenizer() {
        let config: Config = serde_json::from_str(TINY_CONFIG).unwrap();
        let english_only = TINY_TOKENIZER
            .replace("<|en|>", "<|notimestamps|>")
            .replace("<|hi|>", "a")
            .replace("<|ta|>", "b");
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let err = WhisperLanguageId::load(config, &tokenizer(&english_only), vb).err().unwrap();
        assert!(matches!(err, ModelError::Invalid(_)));
    }

    #[test]
    fn test_missing_checkpoint_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = WhisperLanguageId::from_dir(dir.path()).err().unwrap();
        assert!(matches!(err, ModelError::Io { .. }));
    }

    #[test]
    fn test_softmax_is_stable() {
        let p = softmax(&[1000.0, 1000.0, f32::NEG_INFINITY]);
        assert!((p[0] - 0.5).abs() < 1e-6);
        assert_eq!(p[2], 0.0);
    }
}
