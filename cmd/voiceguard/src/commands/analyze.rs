//! Analyze command.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use base64::Engine;
use clap::Args;
use serde::Serialize;
use tempfile::NamedTempFile;
use tokio::sync::Semaphore;
use tracing::{debug, info};
use voiceguard_detector::{AnalysisReport, HeavyModel, ModelCensus, Outcome, Stage};

use super::{get_config, output, PolicyArg};
use crate::Cli;

/// Analyse audio clips.
///
/// Each clip is classified as HUMAN or AI. Under acoustic detection the
/// spoken language is also compared against --language.
#[derive(Args)]
pub struct AnalyzeCommand {
    /// Audio files (mp3, wav, flac, ogg, m4a)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Declared spoken language (English, Hindi, Tamil, Telugu, Malayalam)
    #[arg(short = 'l', long)]
    language: String,

    /// Override the profile's language gate policy
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Inputs hold base64-encoded audio instead of raw audio
    #[arg(long)]
    base64: bool,

    /// Maximum clips analysed at once
    #[arg(short = 'j', long, default_value_t = 1)]
    jobs: usize,
}

/// One line of analyze output.
#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    #[serde(flatten)]
    report: AnalysisReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed_stage: Option<Stage>,
}

impl FileReport {
    fn new(file: &Path, outcome: Outcome) -> Self {
        let failed_stage = match &outcome {
            Outcome::Fallback { stage, .. } => Some(*stage),
            Outcome::Completed(_) => None,
        };
        Self {
            file: file.display().to_string(),
            report: outcome.into_report(),
            failed_stage,
        }
    }
}

/// A clip ready for analysis. Decoded base64 lives in a temp file that is
/// removed when this is dropped.
enum Input {
    Path(PathBuf),
    Decoded { source: PathBuf, file: NamedTempFile },
}

impl Input {
    fn prepare(path: &Path, base64: bool) -> anyhow::Result<Self> {
        if !base64 {
            return Ok(Self::Path(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let audio = decode_base64(&text).with_context(|| format!("decode base64 in {}", path.display()))?;

        let mut file = tempfile::Builder::new().prefix("voiceguard-").tempfile()?;
        file.write_all(&audio)?;
        file.flush()?;
        Ok(Self::Decoded {
            source: path.to_path_buf(),
            file,
        })
    }

    /// Name shown in output.
    fn source(&self) -> &Path {
        match self {
            Self::Path(path) => path,
            Self::Decoded { source, .. } => source,
        }
    }

    /// File handed to the detector.
    fn audio_path(&self) -> &Path {
        match self {
            Self::Path(path) => path,
            Self::Decoded { file, .. } => file.path(),
        }
    }
}

/// Decodes base64 audio, accepting an optional `data:...;base64,` prefix and
/// embedded whitespace.
fn decode_base64(text: &str) -> anyhow::Result<Vec<u8>> {
    let payload = match text.find("base64,") {
        Some(i) if text.trim_start().starts_with("data:") => &text[i + "base64,".len()..],
        _ => text,
    };
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let audio = base64::engine::general_purpose::STANDARD.decode(compact)?;
    if audio.is_empty() {
        anyhow::bail!("empty audio payload");
    }
    Ok(audio)
}

impl AnalyzeCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = get_config(cli)?;
        let mut profile = cfg.resolve_profile(cli.profile.as_deref())?.clone();
        if let Some(policy) = self.policy {
            profile.detector.policy = policy.into();
        }

        let census = Arc::new(ModelCensus::new());
        let detector = Arc::new(profile.build_detector(Some(census.clone()))?);
        info!(
            profile = %profile.name,
            policy = %profile.detector.policy,
            residency = ?profile.detector.residency(),
            "analyze: detector ready"
        );

        let inputs = self
            .files
            .iter()
            .map(|path| Input::prepare(path, self.base64))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let limit = Arc::new(Semaphore::new(self.jobs.max(1)));
        let mut tasks = Vec::with_capacity(inputs.len());
        for input in inputs {
            let detector = Arc::clone(&detector);
            let limit = Arc::clone(&limit);
            let language = self.language.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = limit.acquire_owned().await?;
                let report = tokio::task::spawn_blocking(move || {
                    let outcome = detector.run(input.audio_path(), &language);
                    FileReport::new(input.source(), outcome)
                })
                .await?;
                anyhow::Ok(report)
            }));
        }

        let mut reports = Vec::with_capacity(tasks.len());
        for task in tasks {
            reports.push(task.await??);
        }

        debug!(
            peak_resident = census.peak(),
            language_id_loads = census.loads(HeavyModel::LanguageId),
            classifier_loads = census.loads(HeavyModel::Classifier),
            "analyze: model residency"
        );

        let out = output(cli);
        match reports.as_slice() {
            [single] => out.write(single),
            _ => out.write(&reports),
        }
    }
}
