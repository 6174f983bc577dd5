//! Output utilities for CLI tools.

use std::{fs::File, io::Write};

use serde::Serialize;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// YAML format (default).
    #[default]
    Yaml,
    /// JSON format.
    Json,
}

/// Output configuration.
#[derive(Debug, Clone, Default)]
pub struct Output {
    pub format: OutputFormat,
    pub file: Option<String>,
}

impl Output {
    /// Creates a new output configuration.
    pub fn new(format: OutputFormat, file: Option<String>) -> Self {
        Self { format, file }
    }

    /// Renders `value` in the configured format.
    pub fn render<T: Serialize>(&self, value: &T) -> anyhow::Result<String> {
        Ok(match self.format {
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
            OutputFormat::Json => serde_json::to_string_pretty(value)?,
        })
    }

    /// Writes `value` to the output file, or stdout.
    pub fn write<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        let output = self.render(value)?;

        match &self.file {
            Some(path) => {
                let mut file = File::create(path)?;
                file.write_all(output.as_bytes())?;
            }
            None => {
                println!("{}", output);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voiceguard_detector::{AnalysisReport, Label};

    #[test]
    fn test_renders_report_in_both_formats() {
        let report = AnalysisReport::new(Label::Ai, 0.914, "Detected synthetic texture.");

        let yaml = Output::default().render(&report).unwrap();
        assert!(yaml.contains("classification: AI"));
        assert!(yaml.contains("confidenceScore: 0.91"));

        let json = Output::new(OutputFormat::Json, None).render(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["classification"], "AI");
    }

    #[test]
    fn test_writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let out = Output::new(OutputFormat::Json, Some(path.to_str().unwrap().to_string()));
        out.write(&vec![1, 2, 3]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(serde_json::from_str::<Vec<i32>>(&content).unwrap(), vec![1, 2, 3]);
    }
}
