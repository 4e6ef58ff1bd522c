//! Import limits, heuristics and capability flags

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::sandbox::SandboxBuilder;

/// Settings shared by the registry and every parser it builds.
///
/// Every field has a default, so a config file only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Largest input the registry will look at
    pub max_input_bytes: u64,
    /// Most members an archive may declare
    pub max_archive_entries: usize,
    /// Largest single archive member once decompressed
    pub max_entry_bytes: u64,
    /// Largest total decompressed size of one archive
    pub max_total_uncompressed: u64,
    /// Archive members above this size are listed but not parsed
    pub max_extract_bytes: u64,
    /// Share of correct answers on one letter that triggers a warning
    pub predictability_threshold: f64,
    /// Share of numbered paragraphs that makes a document a lab
    pub lab_step_threshold: f64,
    /// Archive member extensions that are handed to the sub-registry
    pub extractable_extensions: Vec<String>,
    /// Capability flag for Word documents
    pub docx_enabled: bool,
    /// Capability flag for SCORM packages
    pub scorm_enabled: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: 100 * 1024 * 1024,       // 100 MB
            max_archive_entries: 10_000,
            max_entry_bytes: 50 * 1024 * 1024,        // 50 MB per member
            max_total_uncompressed: 500 * 1024 * 1024, // 500 MB per archive
            max_extract_bytes: 5 * 1024 * 1024,       // 5 MB
            predictability_threshold: 0.6,
            lab_step_threshold: 0.3,
            extractable_extensions: ["txt", "md", "json", "csv", "html", "xml"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            docx_enabled: true,
            scorm_enabled: true,
        }
    }
}

impl ImportConfig {
    /// Load a JSON config file; missing keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("predictability_threshold", self.predictability_threshold),
            ("lab_step_threshold", self.lab_step_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{} must be between 0 and 1, got {}", name, value);
            }
        }
        if self.max_input_bytes == 0 || self.max_entry_bytes == 0 {
            bail!("size limits must be greater than zero");
        }
        if self.max_archive_entries == 0 {
            bail!("max_archive_entries must be greater than zero");
        }
        Ok(())
    }

    pub fn with_docx(mut self, enabled: bool) -> Self {
        self.docx_enabled = enabled;
        self
    }

    pub fn with_scorm(mut self, enabled: bool) -> Self {
        self.scorm_enabled = enabled;
        self
    }

    pub fn with_predictability_threshold(mut self, threshold: f64) -> Self {
        self.predictability_threshold = threshold;
        self
    }

    pub fn with_max_input_bytes(mut self, size: u64) -> Self {
        self.max_input_bytes = size;
        self
    }

    /// Sandbox builder carrying this config's archive limits
    pub fn sandbox(&self) -> SandboxBuilder {
        SandboxBuilder::new()
            .max_file_size(self.max_entry_bytes)
            .max_total_size(self.max_total_uncompressed)
            .max_entries(self.max_archive_entries)
    }

    /// Whether an archive member with this extension should be parsed
    pub fn is_extractable(&self, extension: &str) -> bool {
        self.extractable_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}
