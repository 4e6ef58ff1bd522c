use super::Source;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// Result of parsing any supported import format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    /// Semantic kind of the extracted content; fixes the shape of `content`
    pub content_type: ContentType,
    /// Normalized, format-specific structure
    pub content: Value,
    /// Detection facts: counts, structure flags, parse errors
    pub metadata: Map<String, Value>,
    /// Non-fatal issues, in the order they were found
    pub warnings: Vec<String>,
    /// Where the content came from
    pub provenance: Provenance,
}

/// Semantic kind of imported content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Multiple-choice questions
    Quiz,
    /// Course outline of modules, lessons and activities
    Blueprint,
    /// Prose to be read
    Reading,
    /// Step-by-step instructions
    Lab,
    /// Archive listing with per-member extraction
    Archive,
    /// Nothing usable was recognised
    Unknown,
}

/// Audit trail for imported content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Original filename, if the caller supplied one
    pub filename: Option<String>,
    /// When the parse happened
    pub imported_at: DateTime<Utc>,
    /// Identifier of the parser that produced the result
    pub format: String,
    /// Size of the raw input
    pub size_bytes: usize,
    /// Hex SHA-256 of the raw input
    pub sha256: String,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Quiz => "quiz",
            ContentType::Blueprint => "blueprint",
            ContentType::Reading => "reading",
            ContentType::Lab => "lab",
            ContentType::Archive => "archive",
            ContentType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Provenance {
    /// Record provenance for `source` as parsed by `format`
    pub fn new(format: &str, filename: Option<&str>, source: Source<'_>) -> Self {
        let bytes = source.as_bytes();
        Self {
            filename: filename.map(str::to_string),
            imported_at: Utc::now(),
            format: format.to_string(),
            size_bytes: bytes.len(),
            sha256: hex::encode(Sha256::digest(bytes)),
        }
    }
}

impl ParseResult {
    /// Create a result with empty metadata and no warnings
    pub fn new(content_type: ContentType, content: Value, provenance: Provenance) -> Self {
        Self {
            content_type,
            content,
            metadata: Map::new(),
            warnings: Vec::new(),
            provenance,
        }
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Append warnings, keeping their order
    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    /// Plain JSON form with exactly the five top-level fields
    pub fn to_dict(&self) -> Value {
        json!({
            "content_type": self.content_type,
            "content": self.content,
            "metadata": self.metadata,
            "warnings": self.warnings,
            "provenance": self.provenance,
        })
    }

    /// Rebuild a result from the output of [`ParseResult::to_dict`]
    pub fn from_dict(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
