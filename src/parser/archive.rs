use super::scorm::find_manifest;
use super::{ContentType, ParseError, ParseResult, Parser, ParserRegistry, Provenance, Source};
use crate::config::ImportConfig;
use crate::sandbox;
use serde_json::{json, Map, Value};
use tracing::debug;

/// Generic ZIP import: lists members and parses the textual ones
///
/// Archives carrying an `imsmanifest.xml` anywhere are left to the SCORM
/// parser, so the two never claim the same input.
pub struct ZipParser {
    config: ImportConfig,
    /// JSON -> CSV -> Markdown -> Text, used for individual members
    members: ParserRegistry,
}

impl ZipParser {
    pub fn new() -> Self {
        Self::with_config(&ImportConfig::default())
    }

    pub fn with_config(config: &ImportConfig) -> Self {
        Self {
            config: config.clone(),
            members: ParserRegistry::text_formats(config),
        }
    }

    /// "flat" (no folders), "single_level" (one folder deep) or "nested"
    fn classify(max_depth: usize) -> &'static str {
        match max_depth {
            0 => "flat",
            1 => "single_level",
            _ => "nested",
        }
    }
}

impl Default for ZipParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for ZipParser {
    fn format(&self) -> &'static str {
        "zip"
    }

    fn can_parse(&self, source: Source<'_>, _filename: Option<&str>) -> bool {
        source
            .binary()
            .and_then(sandbox::member_names)
            .map(|names| find_manifest(names.iter().map(String::as_str)).is_none())
            .unwrap_or(false)
    }

    fn parse(
        &self,
        source: Source<'_>,
        filename: Option<&str>,
    ) -> Result<ParseResult, ParseError> {
        let bytes = source.binary().ok_or(ParseError::BinaryRequired("ZIP"))?;
        let provenance = Provenance::new(self.format(), filename, source);

        // Listing comes from the central directory; only small textual
        // members are ever decompressed.
        let extract_limit = self.config.max_extract_bytes.min(self.config.max_entry_bytes);
        let archive = self
            .config
            .sandbox()
            .max_file_size(extract_limit)
            .ingest_zip_with(bytes, |member| {
                self.config.is_extractable(&member.extension()) && member.size <= extract_limit
            })?
            .build();
        let mut warnings: Vec<String> = archive.skipped().to_vec();

        if let Some(manifest) = find_manifest(archive.members().map(|m| m.virtual_path.as_str())) {
            warnings.push(format!(
                "Archive contains a SCORM manifest at {}; import it as a SCORM package for its course outline",
                manifest
            ));
        }

        let mut files = Vec::with_capacity(archive.member_count());
        let mut extracted = Map::new();
        let mut total_compressed = 0u64;
        let mut max_depth = 0usize;

        for member in archive.members() {
            files.push(json!({
                "path": member.virtual_path,
                "size": member.size,
                "compressed_size": member.compressed_size,
            }));
            total_compressed += member.compressed_size;
            max_depth = max_depth.max(member.depth());

            if !self.config.is_extractable(&member.extension()) {
                continue;
            }
            if member.size > extract_limit {
                warnings.push(format!(
                    "Skipped extraction of '{}': {} bytes exceeds the {} byte limit",
                    member.virtual_path, member.size, extract_limit
                ));
                continue;
            }

            let Some(data) = archive.get(&member.virtual_path) else {
                continue;
            };
            match self.members.parse(Source::Bytes(data), Some(&member.virtual_path)) {
                Ok(result) => {
                    extracted.insert(member.virtual_path.clone(), result.to_dict());
                }
                Err(e) => {
                    debug!(path = %member.virtual_path, error = %e, "member not extracted");
                }
            }
        }

        let structure = Self::classify(max_depth);
        let extracted_count = extracted.len();

        Ok(ParseResult::new(
            ContentType::Archive,
            json!({
                "files": files,
                "extracted_content": Value::Object(extracted),
            }),
            provenance,
        )
        .with_metadata("file_count", archive.member_count())
        .with_metadata("total_size", archive.uncompressed_size())
        .with_metadata("total_compressed_size", total_compressed)
        .with_metadata("structure", structure)
        .with_metadata("max_depth", max_depth)
        .with_metadata("extracted_count", extracted_count)
        .with_warnings(warnings))
    }
}
