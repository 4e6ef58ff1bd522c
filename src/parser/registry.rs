use super::{
    CsvParser, DocxParser, JsonParser, MarkdownParser, ParseError, ParseResult, Parser,
    ScormParser, Source, TextParser, ZipParser,
};
use crate::config::ImportConfig;
use tracing::{debug, info};

/// Ordered dispatch table for import formats
///
/// Parsers are consulted in registration order and the first whose
/// `can_parse` accepts the input wins. The order is part of the contract:
/// the most specific detector must come first.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn Parser>>,
    max_input_bytes: u64,
}

impl ParserRegistry {
    /// Create an empty registry with default input limits
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
            max_input_bytes: ImportConfig::default().max_input_bytes,
        }
    }

    /// Full import registry
    ///
    /// Order: SCORM, DOCX, ZIP, JSON, CSV, Markdown, Text.
    /// * SCORM before ZIP: a package is a ZIP with a manifest.
    /// * DOCX before ZIP: a Word file is a ZIP with `word/document.xml`.
    /// * JSON and CSV before Markdown and Text: both of the latter accept
    ///   almost any text, so the column/key based detectors go first.
    pub fn with_config(config: &ImportConfig) -> Self {
        let mut registry = Self::empty(config);
        registry.register(ScormParser::with_config(config));
        registry.register(DocxParser::with_config(config));
        registry.register(ZipParser::with_config(config));
        registry.extend_text_formats(config);
        registry
    }

    /// Text-only registry used for archive members: JSON, CSV, Markdown, Text
    pub fn text_formats(config: &ImportConfig) -> Self {
        let mut registry = Self::empty(config);
        registry.extend_text_formats(config);
        registry
    }

    fn empty(config: &ImportConfig) -> Self {
        Self {
            parsers: Vec::new(),
            max_input_bytes: config.max_input_bytes,
        }
    }

    fn extend_text_formats(&mut self, config: &ImportConfig) {
        self.register(JsonParser);
        self.register(
            CsvParser::new().with_predictability_threshold(config.predictability_threshold),
        );
        self.register(MarkdownParser);
        self.register(TextParser);
    }

    /// Append a parser; it is consulted after every parser already registered
    ///
    /// # Example
    /// ```ignore
    /// let mut registry = ParserRegistry::new();
    /// registry.register(JsonParser);
    /// registry.register(TextParser);
    /// ```
    pub fn register(&mut self, parser: impl Parser + 'static) {
        self.parsers.push(Box::new(parser));
    }

    /// First parser that claims the input, if any
    pub fn select(&self, source: Source<'_>, filename: Option<&str>) -> Option<&dyn Parser> {
        self.parsers
            .iter()
            .map(|p| &**p)
            .find(|p| p.can_parse(source, filename))
    }

    /// Parser registered under a format identifier
    pub fn get(&self, format: &str) -> Option<&dyn Parser> {
        self.parsers
            .iter()
            .map(|p| &**p)
            .find(|p| p.format().eq_ignore_ascii_case(format))
    }

    fn check_size(&self, source: Source<'_>) -> Result<(), ParseError> {
        let size = source.len() as u64;
        if size > self.max_input_bytes {
            return Err(ParseError::InputTooLarge {
                size,
                max: self.max_input_bytes,
            });
        }
        Ok(())
    }

    /// Detect the format and parse with the first matching parser
    pub fn parse(
        &self,
        source: Source<'_>,
        filename: Option<&str>,
    ) -> Result<ParseResult, ParseError> {
        self.check_size(source)?;

        let parser = self.select(source, filename).ok_or_else(|| {
            ParseError::NoParser(filename.unwrap_or("<unnamed input>").to_string())
        })?;
        info!(
            format = parser.format(),
            filename = filename.unwrap_or("-"),
            size = source.len(),
            "selected parser"
        );
        parser.parse(source, filename)
    }

    /// Parse with an explicit format, skipping detection
    pub fn parse_as(
        &self,
        format: &str,
        source: Source<'_>,
        filename: Option<&str>,
    ) -> Result<ParseResult, ParseError> {
        self.check_size(source)?;

        let parser = self
            .get(format)
            .ok_or_else(|| ParseError::UnknownFormat(format.to_string()))?;
        debug!(format = parser.format(), "parsing with format hint");
        parser.parse(source, filename)
    }

    /// Honor a caller-supplied format hint when present, detect otherwise
    pub fn parse_with_hint(
        &self,
        source: Source<'_>,
        filename: Option<&str>,
        hint: Option<&str>,
    ) -> Result<ParseResult, ParseError> {
        match hint.map(str::trim).filter(|h| !h.is_empty()) {
            Some(format) => self.parse_as(format, source, filename),
            None => self.parse(source, filename),
        }
    }

    /// Get the number of registered parsers
    pub fn parser_count(&self) -> usize {
        self.parsers.len()
    }

    /// Registered format identifiers, in dispatch order
    pub fn formats(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.format()).collect()
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_config(&ImportConfig::default())
    }
}
