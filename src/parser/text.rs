use super::{ContentType, ParseError, ParseResult, Parser, Provenance, Source};
use serde_json::json;

/// Last-resort reading import for any plain text
pub struct TextParser;

impl TextParser {
    /// Extract printable ASCII from binary data
    fn extract_printable(bytes: &[u8]) -> String {
        bytes
            .iter()
            .filter(|&&b| b.is_ascii_graphic() || b.is_ascii_whitespace())
            .map(|&b| b as char)
            .collect()
    }

    /// Blank-line separated blocks, each with internal whitespace collapsed
    fn paragraphs(text: &str) -> Vec<String> {
        let mut paragraphs = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                if !current.is_empty() {
                    paragraphs.push(current.join(" "));
                    current.clear();
                }
            } else {
                current.push(line);
            }
        }
        if !current.is_empty() {
            paragraphs.push(current.join(" "));
        }

        paragraphs
    }
}

impl Parser for TextParser {
    fn format(&self) -> &'static str {
        "text"
    }

    fn can_parse(&self, source: Source<'_>, _filename: Option<&str>) -> bool {
        source
            .text()
            .map(|text| !text.trim().is_empty() && !text.contains('\0'))
            .unwrap_or(false)
    }

    fn parse(
        &self,
        source: Source<'_>,
        filename: Option<&str>,
    ) -> Result<ParseResult, ParseError> {
        let provenance = Provenance::new(self.format(), filename, source);
        let mut warnings = Vec::new();

        let (text, is_utf8) = match source.text() {
            Some(text) => (text.to_string(), true),
            None => {
                warnings.push(
                    "Input is not valid UTF-8; only printable ASCII was kept".to_string(),
                );
                (Self::extract_printable(source.as_bytes()), false)
            }
        };

        let paragraphs = Self::paragraphs(&text);
        if paragraphs.is_empty() {
            warnings.push("No readable text found".to_string());
        }

        let title = paragraphs
            .first()
            .filter(|p| p.chars().count() <= 120)
            .cloned();

        Ok(ParseResult::new(
            ContentType::Reading,
            json!({
                "title": title,
                "text": text,
                "paragraphs": paragraphs,
            }),
            provenance,
        )
        .with_metadata("paragraph_count", paragraphs.len())
        .with_metadata("line_count", text.lines().count())
        .with_metadata("word_count", text.split_whitespace().count())
        .with_metadata("is_utf8", is_utf8)
        .with_warnings(warnings))
    }
}
