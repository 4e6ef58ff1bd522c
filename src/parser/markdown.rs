use super::{extension_of, ContentType, ParseError, ParseResult, Parser, Provenance, Source};
use pulldown_cmark::{CodeBlockKind, Event, Parser as CmarkParser, Tag, TagEnd};
use serde_json::{json, Value};

/// Reading import from Markdown, split into heading sections
pub struct MarkdownParser;

struct Section {
    heading: Option<String>,
    level: usize,
    body: String,
}

impl Section {
    fn to_value(&self) -> Value {
        json!({
            "heading": self.heading,
            "level": self.level,
            "body": self.body,
        })
    }

    fn is_blank(&self) -> bool {
        self.heading.is_none() && self.body.is_empty()
    }
}

impl MarkdownParser {
    fn looks_like_markdown(text: &str) -> bool {
        CmarkParser::new(text).any(|event| matches!(event, Event::Start(Tag::Heading { .. })))
    }

    /// Whether a fenced block's source ends with a closing fence.
    ///
    /// CommonMark lets an unclosed fence run to the end of the document, so
    /// the parser never reports it; the raw block text is the only witness.
    fn fence_closed(block: &str) -> bool {
        let strip = |line: &str| {
            line.trim_start_matches(|c: char| c == '>' || c.is_whitespace())
                .trim_end()
                .to_string()
        };
        let mut lines = block.lines();
        let Some(open) = lines.next().map(strip) else {
            return false;
        };
        let Some(marker) = open.chars().next() else {
            return false;
        };
        let width = open.chars().take_while(|&c| c == marker).count();

        lines
            .last()
            .map(strip)
            .map(|close| close.len() >= width && close.chars().all(|c| c == marker))
            .unwrap_or(false)
    }
}

impl Parser for MarkdownParser {
    fn format(&self) -> &'static str {
        "markdown"
    }

    fn can_parse(&self, source: Source<'_>, filename: Option<&str>) -> bool {
        let Some(text) = source.text() else {
            return false;
        };
        if text.trim().is_empty() {
            return false;
        }
        matches!(extension_of(filename).as_str(), "md" | "markdown")
            || Self::looks_like_markdown(text)
    }

    fn parse(
        &self,
        source: Source<'_>,
        filename: Option<&str>,
    ) -> Result<ParseResult, ParseError> {
        let text = source
            .text()
            .ok_or_else(|| ParseError::format("markdown", "input is not valid UTF-8"))?;
        let provenance = Provenance::new(self.format(), filename, source);

        let mut warnings = Vec::new();
        let mut sections = Vec::new();
        let mut current: (Option<String>, usize) = (None, 0);
        let mut body_start = 0usize;
        let mut heading_text: Option<String> = None;
        let mut code_blocks = 0usize;

        for (event, range) in CmarkParser::new(text).into_offset_iter() {
            match event {
                Event::Start(Tag::Heading { .. }) => {
                    let (heading, level) = std::mem::take(&mut current);
                    sections.push(Section {
                        heading,
                        level,
                        body: text[body_start..range.start].trim().to_string(),
                    });
                    heading_text = Some(String::new());
                }
                Event::End(TagEnd::Heading(level)) => {
                    let heading = heading_text.take().unwrap_or_default();
                    current = (Some(heading.trim().to_string()), level as usize);
                    body_start = range.end;
                }
                Event::Text(fragment) | Event::Code(fragment) => {
                    if let Some(heading) = heading_text.as_mut() {
                        heading.push_str(&fragment);
                    }
                }
                Event::SoftBreak | Event::HardBreak => {
                    if let Some(heading) = heading_text.as_mut() {
                        heading.push(' ');
                    }
                }
                Event::Start(Tag::CodeBlock(kind)) => {
                    code_blocks += 1;
                    if matches!(kind, CodeBlockKind::Fenced(_))
                        && !Self::fence_closed(&text[range.clone()])
                    {
                        let line = text[..range.start].matches('\n').count() + 1;
                        warnings.push(format!("Unclosed code block starting at line {}", line));
                    }
                }
                _ => {}
            }
        }

        let (heading, level) = current;
        sections.push(Section {
            heading,
            level,
            body: text[body_start..].trim().to_string(),
        });
        sections.retain(|s| !s.is_blank());

        let title = sections
            .iter()
            .find(|s| s.level == 1)
            .or_else(|| sections.iter().find(|s| s.heading.is_some()))
            .and_then(|s| s.heading.clone());
        if title.is_none() {
            warnings.push("No headings found; treating the document as a single section".into());
        }

        let heading_count = sections.iter().filter(|s| s.heading.is_some()).count();
        let section_values: Vec<Value> = sections.iter().map(Section::to_value).collect();

        Ok(ParseResult::new(
            ContentType::Reading,
            json!({
                "title": title,
                "sections": section_values,
                "text": text,
            }),
            provenance,
        )
        .with_metadata("section_count", section_values.len())
        .with_metadata("heading_count", heading_count)
        .with_metadata("code_block_count", code_blocks)
        .with_metadata("word_count", text.split_whitespace().count())
        .with_warnings(warnings))
    }
}
