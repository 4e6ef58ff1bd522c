use super::xml::{self, Element};
use super::{extension_of, ContentType, ParseError, ParseResult, Parser, Provenance, Source};
use crate::config::ImportConfig;
use crate::sandbox::{self, Sandbox};
use quick_xml::escape::escape;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};

const DOCUMENT_PART: &str = "word/document.xml";
const STYLES_PART: &str = "word/styles.xml";
const CORE_PART: &str = "docProps/core.xml";

/// Word (OOXML) document import
pub struct DocxParser {
    config: ImportConfig,
}

#[derive(Debug, Clone, Serialize)]
struct Run {
    text: String,
    bold: bool,
    italic: bool,
    underline: bool,
}

#[derive(Debug, Clone, Serialize)]
struct Paragraph {
    text: String,
    style: String,
    #[serde(skip)]
    style_id: Option<String>,
    #[serde(skip)]
    numbered: bool,
    runs: Vec<Run>,
}

enum Block {
    Paragraph(Paragraph),
    Table(Vec<Vec<String>>),
}

#[derive(Default)]
struct CoreProperties {
    author: Option<String>,
    title: Option<String>,
    created: Option<String>,
}

/// How a paragraph style renders in HTML
#[derive(Clone, Copy, PartialEq)]
enum HtmlRole {
    Paragraph,
    Heading(usize),
    Bullet,
    Numbered,
    Quote,
}

impl DocxParser {
    pub fn new() -> Self {
        Self::with_config(&ImportConfig::default())
    }

    pub fn with_config(config: &ImportConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Capability flag; when off the parser declines every input
    pub fn is_available(&self) -> bool {
        self.config.docx_enabled
    }

    /// OOXML on/off property: present means on unless `val` says otherwise
    fn toggle(props: Option<&Element>, name: &str) -> bool {
        props
            .and_then(|p| p.child(name))
            .map(|el| {
                !matches!(
                    el.attr("val").map(str::to_ascii_lowercase).as_deref(),
                    Some("0" | "false" | "off" | "none")
                )
            })
            .unwrap_or(false)
    }

    fn run(run: &Element) -> Run {
        let props = run.child("rPr");
        let mut text = String::new();
        for part in run.elements() {
            match part.name.as_str() {
                "t" => text.push_str(&part.text()),
                "tab" => text.push('\t'),
                "br" | "cr" => text.push('\n'),
                _ => {}
            }
        }
        Run {
            text,
            bold: Self::toggle(props, "b"),
            italic: Self::toggle(props, "i"),
            underline: Self::toggle(props, "u"),
        }
    }

    /// Runs directly under the paragraph and inside hyperlinks / tracked insertions
    fn collect_runs(container: &Element, runs: &mut Vec<Run>) {
        for child in container.elements() {
            match child.name.as_str() {
                "r" => runs.push(Self::run(child)),
                "hyperlink" | "ins" | "smartTag" | "fldSimple" => Self::collect_runs(child, runs),
                _ => {}
            }
        }
    }

    fn paragraph(p: &Element, styles: &HashMap<String, String>) -> Paragraph {
        let props = p.child("pPr");
        let style_id = props
            .and_then(|pp| pp.child("pStyle"))
            .and_then(|s| s.attr("val"))
            .map(str::to_string);
        let style = style_id
            .as_ref()
            .map(|id| styles.get(id).cloned().unwrap_or_else(|| id.clone()))
            .unwrap_or_else(|| "Normal".to_string());

        let mut runs = Vec::new();
        Self::collect_runs(p, &mut runs);
        let text = runs.iter().map(|r| r.text.as_str()).collect();

        Paragraph {
            text,
            style,
            style_id,
            numbered: props.and_then(|pp| pp.child("numPr")).is_some(),
            runs,
        }
    }

    fn table(tbl: &Element, styles: &HashMap<String, String>) -> Vec<Vec<String>> {
        tbl.children_named("tr")
            .map(|row| {
                row.children_named("tc")
                    .map(|cell| {
                        cell.children_named("p")
                            .map(|p| Self::paragraph(p, styles).text)
                            .collect::<Vec<_>>()
                            .join("\n")
                    })
                    .collect()
            })
            .collect()
    }

    /// Body-level blocks in document order; content controls are unwrapped
    fn collect_blocks(container: &Element, styles: &HashMap<String, String>, out: &mut Vec<Block>) {
        for child in container.elements() {
            match child.name.as_str() {
                "p" => out.push(Block::Paragraph(Self::paragraph(child, styles))),
                "tbl" => out.push(Block::Table(Self::table(child, styles))),
                "sdt" => {
                    if let Some(content) = child.child("sdtContent") {
                        Self::collect_blocks(content, styles, out);
                    }
                }
                _ => {}
            }
        }
    }

    /// Style ID -> display name from `word/styles.xml`
    fn styles(sandbox: &Sandbox, warnings: &mut Vec<String>) -> HashMap<String, String> {
        let mut styles = HashMap::new();
        let Some(raw) = sandbox.get(STYLES_PART) else {
            return styles;
        };

        let parsed = std::str::from_utf8(raw)
            .map_err(|e| ParseError::format("DOCX", e.to_string()))
            .and_then(|text| xml::parse(text, "DOCX"));
        match parsed {
            Ok(root) => {
                for style in root.children_named("style") {
                    if let (Some(id), Some(name)) = (
                        style.attr("styleId"),
                        style.child("name").and_then(|n| n.attr("val")),
                    ) {
                        styles.insert(id.to_string(), name.to_string());
                    }
                }
            }
            Err(e) => warnings.push(format!("Could not read style definitions: {}", e)),
        }
        styles
    }

    fn core_properties(sandbox: &Sandbox, warnings: &mut Vec<String>) -> CoreProperties {
        let Some(raw) = sandbox.get(CORE_PART) else {
            return CoreProperties::default();
        };

        let parsed = std::str::from_utf8(raw)
            .map_err(|e| ParseError::format("DOCX", e.to_string()))
            .and_then(|text| xml::parse(text, "DOCX"));
        match parsed {
            Ok(root) => CoreProperties {
                author: root.child_text("creator"),
                title: root.child_text("title"),
                created: root.child_text("created"),
            },
            Err(e) => {
                warnings.push(format!("Could not read document properties: {}", e));
                CoreProperties::default()
            }
        }
    }

    /// Matches display names ("heading 1") and bare style IDs ("Heading1")
    fn role(style: &str, numbered: bool) -> Option<HtmlRole> {
        let key: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();

        if let Some(level) = key.strip_prefix("heading") {
            return level
                .parse::<usize>()
                .ok()
                .filter(|l| (1..=6).contains(l))
                .map(HtmlRole::Heading);
        }
        let list = if numbered {
            HtmlRole::Numbered
        } else {
            HtmlRole::Bullet
        };
        match key.as_str() {
            "normal" | "bodytext" | "plaintext" | "nospacing" => Some(if numbered {
                HtmlRole::Numbered
            } else {
                HtmlRole::Paragraph
            }),
            "title" => Some(HtmlRole::Heading(1)),
            "subtitle" => Some(HtmlRole::Heading(2)),
            "listparagraph" | "listbullet" => Some(list),
            "listnumber" => Some(HtmlRole::Numbered),
            "quote" | "intensequote" => Some(HtmlRole::Quote),
            _ => None,
        }
    }

    fn render_runs(runs: &[Run]) -> String {
        let mut html = String::new();
        for run in runs.iter().filter(|r| !r.text.is_empty()) {
            let mut piece = escape(run.text.as_str()).replace('\n', "<br />");
            if run.underline {
                piece = format!("<u>{}</u>", piece);
            }
            if run.italic {
                piece = format!("<em>{}</em>", piece);
            }
            if run.bold {
                piece = format!("<strong>{}</strong>", piece);
            }
            html.push_str(&piece);
        }
        html
    }

    /// Semantic HTML rendering; unknown styles fall back to `<p>` with a diagnostic
    fn to_html(blocks: &[Block], diagnostics: &mut Vec<String>) -> String {
        let mut html = String::new();
        let mut open_list: Option<&'static str> = None;
        let mut reported = BTreeSet::new();

        for block in blocks {
            let role = match block {
                Block::Paragraph(p) if p.text.trim().is_empty() => continue,
                Block::Paragraph(p) => match Self::role(&p.style, p.numbered) {
                    Some(role) => role,
                    None => {
                        if reported.insert(p.style.clone()) {
                            diagnostics.push(format!(
                                "Unrecognised paragraph style: '{}' (Style ID: {}) was ignored",
                                p.style,
                                p.style_id.as_deref().unwrap_or(&p.style)
                            ));
                        }
                        HtmlRole::Paragraph
                    }
                },
                Block::Table(_) => HtmlRole::Paragraph,
            };

            let wanted_list = match role {
                HtmlRole::Bullet => Some("ul"),
                HtmlRole::Numbered => Some("ol"),
                _ => None,
            };
            if open_list != wanted_list {
                if let Some(tag) = open_list {
                    html.push_str(&format!("</{}>", tag));
                }
                if let Some(tag) = wanted_list {
                    html.push_str(&format!("<{}>", tag));
                }
                open_list = wanted_list;
            }

            match block {
                Block::Paragraph(p) => {
                    let inner = Self::render_runs(&p.runs);
                    match role {
                        HtmlRole::Heading(level) => {
                            html.push_str(&format!("<h{0}>{1}</h{0}>", level, inner))
                        }
                        HtmlRole::Bullet | HtmlRole::Numbered => {
                            html.push_str(&format!("<li>{}</li>", inner))
                        }
                        HtmlRole::Quote => {
                            html.push_str(&format!("<blockquote><p>{}</p></blockquote>", inner))
                        }
                        HtmlRole::Paragraph => html.push_str(&format!("<p>{}</p>", inner)),
                    }
                }
                Block::Table(rows) => {
                    html.push_str("<table>");
                    for row in rows {
                        html.push_str("<tr>");
                        for cell in row {
                            html.push_str(&format!(
                                "<td>{}</td>",
                                escape(cell.as_str()).replace('\n', "<br />")
                            ));
                        }
                        html.push_str("</tr>");
                    }
                    html.push_str("</table>");
                }
            }
        }

        if let Some(tag) = open_list {
            html.push_str(&format!("</{}>", tag));
        }
        html
    }

    /// Step-by-step documents number most of their paragraphs
    fn detect_type(&self, paragraphs: &[&Paragraph]) -> (ContentType, f64) {
        let non_empty: Vec<&str> = paragraphs
            .iter()
            .map(|p| p.text.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if non_empty.is_empty() {
            return (ContentType::Reading, 0.0);
        }

        let numbered = non_empty
            .iter()
            .filter(|t| t.starts_with(|c: char| c.is_ascii_digit()))
            .count();
        let ratio = numbered as f64 / non_empty.len() as f64;

        if ratio > self.config.lab_step_threshold {
            (ContentType::Lab, ratio)
        } else {
            (ContentType::Reading, ratio)
        }
    }
}

impl Default for DocxParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for DocxParser {
    fn format(&self) -> &'static str {
        "docx"
    }

    fn can_parse(&self, source: Source<'_>, filename: Option<&str>) -> bool {
        if !self.is_available() {
            return false;
        }
        let Some(bytes) = source.binary() else {
            return false;
        };
        if extension_of(filename) == "docx" {
            return true;
        }
        sandbox::member_names(bytes)
            .map(|names| names.iter().any(|n| n == DOCUMENT_PART))
            .unwrap_or(false)
    }

    fn parse(
        &self,
        source: Source<'_>,
        filename: Option<&str>,
    ) -> Result<ParseResult, ParseError> {
        if !self.is_available() {
            return Err(ParseError::Unavailable("DOCX"));
        }
        let bytes = source.binary().ok_or(ParseError::BinaryRequired("DOCX"))?;
        let provenance = Provenance::new(self.format(), filename, source);

        let package = self
            .config
            .sandbox()
            .ingest_zip_with(bytes, |member| {
                [DOCUMENT_PART, STYLES_PART, CORE_PART].contains(&member.virtual_path.as_str())
            })?
            .build();
        let mut warnings: Vec<String> = package.skipped().to_vec();

        let document = package
            .get(DOCUMENT_PART)
            .ok_or_else(|| ParseError::format("DOCX", "missing word/document.xml"))?;
        let document = std::str::from_utf8(document)
            .map_err(|_| ParseError::format("DOCX", "word/document.xml is not valid UTF-8"))?;
        let root = xml::parse(document, "DOCX")?;
        let body = root
            .child("body")
            .ok_or_else(|| ParseError::format("DOCX", "document has no body"))?;

        let styles = Self::styles(&package, &mut warnings);
        let core = Self::core_properties(&package, &mut warnings);

        let mut blocks = Vec::new();
        Self::collect_blocks(body, &styles, &mut blocks);

        let paragraphs: Vec<&Paragraph> = blocks
            .iter()
            .filter_map(|b| match b {
                Block::Paragraph(p) => Some(p),
                Block::Table(_) => None,
            })
            .collect();
        let tables: Vec<&Vec<Vec<String>>> = blocks
            .iter()
            .filter_map(|b| match b {
                Block::Table(t) => Some(t),
                Block::Paragraph(_) => None,
            })
            .collect();

        let html = Self::to_html(&blocks, &mut warnings);
        let (content_type, step_ratio) = self.detect_type(&paragraphs);

        let title = core.title.clone().or_else(|| {
            paragraphs
                .iter()
                .find(|p| {
                    matches!(
                        Self::role(&p.style, p.numbered),
                        Some(HtmlRole::Heading(_))
                    ) && !p.text.trim().is_empty()
                })
                .map(|p| p.text.trim().to_string())
        });

        let non_empty = paragraphs.iter().filter(|p| !p.text.trim().is_empty()).count();

        Ok(ParseResult::new(
            content_type,
            json!({
                "title": title,
                "paragraphs": paragraphs,
                "tables": tables,
                "html": html,
            }),
            provenance,
        )
        .with_metadata("author", core.author)
        .with_metadata("title", core.title)
        .with_metadata("created", core.created)
        .with_metadata("paragraph_count", paragraphs.len())
        .with_metadata("non_empty_paragraph_count", non_empty)
        .with_metadata("table_count", tables.len())
        .with_metadata("step_ratio", step_ratio)
        .with_metadata("detected_type", Value::from(content_type.as_str()))
        .with_warnings(warnings))
    }
}
