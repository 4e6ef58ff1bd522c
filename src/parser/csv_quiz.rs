use super::{ContentType, ParseError, ParseResult, Parser, Provenance, Source};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Columns a quiz sheet must carry
const REQUIRED_COLUMNS: [&str; 4] = ["question", "option_a", "option_b", "correct"];

/// Option letters in column order (`option_a` .. `option_d`)
const OPTION_LETTERS: [&str; 4] = ["a", "b", "c", "d"];

/// Quiz import from CSV rows of question, options and correct letter
pub struct CsvParser {
    predictability_threshold: f64,
}

impl CsvParser {
    pub fn new() -> Self {
        Self {
            predictability_threshold: 0.6,
        }
    }

    /// Share of questions answered by one letter above which a warning is raised
    pub fn with_predictability_threshold(mut self, threshold: f64) -> Self {
        self.predictability_threshold = threshold;
        self
    }

    fn reader(text: &str) -> csv::Reader<&[u8]> {
        ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(text.as_bytes())
    }

    fn normalized_headers(headers: &StringRecord) -> Vec<String> {
        headers.iter().map(|h| h.trim().to_lowercase()).collect()
    }

    /// Build one question from a record, or explain why the row was dropped
    fn question_from_row(
        row: u64,
        record: &StringRecord,
        columns: &HashMap<String, usize>,
    ) -> Result<Value, String> {
        let field = |name: &str| {
            columns
                .get(name)
                .and_then(|&i| record.get(i))
                .map(str::trim)
                .unwrap_or("")
        };

        let question = field("question");
        if question.is_empty() {
            return Err(format!("Row {}: Empty question text", row));
        }

        let options: Vec<(&str, &str)> = OPTION_LETTERS
            .iter()
            .map(|&letter| (letter, field(&format!("option_{}", letter))))
            .filter(|(_, text)| !text.is_empty())
            .collect();

        if options.len() < 2 {
            return Err(format!(
                "Row {}: At least 2 options required, found {}",
                row,
                options.len()
            ));
        }

        let correct = field("correct").to_lowercase();
        if !options.iter().any(|(letter, _)| *letter == correct) {
            let available: Vec<&str> = options.iter().map(|(letter, _)| *letter).collect();
            return Err(format!(
                "Row {}: Correct answer '{}' not in available options ({})",
                row,
                correct,
                available.join(", ")
            ));
        }

        let mut entry = Map::new();
        entry.insert("question".into(), question.into());
        entry.insert(
            "options".into(),
            options
                .iter()
                .map(|(letter, text)| {
                    json!({
                        "letter": letter,
                        "text": text,
                        "is_correct": *letter == correct,
                    })
                })
                .collect::<Vec<_>>()
                .into(),
        );
        entry.insert("correct".into(), correct.into());

        for optional in ["feedback", "explanation"] {
            let value = field(optional);
            if !value.is_empty() {
                entry.insert(optional.into(), value.into());
            }
        }

        Ok(Value::Object(entry))
    }

    /// Warn when one letter holds too large a share of the correct answers
    fn predictability_warning(&self, distribution: &BTreeMap<String, usize>) -> Option<String> {
        let total: usize = distribution.values().sum();
        if total == 0 {
            return None;
        }

        let (letter, count) = distribution
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))?;
        let share = *count as f64 / total as f64;

        (share > self.predictability_threshold).then(|| {
            format!(
                "Answer '{}' is correct in {:.0}% of questions ({}/{}); answer positions may be predictable",
                letter,
                share * 100.0,
                count,
                total
            )
        })
    }
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for CsvParser {
    fn format(&self) -> &'static str {
        "csv"
    }

    fn can_parse(&self, source: Source<'_>, _filename: Option<&str>) -> bool {
        let Some(text) = source.text() else {
            return false;
        };

        let mut reader = Self::reader(text);
        match reader.headers() {
            Ok(headers) => {
                let headers = Self::normalized_headers(headers);
                REQUIRED_COLUMNS
                    .iter()
                    .all(|required| headers.iter().any(|h| h == required))
            }
            Err(_) => false,
        }
    }

    fn parse(
        &self,
        source: Source<'_>,
        filename: Option<&str>,
    ) -> Result<ParseResult, ParseError> {
        let text = source
            .text()
            .ok_or_else(|| ParseError::format("csv", "input is not valid UTF-8"))?;
        let provenance = Provenance::new(self.format(), filename, source);

        let mut warnings = Vec::new();
        let mut reader = Self::reader(text);

        let headers = match reader.headers() {
            Ok(headers) => Self::normalized_headers(headers),
            Err(e) => return Ok(structural_failure(provenance, warnings, &e)),
        };
        let columns: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let mut questions = Vec::new();
        let mut option_counts = Vec::new();
        let mut distribution: BTreeMap<String, usize> = BTreeMap::new();
        let mut has_feedback = false;
        let mut rows_skipped = 0usize;

        for (index, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => return Ok(structural_failure(provenance, warnings, &e)),
            };
            let row = record
                .position()
                .map(|p| p.line())
                .unwrap_or(index as u64 + 2);

            match Self::question_from_row(row, &record, &columns) {
                Ok(question) => {
                    let options = question["options"].as_array().map_or(0, Vec::len);
                    option_counts.push(options);
                    if let Some(letter) = question["correct"].as_str() {
                        *distribution.entry(letter.to_string()).or_insert(0) += 1;
                    }
                    has_feedback |= question.get("feedback").is_some();
                    questions.push(question);
                }
                Err(warning) => {
                    debug!(row, %warning, "dropping quiz row");
                    rows_skipped += 1;
                    warnings.push(warning);
                }
            }
        }

        warnings.extend(self.predictability_warning(&distribution));

        Ok(ParseResult::new(
            ContentType::Quiz,
            json!({ "questions": questions }),
            provenance,
        )
        .with_metadata("question_count", questions.len())
        .with_metadata("option_counts", option_counts)
        .with_metadata("has_feedback", has_feedback)
        .with_metadata("answer_distribution", json!(distribution))
        .with_metadata("rows_skipped", rows_skipped)
        .with_metadata("columns", headers)
        .with_warnings(warnings))
    }
}

/// Malformed CSV yields an empty quiz, never an error
fn structural_failure(
    provenance: Provenance,
    mut warnings: Vec<String>,
    error: &csv::Error,
) -> ParseResult {
    warnings.push(format!("CSV parse error: {}", error));
    ParseResult::new(ContentType::Quiz, json!({ "questions": [] }), provenance)
        .with_metadata("question_count", 0)
        .with_metadata("parse_error", error.to_string())
        .with_warnings(warnings)
}
