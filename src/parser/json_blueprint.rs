use super::{ContentType, ParseError, ParseResult, Parser, Provenance, Source};
use serde_json::{json, Map, Value};

/// Keys whose presence marks a JSON object as a course blueprint
const BLUEPRINT_KEYS: [&str; 3] = ["course_title", "description", "modules"];

const MODULE_KEYS: [&str; 2] = ["title", "lessons"];
const LESSON_KEYS: [&str; 2] = ["title", "activities"];
const ACTIVITY_KEYS: [&str; 2] = ["title", "type"];

/// Course blueprint import from JSON
pub struct JsonParser;

#[derive(Default)]
struct BlueprintCounts {
    modules: usize,
    lessons: usize,
    activities: usize,
}

impl JsonParser {
    fn missing_keys(
        object: &Map<String, Value>,
        keys: &[&str],
        at: &str,
        warnings: &mut Vec<String>,
    ) {
        for key in keys {
            if !object.contains_key(*key) {
                warnings.push(format!("{}: Missing '{}'", at, key));
            }
        }
    }

    /// Children under `key`, warning when present but not an array
    fn children<'a>(
        object: &'a Map<String, Value>,
        key: &str,
        at: &str,
        warnings: &mut Vec<String>,
    ) -> &'a [Value] {
        match object.get(key) {
            Some(Value::Array(items)) => items.as_slice(),
            Some(_) => {
                warnings.push(format!("{}: '{}' should be a list", at, key));
                &[]
            }
            None => &[],
        }
    }

    /// Walk course -> modules -> lessons -> activities collecting warnings
    fn validate(course: &Map<String, Value>, warnings: &mut Vec<String>) -> BlueprintCounts {
        let mut counts = BlueprintCounts::default();
        Self::missing_keys(course, &BLUEPRINT_KEYS, "Course", warnings);

        let modules = Self::children(course, "modules", "Course", warnings);
        for (m, module) in modules.iter().enumerate() {
            counts.modules += 1;
            let at = format!("Module {}", m + 1);
            let Some(module) = module.as_object() else {
                warnings.push(format!("{}: Expected an object", at));
                continue;
            };
            Self::missing_keys(module, &MODULE_KEYS, &at, warnings);

            let lessons = Self::children(module, "lessons", &at, warnings);
            for (l, lesson) in lessons.iter().enumerate() {
                counts.lessons += 1;
                let at = format!("Module {}, Lesson {}", m + 1, l + 1);
                let Some(lesson) = lesson.as_object() else {
                    warnings.push(format!("{}: Expected an object", at));
                    continue;
                };
                Self::missing_keys(lesson, &LESSON_KEYS, &at, warnings);

                for (a, activity) in Self::children(lesson, "activities", &at, warnings)
                    .iter()
                    .enumerate()
                {
                    counts.activities += 1;
                    let at = format!("Module {}, Lesson {}, Activity {}", m + 1, l + 1, a + 1);
                    match activity.as_object() {
                        Some(activity) => {
                            Self::missing_keys(activity, &ACTIVITY_KEYS, &at, warnings)
                        }
                        None => warnings.push(format!("{}: Expected an object", at)),
                    }
                }
            }
        }

        counts
    }

    fn unknown(provenance: Provenance, warning: String) -> ParseResult {
        ParseResult::new(ContentType::Unknown, json!({}), provenance)
            .with_metadata("parse_error", warning.clone())
            .with_warnings([warning])
    }
}

impl Parser for JsonParser {
    fn format(&self) -> &'static str {
        "json"
    }

    fn can_parse(&self, source: Source<'_>, _filename: Option<&str>) -> bool {
        let Some(text) = source.text() else {
            return false;
        };
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(object)) => BLUEPRINT_KEYS.iter().any(|k| object.contains_key(*k)),
            _ => false,
        }
    }

    fn parse(
        &self,
        source: Source<'_>,
        filename: Option<&str>,
    ) -> Result<ParseResult, ParseError> {
        let provenance = Provenance::new(self.format(), filename, source);
        let Some(text) = source.text() else {
            return Ok(Self::unknown(
                provenance,
                "Invalid JSON: input is not valid UTF-8".to_string(),
            ));
        };

        let course = match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(course)) => course,
            Ok(other) => {
                return Ok(Self::unknown(
                    provenance,
                    format!(
                        "Invalid JSON: expected an object at top level, found {}",
                        kind_of(&other)
                    ),
                ));
            }
            Err(e) => return Ok(Self::unknown(provenance, format!("Invalid JSON: {}", e))),
        };

        let mut warnings = Vec::new();
        let counts = Self::validate(&course, &mut warnings);

        let course_title = course.get("course_title").cloned().unwrap_or(Value::Null);

        Ok(ParseResult::new(ContentType::Blueprint, Value::Object(course), provenance)
            .with_metadata("course_title", course_title)
            .with_metadata("module_count", counts.modules)
            .with_metadata("lesson_count", counts.lessons)
            .with_metadata("activity_count", counts.activities)
            .with_metadata("structure_valid", warnings.is_empty())
            .with_warnings(warnings))
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ParseResult {
        JsonParser.parse(Source::Text(text), Some("course.json")).unwrap()
    }

    #[test]
    fn test_detection_needs_blueprint_key() {
        assert!(JsonParser.can_parse(Source::Text(r#"{"modules": []}"#), None));
        assert!(JsonParser.can_parse(Source::Text(r#"{"description": "x"}"#), None));
        assert!(!JsonParser.can_parse(Source::Text(r#"{"name": "x"}"#), None));
        assert!(!JsonParser.can_parse(Source::Text("[1, 2]"), None));
        assert!(!JsonParser.can_parse(Source::Text("{not json"), None));
    }

    #[test]
    fn test_complete_blueprint() {
        let result = parse(
            r#"{
                "course_title": "Rust 101",
                "description": "Basics",
                "modules": [{
                    "title": "Intro",
                    "lessons": [{
                        "title": "Setup",
                        "activities": [
                            {"title": "Install", "type": "reading"},
                            {"title": "Check", "type": "quiz"}
                        ]
                    }]
                }]
            }"#,
        );

        assert_eq!(result.content_type, ContentType::Blueprint);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert_eq!(result.metadata["course_title"], "Rust 101");
        assert_eq!(result.metadata["module_count"], 1);
        assert_eq!(result.metadata["lesson_count"], 1);
        assert_eq!(result.metadata["activity_count"], 2);
        assert_eq!(result.metadata["structure_valid"], true);
        assert_eq!(result.content["modules"][0]["title"], "Intro");
    }

    #[test]
    fn test_partial_blueprint_warns() {
        let result = parse(r#"{"modules": []}"#);

        assert_eq!(result.content_type, ContentType::Blueprint);
        assert_eq!(result.metadata["module_count"], 0);
        assert_eq!(result.metadata["structure_valid"], false);
        assert!(result.warnings.contains(&"Course: Missing 'course_title'".to_string()));
        assert!(result.warnings.contains(&"Course: Missing 'description'".to_string()));
    }

    #[test]
    fn test_nested_locations_in_warnings() {
        let result = parse(
            r#"{"course_title": "x", "description": "y", "modules": [
                {"title": "m", "lessons": [{"title": "l", "activities": [{"title": "a"}]}]},
                {"lessons": "none"},
                "oops"
            ]}"#,
        );

        assert_eq!(
            result.warnings,
            vec![
                "Module 1, Lesson 1, Activity 1: Missing 'type'",
                "Module 2: Missing 'title'",
                "Module 2: 'lessons' should be a list",
                "Module 3: Expected an object",
            ]
        );
        assert_eq!(result.metadata["module_count"], 3);
    }

    #[test]
    fn test_syntax_error_is_unknown() {
        let result = parse(r#"{"course_title": "#);

        assert_eq!(result.content_type, ContentType::Unknown);
        assert_eq!(result.content, json!({}));
        assert!(result.warnings[0].starts_with("Invalid JSON:"));
    }

    #[test]
    fn test_non_object_top_level_is_unknown() {
        let result = parse("[1, 2, 3]");
        assert_eq!(result.content_type, ContentType::Unknown);
        assert!(result.warnings[0].contains("an array"));
    }
}
