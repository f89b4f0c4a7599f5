//! Validation of raw model output.
//!
//! Model output is untrusted. It is accepted only if, after optional code
//! fence removal, it is a JSON object with a string `title` and an object
//! `structuredContent`. Anything else becomes a degraded result carrying
//! a diagnostic excerpt of what the model said.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use snapnote_core::types::{GenerationResult, Sections};

pub const DEGRADED_TITLE: &str = "Processing Error";
pub const PARSE_FAILURE: &str = "failed to parse output as valid JSON";
pub const UNTITLED: &str = "Untitled Note";

/// Result of a generation call that reached the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Output passed validation.
    Generated(GenerationResult),
    /// Output failed validation. `result` is a synthesized placeholder.
    Degraded {
        result: GenerationResult,
        reason: String,
    },
}

impl GenerationOutcome {
    pub fn result(&self) -> &GenerationResult {
        match self {
            GenerationOutcome::Generated(result) => result,
            GenerationOutcome::Degraded { result, .. } => result,
        }
    }

    pub fn into_result(self) -> GenerationResult {
        match self {
            GenerationOutcome::Generated(result) => result,
            GenerationOutcome::Degraded { result, .. } => result,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, GenerationOutcome::Degraded { .. })
    }
}

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\s*```\s*$").expect("Invalid fence regex")
});

/// Remove a surrounding Markdown code fence, if present, and trim.
pub fn strip_code_fences(raw: &str) -> &str {
    match FENCE_RE.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => raw.trim(),
    }
}

/// Validate `raw` and build the outcome. `excerpt_chars` caps the raw output
/// kept in a degraded result.
pub fn parse_response(raw: &str, excerpt_chars: usize) -> GenerationOutcome {
    match validate(strip_code_fences(raw)) {
        Ok(result) => GenerationOutcome::Generated(result),
        Err(reason) => GenerationOutcome::Degraded {
            result: degraded_result(raw, &reason, excerpt_chars),
            reason,
        },
    }
}

fn validate(cleaned: &str) -> Result<GenerationResult, String> {
    let value: Value = serde_json::from_str(cleaned).map_err(|e| format!("invalid JSON: {e}"))?;
    let mut object = match value {
        Value::Object(object) => object,
        other => return Err(format!("expected a JSON object, found {}", kind(&other))),
    };

    let title = match object.remove("title") {
        Some(Value::String(title)) => title,
        Some(other) => return Err(format!("`title` must be a string, found {}", kind(&other))),
        None => return Err("missing `title`".to_string()),
    };

    let structured_content = match object.remove("structuredContent") {
        Some(value @ Value::Object(_)) => serde_json::from_value::<Sections>(value)
            .map_err(|e| format!("invalid `structuredContent`: {e}"))?,
        Some(other) => {
            return Err(format!(
                "`structuredContent` must be an object, found {}",
                kind(&other)
            ))
        }
        None => return Err("missing `structuredContent`".to_string()),
    };

    let title = title.trim();
    Ok(GenerationResult {
        title: if title.is_empty() {
            UNTITLED.to_string()
        } else {
            title.to_string()
        },
        structured_content,
        uncertainties: uncertainties(&mut object),
    })
}

fn uncertainties(object: &mut Map<String, Value>) -> Vec<String> {
    match object.remove("uncertainties") {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                Value::String(_) | Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    }
}

fn degraded_result(raw: &str, reason: &str, excerpt_chars: usize) -> GenerationResult {
    let mut sections = Sections::new();
    sections.insert("Error", vec![format!("Could not structure the note: {reason}")]);
    sections.insert("RawOutput", vec![excerpt(raw, excerpt_chars)]);
    GenerationResult {
        title: DEGRADED_TITLE.to_string(),
        structured_content: sections,
        uncertainties: vec![PARSE_FAILURE.to_string()],
    }
}

fn excerpt(raw: &str, max_chars: usize) -> String {
    match raw.char_indices().nth(max_chars) {
        Some((cut, _)) => raw[..cut].to_string(),
        None => raw.to_string(),
    }
}

fn kind(value: &Value) -> &'static str {
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

    const VALID: &str = r#"{
        "title": "Q3 Planning",
        "structuredContent": {"Financial Goals": ["Revenue target: $2.5M"]},
        "uncertainties": ["'$2.5M' could be '$2.6M'"]
    }"#;

    #[test]
    fn test_strip_code_fences_variants() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  ```JSON {\"a\":1}```  "), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_valid_output() {
        let outcome = parse_response(VALID, 500);
        let GenerationOutcome::Generated(result) = outcome else {
            panic!("expected generated outcome");
        };
        assert_eq!(result.title, "Q3 Planning");
        assert_eq!(
            result.structured_content.get("Financial Goals").unwrap(),
            ["Revenue target: $2.5M"]
        );
        assert_eq!(result.uncertainties.len(), 1);
    }

    #[test]
    fn test_parse_fenced_output() {
        let fenced = format!("```json\n{}\n```", VALID);
        assert!(!parse_response(&fenced, 500).is_degraded());
    }

    #[test]
    fn test_missing_uncertainties_defaults_to_empty() {
        let raw = r#"{"title": "T", "structuredContent": {}}"#;
        let result = parse_response(raw, 500).into_result();
        assert!(result.uncertainties.is_empty());
        assert!(result.structured_content.is_empty());
    }

    #[test]
    fn test_blank_title_falls_back() {
        let raw = r#"{"title": "  ", "structuredContent": {"A": ["b"]}}"#;
        let outcome = parse_response(raw, 500);
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.result().title, UNTITLED);
    }

    #[test]
    fn test_not_json_is_degraded() {
        let outcome = parse_response("not json at all", 500);
        assert!(outcome.is_degraded());

        let result = outcome.result();
        assert_eq!(result.title, DEGRADED_TITLE);
        assert!(result.structured_content.get("Error").is_some());
        assert_eq!(
            result.structured_content.get("RawOutput").unwrap(),
            ["not json at all"]
        );
        assert_eq!(result.uncertainties, vec![PARSE_FAILURE]);
    }

    #[test]
    fn test_missing_or_mistyped_fields_are_degraded() {
        let cases = [
            r#"{"structuredContent": {}}"#,
            r#"{"title": 3, "structuredContent": {}}"#,
            r#"{"title": "T"}"#,
            r#"{"title": "T", "structuredContent": null}"#,
            r#"{"title": "T", "structuredContent": ["a"]}"#,
            r#"["title", "structuredContent"]"#,
        ];
        for raw in cases {
            let outcome = parse_response(raw, 500);
            assert!(outcome.is_degraded(), "expected degraded for {}", raw);
        }
    }

    #[test]
    fn test_raw_excerpt_is_capped() {
        let raw = "é".repeat(800);
        let outcome = parse_response(&raw, 500);
        let excerpt = &outcome.result().structured_content.get("RawOutput").unwrap()[0];
        assert_eq!(excerpt.chars().count(), 500);
    }

    #[test]
    fn test_non_string_uncertainties_are_kept_as_text() {
        let raw = r#"{"title": "T", "structuredContent": {}, "uncertainties": ["a", 2, null, ""]}"#;
        let result = parse_response(raw, 500).into_result();
        assert_eq!(result.uncertainties, vec!["a", "2"]);
    }

    #[test]
    fn test_section_order_follows_model_output() {
        let raw = r#"{"title": "T", "structuredContent": {"Zeta": ["a"], "Alpha": ["b"], "Mid": []}}"#;
        let result = parse_response(raw, 500).into_result();
        let headings: Vec<&str> = result.structured_content.headings().collect();
        assert_eq!(headings, vec!["Zeta", "Alpha", "Mid"]);
    }
}
