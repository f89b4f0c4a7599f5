//! Instruction prompt sent to the generation backend.
//!
//! The prompt is a pure function of the extracted text. The text is wrapped
//! in explicit markers so the model (and the demo backend) can find it.

const TEXT_START: &str = "<<<OCR_TEXT";
const TEXT_END: &str = "OCR_TEXT>>>";

const INSTRUCTIONS: &str = "\
You are given text extracted from a photograph by optical character recognition (OCR). \
OCR output is error-prone: characters may be misread, merged or dropped.

Tasks:
1. Correct common OCR character confusions where the intended word is clear \
(for example 0/O, 1/l/I, 5/S, 8/B, rn/m, vv/w).
2. Organize the content into a concise, well-structured note.
3. Record every correction you were unsure about, and every ambiguous value, as an uncertainty.

Respond with a single JSON object and nothing else. The object must have exactly these three fields:
- \"title\": a short string naming the note
- \"structuredContent\": an object mapping each section name to an ordered array of bullet strings
- \"uncertainties\": an array of strings, empty if there are none

Do not include any text, explanation or markdown before or after the JSON object.";

/// Build the prompt for `text`.
pub fn build_prompt(text: &str) -> String {
    format!("{INSTRUCTIONS}\n\n{TEXT_START}\n{text}\n{TEXT_END}\n\nJSON:")
}

/// Recover the extracted text embedded by [`build_prompt`].
pub fn extract_source(prompt: &str) -> Option<&str> {
    let start = prompt.find(TEXT_START)? + TEXT_START.len();
    let end = prompt.rfind(TEXT_END)?;
    if end < start {
        return None;
    }
    let body = &prompt[start..end];
    let body = body.strip_prefix('\n').unwrap_or(body);
    Some(body.strip_suffix('\n').unwrap_or(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_is_deterministic() {
        assert_eq!(build_prompt("abc"), build_prompt("abc"));
        assert_ne!(build_prompt("abc"), build_prompt("abd"));
    }

    #[test]
    fn test_prompt_states_contract() {
        let prompt = build_prompt("hello");
        assert!(prompt.contains("optical character recognition"));
        assert!(prompt.contains("character confusions"));
        assert!(prompt.contains("\"title\""));
        assert!(prompt.contains("\"structuredContent\""));
        assert!(prompt.contains("\"uncertainties\""));
        assert!(prompt.contains("single JSON object"));
        assert!(prompt.contains("Do not include any text"));
    }

    #[test]
    fn test_extract_source_round_trip() {
        let text = "Meeting Notes - Q3 Planning\n\n1. Revenue targets: $2.5M";
        assert_eq!(extract_source(&build_prompt(text)), Some(text));
    }

    #[test]
    fn test_extract_source_empty_and_trailing_newline() {
        assert_eq!(extract_source(&build_prompt("")), Some(""));
        assert_eq!(extract_source(&build_prompt("a\n")), Some("a\n"));
    }

    #[test]
    fn test_extract_source_without_markers() {
        assert_eq!(extract_source("plain prompt"), None);
    }
}
