//! Offline generation backend used in demo mode.
//!
//! Structures the extracted text embedded in the prompt with simple keyword
//! rules and answers in the same JSON shape a real model is asked for, so the
//! whole pipeline (parsing included) runs without a model server.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use snapnote_core::types::Sections;
use tracing::debug;

use crate::backend::{GeneratedText, GenerationBackend, GenerationModel, GenerationOptions};
use crate::error::GenerationError;
use crate::parse::UNTITLED;
use crate::prompt::extract_source;

const FALLBACK_SECTION: &str = "Notes";

/// Section keyword rules, checked in order. First match wins.
const SECTION_RULES: &[(&str, &[&str])] = &[
    (
        "Financial Goals",
        &["revenue", "budget", "cost", "financ", "sales", "profit", "$"],
    ),
    (
        "Product Development",
        &["product", "launch", "feature", "release", "roadmap"],
    ),
    (
        "Team Growth",
        &["hiring", "hire", "engineer", "designer", "headcount", "team"],
    ),
    (
        "Customer Success Initiatives",
        &["customer", "retention", "onboarding", "support", "loyalty"],
    ),
    (
        "Key Performance Indicators",
        &["metric", "kpi", "conversion", "churn", "nps", "rate"],
    ),
    (
        "Follow-up",
        &["meeting", "follow", "next", "deadline", "due"],
    ),
];

static LIST_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+[.)]|[-*•])\s*").expect("Invalid list marker regex"));

#[derive(Debug, Clone, Default)]
pub struct DemoGenerationBackend {
    latency: Duration,
}

impl DemoGenerationBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl GenerationBackend for DemoGenerationBackend {
    fn name(&self) -> &str {
        "demo"
    }

    async fn load(&self) -> Result<Arc<dyn GenerationModel>, GenerationError> {
        Ok(Arc::new(DemoModel {
            latency: self.latency,
        }))
    }
}

struct DemoModel {
    latency: Duration,
}

#[async_trait]
impl GenerationModel for DemoModel {
    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<Vec<GeneratedText>, GenerationError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let source = extract_source(prompt)
            .ok_or_else(|| GenerationError::Backend("Prompt carries no source text".to_string()))?;
        let (title, sections) = structure(source);
        debug!(title = %title, sections = sections.len(), "Demo note structured");

        let body = json!({
            "title": title,
            "structuredContent": sections,
            "uncertainties": [],
        });
        Ok(vec![GeneratedText::new(body.to_string())])
    }
}

/// Split `text` into a title and keyword-classified sections.
///
/// The first non-empty line is the title. Each following line becomes a
/// bullet with its list marker removed. A line ending in `:` opens a group:
/// its indented children land in the group's section.
pub fn structure(text: &str) -> (String, Sections) {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());

    let title = lines
        .next()
        .map(|l| l.trim().trim_start_matches('#').trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let mut sections = Sections::new();
    let mut order: Vec<String> = Vec::new();
    let mut buckets: Vec<Vec<String>> = Vec::new();
    let mut group: Option<String> = None;

    for line in lines {
        let indented = line.starts_with(char::is_whitespace);
        let item = LIST_MARKER_RE.replace(line.trim(), "").trim().to_string();
        if item.is_empty() {
            continue;
        }

        let grouped = if indented { group.clone() } else { None };
        let section = match grouped {
            Some(heading) => heading,
            None => {
                let heading = classify(&item);
                if item.ends_with(':') {
                    group = Some(heading.to_string());
                    continue;
                }
                group = None;
                heading.to_string()
            }
        };

        match order.iter().position(|h| *h == section) {
            Some(i) => buckets[i].push(item),
            None => {
                order.push(section);
                buckets.push(vec![item]);
            }
        }
    }

    for (heading, bullets) in order.into_iter().zip(buckets) {
        sections.insert(heading, bullets);
    }
    (title, sections)
}

fn classify(item: &str) -> &'static str {
    let lower = item.to_lowercase();
    SECTION_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(heading, _)| *heading)
        .unwrap_or(FALLBACK_SECTION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse_response, GenerationOutcome};
    use crate::prompt::build_prompt;

    const Q3: &str = "Meeting Notes - Q3 Planning\n\n\
1. Revenue targets: $2.5M for Q3\n\
2. New product launch in August\n\
3. Hiring plan: 5 engineers, 2 designers\n\
4. Marketing budget increased by 15%\n\
5. Customer retention focus areas:\n   \
- Improve onboarding experience\n   \
- Enhance support response times\n\
6. Key metrics to track:\n   \
- Churn rate (target: < 2%)\n\
7. Next meeting: July 15th, 10am";

    #[test]
    fn test_structure_q3_sample() {
        let (title, sections) = structure(Q3);
        assert_eq!(title, "Meeting Notes - Q3 Planning");

        let finance = sections.get("Financial Goals").unwrap();
        assert_eq!(
            finance,
            ["Revenue targets: $2.5M for Q3", "Marketing budget increased by 15%"]
        );
        assert_eq!(
            sections.get("Product Development").unwrap(),
            ["New product launch in August"]
        );
        assert_eq!(
            sections.get("Customer Success Initiatives").unwrap(),
            ["Improve onboarding experience", "Enhance support response times"]
        );
        assert_eq!(
            sections.get("Key Performance Indicators").unwrap(),
            ["Churn rate (target: < 2%)"]
        );
        assert_eq!(
            sections.get("Follow-up").unwrap(),
            ["Next meeting: July 15th, 10am"]
        );

        let headings: Vec<&str> = sections.headings().collect();
        assert_eq!(headings[0], "Financial Goals");
    }

    #[test]
    fn test_structure_empty_text() {
        let (title, sections) = structure("");
        assert_eq!(title, UNTITLED);
        assert!(sections.is_empty());
    }

    #[test]
    fn test_structure_unmatched_lines_go_to_notes() {
        let (title, sections) = structure("# Groceries\n- eggs\n- milk");
        assert_eq!(title, "Groceries");
        assert_eq!(sections.get(FALLBACK_SECTION).unwrap(), ["eggs", "milk"]);
    }

    #[tokio::test]
    async fn test_demo_output_passes_validation() {
        let model = DemoGenerationBackend::new().load().await.unwrap();
        let out = model
            .generate(&build_prompt(Q3), &GenerationOptions::default())
            .await
            .unwrap();

        let outcome = parse_response(&out[0].generated_text, 500);
        let GenerationOutcome::Generated(result) = outcome else {
            panic!("demo output should validate");
        };
        assert_eq!(result.title, "Meeting Notes - Q3 Planning");
        assert!(result.uncertainties.is_empty());

        let (_, direct) = structure(Q3);
        let parsed: Vec<&str> = result.structured_content.headings().collect();
        let expected: Vec<&str> = direct.headings().collect();
        assert_eq!(parsed, expected);
        assert_eq!(parsed[0], "Financial Goals");
    }

    #[tokio::test]
    async fn test_demo_rejects_prompt_without_markers() {
        let model = DemoGenerationBackend::new().load().await.unwrap();
        let result = model.generate("hello", &GenerationOptions::default()).await;
        assert!(matches!(result, Err(GenerationError::Backend(_))));
    }
}
