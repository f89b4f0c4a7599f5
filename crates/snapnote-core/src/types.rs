use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

// =============================================================================
// Identity
// =============================================================================

/// Opaque, immutable note identifier.
///
/// Freshly generated ids are UUIDv4 strings, but any string is accepted so
/// that lookups with foreign ids simply miss instead of failing to parse.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Generate a new random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// =============================================================================
// Structured content
// =============================================================================

/// Ordered mapping from section heading to bullet lines.
///
/// Serializes as a JSON object whose keys keep insertion order. Inserting an
/// existing heading replaces its bullets in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sections(Vec<(String, Vec<String>)>);

impl Sections {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert or replace the bullets for `heading`.
    pub fn insert(&mut self, heading: impl Into<String>, bullets: Vec<String>) {
        let heading = heading.into();
        match self.0.iter_mut().find(|(h, _)| *h == heading) {
            Some(entry) => entry.1 = bullets,
            None => self.0.push((heading, bullets)),
        }
    }

    pub fn get(&self, heading: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(h, _)| h == heading)
            .map(|(_, bullets)| bullets.as_slice())
    }

    pub fn headings(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(h, _)| h.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(h, b)| (h.as_str(), b.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render as `## Heading` blocks followed by `- bullet` lines.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (heading, bullets) in self.iter() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("## ");
            out.push_str(heading);
            out.push('\n');
            for bullet in bullets {
                out.push_str("- ");
                out.push_str(bullet);
                out.push('\n');
            }
        }
        out
    }
}

impl FromIterator<(String, Vec<String>)> for Sections {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        let mut sections = Sections::new();
        for (heading, bullets) in iter {
            sections.insert(heading, bullets);
        }
        sections
    }
}

impl Serialize for Sections {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (heading, bullets) in &self.0 {
            map.serialize_entry(heading, bullets)?;
        }
        map.end()
    }
}

/// Accepted shapes for a section's value. Model output is not always a
/// clean list of strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum BulletsRepr {
    One(String),
    Many(Vec<serde_json::Value>),
    Other(serde_json::Value),
}

impl BulletsRepr {
    fn into_bullets(self) -> Vec<String> {
        match self {
            BulletsRepr::One(line) => vec![line],
            BulletsRepr::Many(items) => items.into_iter().filter_map(scalar_to_line).collect(),
            BulletsRepr::Other(value) => scalar_to_line(value).into_iter().collect(),
        }
    }
}

fn scalar_to_line(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

struct SectionsVisitor;

impl<'de> Visitor<'de> for SectionsVisitor {
    type Value = Sections;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of section headings to bullet lists")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Sections, A::Error> {
        let mut sections = Sections::new();
        while let Some((heading, bullets)) = access.next_entry::<String, BulletsRepr>()? {
            sections.insert(heading, bullets.into_bullets());
        }
        Ok(sections)
    }
}

impl<'de> Deserialize<'de> for Sections {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SectionsVisitor)
    }
}

// =============================================================================
// Notes
// =============================================================================

/// The authoritative body of a note: free-form text or structured sections.
///
/// Flattened into [`Note`], so a persisted record carries either a `content`
/// key or a `structuredContent` key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoteBody {
    Content(String),
    StructuredContent(Sections),
}

impl NoteBody {
    /// Render the body as a markdown-like document.
    pub fn render(&self) -> String {
        match self {
            NoteBody::Content(text) => text.clone(),
            NoteBody::StructuredContent(sections) => sections.render(),
        }
    }
}

/// A persisted note.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    #[serde(flatten)]
    pub body: NoteBody,
    /// Creation time; persisted as epoch milliseconds.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncertainties: Vec<String>,
}

impl Note {
    /// Render the full note, title included.
    pub fn render(&self) -> String {
        let body = self.body.render();
        if body.trim_start().starts_with("# ") {
            body
        } else {
            format!("# {}\n\n{}", self.title, body)
        }
    }
}

/// Truncate to the millisecond precision notes are persisted with, so a
/// note held in memory equals the same note read back from disk.
pub fn stored_precision(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp.trunc_subsecs(3)
}

/// Everything needed to create a note except its id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewNote {
    pub title: String,
    pub body: NoteBody,
    pub timestamp: DateTime<Utc>,
    pub source_text: Option<String>,
    pub source_image_url: Option<String>,
    pub uncertainties: Vec<String>,
}

impl NewNote {
    pub fn into_note(self, id: NoteId) -> Note {
        Note {
            id,
            title: self.title,
            body: self.body,
            timestamp: stored_precision(self.timestamp),
            source_text: self.source_text,
            source_image_url: self.source_image_url,
            uncertainties: self.uncertainties,
        }
    }
}

/// Partial update merged into an existing note. `None` leaves a field as is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub body: Option<NoteBody>,
    pub timestamp: Option<DateTime<Utc>>,
    pub source_text: Option<String>,
    pub source_image_url: Option<String>,
    pub uncertainties: Option<Vec<String>>,
}

impl NoteUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn apply(self, note: &mut Note) {
        if let Some(title) = self.title {
            note.title = title;
        }
        if let Some(body) = self.body {
            note.body = body;
        }
        if let Some(timestamp) = self.timestamp {
            note.timestamp = stored_precision(timestamp);
        }
        if let Some(source_text) = self.source_text {
            note.source_text = Some(source_text);
        }
        if let Some(url) = self.source_image_url {
            note.source_image_url = Some(url);
        }
        if let Some(uncertainties) = self.uncertainties {
            note.uncertainties = uncertainties;
        }
    }
}

/// Unsaved candidate note held by the pipeline while the user decides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoteDraft {
    pub title: String,
    pub body: NoteBody,
    pub source_text: Option<String>,
    pub source_image_url: Option<String>,
    pub uncertainties: Vec<String>,
}

impl NoteDraft {
    pub fn from_generation(
        result: GenerationResult,
        source_text: String,
        source_image_url: Option<String>,
    ) -> Self {
        Self {
            title: result.title,
            body: NoteBody::StructuredContent(result.structured_content),
            source_text: Some(source_text),
            source_image_url,
            uncertainties: result.uncertainties,
        }
    }

    /// Stamp the draft with its creation time, ready for the store.
    pub fn into_new_note(self, timestamp: DateTime<Utc>) -> NewNote {
        NewNote {
            title: self.title,
            body: self.body,
            timestamp,
            source_text: self.source_text,
            source_image_url: self.source_image_url,
            uncertainties: self.uncertainties,
        }
    }
}

// =============================================================================
// Pipeline payloads
// =============================================================================

/// Output of the text-extraction step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
    /// Provider confidence in `[0, 1]`, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// Structured output of the generation step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub title: String,
    pub structured_content: Sections,
    #[serde(default)]
    pub uncertainties: Vec<String>,
}
