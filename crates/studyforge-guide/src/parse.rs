//! Defensive JSON extraction from free-form model text.
//!
//! Models wrap JSON in markdown fences, preface it with chatter, or trail
//! it with commentary. The pipeline is: strip fences, take the first
//! greedy `{...}` span, then parse with defaulted fields. This is span
//! extraction plus lenient decoding, not schema validation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::json;

use studyforge_core::{DocumentOutline, Error, QuizItem, Relevance, Result};

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)```(?:json)?\s*").unwrap());
static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Remove markdown code-fence markers, keeping their contents.
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").into_owned()
}

/// First greedy `{...}` span, if any.
pub fn extract_json_object(text: &str) -> Option<&str> {
    JSON_OBJECT.find(text).map(|m| m.as_str())
}

/// The study-guide object as the model returns it. Every field is
/// defaulted so a sparse reply still decodes; `expandedExplantion` is a
/// recurring model misspelling worth accepting.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GuidePayload {
    #[serde(deserialize_with = "lenient_relevance")]
    pub relevance: Relevance,
    pub summary: String,
    #[serde(rename = "keyConcepts")]
    pub key_concepts: Vec<String>,
    #[serde(rename = "expandedExplanation", alias = "expandedExplantion")]
    pub expanded_explanation: String,
    pub connections: Vec<String>,
    pub quiz: Vec<QuizItem>,
    /// Set by the model when the provided text was too thin to explain.
    #[serde(rename = "insufficientText")]
    pub insufficient_text: bool,
}

fn lenient_relevance<'de, D>(deserializer: D) -> std::result::Result<Relevance, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Parse a study-guide reply. Any extraction or decode failure is an
/// `Error::Analysis`; the caller skips the node.
pub fn parse_guide(raw: &str) -> Result<GuidePayload> {
    let cleaned = strip_code_fences(raw);
    let object = extract_json_object(&cleaned)
        .ok_or_else(|| Error::Analysis("no JSON object in model response".into()))?;
    Ok(serde_json::from_str(object)?)
}

/// Parse a structure-detection reply into an outline. Sections missing an
/// id (or carrying id 0) get sequential ids; a missing level defaults to 1.
pub fn parse_outline(raw: &str) -> Result<DocumentOutline> {
    let cleaned = strip_code_fences(raw);
    let object = extract_json_object(&cleaned)
        .ok_or_else(|| Error::Analysis("no document structure in model response".into()))?;
    let mut value: serde_json::Value = serde_json::from_str(object)?;

    if let Some(sections) = value.get_mut("sections").and_then(|s| s.as_array_mut()) {
        for (i, section) in sections.iter_mut().enumerate() {
            let missing_id = section
                .get("id")
                .and_then(|v| v.as_i64())
                .map_or(true, |id| id == 0);
            if missing_id {
                section["id"] = json!(i as i64 + 1);
            }
            if section.get("level").and_then(|v| v.as_u64()).is_none() {
                section["level"] = json!(1);
            }
        }
    }

    Ok(serde_json::from_value(value)?)
}
