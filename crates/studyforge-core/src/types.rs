//! Data model for documents, detected structure, and generated topics.
//!
//! Wire names are camelCase to match the JSON the structure-detection and
//! study-guide prompts ask the model to produce.

use serde::{Deserialize, Serialize};

/// One page of extracted PDF text. Page numbers are 1-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    #[serde(rename = "pageNumber")]
    pub page_number: u32,
    pub text: String,
}

/// The full document as seen by this core: ordered pages plus the derived
/// full-text concatenation. Read-only once built.
#[derive(Debug, Clone)]
pub struct DocumentText {
    pub pages: Vec<Page>,
    pub full_text: String,
}

impl DocumentText {
    /// Build from pages, joining page texts with a blank line.
    pub fn from_pages(pages: Vec<Page>) -> Self {
        let full_text = pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        Self { pages, full_text }
    }

    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }
}

/// One node of the detected document outline.
///
/// Sequence order in the outline is significant: the next node at the same
/// or higher level marks this node's nominal end boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureNode {
    pub id: i64,
    pub title: String,
    pub level: u8,
    #[serde(default, rename = "parentId")]
    pub parent_id: Option<i64>,
    #[serde(default, rename = "pageStart")]
    pub page_start: Option<u32>,
    #[serde(default, rename = "pageEnd")]
    pub page_end: Option<u32>,
}

/// Document outline produced by the upstream structure-detection call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentOutline {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub sections: Vec<StructureNode>,
}

/// How trustworthy a located section span is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::High => write!(f, "high"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::Low => write!(f, "low"),
        }
    }
}

/// Result of locating a section's text span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
    pub confidence: Confidence,
}

impl ExtractionResult {
    /// The "every strategy exhausted" result. Never an error.
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            confidence: Confidence::Low,
        }
    }
}

/// Model-assigned relevance of a section within the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    Core,
    Supporting,
    Detail,
}

impl Default for Relevance {
    fn default() -> Self {
        Relevance::Supporting
    }
}

/// One quiz entry in a generated study guide.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizItem {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

/// The generated study-guide artifact for one section.
///
/// Persisted immediately on successful generation; never with an empty
/// summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    #[serde(rename = "sectionTitle")]
    pub section_title: String,
    pub level: u8,
    pub relevance: Relevance,
    pub summary: String,
    #[serde(rename = "keyConcepts")]
    pub key_concepts: Vec<String>,
    #[serde(rename = "expandedExplanation")]
    pub expanded_explanation: String,
    pub connections: Vec<String>,
    pub quiz: Vec<QuizItem>,
    pub confidence: Confidence,
}

/// Terminal result of a generation run.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RunReport {
    pub completed: bool,
    pub total: usize,
    /// Topics persisted by this run (excludes skip-set fast-forwards).
    pub generated: usize,
}

/// Pipeline phase. `Analyzing` belongs to the upstream structure-detection
/// step and is included as the precondition to `Generating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Analyzing,
    Generating,
    Ready,
    Stopped,
}
