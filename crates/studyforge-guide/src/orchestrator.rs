//! The sequential generation loop.
//!
//! One streaming call per located section, strictly in document order.
//! Per-node failures are absorbed and logged; only cancellation ends a run
//! early. Accepted topics are persisted immediately, so a cancelled run
//! resumes later with a skip set instead of starting over.

use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use studyforge_core::{
    CancelToken, DocumentOutline, DocumentText, Error, Phase, Result, RunReport, StructureNode,
    Topic,
};
use studyforge_extract::{chunk_text, locate, normalize, NormalizedText};
use studyforge_llm::{GenerationRequest, PromptVersion, StreamOutcome};
use studyforge_store::TopicStore;

use crate::generator::SectionGenerator;
use crate::parse::parse_guide;
use crate::prompts::build_study_guide_prompt;

/// Structural front/back-matter titles that never get a study guide.
/// Matched by substring against the normalized (lowercased, unaccented)
/// section title, so "Índice analítico" and "Appendix B" both hit.
const STRUCTURAL_TITLES: &[&str] = &[
    "indice",
    "tabla de contenidos",
    "bibliografia",
    "referencias",
    "apendice",
    "anexo",
    "glosario",
    "agradecimientos",
    "creditos",
    "lista de figuras",
    "lista de tablas",
    "index",
    "table of contents",
    "bibliography",
    "references",
    "appendix",
    "glossary",
    "acknowledgments",
    "copyright",
    "list of figures",
    "list of tables",
];

/// A dot/leader run followed by a short page number at end of line.
static TOC_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.…·]{3,}\s*\d{1,3}\s*$").unwrap());

fn title_is_structural(title: &str) -> bool {
    let norm = normalize(title);
    STRUCTURAL_TITLES.iter().any(|p| norm.contains(p))
}

/// True when index-style leader lines dominate the text. A locator miss
/// can land on the table of contents itself; such text reads like a list
/// of page numbers and produces useless guides.
fn looks_like_toc(text: &str) -> bool {
    let mut total = 0usize;
    let mut leader = 0usize;
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        total += 1;
        if TOC_LINE.is_match(line) {
            leader += 1;
        }
    }
    total > 0 && leader * 10 > total * 3
}

/// Tunables for one generation run.
#[derive(Debug, Clone)]
pub struct GuideConfig {
    /// Located spans shorter than this are treated as locator misses.
    pub min_section_chars: usize,
    /// Token budget for the section text sent with each prompt.
    pub chunk_token_budget: usize,
    /// Output token budget requested per generation call.
    pub max_output_tokens: usize,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            min_section_chars: 150,
            chunk_token_budget: 6000,
            max_output_tokens: 4096,
        }
    }
}

/// Run notifications, delivered best-effort over an optional channel.
#[derive(Debug, Clone)]
pub enum GuideEvent {
    /// About to process `section`; `current` nodes already handled of `total`.
    Progress {
        current: usize,
        total: usize,
        section: String,
    },
    /// A topic was persisted.
    TopicReady { id: i64 },
    Finished { completed: bool, total: usize },
}

fn emit(events: Option<&UnboundedSender<GuideEvent>>, event: GuideEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

enum Attempt {
    Persisted(Topic),
    Rejected(String),
    Cancelled,
}

/// Drives study-guide generation for a document: filter the outline,
/// locate each section, call the generator, parse, persist.
pub struct GuideOrchestrator {
    store: Arc<TopicStore>,
    generator: Arc<dyn SectionGenerator>,
    config: GuideConfig,
    phase: RwLock<Phase>,
}

impl GuideOrchestrator {
    pub fn new(store: Arc<TopicStore>, generator: Arc<dyn SectionGenerator>) -> Self {
        Self {
            store,
            generator,
            config: GuideConfig::default(),
            phase: RwLock::new(Phase::Idle),
        }
    }

    pub fn with_config(mut self, config: GuideConfig) -> Self {
        self.config = config;
        self
    }

    pub fn phase(&self) -> Phase {
        *self.phase.read()
    }

    /// Mark the upstream structure-detection step as in flight.
    pub fn mark_analyzing(&self) {
        *self.phase.write() = Phase::Analyzing;
    }

    /// Run generation over every content section of the outline.
    ///
    /// Ids in `skip` fast-forward without a network call (resume mode).
    /// Ends in phase `Ready` with `completed=true` only when the loop ran
    /// out of sections without a cancellation.
    pub async fn run(
        &self,
        doc_id: &str,
        doc: &DocumentText,
        outline: &DocumentOutline,
        skip: &HashSet<i64>,
        cancel: &CancelToken,
        events: Option<&UnboundedSender<GuideEvent>>,
    ) -> Result<RunReport> {
        *self.phase.write() = Phase::Generating;

        let sections: Vec<&StructureNode> = outline
            .sections
            .iter()
            .filter(|s| s.level <= 2 && !title_is_structural(&s.title))
            .collect();
        let total = sections.len();
        let all_titles: Vec<String> = sections.iter().map(|s| s.title.clone()).collect();

        // Shared across every locator call in the run.
        let norm = NormalizedText::build(&doc.full_text);

        let mut generated = 0usize;
        let mut cancelled = false;

        for (i, section) in sections.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            emit(
                events,
                GuideEvent::Progress {
                    current: i,
                    total,
                    section: section.title.clone(),
                },
            );

            if skip.contains(&section.id) {
                debug!(id = section.id, "topic already persisted, skipping");
                continue;
            }

            match self
                .attempt_section(doc_id, doc, outline, section, &all_titles, &norm, cancel)
                .await
            {
                Attempt::Persisted(topic) => {
                    generated += 1;
                    emit(events, GuideEvent::TopicReady { id: topic.id });
                }
                Attempt::Rejected(reason) => {
                    warn!(id = section.id, title = %section.title, %reason, "section skipped");
                }
                Attempt::Cancelled => {
                    cancelled = true;
                    break;
                }
            }

            if i + 1 < total && !cancel.is_cancelled() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.generator.inter_request_delay()) => {}
                }
            }
        }

        let completed = !cancelled;
        *self.phase.write() = if completed { Phase::Ready } else { Phase::Stopped };
        emit(events, GuideEvent::Finished { completed, total });
        info!(completed, total, generated, "generation run finished");

        Ok(RunReport {
            completed,
            total,
            generated,
        })
    }

    /// Regenerate a single section, overwriting its stored topic.
    ///
    /// Unlike `run`, a rejection here surfaces as an error so the caller
    /// can show why nothing was regenerated. `Ok(None)` means cancelled.
    pub async fn regenerate_section(
        &self,
        doc_id: &str,
        doc: &DocumentText,
        outline: &DocumentOutline,
        section_id: i64,
        cancel: &CancelToken,
    ) -> Result<Option<Topic>> {
        let Some(section) = outline.sections.iter().find(|s| s.id == section_id) else {
            return Err(Error::NotFound(format!("section {section_id}")));
        };

        let all_titles: Vec<String> = outline
            .sections
            .iter()
            .filter(|s| s.level <= 2)
            .map(|s| s.title.clone())
            .collect();
        let norm = NormalizedText::build(&doc.full_text);

        match self
            .attempt_section(doc_id, doc, outline, section, &all_titles, &norm, cancel)
            .await
        {
            Attempt::Persisted(topic) => Ok(Some(topic)),
            Attempt::Rejected(reason) => Err(Error::Analysis(reason)),
            Attempt::Cancelled => Ok(None),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn attempt_section(
        &self,
        doc_id: &str,
        doc: &DocumentText,
        outline: &DocumentOutline,
        section: &StructureNode,
        all_titles: &[String],
        norm: &NormalizedText,
        cancel: &CancelToken,
    ) -> Attempt {
        let located = locate(doc, &outline.sections, section.id, Some(norm));
        if located.text.len() < self.config.min_section_chars {
            return Attempt::Rejected(format!("located only {} chars", located.text.len()));
        }
        if looks_like_toc(&located.text) {
            return Attempt::Rejected("text dominated by index-like lines".into());
        }

        let chunks = chunk_text(&located.text, self.config.chunk_token_budget);
        let truncated = chunks.len() > 1;
        let prompt = build_study_guide_prompt(
            &section.title,
            &chunks[0],
            &outline.title,
            all_titles,
            truncated,
        );

        let request = GenerationRequest {
            prompt,
            prompt_version: PromptVersion::StudyGuide,
            max_tokens: self.config.max_output_tokens,
            model: None,
        };

        let reply = match self.generator.generate(request, cancel).await {
            Ok(StreamOutcome::Completed(text)) => text,
            Ok(StreamOutcome::Cancelled) => return Attempt::Cancelled,
            Err(err) => return Attempt::Rejected(err.to_string()),
        };

        let guide = match parse_guide(&reply) {
            Ok(guide) => guide,
            Err(err) => return Attempt::Rejected(err.to_string()),
        };
        if guide.insufficient_text {
            return Attempt::Rejected("model reported insufficient text".into());
        }
        if guide.summary.trim().is_empty() {
            return Attempt::Rejected("empty summary".into());
        }

        let topic = Topic {
            id: section.id,
            section_title: section.title.clone(),
            level: section.level,
            relevance: guide.relevance,
            summary: guide.summary,
            key_concepts: guide.key_concepts,
            expanded_explanation: guide.expanded_explanation,
            connections: guide.connections,
            quiz: guide.quiz,
            confidence: located.confidence,
        };
        if let Err(err) = self.store.save_topic(doc_id, &topic) {
            return Attempt::Rejected(format!("persist failed: {err}"));
        }
        Attempt::Persisted(topic)
    }
}
