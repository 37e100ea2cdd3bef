//! Structure analysis: sample the document down to a prompt-sized excerpt,
//! run one structure-detection call, parse the outline.

use tracing::info;

use studyforge_core::{CancelToken, DocumentOutline, DocumentText, Error, Page, Result};
use studyforge_llm::{GenerationRequest, PromptVersion, StreamOutcome};

use crate::generator::SectionGenerator;
use crate::parse::parse_outline;
use crate::prompts::build_structure_prompt;

/// Pages taken whole from the front of the document when no TOC text is
/// available. Front matter usually carries the index and chapter list.
const FIRST_PAGES: usize = 5;
/// Per-page excerpt length for interior samples.
const PAGE_SAMPLE_CHARS: usize = 500;
/// Share of the character budget reserved for TOC text when present.
const TOC_BUDGET_NUM: usize = 2;
const TOC_BUDGET_DEN: usize = 5;

fn truncate_in_place(s: &mut String, max_bytes: usize) {
    if s.len() <= max_bytes {
        return;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

fn clipped(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Build a representative text sample for the structure-detection prompt.
///
/// With TOC text, 40% of the budget goes to the index (with explicit
/// markers so the model knows what it is reading) and the rest to evenly
/// spaced page excerpts across the whole document. Without it, the first
/// five pages are taken whole and excerpts are sampled from page five on.
/// The budget is `max_tokens * 4` characters.
pub fn sampled_text(pages: &[Page], max_tokens: usize, toc_text: Option<&str>) -> String {
    let max_chars = max_tokens * 4;
    let step = (pages.len() / 20).max(1);

    if let Some(toc) = toc_text.filter(|t| !t.is_empty()) {
        let toc_budget = max_chars * TOC_BUDGET_NUM / TOC_BUDGET_DEN;
        let mut result = format!(
            "=== DOCUMENT INDEX ===\n{}\n=== END OF INDEX ===\n\n",
            clipped(toc, toc_budget)
        );

        let mut i = 0;
        while i < pages.len() {
            if result.len() >= max_chars {
                break;
            }
            result.push_str(&format!(
                "\n\n--- Page {} ---\n{}",
                pages[i].page_number,
                clipped(&pages[i].text, PAGE_SAMPLE_CHARS)
            ));
            i += step;
        }

        truncate_in_place(&mut result, max_chars);
        return result;
    }

    let mut result = pages
        .iter()
        .take(FIRST_PAGES)
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    if result.len() >= max_chars {
        truncate_in_place(&mut result, max_chars);
        return result;
    }

    let mut i = FIRST_PAGES;
    while i < pages.len() {
        if result.len() >= max_chars {
            break;
        }
        result.push_str(&format!(
            "\n\n--- Page {} ---\n{}",
            pages[i].page_number,
            clipped(&pages[i].text, PAGE_SAMPLE_CHARS)
        ));
        i += step;
    }

    truncate_in_place(&mut result, max_chars);
    result
}

/// Detect the document outline with one structure-prompt call.
///
/// `Ok(None)` means the call was cancelled. Stream errors and unparseable
/// replies surface as `Error::Analysis`.
pub async fn analyze_structure(
    generator: &dyn SectionGenerator,
    doc: &DocumentText,
    toc_text: Option<&str>,
    sample_tokens: usize,
    cancel: &CancelToken,
) -> Result<Option<DocumentOutline>> {
    let sample = sampled_text(&doc.pages, sample_tokens, toc_text);
    let prompt = build_structure_prompt(&sample, doc.total_pages());

    let request = GenerationRequest {
        prompt,
        prompt_version: PromptVersion::Structure,
        max_tokens: 4096,
        model: None,
    };

    match generator
        .generate(request, cancel)
        .await
        .map_err(|e| Error::Analysis(e.to_string()))?
    {
        StreamOutcome::Cancelled => Ok(None),
        StreamOutcome::Completed(text) => {
            let outline = parse_outline(&text)?;
            info!(sections = outline.sections.len(), "document structure detected");
            Ok(Some(outline))
        }
    }
}
