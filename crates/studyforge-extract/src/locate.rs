//! Section locator — resolves a structure node to a text span plus a
//! confidence grade.
//!
//! Structure detection upstream is imperfect: titles may be paraphrased,
//! page hints may be off by front-matter offsets, or missing entirely. The
//! ladder here tries page ranges, then title matching in four passes, then a
//! proportional slice, so the caller always receives *some* text with a
//! machine-readable confidence instead of a hard failure.

use studyforge_core::{Confidence, DocumentText, ExtractionResult, StructureNode};
use tracing::debug;

use crate::normalize::{normalize, NormalizedText};

/// Minimum span length for the page and title strategies to accept.
const MIN_SPAN_CHARS: usize = 100;
/// Minimum span length for the proportional fallback to report Medium.
const MIN_PROPORTIONAL_CHARS: usize = 50;

/// Locate the text span for `target_id` within `doc`.
///
/// `cached` is the document-wide normalized text; when `None` it is built
/// locally (callers doing many lookups should precompute and share it).
/// Never fails: when every strategy is exhausted the result is an empty
/// span at Low confidence.
pub fn locate(
    doc: &DocumentText,
    nodes: &[StructureNode],
    target_id: i64,
    cached: Option<&NormalizedText>,
) -> ExtractionResult {
    let Some(node_idx) = nodes.iter().position(|n| n.id == target_id) else {
        return ExtractionResult::empty();
    };

    if let Some(result) = locate_by_pages(doc, nodes, node_idx) {
        return result;
    }

    let owned;
    let norm = match cached {
        Some(n) => n,
        None => {
            owned = NormalizedText::build(&doc.full_text);
            &owned
        }
    };

    if let Some(result) = locate_by_title(doc, nodes, node_idx, norm) {
        return result;
    }

    if let Some(result) = locate_proportional(doc, nodes, node_idx) {
        return result;
    }

    debug!(
        "locator exhausted for node {} ({:?})",
        target_id, nodes[node_idx].title
    );
    ExtractionResult::empty()
}

/// Strategy 1: explicit page range.
///
/// Indices are 0-based into `doc.pages`; the end bound is exclusive, so a
/// `page_end` of 20 includes page 20. Accepts only spans of at least
/// `MIN_SPAN_CHARS`, reporting High.
fn locate_by_pages(
    doc: &DocumentText,
    nodes: &[StructureNode],
    node_idx: usize,
) -> Option<ExtractionResult> {
    let node = &nodes[node_idx];
    let page_start = node.page_start? as usize;
    if page_start == 0 || page_start > doc.pages.len() {
        return None;
    }
    let start = page_start - 1;

    let mut end = match node.page_end {
        Some(e) => e as usize,
        None => match next_boundary_node(nodes, node_idx).and_then(|n| n.page_start) {
            Some(sib_start) => (sib_start as usize).saturating_sub(1),
            None => page_start + 20,
        },
    };
    if end <= start {
        end = start + 5;
    }
    end = end.min(doc.pages.len());

    let text = join_pages(&doc.pages[start..end]);
    if text.trim().len() >= MIN_SPAN_CHARS {
        Some(ExtractionResult {
            text: text.trim().to_string(),
            confidence: Confidence::High,
        })
    } else {
        None
    }
}

/// Strategy 2: title matching over the full text.
///
/// The span starts where the title is found; it ends at the next
/// same-or-higher-level node's title searched only in the remainder, or at
/// end of text. Exact and case-insensitive hits report Medium; the
/// normalized and keyword passes report Low.
fn locate_by_title(
    doc: &DocumentText,
    nodes: &[StructureNode],
    node_idx: usize,
    norm: &NormalizedText,
) -> Option<ExtractionResult> {
    let node = &nodes[node_idx];
    let full = &doc.full_text;
    let (start, confidence) = find_title_offset(full, norm, &node.title)?;

    // Search for the boundary only past the current title so a repeated
    // TOC occurrence of the next title cannot truncate the span.
    let after_title = clamp_boundary(full, (start + node.title.len()).min(full.len()));
    let mut end = full.len();
    if let Some(next) = next_boundary_node(nodes, node_idx) {
        let remainder = &full[after_title..];
        let remainder_norm = NormalizedText::build(remainder);
        if let Some((next_off, _)) = find_title_offset(remainder, &remainder_norm, &next.title) {
            end = after_title + next_off;
        }
    }

    let text = full[start..end].trim();
    if text.len() >= MIN_SPAN_CHARS {
        Some(ExtractionResult {
            text: text.to_string(),
            confidence,
        })
    } else {
        None
    }
}

/// Strategy 3: proportional distribution over level-≤2 nodes.
///
/// With this node at ordinal `k` of `N`, slice pages
/// `[floor(k·P/N), ceil((k+1)·P/N))`. Medium at ≥50 chars, Low below that,
/// nothing when the slice is blank.
fn locate_proportional(
    doc: &DocumentText,
    nodes: &[StructureNode],
    node_idx: usize,
) -> Option<ExtractionResult> {
    let target_id = nodes[node_idx].id;
    let ordered: Vec<&StructureNode> = nodes.iter().filter(|n| n.level <= 2).collect();
    let k = ordered.iter().position(|n| n.id == target_id)?;
    let n = ordered.len();
    let p = doc.pages.len();
    if n == 0 || p == 0 {
        return None;
    }

    let start = k * p / n;
    let end = ((k + 1) * p).div_ceil(n).min(p);
    if start >= end {
        return None;
    }

    let text = join_pages(&doc.pages[start..end]);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let confidence = if trimmed.len() >= MIN_PROPORTIONAL_CHARS {
        Confidence::Medium
    } else {
        Confidence::Low
    };
    debug!(
        "proportional fallback for node {}: pages {}..{} ({})",
        target_id,
        start + 1,
        end,
        confidence
    );
    Some(ExtractionResult {
        text: trimmed.to_string(),
        confidence,
    })
}

/// Find the byte offset of a title in `full`, trying exact, then
/// case-insensitive, then normalized (with the offset mapped back through
/// the reverse map), then a keyword line match.
fn find_title_offset(
    full: &str,
    norm: &NormalizedText,
    title: &str,
) -> Option<(usize, Confidence)> {
    // (a) exact substring
    if let Some(idx) = full.find(title) {
        return Some((idx, Confidence::Medium));
    }

    // (b) case-insensitive, lowercased char-by-char with a per-byte map
    // back to the original. Lowercasing can change byte lengths (İ grows
    // a combining mark), so a plain offset into to_lowercase() can drift.
    let lower_title = title.to_lowercase();
    if !lower_title.is_empty() {
        let mut lower_full = String::with_capacity(full.len());
        let mut origins = Vec::with_capacity(full.len());
        for (byte_idx, c) in full.char_indices() {
            for lc in c.to_lowercase() {
                for _ in 0..lc.len_utf8() {
                    origins.push(byte_idx);
                }
                lower_full.push(lc);
            }
        }
        if let Some(idx) = lower_full.find(&lower_title) {
            return Some((origins[idx], Confidence::Medium));
        }
    }

    // (c) normalized
    let norm_title = normalize(title);
    if !norm_title.is_empty() {
        if let Some(norm_idx) = norm.text.find(&norm_title) {
            if let Some(orig_idx) = norm.original_offset(norm_idx) {
                return Some((orig_idx, Confidence::Low));
            }
        }
    }

    // (d) keyword line match: a line containing most of the title's
    // significant words.
    let keywords: Vec<&str> = norm_title.split(' ').filter(|w| w.len() > 3).collect();
    if keywords.len() >= 2 {
        let mut best_score = 0.0f64;
        let mut best_offset = None;
        let mut offset = 0usize;
        for line in full.split('\n') {
            let norm_line = normalize(line);
            let matched = keywords.iter().filter(|kw| norm_line.contains(**kw)).count();
            let score = matched as f64 / keywords.len() as f64;
            if score > best_score && score >= 0.6 {
                best_score = score;
                best_offset = Some(offset);
            }
            offset += line.len() + 1;
        }
        if let Some(idx) = best_offset {
            return Some((idx, Confidence::Low));
        }
    }

    None
}

/// The next node at the same or a higher level, i.e. this node's nominal
/// end boundary.
fn next_boundary_node(nodes: &[StructureNode], node_idx: usize) -> Option<&StructureNode> {
    let level = nodes[node_idx].level;
    nodes[node_idx + 1..].iter().find(|n| n.level <= level)
}

fn join_pages(pages: &[studyforge_core::Page]) -> String {
    pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Largest char boundary at or below `idx`.
fn clamp_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
