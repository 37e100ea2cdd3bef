//! TOC region detection.
//!
//! Scans every page, scores it for "table-of-contents-ness" from three
//! signals (index keywords in the header, dot-leader lines, short lines
//! ending in a page number), then groups contiguous candidates into typed
//! regions. Keyword lists are bilingual because the corpus is largely
//! Spanish-language textbooks with occasional English front matter.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use studyforge_core::Page;

use crate::normalize::normalize;

/// Keywords that mark an analytical/subject index. Checked before the
/// general list — analytical wins when both could match.
const ANALYTICAL_KEYWORDS: &[&str] = &[
    "indice analitico",
    "indice tematico",
    "indice de materias",
    "analytical index",
];

const GENERAL_KEYWORDS: &[&str] = &[
    "indice general",
    "indice de contenidos",
    "tabla de contenidos",
    "table of contents",
    "contenido",
    "contents",
    "sumario",
    "indice",
];

/// Dot-leader line: three or more dot/ellipsis/middle-dot chars then a page
/// number, e.g. "Capítulo 1 ........... 15".
static DOT_LEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)[.…·]{3,}\s*\d{1,4}\s*$").unwrap());

/// Short line ending in a bare page number (TOC without leaders).
static SHORT_NUMBERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^.{10,100}\s\d{1,4}\s*$").unwrap());

/// Pages scoring at least this are TOC candidates.
const CANDIDATE_SCORE: u32 = 30;
/// Candidates within this many pages of each other merge into one region.
const MAX_REGION_GAP: u32 = 3;
/// Header window inspected for index keywords.
const HEADER_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Analytical,
    General,
    Unknown,
}

impl RegionKind {
    fn priority(self) -> u8 {
        match self {
            RegionKind::Analytical => 0,
            RegionKind::General => 1,
            RegionKind::Unknown => 2,
        }
    }
}

/// A TOC candidate page with its score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPage {
    #[serde(rename = "pageNumber")]
    pub page_number: u32,
    pub text: String,
    pub score: u32,
}

/// A contiguous run of TOC candidate pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TocRegion {
    #[serde(rename = "type")]
    pub kind: RegionKind,
    #[serde(rename = "startPage")]
    pub start_page: u32,
    #[serde(rename = "endPage")]
    pub end_page: u32,
    pub pages: Vec<ScoredPage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TocDetection {
    #[serde(rename = "hasTOC")]
    pub has_toc: bool,
    pub regions: Vec<TocRegion>,
}

/// Score one page. Returns (score, kind-from-keyword).
fn score_page(text: &str) -> (u32, RegionKind) {
    let line_count = text.lines().filter(|l| !l.trim().is_empty()).count();
    if line_count == 0 {
        return (0, RegionKind::Unknown);
    }

    let mut score = 0u32;
    let mut kind = RegionKind::Unknown;

    // Signal 1: index keyword in the header, diacritic-insensitive.
    let header: String = text.chars().take(HEADER_CHARS).collect();
    let header = normalize(&header);
    if ANALYTICAL_KEYWORDS.iter().any(|kw| header.contains(kw)) {
        score += 30;
        kind = RegionKind::Analytical;
    } else if GENERAL_KEYWORDS.iter().any(|kw| header.contains(kw)) {
        score += 30;
        kind = RegionKind::General;
    }

    // Signal 2: dot-leader lines.
    let leader_ratio = DOT_LEADER.find_iter(text).count() as f64 / line_count as f64;
    if leader_ratio > 0.3 {
        score += 40;
    } else if leader_ratio > 0.15 {
        score += 20;
    }

    // Signal 3: short lines ending in a bare number.
    let numbered_ratio = SHORT_NUMBERED.find_iter(text).count() as f64 / line_count as f64;
    if numbered_ratio > 0.25 {
        score += 20;
    } else if numbered_ratio > 0.12 {
        score += 10;
    }

    (score, kind)
}

/// Scan all pages and group TOC candidates into regions.
pub fn detect_toc(pages: &[Page]) -> TocDetection {
    let mut candidates: Vec<(ScoredPage, RegionKind)> = Vec::new();
    for page in pages {
        let (score, kind) = score_page(&page.text);
        if score >= CANDIDATE_SCORE {
            debug!(
                "TOC candidate: page {} score {} kind {:?}",
                page.page_number, score, kind
            );
            candidates.push((
                ScoredPage {
                    page_number: page.page_number,
                    text: page.text.clone(),
                    score,
                },
                kind,
            ));
        }
    }

    if candidates.is_empty() {
        debug!("no TOC pages detected");
        return TocDetection {
            has_toc: false,
            regions: Vec::new(),
        };
    }

    let mut regions: Vec<TocRegion> = Vec::new();
    let mut current_pages = vec![candidates[0].0.clone()];
    let mut current_kind = candidates[0].1;

    for (page, kind) in candidates.into_iter().skip(1) {
        let prev = current_pages.last().map(|p| p.page_number).unwrap_or(0);
        let gap = page.page_number.saturating_sub(prev);
        let compatible = kind == current_kind
            || kind == RegionKind::Unknown
            || current_kind == RegionKind::Unknown;

        if gap <= MAX_REGION_GAP && compatible {
            if current_kind == RegionKind::Unknown && kind != RegionKind::Unknown {
                current_kind = kind;
            }
            current_pages.push(page);
        } else {
            regions.push(close_region(current_kind, std::mem::take(&mut current_pages)));
            current_pages.push(page);
            current_kind = kind;
        }
    }
    regions.push(close_region(current_kind, current_pages));

    info!(
        "TOC detected: {} region(s): {}",
        regions.len(),
        regions
            .iter()
            .map(|r| format!("{:?} (pages {}-{})", r.kind, r.start_page, r.end_page))
            .collect::<Vec<_>>()
            .join(", ")
    );

    TocDetection {
        has_toc: true,
        regions,
    }
}

fn close_region(kind: RegionKind, pages: Vec<ScoredPage>) -> TocRegion {
    let start_page = pages.first().map(|p| p.page_number).unwrap_or(0);
    let end_page = pages.last().map(|p| p.page_number).unwrap_or(0);
    TocRegion {
        kind,
        start_page,
        end_page,
        pages,
    }
}

/// Combined region text for downstream prompting, up to `max_chars`.
/// Analytical regions are taken before general ones, then unknown.
pub fn extract_toc_text(detection: &TocDetection, max_chars: usize) -> String {
    if !detection.has_toc || detection.regions.is_empty() {
        return String::new();
    }

    let mut sorted: Vec<&TocRegion> = detection.regions.iter().collect();
    sorted.sort_by_key(|r| r.kind.priority());

    let mut result = String::new();
    'outer: for region in sorted {
        for page in &region.pages {
            if result.len() >= max_chars {
                break 'outer;
            }
            if !result.is_empty() {
                result.push_str("\n\n");
            }
            result.push_str(&page.text);
        }
    }

    if result.len() > max_chars {
        let mut cut = max_chars;
        while cut > 0 && !result.is_char_boundary(cut) {
            cut -= 1;
        }
        result.truncate(cut);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: u32, text: &str) -> Page {
        Page {
            page_number: n,
            text: text.into(),
        }
    }

    fn toc_page_text(header: &str) -> String {
        let mut text = format!("{header}\n");
        for i in 1..=10 {
            text.push_str(&format!("Capítulo {i} ............ {}\n", i * 12));
        }
        text
    }

    #[test]
    fn test_score_dot_leader_page() {
        let (score, kind) = score_page(&toc_page_text("Índice general"));
        // keyword (+30) + leader ratio > 0.3 (+40) + short numbered lines.
        assert!(score >= 70, "score was {score}");
        assert_eq!(kind, RegionKind::General);
    }

    #[test]
    fn test_analytical_beats_general() {
        // Header contains both; analytical is checked first.
        let text = toc_page_text("Índice analítico del índice general");
        let (_, kind) = score_page(&text);
        assert_eq!(kind, RegionKind::Analytical);
    }

    #[test]
    fn test_prose_page_scores_zero() {
        let prose = "This is an ordinary paragraph of body text, with sentences \
                     that run on and no page-number artifacts at all.\nAnother \
                     paragraph follows, still prose.";
        let (score, _) = score_page(prose);
        assert_eq!(score, 0);
    }

    #[test]
    fn test_leaderless_toc_still_scores() {
        let mut text = String::from("Tabla de contenidos\n");
        for i in 1..=8 {
            text.push_str(&format!("Sección sobre el tema número {i} {}\n", i * 9));
        }
        let (score, kind) = score_page(&text);
        assert!(score >= CANDIDATE_SCORE);
        assert_eq!(kind, RegionKind::General);
    }

    #[test]
    fn test_detect_groups_contiguous_pages() {
        let pages = vec![
            page(1, "Portada"),
            page(2, &toc_page_text("Índice general")),
            page(3, &toc_page_text("continuación")),
            page(4, "Prólogo con texto normal del autor."),
        ];
        let detection = detect_toc(&pages);
        assert!(detection.has_toc);
        assert_eq!(detection.regions.len(), 1);
        let region = &detection.regions[0];
        assert_eq!(region.start_page, 2);
        assert_eq!(region.end_page, 3);
        // Page 3 has no keyword but the region keeps the concrete type.
        assert_eq!(region.kind, RegionKind::General);
    }

    #[test]
    fn test_detect_splits_distant_regions() {
        let pages = vec![
            page(2, &toc_page_text("Índice general")),
            page(30, &toc_page_text("Índice analítico")),
        ];
        let detection = detect_toc(&pages);
        assert_eq!(detection.regions.len(), 2);
        assert_eq!(detection.regions[0].kind, RegionKind::General);
        assert_eq!(detection.regions[1].kind, RegionKind::Analytical);
    }

    #[test]
    fn test_unknown_upgrades_to_concrete_kind() {
        let pages = vec![
            page(2, &toc_page_text("sin palabra clave")),
            page(3, &toc_page_text("Índice analítico")),
        ];
        let detection = detect_toc(&pages);
        assert_eq!(detection.regions.len(), 1);
        assert_eq!(detection.regions[0].kind, RegionKind::Analytical);
    }

    #[test]
    fn test_no_toc() {
        let pages = vec![page(1, "Texto normal."), page(2, "Más texto normal.")];
        let detection = detect_toc(&pages);
        assert!(!detection.has_toc);
        assert!(detection.regions.is_empty());
    }

    #[test]
    fn test_extract_prioritizes_analytical() {
        let pages = vec![
            page(2, &toc_page_text("Índice general")),
            page(30, &toc_page_text("Índice analítico")),
        ];
        let detection = detect_toc(&pages);
        let text = extract_toc_text(&detection, 100_000);
        let analytical_pos = text.find("analítico").unwrap();
        let general_pos = text.find("general").unwrap();
        assert!(analytical_pos < general_pos);
    }

    #[test]
    fn test_extract_respects_budget() {
        let pages = vec![page(2, &toc_page_text("Índice general"))];
        let detection = detect_toc(&pages);
        let text = extract_toc_text(&detection, 50);
        assert!(text.len() <= 50);
        assert!(!text.is_empty());
    }
}
