//! StudyForge Extract — deterministic text processing.
//!
//! Everything here is synchronous and total: normalization for fuzzy
//! comparison, the section-locator fallback ladder, TOC region detection,
//! and token-budgeted chunking.

pub mod chunk;
pub mod locate;
pub mod normalize;
pub mod toc;

pub use chunk::{chunk_text, estimate_tokens};
pub use locate::locate;
pub use normalize::{normalize, NormalizedText};
pub use toc::{detect_toc, extract_toc_text, RegionKind, ScoredPage, TocDetection, TocRegion};
