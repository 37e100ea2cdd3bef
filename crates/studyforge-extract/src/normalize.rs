//! Text canonicalization for fuzzy title matching.
//!
//! Detected titles rarely match the PDF text verbatim: accents get lost in
//! extraction, punctuation differs, whitespace is mangled. Both sides are
//! reduced to the same canonical form before comparing.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonicalize text: NFD-decompose and drop combining marks, lowercase,
/// turn anything outside `[a-z0-9]` into a separator, collapse runs, trim.
///
/// Total and deterministic; idempotent by construction (the output is
/// lowercase ASCII words joined by single spaces).
pub fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_gap = false;
    for c in s.nfd() {
        if is_combining_mark(c) {
            continue;
        }
        for lc in c.to_lowercase() {
            if lc.is_ascii_alphanumeric() {
                if pending_gap && !out.is_empty() {
                    out.push(' ');
                }
                pending_gap = false;
                out.push(lc);
            } else {
                pending_gap = true;
            }
        }
    }
    out
}

/// A document's normalized full text plus the reverse map from normalized
/// byte offsets to original byte offsets.
///
/// Built once per document and shared across all locator calls in a run.
/// Every normalized char is ASCII, so normalized byte offsets are char
/// offsets too.
#[derive(Debug, Clone)]
pub struct NormalizedText {
    pub text: String,
    offsets: Vec<usize>,
}

impl NormalizedText {
    pub fn build(original: &str) -> Self {
        let mut text = String::with_capacity(original.len());
        let mut offsets = Vec::with_capacity(original.len());
        let mut pending_gap = false;
        for (byte_idx, c) in original.char_indices() {
            for d in c.nfd() {
                if is_combining_mark(d) {
                    continue;
                }
                for lc in d.to_lowercase() {
                    if lc.is_ascii_alphanumeric() {
                        if pending_gap && !text.is_empty() {
                            text.push(' ');
                            offsets.push(byte_idx);
                        }
                        pending_gap = false;
                        text.push(lc);
                        offsets.push(byte_idx);
                    } else {
                        pending_gap = true;
                    }
                }
            }
        }
        Self { text, offsets }
    }

    /// Map a byte offset in the normalized text back to the byte offset of
    /// the original char that produced it.
    pub fn original_offset(&self, norm_offset: usize) -> Option<usize> {
        self.offsets.get(norm_offset).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_accents_and_case() {
        assert_eq!(normalize("Índice Analítico"), "indice analitico");
        assert_eq!(normalize("El Niño"), "el nino");
    }

    #[test]
    fn test_normalize_punctuation_and_whitespace() {
        assert_eq!(normalize("  Cap. 3:  Equilibrio — parte I  "), "cap 3 equilibrio parte i");
        assert_eq!(normalize("a\n\n\tb"), "a b");
    }

    #[test]
    fn test_normalize_empty_and_symbol_only() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("…—·!"), "");
    }

    #[test]
    fn test_normalize_idempotent() {
        for s in ["Índice", "a  b", "¿Qué es la termodinámica?", "", "123 ABC"] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_normalized_text_matches_normalize() {
        let s = "Capítulo 1: El Equilibrio\n\nTexto del capítulo…";
        let norm = NormalizedText::build(s);
        assert_eq!(norm.text, normalize(s));
    }

    #[test]
    fn test_offset_mapping_roundtrip() {
        let original = "Prólogo. Capítulo Único: ¡Energía!";
        let norm = NormalizedText::build(original);
        let needle = normalize("Capítulo Único");
        let norm_idx = norm.text.find(&needle).unwrap();
        let orig_idx = norm.original_offset(norm_idx).unwrap();
        assert!(original[orig_idx..].starts_with("Capítulo"));
    }

    #[test]
    fn test_offset_mapping_out_of_range() {
        let norm = NormalizedText::build("abc");
        assert_eq!(norm.original_offset(2), Some(2));
        assert_eq!(norm.original_offset(3), None);
    }
}
