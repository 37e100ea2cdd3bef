//! Token-budgeted chunking of section text.
//!
//! Token counts are estimated at 4 chars per token. Oversized text is split
//! at the last paragraph break inside the budget, falling back to the last
//! sentence break, falling back to a hard cut, so the first chunk is always
//! the best-formed prefix that fits.

/// Rough token estimate: ceil(len / 4).
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Split `text` into chunks of at most `max_tokens` (estimated).
///
/// Deterministic for a given input. Concatenating the chunks reproduces the
/// input exactly; every iteration consumes at least one char.
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens.max(1) * 4;
    if text.len() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_chars {
            chunks.push(remaining.to_string());
            break;
        }

        let window_end = floor_boundary(remaining, max_chars);
        let window = &remaining[..window_end];

        // Prefer a paragraph break; a break too early in the window wastes
        // most of the budget, so fall back to a sentence break, then to a
        // hard cut.
        let mut split = window.rfind("\n\n");
        if split.map_or(true, |idx| idx < max_chars / 2) {
            split = window.rfind(". ");
        }
        let split_at = match split {
            Some(idx) if idx >= max_chars * 3 / 10 => idx + 1,
            _ => window_end,
        };
        let split_at = floor_boundary(remaining, split_at).max(1);
        let split_at = ceil_boundary(remaining, split_at);

        chunks.push(remaining[..split_at].to_string());
        remaining = &remaining[split_at..];
    }

    chunks
}

fn floor_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("short", 100);
        assert_eq!(chunks, vec!["short".to_string()]);
    }

    #[test]
    fn test_splits_at_paragraph_boundary() {
        let para = "x".repeat(30);
        let text = format!("{para}\n\n{para}\n\n{para}");
        // Budget of 20 tokens = 80 chars; first paragraph break at 30.
        let chunks = chunk_text(&text, 20);
        assert!(chunks.len() > 1);
        assert!(chunks[0].ends_with('\n'));
    }

    #[test]
    fn test_falls_back_to_sentence_boundary() {
        let sentence = format!("{}. ", "w".repeat(28));
        let text = sentence.repeat(10);
        let chunks = chunk_text(&text, 20); // 80-char budget, no "\n\n"
        assert!(chunks.len() > 1);
        assert!(chunks[0].ends_with('.'));
    }

    #[test]
    fn test_hard_cut_without_boundaries() {
        let text = "q".repeat(500);
        let chunks = chunk_text(&text, 25); // 100-char budget
        assert_eq!(chunks.len(), 5);
        assert!(chunks.iter().all(|c| c.len() == 100));
    }

    #[test]
    fn test_roundtrip_exact() {
        let texts = [
            format!("{}\n\n{}\n\n{}", "a".repeat(90), "b".repeat(90), "c".repeat(90)),
            format!("{}. {}. {}.", "d".repeat(70), "e".repeat(70), "f".repeat(70)),
            "á".repeat(301),
            "plain".to_string(),
        ];
        for text in &texts {
            for max_tokens in [1, 7, 25, 100] {
                let chunks = chunk_text(text, max_tokens);
                assert_eq!(&chunks.concat(), text, "max_tokens={max_tokens}");
                assert!(chunks.iter().all(|c| !c.is_empty()));
            }
        }
    }

    #[test]
    fn test_multibyte_hard_cut_is_boundary_safe() {
        let text = "é".repeat(120); // 2 bytes per char
        let chunks = chunk_text(&text, 10); // 40-byte budget
        assert_eq!(chunks.concat(), text);
        for c in &chunks {
            assert!(c.len() <= 41); // boundary adjustment may add one byte
        }
    }

    #[test]
    fn test_early_paragraph_break_prefers_sentence() {
        // Paragraph break in the first half of the window; sentence break
        // later in the window should win.
        let text = format!(
            "{}\n\n{}. {}",
            "a".repeat(10),
            "b".repeat(50),
            "c".repeat(60)
        );
        let chunks = chunk_text(&text, 20); // 80-char budget
        assert!(chunks[0].ends_with('.'), "chunk was {:?}", chunks[0]);
    }
}
