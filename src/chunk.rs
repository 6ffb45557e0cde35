//! Overlapping-window text chunker.
//!
//! Splits extracted document text into spans of at most `chunk_chars`
//! characters, with `overlap_chars` of shared context between neighboring
//! chunks so semantic meaning is not lost at chunk edges. Split points
//! prefer paragraph boundaries (`\n\n`), then sentence ends, then word
//! boundaries, before falling back to a hard cut.

/// Minimum fraction of the window a preferred boundary must preserve.
/// Boundaries earlier than this would produce degenerate slivers.
const MIN_FILL_RATIO: f64 = 0.5;

/// Split `text` into overlapping chunks. Returns chunk texts in document
/// order; empty or whitespace-only input yields no chunks. Window and
/// overlap sizes count characters, not bytes.
pub fn split_text(text: &str, chunk_chars: usize, overlap_chars: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    // Byte offset of every char boundary, with the end appended, so window
    // arithmetic counts characters while slicing stays on valid bytes.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize; // char index

    while start < total_chars {
        let hard_end = (start + chunk_chars).min(total_chars);

        let end_byte = if hard_end >= total_chars {
            text.len()
        } else {
            pick_boundary(text, bounds[start], bounds[hard_end])
        };
        // rfind results land on char boundaries, so this lookup is exact
        let end = bounds.partition_point(|&b| b < end_byte);

        let piece = text[bounds[start]..end_byte].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end >= total_chars {
            break;
        }

        // Step forward, re-including `overlap_chars` of trailing context
        let next = if end - start > overlap_chars {
            end - overlap_chars
        } else {
            end
        };
        start = next.max(start + 1);
    }

    chunks
}

/// Choose the best split point in `(start, hard_end]`, preferring paragraph
/// breaks, then sentence ends, then whitespace.
fn pick_boundary(text: &str, start: usize, hard_end: usize) -> usize {
    let window = &text[start..hard_end];
    let min_pos = (window.len() as f64 * MIN_FILL_RATIO) as usize;

    if let Some(pos) = window.rfind("\n\n") {
        if pos > min_pos {
            return start + pos;
        }
    }

    let sentence_end = [". ", ".\n", "! ", "? ", "!\n", "?\n"]
        .iter()
        .filter_map(|sep| window.rfind(sep).map(|p| p + 1))
        .max();
    if let Some(pos) = sentence_end {
        if pos > min_pos {
            return start + pos;
        }
    }

    if let Some(pos) = window.rfind(char::is_whitespace) {
        if pos > min_pos {
            return start + pos;
        }
    }

    hard_end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_text("", 500, 50).is_empty());
        assert!(split_text("   \n\n  ", 500, 50).is_empty());
    }

    #[test]
    fn short_text_single_chunk() {
        let chunks = split_text("Hello, world!", 500, 50);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn chunk_sizes_respect_limit() {
        let text = "word ".repeat(1000);
        let chunks = split_text(&text, 500, 50);
        for c in &chunks {
            assert!(c.len() <= 500, "chunk too long: {} chars", c.len());
        }
    }

    #[test]
    fn neighboring_chunks_share_overlap() {
        // Continuous prose with no paragraph breaks: each next chunk must
        // start before the previous one ended
        let text = "alpha beta gamma delta ".repeat(120);
        let chunks = split_text(&text, 500, 50);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().rev().take(20).collect::<String>();
            let tail: String = tail.chars().rev().collect();
            assert!(
                pair[1].contains(tail.trim()),
                "expected overlap between consecutive chunks"
            );
        }
    }

    #[test]
    fn twenty_one_hundred_chars_make_about_five_chunks() {
        // 2100 chars at 500-char windows with 50 overlap: ceil(2100/450) ≈ 5
        let sentence = "The PTO policy grants twenty days of leave annually. ";
        let text: String = sentence.repeat(40).chars().take(2100).collect();
        let chunks = split_text(&text, 500, 50);
        assert!(
            (4..=6).contains(&chunks.len()),
            "expected ~5 chunks, got {}",
            chunks.len()
        );
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let para = "A".repeat(300);
        let text = format!("{}\n\n{}", para, "B".repeat(300));
        let chunks = split_text(&text, 500, 50);
        // First chunk should end at the paragraph break, not mid-B-run
        assert!(chunks[0].chars().all(|c| c == 'A'));
    }

    #[test]
    fn hard_cut_when_no_boundary_available() {
        let text = "x".repeat(1200);
        let chunks = split_text(&text, 500, 50);
        assert!(chunks.len() >= 2);
        assert_eq!(chunks[0].len(), 500);
    }

    #[test]
    fn deterministic() {
        let text = "Some text. More text! Even more?\n\nNext paragraph here. ".repeat(30);
        let a = split_text(&text, 500, 50);
        let b = split_text(&text, 500, 50);
        assert_eq!(a, b);
    }

    #[test]
    fn multibyte_input_does_not_panic() {
        let text = "héllo wörld ünïcode ".repeat(100);
        let chunks = split_text(&text, 100, 10);
        assert!(!chunks.is_empty());
    }

    #[test]
    fn limits_count_characters_not_bytes() {
        // Two-byte chars: 300 chars is 600 bytes; windows must still hold
        // the full configured character count
        let text = "ä".repeat(300);
        let chunks = split_text(&text, 100, 10);
        assert_eq!(chunks[0].chars().count(), 100);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
    }
}
