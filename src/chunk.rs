//! Sliding word-window text chunker.
//!
//! Splits raw text into bounded, overlapping passages sized for embedding.
//! The text is split on whitespace into words (surface forms kept,
//! punctuation and all), then windows of `max_words` words advance by
//! `max_words - overlap_words` words per step, so consecutive chunks share
//! `overlap_words` words at the boundary. The final partial window is kept
//! if non-empty.
//!
//! # Guarantees
//!
//! - Every word of the input appears in at least one window.
//! - Input with at least one word always yields at least one non-empty
//!   chunk; whitespace-only input yields none.
//! - Deterministic: identical arguments yield identical output.
//!
//! # Example
//!
//! ```rust
//! use ragkit::chunk::chunk_words;
//!
//! let chunks = chunk_words("one two three four five", 3, 1);
//! assert_eq!(chunks, vec!["one two three", "three four five"]);
//! ```

/// Split `text` into overlapping word windows.
///
/// Each chunk is the window's words joined by single spaces and trimmed;
/// empty chunks are dropped. If no window yields a non-empty chunk but the
/// trimmed input is non-empty, the trimmed input is returned as a single
/// chunk so that non-empty text never chunks to nothing.
///
/// # Panics
///
/// Panics if `max_words <= overlap_words`. [`crate::config::load_config`]
/// rejects such parameters before they can reach this function; the
/// assertion guards against a zero stride looping forever.
pub fn chunk_words(text: &str, max_words: usize, overlap_words: usize) -> Vec<String> {
    assert!(
        max_words > overlap_words,
        "chunking requires max_words > overlap_words"
    );
    let stride = max_words - overlap_words;

    let words: Vec<&str> = text.split_whitespace().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + max_words).min(words.len());
        let piece = words[start..end].join(" ");
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        if end == words.len() {
            break;
        }
        start += stride;
    }

    if chunks.is_empty() {
        let fallback = text.trim();
        if !fallback.is_empty() {
            chunks.push(fallback.to_string());
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_words("Hello, world!", 500, 50);
        assert_eq!(chunks, vec!["Hello, world!"]);
    }

    #[test]
    fn test_whitespace_only_yields_nothing() {
        let chunks = chunk_words("   \n\t  ", 500, 50);
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_surface_forms_preserved() {
        let chunks = chunk_words("  O  curso,   dura: 3 anos.  ", 500, 50);
        assert_eq!(chunks, vec!["O curso, dura: 3 anos."]);
    }

    #[test]
    fn test_1200_words_500_max_50_overlap() {
        let text = numbered_words(1200);
        let chunks = chunk_words(&text, 500, 50);
        assert_eq!(chunks.len(), 3);

        for chunk in &chunks {
            assert!(chunk.split_whitespace().count() <= 500);
        }

        // Consecutive chunks share exactly 50 words at the boundary.
        for pair in chunks.windows(2) {
            let left: Vec<&str> = pair[0].split_whitespace().collect();
            let right: Vec<&str> = pair[1].split_whitespace().collect();
            assert_eq!(left[left.len() - 50..], right[..50]);
        }
    }

    #[test]
    fn test_every_word_covered() {
        let text = numbered_words(137);
        let chunks = chunk_words(&text, 20, 5);
        for i in 0..137 {
            let word = format!("w{}", i);
            assert!(
                chunks.iter().any(|c| c.split_whitespace().any(|w| w == word)),
                "word {} missing from all chunks",
                word
            );
        }
    }

    #[test]
    fn test_final_partial_window_kept() {
        let text = numbered_words(25);
        let chunks = chunk_words(&text, 20, 5);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].split_whitespace().count(), 10);
    }

    #[test]
    fn test_deterministic() {
        let text = numbered_words(300);
        assert_eq!(chunk_words(&text, 100, 10), chunk_words(&text, 100, 10));
    }

    #[test]
    fn test_zero_overlap() {
        let text = numbered_words(10);
        let chunks = chunk_words(&text, 5, 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "w0 w1 w2 w3 w4");
        assert_eq!(chunks[1], "w5 w6 w7 w8 w9");
    }

    #[test]
    #[should_panic(expected = "max_words > overlap_words")]
    fn test_overlap_equal_to_max_rejected() {
        chunk_words("some text here", 5, 5);
    }
}
