//! Fixed-window text chunker.
//!
//! Splits document text into windows of `chunk_size` characters that
//! overlap by `chunk_overlap` characters. Each window is trimmed and empty
//! windows are dropped, so indices stay contiguous over the chunks that are
//! actually emitted.
//!
//! Windows are measured in characters, not bytes, and never cut through a
//! UTF-8 sequence.

use anyhow::Result;

use crate::error::RagError;
use crate::models::{Chunk, Document};

/// Split text into overlapping, trimmed, non-empty windows.
///
/// `chunk_overlap` is clamped to `chunk_size - 1` so every step makes
/// progress. The loop stops at the first window that reaches the end of
/// the text.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    if chunk_size == 0 {
        return Err(RagError::invalid("chunk_size must be > 0").into());
    }
    let overlap = chunk_overlap.min(chunk_size - 1);

    // Byte offset of every character boundary, including the end.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let length = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < length {
        let end = (start + chunk_size).min(length);
        let window = text[bounds[start]..bounds[end]].trim();
        if !window.is_empty() {
            chunks.push(window.to_string());
        }
        if end >= length {
            break;
        }
        start = end - overlap;
    }

    Ok(chunks)
}

/// Derive chunks for every document, in document-then-index order.
pub fn build_chunks(
    documents: &[Document],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    for document in documents {
        let source_path = document.path_string();
        for (index, content) in chunk_text(&document.content, chunk_size, chunk_overlap)?
            .into_iter()
            .enumerate()
        {
            chunks.push(Chunk {
                chunk_id: format!("{}:{}", document.doc_id, index),
                doc_id: document.doc_id.clone(),
                content,
                source_path: source_path.clone(),
                index,
            });
        }
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn strip_ws(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 10, 2).unwrap().is_empty());
        assert!(chunk_text("", 1, 0).unwrap().is_empty());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let err = chunk_text("hello", 0, 0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("  Hello, world!\n", 200, 20).unwrap();
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_exact_length_single_chunk() {
        let chunks = chunk_text("abcd", 4, 3).unwrap();
        assert_eq!(chunks, vec!["abcd".to_string()]);
    }

    #[test]
    fn test_whitespace_only_yields_nothing() {
        assert!(chunk_text("   \n\t  ", 200, 20).unwrap().is_empty());
        assert!(chunk_text("          ", 3, 1).unwrap().is_empty());
    }

    #[test]
    fn test_overlapping_windows() {
        let chunks = chunk_text("abcdefghij", 4, 2).unwrap();
        assert_eq!(chunks, vec!["abcd", "cdef", "efgh", "ghij"]);
    }

    #[test]
    fn test_stops_at_end_of_text() {
        // The window ending at the text end is the last one; no trailing
        // overlap-only window is produced.
        let chunks = chunk_text("abcdef", 4, 2).unwrap();
        assert_eq!(chunks, vec!["abcd", "cdef"]);
    }

    #[test]
    fn test_overlap_clamped() {
        // overlap >= chunk_size behaves like chunk_size - 1.
        let clamped = chunk_text("abcdef", 3, 50).unwrap();
        let explicit = chunk_text("abcdef", 3, 2).unwrap();
        assert_eq!(clamped, explicit);
        assert_eq!(clamped, vec!["abc", "bcd", "cde", "def"]);
    }

    #[test]
    fn test_blank_windows_do_not_consume_index() {
        let chunks = chunk_text("aaaa    bbbb", 4, 0).unwrap();
        assert_eq!(chunks, vec!["aaaa", "bbbb"]);
    }

    #[test]
    fn test_no_empty_chunks_property() {
        let text = "Lorem ipsum dolor sit amet,\n\n consectetur   adipiscing elit.\n\
                    Sed do eiusmod tempor incididunt ut labore et dolore magna aliqua.";
        for size in 1..40 {
            for overlap in 0..size {
                for chunk in chunk_text(text, size, overlap).unwrap() {
                    assert!(!chunk.is_empty(), "size={} overlap={}", size, overlap);
                    assert_eq!(chunk, chunk.trim());
                }
            }
        }
    }

    #[test]
    fn test_reconstructs_non_whitespace_content() {
        let text = "The quick brown fox\njumps over\n\n the lazy dog. 1234567890";
        for size in 1..30 {
            let joined: String = chunk_text(text, size, 0).unwrap().concat();
            assert_eq!(strip_ws(&joined), strip_ws(text), "size={}", size);
        }
    }

    #[test]
    fn test_chunks_follow_document_order() {
        let text = "one two three four five six seven eight nine ten";
        let chunks = chunk_text(text, 9, 3).unwrap();
        let mut last = 0;
        for chunk in &chunks {
            let pos = text[last..].find(chunk.as_str()).map(|p| p + last);
            assert!(pos.is_some(), "chunk {:?} out of order", chunk);
            last = pos.unwrap();
        }
    }

    #[test]
    fn test_multibyte_characters() {
        let text = "héllo wörld ñandú 日本語テキスト";
        let chunks = chunk_text(text, 5, 1).unwrap();
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 5);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma delta epsilon zeta eta theta";
        assert_eq!(
            chunk_text(text, 10, 3).unwrap(),
            chunk_text(text, 10, 3).unwrap()
        );
    }

    #[test]
    fn test_build_chunks_ids_and_order() {
        let docs = vec![
            Document {
                doc_id: "d1".to_string(),
                path: PathBuf::from("docs/a.txt"),
                content: "abcdefgh".to_string(),
            },
            Document {
                doc_id: "d2".to_string(),
                path: PathBuf::from("docs/b.txt"),
                content: "xyz".to_string(),
            },
        ];
        let chunks = build_chunks(&docs, 4, 0).unwrap();
        let ids: Vec<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["d1:0", "d1:1", "d2:0"]);
        assert_eq!(chunks[1].content, "efgh");
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[2].source_path, "docs/b.txt");
    }
}
