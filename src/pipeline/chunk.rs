//! Source-text sizing and chunking.
//!
//! Lecture transcripts routinely run past what a small local model can read
//! in one prompt. Over-long sources are cut into overlapping chunks, each
//! chunk is summarised on its own, and the summaries stand in for the source.
//! Cuts prefer paragraph breaks, then line breaks, then spaces, so a chunk
//! rarely ends mid-word.

/// Separators tried in order when looking for a cut point.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Rough token estimate: one token per four characters.
pub fn approximate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Split `text` into chunks of at most `chunk_size` characters, with
/// consecutive chunks sharing roughly `overlap` characters.
///
/// Chunks are trimmed; whitespace-only chunks are dropped.
pub fn split_chunks(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size / 2);

    // Byte offset of every char boundary, including the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < total {
        let end = (start + chunk_size).min(total);
        let cut = if end < total {
            let window = &text[bounds[start]..bounds[end]];
            find_cut(window).map_or(end, |offset| start + window[..offset].chars().count())
        } else {
            end
        };

        let piece = text[bounds[start]..bounds[cut]].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        if cut >= total {
            break;
        }

        let next = cut.saturating_sub(overlap);
        start = if next > start { next } else { cut };
    }

    chunks
}

/// Byte offset just past the last preferred separator in the back half of `window`.
fn find_cut(window: &str) -> Option<usize> {
    let half = window.len() / 2;
    SEPARATORS.iter().find_map(|sep| {
        window
            .rfind(sep)
            .map(|i| i + sep.len())
            .filter(|&offset| offset > half)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approximate_tokens_counts_chars() {
        assert_eq!(approximate_tokens(""), 0);
        assert_eq!(approximate_tokens("abcdefgh"), 2);
        assert_eq!(approximate_tokens("ééééé"), 1);
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_chunks("  hello world  ", 100, 10), vec!["hello world"]);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(split_chunks("", 100, 10).is_empty());
        assert!(split_chunks("   ", 100, 10).is_empty());
    }

    #[test]
    fn chunks_respect_size_and_cover_text() {
        let words: Vec<String> = (0..400).map(|i| format!("word{i}")).collect();
        let text = words.join(" ");
        let chunks = split_chunks(&text, 200, 40);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 200, "chunk too long: {}", chunk.len());
        }
        for word in &words {
            let needle = format!("{word} ");
            let covered = chunks
                .iter()
                .any(|c| c.contains(&needle) || c.ends_with(word.as_str()));
            assert!(covered, "{word} missing");
        }
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = (0..200).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let chunks = split_chunks(&text, 100, 30);
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').next_back().unwrap();
            assert!(pair[1].contains(last_word), "no overlap between {pair:?}");
        }
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let para = "a".repeat(60);
        let text = format!("{para}\n\n{para}\n\n{para}");
        let chunks = split_chunks(&text, 100, 0);
        assert_eq!(chunks, vec![para.clone(), para.clone(), para]);
    }

    #[test]
    fn multibyte_text_does_not_panic() {
        let text = "ü".repeat(1000);
        let chunks = split_chunks(&text, 64, 8);
        assert!(chunks.iter().all(|c| c.chars().count() <= 64));
    }
}
