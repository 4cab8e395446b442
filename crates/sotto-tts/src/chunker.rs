//! Sentence-aware text chunking for synthesis.

use once_cell::sync::Lazy;
use regex::Regex;

/// Engines degrade on very long inputs; chunks stay at or under this many
/// characters unless a single word exceeds it.
pub const MAX_CHUNK_CHARS: usize = 250;

static SENTENCE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+").expect("sentence boundary regex"));

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split `text` into synthesis chunks of at most `max_chars` characters.
///
/// Short text passes through whole. Otherwise sentences (terminated by
/// `.`, `!` or `?` plus whitespace) are packed greedily; a sentence longer
/// than the budget is split greedily on word boundaries.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    if char_len(text) <= max_chars {
        return vec![text.to_string()];
    }

    let mut sentences: Vec<&str> = Vec::new();
    let mut last = 0;
    for m in SENTENCE_BOUNDARY.find_iter(text) {
        // Keep the terminator, drop the whitespace run after it.
        let end = m.start() + 1;
        sentences.push(&text[last..end]);
        last = m.end();
    }
    if last < text.len() {
        sentences.push(&text[last..]);
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for sentence in sentences {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if char_len(&current) + char_len(sentence) + 1 <= max_chars {
            if current.is_empty() {
                current = sentence.to_string();
            } else {
                current = format!("{} {}", current, sentence);
            }
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if char_len(sentence) > max_chars {
            for word in sentence.split_whitespace() {
                if char_len(&current) + char_len(word) + 1 <= max_chars {
                    if current.is_empty() {
                        current = word.to_string();
                    } else {
                        current = format!("{} {}", current, word);
                    }
                } else {
                    if !current.is_empty() {
                        chunks.push(std::mem::take(&mut current));
                    }
                    current = word.to_string();
                }
            }
        } else {
            current = sentence.to_string();
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    if chunks.is_empty() {
        vec![text.to_string()]
    } else {
        chunks
    }
}
