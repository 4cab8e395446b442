//! Transcript text operations: partial-overlap dedup and batch merge.

use sotto_foundation::SttError;

use crate::types::{SegmentTiming, Transcript, Usage, WordTiming};

/// Strip the overlap between a freshly transcribed window and the already
/// confirmed word stream.
///
/// Finds the largest suffix of `confirmed` that case-insensitively equals a
/// prefix of the new text, appends the remainder to `confirmed`, and returns
/// the remainder joined by single spaces. Feeding the returned tail back in
/// with the updated list yields an empty tail (idempotence).
pub fn deduplicate_words(text: &str, confirmed: &mut Vec<String>) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let max_overlap = words.len().min(confirmed.len());

    let mut overlap = 0;
    for i in (1..=max_overlap).rev() {
        let confirmed_tail = &confirmed[confirmed.len() - i..];
        let matches = confirmed_tail
            .iter()
            .zip(words[..i].iter())
            .all(|(a, b)| a.to_lowercase() == b.to_lowercase());
        if matches {
            overlap = i;
            break;
        }
    }

    let new_words = &words[overlap..];
    if !new_words.is_empty() {
        confirmed.extend(new_words.iter().map(|w| w.to_string()));
    }
    new_words.join(" ")
}

/// Merge per-chunk transcripts of one long recording into a single result.
///
/// Word and segment times are shifted by each chunk's offset before being
/// appended, so the merged timeline is monotone across chunk boundaries.
pub fn merge_transcripts(transcripts: Vec<(Transcript, f64)>) -> Result<Transcript, SttError> {
    if transcripts.is_empty() {
        return Err(SttError::TranscriptionFailed(
            "cannot merge empty transcript list".into(),
        ));
    }
    if transcripts.len() == 1 {
        return Ok(transcripts.into_iter().next().map(|(t, _)| t).unwrap_or_default());
    }

    let mut text_parts: Vec<String> = Vec::new();
    let mut segments: Vec<SegmentTiming> = Vec::new();
    let mut words: Vec<WordTiming> = Vec::new();
    let mut audio_ms: u64 = 0;
    let mut processing_ms: u64 = 0;

    for (transcript, offset_s) in &transcripts {
        let trimmed = transcript.text.trim();
        if !trimmed.is_empty() {
            text_parts.push(trimmed.to_string());
        }

        for seg in &transcript.segments {
            segments.push(SegmentTiming {
                start: seg.start + offset_s,
                end: seg.end + offset_s,
                text: seg.text.clone(),
                words: seg
                    .words
                    .iter()
                    .map(|w| WordTiming {
                        word: w.word.clone(),
                        start: w.start + offset_s,
                        end: w.end + offset_s,
                    })
                    .collect(),
            });
        }
        for w in &transcript.words {
            words.push(WordTiming {
                word: w.word.clone(),
                start: w.start + offset_s,
                end: w.end + offset_s,
            });
        }

        audio_ms += transcript.audio_duration_ms;
        processing_ms += transcript.processing_duration_ms;
    }

    let first = &transcripts[0].0;
    let (last, last_offset_s) = {
        let (t, o) = &transcripts[transcripts.len() - 1];
        (t, *o)
    };

    Ok(Transcript {
        text: text_parts.join(" "),
        is_partial: false,
        start_ms: first.start_ms,
        end_ms: (last_offset_s * 1000.0) as u64 + last.end_ms,
        audio_duration_ms: audio_ms,
        processing_duration_ms: processing_ms,
        segments,
        words,
        usage: Some(Usage {
            audio_ms,
            processing_ms,
        }),
        model: first.model.clone(),
        eou_probability: None,
    })
}
