//! Stabilising partial transcripts over the live session buffer.

use std::sync::Arc;

use sotto_audio::ms_to_samples;
use sotto_foundation::SttError;

use crate::session::SpeechSession;
use crate::text::deduplicate_words;
use crate::transcription::TranscriptionService;
use crate::types::{SessionConfig, Transcript};

/// Extra tail re-transcribed beyond the window so word boundaries at the
/// window edge stabilise.
pub const PARTIAL_OVERLAP_MS: u64 = 300;

/// Emits monotonically additive word tails while an utterance is open.
///
/// Gate: at least `partial_stride_ms` of new audio since the last partial
/// and at least `partial_window_ms` buffered. The freshly transcribed tail
/// is deduplicated against the session's confirmed words, so partials never
/// retract.
pub struct PartialTranscriptService {
    transcription: Arc<TranscriptionService>,
}

impl PartialTranscriptService {
    pub fn new(transcription: Arc<TranscriptionService>) -> Self {
        Self { transcription }
    }

    pub fn generate_partial(
        &self,
        session: &SpeechSession,
        config: &SessionConfig,
    ) -> Result<Option<Transcript>, SttError> {
        let buf_ms = session.buffer_ms();
        if buf_ms == 0 {
            return Ok(None);
        }

        let (last_partial_ms, mut confirmed) = session.partial_state();
        if buf_ms.saturating_sub(last_partial_ms) < config.partial_stride_ms
            || buf_ms < config.partial_window_ms
        {
            return Ok(None);
        }

        let tail_window_ms = config.partial_window_ms + PARTIAL_OVERLAP_MS;
        let tail = session.buffer_tail(ms_to_samples(tail_window_ms));
        let tail_start_ms = buf_ms.saturating_sub(tail_window_ms);

        let mut transcript = self.transcription.transcribe(
            &tail,
            Some(&config.language),
            config.include_word_timestamps,
            config.model_id.as_deref(),
        )?;

        let new_text = deduplicate_words(&transcript.text, &mut confirmed);
        session.update_partial(buf_ms, confirmed);

        if new_text.is_empty() {
            return Ok(None);
        }

        transcript.text = new_text;
        transcript.is_partial = true;
        transcript.eou_probability = None;
        transcript.start_ms = tail_start_ms;
        transcript.end_ms = buf_ms;
        Ok(Some(transcript))
    }

    /// Hand back whatever audio remains in the session buffer, for the
    /// end-of-stream flush.
    pub fn flush_remaining_audio(&self, session: &SpeechSession) -> Option<Vec<f32>> {
        let audio = session.buffer_audio();
        if audio.is_empty() {
            None
        } else {
            Some(audio)
        }
    }
}
