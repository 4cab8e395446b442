//! The utterance segmentation state machine.
//!
//! Each `append` ingests canonical audio into a ring buffer, runs the model
//! over a rolling one-second tail window, and advances a two-state machine:
//! idle until a merged span appears, then in-utterance until the window goes
//! silent or the hard cap lands. Closing cuts a `SpeechSegment` out of the
//! ring buffer and resets.

use std::sync::Arc;

use tracing::debug;

use sotto_audio::{ms_to_samples, samples_to_ms, RingBuffer, MS_SAMPLE_RATE};
use sotto_foundation::VadError;

use crate::config::VadConfig;
use crate::types::{SpeechSegment, SpeechSpan, VadEvent};
use crate::VadModel;

/// Rolling model window.
pub const VAD_WINDOW_MS: u64 = 1_000;

/// Extra capacity beyond the utterance cap: pad slack plus one window.
const BUFFER_HEADROOM_MS: u64 = 3_000 + VAD_WINDOW_MS;

#[derive(Debug, Default)]
struct VadState {
    audio_start_ms: Option<u64>,
    audio_end_ms: Option<u64>,
}

pub struct VadProcessor {
    config: VadConfig,
    state: VadState,
    buffer: RingBuffer,
    model: Arc<dyn VadModel>,
}

impl VadProcessor {
    pub fn new(config: VadConfig, model: Arc<dyn VadModel>) -> Self {
        let capacity = ms_to_samples(config.max_utterance_ms as u64 + BUFFER_HEADROOM_MS);
        Self {
            config,
            state: VadState::default(),
            buffer: RingBuffer::new(capacity),
            model,
        }
    }

    pub fn config(&self) -> &VadConfig {
        &self.config
    }

    /// True while an utterance is open.
    pub fn in_utterance(&self) -> bool {
        self.state.audio_start_ms.is_some()
    }

    fn duration_ms(&self) -> u64 {
        samples_to_ms(self.buffer.len())
    }

    /// Ingest a frame. Returns at most one event and, on close, at most one
    /// segment.
    pub fn append(
        &mut self,
        audio: &[f32],
    ) -> Result<(Option<VadEvent>, Option<SpeechSegment>), VadError> {
        self.buffer.append(audio);

        let window = self.buffer.tail(ms_to_samples(VAD_WINDOW_MS));
        let window_ms = samples_to_ms(window.len());

        let spans = self.model.speech_spans(
            &window,
            self.config.threshold,
            self.config.min_silence_duration_ms,
            self.config.speech_pad_ms,
            self.config.min_speech_duration_ms,
        )?;
        let merged = merge_spans(&spans);

        match self.state.audio_start_ms {
            None => {
                let Some(span) = merged else {
                    return Ok((None, None));
                };
                let buf_ms = self.duration_ms();
                let start_ms = (buf_ms - window_ms)
                    + (span.start_sample / MS_SAMPLE_RATE) as u64;
                self.state.audio_start_ms = Some(start_ms);
                Ok((
                    Some(VadEvent::SpeechStarted {
                        timestamp_ms: start_ms,
                    }),
                    None,
                ))
            }
            Some(_) => {
                let buf_ms = self.duration_ms();
                let window_silent = merged.is_none();
                let capped = buf_ms >= self.config.max_utterance_ms as u64;
                if !window_silent && !capped {
                    return Ok((None, None));
                }

                let end_ms = buf_ms.saturating_sub(self.config.speech_pad_ms as u64);
                self.state.audio_end_ms = Some(end_ms);
                let segment = self.extract_segment();
                self.clear_buffer();

                let event = VadEvent::SpeechStopped {
                    timestamp_ms: end_ms,
                };
                if segment.duration_ms() < self.config.min_audio_duration_ms as u64 {
                    debug!(
                        target: "vad",
                        "segment too short ({}ms), suppressing",
                        segment.duration_ms()
                    );
                    return Ok((Some(event), None));
                }
                Ok((Some(event), Some(segment)))
            }
        }
    }

    fn extract_segment(&self) -> SpeechSegment {
        let (Some(start_ms), Some(end_ms)) =
            (self.state.audio_start_ms, self.state.audio_end_ms)
        else {
            return SpeechSegment {
                samples: Vec::new(),
                start_ms: 0,
                end_ms: 0,
            };
        };

        let start_sample = start_ms as usize * MS_SAMPLE_RATE;
        let end_sample = end_ms as usize * MS_SAMPLE_RATE;
        SpeechSegment {
            samples: self.buffer.slice(start_sample, end_sample),
            start_ms,
            end_ms,
        }
    }

    fn clear_buffer(&mut self) {
        self.buffer.clear();
        self.state = VadState::default();
    }

    pub fn reset(&mut self) {
        self.clear_buffer();
    }
}

/// Collapse a span list to one merged span: earliest start, latest end.
fn merge_spans(spans: &[SpeechSpan]) -> Option<SpeechSpan> {
    if spans.is_empty() {
        return None;
    }
    Some(SpeechSpan {
        start_sample: spans.iter().map(|s| s.start_sample).min().unwrap_or(0),
        end_sample: spans.iter().map(|s| s.end_sample).max().unwrap_or(0),
    })
}
