//! Event and segment types emitted by the VAD processor.

/// A speech span inside a VAD window, in sample offsets relative to the
/// window start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechSpan {
    pub start_sample: usize,
    pub end_sample: usize,
}

/// Boundary events, timestamped in milliseconds relative to the session's
/// first ingested sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadEvent {
    SpeechStarted { timestamp_ms: u64 },
    SpeechStopped { timestamp_ms: u64 },
}

/// A cut utterance: the audio slice plus its boundary timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechSegment {
    pub samples: Vec<f32>,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl SpeechSegment {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}
