use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadConfig {
    /// Model score cutoff.
    pub threshold: f32,
    /// Silence run that closes an utterance inside the model window.
    pub min_silence_duration_ms: u32,
    /// Padding applied around detected speech.
    pub speech_pad_ms: u32,
    /// Spans shorter than this never open an utterance.
    pub min_speech_duration_ms: u32,
    /// Segments shorter than this are suppressed (the stop event still
    /// fires).
    pub min_audio_duration_ms: u32,
    /// Hard cap that force-closes a segment.
    pub max_utterance_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            min_silence_duration_ms: 500,
            speech_pad_ms: 100,
            min_speech_duration_ms: 250,
            min_audio_duration_ms: 300,
            max_utterance_ms: 15_000,
        }
    }
}
