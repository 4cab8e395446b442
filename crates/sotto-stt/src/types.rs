//! Core types for speech-to-text functionality.

use serde::{Deserialize, Serialize};

/// Word-level timing, in seconds relative to the transcribed audio start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// Segment-level timing with its word breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentTiming {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub words: Vec<WordTiming>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Usage {
    pub audio_ms: u64,
    pub processing_ms: u64,
}

/// A transcription result, partial or final.
///
/// Partials never carry an EOU probability; text is whitespace-stripped by
/// the producers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub is_partial: bool,
    /// Utterance boundaries, wall-clock-relative to the session buffer.
    pub start_ms: u64,
    pub end_ms: u64,
    pub audio_duration_ms: u64,
    pub processing_duration_ms: u64,
    pub segments: Vec<SegmentTiming>,
    pub words: Vec<WordTiming>,
    pub usage: Option<Usage>,
    pub model: Option<String>,
    pub eou_probability: Option<f32>,
}

/// Per-stream STT session configuration, accepted exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub language: String,
    pub sample_rate: u32,
    pub initial_prompt: Option<String>,
    pub hotwords: Option<String>,
    /// Emit stabilising partial transcripts during utterances.
    pub partials: bool,
    pub partial_window_ms: u64,
    pub partial_stride_ms: u64,
    pub include_word_timestamps: bool,
    pub model_id: Option<String>,
    pub task: Option<String>,
    pub temperature: Option<f32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            sample_rate: 16_000,
            initial_prompt: None,
            hotwords: None,
            partials: false,
            partial_window_ms: 1_500,
            partial_stride_ms: 700,
            include_word_timestamps: false,
            model_id: None,
            task: None,
            temperature: None,
        }
    }
}
