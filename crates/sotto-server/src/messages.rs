//! Tagged message unions for both streaming services.
//!
//! These mirror the wire schema's oneof shapes; the transport adapter maps
//! protobuf messages onto them one-to-one.

use serde::{Deserialize, Serialize};

use sotto_stt::{SessionConfig, Transcript};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SttClientMessage {
    Config(SessionConfig),
    Audio {
        pcm16: Vec<u8>,
        sample_rate: Option<u32>,
    },
    EncodedAudio {
        data: Vec<u8>,
        format: Option<String>,
    },
    OpusFrame {
        data: Vec<u8>,
        sample_rate: Option<u32>,
        channels: Option<u32>,
    },
    EndOfStream,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SttServerMessage {
    Ready,
    SpeechStarted {
        timestamp_ms: u64,
    },
    SpeechStopped {
        timestamp_ms: u64,
    },
    Transcript(Transcript),
    Error {
        message: String,
        code: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsSessionConfig {
    pub voice_id: String,
    pub sample_rate: Option<u32>,
    pub speed: Option<f32>,
    pub response_format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TtsClientMessage {
    Config(TtsSessionConfig),
    Text { text: String },
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TtsUsage {
    pub audio_ms: u64,
    pub processing_ms: u64,
    pub text_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TtsServerMessage {
    Ready {
        voice_id: String,
        sample_rate: u32,
    },
    Audio {
        data: Vec<u8>,
        format: String,
        sample_rate: u32,
        timestamp_ms: u64,
        transcript: Option<String>,
    },
    Done {
        audio_duration_ms: u64,
        processing_duration_ms: u64,
        text_length: usize,
        usage: TtsUsage,
        transcript: String,
    },
    Error {
        message: String,
        code: u32,
    },
}
