//! Streaming text-to-speech for sotto.
//!
//! Text is pre-chunked at sentence/word boundaries, each chunk is driven
//! through the synthesis engine (with CPU fallback on OOM), and the PCM
//! stream is multiplexed through one of five output codecs: raw PCM and the
//! streaming Opus/MP3 encoders emit frames as audio arrives; WAV and FLAC
//! buffer and encode once at the end.

pub mod chunker;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod synthesizer;
pub mod types;

pub use chunker::{chunk_text, MAX_CHUNK_CHARS};
pub use encoder::{
    encode_buffered, streaming_encoder, Mp3StreamEncoder, OpusStreamEncoder, PcmPassthrough,
    StreamingEncoder,
};
pub use engine::TtsEngine;
pub use error::SynthesisError;
pub use synthesizer::Synthesizer;
pub use types::{AudioFormat, SynthesisConfig, TTS_SAMPLE_RATE};
