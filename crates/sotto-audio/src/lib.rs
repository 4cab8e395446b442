//! Canonical-audio plumbing for sotto.
//!
//! Everything downstream of this crate works on canonical audio: mono f32
//! samples in [-1, 1] at 16 kHz. The producers here (PCM16 conversion,
//! container decode, Opus frame decode) all resample and mix down before
//! exposing samples.

pub mod codec;
pub mod opus;
pub mod resampler;
pub mod ring_buffer;

pub use codec::{AudioChunk, CHUNK_DURATION_MS};
pub use opus::{OpusStreamDecoder, OPUS_FRAME_MS, OPUS_SAMPLE_RATE};
pub use resampler::{ResamplerQuality, StreamResampler};
pub use ring_buffer::RingBuffer;

pub use sotto_foundation::AudioError;

/// Canonical sample rate of everything downstream of decode.
pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// Canonical samples per millisecond.
pub const MS_SAMPLE_RATE: usize = (SAMPLE_RATE_HZ / 1000) as usize;

/// Duration in milliseconds of `sample_count` samples at the canonical rate.
pub fn samples_to_ms(sample_count: usize) -> u64 {
    (sample_count as u64 * 1000) / SAMPLE_RATE_HZ as u64
}

/// Sample count of `ms` milliseconds at the canonical rate.
pub fn ms_to_samples(ms: u64) -> usize {
    ms as usize * MS_SAMPLE_RATE
}
