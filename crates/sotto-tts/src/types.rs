//! Core types for text-to-speech functionality.

use serde::{Deserialize, Serialize};

use crate::error::SynthesisError;

/// Native synthesis rate of the TTS engines.
pub const TTS_SAMPLE_RATE: u32 = 24_000;

/// Response container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// 16-bit LE PCM, 24 kHz mono, streamed frame-for-frame.
    Pcm,
    /// Buffered WAV container.
    Wav,
    /// Buffered FLAC container.
    Flac,
    /// Streaming Opus, 48 kHz mono, 20 ms packets.
    Opus,
    /// Streaming MP3, CBR 128 kbps.
    Mp3,
}

impl AudioFormat {
    pub fn parse(s: &str) -> Result<Self, SynthesisError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pcm" | "s16le" => Ok(AudioFormat::Pcm),
            "wav" => Ok(AudioFormat::Wav),
            "flac" => Ok(AudioFormat::Flac),
            "opus" => Ok(AudioFormat::Opus),
            "mp3" => Ok(AudioFormat::Mp3),
            other => Err(SynthesisError::InvalidFormat(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Pcm => "pcm",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::Opus => "opus",
            AudioFormat::Mp3 => "mp3",
        }
    }

    /// Streaming formats emit frames as synthesis progresses; buffered ones
    /// accumulate and encode once at the end.
    pub fn is_streaming(&self) -> bool {
        matches!(self, AudioFormat::Pcm | AudioFormat::Opus | AudioFormat::Mp3)
    }

    /// Sample rate of the bytes on the wire.
    pub fn output_sample_rate(&self) -> u32 {
        match self {
            AudioFormat::Opus => 48_000,
            _ => TTS_SAMPLE_RATE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Default speaking speed when the session does not set one.
    pub speed: f32,
    /// Retry an OOM-failed chunk on the CPU-resident engine.
    pub fallback_to_cpu: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            fallback_to_cpu: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_known_formats_case_insensitively() {
        assert_eq!(AudioFormat::parse("OPUS").unwrap(), AudioFormat::Opus);
        assert_eq!(AudioFormat::parse("s16le").unwrap(), AudioFormat::Pcm);
        assert!(matches!(
            AudioFormat::parse("ogg"),
            Err(SynthesisError::InvalidFormat(_))
        ));
    }

    #[test]
    fn streaming_split_matches_the_protocol() {
        assert!(AudioFormat::Pcm.is_streaming());
        assert!(AudioFormat::Opus.is_streaming());
        assert!(AudioFormat::Mp3.is_streaming());
        assert!(!AudioFormat::Wav.is_streaming());
        assert!(!AudioFormat::Flac.is_streaming());
    }

    #[test]
    fn opus_reports_its_resampled_rate() {
        assert_eq!(AudioFormat::Opus.output_sample_rate(), 48_000);
        assert_eq!(AudioFormat::Mp3.output_sample_rate(), 24_000);
    }
}
