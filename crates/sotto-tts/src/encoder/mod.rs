//! Output codecs for the TTS stream.
//!
//! Two regimes: streaming encoders (`pcm`, `opus`, `mp3`) accept PCM16
//! blocks and emit encoded frames incrementally; buffered formats (`wav`,
//! `flac`) accumulate on the handler side and go through
//! [`encode_buffered`] once synthesis completes.

mod buffered;
mod mp3;
mod opus;

pub use buffered::encode_buffered;
pub use mp3::Mp3StreamEncoder;
pub use opus::OpusStreamEncoder;

use crate::error::SynthesisError;
use crate::types::AudioFormat;

/// Incremental encoder: frame-out-as-frame-in.
///
/// `flush` emits whatever the codec still holds and closes the encoder;
/// `close` is idempotent, and both `encode` and `flush` are no-ops once
/// closed.
pub trait StreamingEncoder: Send {
    /// Feed a block of 16-bit LE PCM; returns zero or more encoded frames.
    fn encode(&mut self, pcm16: &[u8]) -> Result<Vec<Vec<u8>>, SynthesisError>;

    /// Emit final frames and close.
    fn flush(&mut self) -> Result<Vec<Vec<u8>>, SynthesisError>;

    fn close(&mut self);
}

/// `pcm` passthrough: the identity streaming encoder.
pub struct PcmPassthrough {
    closed: bool,
}

impl PcmPassthrough {
    pub fn new() -> Self {
        Self { closed: false }
    }
}

impl Default for PcmPassthrough {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingEncoder for PcmPassthrough {
    fn encode(&mut self, pcm16: &[u8]) -> Result<Vec<Vec<u8>>, SynthesisError> {
        if self.closed || pcm16.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![pcm16.to_vec()])
    }

    fn flush(&mut self) -> Result<Vec<Vec<u8>>, SynthesisError> {
        self.closed = true;
        Ok(Vec::new())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Build the streaming encoder for a format, or report why it cannot
/// stream.
pub fn streaming_encoder(
    format: AudioFormat,
    source_rate: u32,
) -> Result<Box<dyn StreamingEncoder>, SynthesisError> {
    match format {
        AudioFormat::Pcm => Ok(Box::new(PcmPassthrough::new())),
        AudioFormat::Opus => Ok(Box::new(OpusStreamEncoder::new(source_rate, 48_000)?)),
        AudioFormat::Mp3 => Ok(Box::new(Mp3StreamEncoder::new(source_rate, 128)?)),
        AudioFormat::Wav | AudioFormat::Flac => Err(SynthesisError::EncoderUnavailable(format!(
            "{} is a buffered format",
            format.as_str()
        ))),
    }
}
