//! Streaming Opus encoder: 48 kHz mono, fixed 20 ms packets.

use audiopus::coder::Encoder;
use audiopus::{Application, Channels, SampleRate};

use sotto_audio::{ResamplerQuality, StreamResampler};

use crate::encoder::StreamingEncoder;
use crate::error::SynthesisError;

const OPUS_FRAME_MS: usize = 20;

/// Upper bound for one encoded packet, per the Opus recommendation.
const MAX_PACKET_BYTES: usize = 4_000;

/// Resamples incoming PCM to the target rate, stages it as 16-bit samples,
/// and emits one Opus packet per full 20 ms frame. `flush` zero-pads the
/// residual into a final frame.
pub struct OpusStreamEncoder {
    encoder: Encoder,
    resampler: Option<StreamResampler>,
    staging: Vec<i16>,
    frame_samples: usize,
    closed: bool,
}

impl OpusStreamEncoder {
    pub fn new(source_rate: u32, target_rate: u32) -> Result<Self, SynthesisError> {
        let rate = match target_rate {
            8_000 => SampleRate::Hz8000,
            12_000 => SampleRate::Hz12000,
            16_000 => SampleRate::Hz16000,
            24_000 => SampleRate::Hz24000,
            48_000 => SampleRate::Hz48000,
            other => {
                return Err(SynthesisError::EncoderUnavailable(format!(
                    "unsupported Opus rate {}",
                    other
                )))
            }
        };
        let encoder = Encoder::new(rate, Channels::Mono, Application::Audio)
            .map_err(|e| SynthesisError::EncoderUnavailable(format!("Opus encoder: {}", e)))?;

        let resampler = if source_rate != target_rate {
            // Fast preset: the 20ms framing dominates latency already.
            Some(
                StreamResampler::new_with_quality(source_rate, target_rate, ResamplerQuality::Fast)
                    .map_err(|e| SynthesisError::EncoderUnavailable(e.to_string()))?,
            )
        } else {
            None
        };

        Ok(Self {
            encoder,
            resampler,
            staging: Vec::new(),
            frame_samples: target_rate as usize * OPUS_FRAME_MS / 1000,
            closed: false,
        })
    }

    fn encode_frame(&mut self, frame: &[i16]) -> Result<Vec<u8>, SynthesisError> {
        let mut packet = vec![0u8; MAX_PACKET_BYTES];
        let written = self
            .encoder
            .encode(frame, &mut packet)
            .map_err(|e| SynthesisError::SynthesisFailed(format!("Opus encode: {}", e)))?;
        packet.truncate(written);
        Ok(packet)
    }
}

impl StreamingEncoder for OpusStreamEncoder {
    fn encode(&mut self, pcm16: &[u8]) -> Result<Vec<Vec<u8>>, SynthesisError> {
        if self.closed || pcm16.is_empty() {
            return Ok(Vec::new());
        }

        let samples: Vec<i16> = pcm16
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();

        match &mut self.resampler {
            Some(resampler) => {
                let floats: Vec<f32> =
                    samples.iter().map(|&s| s as f32 / 32768.0).collect();
                let resampled = resampler
                    .process(&floats)
                    .map_err(|e| SynthesisError::SynthesisFailed(e.to_string()))?;
                self.staging.extend(
                    resampled
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16),
                );
            }
            None => self.staging.extend_from_slice(&samples),
        }

        let mut frames = Vec::new();
        while self.staging.len() >= self.frame_samples {
            let frame: Vec<i16> = self.staging.drain(..self.frame_samples).collect();
            frames.push(self.encode_frame(&frame)?);
        }
        Ok(frames)
    }

    fn flush(&mut self) -> Result<Vec<Vec<u8>>, SynthesisError> {
        if self.closed {
            return Ok(Vec::new());
        }
        self.closed = true;

        if self.staging.is_empty() {
            return Ok(Vec::new());
        }

        let mut frame = std::mem::take(&mut self.staging);
        frame.resize(self.frame_samples, 0);
        Ok(vec![self.encode_frame(&frame)?])
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
