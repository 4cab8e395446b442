//! Streaming MP3 encoder: CBR 128 kbps mono via LAME.

use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, MonoPcm, Quality};

use crate::encoder::StreamingEncoder;
use crate::error::SynthesisError;

/// Feeds PCM16 into LAME and emits whatever bytes the codec returns; frame
/// boundaries are the encoder's business. `flush` drains the final frames.
pub struct Mp3StreamEncoder {
    encoder: mp3lame_encoder::Encoder,
    closed: bool,
}

impl Mp3StreamEncoder {
    pub fn new(sample_rate: u32, bitrate_kbps: u32) -> Result<Self, SynthesisError> {
        let bitrate = match bitrate_kbps {
            96 => Bitrate::Kbps96,
            128 => Bitrate::Kbps128,
            192 => Bitrate::Kbps192,
            other => {
                return Err(SynthesisError::EncoderUnavailable(format!(
                    "unsupported MP3 bitrate {}kbps",
                    other
                )))
            }
        };

        let mut builder = Builder::new().ok_or_else(|| {
            SynthesisError::EncoderUnavailable("LAME encoder allocation failed".into())
        })?;
        builder
            .set_num_channels(1)
            .map_err(|e| SynthesisError::EncoderUnavailable(format!("LAME channels: {:?}", e)))?;
        builder
            .set_sample_rate(sample_rate)
            .map_err(|e| SynthesisError::EncoderUnavailable(format!("LAME rate: {:?}", e)))?;
        builder
            .set_brate(bitrate)
            .map_err(|e| SynthesisError::EncoderUnavailable(format!("LAME bitrate: {:?}", e)))?;
        builder
            .set_quality(Quality::Good)
            .map_err(|e| SynthesisError::EncoderUnavailable(format!("LAME quality: {:?}", e)))?;
        let encoder = builder
            .build()
            .map_err(|e| SynthesisError::EncoderUnavailable(format!("LAME build: {:?}", e)))?;

        Ok(Self {
            encoder,
            closed: false,
        })
    }
}

impl StreamingEncoder for Mp3StreamEncoder {
    fn encode(&mut self, pcm16: &[u8]) -> Result<Vec<Vec<u8>>, SynthesisError> {
        if self.closed || pcm16.is_empty() {
            return Ok(Vec::new());
        }

        let samples: Vec<i16> = pcm16
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();

        let mut out = Vec::new();
        self.encoder
            .encode_to_vec(MonoPcm(&samples), &mut out)
            .map_err(|e| SynthesisError::SynthesisFailed(format!("MP3 encode: {:?}", e)))?;

        if out.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![out])
        }
    }

    fn flush(&mut self) -> Result<Vec<Vec<u8>>, SynthesisError> {
        if self.closed {
            return Ok(Vec::new());
        }
        self.closed = true;

        let mut out = Vec::new();
        self.encoder
            .flush_to_vec::<FlushNoGap>(&mut out)
            .map_err(|e| SynthesisError::SynthesisFailed(format!("MP3 flush: {:?}", e)))?;

        if out.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![out])
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_pcm16(samples: usize) -> Vec<u8> {
        (0..samples)
            .flat_map(|i| {
                let s = ((i as f32 * 0.03).sin() * 12_000.0) as i16;
                s.to_le_bytes()
            })
            .collect()
    }

    #[test]
    fn rejects_odd_bitrates() {
        assert!(Mp3StreamEncoder::new(24_000, 64).is_err());
    }

    #[test]
    fn encode_then_flush_produces_mp3_bytes() {
        let mut enc = Mp3StreamEncoder::new(24_000, 128).unwrap();
        // One second of tone: enough for LAME to emit several frames before
        // the flush.
        let mut frames = enc.encode(&tone_pcm16(24_000)).unwrap();
        frames.extend(enc.flush().unwrap());

        let total: usize = frames.iter().map(|f| f.len()).sum();
        // 128kbps CBR for 1s is ~16KB.
        assert!(
            total > 8_000 && total < 32_000,
            "unexpected MP3 size: {} bytes",
            total
        );
    }

    #[test]
    fn closed_encoder_is_inert() {
        let mut enc = Mp3StreamEncoder::new(24_000, 128).unwrap();
        enc.close();
        assert!(enc.encode(&tone_pcm16(2_400)).unwrap().is_empty());
        assert!(enc.flush().unwrap().is_empty());
    }
}
