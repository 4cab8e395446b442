//! Opus RTP frame decoding.
//!
//! Clients ship 20 ms Opus frames, usually at 48 kHz. The decoder is built
//! lazily by the session handler from the first frame's rate/channel pair;
//! output is canonical-range mono f32 at the decoder's native rate (the
//! caller resamples to 16 kHz).


use audiopus::coder::Decoder;
use audiopus::{Channels, SampleRate};

use sotto_foundation::AudioError;

use crate::codec::mix_to_mono;

pub const OPUS_SAMPLE_RATE: u32 = 48_000;
pub const OPUS_FRAME_MS: usize = 20;

fn map_sample_rate(hz: u32) -> Result<SampleRate, AudioError> {
    match hz {
        8_000 => Ok(SampleRate::Hz8000),
        12_000 => Ok(SampleRate::Hz12000),
        16_000 => Ok(SampleRate::Hz16000),
        24_000 => Ok(SampleRate::Hz24000),
        48_000 => Ok(SampleRate::Hz48000),
        other => Err(AudioError::UnsupportedFormat(format!(
            "unsupported Opus sample rate {}",
            other
        ))),
    }
}

pub struct OpusStreamDecoder {
    decoder: Decoder,
    sample_rate: u32,
    channels: usize,
}

impl OpusStreamDecoder {
    pub fn new(sample_rate: u32, channels: usize) -> Result<Self, AudioError> {
        let rate = map_sample_rate(sample_rate)?;
        let ch = match channels {
            1 => Channels::Mono,
            2 => Channels::Stereo,
            other => {
                return Err(AudioError::UnsupportedFormat(format!(
                    "unsupported Opus channel count {}",
                    other
                )))
            }
        };
        let decoder = Decoder::new(rate, ch)
            .map_err(|e| AudioError::OpusDecodeFailed(format!("decoder init: {}", e)))?;
        Ok(Self {
            decoder,
            sample_rate,
            channels,
        })
    }

    /// Decode one Opus packet to mono f32 at the decoder's sample rate.
    pub fn decode(&mut self, packet: &[u8]) -> Result<Vec<f32>, AudioError> {
        // One 20ms frame; Opus packets may legally carry up to 120ms.
        let max_samples = (self.sample_rate as usize / 1000) * OPUS_FRAME_MS * 6;
        let mut output = vec![0f32; max_samples * self.channels];

        let packet = audiopus::packet::Packet::try_from(packet)
            .map_err(|e| AudioError::OpusDecodeFailed(format!("invalid packet: {:?}", e)))?;
        let signals = audiopus::MutSignals::try_from(&mut output)
            .map_err(|e| AudioError::OpusDecodeFailed(format!("output buffer: {:?}", e)))?;

        let decoded = self
            .decoder
            .decode_float(Some(packet), signals, false)
            .map_err(|e| AudioError::OpusDecodeFailed(e.to_string()))?;

        output.truncate(decoded * self.channels);
        if self.channels == 2 {
            Ok(mix_to_mono(&output, 2))
        } else {
            Ok(output)
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}
