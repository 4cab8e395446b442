//! Byte-array to canonical-audio decoding.
//!
//! Handles raw PCM16 payloads, containerised audio (WAV, MP3, OGG, FLAC,
//! AAC, M4A/MP4, WEBM) via symphonia, stereo mix-down, and the 5-minute
//! chunking used by batch transcription.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

use sotto_foundation::AudioError;

use crate::resampler::resample_buffer;
use crate::{samples_to_ms, SAMPLE_RATE_HZ};

/// Batch transcription chunk length: 5 minutes.
pub const CHUNK_DURATION_MS: u64 = 5 * 60 * 1000;

/// A contiguous piece of canonical audio cut from a longer recording.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    pub duration_ms: u64,
    pub offset_ms: u64,
}

/// Interpret little-endian PCM16 bytes as canonical-range f32 samples.
pub fn pcm16_bytes_to_f32(bytes: &[u8]) -> Result<Vec<f32>, AudioError> {
    if bytes.len() % 2 != 0 {
        return Err(AudioError::InvalidPcm(format!(
            "PCM16 payload has odd length {}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect())
}

/// Convert canonical f32 samples to little-endian PCM16 bytes.
pub fn f32_to_pcm16_bytes(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * 32767.0).round() as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Mix interleaved multi-channel samples down to mono by averaging.
pub fn mix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Map a client-supplied format hint to a probe extension. Unknown hints are
/// ignored so the probe can still sniff the container.
fn probe_extension(format_hint: Option<&str>) -> Option<&'static str> {
    match format_hint.map(|f| f.trim().to_ascii_lowercase()) {
        Some(ext) => match ext.as_str() {
            "mp3" => Some("mp3"),
            "wav" => Some("wav"),
            "ogg" => Some("ogg"),
            "flac" => Some("flac"),
            "aac" => Some("aac"),
            "m4a" | "mp4" => Some("mp4"),
            "webm" => Some("webm"),
            _ => None,
        },
        None => None,
    }
}

/// Decode a containerised audio blob into canonical audio: probe the
/// container, decode every packet, mix down, resample to 16 kHz.
pub fn decode_encoded(data: &[u8], format_hint: Option<&str>) -> Result<Vec<f32>, AudioError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data.to_vec())), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = probe_extension(format_hint) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::DecodeFailed(format!("unrecognised container: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::DecodeFailed("no decodable audio track".into()))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::DecodeFailed(format!("decoder init: {}", e)))?;

    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(SAMPLE_RATE_HZ);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(1)
        .max(1);

    let mut interleaved: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AudioError::DecodeFailed(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                if sample_buf.is_none() {
                    let spec = *decoded.spec();
                    sample_rate = spec.rate;
                    channels = spec.channels.count().max(1);
                    sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
                }
                if let Some(buf) = sample_buf.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    interleaved.extend_from_slice(buf.samples());
                }
            }
            // A corrupt packet is skippable; the rest of the stream may
            // still be fine.
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(target: "audio", "skipping undecodable packet: {}", e);
            }
            Err(e) => return Err(AudioError::DecodeFailed(e.to_string())),
        }
    }

    if interleaved.is_empty() {
        return Err(AudioError::DecodeFailed("container held no audio".into()));
    }

    let mono = mix_to_mono(&interleaved, channels);
    let canonical = resample_buffer(&mono, sample_rate, SAMPLE_RATE_HZ)?;

    info!(
        target: "audio",
        "decoded {:.1}s of audio ({} Hz, {} ch) to canonical form",
        canonical.len() as f32 / SAMPLE_RATE_HZ as f32,
        sample_rate,
        channels
    );
    Ok(canonical)
}

/// Split canonical audio into consecutive chunks of at most
/// `chunk_duration_ms`, each stamped with its offset.
pub fn chunk_audio(audio: &[f32], chunk_duration_ms: u64) -> Vec<AudioChunk> {
    let total_ms = samples_to_ms(audio.len());
    if total_ms <= chunk_duration_ms {
        return vec![AudioChunk {
            samples: audio.to_vec(),
            duration_ms: total_ms,
            offset_ms: 0,
        }];
    }

    let chunk_samples = crate::ms_to_samples(chunk_duration_ms);
    let mut chunks = Vec::new();
    let mut offset = 0usize;

    while offset < audio.len() {
        let end = (offset + chunk_samples).min(audio.len());
        let segment = &audio[offset..end];
        chunks.push(AudioChunk {
            samples: segment.to_vec(),
            duration_ms: samples_to_ms(segment.len()),
            offset_ms: samples_to_ms(offset),
        });
        offset = end;
    }

    info!(
        target: "audio",
        "split {:.1}s of audio into {} chunks",
        total_ms as f32 / 1000.0,
        chunks.len()
    );
    chunks
}

/// Decode an encoded blob and cut it into batch-transcription chunks.
pub fn preprocess_encoded(
    data: &[u8],
    format_hint: Option<&str>,
) -> Result<Vec<AudioChunk>, AudioError> {
    let audio = decode_encoded(data, format_hint)?;
    Ok(chunk_audio(&audio, CHUNK_DURATION_MS))
}
