//! Buffered container encoders: WAV via hound, FLAC via flacenc.

use std::io::Cursor;

use flacenc::component::BitRepr;
use flacenc::error::Verify;

use crate::error::SynthesisError;
use crate::types::AudioFormat;

/// Encode a complete PCM16 recording into a buffered container. Only the
/// buffered formats are valid here; streaming formats never reach this
/// path.
pub fn encode_buffered(
    pcm16: &[u8],
    sample_rate: u32,
    format: AudioFormat,
) -> Result<Vec<u8>, SynthesisError> {
    match format {
        AudioFormat::Wav => encode_wav(pcm16, sample_rate),
        AudioFormat::Flac => encode_flac(pcm16, sample_rate),
        other => Err(SynthesisError::EncoderUnavailable(format!(
            "{} is not a buffered format",
            other.as_str()
        ))),
    }
}

fn samples_of(pcm16: &[u8]) -> Vec<i16> {
    pcm16
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

fn encode_wav(pcm16: &[u8], sample_rate: u32) -> Result<Vec<u8>, SynthesisError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| SynthesisError::SynthesisFailed(format!("WAV writer: {}", e)))?;
        for sample in samples_of(pcm16) {
            writer
                .write_sample(sample)
                .map_err(|e| SynthesisError::SynthesisFailed(format!("WAV write: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| SynthesisError::SynthesisFailed(format!("WAV finalize: {}", e)))?;
    }
    Ok(cursor.into_inner())
}

fn encode_flac(pcm16: &[u8], sample_rate: u32) -> Result<Vec<u8>, SynthesisError> {
    let samples: Vec<i32> = samples_of(pcm16).into_iter().map(i32::from).collect();

    let config = flacenc::config::Encoder::default()
        .into_verified()
        .map_err(|e| SynthesisError::SynthesisFailed(format!("FLAC config: {:?}", e)))?;
    let source = flacenc::source::MemSource::from_samples(&samples, 1, 16, sample_rate as usize);
    let stream = flacenc::encode_with_fixed_block_size(&config, source, config.block_size)
        .map_err(|e| SynthesisError::SynthesisFailed(format!("FLAC encode: {:?}", e)))?;

    let mut sink = flacenc::bitsink::ByteSink::new();
    stream
        .write(&mut sink)
        .map_err(|e| SynthesisError::SynthesisFailed(format!("FLAC write: {:?}", e)))?;
    Ok(sink.as_slice().to_vec())
}
