use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use sotto_foundation::AudioError;

#[derive(Debug, Clone, Copy)]
pub enum ResamplerQuality {
    Fast,     // Lower quality, lower CPU usage
    Balanced, // Default quality/performance balance
    Quality,  // Higher quality, higher CPU usage
}

fn sinc_params(quality: ResamplerQuality) -> SincInterpolationParameters {
    match quality {
        ResamplerQuality::Fast => SincInterpolationParameters {
            sinc_len: 32,
            f_cutoff: 0.92,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 64,
            window: WindowFunction::Blackman,
        },
        ResamplerQuality::Balanced => SincInterpolationParameters {
            sinc_len: 64,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 128,
            window: WindowFunction::Blackman2,
        },
        ResamplerQuality::Quality => SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.97,
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        },
    }
}

/// Streaming resampler for mono f32 audio built on Rubato's sinc
/// interpolation.
///
/// Accepts arbitrary-sized input blocks; internal buffering satisfies
/// Rubato's fixed input-chunk requirement. Output is whatever became
/// available after this block, so callers must treat the stream as delayed
/// by the filter length.
pub struct StreamResampler {
    in_rate: u32,
    out_rate: u32,
    resampler: SincFixedIn<f32>,
    input_buffer: Vec<f32>,
    chunk_size: usize,
}

impl StreamResampler {
    pub fn new(in_rate: u32, out_rate: u32) -> Result<Self, AudioError> {
        Self::new_with_quality(in_rate, out_rate, ResamplerQuality::Balanced)
    }

    pub fn new_with_quality(
        in_rate: u32,
        out_rate: u32,
        quality: ResamplerQuality,
    ) -> Result<Self, AudioError> {
        // 512 samples keeps latency low: 32ms at 16kHz, which lines up with
        // the VAD's appetite for small frames.
        let chunk_size = 512;

        let resampler = SincFixedIn::<f32>::new(
            out_rate as f64 / in_rate as f64,
            2.0,
            sinc_params(quality),
            chunk_size,
            1,
        )
        .map_err(|e| AudioError::ResampleFailed(format!("resampler init: {}", e)))?;

        Ok(Self {
            in_rate,
            out_rate,
            resampler,
            input_buffer: Vec::with_capacity(chunk_size * 2),
            chunk_size,
        })
    }

    /// Process an arbitrary block of mono f32 samples, returning whatever
    /// resampled output became available.
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>, AudioError> {
        if self.in_rate == self.out_rate {
            return Ok(input.to_vec());
        }

        self.input_buffer.extend_from_slice(input);

        let mut output = Vec::new();
        while self.input_buffer.len() >= self.chunk_size {
            let chunk: Vec<f32> = self.input_buffer.drain(..self.chunk_size).collect();
            let frames = self
                .resampler
                .process(&[chunk], None)
                .map_err(|e| AudioError::ResampleFailed(e.to_string()))?;
            if let Some(channel) = frames.into_iter().next() {
                output.extend_from_slice(&channel);
            }
        }

        Ok(output)
    }

    /// Reset internal state, clearing buffers and the filter history.
    pub fn reset(&mut self) {
        self.input_buffer.clear();
        self.resampler.reset();
    }

    pub fn input_rate(&self) -> u32 {
        self.in_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.out_rate
    }
}

/// One-shot resample of a complete mono buffer. Feeds full chunks, then the
/// remainder via a partial call, then drains the filter tail.
pub fn resample_buffer(input: &[f32], in_rate: u32, out_rate: u32) -> Result<Vec<f32>, AudioError> {
    if in_rate == out_rate {
        return Ok(input.to_vec());
    }
    if input.is_empty() {
        return Ok(Vec::new());
    }

    let chunk_size = 1024;
    let mut resampler = SincFixedIn::<f32>::new(
        out_rate as f64 / in_rate as f64,
        2.0,
        sinc_params(ResamplerQuality::Balanced),
        chunk_size,
        1,
    )
    .map_err(|e| AudioError::ResampleFailed(format!("resampler init: {}", e)))?;

    let mut output = Vec::with_capacity(input.len() * out_rate as usize / in_rate as usize + 64);

    let mut pos = 0;
    while input.len() - pos >= chunk_size {
        let frames = resampler
            .process(&[&input[pos..pos + chunk_size]], None)
            .map_err(|e| AudioError::ResampleFailed(e.to_string()))?;
        if let Some(channel) = frames.into_iter().next() {
            output.extend_from_slice(&channel);
        }
        pos += chunk_size;
    }

    if pos < input.len() {
        let frames = resampler
            .process_partial(Some(&[&input[pos..]]), None)
            .map_err(|e| AudioError::ResampleFailed(e.to_string()))?;
        if let Some(channel) = frames.into_iter().next() {
            output.extend_from_slice(&channel);
        }
    }

    // Drain the sinc filter delay so the tail of the signal is not cut off.
    for _ in 0..2 {
        let frames = resampler
            .process_partial::<Vec<f32>>(None, None)
            .map_err(|e| AudioError::ResampleFailed(e.to_string()))?;
        match frames.into_iter().next() {
            Some(channel) if !channel.is_empty() => output.extend_from_slice(&channel),
            _ => break,
        }
    }

    Ok(output)
}
