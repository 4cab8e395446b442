//! Energy-based reference VAD model.
//!
//! Deterministic dBFS gate over fixed hops. Not a replacement for a neural
//! model on real speech, but it honours the same span contract, which makes
//! it usable for tests and model-free deployments.

use crate::types::SpeechSpan;
use crate::VadModel;
use sotto_foundation::VadError;
use sotto_audio::MS_SAMPLE_RATE;

/// Analysis hop: 512 samples = 32 ms at 16 kHz.
const HOP_SAMPLES: usize = 512;

const SILENCE_FLOOR_DB: f32 = -100.0;

pub struct EnergyVad;

impl EnergyVad {
    pub fn new() -> Self {
        Self
    }

    fn dbfs(frame: &[f32]) -> f32 {
        if frame.is_empty() {
            return SILENCE_FLOOR_DB;
        }
        let mean_square: f32 =
            frame.iter().map(|&s| s * s).sum::<f32>() / frame.len() as f32;
        let rms = mean_square.sqrt();
        if rms <= 1e-10 {
            SILENCE_FLOOR_DB
        } else {
            20.0 * rms.log10()
        }
    }

    /// Map the [0, 1] model threshold onto a dBFS cutoff. 0.0 gates at
    /// -50 dBFS (very permissive), 1.0 at -20 dBFS.
    fn cutoff_db(threshold: f32) -> f32 {
        -50.0 + 30.0 * threshold.clamp(0.0, 1.0)
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new()
    }
}

impl VadModel for EnergyVad {
    fn speech_spans(
        &self,
        audio: &[f32],
        threshold: f32,
        min_silence_duration_ms: u32,
        speech_pad_ms: u32,
        min_speech_duration_ms: u32,
    ) -> Result<Vec<SpeechSpan>, VadError> {
        if audio.is_empty() {
            return Ok(Vec::new());
        }

        let cutoff = Self::cutoff_db(threshold);
        let min_silence_samples = min_silence_duration_ms as usize * MS_SAMPLE_RATE;
        let min_speech_samples = min_speech_duration_ms as usize * MS_SAMPLE_RATE;
        let pad_samples = speech_pad_ms as usize * MS_SAMPLE_RATE;

        // Raw spans of consecutive above-cutoff hops.
        let mut spans: Vec<SpeechSpan> = Vec::new();
        let mut open: Option<usize> = None;
        let mut pos = 0;
        while pos < audio.len() {
            let end = (pos + HOP_SAMPLES).min(audio.len());
            let voiced = Self::dbfs(&audio[pos..end]) >= cutoff;
            match (voiced, open) {
                (true, None) => open = Some(pos),
                (false, Some(start)) => {
                    spans.push(SpeechSpan {
                        start_sample: start,
                        end_sample: pos,
                    });
                    open = None;
                }
                _ => {}
            }
            pos = end;
        }
        if let Some(start) = open {
            spans.push(SpeechSpan {
                start_sample: start,
                end_sample: audio.len(),
            });
        }

        // Bridge gaps shorter than the silence debounce.
        let mut merged: Vec<SpeechSpan> = Vec::new();
        for span in spans {
            match merged.last_mut() {
                Some(prev) if span.start_sample.saturating_sub(prev.end_sample)
                    < min_silence_samples =>
                {
                    prev.end_sample = span.end_sample;
                }
                _ => merged.push(span),
            }
        }

        // Drop too-short spans, then pad the survivors, clamped to the
        // window.
        let out = merged
            .into_iter()
            .filter(|s| s.end_sample - s.start_sample >= min_speech_samples)
            .map(|s| SpeechSpan {
                start_sample: s.start_sample.saturating_sub(pad_samples),
                end_sample: (s.end_sample + pad_samples).min(audio.len()),
            })
            .collect();

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(ms: usize, amplitude: f32) -> Vec<f32> {
        (0..ms * MS_SAMPLE_RATE)
            .map(|i| {
                (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16_000.0).sin() * amplitude
            })
            .collect()
    }

    #[test]
    fn silence_yields_no_spans() {
        let vad = EnergyVad::new();
        let spans = vad
            .speech_spans(&vec![0.0; 16_000], 0.6, 500, 100, 250)
            .unwrap();
        assert!(spans.is_empty());
    }

    #[test]
    fn tone_in_silence_yields_one_padded_span() {
        let vad = EnergyVad::new();
        let mut audio = vec![0.0f32; 4_800]; // 300ms silence
        audio.extend(sine(400, 0.3));
        audio.extend(vec![0.0f32; 4_800]);

        let spans = vad.speech_spans(&audio, 0.6, 100, 100, 250).unwrap();
        assert_eq!(spans.len(), 1);
        let span = spans[0];
        // Tone starts at sample 4800; padding pulls the span start earlier.
        assert!(span.start_sample <= 4_800);
        assert!(span.start_sample >= 4_800 - 2_000);
        assert!(span.end_sample >= 4_800 + 400 * MS_SAMPLE_RATE - 1_024);
    }

    #[test]
    fn short_blip_is_dropped() {
        let vad = EnergyVad::new();
        let mut audio = vec![0.0f32; 8_000];
        audio.extend(sine(100, 0.5)); // 100ms < min_speech 250ms
        audio.extend(vec![0.0f32; 8_000]);

        let spans = vad.speech_spans(&audio, 0.6, 500, 100, 250).unwrap();
        assert!(spans.is_empty());
    }

    #[test]
    fn nearby_spans_are_bridged() {
        let vad = EnergyVad::new();
        let mut audio = sine(300, 0.3);
        audio.extend(vec![0.0f32; 200 * MS_SAMPLE_RATE]); // 200ms gap < 500ms
        audio.extend(sine(300, 0.3));

        let spans = vad.speech_spans(&audio, 0.6, 500, 0, 250).unwrap();
        assert_eq!(spans.len(), 1);
    }
}
