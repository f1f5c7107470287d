//! Spectral timbre features using rustfft
//!
//! Each hop of the signal becomes one segment. Its vector holds the frame
//! loudness in dB, followed by the share of spectral energy in each of 11
//! log-spaced bands, also in dB.

use crate::analysis::traits::{TimbreExtractor, TimbreProfile};
use crate::error::{AutomixError, Result};
use crate::types::{AudioBuffer, Segment};
use rustfft::{num_complex::Complex, FftPlanner};
use tracing::debug;

/// FFT window length in samples
const FRAME_SIZE: usize = 2048;

/// Distance between frame starts in samples
const HOP_SIZE: usize = 1024;

/// Log-spaced spectral bands per frame
const BANDS: usize = 11;

/// Lower edge of the first band in Hz
const LOWEST_BAND_HZ: f64 = 40.0;

/// Levels are floored here instead of going to -inf on silence
const FLOOR_DB: f64 = -100.0;

/// Timbre extractor based on short-time band energies
#[derive(Debug, Default)]
pub struct SpectralTimbre;

impl SpectralTimbre {
    pub fn new() -> Self {
        Self
    }
}

impl TimbreExtractor for SpectralTimbre {
    fn extract(&self, buffer: &AudioBuffer) -> Result<TimbreProfile> {
        if buffer.is_empty() || buffer.sample_rate == 0 {
            return Err(AutomixError::analysis("No samples to analyze"));
        }

        let sample_rate = buffer.sample_rate as f64;
        let edges = band_edges(sample_rate);
        let window: Vec<f32> = (0..FRAME_SIZE)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / FRAME_SIZE as f32).cos()))
            .collect();

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FRAME_SIZE);
        let mut frame = vec![Complex::new(0.0f32, 0.0); FRAME_SIZE];
        let mut scratch = vec![Complex::new(0.0f32, 0.0); fft.get_inplace_scratch_len()];

        let samples = &buffer.samples;
        let hops = samples.len().div_ceil(HOP_SIZE);
        let hop_secs = HOP_SIZE as f64 / sample_rate;
        let mut segments = Vec::with_capacity(hops);

        for hop in 0..hops {
            let start = hop * HOP_SIZE;
            let available = &samples[start..(start + FRAME_SIZE).min(samples.len())];

            let level = db(mean_square(&available[..available.len().min(HOP_SIZE)]));

            for (i, slot) in frame.iter_mut().enumerate() {
                let s = available.get(i).copied().unwrap_or(0.0);
                *slot = Complex::new(s * window[i], 0.0);
            }
            fft.process_with_scratch(&mut frame, &mut scratch);

            let power: Vec<f64> = frame[..FRAME_SIZE / 2 + 1]
                .iter()
                .map(|c| (c.re as f64).powi(2) + (c.im as f64).powi(2))
                .collect();
            let total: f64 = power.iter().sum();

            let mut timbre = Vec::with_capacity(BANDS + 1);
            timbre.push(level);
            for band in edges.windows(2) {
                let energy: f64 = power[band[0]..band[1]].iter().sum();
                // Spectral shape only; loudness lives in coefficient 0
                timbre.push(if total > 0.0 {
                    db(energy / total)
                } else {
                    FLOOR_DB
                });
            }

            let start_secs = hop as f64 * hop_secs;
            segments.push(Segment {
                start: start_secs,
                duration: hop_secs.min(buffer.duration - start_secs).max(0.0),
                loudness_max: level,
                timbre,
            });
        }

        let loudness = db(mean_square(samples));
        debug!(
            "Extracted {} timbre segments, loudness {:.1} dB",
            segments.len(),
            loudness
        );

        Ok(TimbreProfile { loudness, segments })
    }

    fn dims(&self) -> usize {
        BANDS + 1
    }

    fn name(&self) -> &'static str {
        "spectral-bands"
    }
}

/// FFT bin boundaries of the log-spaced bands (`BANDS + 1` entries, strictly increasing)
fn band_edges(sample_rate: f64) -> Vec<usize> {
    let nyquist = sample_rate / 2.0;
    let bins = FRAME_SIZE / 2 + 1;
    let ratio = (nyquist / LOWEST_BAND_HZ).max(1.0);

    let mut edges = Vec::with_capacity(BANDS + 1);
    for k in 0..=BANDS {
        let hz = LOWEST_BAND_HZ * ratio.powf(k as f64 / BANDS as f64);
        let bin = ((hz / sample_rate) * FRAME_SIZE as f64).round() as usize;
        let lowest = edges.last().map(|&e: &usize| e + 1).unwrap_or(0);
        edges.push(bin.max(lowest).min(bins - (BANDS - k)));
    }
    edges
}

fn mean_square(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / samples.len() as f64
}

/// Power ratio to dB, floored
fn db(power: f64) -> f64 {
    if power > 0.0 {
        (10.0 * power.log10()).max(FLOOR_DB)
    } else {
        FLOOR_DB
    }
}
