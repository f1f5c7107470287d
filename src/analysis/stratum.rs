//! Stratum-DSP based beat tracking
//!
//! stratum-dsp trims leading silence before tracking, so its beat times are
//! shifted back into track time here.

use crate::analysis::traits::{BeatTrack, BeatTracker};
use crate::error::{AutomixError, Result};
use crate::types::{AudioBuffer, Quantum};
use stratum_dsp::{analyze_audio, AnalysisConfig};
use tracing::debug;

/// Frames quieter than this count as silence (matches the stratum-dsp default)
const SILENCE_DB: f64 = -40.0;

/// Frame length for the silence scan
const SILENCE_FRAME: usize = 2048;

/// Shorter leading silences are not trimmed by stratum-dsp
const MIN_SILENCE_SECS: f64 = 0.5;

/// Beat tracker using stratum-dsp
///
/// Uses onset detection and tempo estimation tuned for dance music.
pub struct StratumBeatTracker;

impl StratumBeatTracker {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StratumBeatTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl BeatTracker for StratumBeatTracker {
    fn track(&self, buffer: &AudioBuffer) -> Result<BeatTrack> {
        debug!(
            "Tracking beats with stratum-dsp ({} samples, {}Hz)",
            buffer.len(),
            buffer.sample_rate
        );

        let config = AnalysisConfig::default();

        let result = analyze_audio(&buffer.samples, buffer.sample_rate, config)
            .map_err(|e| AutomixError::analysis(format!("Beat tracking failed: {}", e)))?;

        let offset = leading_silence(buffer);
        let times: Vec<f64> = result
            .beat_grid
            .beats
            .iter()
            .map(|&t| t as f64 + offset)
            .collect();
        let tempo = result.bpm as f64;

        let beats = if times.len() >= 2 {
            beats_from_times(&times, buffer.duration)
        } else {
            regular_grid(tempo, offset, buffer.duration)
        };

        debug!(
            "Detected {:.2} BPM (confidence {:.2}), {} beats, {:.2}s leading silence",
            tempo,
            result.bpm_confidence,
            beats.len(),
            offset
        );

        Ok(BeatTrack { tempo, beats })
    }

    fn name(&self) -> &'static str {
        "stratum-dsp"
    }
}

/// Seconds of silence before the first audible frame, or 0 if under the trim threshold
fn leading_silence(buffer: &AudioBuffer) -> f64 {
    if buffer.sample_rate == 0 {
        return 0.0;
    }
    let threshold = 10f64.powf(SILENCE_DB / 20.0);
    let silent_frames = buffer
        .samples
        .chunks(SILENCE_FRAME)
        .take_while(|frame| {
            let energy = frame.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>();
            (energy / frame.len() as f64).sqrt() < threshold
        })
        .count();

    let secs = (silent_frames * SILENCE_FRAME).min(buffer.len()) as f64 / buffer.sample_rate as f64;
    if secs >= MIN_SILENCE_SECS {
        secs
    } else {
        0.0
    }
}

/// Turn beat onsets into quanta lasting until the next beat
///
/// The last beat lasts as long as the one before it, clipped to the track.
fn beats_from_times(times: &[f64], duration: f64) -> Vec<Quantum> {
    let mut sorted: Vec<f64> = times
        .iter()
        .copied()
        .filter(|t| t.is_finite() && *t >= 0.0 && *t < duration)
        .collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.dedup_by(|a, b| (*a - *b).abs() < 1e-6);

    let mut beats: Vec<Quantum> = sorted
        .windows(2)
        .map(|w| Quantum::new(w[0], w[1] - w[0]))
        .collect();

    if let Some(&last) = sorted.last() {
        let previous = beats.last().map(|q| q.duration).unwrap_or(duration - last);
        beats.push(Quantum::new(last, previous.min(duration - last)));
    }
    beats
}

/// Evenly spaced beats at `tempo` BPM from `start`, for when the tracker found no grid
fn regular_grid(tempo: f64, start: f64, duration: f64) -> Vec<Quantum> {
    if !tempo.is_finite() || tempo <= 0.0 {
        return Vec::new();
    }
    let period = 60.0 / tempo;
    let count = ((duration - start) / period).floor().max(0.0) as usize;
    (0..count)
        .map(|i| Quantum::new(start + i as f64 * period, period))
        .collect()
}
