//! Core data types for automix
//!
//! These types represent the domain model and flow through the pipeline.

use crate::error::{AutomixError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// Analysis primitives
// =============================================================================

/// A span of time in a track (a beat, a grid cell)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantum {
    /// Start time in seconds
    pub start: f64,
    /// Duration in seconds
    pub duration: f64,
}

impl Quantum {
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }

    /// End time in seconds
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Seconds of overlap with `[start, end)`
    pub fn overlap(&self, start: f64, end: f64) -> f64 {
        (self.end().min(end) - self.start.max(start)).max(0.0)
    }
}

/// A short, acoustically homogeneous region of a track with its timbre vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start time in seconds
    pub start: f64,
    /// Duration in seconds
    pub duration: f64,
    /// Peak loudness in dB
    #[serde(default)]
    pub loudness_max: f64,
    /// Timbre coefficients (12 for the built-in analyzer)
    pub timbre: Vec<f64>,
}

impl Segment {
    /// End time in seconds
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Analysis data attached to a track at ingestion
///
/// This is also the on-disk schema of `<file>.analysis.json` sidecars.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackAnalysis {
    /// Duration in seconds
    pub duration: f64,
    /// Tempo in BPM
    #[serde(default)]
    pub tempo: f64,
    /// Overall loudness in dB
    pub loudness: f64,
    /// Beat grid, ordered by start time
    pub beats: Vec<Quantum>,
    /// Timbre segments, ordered by start time
    pub segments: Vec<Segment>,
}

impl TrackAnalysis {
    /// Seconds covered by the beat grid, or the full duration without beats
    pub fn beat_span(&self) -> f64 {
        match (self.beats.first(), self.beats.last()) {
            (Some(first), Some(last)) => last.end() - first.start,
            _ => self.duration,
        }
    }

    /// Average beat duration in seconds
    pub fn mean_beat_duration(&self) -> Option<f64> {
        if self.beats.is_empty() {
            return None;
        }
        Some(self.beats.iter().map(|b| b.duration).sum::<f64>() / self.beats.len() as f64)
    }
}

// =============================================================================
// Track representation
// =============================================================================

/// Metadata extracted from audio file tags
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
}

/// One song of the program
#[derive(Debug, Clone)]
pub struct Track {
    /// Deterministic ID derived from the source identifier
    pub id: i32,
    /// Source identifier as given by the caller (path or URL)
    pub source: String,
    /// Human-readable label for logs and plan export
    pub label: String,
    /// Beat grid, segments and loudness
    pub analysis: TrackAnalysis,
    /// Decoded audio, required for rendering only
    pub audio: Option<Arc<StereoBuffer>>,
    /// Linear gain applied at render time
    pub gain: f64,
}

impl Track {
    /// Create a track with unit gain and no audio attached
    pub fn new(source: impl Into<String>, analysis: TrackAnalysis) -> Self {
        let source = source.into();
        Self {
            id: crate::ingest::generate_track_id(&source),
            label: crate::ingest::label_from_source(&source),
            source,
            analysis,
            audio: None,
            gain: 1.0,
        }
    }

    pub fn with_audio(mut self, audio: StereoBuffer) -> Self {
        self.audio = Some(Arc::new(audio));
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.analysis.duration
    }
}

// =============================================================================
// Transition parameters
// =============================================================================

/// The (inter, trans) pair, constant for a whole run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    /// Seconds of uninterrupted playback per track
    pub inter: f64,
    /// Seconds of crossfade between adjacent tracks
    pub trans: f64,
}

impl TransitionSpec {
    pub fn new(inter: f64, trans: f64) -> Result<Self> {
        for (name, value) in [("inter", inter), ("transition", trans)] {
            if !value.is_finite() || value < 0.0 {
                return Err(AutomixError::ConfigError(format!(
                    "{} must be a non-negative number of seconds, got {}",
                    name, value
                )));
            }
        }
        Ok(Self { inter, trans })
    }

    /// Shortest beat span a track needs to take part in a mix
    pub fn required_span(&self) -> f64 {
        self.inter + self.trans
    }
}

impl Default for TransitionSpec {
    fn default() -> Self {
        Self {
            inter: 8.0,
            trans: 8.0,
        }
    }
}

// =============================================================================
// Audio buffer types
// =============================================================================

/// Mono audio samples ready for analysis
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Mono samples normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Duration in seconds
    pub duration: f64,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        // Guard against division by zero - use 0 duration for invalid sample rate
        let duration = if sample_rate > 0 {
            samples.len() as f64 / sample_rate as f64
        } else {
            0.0
        };
        Self {
            samples,
            sample_rate,
            duration,
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Stereo audio buffer used for rendering
#[derive(Debug, Clone)]
pub struct StereoBuffer {
    /// Left channel samples normalized to [-1.0, 1.0]
    pub left: Vec<f32>,
    /// Right channel samples normalized to [-1.0, 1.0]
    pub right: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Duration in seconds
    pub duration: f64,
}

impl StereoBuffer {
    pub fn new(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Self {
        let num_samples = left.len().min(right.len());
        let duration = if sample_rate > 0 {
            num_samples as f64 / sample_rate as f64
        } else {
            0.0
        };
        Self {
            left,
            right,
            sample_rate,
            duration,
        }
    }

    /// Duplicate a mono signal onto both channels
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(samples.clone(), samples, sample_rate)
    }

    /// Create from interleaved samples
    pub fn from_interleaved(samples: &[f32], sample_rate: u32) -> Self {
        let num_frames = samples.len() / 2;
        let mut left = Vec::with_capacity(num_frames);
        let mut right = Vec::with_capacity(num_frames);

        for chunk in samples.chunks_exact(2) {
            left.push(chunk[0]);
            right.push(chunk[1]);
        }

        Self::new(left, right, sample_rate)
    }

    /// Number of samples per channel
    pub fn len(&self) -> usize {
        self.left.len().min(self.right.len())
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Average of both channels
    pub fn to_mono(&self) -> AudioBuffer {
        let samples = self
            .left
            .iter()
            .zip(self.right.iter())
            .map(|(l, r)| (l + r) * 0.5)
            .collect();
        AudioBuffer::new(samples, self.sample_rate)
    }
}

// =============================================================================
// Supported formats
// =============================================================================

/// Audio containers accepted as inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
    Flac,
    Aiff,
    Ogg,
    M4a,
    Mp4,
    Au,
}

impl AudioFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "aiff" | "aif" => Some(AudioFormat::Aiff),
            "ogg" => Some(AudioFormat::Ogg),
            "m4a" => Some(AudioFormat::M4a),
            "mp4" => Some(AudioFormat::Mp4),
            "au" => Some(AudioFormat::Au),
            _ => None,
        }
    }

    /// Check if a path has a supported extension
    pub fn is_supported_path(path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .is_some()
    }
}
