//! Analysis trait abstractions
//!
//! These traits define the interface for swappable analysis backends.
//! Current implementations use stratum-dsp for beats and rustfft for timbre.

use crate::error::Result;
use crate::types::{AudioBuffer, Quantum, Segment};

/// Beat grid and tempo of one track
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeatTrack {
    /// Tempo in BPM
    pub tempo: f64,
    /// Beats in track time, ordered
    pub beats: Vec<Quantum>,
}

/// Timbre segments and overall loudness of one track
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimbreProfile {
    /// Overall loudness in dB
    pub loudness: f64,
    pub segments: Vec<Segment>,
}

/// Beat tracking backend
pub trait BeatTracker: Send + Sync {
    /// Detect tempo and beat positions from mono samples
    fn track(&self, buffer: &AudioBuffer) -> Result<BeatTrack>;

    /// Get the name of this tracker (for logging)
    fn name(&self) -> &'static str;
}

/// Timbre feature backend
pub trait TimbreExtractor: Send + Sync {
    /// Split the track into segments with a timbre vector each
    fn extract(&self, buffer: &AudioBuffer) -> Result<TimbreProfile>;

    /// Number of coefficients per timbre vector
    fn dims(&self) -> usize;

    /// Get the name of this extractor (for logging)
    fn name(&self) -> &'static str;
}
