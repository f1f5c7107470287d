//! Audio analysis modules
//!
//! This module provides traits for analysis backends and concrete implementations.
//! The trait abstraction allows swapping backends without changing pipeline code.

pub mod metadata;
pub mod sidecar;
pub mod stratum;
pub mod timbre;
pub mod traits;

pub use metadata::{display_label, extract_metadata};
pub use sidecar::{read_sidecar, sidecar_path, write_sidecar};
pub use stratum::StratumBeatTracker;
pub use timbre::SpectralTimbre;
pub use traits::{BeatTrack, BeatTracker, TimbreExtractor, TimbreProfile};

use crate::error::Result;
use crate::types::{AudioBuffer, TrackAnalysis};
use tracing::debug;

/// Run both backends over a mono buffer and combine their results
pub fn analyze_buffer(
    buffer: &AudioBuffer,
    beat_tracker: &dyn BeatTracker,
    timbre: &dyn TimbreExtractor,
) -> Result<TrackAnalysis> {
    let BeatTrack { tempo, beats } = beat_tracker.track(buffer)?;
    let TimbreProfile { loudness, segments } = timbre.extract(buffer)?;

    debug!(
        "Analyzed {:.1}s with {} + {}",
        buffer.duration,
        beat_tracker.name(),
        timbre.name()
    );

    Ok(TrackAnalysis {
        duration: buffer.duration,
        tempo,
        loudness,
        beats,
        segments,
    })
}
