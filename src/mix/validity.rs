//! Transition validity: can a track hold one playback segment and two
//! half-transitions?

use crate::error::AutomixError;
use crate::features::PreparedTrack;
use crate::types::{Track, TransitionSpec};
use tracing::info;

/// Tracks that passed the validity filter, in input order
#[derive(Debug, Default)]
pub struct ValidatedTracks {
    pub tracks: Vec<PreparedTrack>,
    /// One `InvalidTrack` error per excluded track
    pub rejected: Vec<AutomixError>,
}

impl ValidatedTracks {
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// True if the track's beat span is at least `inter + trans` seconds
///
/// Borderline spans are valid.
pub fn is_valid(track: &Track, spec: &TransitionSpec) -> bool {
    track.analysis.beat_span() >= spec.required_span()
}

/// Keep the tracks that can hold a transition, preserving order
pub fn filter_valid(tracks: Vec<PreparedTrack>, spec: &TransitionSpec) -> ValidatedTracks {
    let mut validated = ValidatedTracks::default();

    for prepared in tracks {
        if is_valid(&prepared.track, spec) {
            validated.tracks.push(prepared);
            continue;
        }
        let err = AutomixError::InvalidTrack {
            track: prepared.track.label.clone(),
            reason: format!(
                "beat span {:.2}s is shorter than inter + transition ({:.2}s)",
                prepared.track.analysis.beat_span(),
                spec.required_span()
            ),
        };
        info!("Excluding track: {}", err);
        validated.rejected.push(err);
    }

    validated
}
