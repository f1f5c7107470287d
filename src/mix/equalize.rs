//! Loudness equalization
//!
//! Each track gets a linear gain that brings its analyzed loudness to the
//! median loudness of the program.

use super::sequencer::OrderedTracks;
use crate::error::{AutomixError, Result};
use crate::features::PreparedTrack;
use tracing::info;

/// The final, non-empty track list handed to the transition planner
#[derive(Debug, Clone)]
pub struct MixSequence {
    tracks: Vec<PreparedTrack>,
}

impl MixSequence {
    /// Equalize the ordered tracks and commit them
    pub fn equalized(ordered: OrderedTracks, max_boost_db: f64) -> Result<Self> {
        let mut tracks = ordered.tracks;
        if tracks.is_empty() {
            return Err(AutomixError::EmptyInput);
        }
        equalize_tracks(&mut tracks, max_boost_db);
        Ok(Self { tracks })
    }

    /// Commit the ordered tracks with their gains untouched
    pub fn unequalized(ordered: OrderedTracks) -> Result<Self> {
        if ordered.tracks.is_empty() {
            return Err(AutomixError::EmptyInput);
        }
        Ok(Self {
            tracks: ordered.tracks,
        })
    }

    pub fn tracks(&self) -> &[PreparedTrack] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn into_tracks(self) -> Vec<PreparedTrack> {
        self.tracks
    }
}

/// Set every track's gain so its loudness matches the median loudness
///
/// Boosts are capped at `max_boost_db`; cuts are not limited.
pub fn equalize_tracks(tracks: &mut [PreparedTrack], max_boost_db: f64) {
    let Some(target) = median(tracks.iter().map(|p| p.track.analysis.loudness).collect()) else {
        return;
    };

    for prepared in tracks.iter_mut() {
        let db = (target - prepared.track.analysis.loudness).min(max_boost_db);
        prepared.track.gain = 10f64.powf(db / 20.0);
        info!(
            "{}: Vol = {:.0}%",
            prepared.track.label,
            prepared.track.gain * 100.0
        );
    }
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    values.retain(|v| v.is_finite());
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::{prepared, synthetic_track};

    fn track_at(name: &str, loudness: f64) -> PreparedTrack {
        prepared(synthetic_track(name, 16, 0.5, loudness, |_| vec![1.0]))
    }

    #[test]
    fn test_equalized_loudness_matches() {
        let mut tracks = vec![track_at("a", -10.0), track_at("b", -14.0), track_at("c", -8.0)];
        equalize_tracks(&mut tracks, 24.0);

        let rendered: Vec<f64> = tracks
            .iter()
            .map(|p| p.track.analysis.loudness + 20.0 * p.track.gain.log10())
            .collect();
        for level in &rendered {
            assert!((level - (-10.0)).abs() < 1e-9, "got {:?}", rendered);
        }
        assert!((tracks[0].track.gain - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_boost_is_capped() {
        let mut tracks = vec![track_at("quiet", -60.0), track_at("loud", -6.0), track_at("mid", -8.0)];
        equalize_tracks(&mut tracks, 24.0);
        assert!((tracks[0].track.gain - 10f64.powf(24.0 / 20.0)).abs() < 1e-9);
        assert!(tracks[1].track.gain < 1.0);
    }

    #[test]
    fn test_median_of_even_count() {
        assert_eq!(median(vec![-12.0, -8.0, -10.0, -6.0]), Some(-9.0));
        assert_eq!(median(vec![]), None);
    }

    #[test]
    fn test_empty_sequence_is_rejected() {
        let err = MixSequence::unequalized(OrderedTracks::default()).unwrap_err();
        assert!(matches!(err, AutomixError::EmptyInput));
        assert!(MixSequence::equalized(OrderedTracks::default(), 24.0).is_err());
    }

    #[test]
    fn test_unequalized_keeps_gain() {
        let ordered = OrderedTracks {
            tracks: vec![track_at("a", -20.0), track_at("b", -5.0)],
        };
        let sequence = MixSequence::unequalized(ordered).unwrap();
        assert!(!sequence.is_empty());
        assert_eq!(sequence.len(), 2);
        assert!(sequence.tracks().iter().all(|p| p.track.gain == 1.0));
    }
}
