//! Mix construction: validity filtering, ordering, loudness equalization and
//! transition planning
//!
//! The stages hand each other dedicated collection types
//! ([`ValidatedTracks`] -> [`OrderedTracks`] -> [`MixSequence`]), so the
//! planner can only ever run on a committed, non-empty order.

pub mod equalize;
pub mod planner;
pub mod sequencer;
pub mod validity;

pub use equalize::{equalize_tracks, MixSequence};
pub use planner::plan_transitions;
pub use sequencer::{distance_matrix, keep_order, order_indices, order_tracks, OrderedTracks};
pub use validity::{filter_valid, is_valid, ValidatedTracks};

use crate::types::{Quantum, TransitionSpec};
use serde::{Deserialize, Serialize};

/// Tunables of the transition planner and equalizer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixConfig {
    /// Length of the opening fade-in in seconds
    pub fade_in: f64,
    /// Length of the closing fade-out in seconds
    pub fade_out: f64,
    /// Smallest crossmatch window, in grid rows, when the search zone is short
    pub min_markers: usize,
    /// Tracks with fewer beats than this get a plain crossfade
    pub min_search: usize,
    /// Largest gain boost the equalizer may apply, in dB
    pub max_boost_db: f64,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            fade_in: 0.25,
            fade_out: 3.0,
            min_markers: 8,
            min_search: 4,
            max_boost_db: 24.0,
        }
    }
}

/// Discriminant of an [`Action`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    FadeIn,
    FadeOut,
    Playback,
    Crossmatch,
}

/// One instruction of a mix plan
///
/// Track indices refer to positions in the [`MixSequence`] the plan was
/// built from. Times are in seconds of the respective track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    FadeIn {
        track: usize,
        start: f64,
        duration: f64,
    },
    FadeOut {
        track: usize,
        start: f64,
        duration: f64,
    },
    Playback {
        track: usize,
        start: f64,
        duration: f64,
    },
    /// Beat-by-beat crossfade: `outgoing[k]` is blended with `incoming[k]`
    Crossmatch {
        from: usize,
        to: usize,
        outgoing: Vec<Quantum>,
        incoming: Vec<Quantum>,
    },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::FadeIn { .. } => ActionKind::FadeIn,
            Action::FadeOut { .. } => ActionKind::FadeOut,
            Action::Playback { .. } => ActionKind::Playback,
            Action::Crossmatch { .. } => ActionKind::Crossmatch,
        }
    }

    /// Length of this action in the rendered program, in seconds
    pub fn duration(&self) -> f64 {
        match self {
            Action::FadeIn { duration, .. }
            | Action::FadeOut { duration, .. }
            | Action::Playback { duration, .. } => *duration,
            Action::Crossmatch {
                outgoing, incoming, ..
            } => crossmatch_lengths(outgoing, incoming).iter().sum(),
        }
    }
}

/// Rendered length of each beat pair of a crossmatch
///
/// Pair `k` of `n` plays at `lerp(d_out, d_in, (k + 0.5) / n)`, so the
/// tempo glides from the outgoing to the incoming track.
pub fn crossmatch_lengths(outgoing: &[Quantum], incoming: &[Quantum]) -> Vec<f64> {
    let n = outgoing.len().min(incoming.len());
    (0..n)
        .map(|k| {
            let t = (k as f64 + 0.5) / n as f64;
            outgoing[k].duration + (incoming[k].duration - outgoing[k].duration) * t
        })
        .collect()
}

/// The ordered action list for a whole program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixPlan {
    /// Track labels in playback order; action indices point into this list
    pub tracks: Vec<String>,
    pub spec: TransitionSpec,
    pub actions: Vec<Action>,
}

impl MixPlan {
    /// Total program length in seconds
    pub fn duration(&self) -> f64 {
        self.actions.iter().map(Action::duration).sum()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Action kinds in order
    pub fn kinds(&self) -> Vec<ActionKind> {
        self.actions.iter().map(Action::kind).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crossmatch_glides_between_tempos() {
        let outgoing = vec![Quantum::new(10.0, 0.5), Quantum::new(10.5, 0.5)];
        let incoming = vec![Quantum::new(2.0, 0.4), Quantum::new(2.4, 0.4)];
        let lengths = crossmatch_lengths(&outgoing, &incoming);
        assert!((lengths[0] - 0.475).abs() < 1e-12);
        assert!((lengths[1] - 0.425).abs() < 1e-12);

        let action = Action::Crossmatch {
            from: 0,
            to: 1,
            outgoing,
            incoming,
        };
        assert_eq!(action.kind(), ActionKind::Crossmatch);
        assert!((action.duration() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_plan_duration_sums_actions() {
        let plan = MixPlan {
            tracks: vec!["a".into()],
            spec: TransitionSpec::default(),
            actions: vec![
                Action::FadeIn {
                    track: 0,
                    start: 1.0,
                    duration: 0.25,
                },
                Action::Playback {
                    track: 0,
                    start: 1.25,
                    duration: 8.0,
                },
                Action::FadeOut {
                    track: 0,
                    start: 9.25,
                    duration: 3.0,
                },
            ],
        };
        assert!((plan.duration() - 11.25).abs() < 1e-12);
        assert_eq!(
            plan.kinds(),
            vec![ActionKind::FadeIn, ActionKind::Playback, ActionKind::FadeOut]
        );
    }

    #[test]
    fn test_action_serializes_with_kind_tag() {
        let action = Action::Playback {
            track: 2,
            start: 4.0,
            duration: 8.0,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"], "playback");
        assert_eq!(json["track"], 2);
    }
}
