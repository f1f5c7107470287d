//! Transition planning
//!
//! A three-phase state machine over the [`MixSequence`]:
//!
//! - initial: fade in and play the first track,
//! - middle: for every adjacent pair, find where the head of the incoming
//!   track best matches the tail of the outgoing one, crossmatch there and
//!   play the incoming track,
//! - terminal: fade out the last track.
//!
//! A cursor (seconds into the current track) marks where the next action
//! starts. For `K` tracks the plan has exactly `2 + 2(K - 1) + 1` actions.

use super::equalize::MixSequence;
use super::{Action, MixConfig, MixPlan};
use crate::features::{FeatureMatrix, PreparedTrack};
use crate::types::{Quantum, TransitionSpec};
use ndarray::{s, Array2, ArrayView2};
use std::borrow::Cow;
use tracing::{debug, info};

/// Tolerance for comparing marker times
const EPS: f64 = 1e-6;

/// Tempo ratio, in octaves, above which the slower grid is subdivided
const TEMPO_OCTAVE_LIMIT: f64 = 0.5;

/// Build the action plan for a committed sequence
pub fn plan_transitions(sequence: &MixSequence, spec: &TransitionSpec, config: &MixConfig) -> MixPlan {
    let tracks = sequence.tracks();
    let labels = tracks.iter().map(|p| p.track.label.clone()).collect();
    let mut actions = Vec::with_capacity(2 * tracks.len() + 1);

    let Some(first) = tracks.first() else {
        return MixPlan {
            tracks: labels,
            spec: *spec,
            actions,
        };
    };

    let (opening, mut cursor) = initialize(first, spec, config);
    actions.extend(opening);

    for (from, pair) in tracks.windows(2).enumerate() {
        let (crossmatch, playback, next_cursor) =
            make_transition(from, &pair[0], cursor, &pair[1], spec, config);
        actions.push(crossmatch);
        actions.push(playback);
        cursor = next_cursor;
    }

    actions.push(Action::FadeOut {
        track: tracks.len() - 1,
        start: cursor,
        duration: config.fade_out,
    });

    let plan = MixPlan {
        tracks: labels,
        spec: *spec,
        actions,
    };
    info!(
        "Planned {} actions for {} tracks ({:.1}s program)",
        plan.len(),
        tracks.len(),
        plan.duration()
    );
    plan
}

/// Opening fade-in and playback, centered in the first track
///
/// Returns the two actions and the cursor after them.
fn initialize(track: &PreparedTrack, spec: &TransitionSpec, config: &MixConfig) -> ([Action; 2], f64) {
    let markers = &track.features.grid;
    let region = config.fade_in + spec.inter;

    let anchor = match (markers.first(), markers.last()) {
        (Some(first), Some(last)) if markers.len() >= config.min_search => {
            let span_end = last.end();
            let centered = first.start + (span_end - first.start + region) / 2.0;
            let earliest = first.start + region;
            let latest = span_end - spec.trans;
            let target = if latest < earliest {
                earliest
            } else {
                centered.clamp(earliest, latest)
            };
            markers
                .get(marker_at(markers, target))
                .map(|q| q.start)
                .unwrap_or(span_end)
        }
        _ => ((track.track.duration() - region) / 2.0).max(0.0) + region,
    };

    let play_start = (anchor - spec.inter).max(0.0);
    let fade_start = (play_start - config.fade_in).max(0.0);
    debug!("{}: opening ends at {:.2}s", track.track.label, anchor);

    (
        [
            Action::FadeIn {
                track: 0,
                start: fade_start,
                duration: play_start - fade_start,
            },
            Action::Playback {
                track: 0,
                start: play_start,
                duration: anchor - play_start,
            },
        ],
        anchor,
    )
}

/// Crossmatch from track `from` into track `from + 1`, then play the incoming track
///
/// Returns the crossmatch, the playback and the cursor in the incoming track.
fn make_transition(
    from: usize,
    out: &PreparedTrack,
    cursor: f64,
    inc: &PreparedTrack,
    spec: &TransitionSpec,
    config: &MixConfig,
) -> (Action, Action, f64) {
    let (outgoing, incoming, playback) = match align(out, cursor, inc, spec, config) {
        Some((outgoing, incoming)) => {
            let start = incoming.last().map(Quantum::end).unwrap_or(0.0);
            let duration = quantized_playback(inc, start, spec);
            (outgoing, incoming, (start, duration))
        }
        None => {
            debug!(
                "{} -> {}: no beat alignment, plain crossfade",
                out.track.label, inc.track.label
            );
            crossfade(cursor, inc, spec)
        }
    };

    let (start, duration) = playback;
    (
        Action::Crossmatch {
            from,
            to: from + 1,
            outgoing,
            incoming,
        },
        Action::Playback {
            track: from + 1,
            start,
            duration,
        },
        start + duration,
    )
}

/// Beat pairs of the best-matching crossmatch, or `None` when the grids cannot be aligned
fn align(
    out: &PreparedTrack,
    cursor: f64,
    inc: &PreparedTrack,
    spec: &TransitionSpec,
    config: &MixConfig,
) -> Option<(Vec<Quantum>, Vec<Quantum>)> {
    if out.features.grid.len() < config.min_search || inc.features.grid.len() < config.min_search {
        return None;
    }

    let mut outgoing = Grid::of(out);
    let mut incoming = Grid::of(inc);
    let (d1, d2) = (outgoing.mean_duration(), incoming.mean_duration());
    if d1 > 0.0 && d2 > 0.0 {
        let octaves = (d1 / d2).log2();
        if octaves > TEMPO_OCTAVE_LIMIT {
            outgoing = outgoing.upsample();
        } else if octaves < -TEMPO_OCTAVE_LIMIT {
            incoming = incoming.upsample();
        }
    }

    let s1 = marker_at(&outgoing.markers, cursor);
    let rows_out = advance(&outgoing.markers, s1, spec.trans) - s1;

    let span_end = incoming.markers.last()?.end();
    let zone_end = span_end - spec.inter - spec.trans;
    let rows_zone = incoming.markers.partition_point(|q| q.end() <= zone_end + EPS);

    let mut rows = rows_out.min(
        rows_zone
            .saturating_sub(config.min_search)
            .max(config.min_markers),
    );
    if rows == 0 || rows_zone <= rows {
        return None;
    }

    let window = outgoing.matrix.slice(s![s1..s1 + rows, ..]);
    let zone = incoming.matrix.slice(s![..rows_zone, ..]);
    let loc = best_alignment(window, zone)?;

    // Do not end the crossmatch in the middle of a subdivided beat
    if incoming.rate == 2 && (loc + rows) % 2 == 1 && rows > 1 {
        rows -= 1;
    }
    debug!(
        "{} -> {}: {} beat crossmatch at incoming beat {}",
        out.track.label, inc.track.label, rows, loc
    );

    Some((
        outgoing.markers[s1..s1 + rows].to_vec(),
        incoming.markers[loc..loc + rows].to_vec(),
    ))
}

/// Offset into `zone` where `window` matches best (Frobenius norm)
///
/// Candidates are `0 .. zone_rows - window_rows`; the earliest minimum wins.
pub fn best_alignment(window: ArrayView2<'_, f64>, zone: ArrayView2<'_, f64>) -> Option<usize> {
    let rows = window.nrows();
    if rows == 0 || zone.nrows() <= rows || window.ncols() != zone.ncols() {
        return None;
    }

    let mut best: Option<(usize, f64)> = None;
    for loc in 0..(zone.nrows() - rows) {
        let diff = &zone.slice(s![loc..loc + rows, ..]) - &window;
        let score = diff.mapv(|x| x * x).sum().sqrt();
        match best {
            Some((_, lowest)) if score >= lowest || score.is_nan() => {}
            _ => best = Some((loc, score)),
        }
    }
    best.map(|(loc, _)| loc)
}

/// Plain crossfade for tracks without a usable beat grid
fn crossfade(cursor: f64, inc: &PreparedTrack, spec: &TransitionSpec) -> (Vec<Quantum>, Vec<Quantum>, (f64, f64)) {
    let duration = inc.track.duration();
    let start = ((duration - (spec.inter + 2.0 * spec.trans)) / 2.0).max(0.0);
    let playback = (duration - start - spec.trans).min(spec.inter).max(0.0);
    (
        vec![Quantum::new(cursor, spec.trans)],
        vec![Quantum::new(start, spec.trans)],
        (start + spec.trans, playback),
    )
}

/// Playback length from `start`, leaving room for the next transition, rounded up to whole beats
fn quantized_playback(track: &PreparedTrack, start: f64, spec: &TransitionSpec) -> f64 {
    let markers = &track.features.grid;
    let span_end = markers.last().map(Quantum::end).unwrap_or(track.track.duration());
    let wanted = spec.inter.min((span_end - start - spec.trans).max(0.0));

    let from = marker_at(markers, start);
    let to = advance(markers, from, wanted);
    if to > from {
        markers[to - 1].end() - start
    } else {
        wanted
    }
}

/// Index of the first marker starting at or after `time`
fn marker_at(markers: &[Quantum], time: f64) -> usize {
    markers.partition_point(|q| q.start < time - EPS)
}

/// End (exclusive) of the marker run from `from` that covers `duration` seconds
fn advance(markers: &[Quantum], from: usize, duration: f64) -> usize {
    let mut end = from;
    let mut covered = 0.0;
    while end < markers.len() && covered + EPS < duration {
        covered += markers[end].duration;
        end += 1;
    }
    end
}

/// A track's markers and feature rows, possibly subdivided
struct Grid<'a> {
    markers: Cow<'a, [Quantum]>,
    matrix: Cow<'a, FeatureMatrix>,
    /// Rows per original marker
    rate: usize,
}

impl<'a> Grid<'a> {
    fn of(track: &'a PreparedTrack) -> Self {
        Self {
            markers: Cow::Borrowed(&track.features.grid),
            matrix: Cow::Borrowed(&track.features.matrix),
            rate: 1,
        }
    }

    fn mean_duration(&self) -> f64 {
        if self.markers.is_empty() {
            return 0.0;
        }
        self.markers.iter().map(|q| q.duration).sum::<f64>() / self.markers.len() as f64
    }

    /// Split every marker in halves and repeat every row
    fn upsample(self) -> Self {
        let markers = self
            .markers
            .iter()
            .flat_map(|q| {
                let half = q.duration / 2.0;
                [Quantum::new(q.start, half), Quantum::new(q.start + half, half)]
            })
            .collect::<Vec<_>>();

        let mut matrix = Array2::<f64>::zeros((self.matrix.nrows() * 2, self.matrix.ncols()));
        for (i, row) in self.matrix.outer_iter().enumerate() {
            matrix.row_mut(2 * i).assign(&row);
            matrix.row_mut(2 * i + 1).assign(&row);
        }

        Self {
            markers: Cow::Owned(markers),
            matrix: Cow::Owned(matrix),
            rate: self.rate * 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::{prepared, synthetic_track};
    use crate::mix::sequencer::OrderedTracks;
    use crate::mix::ActionKind;
    use ndarray::array;

    fn pattern(i: usize) -> Vec<f64> {
        vec![(i % 8) as f64, ((i / 8) % 3) as f64, ((i * 7) % 5) as f64]
    }

    fn sequence_of(tracks: Vec<PreparedTrack>) -> MixSequence {
        MixSequence::unequalized(OrderedTracks { tracks }).unwrap()
    }

    fn regular(name: &str, beats: usize, beat_len: f64) -> PreparedTrack {
        prepared(synthetic_track(name, beats, beat_len, -10.0, pattern))
    }

    #[test]
    fn test_single_track_plan() {
        let sequence = sequence_of(vec![regular("solo", 120, 0.5)]);
        let spec = TransitionSpec::new(8.0, 4.0).unwrap();
        let plan = plan_transitions(&sequence, &spec, &MixConfig::default());

        assert_eq!(
            plan.kinds(),
            vec![ActionKind::FadeIn, ActionKind::Playback, ActionKind::FadeOut]
        );
        assert!((plan.actions[0].duration() - 0.25).abs() < 1e-9);
        assert!((plan.actions[1].duration() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_action_count_and_order() {
        for k in 2..=4 {
            let tracks = (0..k).map(|i| regular(&format!("t{}", i), 120, 0.5)).collect();
            let plan = plan_transitions(
                &sequence_of(tracks),
                &TransitionSpec::new(8.0, 4.0).unwrap(),
                &MixConfig::default(),
            );
            assert_eq!(plan.len(), 2 + 2 * (k - 1) + 1);

            let kinds = plan.kinds();
            assert_eq!(kinds[0], ActionKind::FadeIn);
            assert_eq!(kinds[1], ActionKind::Playback);
            for pair in kinds[2..kinds.len() - 1].chunks(2) {
                assert_eq!(pair, [ActionKind::Crossmatch, ActionKind::Playback]);
            }
            assert_eq!(kinds[kinds.len() - 1], ActionKind::FadeOut);
        }
    }

    #[test]
    fn test_plan_duration_matches_nominal_length() {
        let spec = TransitionSpec::new(8.0, 4.0).unwrap();
        let config = MixConfig::default();
        let tracks = vec![regular("a", 120, 0.5), regular("b", 120, 0.5), regular("c", 120, 0.5)];
        let plan = plan_transitions(&sequence_of(tracks), &spec, &config);

        let k = 3.0;
        let nominal = config.fade_in + k * spec.inter + (k - 1.0) * spec.trans + config.fade_out;
        assert!(
            (plan.duration() - nominal).abs() <= 0.5,
            "plan {:.3}s vs nominal {:.3}s",
            plan.duration(),
            nominal
        );
    }

    #[test]
    fn test_playback_continues_from_crossmatch() {
        let spec = TransitionSpec::new(8.0, 4.0).unwrap();
        let tracks = vec![regular("a", 120, 0.5), regular("b", 120, 0.5)];
        let plan = plan_transitions(&sequence_of(tracks), &spec, &MixConfig::default());

        let Action::Crossmatch { incoming, outgoing, .. } = &plan.actions[2] else {
            panic!("expected a crossmatch, got {:?}", plan.actions[2]);
        };
        assert_eq!(incoming.len(), outgoing.len());
        let Action::Playback { start, .. } = plan.actions[3] else {
            panic!("expected a playback");
        };
        assert!((start - incoming[incoming.len() - 1].end()).abs() < 1e-9);

        let Action::Playback { start: first_start, duration, .. } = plan.actions[1] else {
            panic!("expected a playback");
        };
        assert!((outgoing[0].start - (first_start + duration)).abs() < 1e-9);
    }

    #[test]
    fn test_alignment_ties_pick_earliest_offset() {
        let window = Array2::<f64>::ones((4, 2));
        let zone = Array2::<f64>::ones((12, 2));
        assert_eq!(best_alignment(window.view(), zone.view()), Some(0));
    }

    #[test]
    fn test_alignment_finds_planted_pattern() {
        let window = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let mut zone = Array2::<f64>::zeros((20, 2));
        for at in [6, 12] {
            zone.slice_mut(s![at..at + 3, ..]).assign(&window);
        }
        assert_eq!(best_alignment(window.view(), zone.view()), Some(6));
    }

    #[test]
    fn test_alignment_needs_candidates() {
        let window = Array2::<f64>::ones((4, 2));
        assert_eq!(best_alignment(window.view(), Array2::<f64>::ones((4, 2)).view()), None);
        assert_eq!(best_alignment(window.view(), Array2::<f64>::ones((8, 3)).view()), None);
    }

    #[test]
    fn test_tempo_mismatch_subdivides_slower_track() {
        let spec = TransitionSpec::new(8.0, 4.0).unwrap();
        let tracks = vec![regular("fast", 240, 0.25), regular("slow", 120, 0.5)];
        let plan = plan_transitions(&sequence_of(tracks), &spec, &MixConfig::default());

        let Action::Crossmatch { outgoing, incoming, .. } = &plan.actions[2] else {
            panic!("expected a crossmatch");
        };
        assert!(incoming.iter().all(|q| (q.duration - 0.25).abs() < 1e-9));
        assert!(outgoing.iter().all(|q| (q.duration - 0.25).abs() < 1e-9));
        // The crossmatch ends on a beat of the slow track
        let end = incoming[incoming.len() - 1].end();
        assert!(((end / 0.5) - (end / 0.5).round()).abs() < 1e-9, "ends at {}", end);
    }

    #[test]
    fn test_sparse_beat_grid_falls_back_to_crossfade() {
        let spec = TransitionSpec::new(8.0, 8.0).unwrap();
        let tracks = vec![regular("a", 3, 10.0), regular("b", 3, 10.0)];
        let plan = plan_transitions(&sequence_of(tracks), &spec, &MixConfig::default());

        assert_eq!(plan.len(), 5);
        let Action::Crossmatch { outgoing, incoming, .. } = &plan.actions[2] else {
            panic!("expected a crossmatch");
        };
        assert_eq!(outgoing.len(), 1);
        assert!((incoming[0].start - 3.0).abs() < 1e-9);
        assert!((plan.actions[2].duration() - 8.0).abs() < 1e-9);
        assert!((plan.actions[3].duration() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let spec = TransitionSpec::default();
        let make = || sequence_of(vec![regular("a", 100, 0.5), regular("b", 90, 0.48)]);
        let first = plan_transitions(&make(), &spec, &MixConfig::default());
        let second = plan_transitions(&make(), &spec, &MixConfig::default());
        assert_eq!(first, second);
    }
}
