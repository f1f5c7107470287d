//! Track ordering by feature similarity
//!
//! The order is a greedy nearest-neighbour path through the pairwise
//! distance matrix, tried from every starting track; the cheapest path wins.

use super::validity::ValidatedTracks;
use crate::features::PreparedTrack;
use ndarray::Array2;
use tracing::{debug, info};

/// Tracks in their committed playback order
#[derive(Debug, Clone, Default)]
pub struct OrderedTracks {
    pub tracks: Vec<PreparedTrack>,
}

impl OrderedTracks {
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Euclidean distances between the tracks' mean feature vectors
pub fn distance_matrix(tracks: &[PreparedTrack]) -> Array2<f64> {
    let means: Vec<_> = tracks.iter().map(PreparedTrack::mean_vector).collect();
    let n = means.len();
    let mut distances = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in (i + 1)..n {
            let d = if means[i].len() == means[j].len() {
                (&means[i] - &means[j]).mapv(|x| x * x).sum().sqrt()
            } else {
                f64::INFINITY
            };
            distances[[i, j]] = d;
            distances[[j, i]] = d;
        }
    }
    distances
}

/// Lowest-cost greedy path through a square distance matrix
///
/// Returns a permutation of `0..n`. Ties go to the lower index, both when
/// picking the next track and when comparing starting tracks.
pub fn order_indices(distances: &Array2<f64>) -> Vec<usize> {
    let n = distances.nrows();
    if n <= 1 {
        return (0..n).collect();
    }

    let mut best: Option<(f64, Vec<usize>)> = None;
    for seed in 0..n {
        let (cost, path) = greedy_path(distances, seed);
        debug!("Greedy path from {}: cost {:.4}", seed, cost);
        match &best {
            Some((best_cost, _)) if cost >= *best_cost => {}
            _ => best = Some((cost, path)),
        }
    }

    best.map(|(_, path)| path).unwrap_or_else(|| (0..n).collect())
}

fn greedy_path(distances: &Array2<f64>, seed: usize) -> (f64, Vec<usize>) {
    let n = distances.nrows();
    let mut visited = vec![false; n];
    let mut path = Vec::with_capacity(n);
    let mut cost = 0.0;

    visited[seed] = true;
    path.push(seed);
    let mut current = seed;

    while path.len() < n {
        let mut next: Option<(usize, f64)> = None;
        for candidate in (0..n).filter(|&c| !visited[c]) {
            let d = distances[[current, candidate]];
            match next {
                Some((_, best)) if d >= best => {}
                _ => next = Some((candidate, d)),
            }
        }
        let Some((candidate, d)) = next else { break };
        visited[candidate] = true;
        path.push(candidate);
        cost += d;
        current = candidate;
    }

    (cost, path)
}

/// Reorder validated tracks to minimize the summed distance between neighbours
pub fn order_tracks(validated: ValidatedTracks) -> OrderedTracks {
    let tracks = validated.tracks;
    if tracks.len() <= 1 {
        return OrderedTracks { tracks };
    }

    let order = order_indices(&distance_matrix(&tracks));
    let mut slots: Vec<Option<PreparedTrack>> = tracks.into_iter().map(Some).collect();
    let tracks: Vec<PreparedTrack> = order.iter().filter_map(|&i| slots[i].take()).collect();

    info!(
        "Play order: {}",
        tracks.iter().map(PreparedTrack::label).collect::<Vec<_>>().join(" -> ")
    );
    OrderedTracks { tracks }
}

/// Commit the input order unchanged
pub fn keep_order(validated: ValidatedTracks) -> OrderedTracks {
    OrderedTracks {
        tracks: validated.tracks,
    }
}
