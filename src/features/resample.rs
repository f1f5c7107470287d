//! Resampling of segment features onto a common time grid
//!
//! Segments have irregular lengths. To compare tracks, and to compare the
//! tail of one track with the head of another, features are averaged onto
//! a grid: one row per beat, or one row per fixed-length cell.

use super::FeatureMatrix;
use crate::error::{AutomixError, Result};
use crate::types::{Quantum, Segment, Track};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Segments starting this close to a beat count as that beat's onset
const FUSION_INTERVAL: f64 = 0.06;

/// Onset-to-peak offset assumed when no segment lines up with a beat
const DEFAULT_ONSET_OFFSET: f64 = 0.025;

/// Time grid to resample features onto
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rate {
    /// One row per beat of the track
    Beats,
    /// One row per `1 / hz` seconds
    Fixed { hz: f64 },
}

impl Default for Rate {
    fn default() -> Self {
        Rate::Beats
    }
}

/// Features of one track on its grid
#[derive(Debug, Clone)]
pub struct ResampledFeatures {
    /// Grid the rows were computed on
    pub rate: Rate,
    /// One quantum per row, in track time
    pub grid: Vec<Quantum>,
    /// Rows = grid cells, columns = feature dimensions
    pub matrix: FeatureMatrix,
}

impl ResampledFeatures {
    /// Number of grid rows
    pub fn rows(&self) -> usize {
        self.matrix.nrows()
    }
}

/// Resample a track's segment features onto the grid for `rate`
///
/// For [`Rate::Beats`] the output has exactly one row per beat.
pub fn resample(track: &Track, rate: Rate) -> Result<ResampledFeatures> {
    let fail = |reason: String| AutomixError::feature_error(&track.label, reason);
    let analysis = &track.analysis;

    let grid = match rate {
        Rate::Beats => analysis.beats.clone(),
        Rate::Fixed { hz } => fixed_grid(analysis.duration, hz).map_err(fail)?,
    };
    if grid.is_empty() {
        return Err(fail("track has no beats to resample onto".to_string()));
    }

    let segments = &analysis.segments;
    let dims = segments
        .first()
        .map(|s| s.timbre.len())
        .ok_or_else(|| fail("track has no analyzed segments".to_string()))?;
    if dims == 0 {
        return Err(fail("segments carry empty feature vectors".to_string()));
    }
    if let Some(bad) = segments.iter().find(|s| s.timbre.len() != dims) {
        return Err(fail(format!(
            "segment at {:.2}s has {} features, expected {}",
            bad.start,
            bad.timbre.len(),
            dims
        )));
    }

    // Beats mark onsets, segments peak slightly later: sample a bit earlier
    let offset = match rate {
        Rate::Beats => mean_onset_offset(segments, &grid),
        Rate::Fixed { .. } => 0.0,
    };

    let mut matrix = Array2::<f64>::zeros((grid.len(), dims));
    let mut first = 0usize;

    for (row, cell) in grid.iter().enumerate() {
        let start = (cell.start - offset).max(0.0);
        let end = (cell.end() - offset).max(start);

        while first < segments.len() && segments[first].end() <= start {
            first += 1;
        }

        let mut weight = 0.0;
        let mut idx = first;
        while idx < segments.len() && segments[idx].start < end {
            let seg = &segments[idx];
            let w = (seg.end().min(end) - seg.start.max(start)).max(0.0);
            if w > 0.0 {
                for (dst, src) in matrix.row_mut(row).iter_mut().zip(seg.timbre.iter()) {
                    *dst += w * src;
                }
                weight += w;
            }
            idx += 1;
        }

        if weight > 0.0 {
            matrix.row_mut(row).mapv_inplace(|v| v / weight);
        } else {
            let nearest = nearest_segment(segments, first, (start + end) * 0.5);
            for (dst, src) in matrix.row_mut(row).iter_mut().zip(nearest.timbre.iter()) {
                *dst = *src;
            }
        }
    }

    Ok(ResampledFeatures { rate, grid, matrix })
}

/// Uniform grid of `1 / hz` cells covering `duration`
fn fixed_grid(duration: f64, hz: f64) -> std::result::Result<Vec<Quantum>, String> {
    if !hz.is_finite() || hz <= 0.0 {
        return Err(format!("fixed resampling rate must be positive, got {}", hz));
    }
    let step = 1.0 / hz;
    let cells = (duration * hz).ceil().max(0.0) as usize;
    Ok((0..cells)
        .map(|k| {
            let start = k as f64 * step;
            Quantum::new(start, (duration - start).min(step))
        })
        .collect())
}

/// Average distance between beats and the segments starting right at them
fn mean_onset_offset(segments: &[Segment], markers: &[Quantum]) -> f64 {
    let mut offsets = Vec::new();
    let mut idx = 0usize;

    for marker in markers {
        while idx < segments.len() && segments[idx].start < marker.start + FUSION_INTERVAL {
            let offset = (marker.start - segments[idx].start).abs();
            if offset < FUSION_INTERVAL {
                offsets.push(offset);
            }
            idx += 1;
        }
    }

    if offsets.is_empty() {
        DEFAULT_ONSET_OFFSET
    } else {
        offsets.iter().sum::<f64>() / offsets.len() as f64
    }
}

/// Segment closest to `time`, given `first` is the first segment ending after it
fn nearest_segment(segments: &[Segment], first: usize, time: f64) -> &Segment {
    let after = first.min(segments.len() - 1);
    if after == 0 {
        return &segments[0];
    }
    let before = after - 1;
    let gap_before = (time - segments[before].end()).abs();
    let gap_after = (segments[after].start - time).abs();
    if gap_before <= gap_after {
        &segments[before]
    } else {
        &segments[after]
    }
}
