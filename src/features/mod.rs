//! Feature processing: resampling onto a common grid and whitening
//!
//! Every track that reaches sequencing and transition planning has been
//! turned into a [`PreparedTrack`] here.

pub mod linalg;
pub mod resample;
pub mod whiten;

pub use resample::{resample, Rate, ResampledFeatures};
pub use whiten::{whiten, whiten_with, Whitener, WhiteningMethod};

use crate::error::AutomixError;
use crate::types::Track;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Rows = grid time steps, columns = feature dimensions
pub type FeatureMatrix = Array2<f64>;

/// A track together with its whitened, resampled features
#[derive(Debug, Clone)]
pub struct PreparedTrack {
    pub track: Track,
    pub features: ResampledFeatures,
}

impl PreparedTrack {
    pub fn label(&self) -> &str {
        &self.track.label
    }

    pub fn matrix(&self) -> &FeatureMatrix {
        &self.features.matrix
    }

    /// Mean feature vector over all grid rows
    pub fn mean_vector(&self) -> Array1<f64> {
        self.features
            .matrix
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(self.features.matrix.ncols()))
    }
}

/// Resample every track in parallel, then whiten them with one corpus-wide transform
///
/// Tracks whose features cannot be resampled are returned as errors
/// instead of aborting the batch. Input order is preserved.
pub fn prepare_tracks(
    tracks: Vec<Track>,
    rate: Rate,
    method: WhiteningMethod,
) -> (Vec<PreparedTrack>, Vec<AutomixError>) {
    let results: Vec<_> = tracks
        .into_par_iter()
        .map(|track| resample(&track, rate).map(|features| PreparedTrack { track, features }))
        .collect();

    let mut prepared = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(p) => prepared.push(p),
            Err(e) => {
                warn!("Excluding track: {}", e);
                failures.push(e);
            }
        }
    }

    // Tracks must agree on dimensionality to share a feature space
    if let Some(dims) = prepared.first().map(|p| p.features.matrix.ncols()) {
        let (kept, mismatched): (Vec<_>, Vec<_>) = prepared
            .into_iter()
            .partition(|p| p.features.matrix.ncols() == dims);
        for p in mismatched {
            let err = AutomixError::feature_error(
                &p.track.label,
                format!("has {} feature dimensions, corpus has {}", p.features.matrix.ncols(), dims),
            );
            warn!("Excluding track: {}", err);
            failures.push(err);
        }
        prepared = kept;
    }

    let whitener = {
        let matrices: Vec<&FeatureMatrix> = prepared.iter().map(|p| &p.features.matrix).collect();
        Whitener::fit(method, &matrices)
    };
    prepared.par_iter_mut().for_each(|p| {
        p.features.matrix = whitener.apply(&p.features.matrix);
    });

    debug!(
        "Prepared {} tracks ({:?} whitening), {} excluded",
        prepared.len(),
        method,
        failures.len()
    );

    (prepared, failures)
}
