//! Source discovery, loading and track identity
//!
//! Every source is loaded independently on the rayon pool. A source that
//! fails to load is reported and skipped; it never aborts the batch.

pub mod loader;
pub mod progress;
pub mod remote;

pub use loader::{AudioTrackLoader, TrackLoader};
pub use progress::{ProgressEvent, ProgressReporter};

use crate::error::AutomixError;
use crate::types::{AudioFormat, Track};
use hash32::FnvHasher;
use rayon::prelude::*;
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Where a track comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Local(PathBuf),
    Remote(String),
}

impl Source {
    /// Classify a source identifier as given on the command line
    pub fn parse(id: &str) -> Self {
        if remote::is_remote(id) {
            Source::Remote(id.to_string())
        } else {
            Source::Local(PathBuf::from(id))
        }
    }

    /// The identifier this source was created from
    pub fn id(&self) -> String {
        match self {
            Source::Local(path) => path.to_string_lossy().to_string(),
            Source::Remote(url) => url.clone(),
        }
    }
}

/// Outcome of loading a batch of sources
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Loaded tracks, in source order
    pub tracks: Vec<Track>,
    /// One error per source that failed
    pub failures: Vec<AutomixError>,
}

/// Expand identifiers into sources, listing directories in sorted order
///
/// Directories contribute every supported audio file below them. Other
/// identifiers pass through unchanged, so missing files surface as load
/// failures of their own.
pub fn expand_sources(ids: &[String]) -> Vec<Source> {
    let mut sources = Vec::new();

    for id in ids {
        let source = Source::parse(id);
        match &source {
            Source::Local(path) if path.is_dir() => {
                let found = scan_dir(path);
                if found.is_empty() {
                    warn!("No supported audio files found in {}", path.display());
                }
                sources.extend(found.into_iter().map(Source::Local));
            }
            _ => sources.push(source),
        }
    }

    info!("Found {} sources", sources.len());
    sources
}

fn scan_dir(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && AudioFormat::is_supported_path(e.path()))
        .map(|e| {
            debug!("Discovered: {}", e.path().display());
            e.into_path()
        })
        .collect()
}

/// Load every source in parallel
///
/// Progress advances once per finished source, successful or not.
pub fn ingest(sources: &[Source], loader: &dyn TrackLoader, progress: &ProgressReporter) -> IngestReport {
    debug!("Loading {} sources with the {} loader", sources.len(), loader.name());

    let results: Vec<_> = sources
        .par_iter()
        .map(|source| {
            let result = loader.load(source);
            progress.advance(&source.id());
            result
        })
        .collect();

    let mut report = IngestReport::default();
    for result in results {
        match result {
            Ok(track) => report.tracks.push(track),
            Err(e) => {
                warn!("Skipping source: {}", e);
                report.failures.push(e);
            }
        }
    }
    report
}

/// Generate a deterministic track ID from a source identifier
///
/// Uses FNV-1a hash, masked to the positive i32 range
pub fn generate_track_id(source: &str) -> i32 {
    use hash32::Hasher as Hash32Hasher;

    let normalized = normalize_source_for_hash(source);

    let mut hasher = FnvHasher::default();
    hasher.write(normalized.as_bytes());
    let hash = hasher.finish32();

    // Mask off sign bit to ensure positive value
    (hash & 0x7FFFFFFF) as i32
}

/// Normalize a source string for consistent hashing across platforms
fn normalize_source_for_hash(source: &str) -> String {
    source.replace('\\', "/").to_lowercase()
}

/// Display label derived from the identifier: the file name without extension
pub fn label_from_source(source: &str) -> String {
    let trimmed = source.split(['?', '#']).next().unwrap_or(source);
    let name = trimmed
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed);
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    if stem.is_empty() {
        source.to_string()
    } else {
        stem.to_string()
    }
}
