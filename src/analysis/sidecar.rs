//! Precomputed analysis stored next to the audio file
//!
//! `song.mp3` is paired with `song.mp3.analysis.json` holding a serialized
//! [`TrackAnalysis`]. A sidecar takes precedence over running the analyzers.

use crate::error::{AutomixError, Result};
use crate::export::write_json_atomic;
use crate::types::TrackAnalysis;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix appended to the audio file name
pub const SIDECAR_SUFFIX: &str = ".analysis.json";

/// Sidecar location for an audio file
pub fn sidecar_path(audio_path: &Path) -> PathBuf {
    let mut name = audio_path.as_os_str().to_owned();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Load the sidecar of `audio_path`, if there is one
///
/// A missing sidecar is `Ok(None)`; an unreadable or inconsistent one is an error.
pub fn read_sidecar(audio_path: &Path) -> Result<Option<TrackAnalysis>> {
    let path = sidecar_path(audio_path);
    if !path.is_file() {
        return Ok(None);
    }

    let file = File::open(&path)
        .map_err(|e| AutomixError::analysis(format!("Cannot read sidecar {}: {}", path.display(), e)))?;
    let analysis: TrackAnalysis = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AutomixError::analysis(format!("Invalid sidecar {}: {}", path.display(), e)))?;
    check(&analysis).map_err(|reason| {
        AutomixError::analysis(format!("Invalid sidecar {}: {}", path.display(), reason))
    })?;

    debug!(
        "Loaded analysis sidecar {} ({} beats, {} segments)",
        path.display(),
        analysis.beats.len(),
        analysis.segments.len()
    );
    Ok(Some(analysis))
}

/// Store an analysis next to its audio file
pub fn write_sidecar(audio_path: &Path, analysis: &TrackAnalysis) -> Result<()> {
    write_json_atomic(analysis, &sidecar_path(audio_path))
}

fn check(analysis: &TrackAnalysis) -> std::result::Result<(), String> {
    if !analysis.duration.is_finite() || analysis.duration <= 0.0 {
        return Err(format!("duration must be positive, got {}", analysis.duration));
    }
    if analysis.beats.windows(2).any(|w| w[1].start < w[0].start) {
        return Err("beats are not ordered by start time".to_string());
    }
    if analysis.segments.windows(2).any(|w| w[1].start < w[0].start) {
        return Err("segments are not ordered by start time".to_string());
    }
    if analysis.beats.iter().any(|b| b.duration < 0.0) || analysis.segments.iter().any(|s| s.duration < 0.0) {
        return Err("negative durations".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Quantum, Segment};
    use tempfile::TempDir;

    fn analysis() -> TrackAnalysis {
        TrackAnalysis {
            duration: 2.0,
            tempo: 120.0,
            loudness: -9.5,
            beats: vec![Quantum::new(0.0, 0.5), Quantum::new(0.5, 0.5)],
            segments: vec![Segment {
                start: 0.0,
                duration: 1.0,
                loudness_max: -8.0,
                timbre: vec![1.0, 2.0],
            }],
        }
    }

    #[test]
    fn test_sidecar_path_appends_suffix() {
        assert_eq!(
            sidecar_path(Path::new("/music/song.mp3")),
            PathBuf::from("/music/song.mp3.analysis.json")
        );
    }

    #[test]
    fn test_missing_sidecar_is_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_sidecar(&dir.path().join("song.wav")).unwrap(), None);
    }

    #[test]
    fn test_sidecar_written_and_loaded() {
        let dir = TempDir::new().unwrap();
        let audio = dir.path().join("song.wav");
        write_sidecar(&audio, &analysis()).unwrap();
        assert_eq!(read_sidecar(&audio).unwrap(), Some(analysis()));
    }

    #[test]
    fn test_unordered_beats_rejected() {
        let dir = TempDir::new().unwrap();
        let audio = dir.path().join("song.wav");
        let mut bad = analysis();
        bad.beats.reverse();
        write_sidecar(&audio, &bad).unwrap();
        assert!(read_sidecar(&audio).is_err());
    }

    #[test]
    fn test_garbage_sidecar_rejected() {
        let dir = TempDir::new().unwrap();
        let audio = dir.path().join("song.wav");
        std::fs::write(sidecar_path(&audio), "{ not json").unwrap();
        assert!(read_sidecar(&audio).is_err());
    }
}
