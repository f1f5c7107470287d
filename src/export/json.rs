//! JSON export of mix plans for inspection and external renderers

use crate::error::{AutomixError, Result};
use crate::features::PreparedTrack;
use crate::mix::{Action, MixPlan};
use crate::types::TransitionSpec;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// JSON output schema version
const SCHEMA_VERSION: &str = "1.0";

/// Top-level JSON output structure
#[derive(Debug, Serialize, Deserialize)]
pub struct PlanJson {
    /// Schema version for forward compatibility
    pub version: String,
    pub metadata: ExportMetadata,
    pub spec: TransitionSpec,
    /// Tracks in playback order; action track indices point into this list
    pub tracks: Vec<TrackJson>,
    pub actions: Vec<Action>,
}

/// Export metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// automix version that generated this file
    pub generator_version: String,
    /// Timestamp of export
    pub exported_at: String,
    /// Program length in seconds
    pub duration_seconds: f64,
}

/// JSON representation of a scheduled track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackJson {
    pub track_id: i32,
    pub label: String,
    /// Path or URL the track was loaded from
    pub source: String,
    /// Linear gain from loudness equalization
    pub gain: f64,
    pub tempo: f64,
    pub duration_seconds: f64,
}

/// Write a mix plan and its tracks to a JSON file
pub fn write_plan_json(plan: &MixPlan, tracks: &[PreparedTrack], output_path: &Path) -> Result<()> {
    let output = PlanJson {
        version: SCHEMA_VERSION.to_string(),
        metadata: ExportMetadata {
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            duration_seconds: plan.duration(),
        },
        spec: plan.spec,
        tracks: tracks.iter().map(track_to_json).collect(),
        actions: plan.actions.clone(),
    };

    write_json_atomic(&output, output_path)?;
    info!(
        "Wrote plan with {} actions to {}",
        plan.len(),
        output_path.display()
    );
    Ok(())
}

/// Read a plan written by [`write_plan_json`]
pub fn read_plan_json(path: &Path) -> Result<PlanJson> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AutomixError::FileNotFound(path.to_path_buf())
        } else {
            AutomixError::Io(e)
        }
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        AutomixError::ConfigError(format!("{} is not a valid plan file: {}", path.display(), e))
    })
}

/// Serialize `value` as pretty JSON to `output_path`
///
/// Uses atomic write pattern: writes to a temp file first, then renames.
/// This prevents data corruption if the write is interrupted.
pub fn write_json_atomic<T: Serialize>(value: &T, output_path: &Path) -> Result<()> {
    // Same directory as the target, so the rename stays on one filesystem
    let mut temp_name = output_path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = std::path::PathBuf::from(temp_name);

    let file = File::create(&temp_path).map_err(|e| AutomixError::output_error(output_path, e))?;
    let mut writer = BufWriter::new(file);

    let written = serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| e.to_string())
        .and_then(|_| writer.flush().map_err(|e| e.to_string()));
    if let Err(reason) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(AutomixError::OutputError {
            path: output_path.to_path_buf(),
            reason,
        });
    }
    drop(writer);

    // Atomic rename: either succeeds completely or fails without modifying target
    std::fs::rename(&temp_path, output_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        AutomixError::OutputError {
            path: output_path.to_path_buf(),
            reason: format!("Failed to finalize file: {}", e),
        }
    })?;

    debug!("Wrote {}", output_path.display());
    Ok(())
}

fn track_to_json(prepared: &PreparedTrack) -> TrackJson {
    let track = &prepared.track;
    TrackJson {
        track_id: track.id,
        label: track.label.clone(),
        source: track.source.clone(),
        gain: track.gain,
        tempo: track.analysis.tempo,
        duration_seconds: track.duration(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::{prepared, synthetic_track};
    use crate::mix::ActionKind;
    use tempfile::TempDir;

    fn sample_plan() -> MixPlan {
        MixPlan {
            tracks: vec!["a".into()],
            spec: TransitionSpec::default(),
            actions: vec![
                Action::FadeIn {
                    track: 0,
                    start: 0.0,
                    duration: 0.25,
                },
                Action::Playback {
                    track: 0,
                    start: 0.25,
                    duration: 8.0,
                },
                Action::FadeOut {
                    track: 0,
                    start: 8.25,
                    duration: 3.0,
                },
            ],
        }
    }

    #[test]
    fn test_plan_json_written_and_readable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plan.json");
        let tracks = vec![prepared(synthetic_track("a", 32, 0.5, -9.0, |_| vec![1.0]))];

        write_plan_json(&sample_plan(), &tracks, &path).unwrap();

        let parsed = read_plan_json(&path).unwrap();
        assert_eq!(parsed.version, SCHEMA_VERSION);
        assert_eq!(parsed.tracks.len(), 1);
        assert_eq!(parsed.tracks[0].label, "a");
        assert_eq!(parsed.actions.len(), 3);
        assert_eq!(parsed.actions[2].kind(), ActionKind::FadeOut);
        assert!((parsed.metadata.duration_seconds - 11.25).abs() < 1e-9);
        assert!(!dir.path().join("plan.json.tmp").exists());
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("plan.json");
        let err = write_json_atomic(&sample_plan(), &path).unwrap_err();
        assert!(matches!(err, AutomixError::OutputError { .. }));
    }
}
