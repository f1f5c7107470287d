//! Unified error types for automix
//!
//! Error strategy:
//! - Per-track errors (load, decode, analysis, features, validity): recoverable,
//!   the track is dropped from the working set and the run continues
//! - Empty working set: reported as an empty result, never a panic
//! - System errors (render, output, configuration): fatal, abort the run

use std::path::PathBuf;
use thiserror::Error;

/// Audio containers the decoder is built to read, for helpful error messages
pub const SUPPORTED_FORMATS: &str = "MP3, WAV, FLAC, AIFF, OGG, M4A/MP4, AU";

/// Top-level error type for automix operations
#[derive(Debug, Error)]
pub enum AutomixError {
    // =========================================================================
    // Recoverable errors - drop the track, continue the run
    // =========================================================================
    #[error("Failed to load '{source_id}': {reason}")]
    LoadFailure { source_id: String, reason: String },

    #[error("Failed to decode audio file '{path}': {reason}\n  Supported formats: {SUPPORTED_FORMATS}\n  Tip: If the file plays in other apps, it may be corrupted or use an unsupported codec")]
    DecodeError { path: PathBuf, reason: String },

    #[error("Failed to download '{url}': {reason}\n  Tip: Check the URL is reachable, or download the file and pass the local path")]
    DownloadError { url: String, reason: String },

    #[error("Analysis failed for '{source_id}': {reason}")]
    AnalysisError { source_id: String, reason: String },

    #[error("Feature processing failed for '{track}': {reason}")]
    FeatureError { track: String, reason: String },

    #[error("Track '{track}' cannot hold a transition: {reason}")]
    InvalidTrack { track: String, reason: String },

    #[error("File not found: '{0}'\n  Tip: Check the path exists and is accessible")]
    FileNotFound(PathBuf),

    // =========================================================================
    // Terminal conditions
    // =========================================================================
    #[error("No playable tracks left after loading and filtering\n  Tip: Tracks must be longer than --inter plus --transition; try shorter values")]
    EmptyInput,

    #[error("Failed to render mix to '{path}': {reason}")]
    RenderError { path: PathBuf, reason: String },

    #[error("Cannot write output to '{path}': {reason}\n  Tip: Check write permissions for the output directory")]
    OutputError { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for automix operations
pub type Result<T> = std::result::Result<T, AutomixError>;

impl AutomixError {
    /// Returns true if this error only affects one track (drop it, continue the run)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AutomixError::LoadFailure { .. }
                | AutomixError::DecodeError { .. }
                | AutomixError::DownloadError { .. }
                | AutomixError::AnalysisError { .. }
                | AutomixError::FeatureError { .. }
                | AutomixError::InvalidTrack { .. }
                | AutomixError::FileNotFound(_)
        )
    }

    /// Create a decode error with context about the issue
    pub fn decode_error(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        AutomixError::DecodeError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a feature processing error for a track label
    pub fn feature_error(track: impl Into<String>, reason: impl Into<String>) -> Self {
        AutomixError::FeatureError {
            track: track.into(),
            reason: reason.into(),
        }
    }

    /// Create an output error, checking for common issues
    pub fn output_error(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        let reason = match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                format!("Permission denied. Check that you have write access to {}", path.display())
            }
            std::io::ErrorKind::NotFound => {
                format!("Directory does not exist: {}", path.parent().map(|p| p.display().to_string()).unwrap_or_default())
            }
            _ => err.to_string(),
        };
        AutomixError::OutputError { path, reason }
    }

    /// Attach a source identifier to load and analysis errors raised without one
    pub fn for_source(self, source_id: &str) -> Self {
        match self {
            AutomixError::AnalysisError { reason, .. } => AutomixError::AnalysisError {
                source_id: source_id.to_string(),
                reason,
            },
            AutomixError::LoadFailure { reason, .. } => AutomixError::LoadFailure {
                source_id: source_id.to_string(),
                reason,
            },
            other => other,
        }
    }

    /// Create an analysis error not yet tied to a source
    pub fn analysis(reason: impl Into<String>) -> Self {
        AutomixError::AnalysisError {
            source_id: String::new(),
            reason: reason.into(),
        }
    }

    /// Create a render error
    pub fn render_error(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        AutomixError::RenderError {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Extension trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context about which source was being analyzed
    fn with_source_context(self, source_id: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> ErrorContext<T> for std::result::Result<T, E> {
    fn with_source_context(self, source_id: &str) -> Result<T> {
        self.map_err(|e| AutomixError::AnalysisError {
            source_id: source_id.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_track_errors_are_recoverable() {
        let errors = [
            AutomixError::LoadFailure {
                source_id: "a.mp3".into(),
                reason: "boom".into(),
            },
            AutomixError::decode_error("a.mp3", "bad header"),
            AutomixError::feature_error("a", "zero beats"),
            AutomixError::InvalidTrack {
                track: "a".into(),
                reason: "too short".into(),
            },
        ];
        for err in &errors {
            assert!(err.is_recoverable(), "{} should be recoverable", err);
        }
    }

    #[test]
    fn test_fatal_errors_are_not_recoverable() {
        assert!(!AutomixError::EmptyInput.is_recoverable());
        assert!(!AutomixError::render_error("out.wav", "disk full").is_recoverable());
        assert!(!AutomixError::ConfigError("bad".into()).is_recoverable());
    }

    #[test]
    fn test_source_context_maps_to_analysis_error() {
        let result: std::result::Result<(), String> = Err("no beats".to_string());
        let err = result.with_source_context("song.wav").unwrap_err();
        match err {
            AutomixError::AnalysisError { source_id, reason } => {
                assert_eq!(source_id, "song.wav");
                assert_eq!(reason, "no beats");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_for_source_fills_identifier() {
        let err = AutomixError::analysis("silent track").for_source("b.mp3");
        assert!(err.to_string().contains("b.mp3"));
        assert!(err.to_string().contains("silent track"));

        let untouched = AutomixError::EmptyInput.for_source("b.mp3");
        assert!(matches!(untouched, AutomixError::EmptyInput));
    }
}
