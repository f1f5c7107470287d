//! Turning a source into an analyzed [`Track`]

use super::remote;
use super::{label_from_source, Source};
use crate::analysis::{
    analyze_buffer, display_label, extract_metadata, read_sidecar, write_sidecar, BeatTracker,
    SpectralTimbre, StratumBeatTracker, TimbreExtractor,
};
use crate::audio;
use crate::error::{AutomixError, Result};
use crate::types::Track;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Ingestion backend
pub trait TrackLoader: Send + Sync {
    /// Load and analyze one source
    fn load(&self, source: &Source) -> Result<Track>;

    /// Get the name of this loader (for logging)
    fn name(&self) -> &'static str;
}

/// Loader that decodes audio files and analyzes them, or reads their sidecars
pub struct AudioTrackLoader {
    beat_tracker: Box<dyn BeatTracker>,
    timbre: Box<dyn TimbreExtractor>,
    keep_audio: bool,
    write_sidecars: bool,
    temp_dir: Option<PathBuf>,
}

impl AudioTrackLoader {
    pub fn new() -> Self {
        Self {
            beat_tracker: Box::new(StratumBeatTracker::new()),
            timbre: Box::new(SpectralTimbre::new()),
            keep_audio: true,
            write_sidecars: false,
            temp_dir: None,
        }
    }

    /// Swap the analysis backends
    pub fn with_analyzers(mut self, beat_tracker: Box<dyn BeatTracker>, timbre: Box<dyn TimbreExtractor>) -> Self {
        self.beat_tracker = beat_tracker;
        self.timbre = timbre;
        self
    }

    /// Keep decoded audio on the track (needed for rendering)
    pub fn keep_audio(mut self, keep: bool) -> Self {
        self.keep_audio = keep;
        self
    }

    /// Store fresh analyses of local files as sidecars
    pub fn write_sidecars(mut self, write: bool) -> Self {
        self.write_sidecars = write;
        self
    }

    /// Directory for downloaded sources instead of the system temp directory
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    fn load_file(&self, path: &Path, source_id: &str, local: bool) -> Result<Track> {
        if !path.is_file() {
            return Err(AutomixError::FileNotFound(path.to_path_buf()));
        }

        let sidecar = if local { read_sidecar(path)? } else { None };
        let needs_decode = self.keep_audio || sidecar.is_none();
        let stereo = if needs_decode { Some(audio::decode(path)?) } else { None };

        let analysis = match (sidecar, &stereo) {
            (Some(analysis), _) => analysis,
            (None, Some(stereo)) => {
                let mono = audio::analysis_buffer(stereo);
                let analysis = analyze_buffer(&mono, self.beat_tracker.as_ref(), self.timbre.as_ref())?;
                if local && self.write_sidecars {
                    if let Err(e) = write_sidecar(path, &analysis) {
                        warn!("Could not store analysis for {}: {}", path.display(), e);
                    }
                }
                analysis
            }
            (None, None) => return Err(AutomixError::analysis("No audio decoded")),
        };

        let label = display_label(&extract_metadata(path)).unwrap_or_else(|| label_from_source(source_id));
        let mut track = Track::new(source_id, analysis).with_label(label);
        if self.keep_audio {
            if let Some(stereo) = stereo {
                track = track.with_audio(stereo);
            }
        }

        debug!(
            "Loaded {} ({:.1}s, {} beats, {:.1} dB)",
            track.label,
            track.duration(),
            track.analysis.beats.len(),
            track.analysis.loudness
        );
        Ok(track)
    }
}

impl Default for AudioTrackLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackLoader for AudioTrackLoader {
    fn load(&self, source: &Source) -> Result<Track> {
        let id = source.id();
        let result = match source {
            Source::Local(path) => self.load_file(path, &id, true),
            Source::Remote(url) => {
                // Dropping the temp file deletes it, on success and on failure
                let temp = remote::download(url, self.temp_dir.as_deref())?;
                self.load_file(temp.path(), &id, false)
            }
        };
        result.map_err(|e| e.for_source(&id))
    }

    fn name(&self) -> &'static str {
        "audio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Quantum, Segment, TrackAnalysis};
    use tempfile::TempDir;

    fn write_sidecar_only(dir: &Path, name: &str) -> PathBuf {
        let audio = dir.join(name);
        std::fs::write(&audio, b"not really audio").unwrap();
        let analysis = TrackAnalysis {
            duration: 4.0,
            tempo: 120.0,
            loudness: -11.0,
            beats: (0..8).map(|i| Quantum::new(i as f64 * 0.5, 0.5)).collect(),
            segments: vec![Segment {
                start: 0.0,
                duration: 4.0,
                loudness_max: -10.0,
                timbre: vec![0.0; 12],
            }],
        };
        write_sidecar(&audio, &analysis).unwrap();
        audio
    }

    #[test]
    fn test_sidecar_skips_decoding_when_audio_not_needed() {
        let dir = TempDir::new().unwrap();
        let audio = write_sidecar_only(dir.path(), "song.mp3");
        let loader = AudioTrackLoader::new().keep_audio(false);

        let track = loader.load(&Source::Local(audio)).unwrap();
        assert_eq!(track.label, "song");
        assert_eq!(track.analysis.beats.len(), 8);
        assert!(track.audio.is_none());
    }

    #[test]
    fn test_undecodable_file_is_recoverable() {
        let dir = TempDir::new().unwrap();
        let audio = write_sidecar_only(dir.path(), "song.mp3");
        let loader = AudioTrackLoader::new().keep_audio(true);

        let err = loader.load(&Source::Local(audio)).unwrap_err();
        assert!(err.is_recoverable(), "{}", err);
    }

    #[test]
    fn test_missing_file() {
        let loader = AudioTrackLoader::new();
        let err = loader
            .load(&Source::Local(PathBuf::from("/no/such/track.wav")))
            .unwrap_err();
        assert!(matches!(err, AutomixError::FileNotFound(_)));
    }
}
