//! Retrieval of http(s) sources into temporary files
//!
//! The returned [`NamedTempFile`] deletes itself when dropped, so a fetched
//! track never outlives its analysis.

use crate::error::{AutomixError, Result};
use std::path::Path;
use tempfile::NamedTempFile;

/// Extensions kept from the URL; anything else is fetched as `.mp3`
const KNOWN_EXTENSIONS: [&str; 6] = ["mp3", "wav", "m4a", "au", "ogg", "mp4"];

/// True for `http://` and `https://` identifiers
pub fn is_remote(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Temp-file suffix for a URL, so the decoder gets a useful extension hint
pub fn remote_suffix(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| KNOWN_EXTENSIONS.contains(&ext.as_str()))
        .map(|ext| format!(".{}", ext))
        .unwrap_or_else(|| ".mp3".to_string())
}

/// Download `url` into a temporary file in `dir` (or the system temp directory)
#[cfg(feature = "remote")]
pub fn download(url: &str, dir: Option<&Path>) -> Result<NamedTempFile> {
    use tracing::debug;

    let fail = |reason: String| AutomixError::DownloadError {
        url: url.to_string(),
        reason,
    };

    let suffix = remote_suffix(url);
    let mut builder = tempfile::Builder::new();
    builder.prefix("automix-").suffix(&suffix);
    let mut file = match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(|e| fail(format!("Failed to create temporary file: {}", e)))?;

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| fail(e.to_string()))?;
    let bytes = response
        .copy_to(&mut file)
        .map_err(|e| fail(format!("Transfer interrupted: {}", e)))?;

    debug!("Fetched {} bytes from {} into {}", bytes, url, file.path().display());
    Ok(file)
}

/// Remote sources need the `remote` feature
#[cfg(not(feature = "remote"))]
pub fn download(url: &str, _dir: Option<&Path>) -> Result<NamedTempFile> {
    Err(AutomixError::DownloadError {
        url: url.to_string(),
        reason: "this build has no remote support (enable the `remote` feature)".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://example.com/a.mp3"));
        assert!(is_remote("HTTP://example.com/a.mp3"));
        assert!(!is_remote("/music/a.mp3"));
        assert!(!is_remote("ftp://example.com/a.mp3"));
    }

    #[test]
    fn test_remote_suffix_keeps_known_extensions() {
        assert_eq!(remote_suffix("https://x.org/set/track.OGG"), ".ogg");
        assert_eq!(remote_suffix("https://x.org/track.wav?token=abc.def"), ".wav");
        assert_eq!(remote_suffix("https://x.org/track.flac"), ".mp3");
        assert_eq!(remote_suffix("https://x.org/stream"), ".mp3");
    }

    #[cfg(feature = "remote")]
    #[test]
    fn test_failed_download_leaves_no_temp_file() {
        let dir = tempfile::TempDir::new().unwrap();

        let err = download("http://127.0.0.1:1/track.wav", Some(dir.path())).unwrap_err();

        assert!(matches!(err, AutomixError::DownloadError { .. }));
        assert!(err.is_recoverable());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
