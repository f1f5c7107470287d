//! Metadata extraction from audio file tags
//!
//! Uses lofty to read ID3v2 (MP3), Vorbis comments (FLAC/OGG), MP4 and AIFF tags.

use crate::types::TrackMetadata;
use lofty::{Accessor, Probe, TaggedFileExt};
use std::path::Path;
use tracing::debug;

/// Extract metadata from an audio file's tags
///
/// On error (corrupt tags, unsupported container), returns empty metadata.
pub fn extract_metadata(path: &Path) -> TrackMetadata {
    match extract_metadata_inner(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!("No readable tags in {}: {}", path.display(), e);
            TrackMetadata::default()
        }
    }
}

fn extract_metadata_inner(path: &Path) -> Result<TrackMetadata, lofty::error::LoftyError> {
    let tagged_file = Probe::open(path)?.read()?;
    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

    Ok(match tag {
        Some(tag) => TrackMetadata {
            title: non_empty(tag.title().map(|s| s.to_string())),
            artist: non_empty(tag.artist().map(|s| s.to_string())),
        },
        None => TrackMetadata::default(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// "Artist - Title", "Title", or `None` without a title tag
pub fn display_label(metadata: &TrackMetadata) -> Option<String> {
    match (&metadata.artist, &metadata.title) {
        (Some(artist), Some(title)) => Some(format!("{} - {}", artist, title)),
        (None, Some(title)) => Some(title.clone()),
        _ => None,
    }
}
