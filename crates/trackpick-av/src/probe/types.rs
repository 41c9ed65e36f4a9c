//! Media file and track types.

use crate::language;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A container file and the tracks discovered in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFile {
    /// Path to the media file.
    pub path: PathBuf,
    /// File size in bytes at discovery time.
    pub size: u64,
    /// Container format reported by the tool (e.g., "Matroska").
    pub container: String,
    /// Audio and subtitle tracks, ordered by track id.
    pub tracks: Vec<Track>,
}

/// Kind of a selectable track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Subtitle,
}

/// One audio or subtitle track of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Track id within its file (mkvmerge numbering, shared across kinds).
    pub id: u32,
    /// Track kind.
    pub kind: TrackKind,
    /// Language code as reported (e.g., "jpn", "fre", "und").
    pub language: String,
    /// Track name, if the file carries one.
    pub name: Option<String>,
    /// Codec name (e.g., "AAC", "SubStationAlpha").
    pub codec: String,
    /// Whether this is the default track of its kind.
    pub default: bool,
    /// Whether this is a forced track.
    pub forced: bool,
}

impl MediaFile {
    /// Audio tracks in id order.
    pub fn audio_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Audio)
    }

    /// Subtitle tracks in id order.
    pub fn subtitle_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Subtitle)
    }

    /// File name without the directory part.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

impl Track {
    /// Canonical language key used for matching and aggregation.
    pub fn language_key(&self) -> String {
        language::canonical(&self.language)
    }

    /// Human-readable label, e.g. `Track 2 - Japanese | AAC | Commentary`.
    pub fn label(&self) -> String {
        let mut label = format!(
            "Track {} - {} | {}",
            self.id,
            language::display_name(&self.language),
            self.codec
        );
        if let Some(ref name) = self.name {
            label.push_str(" | ");
            label.push_str(name);
        }
        if self.default {
            label.push_str(" [default]");
        }
        if self.forced {
            label.push_str(" [forced]");
        }
        label
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Subtitle => write!(f, "subtitle"),
        }
    }
}
