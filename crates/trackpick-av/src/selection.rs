//! Track selection.
//!
//! A [`KeepSelection`] is chosen once for a whole batch and resolved against
//! the actual tracks of every file. A predicate that names a language,
//! index or track name absent from a file simply contributes nothing for
//! that file.

use crate::language;
use crate::probe::{Track, TrackKind};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

const NAME_PREFIX: &str = "name:";

/// Minimum share of common words for a name to count as similar.
const NAME_SIMILARITY: f64 = 0.5;

/// Selects tracks of one kind by language, track id or track name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TrackPredicate {
    /// Any track whose language is this code or one of its aliases.
    Language(String),
    /// The track with this id.
    Index(u32),
    /// Tracks whose name best matches this one, case-insensitively.
    ///
    /// Per file, exact names win over names containing it, which win over
    /// names sharing more than half of their words with it.
    Name(String),
}

/// How well a track name matches a wanted name. Higher is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum NameMatch {
    Similar,
    Contains,
    Exact,
}

fn name_match(wanted: &str, name: Option<&str>) -> Option<NameMatch> {
    let wanted = wanted.trim().to_lowercase();
    let name = name?.trim().to_lowercase();
    if wanted.is_empty() || name.is_empty() {
        return None;
    }
    if name == wanted {
        return Some(NameMatch::Exact);
    }
    if name.contains(&wanted) {
        return Some(NameMatch::Contains);
    }

    let wanted_words: HashSet<&str> = wanted.split_whitespace().collect();
    let words: HashSet<&str> = name.split_whitespace().collect();
    let common = wanted_words.intersection(&words).count();
    let similarity = common as f64 / wanted_words.len().max(words.len()) as f64;
    (similarity > NAME_SIMILARITY).then_some(NameMatch::Similar)
}

impl TrackPredicate {
    /// Predicate matching a language code.
    pub fn language(code: impl Into<String>) -> Self {
        Self::Language(code.into())
    }

    /// Predicate matching a track id.
    pub fn index(id: u32) -> Self {
        Self::Index(id)
    }

    /// Predicate matching a track name.
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Whether the track satisfies this predicate on its own.
    ///
    /// For [`TrackPredicate::Name`] any exact, containing or similar name
    /// matches; [`TrackPredicate::select`] then keeps only the best tier.
    pub fn matches(&self, track: &Track) -> bool {
        match self {
            Self::Language(code) => language::same_language(code, &track.language),
            Self::Index(id) => track.id == *id,
            Self::Name(wanted) => name_match(wanted, track.name.as_deref()).is_some(),
        }
    }

    /// Ids of the tracks this predicate keeps among `tracks`.
    pub fn select(&self, tracks: &[&Track]) -> Vec<u32> {
        let Self::Name(wanted) = self else {
            return tracks
                .iter()
                .filter(|t| self.matches(t))
                .map(|t| t.id)
                .collect();
        };

        let scored: Vec<(u32, NameMatch)> = tracks
            .iter()
            .filter_map(|t| name_match(wanted, t.name.as_deref()).map(|m| (t.id, m)))
            .collect();
        let Some(best) = scored.iter().map(|(_, m)| *m).max() else {
            return Vec::new();
        };
        scored
            .into_iter()
            .filter(|(_, m)| *m == best)
            .map(|(id, _)| id)
            .collect()
    }
}

fn select_all(predicates: &[TrackPredicate], tracks: &[&Track]) -> Vec<u32> {
    predicates.iter().flat_map(|p| p.select(tracks)).collect()
}

impl FromStr for TrackPredicate {
    type Err = Error;

    /// `name:<text>` selects by track name, all-digit tokens are track ids
    /// and anything else is a language code.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidInput("empty track predicate".to_string()));
        }
        if let Some(name) = s.strip_prefix(NAME_PREFIX) {
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::InvalidInput("empty track name".to_string()));
            }
            return Ok(Self::Name(name.to_string()));
        }
        if s.chars().all(|c| c.is_ascii_digit()) {
            let id = s
                .parse()
                .map_err(|_| Error::InvalidInput(format!("track id out of range: {s}")))?;
            return Ok(Self::Index(id));
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(Error::InvalidInput(format!("invalid language code: {s}")));
        }
        Ok(Self::Language(s.to_string()))
    }
}

impl TryFrom<String> for TrackPredicate {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<TrackPredicate> for String {
    fn from(p: TrackPredicate) -> Self {
        p.to_string()
    }
}

impl fmt::Display for TrackPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Language(code) => write!(f, "{code}"),
            Self::Index(id) => write!(f, "{id}"),
            Self::Name(name) => write!(f, "{NAME_PREFIX}{name}"),
        }
    }
}

/// What to do with subtitle tracks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleRetention {
    /// Drop every subtitle track.
    None,
    /// Keep every subtitle track.
    #[default]
    All,
    /// Keep subtitle tracks matching any predicate.
    Matching(Vec<TrackPredicate>),
}

/// Policy applied when audio predicates match no audio track of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AudioFallback {
    /// Keep every audio track of the file.
    #[default]
    KeepAll,
    /// Keep only the audio track with the lowest id.
    KeepFirst,
    /// Report the file as failed.
    Fail,
}

impl FromStr for AudioFallback {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep-all" | "keep_all" | "all" => Ok(Self::KeepAll),
            "keep-first" | "keep_first" | "first" => Ok(Self::KeepFirst),
            "fail" => Ok(Self::Fail),
            other => Err(Error::InvalidInput(format!(
                "unknown audio fallback '{other}' (expected keep-all, keep-first or fail)"
            ))),
        }
    }
}

impl fmt::Display for AudioFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeepAll => write!(f, "keep-all"),
            Self::KeepFirst => write!(f, "keep-first"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// The tracks a user wants to keep, applied uniformly to every file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeepSelection {
    /// Audio predicates. Empty keeps every audio track.
    #[serde(default)]
    pub audio: Vec<TrackPredicate>,
    /// Subtitle handling.
    #[serde(default)]
    pub subtitles: SubtitleRetention,
}

/// Concrete track ids to keep for one file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResolvedKeep {
    /// Audio track ids, ascending.
    pub audio: Vec<u32>,
    /// Subtitle track ids, ascending.
    pub subtitles: Vec<u32>,
    /// Whether [`AudioFallback`] decided the audio list.
    pub fallback_applied: bool,
}

impl KeepSelection {
    /// Create a selection that keeps everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep audio tracks matching any of these predicates.
    pub fn audio(mut self, predicates: impl IntoIterator<Item = TrackPredicate>) -> Self {
        self.audio = predicates.into_iter().collect();
        self
    }

    /// Keep subtitle tracks matching any of these predicates.
    pub fn subtitles(mut self, predicates: impl IntoIterator<Item = TrackPredicate>) -> Self {
        let predicates: Vec<_> = predicates.into_iter().collect();
        self.subtitles = if predicates.is_empty() {
            SubtitleRetention::All
        } else {
            SubtitleRetention::Matching(predicates)
        };
        self
    }

    /// Drop every subtitle track.
    pub fn no_subtitles(mut self) -> Self {
        self.subtitles = SubtitleRetention::None;
        self
    }

    /// Resolve this selection against the tracks of one file.
    ///
    /// Returned ids are in ascending order (the original container order),
    /// never reordered by language. Audio and subtitles are resolved
    /// independently.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoAudioSelected`] when audio predicates match nothing
    /// and `fallback` is [`AudioFallback::Fail`].
    pub fn resolve(&self, tracks: &[Track], fallback: AudioFallback) -> Result<ResolvedKeep> {
        let audio_tracks: Vec<&Track> = tracks
            .iter()
            .filter(|t| t.kind == TrackKind::Audio)
            .collect();
        let subtitle_tracks: Vec<&Track> = tracks
            .iter()
            .filter(|t| t.kind == TrackKind::Subtitle)
            .collect();

        let mut fallback_applied = false;
        let mut audio: Vec<u32> = if self.audio.is_empty() {
            audio_tracks.iter().map(|t| t.id).collect()
        } else {
            select_all(&self.audio, &audio_tracks)
        };

        if audio.is_empty() && !self.audio.is_empty() && !audio_tracks.is_empty() {
            fallback_applied = true;
            audio = match fallback {
                AudioFallback::KeepAll => audio_tracks.iter().map(|t| t.id).collect(),
                AudioFallback::KeepFirst => {
                    audio_tracks.iter().map(|t| t.id).min().into_iter().collect()
                }
                AudioFallback::Fail => {
                    return Err(Error::NoAudioSelected {
                        available: audio_tracks.len(),
                    })
                }
            };
        }

        let mut subtitles: Vec<u32> = match &self.subtitles {
            SubtitleRetention::None => Vec::new(),
            SubtitleRetention::All => subtitle_tracks.iter().map(|t| t.id).collect(),
            SubtitleRetention::Matching(predicates) => select_all(predicates, &subtitle_tracks),
        };

        audio.sort_unstable();
        audio.dedup();
        subtitles.sort_unstable();
        subtitles.dedup();

        Ok(ResolvedKeep {
            audio,
            subtitles,
            fallback_applied,
        })
    }
}

impl fmt::Display for KeepSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |ps: &[TrackPredicate]| {
            ps.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
        };
        if self.audio.is_empty() {
            write!(f, "audio=all")?;
        } else {
            write!(f, "audio={}", join(&self.audio))?;
        }
        match &self.subtitles {
            SubtitleRetention::None => write!(f, " subtitles=none"),
            SubtitleRetention::All => write!(f, " subtitles=all"),
            SubtitleRetention::Matching(ps) => write!(f, " subtitles={}", join(ps)),
        }
    }
}
