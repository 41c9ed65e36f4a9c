//! Folder-level track inventory.
//!
//! Lists the media files of a folder and probes each of them, collecting the
//! union of audio and subtitle languages so a selection can be made once for
//! the whole folder.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use trackpick_av::{language, MediaFile, Multiplexer, Track, TrackKind};

/// Upper bound on concurrent probes during discovery.
pub const DEFAULT_PROBE_CONCURRENCY: usize = 4;

/// Check if a path has one of the given extensions (case-insensitive).
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            extensions
                .iter()
                .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// List the regular files of `folder` with a matching extension, sorted by
/// file name. Subfolders are not descended into.
pub fn list_media_files(folder: &Path, extensions: &[String]) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && has_extension(&path, extensions) {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Tracks of one file, ordered by track id.
pub async fn discover_tracks(mux: &dyn Multiplexer, path: &Path) -> trackpick_av::Result<Vec<Track>> {
    Ok(mux.identify(path).await?.tracks)
}

/// A file the multiplexer could not read.
#[derive(Debug, Clone, Serialize)]
pub struct UnreadableFile {
    pub path: PathBuf,
    pub error: String,
}

/// How many files carry a given (kind, language) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageCount {
    pub kind: TrackKind,
    /// Canonical language code, `und` when untagged.
    pub language: String,
    /// Human-readable language name.
    pub name: String,
    /// Number of readable files with at least one such track.
    pub files: usize,
}

/// Result of probing a whole folder.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FolderInventory {
    /// Readable files in input order.
    pub files: Vec<MediaFile>,
    /// Files that failed to probe, with the reason.
    pub unreadable: Vec<UnreadableFile>,
    /// Distinct (kind, language) pairs across readable files, audio first.
    pub languages: Vec<LanguageCount>,
}

impl FolderInventory {
    /// Build an inventory from per-file probe results.
    pub fn from_results(
        results: impl IntoIterator<Item = (PathBuf, trackpick_av::Result<MediaFile>)>,
    ) -> Self {
        let mut inventory = FolderInventory::default();
        let mut counts: BTreeMap<(TrackKind, String), usize> = BTreeMap::new();

        for (path, result) in results {
            match result {
                Ok(file) => {
                    let mut seen: Vec<(TrackKind, String)> = file
                        .tracks
                        .iter()
                        .map(|t| (t.kind, t.language_key()))
                        .collect();
                    seen.sort();
                    seen.dedup();
                    for key in seen {
                        *counts.entry(key).or_insert(0) += 1;
                    }
                    inventory.files.push(file);
                }
                Err(e) => {
                    tracing::warn!("Could not read tracks of {:?}: {}", path, e);
                    inventory.unreadable.push(UnreadableFile {
                        path,
                        error: e.to_string(),
                    });
                }
            }
        }

        inventory.languages = counts
            .into_iter()
            .map(|((kind, language), files)| LanguageCount {
                kind,
                name: language::display_name(&language),
                language,
                files,
            })
            .collect();

        inventory
    }

    /// Languages of the given kind.
    pub fn languages_of(&self, kind: TrackKind) -> impl Iterator<Item = &LanguageCount> {
        self.languages.iter().filter(move |l| l.kind == kind)
    }

    /// Total number of files examined.
    pub fn total(&self) -> usize {
        self.files.len() + self.unreadable.len()
    }
}

/// Probe every path with at most `concurrency` probes in flight.
///
/// Per-file failures are collected in [`FolderInventory::unreadable`]; the
/// pass itself never fails.
pub async fn discover_folder(
    mux: &dyn Multiplexer,
    paths: &[PathBuf],
    concurrency: usize,
) -> FolderInventory {
    tracing::debug!("Probing {} files", paths.len());

    let results: Vec<(PathBuf, trackpick_av::Result<MediaFile>)> = stream::iter(paths.iter().cloned())
        .map(|path| async move {
            let result = mux.identify(&path).await;
            (path, result)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    FolderInventory::from_results(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use trackpick_av::Error;

    fn track(id: u32, kind: TrackKind, language: &str) -> Track {
        Track {
            id,
            kind,
            language: language.to_string(),
            name: None,
            codec: "AAC".to_string(),
            default: false,
            forced: false,
        }
    }

    fn media(name: &str, tracks: Vec<Track>) -> MediaFile {
        MediaFile {
            path: PathBuf::from(name),
            size: 1024,
            container: "Matroska".to_string(),
            tracks,
        }
    }

    #[test]
    fn test_has_extension_case_insensitive() {
        let exts = vec!["mkv".to_string()];
        assert!(has_extension(Path::new("a.mkv"), &exts));
        assert!(has_extension(Path::new("a.MKV"), &exts));
        assert!(!has_extension(Path::new("a.mp4"), &exts));
        assert!(!has_extension(Path::new("mkv"), &exts));
        assert!(has_extension(Path::new("a.mka"), &[".mka".to_string()]));
    }

    #[test]
    fn test_list_media_files_sorted_and_flat() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.mkv"), b"x").unwrap();
        fs::write(dir.path().join("a.MKV"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(dir.path().join("output")).unwrap();
        fs::write(dir.path().join("output").join("c.mkv"), b"x").unwrap();

        let files = list_media_files(dir.path(), &["mkv".to_string()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.MKV", "b.mkv"]);
    }

    #[test]
    fn test_inventory_counts_files_per_language() {
        let results = vec![
            (
                PathBuf::from("ep01.mkv"),
                Ok(media(
                    "ep01.mkv",
                    vec![
                        track(1, TrackKind::Audio, "jpn"),
                        track(2, TrackKind::Audio, "en"),
                        track(3, TrackKind::Subtitle, "fre"),
                        track(4, TrackKind::Subtitle, "fr"),
                    ],
                )),
            ),
            (
                PathBuf::from("ep02.mkv"),
                Ok(media("ep02.mkv", vec![track(1, TrackKind::Audio, "ja")])),
            ),
            (
                PathBuf::from("ep03.mkv"),
                Err(Error::parse_error("mkvmerge", "unsupported container")),
            ),
        ];

        let inventory = FolderInventory::from_results(results);
        assert_eq!(inventory.total(), 3);
        assert_eq!(inventory.files.len(), 2);
        assert_eq!(inventory.unreadable.len(), 1);
        assert!(inventory.unreadable[0].error.contains("unsupported"));

        let audio: Vec<_> = inventory.languages_of(TrackKind::Audio).collect();
        assert_eq!(audio.len(), 2);
        let jpn = audio.iter().find(|l| l.language == "jpn").unwrap();
        assert_eq!(jpn.files, 2);
        assert_eq!(jpn.name, "Japanese");

        // Two French subtitle tracks in one file count once
        let subs: Vec<_> = inventory.languages_of(TrackKind::Subtitle).collect();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].files, 1);
    }

    #[test]
    fn test_unreadable_files_excluded_from_languages() {
        let results = vec![(
            PathBuf::from("bad.mkv"),
            Err(Error::parse_error("mkvmerge", "not a container")),
        )];
        let inventory = FolderInventory::from_results(results);
        assert!(inventory.languages.is_empty());
        assert_eq!(inventory.unreadable.len(), 1);
    }
}
