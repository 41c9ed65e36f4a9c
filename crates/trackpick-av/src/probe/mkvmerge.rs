//! mkvmerge-based track identification (`mkvmerge -J`).

use super::types::*;
use crate::command::ToolCommand;
use crate::language::{self, UNDETERMINED};
use crate::{Error, Result, MKVMERGE};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
struct IdentifyOutput {
    #[serde(default)]
    container: Option<IdentifyContainer>,
    #[serde(default)]
    tracks: Vec<IdentifyTrack>,
    #[serde(default)]
    errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct IdentifyContainer {
    #[serde(default)]
    recognized: bool,
    #[serde(default)]
    supported: bool,
    #[serde(rename = "type")]
    container_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdentifyTrack {
    id: u32,
    #[serde(rename = "type")]
    track_type: String,
    #[serde(default)]
    codec: String,
    #[serde(default)]
    properties: IdentifyProperties,
}

#[derive(Debug, Default, Deserialize)]
struct IdentifyProperties {
    language: Option<String>,
    language_ietf: Option<String>,
    track_name: Option<String>,
    #[serde(default)]
    default_track: bool,
    #[serde(default)]
    forced_track: bool,
}

/// Identify the tracks of a file by running `mkvmerge -J`.
///
/// # Errors
///
/// - [`Error::FileNotFound`] if the input does not exist.
/// - [`Error::ToolNotFound`] if the tool cannot be spawned.
/// - [`Error::ParseError`] if mkvmerge does not recognize the container or
///   prints output that is not valid identification JSON.
pub async fn probe_with_mkvmerge(
    tool: &Path,
    path: &Path,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<MediaFile> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::file_not_found(path)
        } else {
            Error::Io(e)
        }
    })?;

    #[cfg(feature = "tracing")]
    tracing::debug!("Identifying tracks of {:?}", path);

    // mkvmerge exits with 2 for files it cannot read but still prints the
    // JSON document with an `errors` array, which carries the better message.
    let output = ToolCommand::new(tool.to_path_buf())
        .arg("-J")
        .arg(path.to_string_lossy())
        .timeout(timeout)
        .success_codes([0, 1, 2])
        .cancel_on(cancel.clone())
        .execute()
        .await?;

    let parsed: IdentifyOutput = match serde_json::from_str(&output.stdout) {
        Ok(parsed) => parsed,
        Err(e) if output.code() == Some(0) => {
            return Err(Error::parse_error(MKVMERGE, format!("invalid JSON: {e}")));
        }
        Err(_) => {
            return Err(Error::parse_error(MKVMERGE, output.diagnostic()));
        }
    };

    parse_identify_output(path, metadata.len(), parsed)
}

/// Parse the JSON printed by `mkvmerge -J` into a [`MediaFile`].
pub fn parse_identify_json(path: &Path, size: u64, json: &str) -> Result<MediaFile> {
    let parsed: IdentifyOutput = serde_json::from_str(json)
        .map_err(|e| Error::parse_error(MKVMERGE, format!("invalid JSON: {e}")))?;
    parse_identify_output(path, size, parsed)
}

fn parse_identify_output(path: &Path, size: u64, output: IdentifyOutput) -> Result<MediaFile> {
    if !output.errors.is_empty() {
        return Err(Error::parse_error(MKVMERGE, output.errors.join("; ")));
    }

    let container = output
        .container
        .ok_or_else(|| Error::parse_error(MKVMERGE, "missing container information"))?;

    if !container.recognized {
        return Err(Error::parse_error(
            MKVMERGE,
            format!("container of {} not recognized", path.display()),
        ));
    }
    if !container.supported {
        return Err(Error::parse_error(
            MKVMERGE,
            format!(
                "container {} of {} not supported",
                container.container_type.as_deref().unwrap_or("unknown"),
                path.display()
            ),
        ));
    }

    let mut tracks: Vec<Track> = output
        .tracks
        .into_iter()
        .filter_map(|t| {
            let kind = match t.track_type.as_str() {
                "audio" => TrackKind::Audio,
                "subtitles" => TrackKind::Subtitle,
                _ => return None,
            };
            let props = t.properties;
            let language = props
                .language
                .filter(|l| !l.trim().is_empty())
                .or(props.language_ietf.filter(|l| !l.trim().is_empty()))
                .unwrap_or_else(|| UNDETERMINED.to_string());

            Some(Track {
                id: t.id,
                kind,
                language,
                name: props
                    .track_name
                    .filter(|n| !n.trim().is_empty())
                    .map(|n| language::repair_track_name(&n)),
                codec: t.codec,
                default: props.default_track,
                forced: props.forced_track,
            })
        })
        .collect();

    tracks.sort_by_key(|t| t.id);

    Ok(MediaFile {
        path: path.to_path_buf(),
        size,
        container: container.container_type.unwrap_or_default(),
        tracks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::path::PathBuf;

    const SAMPLE: &str = r#"{
      "container": {"recognized": true, "supported": true, "type": "Matroska"},
      "errors": [],
      "file_name": "episode01.mkv",
      "tracks": [
        {"codec": "AVC/H.264/MPEG-4p10", "id": 0, "type": "video",
         "properties": {"language": "und"}},
        {"codec": "AAC", "id": 2, "type": "audio",
         "properties": {"language": "eng", "language_ietf": "en", "default_track": false}},
        {"codec": "AAC", "id": 1, "type": "audio",
         "properties": {"language": "jpn", "language_ietf": "ja", "track_name": "Japonais", "default_track": true}},
        {"codec": "SubStationAlpha", "id": 3, "type": "subtitles",
         "properties": {"language": "fre", "track_name": "FranÃ§ais", "forced_track": true}},
        {"codec": "SubRip/SRT", "id": 4, "type": "subtitles",
         "properties": {"language_ietf": "en-US"}},
        {"codec": "SubRip/SRT", "id": 5, "type": "subtitles", "properties": {}}
      ],
      "warnings": []
    }"#;

    #[test]
    fn test_parse_sample() {
        let file = parse_identify_json(&PathBuf::from("/media/episode01.mkv"), 1024, SAMPLE)
            .unwrap();

        assert_eq!(file.container, "Matroska");
        assert_eq!(file.size, 1024);
        // Video tracks are not selectable, remaining tracks are sorted by id.
        let ids: Vec<u32> = file.tracks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        let jpn = &file.tracks[0];
        assert_eq!(jpn.kind, TrackKind::Audio);
        assert_eq!(jpn.language, "jpn");
        assert_eq!(jpn.name.as_deref(), Some("Japonais"));
        assert!(jpn.default);

        let fre = &file.tracks[2];
        assert_eq!(fre.kind, TrackKind::Subtitle);
        assert_eq!(fre.name.as_deref(), Some("Français"));
        assert!(fre.forced);

        assert_eq!(file.tracks[3].language, "en-US");
        assert_eq!(file.tracks[4].language, "und");
    }

    #[test]
    fn test_unrecognized_container() {
        let json = r#"{"container": {"recognized": false, "supported": false}, "errors": [], "tracks": []}"#;
        let result = parse_identify_json(&PathBuf::from("/media/notes.txt"), 3, json);
        assert_matches!(result, Err(Error::ParseError { .. }));
    }

    #[test]
    fn test_errors_array_is_reported() {
        let json = r#"{"errors": ["The file could not be opened for reading."], "tracks": []}"#;
        let err = parse_identify_json(&PathBuf::from("/media/broken.mkv"), 3, json).unwrap_err();
        assert!(err.to_string().contains("could not be opened"));
    }

    #[test]
    fn test_invalid_json() {
        let result = parse_identify_json(&PathBuf::from("/media/x.mkv"), 0, "not json");
        assert_matches!(result, Err(Error::ParseError { .. }));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = probe_with_mkvmerge(
            Path::new("mkvmerge"),
            Path::new("/nonexistent/file.mkv"),
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await;
        assert_matches!(result, Err(Error::FileNotFound { .. }));
    }
}
