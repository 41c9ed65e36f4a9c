//! End-to-end batch tests driving the binary against a fake mkvmerge.
//!
//! The fake tool answers `-J <file>` with the contents of `<file>.json`
//! (exit 2 with an error document when absent) and "muxes" by writing a
//! one-line description of the kept tracks to the `-o` path. Inputs whose
//! name contains `broken` get a partial output and exit 2.

#![cfg(unix)]

use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{tempdir, TempDir};

const FAKE_MKVMERGE: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "mkvmerge v80.0 ('fake') 64-bit"
  exit 0
fi
if [ "$1" = "-J" ]; then
  if [ -f "$2.json" ]; then
    cat "$2.json"
    exit 0
  fi
  echo '{"container":{"recognized":false,"supported":false},"errors":["The file could not be opened for reading"],"tracks":[],"warnings":[]}'
  exit 2
fi
out=""; audio="all"; subs="all"; input=""
while [ $# -gt 0 ]; do
  case "$1" in
    --deterministic) shift ;;
    -o) shift; out="$1" ;;
    --audio-tracks) shift; audio="$1" ;;
    --subtitle-tracks) shift; subs="$1" ;;
    --no-audio) audio="none" ;;
    --no-subtitles) subs="none" ;;
    *) input="$1" ;;
  esac
  shift
done
case "$input" in
  *broken*)
    echo "partial" > "$out"
    echo "Error: simulated mux failure"
    exit 2
    ;;
esac
echo "$(basename "$input") audio=$audio subtitles=$subs" > "$out"
exit 0
"#;

const EN_JA: &str = r#"{
  "container": {"recognized": true, "supported": true, "type": "Matroska"},
  "errors": [],
  "tracks": [
    {"id": 0, "type": "video", "codec": "AVC/H.264/MPEG-4p10", "properties": {}},
    {"id": 1, "type": "audio", "codec": "AAC", "properties": {"language": "eng"}},
    {"id": 2, "type": "audio", "codec": "AAC", "properties": {"language": "jpn"}},
    {"id": 3, "type": "subtitles", "codec": "SubStationAlpha", "properties": {"language": "fre"}}
  ]
}"#;

const EN_ONLY: &str = r#"{
  "container": {"recognized": true, "supported": true, "type": "Matroska"},
  "errors": [],
  "tracks": [
    {"id": 0, "type": "video", "codec": "AVC/H.264/MPEG-4p10", "properties": {}},
    {"id": 1, "type": "audio", "codec": "AAC", "properties": {"language": "eng"}}
  ]
}"#;

#[allow(deprecated)]
fn trackpick_cmd() -> Command {
    let mut cmd = Command::cargo_bin("trackpick").unwrap();
    cmd.env("RUST_LOG", "off");
    cmd
}

struct Fixture {
    _tools: TempDir,
    media: TempDir,
    mkvmerge: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tools = tempdir().unwrap();
        let mkvmerge = tools.path().join("mkvmerge");
        fs::write(&mkvmerge, FAKE_MKVMERGE).unwrap();
        fs::set_permissions(&mkvmerge, fs::Permissions::from_mode(0o755)).unwrap();

        Self {
            _tools: tools,
            media: tempdir().unwrap(),
            mkvmerge,
        }
    }

    fn folder(&self) -> &Path {
        self.media.path()
    }

    /// Create an input file, optionally with identification JSON.
    fn add(&self, name: &str, identify: Option<&str>) -> PathBuf {
        let path = self.folder().join(name);
        fs::write(&path, vec![0x1a; 4096]).unwrap();
        if let Some(json) = identify {
            fs::write(self.folder().join(format!("{}.json", name)), json).unwrap();
        }
        path
    }

    fn process(&self, output: &Path, extra: &[&str]) -> Value {
        let assert = trackpick_cmd()
            .arg("process")
            .arg(self.folder())
            .arg("--mkvmerge")
            .arg(&self.mkvmerge)
            .arg("--output")
            .arg(output)
            .arg("--json")
            .args(extra)
            .assert()
            .success();

        serde_json::from_slice(&assert.get_output().stdout).unwrap()
    }
}

fn status_of<'a>(summary: &'a Value, name: &str) -> &'a Value {
    summary["results"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["path"].as_str().unwrap().ends_with(name))
        .unwrap()
}

#[test]
fn test_process_keeps_selected_tracks() {
    let fx = Fixture::new();
    fx.add("ep01.mkv", Some(EN_JA));
    fx.add("ep02.mkv", Some(EN_JA));
    fx.add("ep03.mkv", Some(EN_ONLY));
    let out = fx.folder().join("output");

    let summary = fx.process(&out, &["-a", "ja", "--no-subtitles", "--jobs", "2"]);

    assert_eq!(summary["total"], 3);
    assert_eq!(summary["succeeded"], 3);
    assert_eq!(summary["workers"], 2);
    assert_eq!(
        fs::read_to_string(out.join("ep01.mkv")).unwrap(),
        "ep01.mkv audio=2 subtitles=none\n"
    );
    // No Japanese track: default fallback keeps every audio track
    assert_eq!(
        fs::read_to_string(out.join("ep03.mkv")).unwrap(),
        "ep03.mkv audio=1 subtitles=none\n"
    );
    assert_eq!(status_of(&summary, "ep03.mkv")["fallback_applied"], true);
    assert!(summary["bytes_saved"].as_i64().unwrap() > 0);
}

#[test]
fn test_fallback_fail_policy() {
    let fx = Fixture::new();
    fx.add("ep01.mkv", Some(EN_JA));
    fx.add("ep03.mkv", Some(EN_ONLY));
    let out = fx.folder().join("output");

    let summary = fx.process(&out, &["-a", "jpn", "--no-subtitles", "--fallback", "fail"]);

    assert_eq!(summary["succeeded"], 1);
    assert_eq!(summary["failed"], 1);
    assert_eq!(status_of(&summary, "ep03.mkv")["status"], "failed");
    assert!(!out.join("ep03.mkv").exists());
}

#[test]
fn test_two_runs_produce_identical_outputs() {
    let fx = Fixture::new();
    fx.add("ep01.mkv", Some(EN_JA));
    fx.add("ep02.mkv", Some(EN_JA));
    let first = fx.folder().join("run1");
    let second = fx.folder().join("run2");

    fx.process(&first, &["-a", "jpn", "-s", "fre"]);
    fx.process(&second, &["-a", "jpn", "-s", "fre"]);

    for name in ["ep01.mkv", "ep02.mkv"] {
        assert_eq!(
            fs::read(first.join(name)).unwrap(),
            fs::read(second.join(name)).unwrap()
        );
    }
}

#[test]
fn test_originals_unchanged_and_failures_isolated() {
    let fx = Fixture::new();
    let good = fx.add("good.mkv", Some(EN_JA));
    fx.add("broken.mkv", Some(EN_JA));
    fx.add("corrupt.mkv", None);
    let before = fs::read(&good).unwrap();
    let out = fx.folder().join("output");

    let summary = fx.process(&out, &["-a", "jpn"]);

    assert_eq!(summary["total"], 3);
    assert_eq!(summary["succeeded"], 1);
    assert_eq!(summary["failed"], 1);
    assert_eq!(summary["probe_failed"], 1);

    let broken = status_of(&summary, "broken.mkv");
    assert!(broken["error"]
        .as_str()
        .unwrap()
        .contains("simulated mux failure"));
    let corrupt = status_of(&summary, "corrupt.mkv");
    assert!(corrupt["error"].as_str().unwrap().contains("could not be opened"));

    assert_eq!(fs::read(&good).unwrap(), before);

    // Only the successful output, no partial file or staging folder
    let entries: Vec<_> = fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(entries, vec!["good.mkv"]);
}

#[test]
fn test_output_dir_cannot_be_input_folder() {
    let fx = Fixture::new();
    fx.add("ep01.mkv", Some(EN_JA));

    trackpick_cmd()
        .arg("process")
        .arg(fx.folder())
        .arg("--mkvmerge")
        .arg(&fx.mkvmerge)
        .arg("--output")
        .arg(fx.folder())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Output directory"));
}

#[test]
fn test_inventory_lists_languages() {
    let fx = Fixture::new();
    fx.add("ep01.mkv", Some(EN_JA));
    fx.add("ep02.mkv", Some(EN_ONLY));
    fx.add("corrupt.mkv", None);

    let assert = trackpick_cmd()
        .arg("inventory")
        .arg(fx.folder())
        .arg("--mkvmerge")
        .arg(&fx.mkvmerge)
        .arg("--json")
        .assert()
        .success();

    let inventory: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(inventory["files"].as_array().unwrap().len(), 2);
    assert_eq!(inventory["unreadable"].as_array().unwrap().len(), 1);

    let languages = inventory["languages"].as_array().unwrap();
    let english = languages
        .iter()
        .find(|l| l["kind"] == "audio" && l["language"] == "eng")
        .unwrap();
    assert_eq!(english["files"], 2);
    assert!(languages
        .iter()
        .any(|l| l["kind"] == "subtitle" && l["language"] == "fre"));
}

#[test]
fn test_probe_prints_track_labels() {
    let fx = Fixture::new();
    let file = fx.add("ep01.mkv", Some(EN_JA));

    trackpick_cmd()
        .arg("probe")
        .arg(&file)
        .arg("--mkvmerge")
        .arg(&fx.mkvmerge)
        .assert()
        .success()
        .stdout(predicate::str::contains("Track 2 - Japanese | AAC"))
        .stdout(predicate::str::contains("Track 3 - French | SubStationAlpha"));
}
