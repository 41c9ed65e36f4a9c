//! Shared helpers for integration tests.
//!
//! Provides [`MockMux`], an in-process [`Multiplexer`] that serves canned
//! track lists and records how many mux calls run at the same time, and
//! [`MediaFolder`] for laying out input files on disk.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use trackpick_av::{Error, MediaFile, MuxPlan, Multiplexer, Result, ToolOutput, Track, TrackKind};

/// Size of every generated input file.
pub const INPUT_SIZE: usize = 4096;

pub fn audio(id: u32, language: &str) -> Track {
    Track {
        id,
        kind: TrackKind::Audio,
        language: language.to_string(),
        name: None,
        codec: "AAC".to_string(),
        default: id == 1,
        forced: false,
    }
}

pub fn subtitle(id: u32, language: &str) -> Track {
    Track {
        id,
        kind: TrackKind::Subtitle,
        language: language.to_string(),
        name: None,
        codec: "SubStationAlpha".to_string(),
        default: false,
        forced: false,
    }
}

/// A temporary input folder.
pub struct MediaFolder {
    pub dir: TempDir,
}

impl MediaFolder {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create an input file of [`INPUT_SIZE`] bytes.
    pub fn add(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        let body: Vec<u8> = (0..INPUT_SIZE).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, body).unwrap();
        path
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("output")
    }
}

/// Names of the regular files in `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

/// In-process multiplexer for batch tests.
pub struct MockMux {
    tracks: HashMap<String, Vec<Track>>,
    unreadable: HashSet<String>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    available: bool,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    mux_calls: AtomicUsize,
    probe_calls: AtomicUsize,
}

impl MockMux {
    pub fn new() -> Self {
        Self {
            tracks: HashMap::new(),
            unreadable: HashSet::new(),
            failing: HashSet::new(),
            panicking: HashSet::new(),
            available: true,
            delay: Duration::from_millis(10),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            mux_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
        }
    }

    /// Serve `tracks` for the file named `name`.
    pub fn file(mut self, name: &str, tracks: Vec<Track>) -> Self {
        self.tracks.insert(name.to_string(), tracks);
        self
    }

    /// Fail to identify the file named `name`.
    pub fn unreadable(mut self, name: &str) -> Self {
        self.unreadable.insert(name.to_string());
        self
    }

    /// Write a partial output for `name` and then fail.
    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// Panic while muxing `name`.
    pub fn panicking(mut self, name: &str) -> Self {
        self.panicking.insert(name.to_string());
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn mux_calls(&self) -> usize {
        self.mux_calls.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    fn name_of(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Multiplexer for MockMux {
    fn name(&self) -> &str {
        "mock-mkvmerge"
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(Error::tool_not_found("mock-mkvmerge"))
        }
    }

    async fn identify_with(&self, path: &Path, _cancel: &CancellationToken) -> Result<MediaFile> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let name = Self::name_of(path);

        if self.unreadable.contains(&name) {
            return Err(Error::parse_error(
                "mock-mkvmerge",
                "unsupported container",
            ));
        }

        let tracks = self.tracks.get(&name).cloned().unwrap_or_default();
        Ok(MediaFile {
            path: path.to_path_buf(),
            size: std::fs::metadata(path)?.len(),
            container: "Matroska".to_string(),
            tracks,
        })
    }

    async fn mux(&self, plan: &MuxPlan, cancel: &CancellationToken) -> Result<ToolOutput> {
        self.mux_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let name = Self::name_of(&plan.input);
        if self.panicking.contains(&name) {
            panic!("mock-mkvmerge crashed on {}", name);
        }
        if self.failing.contains(&name) {
            std::fs::write(&plan.output, b"partial")?;
        }

        let finished = tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.delay) => true,
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if !finished {
            return Err(Error::Cancelled {
                tool: "mock-mkvmerge".to_string(),
            });
        }
        if self.failing.contains(&name) {
            return Err(Error::tool_failed("mock-mkvmerge", "Error: simulated failure"));
        }

        let body = format!(
            "{} audio={:?} subtitles={:?}\n",
            name, plan.keep.audio, plan.keep.subtitles
        );
        std::fs::write(&plan.output, body)?;

        Ok(ToolOutput {
            status: ExitStatus::default(),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}
