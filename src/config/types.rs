use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use trackpick_av::{AudioFallback, KeepSelection, SubtitleRetention, TrackPredicate};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Explicit mkvmerge executable. When unset, PATH and the usual install
    /// folders are searched.
    #[serde(default)]
    pub mkvmerge_path: Option<PathBuf>,

    /// Maximum duration of one mkvmerge invocation, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    3600
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            mkvmerge_path: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    /// File extensions picked up from the input folder (case-insensitive)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Name of the output subfolder created inside the input folder
    #[serde(default = "default_output_dir_name")]
    pub output_dir_name: String,

    /// Fixed worker count. Overrides the resource-based sizing.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Memory budget of one mkvmerge job, in MiB
    #[serde(default = "default_per_job_memory_mb")]
    pub per_job_memory_mb: u64,

    /// Fraction of available memory left untouched when sizing the pool
    #[serde(default = "default_memory_reserve_fraction")]
    pub memory_reserve_fraction: f64,

    /// Upper bound on the resource-based worker count
    #[serde(default = "default_max_workers")]
    pub max_workers: Option<usize>,

    /// What to do when the audio selection matches nothing in a file
    #[serde(default)]
    pub audio_fallback: AudioFallback,

    /// Required free space on the output filesystem, as a multiple of the
    /// input size (0 disables the check)
    #[serde(default = "default_min_free_space_factor")]
    pub min_free_space_factor: f64,

    /// Seed passed to `mkvmerge --deterministic` (unset disables it)
    #[serde(default = "default_deterministic_seed")]
    pub deterministic_seed: Option<String>,
}

fn default_extensions() -> Vec<String> {
    vec!["mkv".to_string()]
}

fn default_output_dir_name() -> String {
    "output".to_string()
}

fn default_per_job_memory_mb() -> u64 {
    500
}

fn default_memory_reserve_fraction() -> f64 {
    0.2
}

fn default_max_workers() -> Option<usize> {
    Some(8)
}

fn default_min_free_space_factor() -> f64 {
    1.5
}

fn default_deterministic_seed() -> Option<String> {
    Some("trackpick".to_string())
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            output_dir_name: default_output_dir_name(),
            workers: None,
            per_job_memory_mb: default_per_job_memory_mb(),
            memory_reserve_fraction: default_memory_reserve_fraction(),
            max_workers: default_max_workers(),
            audio_fallback: AudioFallback::default(),
            min_free_space_factor: default_min_free_space_factor(),
            deterministic_seed: default_deterministic_seed(),
        }
    }
}

/// Default selection used when the command line names no tracks.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SelectionConfig {
    /// Audio languages or track ids to keep (empty keeps all audio)
    #[serde(default = "default_audio")]
    pub audio: Vec<TrackPredicate>,

    /// Keep subtitle tracks at all
    #[serde(default = "default_keep_subtitles")]
    pub keep_subtitles: bool,

    /// Subtitle languages or track ids to keep (empty keeps all subtitles)
    #[serde(default = "default_subtitles")]
    pub subtitles: Vec<TrackPredicate>,
}

fn default_audio() -> Vec<TrackPredicate> {
    vec![TrackPredicate::language("jpn")]
}

fn default_keep_subtitles() -> bool {
    true
}

fn default_subtitles() -> Vec<TrackPredicate> {
    vec![TrackPredicate::language("fre")]
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            audio: default_audio(),
            keep_subtitles: default_keep_subtitles(),
            subtitles: default_subtitles(),
        }
    }
}

impl SelectionConfig {
    /// The configured selection as a [`KeepSelection`].
    pub fn to_keep_selection(&self) -> KeepSelection {
        let subtitles = if !self.keep_subtitles {
            SubtitleRetention::None
        } else if self.subtitles.is_empty() {
            SubtitleRetention::All
        } else {
            SubtitleRetention::Matching(self.subtitles.clone())
        };

        KeepSelection {
            audio: self.audio.clone(),
            subtitles,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Also write log lines to this file
    #[serde(default)]
    pub file: Option<PathBuf>,
}
