use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use trackpick_av::{MediaFile, ResolvedKeep};

/// One input of a batch.
#[derive(Debug, Clone)]
pub enum BatchItem {
    /// Already probed; the worker goes straight to muxing.
    Probed(MediaFile),
    /// Not probed yet; the worker probes it first.
    Pending(PathBuf),
    /// Probing failed in an earlier discovery pass.
    ProbeFailed { path: PathBuf, error: String },
}

impl BatchItem {
    pub fn path(&self) -> &Path {
        match self {
            BatchItem::Probed(file) => &file.path,
            BatchItem::Pending(path) => path,
            BatchItem::ProbeFailed { path, .. } => path,
        }
    }
}

impl From<MediaFile> for BatchItem {
    fn from(file: MediaFile) -> Self {
        BatchItem::Probed(file)
    }
}

impl From<PathBuf> for BatchItem {
    fn from(path: PathBuf) -> Self {
        BatchItem::Pending(path)
    }
}

/// Where a file is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Pending,
    Probing,
    Ready,
    Muxing,
    Succeeded,
    Failed,
    ProbeFailed,
    Skipped,
}

impl FileState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileState::Succeeded | FileState::Failed | FileState::ProbeFailed | FileState::Skipped
        )
    }
}

impl From<JobStatus> for FileState {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Succeeded => FileState::Succeeded,
            JobStatus::Failed => FileState::Failed,
            JobStatus::ProbeFailed => FileState::ProbeFailed,
            JobStatus::Skipped => FileState::Skipped,
        }
    }
}

/// Terminal outcome of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Succeeded,
    Failed,
    ProbeFailed,
    Skipped,
}

/// Outcome of processing one file.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub path: PathBuf,
    pub status: JobStatus,
    /// Error detail for failed and probe-failed jobs.
    pub error: Option<String>,
    /// Size of the original in bytes.
    pub input_size: u64,
    /// Size of the written output, for successes.
    pub output_size: Option<u64>,
    pub output_path: Option<PathBuf>,
    /// Track ids kept, once resolved.
    pub keep: Option<ResolvedKeep>,
    /// Whether the audio fallback policy chose the audio tracks.
    pub fallback_applied: bool,
    pub duration_ms: u64,
}

impl JobResult {
    fn new(path: PathBuf, status: JobStatus, input_size: u64) -> Self {
        Self {
            path,
            status,
            error: None,
            input_size,
            output_size: None,
            output_path: None,
            keep: None,
            fallback_applied: false,
            duration_ms: 0,
        }
    }

    pub fn succeeded(
        path: PathBuf,
        input_size: u64,
        output_path: PathBuf,
        output_size: u64,
        keep: ResolvedKeep,
    ) -> Self {
        let mut result = Self::new(path, JobStatus::Succeeded, input_size);
        result.fallback_applied = keep.fallback_applied;
        result.keep = Some(keep);
        result.output_path = Some(output_path);
        result.output_size = Some(output_size);
        result
    }

    pub fn failed(path: PathBuf, input_size: u64, error: impl Into<String>) -> Self {
        let mut result = Self::new(path, JobStatus::Failed, input_size);
        result.error = Some(error.into());
        result
    }

    pub fn probe_failed(path: PathBuf, input_size: u64, error: impl Into<String>) -> Self {
        let mut result = Self::new(path, JobStatus::ProbeFailed, input_size);
        result.error = Some(error.into());
        result
    }

    pub fn skipped(path: PathBuf, input_size: u64) -> Self {
        Self::new(path, JobStatus::Skipped, input_size)
    }

    /// Attach the resolved keep-lists to a result built without them.
    pub fn with_keep(mut self, keep: ResolvedKeep) -> Self {
        self.fallback_applied = keep.fallback_applied;
        self.keep = Some(keep);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    /// Bytes saved by this job; zero unless it succeeded.
    pub fn bytes_saved(&self) -> i64 {
        match (self.status, self.output_size) {
            (JobStatus::Succeeded, Some(out)) => self.input_size as i64 - out as i64,
            _ => 0,
        }
    }
}

/// Aggregated outcome of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub probe_failed: usize,
    pub skipped: usize,
    /// Worker count used for the parallel phase.
    pub workers: usize,
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the parallel phase.
    pub elapsed_ms: u64,
    /// Whether the batch was cancelled before completing.
    pub cancelled: bool,
    /// Total input size of the successful jobs.
    pub input_bytes: u64,
    /// Total output size of the successful jobs.
    pub output_bytes: u64,
    /// `input_bytes - output_bytes`; negative if outputs grew.
    pub bytes_saved: i64,
    /// `bytes_saved` as a percentage of `input_bytes`.
    pub saved_percent: f64,
    /// Per-file results sorted by input path.
    pub results: Vec<JobResult>,
}

impl BatchSummary {
    /// Aggregate job results. The order of `results` does not matter.
    pub fn from_results(
        mut results: Vec<JobResult>,
        workers: usize,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        cancelled: bool,
    ) -> Self {
        results.sort_by(|a, b| a.path.cmp(&b.path));

        let count = |status: JobStatus| results.iter().filter(|r| r.status == status).count();
        let succeeded = count(JobStatus::Succeeded);
        let failed = count(JobStatus::Failed);
        let probe_failed = count(JobStatus::ProbeFailed);
        let skipped = count(JobStatus::Skipped);

        let successes = || results.iter().filter(|r| r.status == JobStatus::Succeeded);
        let input_bytes: u64 = successes().map(|r| r.input_size).sum();
        let output_bytes: u64 = successes().filter_map(|r| r.output_size).sum();
        let bytes_saved: i64 = successes().map(JobResult::bytes_saved).sum();
        let saved_percent = if input_bytes > 0 {
            bytes_saved as f64 / input_bytes as f64 * 100.0
        } else {
            0.0
        };

        Self {
            total: results.len(),
            succeeded,
            failed,
            probe_failed,
            skipped,
            workers,
            started_at,
            elapsed_ms: elapsed.as_millis() as u64,
            cancelled,
            input_bytes,
            output_bytes,
            bytes_saved,
            saved_percent,
            results,
        }
    }

    /// Results that did not succeed or get skipped.
    pub fn failures(&self) -> impl Iterator<Item = &JobResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.status, JobStatus::Failed | JobStatus::ProbeFailed))
    }

    /// Successful results where the audio fallback was applied.
    pub fn fallbacks(&self) -> impl Iterator<Item = &JobResult> {
        self.results
            .iter()
            .filter(|r| r.status == JobStatus::Succeeded && r.fallback_applied)
    }
}

/// Progress event emitted when a file changes state.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub path: PathBuf,
    pub state: FileState,
    /// Files in a terminal state so far.
    pub completed: usize,
    pub total: usize,
}

/// Progress callback for batch runs.
pub type ProgressCallback = Arc<dyn Fn(BatchProgress) + Send + Sync>;
