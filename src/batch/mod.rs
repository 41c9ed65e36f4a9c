//! Parallel batch muxer.
//!
//! Applies one [`KeepSelection`] to many files, running up to N mkvmerge
//! processes at once. Every file ends in exactly one terminal state and a
//! failure of one file never affects the others.

mod error;
pub mod report;
mod types;

pub use error::{BatchError, Result};
pub use types::*;

use crate::inventory::list_media_files;
use crate::resources::{available_space, ConcurrencyPolicy, SystemResources};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use trackpick_av::{AudioFallback, KeepSelection, MediaFile, MuxPlan, Multiplexer, Workspace};

const CANCELLED: &str = "cancelled";

/// Runs a [`KeepSelection`] over a set of files with a bounded worker pool.
pub struct BatchMuxer {
    mux: Arc<dyn Multiplexer>,
    policy: ConcurrencyPolicy,
    fallback: AudioFallback,
    min_free_space_factor: f64,
    deterministic_seed: Option<String>,
    progress: Option<ProgressCallback>,
}

impl BatchMuxer {
    pub fn new(mux: Arc<dyn Multiplexer>) -> Self {
        Self {
            mux,
            policy: ConcurrencyPolicy::default(),
            fallback: AudioFallback::default(),
            min_free_space_factor: 1.5,
            deterministic_seed: None,
            progress: None,
        }
    }

    /// Create a muxer with the `[batch]` settings of a configuration.
    pub fn from_config(mux: Arc<dyn Multiplexer>, config: &crate::config::BatchConfig) -> Self {
        Self {
            mux,
            policy: ConcurrencyPolicy::from_config(config),
            fallback: config.audio_fallback,
            min_free_space_factor: config.min_free_space_factor,
            deterministic_seed: config.deterministic_seed.clone(),
            progress: None,
        }
    }

    pub fn with_policy(mut self, policy: ConcurrencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use exactly `workers` workers (still capped by the item count).
    pub fn with_workers(self, workers: usize) -> Self {
        self.with_policy(ConcurrencyPolicy::fixed(workers))
    }

    pub fn with_fallback(mut self, fallback: AudioFallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Require `factor` times the input size free on the output filesystem.
    /// Zero disables the check.
    pub fn with_min_free_space_factor(mut self, factor: f64) -> Self {
        self.min_free_space_factor = factor;
        self
    }

    pub fn with_deterministic_seed(mut self, seed: Option<String>) -> Self {
        self.deterministic_seed = seed;
        self
    }

    /// Set a progress callback.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// List the media files of `folder` and process them all.
    ///
    /// Files are probed by the workers, so an unreadable file becomes a
    /// probe failure in the summary instead of stopping the batch.
    pub async fn process_folder(
        &self,
        folder: &Path,
        extensions: &[String],
        keep: &KeepSelection,
        output_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary> {
        let files = list_media_files(folder, extensions).map_err(|e| {
            BatchError::InvalidInput(format!("cannot read folder {}: {}", folder.display(), e))
        })?;

        if files.is_empty() {
            return Err(BatchError::InvalidInput(format!(
                "no files with extension {} in {}",
                extensions.join("/"),
                folder.display()
            )));
        }

        let items = files.into_iter().map(BatchItem::Pending).collect();
        self.process(items, keep, output_dir, cancel).await
    }

    /// Process every item and return the aggregated summary.
    ///
    /// # Errors
    ///
    /// Only the preconditions are fatal, checked in this order before any
    /// work starts: an empty item list, an unavailable multiplexer (the
    /// output folder is not created), two inputs with the same file name,
    /// an output folder that is the folder of an input, and an output folder
    /// that cannot be created or written.
    pub async fn process(
        &self,
        items: Vec<BatchItem>,
        keep: &KeepSelection,
        output_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary> {
        if items.is_empty() {
            return Err(BatchError::InvalidInput("no files to process".to_string()));
        }

        self.mux
            .ensure_available()
            .map_err(|e| BatchError::ToolNotFound(e.to_string()))?;

        check_unique_file_names(&items)?;
        check_output_dir_distinct(output_dir, &items)?;
        prepare_output_dir(output_dir)?;

        let total = items.len();
        let resources = SystemResources::detect();
        let workers = self.policy.worker_count(&resources).min(total).max(1);

        tracing::info!("System: {}", resources);
        tracing::info!(
            "Processing {} file(s) with {} worker(s) of {}, keeping {} -> {:?}",
            total,
            workers,
            self.mux.name(),
            keep,
            output_dir
        );

        let started_at = Utc::now();
        let started = Instant::now();

        let ctx = Arc::new(JobContext {
            mux: Arc::clone(&self.mux),
            keep: keep.clone(),
            output_dir: output_dir.to_path_buf(),
            fallback: self.fallback,
            min_free_space_factor: self.min_free_space_factor,
            deterministic_seed: self.deterministic_seed.clone(),
            progress: self.progress.clone(),
            cancel: cancel.clone(),
            completed: AtomicUsize::new(0),
            total,
        });
        let queue = Arc::new(Mutex::new(items.into_iter().collect::<VecDeque<_>>()));
        let results = Arc::new(Mutex::new(Vec::with_capacity(total)));
        // Path each worker is handling, to account for it if the worker panics
        let in_flight = Arc::new(Mutex::new(vec![None::<PathBuf>; workers]));

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let ctx = Arc::clone(&ctx);
            let queue = Arc::clone(&queue);
            let results = Arc::clone(&results);
            let in_flight = Arc::clone(&in_flight);

            handles.push(tokio::spawn(async move {
                loop {
                    let Some(item) = queue.lock().pop_front() else {
                        break;
                    };
                    in_flight.lock()[worker] = Some(item.path().to_path_buf());

                    let result = if ctx.cancel.is_cancelled() {
                        JobResult::skipped(item.path().to_path_buf(), file_size(item.path()))
                    } else {
                        tracing::debug!("Worker {} picked {:?}", worker, item.path());
                        ctx.run(item).await
                    };

                    ctx.finish(&result);
                    results.lock().push(result);
                    in_flight.lock()[worker] = None;
                }
            }));
        }

        for (worker, handle) in handles.into_iter().enumerate() {
            let Err(e) = handle.await else {
                continue;
            };
            tracing::error!("Batch worker {} panicked: {}", worker, e);
            if let Some(path) = in_flight.lock()[worker].take() {
                let size = file_size(&path);
                results
                    .lock()
                    .push(JobResult::failed(path, size, format!("worker panicked: {}", e)));
            }
        }

        // Left over only when every worker panicked
        let abandoned: Vec<BatchItem> = queue.lock().drain(..).collect();
        for item in abandoned {
            let path = item.path().to_path_buf();
            let size = file_size(&path);
            results
                .lock()
                .push(JobResult::failed(path, size, "no batch worker left to run it"));
        }

        let results = std::mem::take(&mut *results.lock());
        let summary = BatchSummary::from_results(
            results,
            workers,
            started_at,
            started.elapsed(),
            cancel.is_cancelled(),
        );

        tracing::info!(
            "Batch finished: {} succeeded, {} failed, {} probe failed, {} skipped",
            summary.succeeded,
            summary.failed,
            summary.probe_failed,
            summary.skipped
        );

        Ok(summary)
    }
}

/// Shared state of the workers of one batch.
struct JobContext {
    mux: Arc<dyn Multiplexer>,
    keep: KeepSelection,
    output_dir: PathBuf,
    fallback: AudioFallback,
    min_free_space_factor: f64,
    deterministic_seed: Option<String>,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
    completed: AtomicUsize,
    total: usize,
}

impl JobContext {
    fn report(&self, path: &Path, state: FileState, completed: usize) {
        if let Some(ref callback) = self.progress {
            callback(BatchProgress {
                path: path.to_path_buf(),
                state,
                completed,
                total: self.total,
            });
        }
    }

    fn finish(&self, result: &JobResult) {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        match result.status {
            JobStatus::Succeeded => tracing::info!(
                "[{}/{}] {:?} done ({} -> {} bytes)",
                completed,
                self.total,
                result.path,
                result.input_size,
                result.output_size.unwrap_or(0)
            ),
            JobStatus::Skipped => tracing::debug!("Skipped {:?}", result.path),
            _ => tracing::error!(
                "[{}/{}] {:?} failed: {}",
                completed,
                self.total,
                result.path,
                result.error.as_deref().unwrap_or("unknown error")
            ),
        }
        self.report(&result.path, result.status.into(), completed);
    }

    fn in_progress(&self, path: &Path, state: FileState) {
        self.report(path, state, self.completed.load(Ordering::SeqCst));
    }

    async fn run(&self, item: BatchItem) -> JobResult {
        let started = Instant::now();
        let result = match self.probe(item).await {
            Ok(file) => self.mux_file(file).await,
            Err(result) => result,
        };
        result.with_duration(started.elapsed())
    }

    /// Turn an item into a probed file, or into its terminal result.
    async fn probe(&self, item: BatchItem) -> std::result::Result<MediaFile, JobResult> {
        match item {
            BatchItem::Probed(file) => Ok(file),
            BatchItem::ProbeFailed { path, error } => {
                let size = file_size(&path);
                Err(JobResult::probe_failed(path, size, error))
            }
            BatchItem::Pending(path) => {
                self.in_progress(&path, FileState::Probing);
                match self.mux.identify_with(&path, &self.cancel).await {
                    Ok(file) => Ok(file),
                    Err(e) if e.is_cancelled() => {
                        let size = file_size(&path);
                        Err(JobResult::failed(path, size, CANCELLED))
                    }
                    Err(e) => {
                        let size = file_size(&path);
                        Err(JobResult::probe_failed(path, size, e.to_string()))
                    }
                }
            }
        }
    }

    async fn mux_file(&self, file: MediaFile) -> JobResult {
        let path = file.path.clone();
        let size = file.size;
        self.in_progress(&path, FileState::Ready);

        let keep = match self.keep.resolve(&file.tracks, self.fallback) {
            Ok(keep) => keep,
            Err(e) => return JobResult::failed(path, size, e.to_string()),
        };
        if keep.fallback_applied {
            tracing::warn!(
                "No audio track of {:?} matches the selection, {} fallback kept {:?}",
                path,
                self.fallback,
                keep.audio
            );
        }

        if let Err(reason) = self.check_free_space(size) {
            return JobResult::failed(path, size, reason).with_keep(keep);
        }

        let workspace = match Workspace::new(&path, &self.output_dir) {
            Ok(ws) => ws,
            Err(e) => return JobResult::failed(path, size, e.to_string()).with_keep(keep),
        };

        let mut plan = MuxPlan::new(&path, workspace.output(), keep.clone());
        if let Some(ref seed) = self.deterministic_seed {
            plan = plan.deterministic(seed.clone());
        }

        self.in_progress(&path, FileState::Muxing);
        match self.mux.mux(&plan, &self.cancel).await {
            Ok(_) => {}
            Err(e) if e.is_cancelled() => {
                return JobResult::failed(path, size, CANCELLED).with_keep(keep)
            }
            Err(e) => return JobResult::failed(path, size, e.to_string()).with_keep(keep),
        }

        let output_size = workspace.output_size().unwrap_or(0);
        match workspace.finalize() {
            Ok(output_path) => JobResult::succeeded(path, size, output_path, output_size, keep),
            Err(e) => JobResult::failed(path, size, e.to_string()).with_keep(keep),
        }
    }

    fn check_free_space(&self, input_size: u64) -> std::result::Result<(), String> {
        if self.min_free_space_factor <= 0.0 {
            return Ok(());
        }
        let Some(free) = available_space(&self.output_dir) else {
            return Ok(());
        };

        let needed = (input_size as f64 * self.min_free_space_factor).ceil() as u64;
        if free < needed {
            return Err(format!(
                "insufficient disk space in {}: {} bytes free, {} required",
                self.output_dir.display(),
                free,
                needed
            ));
        }
        Ok(())
    }
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Absolute, normalized form of a possibly non-existent path. Symlinks are
/// resolved in the deepest existing ancestor.
fn resolve_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    let mut existing = normalized.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(mut resolved) = existing.canonicalize() {
            resolved.extend(missing.iter().rev());
            return resolved;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return normalized,
        }
    }
}

/// Every input lands at `output_dir/<file name>`, so names must not repeat.
fn check_unique_file_names(items: &[BatchItem]) -> Result<()> {
    let mut seen: HashMap<String, &Path> = HashMap::new();

    for item in items {
        let path = item.path();
        let Some(name) = path.file_name() else {
            return Err(BatchError::InvalidInput(format!(
                "input has no file name: {}",
                path.display()
            )));
        };
        // Case-insensitive filesystems would map both names to one output
        let key = name.to_string_lossy().to_lowercase();
        if let Some(first) = seen.insert(key, path) {
            return Err(BatchError::InvalidInput(format!(
                "inputs {} and {} would both be written to {}",
                first.display(),
                path.display(),
                name.to_string_lossy()
            )));
        }
    }
    Ok(())
}

fn check_output_dir_distinct(output_dir: &Path, items: &[BatchItem]) -> Result<()> {
    let output = resolve_path(output_dir);

    for item in items {
        let folder = match item.path().parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if resolve_path(folder) == output {
            return Err(BatchError::output_dir(
                output_dir,
                format!("it is the folder of input {}", item.path().display()),
            ));
        }
    }
    Ok(())
}

fn prepare_output_dir(output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .map_err(|e| BatchError::output_dir(output_dir, e.to_string()))?;

    if !output_dir.is_dir() {
        return Err(BatchError::output_dir(output_dir, "not a directory"));
    }

    tempfile::tempfile_in(output_dir)
        .map_err(|e| BatchError::output_dir(output_dir, format!("not writable: {}", e)))?;

    Ok(())
}
