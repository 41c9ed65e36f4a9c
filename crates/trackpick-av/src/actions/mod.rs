//! Media processing actions.
//!
//! The [`Multiplexer`] trait is the seam between batch orchestration and the
//! external tool: it identifies tracks and writes trimmed copies. [`MkvMerge`]
//! is the production implementation.

mod mux;

pub use mux::{mux_tracks, MuxPlan};

use crate::command::{ToolOutput, DEFAULT_TIMEOUT};
use crate::probe::{probe_with_mkvmerge, MediaFile};
use crate::{tools, Error, Result, MKVMERGE};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Identifies tracks and remuxes files.
///
/// Implementations must be safe to share across worker tasks.
#[async_trait]
pub trait Multiplexer: Send + Sync {
    /// Human-readable name of the backing tool.
    fn name(&self) -> &str;

    /// Fail with [`Error::ToolNotFound`] when the tool cannot be run.
    fn ensure_available(&self) -> Result<()>;

    /// List the audio and subtitle tracks of a file.
    async fn identify_with(&self, path: &Path, cancel: &CancellationToken) -> Result<MediaFile>;

    /// Write the tracks named by `plan` to `plan.output`.
    async fn mux(&self, plan: &MuxPlan, cancel: &CancellationToken) -> Result<ToolOutput>;

    /// List the tracks of a file without a cancellation token.
    async fn identify(&self, path: &Path) -> Result<MediaFile> {
        self.identify_with(path, &CancellationToken::new()).await
    }
}

/// [`Multiplexer`] backed by the `mkvmerge` executable.
#[derive(Debug, Clone)]
pub struct MkvMerge {
    path: PathBuf,
    timeout: Duration,
}

impl MkvMerge {
    /// Use the executable at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Locate mkvmerge (configured path, `PATH`, install folders).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`] when no executable is found.
    pub fn locate(config_path: Option<&Path>) -> Result<Self> {
        tools::locate_mkvmerge(config_path).map(Self::new)
    }

    /// Set the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Path of the executable.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Multiplexer for MkvMerge {
    fn name(&self) -> &str {
        MKVMERGE
    }

    fn ensure_available(&self) -> Result<()> {
        if self.path.is_file() {
            Ok(())
        } else {
            Err(Error::ToolNotFound {
                tool: format!("{} ({})", MKVMERGE, self.path.display()),
            })
        }
    }

    async fn identify_with(&self, path: &Path, cancel: &CancellationToken) -> Result<MediaFile> {
        probe_with_mkvmerge(&self.path, path, self.timeout, cancel).await
    }

    async fn mux(&self, plan: &MuxPlan, cancel: &CancellationToken) -> Result<ToolOutput> {
        mux_tracks(&self.path, plan, self.timeout, cancel).await
    }
}
