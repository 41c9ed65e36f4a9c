//! Staged output for one remux job.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Staging area for writing one output file.
///
/// The tool writes into a hidden temporary directory created inside the
/// destination folder, so finalizing is a same-filesystem rename. Dropping
/// the workspace without finalizing removes everything written so far: a
/// failed or cancelled job never leaves a truncated file behind.
///
/// # Example
///
/// ```no_run
/// use trackpick_av::Workspace;
///
/// let workspace = Workspace::new("/media/show/ep01.mkv", "/media/show/output")?;
/// // ... run the tool with workspace.output() as destination ...
/// let written = workspace.finalize()?;
/// assert_eq!(written, std::path::Path::new("/media/show/output/ep01.mkv"));
/// # Ok::<(), trackpick_av::Error>(())
/// ```
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
    input_path: PathBuf,
    output_path: PathBuf,
    destination: PathBuf,
}

impl Workspace {
    /// Create a workspace for `input`, finalizing into `output_dir` under the
    /// same file name.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output_dir: Q) -> Result<Self> {
        let input = input.as_ref();
        let output_dir = output_dir.as_ref();

        let file_name = input
            .file_name()
            .ok_or_else(|| Error::InvalidInput("Invalid input file path".to_string()))?;

        let temp_dir = tempfile::Builder::new()
            .prefix(".trackpick-")
            .tempdir_in(output_dir)
            .map_err(|e| {
                Error::Workspace(format!(
                    "failed to create staging directory in {}: {}",
                    output_dir.display(),
                    e
                ))
            })?;

        let output_path = temp_dir.path().join(file_name);
        let destination = output_dir.join(file_name);

        Ok(Self {
            temp_dir,
            input_path: input.to_path_buf(),
            output_path,
            destination,
        })
    }

    /// Get the input file path.
    pub fn input(&self) -> &Path {
        &self.input_path
    }

    /// Get the staged output file path (inside the temp directory).
    pub fn output(&self) -> &Path {
        &self.output_path
    }

    /// Final location of the output once finalized.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Get the temp directory path.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Size of the staged output, or `None` when nothing was written.
    pub fn output_size(&self) -> Option<u64> {
        std::fs::metadata(&self.output_path).ok().map(|m| m.len())
    }

    /// Move the staged output to its destination, replacing any previous
    /// output of the same name.
    ///
    /// # Errors
    ///
    /// Fails if the staged output does not exist or is empty, or if the
    /// rename fails. The staging directory is removed in every case.
    pub fn finalize(self) -> Result<PathBuf> {
        match self.output_size() {
            None => {
                return Err(Error::Workspace(format!(
                    "Output file does not exist: {:?}",
                    self.output_path
                )))
            }
            Some(0) => {
                return Err(Error::Workspace(format!(
                    "Output file is empty: {:?}",
                    self.output_path
                )))
            }
            Some(_) => {}
        }

        if self.destination == self.input_path {
            return Err(Error::Workspace(format!(
                "Destination is the input file: {:?}",
                self.destination
            )));
        }

        std::fs::rename(&self.output_path, &self.destination).map_err(|e| {
            Error::Workspace(format!("Failed to move output to destination: {}", e))
        })?;

        Ok(self.destination)
    }
}
