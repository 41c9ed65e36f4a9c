//! Builder for executing external tool commands with timeout and
//! cancellation support.

use crate::{Error, Result};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Default command timeout: 1 hour. Remuxing a large file is I/O bound and
/// can take a while on slow disks.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

impl ToolOutput {
    /// Exit code, if the process was not killed by a signal.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// The most useful diagnostic text: stderr when present, else stdout.
    ///
    /// mkvmerge reports its errors on stdout, so both streams are considered.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        self.stdout.trim().to_string()
    }
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use trackpick_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> trackpick_av::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("mkvmerge"))
///     .arg("-J")
///     .arg("/path/to/video.mkv")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    success_codes: Vec<i32>,
    cancel: Option<CancellationToken>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            success_codes: vec![0],
            cancel: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Exit codes that count as success (default: only 0).
    pub fn success_codes(&mut self, codes: impl IntoIterator<Item = i32>) -> &mut Self {
        self.success_codes = codes.into_iter().collect();
        self
    }

    /// Kill the process when this token is cancelled.
    pub fn cancel_on(&mut self, token: CancellationToken) -> &mut Self {
        self.cancel = Some(token);
        self
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`Error::ToolNotFound`] if the program does not exist.
    /// - [`Error::ToolFailed`] if the process times out or exits with a code
    ///   outside the accepted success codes (message includes the diagnostic).
    /// - [`Error::Cancelled`] if the cancellation token fired; the process is
    ///   killed before returning.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(feature = "tracing")]
        tracing::trace!("Spawning {} {:?}", program_name, self.args);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found(program_name.clone())
            } else {
                Error::tool_failed(program_name.clone(), format!("failed to spawn: {e}"))
            }
        })?;

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(ref mut out) = stdout {
                let _ = out.read_to_end(&mut buf).await;
            }
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(ref mut err) = stderr {
                let _ = err.read_to_end(&mut buf).await;
            }
            buf
        });

        let cancel = self.cancel.clone().unwrap_or_default();

        let status = tokio::select! {
            res = child.wait() => res.map_err(|e| {
                Error::tool_failed(program_name.clone(), format!("I/O error waiting for process: {e}"))
            })?,
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                #[cfg(feature = "tracing")]
                tracing::debug!("Killed {} after cancellation", program_name);
                return Err(Error::Cancelled { tool: program_name });
            }
            _ = tokio::time::sleep(self.timeout) => {
                let _ = child.kill().await;
                return Err(Error::tool_failed(
                    program_name,
                    format!("timed out after {:?}", self.timeout),
                ));
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        let output = ToolOutput {
            status,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
        };

        let accepted = status
            .code()
            .is_some_and(|code| self.success_codes.contains(&code));
        if !accepted {
            return Err(Error::tool_failed(
                program_name,
                format!("exited with status {}: {}", status, output.diagnostic()),
            ));
        }

        Ok(output)
    }
}
