//! Track trimming through mkvmerge.

use crate::command::{ToolCommand, ToolOutput};
use crate::selection::ResolvedKeep;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One mkvmerge invocation: which tracks of `input` to write to `output`.
#[derive(Debug, Clone)]
pub struct MuxPlan {
    /// Source file, never modified.
    pub input: PathBuf,
    /// Destination file.
    pub output: PathBuf,
    /// Track ids to keep.
    pub keep: ResolvedKeep,
    /// Seed for `--deterministic`, making output a pure function of the
    /// input and the kept tracks.
    pub deterministic_seed: Option<String>,
}

impl MuxPlan {
    /// Create a plan without a deterministic seed.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, keep: ResolvedKeep) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            keep,
            deterministic_seed: None,
        }
    }

    /// Use `--deterministic <seed>`.
    pub fn deterministic(mut self, seed: impl Into<String>) -> Self {
        self.deterministic_seed = Some(seed.into());
        self
    }

    /// Command-line arguments for mkvmerge (without the program name).
    ///
    /// Track id lists are passed in ascending order; mkvmerge keeps the
    /// source order of the retained tracks.
    pub fn mkvmerge_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(ref seed) = self.deterministic_seed {
            args.push("--deterministic".to_string());
            args.push(seed.clone());
        }

        args.push("-o".to_string());
        args.push(self.output.to_string_lossy().to_string());

        if self.keep.audio.is_empty() {
            args.push("--no-audio".to_string());
        } else {
            args.push("--audio-tracks".to_string());
            args.push(join_ids(&self.keep.audio));
        }

        if self.keep.subtitles.is_empty() {
            args.push("--no-subtitles".to_string());
        } else {
            args.push("--subtitle-tracks".to_string());
            args.push(join_ids(&self.keep.subtitles));
        }

        args.push(self.input.to_string_lossy().to_string());
        args
    }
}

fn join_ids(ids: &[u32]) -> String {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Run mkvmerge for a plan.
///
/// mkvmerge returns 0 for success, 1 for success with warnings and 2 for
/// errors. Warnings are logged and treated as success.
pub async fn mux_tracks(
    tool: &Path,
    plan: &MuxPlan,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ToolOutput> {
    if plan.input == plan.output {
        return Err(Error::InvalidInput(format!(
            "refusing to overwrite input {}",
            plan.input.display()
        )));
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "Muxing {:?} -> {:?} (audio {:?}, subtitles {:?})",
        plan.input,
        plan.output,
        plan.keep.audio,
        plan.keep.subtitles
    );

    let output = ToolCommand::new(tool.to_path_buf())
        .args(plan.mkvmerge_args())
        .timeout(timeout)
        .success_codes([0, 1])
        .cancel_on(cancel.clone())
        .execute()
        .await?;

    #[cfg(feature = "tracing")]
    if output.code() == Some(1) {
        tracing::warn!(
            "mkvmerge reported warnings for {:?}: {}",
            plan.input,
            output.diagnostic()
        );
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keep(audio: &[u32], subtitles: &[u32]) -> ResolvedKeep {
        ResolvedKeep {
            audio: audio.to_vec(),
            subtitles: subtitles.to_vec(),
            fallback_applied: false,
        }
    }

    #[test]
    fn test_args_with_tracks() {
        let plan = MuxPlan::new("/in/ep01.mkv", "/out/ep01.mkv", keep(&[2], &[5, 4]));
        assert_eq!(
            plan.mkvmerge_args(),
            vec![
                "-o",
                "/out/ep01.mkv",
                "--audio-tracks",
                "2",
                "--subtitle-tracks",
                "4,5",
                "/in/ep01.mkv"
            ]
        );
    }

    #[test]
    fn test_args_drop_everything() {
        let plan = MuxPlan::new("/in/a.mkv", "/out/a.mkv", keep(&[], &[])).deterministic("seed");
        assert_eq!(
            plan.mkvmerge_args(),
            vec![
                "--deterministic",
                "seed",
                "-o",
                "/out/a.mkv",
                "--no-audio",
                "--no-subtitles",
                "/in/a.mkv"
            ]
        );
    }

    #[tokio::test]
    async fn test_refuses_in_place() {
        let plan = MuxPlan::new("/in/a.mkv", "/in/a.mkv", keep(&[1], &[]));
        let result = mux_tracks(
            Path::new("mkvmerge"),
            &plan,
            Duration::from_secs(1),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
