//! # trackpick-av
//!
//! Track probing and remuxing for Matroska files, built on top of the
//! `mkvmerge` command-line tool from MKVToolNix.
//!
//! This crate provides functionality for:
//! - Locating `mkvmerge` (configured path, `PATH`, platform install folders)
//! - Running external tools with timeouts and cancellation ([`ToolCommand`])
//! - Listing the audio and subtitle tracks of a file (`mkvmerge -J`)
//! - Describing which tracks to keep ([`KeepSelection`]) and resolving that
//!   description against the tracks of one file
//! - Writing a trimmed copy of a file through a staging [`Workspace`]
//!
//! ## Features
//!
//! - `tracing` - Enable tracing support
//!
//! ## Example
//!
//! ```no_run
//! use trackpick_av::{KeepSelection, Multiplexer, MkvMerge, TrackPredicate};
//!
//! # async fn example() -> trackpick_av::Result<()> {
//! let mkvmerge = MkvMerge::locate(None)?;
//! let file = mkvmerge.identify("/media/show/episode01.mkv".as_ref()).await?;
//!
//! let keep = KeepSelection::new()
//!     .audio([TrackPredicate::language("jpn")])
//!     .subtitles([TrackPredicate::language("fre")]);
//! let resolved = keep.resolve(&file.tracks, Default::default())?;
//! println!("keeping audio {:?}", resolved.audio);
//! # Ok(())
//! # }
//! ```

mod error;
pub mod actions;
pub mod command;
pub mod language;
pub mod probe;
pub mod selection;
pub mod tools;
pub mod workspace;

// Re-exports
pub use actions::{MkvMerge, MuxPlan, Multiplexer};
pub use command::{ToolCommand, ToolOutput};
pub use error::{Error, Result};
pub use probe::{MediaFile, Track, TrackKind};
pub use selection::{AudioFallback, KeepSelection, ResolvedKeep, SubtitleRetention, TrackPredicate};
pub use tools::{check_tool, check_tools, require_tool, ToolInfo};
pub use workspace::Workspace;

/// Name of the external multiplexer binary.
pub const MKVMERGE: &str = "mkvmerge";
