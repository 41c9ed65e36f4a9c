use clap::{Parser, Subcommand};
use std::path::PathBuf;
use trackpick_av::{AudioFallback, TrackPredicate};

#[derive(Parser)]
#[command(name = "trackpick")]
#[command(author, version, about = "Keep only the audio and subtitle tracks you want in a folder of MKV files")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the audio and subtitle languages found in a folder
    Inventory {
        /// Folder containing the media files
        #[arg(required = true)]
        folder: PathBuf,

        /// Path to mkvmerge (overrides config and PATH lookup)
        #[arg(long)]
        mkvmerge: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the tracks of a single file
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Path to mkvmerge (overrides config and PATH lookup)
        #[arg(long)]
        mkvmerge: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write trimmed copies of every file in a folder
    Process {
        /// Folder containing the media files
        #[arg(required = true)]
        folder: PathBuf,

        /// Audio track to keep: language code (jpn, ja, eng), track id or
        /// name:<track name>. Repeat to keep several. Defaults to the
        /// configured selection.
        #[arg(short, long = "audio", value_name = "LANG|ID|name:NAME")]
        audio: Vec<TrackPredicate>,

        /// Subtitle track to keep: language code, track id or name:<track
        /// name> (e.g. name:Full). Repeat to keep several.
        #[arg(short, long = "subtitles", value_name = "LANG|ID|name:NAME", conflicts_with = "no_subtitles")]
        subtitles: Vec<TrackPredicate>,

        /// Keep every subtitle track
        #[arg(long, conflicts_with_all = ["subtitles", "no_subtitles"])]
        all_subtitles: bool,

        /// Drop every subtitle track
        #[arg(long)]
        no_subtitles: bool,

        /// Output folder (default: <folder>/output)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of parallel mkvmerge processes (default: based on CPU and memory)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// What to do when no audio track of a file matches
        #[arg(long, value_name = "keep-all|keep-first|fail")]
        fallback: Option<AudioFallback>,

        /// Path to mkvmerge (overrides config and PATH lookup)
        #[arg(long)]
        mkvmerge: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Show detected CPU, memory and GPU, and the worker count a batch would use
    System,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_process() {
        let cli = Cli::try_parse_from([
            "trackpick", "process", "/media/show", "-a", "jpn", "-a", "2", "--no-subtitles",
            "--jobs", "3", "--fallback", "keep-first",
        ])
        .unwrap();

        match cli.command {
            Commands::Process {
                audio,
                no_subtitles,
                jobs,
                fallback,
                ..
            } => {
                assert_eq!(
                    audio,
                    vec![TrackPredicate::language("jpn"), TrackPredicate::index(2)]
                );
                assert!(no_subtitles);
                assert_eq!(jobs, Some(3));
                assert_eq!(fallback, Some(AudioFallback::KeepFirst));
            }
            _ => panic!("expected process command"),
        }
    }

    #[test]
    fn test_subtitle_flags_conflict() {
        let result = Cli::try_parse_from([
            "trackpick", "process", "/media/show", "-s", "fre", "--no-subtitles",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_subtitle_by_name() {
        let cli = Cli::try_parse_from([
            "trackpick", "process", "/media/show", "-s", "fre", "-s", "name:Full Subs",
        ])
        .unwrap();

        match cli.command {
            Commands::Process { subtitles, .. } => assert_eq!(
                subtitles,
                vec![TrackPredicate::language("fre"), TrackPredicate::name("Full Subs")]
            ),
            _ => panic!("expected process command"),
        }
    }

    #[test]
    fn test_rejects_bad_predicate() {
        let result = Cli::try_parse_from(["trackpick", "process", "/media/show", "-a", "ja pn"]);
        assert!(result.is_err());
    }
}
