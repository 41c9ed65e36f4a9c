mod cli;

use trackpick::{
    batch::{self, BatchMuxer, BatchProgress, FileState},
    config::{self, Config},
    inventory,
    resources::{self, ConcurrencyPolicy, SystemResources},
};
use trackpick_av::{KeepSelection, MkvMerge, Multiplexer, SubtitleRetention, TrackKind, TrackPredicate};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if verbose {
            "trackpick=trace,trackpick_av=trace".to_string()
        } else {
            "trackpick=info,trackpick_av=info".to_string()
        }
    });

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {:?}", path))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(env_filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // A broken config must not prevent `validate` from reporting it
    let loaded = config::load_config_or_default(cli.config.as_deref());
    let log_file = loaded.as_ref().ok().and_then(|c| c.logging.file.clone());
    init_logging(cli.verbose, log_file.as_deref())?;

    match cli.command {
        Commands::Inventory {
            folder,
            mkvmerge,
            json,
        } => {
            let config = loaded?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(inventory_folder(&folder, &config, mkvmerge, json))
        }
        Commands::Probe {
            file,
            mkvmerge,
            json,
        } => {
            let config = loaded?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, &config, mkvmerge, json))
        }
        Commands::Process {
            folder,
            audio,
            subtitles,
            all_subtitles,
            no_subtitles,
            output,
            jobs,
            fallback,
            mkvmerge,
            json,
        } => {
            let config = loaded?;
            let keep = keep_selection(&config, audio, subtitles, all_subtitles, no_subtitles);
            let options = ProcessOptions {
                output,
                jobs,
                fallback,
                mkvmerge,
                json,
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(process_folder(&folder, &config, keep, options))
        }
        Commands::CheckTools => check_tools(&loaded?),
        Commands::System => show_system(&loaded?),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("trackpick {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn locate_mkvmerge(config: &Config, cli_path: Option<PathBuf>) -> Result<MkvMerge> {
    let configured = cli_path.or_else(|| config.tools.mkvmerge_path.clone());
    let mkvmerge = MkvMerge::locate(configured.as_deref())
        .context("mkvmerge is required; install MKVToolNix or pass --mkvmerge")?;

    tracing::debug!("Using mkvmerge at {:?}", mkvmerge.path());
    Ok(mkvmerge.with_timeout(Duration::from_secs(config.tools.timeout_secs)))
}

/// Merge command-line track choices with the configured defaults.
fn keep_selection(
    config: &Config,
    audio: Vec<TrackPredicate>,
    subtitles: Vec<TrackPredicate>,
    all_subtitles: bool,
    no_subtitles: bool,
) -> KeepSelection {
    let defaults = config.selection.to_keep_selection();

    let audio = if audio.is_empty() {
        defaults.audio
    } else {
        audio
    };

    let subtitles = if no_subtitles {
        SubtitleRetention::None
    } else if all_subtitles {
        SubtitleRetention::All
    } else if !subtitles.is_empty() {
        SubtitleRetention::Matching(subtitles)
    } else {
        defaults.subtitles
    };

    KeepSelection { audio, subtitles }
}

async fn inventory_folder(
    folder: &Path,
    config: &Config,
    mkvmerge: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let mkvmerge = locate_mkvmerge(config, mkvmerge)?;

    let files = inventory::list_media_files(folder, &config.batch.extensions)
        .with_context(|| format!("Failed to read folder: {:?}", folder))?;
    if files.is_empty() {
        anyhow::bail!("No media files found in {:?}", folder);
    }

    let inventory =
        inventory::discover_folder(&mkvmerge, &files, inventory::DEFAULT_PROBE_CONCURRENCY).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&inventory)?);
        return Ok(());
    }

    println!(
        "Folder: {} ({} file(s), {} unreadable)",
        folder.display(),
        inventory.total(),
        inventory.unreadable.len()
    );

    for (title, kind) in [("Audio", TrackKind::Audio), ("Subtitles", TrackKind::Subtitle)] {
        println!("\n{} languages:", title);
        for lang in inventory.languages_of(kind) {
            println!(
                "  {:<5} {:<14} in {}/{} file(s)",
                lang.language,
                lang.name,
                lang.files,
                inventory.files.len()
            );
        }
    }

    println!("\nFiles:");
    for file in &inventory.files {
        println!("  {}", file.file_name());
        for track in &file.tracks {
            println!("    [{}] {}", track.kind, track.label());
        }
    }

    if !inventory.unreadable.is_empty() {
        println!("\nUnreadable files:");
        for file in &inventory.unreadable {
            println!("  {}: {}", file.path.display(), file.error);
        }
    }

    Ok(())
}

async fn probe_file(
    file: &Path,
    config: &Config,
    mkvmerge: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let mkvmerge = locate_mkvmerge(config, mkvmerge)?;
    let media = mkvmerge.identify(file).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&media)?);
    } else {
        println!("File: {}", media.path.display());
        println!("Container: {}", media.container);
        println!("Size: {}", batch::report::format_size(media.size));

        println!("\nAudio Tracks: {}", media.audio_tracks().count());
        for track in media.audio_tracks() {
            println!("  {}", track.label());
        }

        println!("\nSubtitle Tracks: {}", media.subtitle_tracks().count());
        for track in media.subtitle_tracks() {
            println!("  {}", track.label());
        }
    }

    Ok(())
}

struct ProcessOptions {
    output: Option<PathBuf>,
    jobs: Option<usize>,
    fallback: Option<trackpick_av::AudioFallback>,
    mkvmerge: Option<PathBuf>,
    json: bool,
}

async fn process_folder(
    folder: &Path,
    config: &Config,
    keep: KeepSelection,
    options: ProcessOptions,
) -> Result<()> {
    if !folder.is_dir() {
        anyhow::bail!("Input folder does not exist: {:?}", folder);
    }

    let mkvmerge = locate_mkvmerge(config, options.mkvmerge)?;
    let output_dir = options
        .output
        .unwrap_or_else(|| folder.join(&config.batch.output_dir_name));

    let mut muxer = BatchMuxer::from_config(Arc::new(mkvmerge), &config.batch);
    if let Some(jobs) = options.jobs {
        muxer = muxer.with_workers(jobs);
    }
    if let Some(fallback) = options.fallback {
        muxer = muxer.with_fallback(fallback);
    }
    if !options.json {
        muxer = muxer.with_progress_callback(Arc::new(print_progress));
    }

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping after running jobs are killed");
                cancel.cancel();
            }
        })
    };

    let result = muxer
        .process_folder(folder, &config.batch.extensions, &keep, &output_dir, &cancel)
        .await;
    ctrl_c.abort();
    let summary = result?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!();
        print!("{}", batch::report::render_summary(&summary));
        println!("\nOutput: {}", output_dir.display());
    }

    Ok(())
}

fn print_progress(progress: BatchProgress) {
    let status = match progress.state {
        FileState::Succeeded => "✓",
        FileState::Failed | FileState::ProbeFailed => "✗",
        FileState::Skipped => "-",
        _ => return,
    };
    let name = progress
        .path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    println!("[{}/{}] {} {}", progress.completed, progress.total, status, name);
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = trackpick_av::check_tools(config.tools.mkvmerge_path.as_deref());
    let mut required_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            if tool.required {
                required_ok = false;
            }
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        if !tool.required {
            print!(" [optional]");
        }

        println!();
    }

    println!();
    if required_ok {
        println!("All required tools are available!");
    } else {
        println!("mkvmerge is missing. Install MKVToolNix to process files.");
    }

    Ok(())
}

fn show_system(config: &Config) -> Result<()> {
    let resources = SystemResources::detect().with_gpu();
    let policy = ConcurrencyPolicy::from_config(&config.batch);
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

    println!("CPU cores:        {}", resources.logical_cores);
    println!("Total memory:     {:.1} GiB", resources.total_memory as f64 / GIB);
    println!("Available memory: {:.1} GiB", resources.available_memory as f64 / GIB);
    println!(
        "GPU:              {}",
        resources
            .gpu
            .map(|g| g.to_string())
            .unwrap_or_else(|| "none detected".to_string())
    );
    if let Some(free) = std::env::current_dir()
        .ok()
        .and_then(|cwd| resources::available_space(&cwd))
    {
        println!("Free disk (cwd):  {}", batch::report::format_size(free));
    }
    println!("Batch workers:    {}", policy.worker_count(&resources));

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!(
                "  mkvmerge: {}",
                config
                    .tools
                    .mkvmerge_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "auto-detect".to_string())
            );
            println!("  Extensions: {}", config.batch.extensions.join(", "));
            println!("  Output folder name: {}", config.batch.output_dir_name);
            println!(
                "  Workers: {}",
                config
                    .batch
                    .workers
                    .map(|w| w.to_string())
                    .unwrap_or_else(|| "auto".to_string())
            );
            println!("  Audio fallback: {}", config.batch.audio_fallback);
            println!("  Default selection: {}", config.selection.to_keep_selection());
        }
        None => {
            println!("No config file specified, using defaults");
            let config = Config::default();
            println!("Default config:");
            println!("  Extensions: {}", config.batch.extensions.join(", "));
            println!("  Default selection: {}", config.selection.to_keep_selection());
        }
    }

    Ok(())
}
