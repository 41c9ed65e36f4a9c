mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./trackpick.toml",
        "~/.config/trackpick/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    // Return default config if no file found
    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(ref path) = config.tools.mkvmerge_path {
        if !path.exists() {
            tracing::warn!("Configured mkvmerge path does not exist: {:?}", path);
        }
    }

    if config.tools.timeout_secs == 0 {
        anyhow::bail!("tools.timeout_secs cannot be 0");
    }

    let batch = &config.batch;
    if batch.extensions.iter().all(|e| e.trim().is_empty()) {
        anyhow::bail!("batch.extensions must name at least one extension");
    }
    if batch.output_dir_name.trim().is_empty()
        || batch.output_dir_name.contains(['/', '\\'])
    {
        anyhow::bail!(
            "batch.output_dir_name must be a plain folder name, got {:?}",
            batch.output_dir_name
        );
    }
    if batch.workers == Some(0) {
        anyhow::bail!("batch.workers must be at least 1");
    }
    if batch.max_workers == Some(0) {
        anyhow::bail!("batch.max_workers must be at least 1");
    }
    if batch.per_job_memory_mb == 0 {
        anyhow::bail!("batch.per_job_memory_mb cannot be 0");
    }
    if !(0.0..1.0).contains(&batch.memory_reserve_fraction) {
        anyhow::bail!(
            "batch.memory_reserve_fraction must be in [0, 1), got {}",
            batch.memory_reserve_fraction
        );
    }
    if batch.min_free_space_factor < 0.0 || !batch.min_free_space_factor.is_finite() {
        anyhow::bail!(
            "batch.min_free_space_factor must be a non-negative number, got {}",
            batch.min_free_space_factor
        );
    }

    Ok(())
}
