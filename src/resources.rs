//! Host resource detection and worker pool sizing.

use crate::config::BatchConfig;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::process::Command;

const MIB: u64 = 1024 * 1024;

/// Snapshot of the resources relevant to sizing a batch.
#[derive(Debug, Clone, Serialize)]
pub struct SystemResources {
    /// Logical CPU cores.
    pub logical_cores: usize,
    /// Total physical memory in bytes.
    pub total_memory: u64,
    /// Memory currently available to new processes, in bytes.
    pub available_memory: u64,
    /// Detected graphics vendor, informational only.
    pub gpu: Option<GpuVendor>,
}

impl SystemResources {
    /// Read core count and memory figures from the host.
    ///
    /// GPU detection runs an external listing tool and is done separately by
    /// [`SystemResources::with_gpu`].
    pub fn detect() -> Self {
        let mut system = sysinfo::System::new();
        system.refresh_memory();

        Self {
            logical_cores: num_cpus::get().max(1),
            total_memory: system.total_memory(),
            available_memory: system.available_memory(),
            gpu: None,
        }
    }

    /// Attach the result of [`detect_gpu`].
    pub fn with_gpu(mut self) -> Self {
        self.gpu = detect_gpu();
        self
    }
}

impl fmt::Display for SystemResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
        write!(
            f,
            "{} cores, {:.1} GiB RAM ({:.1} GiB available), GPU: {}",
            self.logical_cores,
            self.total_memory as f64 / GIB,
            self.available_memory as f64 / GIB,
            self.gpu
                .map(|g| g.to_string())
                .unwrap_or_else(|| "none detected".to_string())
        )
    }
}

/// Graphics vendor as reported by the platform listing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
}

impl fmt::Display for GpuVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuVendor::Nvidia => write!(f, "nvidia"),
            GpuVendor::Amd => write!(f, "amd"),
            GpuVendor::Intel => write!(f, "intel"),
        }
    }
}

/// Identify the GPU vendor from a device listing.
pub fn parse_gpu_vendor(listing: &str) -> Option<GpuVendor> {
    let upper = listing.to_uppercase();
    if upper.contains("NVIDIA") {
        Some(GpuVendor::Nvidia)
    } else if upper.contains("AMD") || upper.contains("RADEON") {
        Some(GpuVendor::Amd)
    } else if upper.contains("INTEL") {
        Some(GpuVendor::Intel)
    } else {
        None
    }
}

/// Detect the GPU vendor with `lspci`, `system_profiler` or `wmic`.
///
/// Returns `None` when the tool is missing or lists nothing recognizable.
pub fn detect_gpu() -> Option<GpuVendor> {
    let output = if cfg!(target_os = "windows") {
        Command::new("wmic")
            .args(["path", "win32_VideoController", "get", "name"])
            .output()
    } else if cfg!(target_os = "macos") {
        Command::new("system_profiler")
            .arg("SPDisplaysDataType")
            .output()
    } else {
        Command::new("lspci").output()
    };

    match output {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            // lspci lists every PCI device; only display controllers count
            let listing: String = if cfg!(any(target_os = "windows", target_os = "macos")) {
                stdout.into_owned()
            } else {
                stdout
                    .lines()
                    .filter(|l| l.contains("VGA") || l.contains("3D controller"))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            parse_gpu_vendor(&listing)
        }
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("GPU detection unavailable: {}", e);
            None
        }
    }
}

/// Free space on the filesystem holding `path`, in bytes.
///
/// Picks the mount point that is the longest prefix of the canonical path.
/// Returns `None` when no mounted disk matches.
pub fn available_space(path: &Path) -> Option<u64> {
    let path = path.canonicalize().ok()?;
    let disks = sysinfo::Disks::new_with_refreshed_list();

    disks
        .list()
        .iter()
        .filter(|d| path.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())
        .map(|d| d.available_space())
}

/// Rule for choosing how many mkvmerge processes run at once.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcurrencyPolicy {
    /// Fixed worker count, bypassing the resource formula.
    pub workers: Option<usize>,
    /// Memory budget of one job in bytes.
    pub per_job_memory: u64,
    /// Fraction of available memory kept free.
    pub memory_reserve_fraction: f64,
    /// Upper bound for the resource formula.
    pub max_workers: Option<usize>,
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        Self::from_config(&BatchConfig::default())
    }
}

impl ConcurrencyPolicy {
    pub fn from_config(config: &BatchConfig) -> Self {
        Self {
            workers: config.workers,
            per_job_memory: config.per_job_memory_mb.saturating_mul(MIB),
            memory_reserve_fraction: config.memory_reserve_fraction,
            max_workers: config.max_workers,
        }
    }

    /// Always use `workers` workers.
    pub fn fixed(workers: usize) -> Self {
        Self {
            workers: Some(workers.max(1)),
            ..Self::default()
        }
    }

    /// Number of workers for the given host, never below 1.
    ///
    /// `min(cores, max(1, usable_memory / per_job_memory))`, capped by
    /// `max_workers`, where usable memory is the available memory minus the
    /// reserve fraction.
    pub fn worker_count(&self, resources: &SystemResources) -> usize {
        if let Some(workers) = self.workers {
            return workers.max(1);
        }

        let usable = resources.available_memory as f64 * (1.0 - self.memory_reserve_fraction);
        let by_memory = (usable / self.per_job_memory.max(1) as f64).floor() as usize;
        let count = resources.logical_cores.max(1).min(by_memory.max(1));

        match self.max_workers {
            Some(cap) => count.min(cap).max(1),
            None => count,
        }
    }
}
