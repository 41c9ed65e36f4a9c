//! External tool detection and management.

use crate::{Error, Result, MKVMERGE};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Information about an external tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// Version string if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
    /// Whether processing cannot run without this tool.
    pub required: bool,
}

/// Check if a tool is available and get its information.
///
/// # Example
///
/// ```no_run
/// use trackpick_av::check_tool;
///
/// let info = check_tool("mkvmerge");
/// if info.available {
///     println!("mkvmerge version: {:?}", info.version);
/// }
/// ```
pub fn check_tool(name: &str) -> ToolInfo {
    check_tool_with_arg(name, "--version")
}

/// Check if a tool is available using a custom version argument.
pub fn check_tool_with_arg(name: &str, version_arg: &str) -> ToolInfo {
    check_tool_at(name, Path::new(name), version_arg)
}

fn check_tool_at(name: &str, program: &Path, version_arg: &str) -> ToolInfo {
    let result = Command::new(program).arg(version_arg).output();

    match result {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.trim().to_string());

            let path = if program.components().count() > 1 {
                Some(program.to_path_buf())
            } else {
                which::which(program).ok()
            };

            ToolInfo {
                name: name.to_string(),
                available: true,
                version,
                path,
                required: name == MKVMERGE,
            }
        }
        _ => ToolInfo {
            name: name.to_string(),
            available: false,
            version: None,
            path: None,
            required: name == MKVMERGE,
        },
    }
}

/// Check every tool trackpick may call.
///
/// `mkvmerge` is required; the remaining entries are the listing tools used
/// for the informational GPU report on each platform. When `mkvmerge_path` is
/// given it is checked instead of the `PATH` lookup.
pub fn check_tools(mkvmerge_path: Option<&Path>) -> Vec<ToolInfo> {
    let mkvmerge = match locate_mkvmerge(mkvmerge_path) {
        Ok(path) => check_tool_at(MKVMERGE, &path, "--version"),
        Err(_) => check_tool(MKVMERGE),
    };

    let mut tools = vec![mkvmerge];
    if cfg!(target_os = "linux") {
        tools.push(check_tool("lspci"));
    } else if cfg!(target_os = "macos") {
        tools.push(check_tool_with_arg("system_profiler", "-listDataTypes"));
    } else if cfg!(windows) {
        tools.push(check_tool_with_arg("wmic", "/?"));
    }
    tools
}

/// Require that a tool is available, returning its path.
///
/// # Errors
///
/// Returns an error if the tool is not found.
pub fn require_tool(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|_| Error::tool_not_found(name))
}

/// Get the path to a tool, preferring a configured path over PATH lookup.
///
/// A configured path that does not exist is an error rather than a silent
/// fallback, so a typo in the configuration never picks up another binary.
pub fn get_tool_path(name: &str, config_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = config_path {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(Error::ToolNotFound {
            tool: format!("{} (configured path {})", name, path.display()),
        });
    }

    require_tool(name)
}

/// Locate `mkvmerge`.
///
/// Order: the configured path, then `PATH`, then the folders MKVToolNix
/// installers use on each platform.
pub fn locate_mkvmerge(config_path: Option<&Path>) -> Result<PathBuf> {
    if config_path.is_some() {
        return get_tool_path(MKVMERGE, config_path);
    }

    if let Ok(path) = require_tool(MKVMERGE) {
        return Ok(path);
    }

    default_install_locations()
        .into_iter()
        .find(|p| p.is_file())
        .ok_or_else(|| Error::tool_not_found(MKVMERGE))
}

/// Install locations checked when `mkvmerge` is not on `PATH`.
pub fn default_install_locations() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if cfg!(windows) {
        for var in ["ProgramFiles", "ProgramFiles(x86)", "ProgramW6432"] {
            if let Some(dir) = std::env::var_os(var) {
                paths.push(PathBuf::from(dir).join("MKVToolNix").join("mkvmerge.exe"));
            }
        }
    } else if cfg!(target_os = "macos") {
        paths.push(PathBuf::from("/opt/homebrew/bin/mkvmerge"));
        paths.push(PathBuf::from("/usr/local/bin/mkvmerge"));
        paths.push(PathBuf::from("/opt/local/bin/mkvmerge"));
        paths.push(PathBuf::from(
            "/Applications/MKVToolNix.app/Contents/MacOS/mkvmerge",
        ));
    } else {
        paths.push(PathBuf::from("/usr/bin/mkvmerge"));
        paths.push(PathBuf::from("/usr/local/bin/mkvmerge"));
        paths.push(PathBuf::from("/snap/bin/mkvmerge"));
    }

    paths
}
