use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HomeDirError {
    #[error("cannot determine the user home directory")]
    NoHome,

    #[error("failed to create home directory '{path}': {source}")]
    Create {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Base directory for the default home: the roaming app-data directory on
/// Windows, the user home elsewhere.
fn platform_home() -> Result<PathBuf, HomeDirError> {
    #[cfg(target_os = "windows")]
    let base = dirs::config_dir();
    #[cfg(not(target_os = "windows"))]
    let base = dirs::home_dir();

    base.ok_or(HomeDirError::NoHome)
}

/// Expand a leading `~` against the platform home directory.
fn expand_tilde(raw: &str) -> Result<PathBuf, HomeDirError> {
    if raw == "~" {
        return platform_home();
    }
    if let Some(rest) = raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        return Ok(platform_home()?.join(rest));
    }
    Ok(PathBuf::from(raw))
}

/// Resolve the server home directory.
///
/// - `Some(path)`: `~` is expanded, relative paths are made absolute against the cwd.
/// - `None`: `<platform home>/<default_subdir>`.
///
/// With `create = true` the directory is created if missing.
pub fn resolve_home_dir(
    configured: Option<String>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf, HomeDirError> {
    let mut path = match configured {
        Some(raw) => expand_tilde(raw.trim())?,
        None => platform_home()?.join(default_subdir),
    };

    if path.is_relative() {
        let cwd = std::env::current_dir().map_err(|source| HomeDirError::Create {
            path: path.to_string_lossy().to_string(),
            source,
        })?;
        path = cwd.join(path);
    }

    if create {
        ensure_dir(&path)?;
    }
    Ok(path)
}

fn ensure_dir(path: &Path) -> Result<(), HomeDirError> {
    std::fs::create_dir_all(path).map_err(|source| HomeDirError::Create {
        path: path.to_string_lossy().to_string(),
        source,
    })
}
