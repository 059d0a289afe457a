//! Cross-Platform Path Utilities
//!
//! Functions for resolving application directories across platforms.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the CovSBOM directory (~/.covsbom/)
pub fn covsbom_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".covsbom"))
}

/// Get the default config file path (~/.covsbom/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(covsbom_dir()?.join("config.json"))
}

/// Resolve `path` against the current directory when it is relative
pub fn absolutize(path: &Path) -> AppResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Name the analyzer uses for a project's output folder: the last path component
pub fn project_folder_name(root_path: &Path) -> AppResult<String> {
    root_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            AppError::invalid_input(format!(
                "Cannot derive a project name from {}",
                root_path.display()
            ))
        })
}
