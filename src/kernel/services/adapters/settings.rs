//! Settings and log file locations, plus JSON loading.
//!
//! - macOS: ~/Library/Caches/taghl/
//! - Linux: $XDG_CACHE_HOME/taghl/ (or ~/.cache/taghl/)
//! - Windows: %LOCALAPPDATA%\taghl\

use std::io;
use std::path::{Path, PathBuf};

use crate::kernel::services::ports::settings::Settings;

const APP_DIR: &str = "taghl";
const SETTINGS_FILE: &str = "settings.json";
const LOG_DIR: &str = "logs";

#[derive(Debug)]
pub enum SettingsError {
    Io(io::Error),
    Parse(serde_json::Error),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "settings I/O error: {}", e),
            SettingsError::Parse(e) => write!(f, "invalid settings file: {}", e),
        }
    }
}

impl std::error::Error for SettingsError {}

impl From<io::Error> for SettingsError {
    fn from(e: io::Error) -> Self {
        SettingsError::Io(e)
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(e: serde_json::Error) -> Self {
        SettingsError::Parse(e)
    }
}

pub fn get_app_dir() -> Option<PathBuf> {
    get_cache_dir().map(|dir| dir.join(APP_DIR))
}

pub fn get_settings_path() -> Option<PathBuf> {
    get_app_dir().map(|dir| dir.join(SETTINGS_FILE))
}

pub fn get_log_dir() -> Option<PathBuf> {
    get_app_dir().map(|dir| dir.join(LOG_DIR))
}

/// Create the settings file with defaults if it does not exist yet.
pub fn ensure_settings_file() -> io::Result<PathBuf> {
    let path = get_settings_path().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "Cannot determine settings directory")
    })?;
    write_default_settings(&path)?;
    Ok(path)
}

pub fn write_default_settings(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    if !path.exists() {
        let content =
            serde_json::to_string_pretty(&Settings::default()).unwrap_or_else(|_| "{}".to_string());
        std::fs::write(path, content)?;
    }
    Ok(())
}

pub fn ensure_log_dir() -> io::Result<PathBuf> {
    let dir = get_log_dir().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "Cannot determine log directory")
    })?;
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    let data = std::fs::read_to_string(path)?;
    parse_settings(&data)
}

pub fn parse_settings(data: &str) -> Result<Settings, SettingsError> {
    Ok(serde_json::from_str(data)?)
}

fn get_cache_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        return std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join("Library/Caches"));
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
            if !xdg.is_empty() {
                return Some(PathBuf::from(xdg));
            }
        }
        return std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join(".cache"));
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            return Some(PathBuf::from(local));
        }
        return std::env::var("APPDATA").ok().map(PathBuf::from);
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/adapters/settings.rs"]
mod tests;
