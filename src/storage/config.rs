//! JSON Configuration Management
//!
//! Reads the application configuration file. The file is optional and never
//! written: a missing default file means built-in defaults.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::models::settings::{AppConfig, SettingsUpdate};
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::config_path;

/// Configuration service for the analysis settings
#[derive(Debug, Default)]
pub struct ConfigService {
    config: AppConfig,
}

impl ConfigService {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one, `~/.covsbom/config.json` is
    /// used when present and defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> AppResult<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(AppError::config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Self::from_path(path);
        }

        match config_path() {
            Ok(path) if path.exists() => Self::from_path(&path),
            Ok(path) => {
                debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => {
                debug!("Cannot locate config directory ({}), using defaults", e);
                Ok(Self::default())
            }
        }
    }

    fn from_path(path: &Path) -> AppResult<Self> {
        let config = Self::load_from_file(path)?;
        debug!(path = %path.display(), "Loaded config");
        Ok(Self { config })
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> AppResult<AppConfig> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| AppError::config(format!("{}: {}", path.display(), e)))?;
        config.validate().map_err(AppError::config)?;
        Ok(config)
    }

    /// Get a clone of the current configuration
    pub fn get_config_clone(&self) -> AppConfig {
        self.config.clone()
    }

    /// Apply overrides in memory; the result must still validate
    pub fn update_config(&mut self, update: SettingsUpdate) -> AppResult<()> {
        let mut config = self.config.clone();
        config.apply_update(update);
        config.validate().map_err(AppError::config)?;
        self.config = config;
        Ok(())
    }
}
