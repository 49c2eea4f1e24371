//! Settings storage
//!
//! Manages persistence of the store and collaborator configuration.

use crate::storage::{get_data_dir, StorageError};
use crate::types::config::{GatewayConfig, RegistryConfig, StoreConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSettings {
    /// Local model store
    #[serde(default)]
    pub store: StoreConfig,
    /// Dataset upload service
    #[serde(default)]
    pub upload_gateway: GatewayConfig,
    /// Remote model registry
    #[serde(default)]
    pub remote_registry: RegistryConfig,
}

impl AppSettings {
    /// Validate settings values
    ///
    /// Ensures all parameters are within acceptable ranges.
    pub fn validate(&mut self) {
        self.store.validate();
        self.upload_gateway.validate();
        self.remote_registry.validate();
    }
}

/// Get the settings file path
fn get_settings_path() -> Result<PathBuf, StorageError> {
    Ok(get_data_dir()?.join("settings.json"))
}

/// Load settings from disk
///
/// Returns default settings if the file doesn't exist or is corrupted
pub fn load_settings() -> AppSettings {
    match get_settings_path().and_then(|path| load_settings_from(&path)) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to load settings, using defaults: {}", e);
            AppSettings::default()
        }
    }
}

/// Load settings from a specific file, propagating errors
pub fn load_settings_from(path: &Path) -> Result<AppSettings, StorageError> {
    if !path.exists() {
        tracing::info!("Settings file not found, using defaults");
        return Ok(AppSettings::default());
    }

    let json = fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
    let mut settings: AppSettings = serde_json::from_str(&json)?;
    settings.validate();

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Save settings to disk
pub fn save_settings(settings: &AppSettings) -> Result<(), StorageError> {
    save_settings_to(&get_settings_path()?, settings)
}

/// Save settings to a specific file
pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<(), StorageError> {
    // Ensure the parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json).map_err(|e| StorageError::io(path, e))?;

    tracing::debug!("Saved settings to {}", path.display());
    Ok(())
}
