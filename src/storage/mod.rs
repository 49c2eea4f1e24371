//! Persistent storage
//!
//! This module handles all data persistence for model metadata and settings.

pub mod models;
pub mod registry;
pub mod settings;

pub use models::{ModelStore, StoredModel};

use std::fs;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Coarse error class, for callers deciding how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller passed bad input; retrying will not help
    Validation,
    /// The storage medium failed; the caller may retry later
    Storage,
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Corrupt registry data{}: {reason}", .id.as_deref().map(|id| format!(" for '{}'", id)).unwrap_or_default())]
    Corrupt { id: Option<String>, reason: String },
    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },
    #[error("Background write failed: {0}")]
    Task(String),
    #[error("Could not determine data directory")]
    DataDir,
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Validation(_) => ErrorKind::Validation,
            _ => ErrorKind::Storage,
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Get the application data directory
pub fn get_data_dir() -> Result<PathBuf, StorageError> {
    directories::ProjectDirs::from("com", "ModelRegistry", "ModelRegistry")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(StorageError::DataDir)
}

/// Run a storage future with an upper time bound
pub(crate) async fn with_timeout<T, F>(
    op: &'static str,
    after: Duration,
    fut: F,
) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("{} timed out after {:?}", op, after);
            Err(StorageError::Timeout { op, after })
        }
    }
}

/// Replace `path` with `bytes` atomically.
///
/// Writes a sibling temp file, syncs it, then renames it over the target.
/// The temp file is removed if any step fails. Blocking; callers on the
/// runtime run it through [`tokio::task::spawn_blocking`].
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let parent = path
        .parent()
        .ok_or_else(|| StorageError::Validation(format!("{} has no parent", path.display())))?;
    fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    if let Err(e) = write_temp(&temp_path, bytes) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(StorageError::io(path, e));
    }

    Ok(())
}

fn write_temp(temp_path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let mut file = fs::File::create(temp_path).map_err(|e| StorageError::io(temp_path, e))?;
    file.write_all(bytes)
        .map_err(|e| StorageError::io(temp_path, e))?;
    file.sync_all()
        .map_err(|e| StorageError::io(temp_path, e))?;
    Ok(())
}
