//! Model metadata storage
//!
//! File-backed store for [`ModelRecord`] values, addressed by id.
//!
//! The whole registry lives in one JSON document. Every write builds the next
//! document from the current one, replaces the file atomically and only then
//! publishes the new state to readers, so a failed write changes nothing and
//! readers never see a half-applied record.

use crate::storage::registry::{check_storable, RegistryDocument};
use crate::storage::{with_timeout, write_atomic, StorageError};
use crate::types::config::StoreConfig;
use crate::types::model::{DeployedEndpoint, ModelRecord, ModelStatus};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

pub use crate::storage::registry::StoredModel;

/// Durable store of model metadata records.
///
/// Cheap to clone; clones share the same state and file.
#[derive(Clone)]
pub struct ModelStore {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    io_timeout: Duration,
    /// Published state, read by every lookup
    state: RwLock<RegistryDocument>,
    /// Serialises writers so each write starts from the latest document.
    /// Held until the file operation has finished, even past a timeout.
    write_lock: Arc<Mutex<()>>,
}

impl ModelStore {
    /// Open the store described by `config`.
    ///
    /// Out-of-range config values are reset first, see
    /// [`StoreConfig::validate`]. Creates the data directory if needed. An
    /// existing registry file is loaded as-is; a missing one means an empty
    /// store, and the file is created on the first write.
    pub async fn open(config: &StoreConfig) -> Result<Self, StorageError> {
        let mut config = config.clone();
        config.validate();
        let path = config.registry_path();
        let io_timeout = config.io_timeout();

        let doc = with_timeout("open registry", io_timeout, load_document(&path)).await?;
        tracing::info!(
            "Opened model registry at {} ({} entries)",
            path.display(),
            doc.len()
        );

        Ok(Self::from_parts(path, io_timeout, doc))
    }

    fn from_parts(path: PathBuf, io_timeout: Duration, doc: RegistryDocument) -> Self {
        Self {
            inner: Arc::new(Inner {
                path,
                io_timeout,
                state: RwLock::new(doc),
                write_lock: Arc::new(Mutex::new(())),
            }),
        }
    }

    /// Path of the backing registry file
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Insert the record, or fully replace the one with the same id.
    ///
    /// The id must contain at least one non-whitespace character, otherwise
    /// this is a `Validation` error. Durable once this returns `Ok`.
    pub async fn save_model(&self, record: ModelRecord) -> Result<(), StorageError> {
        validate_id(&record.id)?;
        check_storable(&record)?;

        let id = record.id.clone();
        self.mutate("save model", |doc| {
            doc.upsert(record, Utc::now());
            Ok(((), true))
        })
        .await?;

        tracing::debug!("Saved model '{}'", id);
        Ok(())
    }

    /// Most recently saved record for `id`, or `None` if there is none
    pub async fn get_model(&self, id: &str) -> Result<Option<ModelRecord>, StorageError> {
        Ok(self.get_entry(id).await?.map(|stored| stored.record))
    }

    /// Record for `id` together with its creation and update times
    pub async fn get_entry(&self, id: &str) -> Result<Option<StoredModel>, StorageError> {
        validate_id(id)?;
        let doc = self.inner.state.read().await;
        let entry = doc.get(id)?.cloned();
        Ok(entry)
    }

    /// Snapshot of every stored record, in insertion order
    pub async fn get_all_models(&self) -> Result<Vec<ModelRecord>, StorageError> {
        self.inner.state.read().await.records()
    }

    pub async fn exists(&self, id: &str) -> Result<bool, StorageError> {
        validate_id(id)?;
        Ok(self.inner.state.read().await.contains(id))
    }

    /// Number of stored entries
    pub async fn count(&self) -> usize {
        self.inner.state.read().await.len()
    }

    /// Remove the record for `id`. Returns whether one existed.
    pub async fn delete_model(&self, id: &str) -> Result<bool, StorageError> {
        validate_id(id)?;

        let removed = self
            .mutate("delete model", |doc| {
                let removed = doc.remove(id, Utc::now());
                Ok((removed, removed))
            })
            .await?;

        if removed {
            tracing::debug!("Deleted model '{}'", id);
        }
        Ok(removed)
    }

    /// Append a deployed endpoint to the model and mark it deployed.
    ///
    /// Returns the updated record, or `None` if no model has this id.
    pub async fn record_endpoint(
        &self,
        id: &str,
        endpoint: DeployedEndpoint,
    ) -> Result<Option<ModelRecord>, StorageError> {
        validate_id(id)?;

        let endpoint_name = endpoint.endpoint_name.clone();
        let updated = self
            .mutate("record endpoint", |doc| {
                let now = Utc::now();
                let updated = match doc.get_mut(id)? {
                    Some(stored) => {
                        stored.record.deployed_endpoints.push(endpoint);
                        stored.record.status = ModelStatus::deployed();
                        stored.updated_at = now;
                        Some(stored.record.clone())
                    }
                    None => None,
                };
                if updated.is_some() {
                    doc.touch(now);
                }
                let changed = updated.is_some();
                Ok((updated, changed))
            })
            .await?;

        if updated.is_some() {
            tracing::info!("Updated model '{}' with endpoint {}", id, endpoint_name);
        }
        Ok(updated)
    }

    /// Drop entries that could not be decoded. Returns how many were removed.
    pub async fn purge_corrupt(&self) -> Result<usize, StorageError> {
        let removed = self
            .mutate("purge corrupt entries", |doc| {
                let removed = doc.purge_quarantined(Utc::now());
                Ok((removed, removed > 0))
            })
            .await?;

        if removed > 0 {
            tracing::warn!("Purged {} unreadable registry entries", removed);
        }
        Ok(removed)
    }

    /// Apply `change` to a copy of the current document, persist it if the
    /// change reports a modification, then publish it.
    async fn mutate<T, F>(&self, op: &'static str, change: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut RegistryDocument) -> Result<(T, bool), StorageError>,
    {
        let lock = Arc::clone(&self.inner.write_lock);
        let guard = with_timeout(op, self.inner.io_timeout, async move {
            Ok(lock.lock_owned().await)
        })
        .await?;

        let mut next = self.inner.state.read().await.clone();
        let (output, changed) = change(&mut next)?;
        if !changed {
            return Ok(output);
        }

        let bytes = next.encode()?;
        let path = self.inner.path.clone();
        // The lock travels with the write. If we stop waiting, it is released
        // only once the rename can no longer land behind a later write.
        let write = tokio::task::spawn_blocking(move || {
            write_atomic(&path, &bytes).map(|()| guard)
        });
        let _guard = with_timeout(op, self.inner.io_timeout, async move {
            write
                .await
                .map_err(|e| StorageError::Task(e.to_string()))?
        })
        .await
        .inspect_err(|e| tracing::warn!("Failed to {}: {}", op, e))?;

        *self.inner.state.write().await = next;
        Ok(output)
    }
}

async fn load_document(path: &Path) -> Result<RegistryDocument, StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(parent, e))?;
    }

    match fs::read(path).await {
        Ok(bytes) => RegistryDocument::decode(&bytes, Utc::now()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("Registry file not found, starting empty");
            Ok(RegistryDocument::empty(Utc::now()))
        }
        Err(e) => Err(StorageError::io(path, e)),
    }
}

fn validate_id(id: &str) -> Result<(), StorageError> {
    if id.trim().is_empty() {
        return Err(StorageError::Validation(
            "model id must be a non-empty string".to_string(),
        ));
    }
    Ok(())
}
