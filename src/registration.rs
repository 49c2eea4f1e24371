//! Model registration
//!
//! Registers a trained model with the remote registry and records it in the
//! local store. The two calls are independent: each may fail on its own and
//! neither is undone when the other fails.

use crate::services::{ModelDescription, OperationHandle, RemoteRegistry, ServiceError};
use crate::storage::{ModelStore, StorageError};
use crate::types::model::ModelRecord;

/// Result of each half of a registration
#[derive(Debug)]
pub struct RegistrationOutcome {
    pub remote: Result<OperationHandle, ServiceError>,
    pub local: Result<(), StorageError>,
}

impl RegistrationOutcome {
    pub fn is_complete(&self) -> bool {
        self.remote.is_ok() && self.local.is_ok()
    }
}

/// Register `record` remotely, then save it locally.
///
/// When the remote call succeeds, the operation name is stored in the
/// record's `remote_operation` before saving. `remote_name` is left alone;
/// the model's final name is only known once the operation completes.
pub async fn register_trained_model(
    store: &ModelStore,
    registry: &dyn RemoteRegistry,
    mut record: ModelRecord,
    description: &ModelDescription,
) -> RegistrationOutcome {
    let remote = registry.register_model(description).await;
    match &remote {
        Ok(handle) => record.remote_operation = Some(handle.name.clone()),
        Err(e) => tracing::warn!("Remote registration of '{}' failed: {}", record.id, e),
    }

    let local = store.save_model(record).await;
    if let Err(e) = &local {
        tracing::warn!("Local save after registration failed: {}", e);
    }

    RegistrationOutcome { remote, local }
}
