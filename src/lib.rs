//! Model Registry Library
//!
//! Local, durable registry of trained-model metadata, plus clients for the
//! dataset upload gateway and the remote model registry.

pub mod logging;
pub mod registration;
pub mod services;
pub mod storage;
pub mod types;

pub use storage::{ErrorKind, ModelStore, StorageError, StoredModel};
pub use types::{DeployedEndpoint, ModelRecord, ModelStatus, ModelType, StoreConfig};
