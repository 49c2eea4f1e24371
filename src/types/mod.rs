//! Shared type definitions
//!
//! Data types used across the store and the collaborator clients.

pub mod config;
pub mod model;

pub use config::{GatewayConfig, RegistryConfig, StoreConfig};
pub use model::{DeployedEndpoint, ModelRecord, ModelStatus, ModelType};
