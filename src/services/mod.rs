//! Collaborator clients
//!
//! HTTP clients for the services this crate talks to but does not own: the
//! dataset upload gateway and the remote model registry. Both sit behind
//! traits so callers can substitute their own implementation.

pub mod registry;
pub mod upload;

pub use registry::{HttpRemoteRegistry, ModelDescription, OperationHandle, RemoteRegistry};
pub use upload::{DatasetInfo, DatasetUpload, HttpUploadGateway, UploadGateway, UploadReceipt};

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Collaborator call errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{message} (status {status})")]
    Api { status: u16, message: String },
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
    #[error("Unexpected response: {0}")]
    Decode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, ServiceError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("model_registry/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Pass successful responses through; turn others into [`ServiceError::Api`]
/// using the body's `error` field, or `fallback` when there is none.
pub(crate) async fn check_response(
    response: reqwest::Response,
    fallback: &str,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.error.or(b.message))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string());

    tracing::warn!("{}: status {}, {}", fallback, status, message);
    Err(ServiceError::Api {
        status: status.as_u16(),
        message,
    })
}

pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ServiceError> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ServiceError::Decode(e.to_string()))
}
