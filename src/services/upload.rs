//! Dataset upload gateway client
//!
//! Uploads dataset files to the upload service and lists what it holds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::services::{build_client, check_response, decode_json, ServiceError};
use crate::types::config::GatewayConfig;

/// A dataset file ready to upload
#[derive(Debug, Clone)]
pub struct DatasetUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// MIME type; the gateway infers one when absent
    pub content_type: Option<String>,
    pub description: Option<String>,
    /// Free-form, comma separated
    pub tags: Option<String>,
}

impl DatasetUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            content_type: None,
            description: None,
            tags: None,
        }
    }

    /// Read a local file into an upload
    pub async fn from_path(path: &Path) -> Result<Self, ServiceError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string());
        let content_type = match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => Some("text/csv".to_string()),
            Some("json") => Some("application/json".to_string()),
            _ => None,
        };
        Ok(Self {
            content_type,
            ..Self::new(file_name, bytes)
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    fn into_form(self) -> Result<Form, ServiceError> {
        let mut part = Part::bytes(self.bytes).file_name(self.file_name);
        if let Some(content_type) = &self.content_type {
            part = part.mime_str(content_type)?;
        }

        let mut form = Form::new().part("file", part);
        if let Some(description) = self.description {
            form = form.text("description", description);
        }
        if let Some(tags) = self.tags {
            form = form.text("tags", tags);
        }
        Ok(form)
    }
}

/// Where the gateway stored an upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub success: bool,
    pub filename: String,
    pub bucket: String,
    pub path: String,
    pub public_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    pub original_name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Gateway response to a successful upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub message: String,
    pub file: StoredFile,
    pub metadata: UploadMetadata,
}

/// A dataset held by the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetInfo {
    pub name: String,
    pub size: String,
    pub content_type: String,
    pub time_created: DateTime<Utc>,
    pub path: String,
}

#[derive(Deserialize)]
struct DatasetList {
    datasets: Vec<DatasetInfo>,
}

/// Dataset upload capability
#[async_trait]
pub trait UploadGateway: Send + Sync {
    async fn upload_dataset(&self, upload: DatasetUpload) -> Result<UploadReceipt, ServiceError>;
    /// Datasets in the order the gateway reports them
    async fn list_datasets(&self) -> Result<Vec<DatasetInfo>, ServiceError>;
    /// Liveness check; the body is passed through untouched
    async fn health(&self) -> Result<Value, ServiceError>;
}

/// [`UploadGateway`] over HTTP
pub struct HttpUploadGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUploadGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, ServiceError> {
        let mut config = config.clone();
        config.validate();
        Ok(Self {
            client: build_client(config.timeout())?,
            base_url: config.base_url,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl UploadGateway for HttpUploadGateway {
    async fn upload_dataset(&self, upload: DatasetUpload) -> Result<UploadReceipt, ServiceError> {
        tracing::info!(
            "Uploading dataset {} ({} bytes)",
            upload.file_name,
            upload.bytes.len()
        );
        let form = upload.into_form()?;

        let response = self
            .client
            .post(self.url("/api/upload/dataset"))
            .multipart(form)
            .send()
            .await?;
        let response = check_response(response, "Upload failed").await?;
        let receipt: UploadReceipt = decode_json(response).await?;

        tracing::info!("Dataset stored at {}", receipt.file.path);
        Ok(receipt)
    }

    async fn list_datasets(&self) -> Result<Vec<DatasetInfo>, ServiceError> {
        let response = self.client.get(self.url("/api/datasets")).send().await?;
        let response = check_response(response, "Failed to fetch datasets").await?;
        let list: DatasetList = decode_json(response).await?;
        tracing::debug!("Gateway reports {} datasets", list.datasets.len());
        Ok(list.datasets)
    }

    async fn health(&self) -> Result<Value, ServiceError> {
        let response = self.client.get(self.url("/health")).send().await?;
        let response = check_response(response, "Health check failed").await?;
        decode_json(response).await
    }
}
