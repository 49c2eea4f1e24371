//! Remote model registry client
//!
//! Registers trained models with the hosted model registry so they can be
//! served. Independent of the local store: registering here never touches it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::services::{build_client, check_response, decode_json, ServiceError};
use crate::types::config::RegistryConfig;
use crate::types::model::ModelRecord;

/// Default schema for model metadata
pub const DEFAULT_METADATA_SCHEMA: &str =
    "gs://google-cloud-aiplatform/schema/model/metadata/1.0.0";

/// Payload describing a model to register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescription {
    pub display_name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_schema_uri: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl ModelDescription {
    /// Describe a local record: type and accuracy go to metadata, type and
    /// status to labels.
    pub fn from_record(record: &ModelRecord, description: impl Into<String>) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("framework".to_string(), Value::from("custom"));
        metadata.insert("modelType".to_string(), Value::from(record.model_type.as_str()));
        metadata.insert("accuracy".to_string(), Value::from(record.accuracy));
        if !record.training_job_id.is_empty() {
            metadata.insert(
                "trainingJobId".to_string(),
                Value::from(record.training_job_id.as_str()),
            );
        }

        let mut labels = BTreeMap::new();
        labels.insert("type".to_string(), label_value(record.model_type.as_str()));
        labels.insert("status".to_string(), label_value(record.status.as_str()));

        Self {
            display_name: record.display_name.clone(),
            description: description.into(),
            metadata_schema_uri: Some(DEFAULT_METADATA_SCHEMA.to_string()),
            metadata,
            labels,
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Labels allow lowercase letters, digits, `-` and `_` only
fn label_value(raw: &str) -> String {
    raw.chars()
        .map(|c| c.to_ascii_lowercase())
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(63)
        .collect()
}

/// Handle of the long-running registration operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationHandle {
    pub name: String,
}

/// Model registration capability
#[async_trait]
pub trait RemoteRegistry: Send + Sync {
    async fn register_model(
        &self,
        description: &ModelDescription,
    ) -> Result<OperationHandle, ServiceError>;
}

#[derive(Serialize)]
struct UploadModelRequest<'a> {
    model: &'a ModelDescription,
}

/// [`RemoteRegistry`] over the registry's REST API
pub struct HttpRemoteRegistry {
    client: reqwest::Client,
    config: RegistryConfig,
}

impl HttpRemoteRegistry {
    pub fn new(config: &RegistryConfig) -> Result<Self, ServiceError> {
        let mut config = config.clone();
        config.validate();
        Ok(Self {
            client: build_client(config.timeout())?,
            config,
        })
    }

    fn upload_url(&self) -> String {
        format!("{}/v1/{}/models:upload", self.config.endpoint, self.config.parent())
    }

    fn token(&self) -> Result<String, ServiceError> {
        std::env::var(&self.config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ServiceError::MissingCredentials(format!(
                    "{} environment variable not set",
                    self.config.token_env
                ))
            })
    }
}

#[async_trait]
impl RemoteRegistry for HttpRemoteRegistry {
    async fn register_model(
        &self,
        description: &ModelDescription,
    ) -> Result<OperationHandle, ServiceError> {
        if self.config.project.trim().is_empty() {
            return Err(ServiceError::MissingCredentials(
                "remote registry project is not configured".to_string(),
            ));
        }
        let token = self.token()?;

        tracing::info!("Registering model {} remotely", description.display_name);
        let response = self
            .client
            .post(self.upload_url())
            .bearer_auth(token)
            .json(&UploadModelRequest { model: description })
            .send()
            .await?;
        let response = check_response(response, "Model registration failed").await?;
        let handle: OperationHandle = decode_json(response).await?;

        tracing::info!("Model registration started: {}", handle.name);
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::model::{ModelStatus, ModelType};
    use axum::extract::Path as UrlPath;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    async fn start_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn record() -> ModelRecord {
        let mut record = ModelRecord::new(
            "m1",
            "Housing",
            "Housing Price Predictor",
            ModelType::housing(),
            ModelStatus::ready(),
        );
        record.training_job_id = "job-1".to_string();
        record.accuracy = 0.87;
        record
    }

    fn config(endpoint: String, token_env: &str) -> RegistryConfig {
        RegistryConfig {
            endpoint,
            project: "demo".to_string(),
            token_env: token_env.to_string(),
            ..RegistryConfig::default()
        }
    }

    #[test]
    fn test_description_from_record() {
        let description = ModelDescription::from_record(&record(), "predicts prices")
            .with_label("created_by", "registry");
        assert_eq!(description.display_name, "Housing Price Predictor");
        assert_eq!(description.metadata["modelType"], "housing");
        assert_eq!(description.metadata["accuracy"], 0.87);
        assert_eq!(description.labels["status"], "ready");
        assert_eq!(description.labels["created_by"], "registry");

        let json = serde_json::to_value(&description).unwrap();
        assert_eq!(json["displayName"], "Housing Price Predictor");
        assert_eq!(json["metadataSchemaUri"], DEFAULT_METADATA_SCHEMA);
    }

    #[test]
    fn test_label_value_sanitizes() {
        assert_eq!(label_value("Median House/Value"), "median_house_value");
    }

    #[tokio::test]
    async fn test_register_model() {
        let app = Router::new().route(
            "/v1/projects/:project/locations/:location/*rest",
            post(
                |UrlPath((project, location, rest)): UrlPath<(String, String, String)>,
                 headers: HeaderMap,
                 Json(body): Json<Value>| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    if auth != "Bearer secret-token" || rest != "models:upload" {
                        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "denied" })));
                    }
                    let name = format!(
                        "projects/{}/locations/{}/operations/{}",
                        project,
                        location,
                        body["model"]["displayName"].as_str().unwrap_or_default().len()
                    );
                    (StatusCode::OK, Json(json!({ "name": name })))
                },
            ),
        );
        let base = start_server(app).await;

        std::env::set_var("MODEL_REGISTRY_TEST_TOKEN_OK", "secret-token");
        let registry = HttpRemoteRegistry::new(&config(base, "MODEL_REGISTRY_TEST_TOKEN_OK")).unwrap();
        let handle = registry
            .register_model(&ModelDescription::from_record(&record(), "test"))
            .await
            .unwrap();
        assert_eq!(handle.name, "projects/demo/locations/us-central1/operations/23");
    }

    #[tokio::test]
    async fn test_missing_token() {
        let registry = HttpRemoteRegistry::new(&config(
            "http://127.0.0.1:9".to_string(),
            "MODEL_REGISTRY_TEST_TOKEN_UNSET",
        ))
        .unwrap();
        let err = registry
            .register_model(&ModelDescription::from_record(&record(), "test"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::MissingCredentials(_)));
    }

    #[tokio::test]
    async fn test_rejected_registration() {
        let app = Router::new().route(
            "/v1/projects/:project/locations/:location/*rest",
            post(|| async {
                (
                    StatusCode::FORBIDDEN,
                    Json(json!({ "error": "permission denied on project" })),
                )
            }),
        );
        let base = start_server(app).await;

        std::env::set_var("MODEL_REGISTRY_TEST_TOKEN_DENIED", "token");
        let registry =
            HttpRemoteRegistry::new(&config(base, "MODEL_REGISTRY_TEST_TOKEN_DENIED")).unwrap();
        let err = registry
            .register_model(&ModelDescription::from_record(&record(), "test"))
            .await
            .unwrap_err();
        match err {
            ServiceError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "permission denied on project");
            }
            other => panic!("expected api error, got {:?}", other),
        }
    }
}
