//! Model types
//!
//! Defines the model metadata record and its tag types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Metadata describing one trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    /// Unique identifier, supplied by the caller
    pub id: String,
    /// Short name
    pub name: String,
    /// Presentation name
    pub display_name: String,
    /// Training job that produced the model
    pub training_job_id: String,
    /// URI or path of the source dataset
    pub dataset_path: String,
    /// Categorical tag (e.g. "housing")
    pub model_type: ModelType,
    /// Evaluation accuracy, usually in [0, 1]
    pub accuracy: f64,
    /// Lifecycle tag (e.g. "trained", "deployed")
    pub status: ModelStatus,
    /// Fully qualified model name in the remote registry, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_name: Option<String>,
    /// Long-running registry operation that is uploading this model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_operation: Option<String>,
    /// Endpoints the model has been deployed to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deployed_endpoints: Vec<DeployedEndpoint>,
    /// Free-form UI configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_config: Option<serde_json::Value>,
}

impl ModelRecord {
    /// Create a record with the required fields and no optional metadata
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        display_name: impl Into<String>,
        model_type: ModelType,
        status: ModelStatus,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            display_name: display_name.into(),
            training_job_id: String::new(),
            dataset_path: String::new(),
            model_type,
            accuracy: 0.0,
            status,
            remote_name: None,
            remote_operation: None,
            deployed_endpoints: Vec::new(),
            ui_config: None,
        }
    }
}

/// An endpoint a model was deployed to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedEndpoint {
    pub endpoint_id: String,
    pub endpoint_name: String,
    /// Fully qualified endpoint name in the remote registry
    pub remote_name: String,
    pub deployed_at: DateTime<Utc>,
}

/// Model category tag.
///
/// Stored as a plain string. Values outside the known set are kept as-is;
/// use [`ModelType::is_known`] to catch typos.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelType(String);

impl ModelType {
    pub const HOUSING: &'static str = "housing";
    pub const REGRESSION: &'static str = "regression";
    pub const CLASSIFICATION: &'static str = "classification";
    pub const CUSTOM: &'static str = "custom";

    const KNOWN: [&'static str; 4] = [
        Self::HOUSING,
        Self::REGRESSION,
        Self::CLASSIFICATION,
        Self::CUSTOM,
    ];

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn housing() -> Self {
        Self::new(Self::HOUSING)
    }

    pub fn custom() -> Self {
        Self::new(Self::CUSTOM)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_known(&self) -> bool {
        Self::KNOWN.contains(&self.0.as_str())
    }
}

impl Default for ModelType {
    fn default() -> Self {
        Self::custom()
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Model lifecycle tag.
///
/// No state machine is enforced; any transition is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelStatus(String);

impl ModelStatus {
    pub const TRAINED: &'static str = "trained";
    pub const READY: &'static str = "ready";
    pub const DEPLOYED: &'static str = "deployed";

    const KNOWN: [&'static str; 3] = [Self::TRAINED, Self::READY, Self::DEPLOYED];

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn trained() -> Self {
        Self::new(Self::TRAINED)
    }

    pub fn ready() -> Self {
        Self::new(Self::READY)
    }

    pub fn deployed() -> Self {
        Self::new(Self::DEPLOYED)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_known(&self) -> bool {
        Self::KNOWN.contains(&self.0.as_str())
    }
}

impl Default for ModelStatus {
    fn default() -> Self {
        Self::trained()
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelStatus {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
