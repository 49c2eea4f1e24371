//! Configuration types
//!
//! Store and collaborator configuration structures.

use crate::storage::get_data_dir;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_REGISTRY_FILE: &str = "models-registry.json";
const DEFAULT_GATEWAY_URL: &str = "http://localhost:3001";
const DEFAULT_REGISTRY_ENDPOINT: &str = "https://us-central1-aiplatform.googleapis.com";
const DEFAULT_LOCATION: &str = "us-central1";
const DEFAULT_TOKEN_ENV: &str = "REMOTE_REGISTRY_TOKEN";

/// Local model store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the registry file
    pub data_dir: PathBuf,
    /// Registry file name inside `data_dir`
    pub registry_file: String,
    /// Upper bound for a single file operation, in seconds
    pub io_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: get_data_dir().unwrap_or_else(|_| PathBuf::from("./data")),
            registry_file: DEFAULT_REGISTRY_FILE.to_string(),
            io_timeout_secs: 10,
        }
    }
}

impl StoreConfig {
    /// Configuration rooted at an explicit directory
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join(&self.registry_file)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    /// Reset out-of-range values
    pub fn validate(&mut self) {
        self.io_timeout_secs = self.io_timeout_secs.clamp(1, 300);

        let name = self.registry_file.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            tracing::warn!(
                "Invalid registry file name {:?}, using {}",
                self.registry_file,
                DEFAULT_REGISTRY_FILE
            );
            self.registry_file = DEFAULT_REGISTRY_FILE.to_string();
        }
    }
}

/// Upload gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the upload service, without trailing slash
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            timeout_secs: 300,
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&mut self) {
        self.timeout_secs = self.timeout_secs.clamp(1, 3600);

        let trimmed = self.base_url.trim().trim_end_matches('/');
        self.base_url = if trimmed.is_empty() {
            DEFAULT_GATEWAY_URL.to_string()
        } else {
            trimmed.to_string()
        };
    }
}

/// Remote model registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// API endpoint, without trailing slash
    pub endpoint: String,
    pub project: String,
    pub location: String,
    /// Name of the environment variable holding the bearer token
    pub token_env: String,
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_REGISTRY_ENDPOINT.to_string(),
            project: String::new(),
            location: DEFAULT_LOCATION.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            timeout_secs: 60,
        }
    }
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resource path under which models are uploaded
    pub fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project, self.location)
    }

    pub fn validate(&mut self) {
        self.timeout_secs = self.timeout_secs.clamp(1, 600);

        let endpoint = self.endpoint.trim().trim_end_matches('/');
        self.endpoint = if endpoint.is_empty() {
            DEFAULT_REGISTRY_ENDPOINT.to_string()
        } else {
            endpoint.to_string()
        };

        if self.location.trim().is_empty() {
            self.location = DEFAULT_LOCATION.to_string();
        }

        if self.token_env.trim().is_empty() {
            self.token_env = DEFAULT_TOKEN_ENV.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_store_config() {
        let config = StoreConfig::default();
        assert_eq!(config.registry_file, "models-registry.json");
        assert_eq!(config.io_timeout_secs, 10);
        assert!(config.registry_path().ends_with("models-registry.json"));
    }

    #[test]
    fn test_store_config_validation() {
        let mut config = StoreConfig::in_dir("/tmp/models");
        config.io_timeout_secs = 0;
        config.registry_file = "../escape.json".to_string();
        config.validate();
        assert_eq!(config.io_timeout_secs, 1);
        assert_eq!(config.registry_file, "models-registry.json");
        assert_eq!(
            config.registry_path(),
            PathBuf::from("/tmp/models/models-registry.json")
        );
    }

    #[test]
    fn test_gateway_validation_trims_url() {
        let mut config = GatewayConfig {
            base_url: "http://example.test/ ".to_string(),
            timeout_secs: 0,
        };
        config.validate();
        assert_eq!(config.base_url, "http://example.test");
        assert_eq!(config.timeout_secs, 1);

        config.base_url = "   ".to_string();
        config.validate();
        assert_eq!(config.base_url, "http://localhost:3001");
    }

    #[test]
    fn test_registry_parent() {
        let mut config = RegistryConfig {
            project: "demo".to_string(),
            location: String::new(),
            ..RegistryConfig::default()
        };
        config.validate();
        assert_eq!(config.parent(), "projects/demo/locations/us-central1");
    }

    #[test]
    fn test_config_serialization() {
        let config = StoreConfig::in_dir("/var/lib/models");
        let json = serde_json::to_string(&config).expect("Failed to serialize");
        let deserialized: StoreConfig = serde_json::from_str(&json).expect("Failed to deserialize");
        assert_eq!(config.data_dir, deserialized.data_dir);
        assert_eq!(config.io_timeout_secs, deserialized.io_timeout_secs);
    }
}
