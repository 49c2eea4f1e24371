//! Registry document
//!
//! The on-disk layout of the model registry: a single JSON document holding a
//! version tag, document timestamps and one entry per model.
//!
//! Decoding is tolerant per entry. An entry that fails to decode but whose id
//! can still be read is kept as a quarantined slot: lookups for that id fail,
//! other ids keep working, and the raw value is written back untouched until
//! it is overwritten, deleted or purged.

use crate::storage::StorageError;
use crate::types::model::{DeployedEndpoint, ModelRecord, ModelStatus, ModelType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

pub const REGISTRY_VERSION: &str = "1.0";

/// A model record plus store bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredModel {
    pub record: ModelRecord,
    /// First time this id was saved
    pub created_at: DateTime<Utc>,
    /// Last time this id was saved
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
enum Slot {
    Valid(StoredModel),
    Quarantined {
        id: Option<String>,
        raw: Value,
        reason: String,
    },
}

impl Slot {
    fn id(&self) -> Option<&str> {
        match self {
            Slot::Valid(stored) => Some(&stored.record.id),
            Slot::Quarantined { id, .. } => id.as_deref(),
        }
    }

    fn corrupt_error(&self) -> Option<StorageError> {
        match self {
            Slot::Valid(_) => None,
            Slot::Quarantined { id, reason, .. } => Some(StorageError::Corrupt {
                id: id.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

impl Serialize for Slot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Slot::Valid(stored) => stored.serialize(serializer),
            Slot::Quarantined { raw, .. } => raw.serialize(serializer),
        }
    }
}

/// Shape accepted on read; every field is optional so a partial document
/// from an older writer still loads.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    version: Option<String>,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    models: Vec<Value>,
}

/// Flat legacy entry, as older registry writers stored it: record fields
/// inline with the entry timestamps, `fullVertexName` for the remote name,
/// no `displayName`, and `null` for unknown accuracy or UI config.
///
/// Fields those writers always set are required, so an arbitrary object
/// with an `id` is still quarantined rather than filled with defaults.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyEntry {
    id: String,
    name: String,
    display_name: Option<String>,
    #[serde(alias = "fullVertexName")]
    remote_name: Option<String>,
    training_job_id: Option<String>,
    dataset_path: Option<String>,
    model_type: ModelType,
    accuracy: Option<f64>,
    status: ModelStatus,
    deployed_endpoints: Option<Vec<LegacyEndpoint>>,
    ui_config: Option<Value>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyEndpoint {
    endpoint_id: Option<String>,
    endpoint_name: Option<String>,
    #[serde(alias = "fullVertexName")]
    remote_name: Option<String>,
    deployed_at: Option<DateTime<Utc>>,
}

impl LegacyEntry {
    fn into_stored(self) -> StoredModel {
        let created_at = self.created_at;
        let updated_at = self.updated_at.unwrap_or(created_at);
        let name = self.name;
        let display_name = self.display_name.unwrap_or_else(|| name.clone());

        let deployed_endpoints = self
            .deployed_endpoints
            .unwrap_or_default()
            .into_iter()
            .map(|ep| DeployedEndpoint {
                endpoint_id: ep.endpoint_id.unwrap_or_default(),
                endpoint_name: ep.endpoint_name.unwrap_or_default(),
                remote_name: ep.remote_name.unwrap_or_default(),
                deployed_at: ep.deployed_at.unwrap_or(updated_at),
            })
            .collect();

        StoredModel {
            record: ModelRecord {
                id: self.id,
                name,
                display_name,
                training_job_id: self.training_job_id.unwrap_or_default(),
                dataset_path: self.dataset_path.unwrap_or_default(),
                model_type: self.model_type,
                // Unknown accuracy was written as null
                accuracy: self.accuracy.unwrap_or(0.0),
                status: self.status,
                remote_name: self.remote_name,
                remote_operation: None,
                deployed_endpoints,
                ui_config: self.ui_config,
            },
            created_at,
            updated_at,
        }
    }
}

/// In-memory form of the registry file
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegistryDocument {
    version: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(rename = "models")]
    slots: Vec<Slot>,
}

impl RegistryDocument {
    pub(crate) fn empty(now: DateTime<Utc>) -> Self {
        Self {
            version: REGISTRY_VERSION.to_string(),
            created_at: now,
            updated_at: now,
            slots: Vec::new(),
        }
    }

    /// Decode a registry file.
    ///
    /// Fails only when the document itself is unreadable; bad entries are
    /// quarantined.
    pub(crate) fn decode(bytes: &[u8], now: DateTime<Utc>) -> Result<Self, StorageError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            tracing::warn!("Registry file is empty, starting with an empty registry");
            return Ok(Self::empty(now));
        }

        let raw: RawDocument = serde_json::from_slice(bytes).map_err(|e| StorageError::Corrupt {
            id: None,
            reason: e.to_string(),
        })?;

        let mut doc = Self {
            version: raw.version.unwrap_or_else(|| REGISTRY_VERSION.to_string()),
            created_at: raw.created_at.unwrap_or(now),
            updated_at: now,
            slots: Vec::with_capacity(raw.models.len()),
        };

        for value in raw.models {
            let slot = decode_slot(value);
            if let Slot::Quarantined { id, reason, .. } = &slot {
                tracing::warn!("Quarantined registry entry {:?}: {}", id, reason);
            }
            // A repeated id keeps its first position and its last value.
            let existing = slot.id().and_then(|id| doc.position(id));
            match existing {
                Some(index) => doc.slots[index] = slot,
                None => doc.slots.push(slot),
            }
        }

        Ok(doc)
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>, StorageError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.slots.iter().position(|slot| slot.id() == Some(id))
    }

    pub(crate) fn get(&self, id: &str) -> Result<Option<&StoredModel>, StorageError> {
        match self.position(id).map(|i| &self.slots[i]) {
            None => Ok(None),
            Some(Slot::Valid(stored)) => Ok(Some(stored)),
            Some(slot) => Err(slot.corrupt_error().unwrap_or(StorageError::Corrupt {
                id: Some(id.to_string()),
                reason: "unreadable entry".to_string(),
            })),
        }
    }

    /// All records in insertion order; fails if any entry is quarantined
    pub(crate) fn records(&self) -> Result<Vec<ModelRecord>, StorageError> {
        self.slots
            .iter()
            .map(|slot| match slot {
                Slot::Valid(stored) => Ok(stored.record.clone()),
                _ => Err(slot.corrupt_error().unwrap_or(StorageError::Corrupt {
                    id: None,
                    reason: "unreadable entry".to_string(),
                })),
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Insert or fully replace the record for its id
    pub(crate) fn upsert(&mut self, record: ModelRecord, now: DateTime<Utc>) {
        self.updated_at = now;
        match self.position(&record.id) {
            Some(index) => {
                let created_at = match &self.slots[index] {
                    Slot::Valid(prior) => prior.created_at,
                    Slot::Quarantined { .. } => now,
                };
                self.slots[index] = Slot::Valid(StoredModel {
                    record,
                    created_at,
                    updated_at: now,
                });
            }
            None => self.slots.push(Slot::Valid(StoredModel {
                record,
                created_at: now,
                updated_at: now,
            })),
        }
    }

    /// Mutable access to a valid entry
    pub(crate) fn get_mut(&mut self, id: &str) -> Result<Option<&mut StoredModel>, StorageError> {
        let Some(index) = self.position(id) else {
            return Ok(None);
        };
        let slot = &mut self.slots[index];
        if let Some(err) = slot.corrupt_error() {
            return Err(err);
        }
        match slot {
            Slot::Valid(stored) => Ok(Some(stored)),
            Slot::Quarantined { .. } => Ok(None),
        }
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    pub(crate) fn remove(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        match self.position(id) {
            Some(index) => {
                self.slots.remove(index);
                self.updated_at = now;
                true
            }
            None => false,
        }
    }

    /// Drop every quarantined entry, returning how many were removed
    pub(crate) fn purge_quarantined(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.slots.len();
        self.slots.retain(|slot| matches!(slot, Slot::Valid(_)));
        let removed = before - self.slots.len();
        if removed > 0 {
            self.updated_at = now;
        }
        removed
    }
}

fn decode_slot(value: Value) -> Slot {
    let mut entry_error = match serde_json::from_value::<StoredModel>(value.clone()) {
        Ok(stored) => return Slot::Valid(stored),
        Err(e) => e,
    };

    if value.get("record").is_none() {
        match serde_json::from_value::<LegacyEntry>(value.clone()) {
            Ok(legacy) if !legacy.id.is_empty() => {
                return Slot::Valid(legacy.into_stored());
            }
            Ok(_) => {}
            Err(e) => entry_error = e,
        }
    }

    let id = value
        .get("record")
        .and_then(|r| r.get("id"))
        .or_else(|| value.get("id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    Slot::Quarantined {
        id,
        raw: value,
        reason: entry_error.to_string(),
    }
}

/// Reject records that cannot be stored faithfully
pub(crate) fn check_storable(record: &ModelRecord) -> Result<(), StorageError> {
    if !record.accuracy.is_finite() {
        return Err(StorageError::Serialization(format!(
            "accuracy of '{}' is not a finite number",
            record.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> ModelRecord {
        ModelRecord::new(id, id, id, ModelType::custom(), ModelStatus::trained())
    }

    #[test]
    fn test_decode_empty_bytes() {
        let doc = RegistryDocument::decode(b"  \n", Utc::now()).unwrap();
        assert_eq!(doc.len(), 0);
    }

    #[test]
    fn test_decode_rejects_garbage_document() {
        let err = RegistryDocument::decode(b"{not json", Utc::now()).unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { id: None, .. }));
    }

    #[test]
    fn test_encode_decode_preserves_order_and_timestamps() {
        let t0 = Utc::now();
        let mut doc = RegistryDocument::empty(t0);
        doc.upsert(record("b"), t0);
        doc.upsert(record("a"), t0);

        let bytes = doc.encode().unwrap();
        let decoded = RegistryDocument::decode(&bytes, Utc::now()).unwrap();
        let ids: Vec<_> = decoded.records().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(decoded.get("a").unwrap().unwrap().created_at, t0);
        assert_eq!(decoded.created_at, t0);
    }

    #[test]
    fn test_upsert_keeps_created_at() {
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(5);
        let mut doc = RegistryDocument::empty(t0);
        doc.upsert(record("a"), t0);
        doc.upsert(record("a"), t1);

        let stored = doc.get("a").unwrap().unwrap();
        assert_eq!(stored.created_at, t0);
        assert_eq!(stored.updated_at, t1);
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_bad_entry_is_quarantined_and_written_back() {
        let good = serde_json::to_value(StoredModel {
            record: record("good"),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .unwrap();
        let json = serde_json::json!({
            "version": "1.0",
            "models": [
                { "record": { "id": "bad", "name": 42 }, "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z" },
                good
            ]
        });
        let doc = RegistryDocument::decode(&serde_json::to_vec(&json).unwrap(), Utc::now()).unwrap();

        assert!(doc.get("good").unwrap().is_some());
        assert!(matches!(
            doc.get("bad"),
            Err(StorageError::Corrupt { id: Some(ref id), .. }) if id == "bad"
        ));
        assert!(doc.records().is_err());

        let written: Value = serde_json::from_slice(&doc.encode().unwrap()).unwrap();
        assert_eq!(written["models"][0]["record"]["name"], 42);
    }

    #[test]
    fn test_legacy_flat_entries_load() {
        let json = r#"{
            "version": "1.0",
            "createdAt": "2024-03-01T10:00:00.000Z",
            "models": [
                {
                    "id": "test-housing-model",
                    "name": "Housing Price Predictor",
                    "fullVertexName": "projects/123/locations/us-central1/models/test-housing-model",
                    "trainingJobId": "test-job-123",
                    "datasetPath": "gs://datasets/housing-data.csv",
                    "modelType": "housing",
                    "accuracy": 0.87,
                    "status": "trained",
                    "createdAt": "2024-03-01T10:00:00.000Z",
                    "updatedAt": "2024-03-02T10:00:00.000Z",
                    "deployedEndpoints": [],
                    "uiConfig": null
                },
                {
                    "id": "4471",
                    "name": "churn",
                    "fullVertexName": "projects/123/locations/us-central1/models/4471",
                    "modelType": "custom",
                    "accuracy": null,
                    "status": "deployed",
                    "createdAt": "2024-04-01T08:00:00.000Z",
                    "updatedAt": "2024-04-01T09:00:00.000Z",
                    "deployedEndpoints": [{
                        "endpointId": "ep-9",
                        "endpointName": "churn-endpoint",
                        "fullVertexName": "projects/123/locations/us-central1/endpoints/ep-9",
                        "deployedAt": "2024-04-01T09:00:00.000Z"
                    }],
                    "uiConfig": { "fields": ["tenure"] }
                }
            ]
        }"#;
        let doc = RegistryDocument::decode(json.as_bytes(), Utc::now()).unwrap();
        assert_eq!(doc.records().unwrap().len(), 2);

        let housing = doc.get("test-housing-model").unwrap().unwrap();
        assert_eq!(housing.record.name, "Housing Price Predictor");
        assert_eq!(housing.record.display_name, "Housing Price Predictor");
        assert_eq!(
            housing.record.remote_name.as_deref(),
            Some("projects/123/locations/us-central1/models/test-housing-model")
        );
        assert_eq!(housing.record.training_job_id, "test-job-123");
        assert_eq!(housing.record.accuracy, 0.87);
        assert!(housing.record.deployed_endpoints.is_empty());
        assert!(housing.record.ui_config.is_none());
        assert_eq!(housing.updated_at.to_rfc3339(), "2024-03-02T10:00:00+00:00");

        let churn = doc.get("4471").unwrap().unwrap();
        assert_eq!(churn.record.accuracy, 0.0);
        assert_eq!(churn.record.training_job_id, "");
        assert_eq!(churn.record.status, ModelStatus::deployed());
        let endpoint = &churn.record.deployed_endpoints[0];
        assert_eq!(endpoint.endpoint_id, "ep-9");
        assert_eq!(
            endpoint.remote_name,
            "projects/123/locations/us-central1/endpoints/ep-9"
        );
        assert_eq!(churn.record.ui_config, Some(serde_json::json!({ "fields": ["tenure"] })));

        // Rewritten in the current layout, the records come back unchanged.
        let rewritten = RegistryDocument::decode(&doc.encode().unwrap(), Utc::now()).unwrap();
        assert_eq!(rewritten.records().unwrap(), doc.records().unwrap());
        let written: Value = serde_json::from_slice(&doc.encode().unwrap()).unwrap();
        assert!(written["models"][0]["record"].is_object());
    }

    #[test]
    fn test_flat_entry_missing_required_fields_is_quarantined() {
        let json = r#"{ "models": [ { "id": "half", "name": "x" } ] }"#;
        let doc = RegistryDocument::decode(json.as_bytes(), Utc::now()).unwrap();
        assert!(matches!(
            doc.get("half"),
            Err(StorageError::Corrupt { id: Some(ref id), .. }) if id == "half"
        ));
    }

    #[test]
    fn test_check_storable_rejects_nan() {
        let mut r = record("x");
        r.accuracy = f64::NAN;
        assert!(matches!(check_storable(&r), Err(StorageError::Serialization(_))));
        r.accuracy = 1.5;
        assert!(check_storable(&r).is_ok());
    }
}
