//! Persisted circuit documents.
//!
//! A document on disk may be at any supported schema version. Loading goes
//! through [`migrate`] to bring it to [`CURRENT_VERSION`], then
//! [`validate_document`], then typed deserialization into
//! [`CircuitDocument`].
//!
//! Version history:
//!
//! - **1** (legacy, no `schemaVersion` tag): components carry `type`, `props`
//!   and loose `x`/`y`; wires connect `"component:pin"` strings.
//! - **2**: components carry `kind`, `properties` and `position`; wires have
//!   endpoint objects, an `id` and a `color`.
//! - **3** (current): adds `metadata` and `simulation` blocks.

pub mod migrate;
pub mod validate;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::circuit::{Point, Wire};
use crate::core::DEFAULT_SEED;

pub use migrate::{document_version, migrate, migrate_with, Migration, MigrationError, MIGRATIONS};
pub use validate::{validate_document, validate_schema, IssueKind, SchemaIssue};

pub const CURRENT_VERSION: u32 = 3;
pub const LEGACY_VERSION: u32 = 1;

pub const DEFAULT_DOCUMENT_NAME: &str = "Untitled circuit";

fn default_name() -> String {
    DEFAULT_DOCUMENT_NAME.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default = "default_name")]
    pub name: String,
    /// Defaults to the Unix epoch for documents that never recorded it.
    #[serde(default)]
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub modified: DateTime<Utc>,
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            id: None,
            name: default_name(),
            created: DateTime::<Utc>::default(),
            modified: DateTime::<Utc>::default(),
        }
    }
}

impl DocumentMetadata {
    /// Metadata for a circuit created now.
    pub fn fresh() -> Self {
        let now = Utc::now();
        Self {
            id: Some(Uuid::new_v4()),
            name: default_name(),
            created: now,
            modified: now,
        }
    }
}

fn default_time_scale() -> f64 {
    1.0
}

fn default_seed() -> u32 {
    DEFAULT_SEED
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSettings {
    #[serde(default)]
    pub running: bool,
    /// Simulated time in ms.
    #[serde(default)]
    pub time: u64,
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,
    #[serde(default = "default_seed")]
    pub seed: u32,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            running: false,
            time: 0,
            time_scale: default_time_scale(),
            seed: default_seed(),
        }
    }
}

/// A component as persisted. `kind` stays a string so unknown kinds can be
/// reported instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub properties: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitDocument {
    pub schema_version: u32,
    #[serde(default)]
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub components: Vec<ComponentRecord>,
    #[serde(default)]
    pub wires: Vec<Wire>,
    #[serde(default)]
    pub simulation: SimulationSettings,
}

impl CircuitDocument {
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_current_document_defaults() {
        let doc: CircuitDocument = serde_json::from_value(json!({
            "schemaVersion": 3,
            "components": [{ "id": "bat", "kind": "battery" }],
            "wires": []
        }))
        .unwrap();
        assert_eq!(doc.metadata.name, DEFAULT_DOCUMENT_NAME);
        assert_eq!(doc.metadata.created.timestamp(), 0);
        assert_eq!(doc.simulation.seed, DEFAULT_SEED);
        assert_eq!(doc.simulation.time_scale, 1.0);
        assert_eq!(doc.components[0].properties, Value::Null);
    }

    #[test]
    fn test_document_serializes_camel_case() {
        let doc = CircuitDocument {
            schema_version: CURRENT_VERSION,
            metadata: DocumentMetadata::fresh(),
            components: Vec::new(),
            wires: Vec::new(),
            simulation: SimulationSettings::default(),
        };
        let value = doc.to_value().unwrap();
        assert_eq!(value["schemaVersion"], 3);
        assert_eq!(value["simulation"]["timeScale"], 1.0);
        assert!(value["metadata"]["id"].is_string());
    }
}
