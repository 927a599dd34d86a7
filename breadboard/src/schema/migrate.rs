//! Schema migration chain.
//!
//! Each [`Migration`] is a pure transform from one version to the next.
//! [`migrate`] walks the chain until the document reaches the current
//! version and fails with the stuck version instead of dropping data.

use serde_json::{json, Map, Value};

use super::{CURRENT_VERSION, DEFAULT_DOCUMENT_NAME, LEGACY_VERSION};
use crate::circuit::{Endpoint, DEFAULT_WIRE_COLOR};
use crate::core::DEFAULT_SEED;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MigrationError {
    #[error("Document root must be a JSON object")]
    NotAnObject,
    #[error("Invalid schemaVersion: {0}")]
    InvalidVersion(String),
    #[error("No migration from schema version {version} toward version {target}")]
    NoPath { version: u32, target: u32 },
    #[error("Schema version {version} is newer than the supported version {current}")]
    Unsupported { version: u32, current: u32 },
    #[error("Malformed version {version} document: {reason}")]
    Malformed { version: u32, reason: String },
}

type Document = Map<String, Value>;

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub from: u32,
    pub to: u32,
    pub apply: fn(Document) -> Result<Document, MigrationError>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        from: 1,
        to: 2,
        apply: v1_to_v2,
    },
    Migration {
        from: 2,
        to: 3,
        apply: v2_to_v3,
    },
];

/// Version tag of a document. Untagged documents are legacy.
pub fn document_version(value: &Value) -> Result<u32, MigrationError> {
    let object = value.as_object().ok_or(MigrationError::NotAnObject)?;
    match object.get("schemaVersion") {
        None | Some(Value::Null) => Ok(LEGACY_VERSION),
        Some(tag) => tag
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v >= 1)
            .ok_or_else(|| MigrationError::InvalidVersion(tag.to_string())),
    }
}

pub fn needs_migration(value: &Value) -> bool {
    !matches!(document_version(value), Ok(CURRENT_VERSION))
}

pub fn migrate(value: Value) -> Result<Value, MigrationError> {
    migrate_with(value, MIGRATIONS, CURRENT_VERSION)
}

/// Walk `chain` from the document's version up to `target`.
pub fn migrate_with(value: Value, chain: &[Migration], target: u32) -> Result<Value, MigrationError> {
    let mut version = document_version(&value)?;
    if version > target {
        return Err(MigrationError::Unsupported {
            version,
            current: target,
        });
    }
    let Value::Object(mut document) = value else {
        return Err(MigrationError::NotAnObject);
    };

    while version < target {
        let step = chain
            .iter()
            .find(|m| m.from == version)
            .ok_or(MigrationError::NoPath { version, target })?;
        document = (step.apply)(document)?;
        tracing::debug!(from = step.from, to = step.to, "migrated circuit document");
        version = step.to;
        document.insert("schemaVersion".to_string(), json!(version));
    }
    document.insert("schemaVersion".to_string(), json!(version));
    Ok(Value::Object(document))
}

fn malformed(version: u32, reason: impl Into<String>) -> MigrationError {
    MigrationError::Malformed {
        version,
        reason: reason.into(),
    }
}

fn take_array(document: &mut Document, key: &str, version: u32) -> Result<Vec<Value>, MigrationError> {
    match document.remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(malformed(version, format!("'{}' must be an array", key))),
    }
}

/// Legacy kind names.
fn rename_kind(kind: &str) -> &str {
    match kind {
        "button" | "pushbutton" => "push_button",
        "pot" => "potentiometer",
        "arduino" | "mcu" => "microcontroller",
        "temp_sensor" | "tmp36" => "temperature_sensor",
        "switch" => "toggle_switch",
        other => other,
    }
}

fn v1_endpoint(value: &Value, index: usize) -> Result<Value, MigrationError> {
    match value {
        Value::String(text) => Endpoint::parse(text)
            .map(|endpoint| json!({ "component": endpoint.component, "pin": endpoint.pin }))
            .ok_or_else(|| malformed(1, format!("wire {} endpoint '{}' is not component:pin", index, text))),
        Value::Object(_) => Ok(value.clone()),
        _ => Err(malformed(1, format!("wire {} endpoint must be a string", index))),
    }
}

fn v1_to_v2(mut document: Document) -> Result<Document, MigrationError> {
    let components = take_array(&mut document, "components", 1)?;
    let mut migrated = Vec::with_capacity(components.len());
    for (index, component) in components.into_iter().enumerate() {
        let Value::Object(mut component) = component else {
            return Err(malformed(1, format!("component {} is not an object", index)));
        };
        let kind = component
            .remove("type")
            .or_else(|| component.remove("kind"))
            .unwrap_or(Value::Null);
        let kind = match kind {
            Value::String(kind) => Value::String(rename_kind(&kind).to_string()),
            other => other,
        };
        component.insert("kind".to_string(), kind);

        let properties = component
            .remove("props")
            .or_else(|| component.remove("properties"))
            .unwrap_or_else(|| json!({}));
        component.insert("properties".to_string(), properties);

        let x = component.remove("x").and_then(|v| v.as_f64());
        let y = component.remove("y").and_then(|v| v.as_f64());
        if let (Some(x), Some(y)) = (x, y) {
            component.insert("position".to_string(), json!({ "x": x, "y": y }));
        }
        migrated.push(Value::Object(component));
    }
    document.insert("components".to_string(), Value::Array(migrated));

    let wires = take_array(&mut document, "wires", 1)?;
    let mut migrated = Vec::with_capacity(wires.len());
    for (index, wire) in wires.into_iter().enumerate() {
        let Value::Object(wire) = wire else {
            return Err(malformed(1, format!("wire {} is not an object", index)));
        };
        let from = v1_endpoint(wire.get("from").unwrap_or(&Value::Null), index)?;
        let to = v1_endpoint(wire.get("to").unwrap_or(&Value::Null), index)?;
        let id = wire
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("w{}", index + 1));
        let color = wire
            .get("color")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_WIRE_COLOR);
        migrated.push(json!({ "id": id, "from": from, "to": to, "color": color }));
    }
    document.insert("wires".to_string(), Value::Array(migrated));
    Ok(document)
}

const EPOCH: &str = "1970-01-01T00:00:00Z";

fn v2_to_v3(mut document: Document) -> Result<Document, MigrationError> {
    let name = document
        .remove("name")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_DOCUMENT_NAME.to_string());

    let mut metadata = match document.remove("metadata") {
        Some(Value::Object(metadata)) => metadata,
        None | Some(Value::Null) => Map::new(),
        Some(_) => return Err(malformed(2, "'metadata' must be an object")),
    };
    metadata.entry("name").or_insert_with(|| json!(name));
    metadata.entry("created").or_insert_with(|| json!(EPOCH));
    let created = metadata.get("created").cloned().unwrap_or_else(|| json!(EPOCH));
    metadata.entry("modified").or_insert(created);
    document.insert("metadata".to_string(), Value::Object(metadata));

    let mut simulation = match document.remove("simulation") {
        Some(Value::Object(simulation)) => simulation,
        None | Some(Value::Null) => Map::new(),
        Some(_) => return Err(malformed(2, "'simulation' must be an object")),
    };
    simulation.entry("running").or_insert(json!(false));
    simulation.entry("time").or_insert(json!(0));
    simulation.entry("timeScale").or_insert(json!(1.0));
    simulation.entry("seed").or_insert(json!(DEFAULT_SEED));
    document.insert("simulation".to_string(), Value::Object(simulation));

    for key in ["components", "wires"] {
        document.entry(key).or_insert_with(|| json!([]));
    }
    Ok(document)
}
