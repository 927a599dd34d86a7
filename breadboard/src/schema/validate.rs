//! Structural validation of current-version documents.
//!
//! Never fails: problems come back as a list so the caller can decide
//! whether a best-effort load is acceptable.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use super::CURRENT_VERSION;
use crate::components::ComponentKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueKind {
    /// Shape problems: the document cannot be loaded.
    Structural,
    /// References to unknown kinds, components or pins. A lenient load skips
    /// the offending item.
    Reference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaIssue {
    pub kind: IssueKind,
    /// JSON-pointer-like location, e.g. `wires[2].from.pin`.
    pub path: String,
    pub message: String,
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

struct Checker {
    issues: Vec<SchemaIssue>,
}

impl Checker {
    fn structural(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(SchemaIssue {
            kind: IssueKind::Structural,
            path: path.into(),
            message: message.into(),
        });
    }

    fn reference(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(SchemaIssue {
            kind: IssueKind::Reference,
            path: path.into(),
            message: message.into(),
        });
    }

    fn non_empty_string<'v>(&mut self, object: &'v Map<String, Value>, key: &str, path: &str) -> Option<&'v str> {
        match object.get(key) {
            Some(Value::String(text)) if !text.is_empty() => Some(text.as_str()),
            Some(Value::String(_)) => {
                self.structural(format!("{}.{}", path, key), "must not be empty");
                None
            }
            Some(_) => {
                self.structural(format!("{}.{}", path, key), "must be a string");
                None
            }
            None => {
                self.structural(path.to_string(), format!("missing required field '{}'", key));
                None
            }
        }
    }

    fn metadata(&mut self, root: &Map<String, Value>) {
        let Some(metadata) = root.get("metadata") else {
            self.structural("metadata", "missing required field");
            return;
        };
        let Some(metadata) = metadata.as_object() else {
            self.structural("metadata", "must be an object");
            return;
        };
        if !matches!(metadata.get("name"), Some(Value::String(_))) {
            self.structural("metadata.name", "must be a string");
        }
        for key in ["created", "modified"] {
            match metadata.get(key) {
                None => {}
                Some(Value::String(text)) if chrono::DateTime::parse_from_rfc3339(text).is_ok() => {}
                Some(_) => self.structural(format!("metadata.{}", key), "must be an RFC 3339 timestamp"),
            }
        }
    }

    fn simulation(&mut self, root: &Map<String, Value>) {
        let Some(simulation) = root.get("simulation") else {
            return;
        };
        let Some(simulation) = simulation.as_object() else {
            self.structural("simulation", "must be an object");
            return;
        };
        if let Some(running) = simulation.get("running") {
            if !running.is_boolean() {
                self.structural("simulation.running", "must be a boolean");
            }
        }
        if let Some(time) = simulation.get("time") {
            if !time.is_u64() {
                self.structural("simulation.time", "must be a non-negative integer");
            }
        }
        if let Some(scale) = simulation.get("timeScale") {
            if !scale.as_f64().is_some_and(|s| s.is_finite() && s > 0.0) {
                self.structural("simulation.timeScale", "must be a positive number");
            }
        }
        if let Some(seed) = simulation.get("seed") {
            if !seed.as_u64().is_some_and(|s| s <= u64::from(u32::MAX)) {
                self.structural("simulation.seed", "must be a 32-bit unsigned integer");
            }
        }
    }

    /// Returns the kind of every component with a valid id, for wire checks.
    fn components(&mut self, root: &Map<String, Value>) -> Vec<(String, Option<ComponentKind>)> {
        let mut known = Vec::new();
        let Some(components) = root.get("components") else {
            self.structural("components", "missing required field");
            return known;
        };
        let Some(components) = components.as_array() else {
            self.structural("components", "must be an array");
            return known;
        };

        let mut seen = HashSet::new();
        for (index, component) in components.iter().enumerate() {
            let path = format!("components[{}]", index);
            let Some(component) = component.as_object() else {
                self.structural(path, "must be an object");
                continue;
            };
            let id = self.non_empty_string(component, "id", &path);
            if let Some(id) = id {
                if !seen.insert(id.to_string()) {
                    self.structural(format!("{}.id", path), format!("duplicate component id '{}'", id));
                }
            }

            let kind = match component.get("kind") {
                Some(Value::String(kind)) => match kind.parse::<ComponentKind>() {
                    Ok(kind) => Some(kind),
                    Err(_) => {
                        self.reference(format!("{}.kind", path), format!("unknown component kind '{}'", kind));
                        None
                    }
                },
                Some(_) => {
                    self.structural(format!("{}.kind", path), "must be a string");
                    None
                }
                None => {
                    self.structural(path.clone(), "missing required field 'kind'");
                    None
                }
            };

            match component.get("properties") {
                None | Some(Value::Null) | Some(Value::Object(_)) => {}
                Some(_) => self.structural(format!("{}.properties", path), "must be an object"),
            }
            if let Some(position) = component.get("position") {
                let valid = position
                    .as_object()
                    .is_some_and(|p| p.get("x").is_some_and(Value::is_number) && p.get("y").is_some_and(Value::is_number));
                if !valid && !position.is_null() {
                    self.structural(format!("{}.position", path), "must be an object with numeric x and y");
                }
            }

            if let Some(id) = id {
                known.push((id.to_string(), kind));
            }
        }
        known
    }

    fn endpoint(&mut self, wire: &Map<String, Value>, key: &str, path: &str, known: &[(String, Option<ComponentKind>)]) {
        let path = format!("{}.{}", path, key);
        let Some(endpoint) = wire.get(key) else {
            self.structural(path, "missing required endpoint");
            return;
        };
        let Some(endpoint) = endpoint.as_object() else {
            self.structural(path, "must be an object with 'component' and 'pin'");
            return;
        };
        let component = self.non_empty_string(endpoint, "component", &path);
        let pin = self.non_empty_string(endpoint, "pin", &path);
        let (Some(component), Some(pin)) = (component, pin) else {
            return;
        };
        match known.iter().find(|(id, _)| id == component) {
            None => self.reference(
                format!("{}.component", path),
                format!("references unknown component '{}'", component),
            ),
            Some((_, Some(kind))) if kind.pin_index(pin).is_none() => self.reference(
                format!("{}.pin", path),
                format!("{} has no pin '{}'", kind, pin),
            ),
            Some(_) => {}
        }
    }

    fn wires(&mut self, root: &Map<String, Value>, known: &[(String, Option<ComponentKind>)]) {
        let Some(wires) = root.get("wires") else {
            self.structural("wires", "missing required field");
            return;
        };
        let Some(wires) = wires.as_array() else {
            self.structural("wires", "must be an array");
            return;
        };

        let mut seen = HashSet::new();
        for (index, wire) in wires.iter().enumerate() {
            let path = format!("wires[{}]", index);
            let Some(wire) = wire.as_object() else {
                self.structural(path, "must be an object");
                continue;
            };
            if let Some(id) = self.non_empty_string(wire, "id", &path) {
                if !seen.insert(id.to_string()) {
                    self.structural(format!("{}.id", path), format!("duplicate wire id '{}'", id));
                }
            }
            self.endpoint(wire, "from", &path, known);
            self.endpoint(wire, "to", &path, known);
            if let Some(color) = wire.get("color") {
                if !color.is_string() {
                    self.structural(format!("{}.color", path), "must be a string");
                }
            }
        }
    }
}

/// Check a document already at the current schema version.
pub fn validate_document(value: &Value) -> Vec<SchemaIssue> {
    let mut checker = Checker { issues: Vec::new() };
    let Some(root) = value.as_object() else {
        checker.structural("$", "document must be a JSON object");
        return checker.issues;
    };

    match root.get("schemaVersion").and_then(Value::as_u64) {
        Some(version) if version == u64::from(CURRENT_VERSION) => {}
        Some(version) => checker.structural(
            "schemaVersion",
            format!("expected version {}, found {}; migrate the document first", CURRENT_VERSION, version),
        ),
        None => checker.structural("schemaVersion", "missing or not an integer"),
    }
    checker.metadata(root);
    checker.simulation(root);
    let known = checker.components(root);
    checker.wires(root, &known);
    checker.issues
}

/// Human-readable form of [`validate_document`].
pub fn validate_schema(value: &Value) -> Vec<String> {
    validate_document(value).iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "schemaVersion": 3,
            "metadata": { "name": "demo", "created": "2024-05-01T12:00:00Z", "modified": "2024-05-01T12:00:00Z" },
            "simulation": { "running": true, "time": 0, "timeScale": 1.0, "seed": 42 },
            "components": [
                { "id": "bat", "kind": "battery", "properties": { "voltage": 5.0 } },
                { "id": "led1", "kind": "led" }
            ],
            "wires": [
                { "id": "w1", "from": { "component": "bat", "pin": "+" }, "to": { "component": "led1", "pin": "anode" } }
            ]
        })
    }

    #[test]
    fn test_valid_document_has_no_issues() {
        assert!(validate_schema(&valid()).is_empty());
    }

    #[test]
    fn test_reports_every_problem() {
        let mut doc = valid();
        let components = doc["components"].as_array_mut().unwrap();
        components.push(json!({ "id": "bat", "kind": "resistor" }));
        components.push(json!({ "id": "x", "kind": "flux_capacitor" }));
        doc["wires"][0]["to"]["pin"] = json!("gate");
        doc["wires"].as_array_mut().unwrap().push(json!({ "id": "w1", "from": { "component": "ghost", "pin": "a" }, "to": "bat:+" }));

        let issues = validate_document(&doc);
        let messages: Vec<String> = issues.iter().map(ToString::to_string).collect();
        assert!(messages.iter().any(|m| m.contains("duplicate component id 'bat'")), "{:?}", messages);
        assert!(messages.iter().any(|m| m.contains("unknown component kind 'flux_capacitor'")));
        assert!(messages.iter().any(|m| m.contains("duplicate wire id 'w1'")));
        assert!(messages.iter().any(|m| m.contains("unknown component 'ghost'")));
        assert!(messages.iter().any(|m| m.starts_with("wires[1].to")));

        let references = issues.iter().filter(|i| i.kind == IssueKind::Reference).count();
        assert_eq!(references, 3, "{:?}", messages);
    }

    #[test]
    fn test_structural_shapes() {
        assert_eq!(validate_schema(&json!([])), vec!["$: document must be a JSON object"]);
        let issues = validate_schema(&json!({ "schemaVersion": 1, "components": {}, "wires": [] }));
        assert!(issues.iter().any(|m| m.contains("migrate the document first")));
        assert!(issues.iter().any(|m| m == "components: must be an array"));
        assert!(issues.iter().any(|m| m == "metadata: missing required field"));
    }

    #[test]
    fn test_simulation_block_checks() {
        let mut doc = valid();
        doc["simulation"]["timeScale"] = json!(0);
        doc["simulation"]["seed"] = json!(-1);
        let issues = validate_schema(&doc);
        assert_eq!(issues.len(), 2, "{:?}", issues);
    }
}
