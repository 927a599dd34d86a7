//! Import and export of persisted circuit documents.
//!
//! Importing builds a complete new engine and swaps it in only on success,
//! so a failed load never disturbs a running simulation.

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::Engine;
use crate::circuit::{Endpoint, Wire};
use crate::components::ComponentKind;
use crate::core::{EngineConfig, SimError};
use crate::schema::{
    self, CircuitDocument, ComponentRecord, IssueKind, SchemaIssue, SimulationSettings,
    CURRENT_VERSION,
};

/// Migrate and validate `value`, returning the typed document and any
/// issues a lenient load chose to tolerate.
fn prepare(value: Value, lenient: bool) -> Result<(CircuitDocument, Vec<SchemaIssue>), SimError> {
    let migrated = schema::migrate(value)?;
    let issues = schema::validate_document(&migrated);
    let fatal: Vec<String> = issues
        .iter()
        .filter(|issue| !lenient || issue.kind == IssueKind::Structural)
        .map(ToString::to_string)
        .collect();
    if !fatal.is_empty() {
        return Err(SimError::InvalidDocument(fatal));
    }
    let document: CircuitDocument = serde_json::from_value(migrated)?;
    Ok((document, issues))
}

fn wire_is_resolvable(wire: &Wire, engine: &Engine) -> bool {
    let known = |endpoint: &Endpoint| {
        engine
            .kind_of(&endpoint.component)
            .is_some_and(|kind| kind.pin_index(&endpoint.pin).is_some())
    };
    known(&wire.from) && known(&wire.to)
}

impl Engine {
    /// Build an engine from a document at any supported version. Any
    /// validation issue is an error.
    pub fn from_document(value: Value, config: EngineConfig) -> Result<Engine, SimError> {
        let (document, _) = prepare(value, false)?;
        Self::from_parts(document, config, false)
    }

    /// Like [`Engine::from_document`], but components of unknown kind and
    /// components whose properties fail to load are skipped, and wires that
    /// reference them are dropped. Returns the tolerated issues.
    pub fn from_document_lenient(
        value: Value,
        config: EngineConfig,
    ) -> Result<(Engine, Vec<SchemaIssue>), SimError> {
        let (document, issues) = prepare(value, true)?;
        let engine = Self::from_parts(document, config, true)?;
        Ok((engine, issues))
    }

    fn from_parts(document: CircuitDocument, config: EngineConfig, lenient: bool) -> Result<Engine, SimError> {
        let SimulationSettings {
            running,
            time,
            time_scale,
            seed,
        } = document.simulation;
        let mut engine = Engine::new(EngineConfig {
            seed,
            time_scale,
            ..config
        })?;
        engine.running = running;
        engine.world.now_ms = time;
        engine.metadata = document.metadata;
        if engine.metadata.id.is_none() {
            engine.metadata.id = Some(Uuid::new_v4());
        }

        for ComponentRecord {
            id,
            kind,
            properties,
            position,
        } in document.components
        {
            let parsed = kind.parse::<ComponentKind>();
            let result = match parsed {
                Ok(kind) => engine.add_slot(id.clone(), kind, &properties, position).map(|_| ()),
                Err(_) => Err(SimError::UnknownKind(kind)),
            };
            match result {
                Ok(()) => {}
                Err(error) if lenient => {
                    tracing::warn!(component = %id, %error, "skipping component during import");
                }
                Err(error) => return Err(error),
            }
        }

        for wire in document.wires {
            if lenient && !wire_is_resolvable(&wire, &engine) {
                tracing::warn!(wire = %wire.id, "skipping wire with unresolved endpoint during import");
                continue;
            }
            engine.add_wire(wire)?;
        }

        tracing::info!(
            components = engine.slots.len(),
            wires = engine.world.wires.len(),
            seed,
            "imported circuit document"
        );
        Ok(engine)
    }

    /// Replace this engine's circuit with `value`. On error the current
    /// circuit is left untouched.
    pub fn import_document(&mut self, value: Value) -> Result<(), SimError> {
        let engine = Self::from_document(value, self.world.config.clone())?;
        *self = engine;
        Ok(())
    }

    /// Current circuit as a current-version document.
    pub fn to_document(&self) -> CircuitDocument {
        let mut metadata = self.metadata.clone();
        metadata.modified = Utc::now();
        CircuitDocument {
            schema_version: CURRENT_VERSION,
            metadata,
            components: self
                .slots
                .iter()
                .map(|slot| ComponentRecord {
                    id: slot.id.clone(),
                    kind: slot.kind.as_str().to_string(),
                    properties: slot.device.props(),
                    position: slot.position,
                })
                .collect(),
            wires: self.world.wires.clone(),
            simulation: SimulationSettings {
                running: self.running,
                time: self.world.now_ms,
                time_scale: self.world.config.time_scale,
                seed: self.world.config.seed,
            },
        }
    }

    pub fn export_document(&self) -> Result<Value, SimError> {
        Ok(self.to_document().to_value()?)
    }
}
