//! Document migration, validation and persistence round trips.

use breadboard::prelude::*;
use breadboard::schema::{self, document_version, IssueKind, LEGACY_VERSION};
use breadboard::MigrationError;
use serde_json::{json, Value};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load_fixture(name: &str) -> Value {
    let text = std::fs::read_to_string(fixture_path(name)).expect("fixture should exist");
    serde_json::from_str(&text).expect("fixture should be valid JSON")
}

#[test]
fn test_legacy_document_migrates_and_validates() {
    let legacy = load_fixture("legacy_v1.json");
    assert_eq!(document_version(&legacy).unwrap(), LEGACY_VERSION);

    let migrated = migrate(legacy).unwrap();
    assert_eq!(migrated["schemaVersion"], CURRENT_VERSION);
    assert!(validate_schema(&migrated).is_empty(), "{:?}", validate_schema(&migrated));
    assert_eq!(migrated["components"][1]["kind"], "push_button");
    assert_eq!(migrated["wires"][1]["color"], "#2f80ed");

    let engine = Engine::from_document(migrated, EngineConfig::default()).unwrap();
    let exported = engine.export_document().unwrap();
    assert!(validate_schema(&exported).is_empty());
    assert_eq!(exported["metadata"]["name"], "Doorbell");
    assert_eq!(exported["wires"].as_array().unwrap().len(), 4);
}

#[test]
fn test_migration_is_a_no_op_at_current_version() {
    let current = load_fixture("night_light.json");
    assert_eq!(migrate(current.clone()).unwrap(), current);
}

#[test]
fn test_newer_documents_are_refused() {
    let err = migrate(load_fixture("from_the_future.json")).unwrap_err();
    assert_eq!(
        err,
        MigrationError::Unsupported {
            version: 99,
            current: CURRENT_VERSION
        }
    );

    let err = Engine::from_document(load_fixture("from_the_future.json"), EngineConfig::default())
        .unwrap_err();
    assert!(matches!(err, SimError::Migration(_)));
}

#[test]
fn test_broken_references_are_listed() {
    let document = load_fixture("broken_reference.json");
    let issues = schema::validate_document(&document);
    assert_eq!(issues.len(), 3, "{:?}", issues);
    assert!(issues.iter().all(|issue| issue.kind == IssueKind::Reference));

    let messages = validate_schema(&document).join("\n");
    assert!(messages.contains("capacitor"));
    assert!(messages.contains("ghost"));
    assert!(messages.contains("wires[1].to"));

    let (engine, tolerated) =
        Engine::from_document_lenient(document, EngineConfig::default()).unwrap();
    assert_eq!(tolerated.len(), 3);
    assert_eq!(engine.component_ids(), vec!["bat"]);
    assert!(engine.wires().is_empty());
}

#[test]
fn test_export_to_disk_and_reload() {
    let mut engine =
        Engine::from_document(load_fixture("night_light.json"), EngineConfig::default()).unwrap();
    engine.insert_junction("w3").unwrap();
    engine
        .set_property("r1", "resistance", json!(330.0))
        .unwrap();
    engine.run_ticks(12);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("night_light.json");
    let text = serde_json::to_string_pretty(&engine.export_document().unwrap()).unwrap();
    std::fs::write(&path, text).unwrap();

    let reloaded: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(validate_schema(&reloaded).is_empty());
    assert_eq!(reloaded["metadata"]["id"], "3f1c9a52-8d7e-4b21-9f0a-6c2d41e8b7a3");
    assert_eq!(reloaded["simulation"]["time"], 12);

    let mut restored = Engine::from_document(reloaded, EngineConfig::default()).unwrap();
    assert_eq!(restored.now_ms(), 12);
    assert_eq!(restored.seed(), 42);
    assert_eq!(restored.wires(), engine.wires());
    assert_eq!(restored.properties("r1").unwrap()["resistance"], 330.0);
    assert_eq!(restored.kind_of("j1"), Some(ComponentKind::Junction));

    restored.run_ticks(3);
    assert_eq!(restored.output("led1", "on"), Some(Reading::Bool(true)));
}

#[test]
fn test_engine_config_file_overrides_defaults() {
    let config = EngineConfig::from_json_file(&fixture_path("engine_config.json")).unwrap();
    assert_eq!(config.diagnostics_policy, DiagnosticsPolicy::Persistent);
    assert_eq!(config.interrupt_latency_steps(), 2);
    assert_eq!(config.time_scale, 1.0);

    let mut engine =
        Engine::from_document(load_fixture("short_circuit.json"), config).unwrap();
    engine.run_ticks(4);
    assert_eq!(engine.warning_count(WarningCode::ShortCircuit), 4);
}
