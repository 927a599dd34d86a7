//! End-to-end behavior of the tick engine through its public API.

use breadboard::prelude::*;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

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

fn engine_from(name: &str) -> Engine {
    Engine::from_document(load_fixture(name), EngineConfig::default())
        .expect("fixture should load")
}

fn number(reading: Option<Reading>) -> f64 {
    match reading {
        Some(Reading::Number(value)) => value,
        other => panic!("expected a number, got {:?}", other),
    }
}

/// Reads a floating analog pin and flickers the built-in LED with it.
struct Flicker;

impl Firmware for Flicker {
    fn setup(&mut self, io: &mut McuIo<'_>) {
        io.pin_mode(13, PinMode::Output);
        io.pin_mode(7, PinMode::Input);
    }

    fn tick(&mut self, io: &mut McuIo<'_>) {
        let noise = io.analog_read(16);
        io.digital_write(13, noise > 511 || io.digital_read(7));
    }
}

fn scripted_run(seed: u32) -> String {
    let mut document = load_fixture("night_light.json");
    document["simulation"]["seed"] = json!(seed);
    let mut engine = Engine::from_document(document, EngineConfig::default()).unwrap();
    engine.add_component("uno", ComponentKind::Microcontroller).unwrap();
    engine.add_component("btn", ComponentKind::PushButton).unwrap();
    engine.connect("btn:1a", "uno:D2").unwrap();
    engine.connect("btn:2a", "uno:GND").unwrap();
    engine.install_firmware("uno", Box::new(Flicker)).unwrap();

    for round in 0..8u64 {
        engine.run_ticks(3 + round);
        engine.submit(Edit::Input {
            component: "btn".into(),
            input: if round % 2 == 0 {
                DeviceInput::Press
            } else {
                DeviceInput::Release
            },
        });
        if round == 4 {
            engine.toggle("sw").unwrap();
        }
    }
    engine.run_ticks(25);
    engine.snapshot().to_json().unwrap()
}

#[test]
fn test_snapshot_is_reproducible_for_a_seed() {
    let first = scripted_run(42);
    let second = scripted_run(42);
    assert_eq!(first, second, "same seed and edits must give identical snapshots");
    assert_ne!(first, scripted_run(1234));
}

#[test]
fn test_net_rebuild_is_idempotent() {
    let mut engine = engine_from("night_light.json");
    engine.run_ticks(2);
    let first = engine.compute_nets();
    let second = engine.compute_nets();
    assert_eq!(first, second);

    let junction = engine.insert_junction("w3").unwrap();
    engine.run_ticks(1);
    let with_junction = engine.compute_nets();
    assert_eq!(with_junction, engine.compute_nets());
    let anode_net = with_junction
        .iter()
        .find(|net| net.contains(&Endpoint::new("led1", "anode")))
        .unwrap();
    assert!(anode_net.contains(&Endpoint::new(junction.as_str(), "node")));
    assert!(anode_net.contains(&Endpoint::new("r1", "b")));
}

#[test]
fn test_supply_wired_to_ground_is_one_short() {
    let mut engine = engine_from("short_circuit.json");
    engine.run_ticks(1);

    let shorts: Vec<&Warning> = engine
        .warnings()
        .iter()
        .filter(|w| w.code == WarningCode::ShortCircuit)
        .collect();
    assert_eq!(shorts.len(), 1);
    assert_eq!(shorts[0].severity, Severity::Error);
    assert_eq!(shorts[0].net_id, engine.net_of("bat", "+"));
    assert_eq!(engine.voltage_at("bat", "+"), Some(0.0));
    assert_eq!(shorts[0].timestamp, 0);
}

#[test]
fn test_led_without_resistor_is_clamped() {
    let mut engine = engine_from("led_no_resistor.json");
    engine.run_ticks(10);

    assert_eq!(engine.warning_count(WarningCode::LedNoResistor), 1);
    assert_eq!(engine.output("led1", "on"), Some(Reading::Bool(true)));
    assert_eq!(number(engine.output("led1", "brightness")), 1.0);
    assert_eq!(number(engine.output("led1", "currentMa")), 20.0);
}

#[test]
fn test_parallel_wires_make_one_net() {
    let mut engine = Engine::with_seed(3);
    engine.add_component("bat", ComponentKind::Battery).unwrap();
    engine.add_component("r1", ComponentKind::Resistor).unwrap();
    for id in ["a", "b"] {
        engine.submit(Edit::AddWire {
            wire: Wire::new(id, Endpoint::new("bat", "+"), Endpoint::new("r1", "a")),
        });
    }
    engine.connect("r1:b", "bat:-").unwrap();
    engine.run_ticks(3);

    assert!(engine.take_edit_errors().is_empty());
    assert_eq!(engine.wires().len(), 3);
    let nets = engine.compute_nets();
    let joined: Vec<_> = nets
        .iter()
        .filter(|net| net.contains(&Endpoint::new("r1", "a")))
        .collect();
    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0].len(), 2);
    assert!(engine.warnings().is_empty());
}

struct FallingCounter(Arc<AtomicUsize>);

impl Firmware for FallingCounter {
    fn setup(&mut self, io: &mut McuIo<'_>) {
        io.pin_mode(2, PinMode::InputPullup);
        io.attach_interrupt(2, EdgeMode::Change);
    }

    fn tick(&mut self, _io: &mut McuIo<'_>) {}

    fn on_interrupt(&mut self, _pin: u8, _edge: Edge, _io: &mut McuIo<'_>) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn debounce_bench() -> (Engine, Arc<AtomicUsize>) {
    let mut engine = Engine::with_seed(99);
    engine.add_component("uno", ComponentKind::Microcontroller).unwrap();
    engine
        .add_component_with("btn", ComponentKind::PushButton, json!({ "bounceMs": 10, "jitterMs": 2 }))
        .unwrap();
    engine.connect("btn:1a", "uno:D2").unwrap();
    engine.connect("btn:2a", "uno:GND").unwrap();
    let edges = Arc::new(AtomicUsize::new(0));
    engine
        .install_firmware("uno", Box::new(FallingCounter(edges.clone())))
        .unwrap();
    engine.run_ticks(5);
    (engine, edges)
}

#[test]
fn test_quick_press_and_release_settles_open() {
    let (mut engine, edges) = debounce_bench();
    engine.press("btn").unwrap();
    engine.run_ticks(3);
    engine.release("btn").unwrap();
    engine.run_ticks(30);

    assert_eq!(engine.output("btn", "closed"), Some(Reading::Bool(false)));
    assert_eq!(engine.output("btn", "bouncing"), Some(Reading::Bool(false)));
    assert!(engine.level_at("uno", "D2"));
    assert_eq!(edges.load(Ordering::SeqCst), 0);
}

#[test]
fn test_chattering_press_yields_one_edge_per_settled_change() {
    let (mut engine, edges) = debounce_bench();
    for _ in 0..4 {
        engine.press("btn").unwrap();
        engine.run_ticks(2);
        engine.release("btn").unwrap();
        engine.run_ticks(2);
    }
    engine.press("btn").unwrap();
    engine.run_ticks(30);
    assert_eq!(engine.output("btn", "closed"), Some(Reading::Bool(true)));
    assert!(!engine.level_at("uno", "D2"));
    assert_eq!(edges.load(Ordering::SeqCst), 1);

    engine.release("btn").unwrap();
    engine.run_ticks(30);
    assert_eq!(edges.load(Ordering::SeqCst), 2);
}

struct Crashes;

impl Firmware for Crashes {
    fn setup(&mut self, io: &mut McuIo<'_>) {
        io.pin_mode(13, PinMode::Output);
    }

    fn tick(&mut self, io: &mut McuIo<'_>) {
        if io.millis() == 4 {
            panic!("firmware bug");
        }
    }
}

#[test]
fn test_crashing_firmware_does_not_stop_the_clock() {
    let mut engine = engine_from("night_light.json");
    engine.add_component("uno", ComponentKind::Microcontroller).unwrap();
    engine.install_firmware("uno", Box::new(Crashes)).unwrap();
    engine.run_ticks(5);

    assert!(engine.is_faulted("uno"));
    assert_eq!(engine.warning_count(WarningCode::ComponentFault), 1);
    engine.run_ticks(10);
    assert_eq!(engine.now_ms(), 15);
    assert_eq!(engine.output("led1", "on"), Some(Reading::Bool(true)));

    let snapshot = engine.snapshot();
    assert!(snapshot.state.component("uno").unwrap().faulted);
}

#[test]
fn test_night_light_current_through_resistor() {
    let mut engine = engine_from("night_light.json");
    engine.run_ticks(5);
    assert!(engine.warnings().is_empty(), "{:?}", engine.warnings());
    let brightness = number(engine.output("led1", "brightness"));
    let expected = (5.0 - 2.0) / 220.0 * 1000.0 / 20.0;
    assert!((brightness - expected).abs() < 1e-9, "brightness {}", brightness);

    engine.toggle("sw").unwrap();
    engine.run_ticks(3);
    assert_eq!(engine.output("led1", "on"), Some(Reading::Bool(false)));
}

#[test]
fn test_batteries_at_different_voltages_in_parallel_short() {
    let mut engine = Engine::with_seed(8);
    engine
        .add_component_with("b9", ComponentKind::Battery, json!({ "voltage": 9.0, "nominalVoltage": 9.0 }))
        .unwrap();
    engine.add_component("b5", ComponentKind::Battery).unwrap();
    engine.connect("b9:+", "b5:+").unwrap();
    engine.connect("b9:-", "b5:-").unwrap();
    engine.run_ticks(3);

    assert_eq!(engine.warning_count(WarningCode::ShortCircuit), 1);
    assert_eq!(engine.voltage_at("b5", "+"), Some(0.0));
    assert_eq!(engine.voltage_at("b9", "-"), Some(0.0));

    engine.set_property("b9", "voltage", json!(5.0)).unwrap();
    engine.run_ticks(1);
    assert_eq!(engine.warning_count(WarningCode::ShortCircuit), 0);
    assert_eq!(engine.voltage_at("b9", "+"), Some(5.0));
}
