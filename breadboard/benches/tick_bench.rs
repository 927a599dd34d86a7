use breadboard::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use serde_json::Value;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load_fixture(name: &str) -> Value {
    let text = std::fs::read_to_string(fixture_path(name)).unwrap();
    serde_json::from_str(&text).unwrap()
}

struct Blink;

impl Firmware for Blink {
    fn setup(&mut self, io: &mut McuIo<'_>) {
        io.pin_mode(13, PinMode::Output);
        io.pin_mode(2, PinMode::InputPullup);
    }

    fn tick(&mut self, io: &mut McuIo<'_>) {
        let on = (io.millis() / 250) % 2 == 1;
        io.digital_write(13, on && io.digital_read(2));
    }
}

fn board() -> Engine {
    let mut engine =
        Engine::from_document(load_fixture("night_light.json"), EngineConfig::default()).unwrap();
    engine.add_component("uno", ComponentKind::Microcontroller).unwrap();
    engine.add_component("btn", ComponentKind::PushButton).unwrap();
    engine.add_component("r2", ComponentKind::Resistor).unwrap();
    engine.add_component("led2", ComponentKind::Led).unwrap();
    engine.connect("uno:D13", "r2:a").unwrap();
    engine.connect("r2:b", "led2:anode").unwrap();
    engine.connect("led2:cathode", "uno:GND").unwrap();
    engine.connect("btn:1a", "uno:D2").unwrap();
    engine.connect("btn:2a", "uno:GND").unwrap();
    engine.install_firmware("uno", Box::new(Blink)).unwrap();
    engine
}

fn bench_run_ticks(c: &mut Criterion) {
    c.bench_function("run_1000_ticks", |b| {
        b.iter_batched(
            board,
            |mut engine| {
                engine.run_ticks(black_box(1000));
                engine
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_compute_nets(c: &mut Criterion) {
    let mut engine = board();
    engine.run_ticks(1);
    c.bench_function("compute_nets", |b| b.iter(|| black_box(engine.compute_nets())));
}

fn bench_snapshot(c: &mut Criterion) {
    let mut engine = board();
    engine.run_ticks(100);
    c.bench_function("snapshot_to_json", |b| {
        b.iter(|| black_box(engine.snapshot().to_json().unwrap()))
    });
}

fn bench_migrate_legacy(c: &mut Criterion) {
    let legacy = load_fixture("legacy_v1.json");
    c.bench_function("migrate_legacy", |b| {
        b.iter(|| migrate(black_box(legacy.clone())).unwrap())
    });
}

criterion_group!(
    benches,
    bench_run_ticks,
    bench_compute_nets,
    bench_snapshot,
    bench_migrate_legacy
);
criterion_main!(benches);
