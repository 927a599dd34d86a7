//! Breadboard - deterministic breadboard circuit simulation
//!
//! This library emulates a small breadboard circuit (a microcontroller plus
//! switches, LEDs, resistors, sensors, motors and buzzers) closely enough to
//! exercise a control program against it, with hazards such as shorts and
//! floating inputs reported as warnings. For a given seed the same edits and
//! tick count always produce the same snapshot.
//!
//! # Quick Start
//!
//! ```
//! use breadboard::{ComponentKind, Engine, WarningCode};
//!
//! let mut engine = Engine::with_seed(42);
//! engine.add_component("bat", ComponentKind::Battery).unwrap();
//! engine.add_component("led1", ComponentKind::Led).unwrap();
//! engine.connect("bat:+", "led1:anode").unwrap();
//! engine.connect("led1:cathode", "bat:-").unwrap();
//!
//! engine.run_ticks(10);
//! assert_eq!(engine.warning_count(WarningCode::LedNoResistor), 1);
//!
//! let snapshot = engine.snapshot();
//! println!("{}", snapshot.to_json_pretty().unwrap());
//! ```
//!
//! # Layout
//!
//! - [`components`]: the device contract and every built-in part
//! - [`circuit`]: wires, nets and voltage resolution
//! - [`engine`]: the tick loop, scheduler, edits and snapshots
//! - [`schema`]: versioned documents, migration and validation
//! - [`telemetry`]: per-device state topics for publishers
//! - [`host`]: an engine running on a tokio task

pub mod circuit;
pub mod components;
pub mod core;
pub mod diagnostics;
pub mod engine;
pub mod host;
pub mod rng;
pub mod schema;
pub mod telemetry;

/// Convenience re-exports for applications and tests.
pub mod prelude {
    pub use crate::circuit::{Endpoint, SimulationState, Wire};
    pub use crate::components::{
        ComponentKind, DeviceInput, Edge, EdgeMode, Firmware, McuIo, PinMode, Reading,
    };
    pub use crate::core::{DiagnosticsPolicy, EngineConfig, SimError};
    pub use crate::diagnostics::{Severity, Warning, WarningCode};
    pub use crate::engine::{Edit, Engine, Snapshot};
    pub use crate::rng::SeededRng;
    pub use crate::schema::{migrate, validate_schema, CircuitDocument, CURRENT_VERSION};
}

pub use crate::core::{DiagnosticsPolicy, EngineConfig, SimError, DEFAULT_SEED};
pub use circuit::{ComponentState, Endpoint, NetId, Point, SimulationState, Wire};
pub use components::{
    ComponentKind, Device, DeviceError, DeviceInput, Edge, EdgeMode, Firmware, McuIo, PinMode,
    Reading,
};
pub use diagnostics::{Severity, Warning, WarningCode};
pub use engine::{Edit, EditOutcome, Engine, NetReport, Snapshot};
pub use host::SimulationHost;
pub use rng::SeededRng;
pub use schema::{migrate, validate_schema, CircuitDocument, MigrationError, CURRENT_VERSION};
pub use telemetry::TelemetryView;
