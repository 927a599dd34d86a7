//! Engine-wide error type and configuration.
//! Shared by the library, the async host and the CLI.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::schema::MigrationError;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("Unknown component: {0}")]
    UnknownComponent(String),
    #[error("Component id already in use: {0}")]
    DuplicateComponent(String),
    #[error("Unknown wire: {0}")]
    UnknownWire(String),
    #[error("Wire id already in use: {0}")]
    DuplicateWire(String),
    #[error("Unknown component kind: {0}")]
    UnknownKind(String),
    #[error("Component {0} is not a junction")]
    NotAJunction(String),
    #[error("Invalid endpoint '{0}', expected component:pin")]
    InvalidEndpoint(String),
    #[error("Component {component} rejected edit: {source}")]
    Device {
        component: String,
        #[source]
        source: crate::components::DeviceError,
    },
    #[error("Invalid document: {}", .0.join("; "))]
    InvalidDocument(Vec<String>),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Simulation host has shut down")]
    HostClosed,
}

/// Retention policy for the diagnostics log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticsPolicy {
    /// Warnings are cleared at the start of every tick.
    #[default]
    PerTick,
    /// Warnings accumulate until the caller drains them.
    Persistent,
}

pub const DEFAULT_SEED: u32 = 0x5EED_2024;

/// Options for an engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub seed: u32,
    pub time_scale: f64,
    pub diagnostics_policy: DiagnosticsPolicy,
    /// Voltage at or above which a net reads as logic high.
    pub logic_threshold_v: f64,
    /// Voltage written by `set_level(true)`.
    pub logic_high_v: f64,
    /// Fraction of a supply's nominal voltage below which it is browned out.
    pub brownout_ratio: f64,
    pub interrupt_latency_us: u32,
    /// Internal pull-up resistance of microcontroller inputs.
    pub pullup_ohms: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            time_scale: 1.0,
            diagnostics_policy: DiagnosticsPolicy::PerTick,
            logic_threshold_v: 1.5,
            logic_high_v: 5.0,
            brownout_ratio: 0.9,
            interrupt_latency_us: 100,
            pullup_ohms: 35_000.0,
        }
    }
}

impl EngineConfig {
    /// Load a config from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.time_scale.is_finite() && self.time_scale > 0.0) {
            return Err(SimError::Config(format!(
                "timeScale must be a positive number, got {}",
                self.time_scale
            )));
        }
        if !(0.0..=1.0).contains(&self.brownout_ratio) {
            return Err(SimError::Config(format!(
                "brownoutRatio must be within 0..=1, got {}",
                self.brownout_ratio
            )));
        }
        if !(self.pullup_ohms.is_finite() && self.pullup_ohms > 0.0) {
            return Err(SimError::Config("pullupOhms must be positive".to_string()));
        }
        if !(self.logic_threshold_v.is_finite() && self.logic_high_v > self.logic_threshold_v) {
            return Err(SimError::Config(
                "logicHighV must be above logicThresholdV".to_string(),
            ));
        }
        Ok(())
    }

    /// Interrupt latency in whole logical steps (rounded up, at least one).
    pub fn interrupt_latency_steps(&self) -> u64 {
        ((u64::from(self.interrupt_latency_us) + 999) / 1000).max(1)
    }
}
