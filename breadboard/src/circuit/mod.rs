//! Circuit data model: wires, endpoints and the state the engine reports.
//!
//! Nets are derived in [`netlist`] and given electrical meaning in
//! [`resolver`].

pub mod netlist;
pub mod resolver;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::components::{ComponentKind, Outputs};

/// Identifier of a net within one build. Stable in membership, not across edits.
pub type NetId = u32;

/// Stable arena handle of a component inside an engine.
///
/// Unlike positions in the component list, keys survive removal of other
/// components, so scheduled callbacks and drives can refer to them safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentKey(pub u32);

/// One end of a wire: a named pin on a named component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    pub component: String,
    pub pin: String,
}

impl Endpoint {
    pub fn new(component: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            pin: pin.into(),
        }
    }

    /// Parse the `"component:pin"` shorthand.
    pub fn parse(text: &str) -> Option<Self> {
        let (component, pin) = text.rsplit_once(':')?;
        if component.is_empty() || pin.is_empty() {
            return None;
        }
        Some(Self::new(component, pin))
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.component, self.pin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

pub const DEFAULT_WIRE_COLOR: &str = "#2f855a";

fn default_wire_color() -> String {
    DEFAULT_WIRE_COLOR.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wire {
    pub id: String,
    pub from: Endpoint,
    pub to: Endpoint,
    /// Cosmetic only.
    #[serde(default = "default_wire_color")]
    pub color: String,
    /// Cosmetic waypoints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub route: Vec<Point>,
}

impl Wire {
    pub fn new(id: impl Into<String>, from: Endpoint, to: Endpoint) -> Self {
        Self {
            id: id.into(),
            from,
            to,
            color: default_wire_color(),
            route: Vec::new(),
        }
    }

    pub fn touches(&self, component: &str) -> bool {
        self.from.component == component || self.to.component == component
    }
}

/// Reported view of one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentState {
    pub id: String,
    pub kind: ComponentKind,
    pub properties: Value,
    /// Pin name to net id, filled by the last rebuild.
    pub pins: BTreeMap<String, NetId>,
    pub outputs: Outputs,
    pub faulted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
}

/// The root aggregate, as seen from outside the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    pub components: Vec<ComponentState>,
    pub wires: Vec<Wire>,
    pub running: bool,
    pub sim_time_ms: u64,
    pub time_scale: f64,
    pub seed: u32,
    pub schema_version: u32,
    pub rng_state: u32,
}

impl SimulationState {
    pub fn component(&self, id: &str) -> Option<&ComponentState> {
        self.components.iter().find(|c| c.id == id)
    }

    pub fn wire(&self, id: &str) -> Option<&Wire> {
        self.wires.iter().find(|w| w.id == id)
    }
}
