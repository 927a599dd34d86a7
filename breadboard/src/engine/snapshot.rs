//! Frames reported to the outside after a tick.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::Engine;
use crate::circuit::netlist::PinRef;
use crate::circuit::resolver::NetClass;
use crate::circuit::{ComponentKey, ComponentState, Endpoint, NetId, SimulationState};
use crate::core::SimError;
use crate::diagnostics::Warning;
use crate::schema::CURRENT_VERSION;

/// Resolved value of one net.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetReport {
    pub id: NetId,
    pub voltage: Option<f64>,
    pub level: bool,
    pub class: NetClass,
    /// `None` when floating.
    pub source_ohms: Option<f64>,
    pub members: Vec<Endpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub state: SimulationState,
    pub warnings: Vec<Warning>,
    pub nets: Vec<NetReport>,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn net_containing(&self, endpoint: &Endpoint) -> Option<&NetReport> {
        self.nets.iter().find(|net| net.members.contains(endpoint))
    }
}

impl Engine {
    pub fn state(&self) -> SimulationState {
        let layout_position: HashMap<ComponentKey, usize> = self
            .world
            .layout
            .iter()
            .enumerate()
            .map(|(position, (key, _, _))| (*key, position))
            .collect();

        let components = self
            .slots
            .iter()
            .map(|slot| {
                let mut pins = BTreeMap::new();
                if let Some(&component) = layout_position.get(&slot.key) {
                    for (pin, name) in slot.kind.pin_names().iter().enumerate() {
                        if let Some(net) = self.world.netlist.net_of(PinRef { component, pin }) {
                            pins.insert(name.to_string(), net);
                        }
                    }
                }
                ComponentState {
                    id: slot.id.clone(),
                    kind: slot.kind,
                    properties: slot.device.props(),
                    pins,
                    outputs: slot.device.outputs(),
                    faulted: slot.faulted,
                    position: slot.position,
                }
            })
            .collect();

        SimulationState {
            components,
            wires: self.world.wires.clone(),
            running: self.running,
            sim_time_ms: self.world.now_ms,
            time_scale: self.world.config.time_scale,
            seed: self.world.config.seed,
            schema_version: CURRENT_VERSION,
            rng_state: self.world.rng.state(),
        }
    }

    /// Nets as of the last rebuild. Edits applied with [`Engine::apply`] show
    /// up after the next tick or paused [`Engine::step`].
    pub fn net_reports(&self) -> Vec<NetReport> {
        let threshold = self.world.config.logic_threshold_v;
        self.world
            .netlist
            .nets()
            .iter()
            .map(|net| {
                let resolved = self.world.resolution.net(net.id);
                NetReport {
                    id: net.id,
                    voltage: resolved.and_then(|s| s.voltage),
                    level: resolved.map(|s| s.level(threshold)).unwrap_or(false),
                    class: resolved.map(|s| s.class).unwrap_or(NetClass::Floating),
                    source_ohms: resolved
                        .map(|s| s.source_ohms)
                        .filter(|ohms| ohms.is_finite()),
                    members: self.world.members(net.id),
                }
            })
            .collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state(),
            warnings: self.warnings().to_vec(),
            nets: self.net_reports(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ComponentKind, Reading};

    #[test]
    fn test_snapshot_reports_pins_and_nets() {
        let mut engine = Engine::with_seed(3);
        engine.add_component("bat", ComponentKind::Battery).unwrap();
        engine.add_component("r1", ComponentKind::Resistor).unwrap();
        engine.connect("bat:+", "r1:a").unwrap();
        engine.connect("bat:-", "r1:b").unwrap();
        engine.run_ticks(2);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.state.sim_time_ms, 2);
        assert_eq!(snapshot.state.schema_version, CURRENT_VERSION);

        let battery = snapshot.state.component("bat").unwrap();
        assert_eq!(battery.pins.len(), 2);
        let resistor = snapshot.state.component("r1").unwrap();
        assert_eq!(resistor.pins["a"], battery.pins["+"]);

        let high = snapshot.net_containing(&Endpoint::new("r1", "a")).unwrap();
        assert_eq!(high.voltage, Some(5.0));
        assert_eq!(high.class, NetClass::Power);
        assert!(high.level);
        assert_eq!(snapshot.nets.len(), 2);
        assert!(matches!(
            resistor.outputs.get("currentMa"),
            Some(Reading::Number(ma)) if (*ma - 5.0 / 220.0 * 1000.0).abs() < 1e-6
        ));
    }

    #[test]
    fn test_snapshot_json_has_camel_case_keys() {
        let mut engine = Engine::with_seed(3);
        engine.add_component("sw", ComponentKind::ToggleSwitch).unwrap();
        engine.run_ticks(1);
        let json = engine.snapshot().to_json().unwrap();
        assert!(json.contains("\"simTimeMs\":1"));
        assert!(json.contains("\"sourceOhms\":null"));
        assert!(json.contains("\"rngState\""));
    }
}
