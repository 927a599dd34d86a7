//! Voltage/state resolution.
//!
//! Assigns every net a value from the pin roles and drives on it, in
//! priority order:
//!
//! 1. ideal drives (`ohms == 0`) win; an ideal drive that disagrees with
//!    another one or with a supply or ground pin on the net is a short,
//! 2. a power source and a ground source together are a short (0 V), as are
//!    two supplies at different voltages,
//! 3. a single source class sets the level (power may brown out),
//! 4. weak drives and pull-ups combine as parallel Thevenin sources,
//! 5. anything else floats; floating digital inputs read seeded noise.
//!
//! The resolver never loops to a fixed point; the engine calls it twice per
//! tick.

use serde::Serialize;

use super::netlist::{Netlist, PinRef};
use super::NetId;
use crate::components::PinRole;
use crate::core::EngineConfig;
use crate::diagnostics::WarningCode;
use crate::rng::SeededRng;

/// Drives weaker than this are treated as open circuits.
pub const MAX_DRIVE_OHMS: f64 = 1.0e7;

/// Ideal drives closer than this are considered equal.
const DRIVE_TOLERANCE_V: f64 = 1.0e-6;

/// A voltage placed on a pin for the current tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drive {
    pub voltage: f64,
    /// Series resistance; zero for an ideal output.
    pub ohms: f64,
}

impl Drive {
    pub fn ideal(voltage: f64) -> Self {
        Self { voltage, ohms: 0.0 }
    }

    pub fn through(voltage: f64, ohms: f64) -> Self {
        Self {
            voltage,
            ohms: ohms.max(0.0),
        }
    }

    pub fn is_ideal(&self) -> bool {
        self.ohms <= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetClass {
    Driven,
    Short,
    Power,
    Ground,
    Pulled,
    Floating,
}

/// Weak contribution kept for external views.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeakSource {
    /// Component position of the owner; `None` for internal pull-ups.
    pub owner: Option<usize>,
    pub voltage: f64,
    pub ohms: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetState {
    pub voltage: Option<f64>,
    /// Thevenin resistance behind `voltage`; infinite when floating.
    pub source_ohms: f64,
    pub class: NetClass,
    /// Logic level of a floating net.
    pub noise: bool,
    pub weak: Vec<WeakSource>,
}

impl NetState {
    fn floating(noise: bool) -> Self {
        Self {
            voltage: None,
            source_ohms: f64::INFINITY,
            class: NetClass::Floating,
            noise,
            weak: Vec::new(),
        }
    }

    fn stiff(voltage: f64, class: NetClass) -> Self {
        Self {
            voltage: Some(voltage),
            source_ohms: 0.0,
            class,
            noise: false,
            weak: Vec::new(),
        }
    }

    pub fn level(&self, threshold_v: f64) -> bool {
        match self.voltage {
            Some(v) => v >= threshold_v,
            None => self.noise,
        }
    }
}

/// What a component sees on a net once its own weak drives are removed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetView {
    pub voltage: Option<f64>,
    pub ohms: f64,
}

impl NetView {
    pub const FLOATING: NetView = NetView {
        voltage: None,
        ohms: f64::INFINITY,
    };

    pub fn is_stiff(&self) -> bool {
        self.voltage.is_some() && self.ohms <= 0.0
    }
}

/// An electrical hazard found while resolving.
#[derive(Debug, Clone, PartialEq)]
pub struct Hazard {
    pub code: WarningCode,
    pub net: NetId,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    nets: Vec<NetState>,
}

impl Resolution {
    pub fn net(&self, id: NetId) -> Option<&NetState> {
        self.nets.get(id as usize)
    }

    pub fn nets(&self) -> &[NetState] {
        &self.nets
    }

    pub fn voltage(&self, id: NetId) -> Option<f64> {
        self.net(id).and_then(|n| n.voltage)
    }

    pub fn level(&self, id: NetId, threshold_v: f64) -> bool {
        self.net(id).map(|n| n.level(threshold_v)).unwrap_or(false)
    }

    pub fn source_ohms(&self, id: NetId) -> f64 {
        self.net(id).map(|n| n.source_ohms).unwrap_or(f64::INFINITY)
    }

    /// The net as seen by `owner`, excluding its own weak drives.
    pub fn external_view(&self, id: NetId, owner: usize) -> NetView {
        let Some(state) = self.net(id) else {
            return NetView::FLOATING;
        };
        if state.class != NetClass::Pulled {
            return NetView {
                voltage: state.voltage,
                ohms: state.source_ohms,
            };
        }
        thevenin(state.weak.iter().filter(|w| w.owner != Some(owner)))
            .map(|(voltage, ohms)| NetView {
                voltage: Some(voltage),
                ohms,
            })
            .unwrap_or(NetView::FLOATING)
    }
}

fn thevenin<'a>(sources: impl Iterator<Item = &'a WeakSource>) -> Option<(f64, f64)> {
    let mut conductance = 0.0;
    let mut current = 0.0;
    for source in sources {
        let g = 1.0 / source.ohms;
        conductance += g;
        current += source.voltage * g;
    }
    if conductance > 0.0 {
        Some((current / conductance, 1.0 / conductance))
    } else {
        None
    }
}

/// Resolve every net of `netlist`.
///
/// `roles[c][p]` is the role of pin `p` on the component at position `c`;
/// `drives` are the pin drives in effect for this pass.
pub fn resolve(
    netlist: &Netlist,
    roles: &[Vec<PinRole>],
    drives: &[(PinRef, Drive)],
    config: &EngineConfig,
    rng: &mut SeededRng,
) -> (Resolution, Vec<Hazard>) {
    let mut per_net: Vec<Vec<(PinRef, Drive)>> = vec![Vec::new(); netlist.len()];
    for (pin, drive) in drives {
        if drive.ohms > MAX_DRIVE_OHMS || !drive.voltage.is_finite() {
            continue;
        }
        if let Some(net) = netlist.net_of(*pin) {
            per_net[net as usize].push((*pin, *drive));
        }
    }

    let mut states = Vec::with_capacity(netlist.len());
    let mut hazards = Vec::new();

    for net in netlist.nets() {
        let role_of = |pin: &PinRef| {
            roles
                .get(pin.component)
                .and_then(|r| r.get(pin.pin))
                .copied()
                .unwrap_or(PinRole::Passive)
        };
        let net_drives = &per_net[net.id as usize];

        let mut supplies: Vec<(f64, f64)> = Vec::new();
        let mut has_ground = false;
        let mut has_digital_input = false;
        let mut weak: Vec<WeakSource> = Vec::new();
        for member in &net.members {
            match role_of(member) {
                PinRole::PowerSource { voltage, nominal } => supplies.push((voltage, nominal)),
                PinRole::Ground => has_ground = true,
                PinRole::PullUpInput { rail_v } => {
                    has_digital_input = true;
                    weak.push(WeakSource {
                        owner: None,
                        voltage: rail_v,
                        ohms: config.pullup_ohms,
                    });
                }
                PinRole::DigitalInput => has_digital_input = true,
                PinRole::Passive | PinRole::DigitalOutput => {}
            }
        }

        // Rails are stiff drivers too: an output tied to one must agree with it.
        let ideal: Vec<f64> = net_drives
            .iter()
            .filter(|(_, d)| d.is_ideal())
            .map(|(_, d)| d.voltage)
            .collect();
        if let Some(&first) = ideal.first() {
            let rails = supplies
                .iter()
                .map(|&(voltage, _)| voltage)
                .chain(has_ground.then_some(0.0));
            if ideal
                .iter()
                .copied()
                .chain(rails)
                .all(|v| (v - first).abs() <= DRIVE_TOLERANCE_V)
            {
                states.push(NetState::stiff(first, NetClass::Driven));
            } else {
                let message = if supplies.is_empty() && !has_ground {
                    format!("Net {} is driven to conflicting levels by two outputs", net.id)
                } else {
                    format!("Net {} ties an output to a supply rail at another level", net.id)
                };
                hazards.push(Hazard {
                    code: WarningCode::ShortCircuit,
                    net: net.id,
                    message,
                });
                states.push(NetState::stiff(0.0, NetClass::Short));
            }
            continue;
        }

        if let Some(&(first, _)) = supplies.first() {
            if supplies
                .iter()
                .any(|&(voltage, _)| (voltage - first).abs() > DRIVE_TOLERANCE_V)
            {
                hazards.push(Hazard {
                    code: WarningCode::ShortCircuit,
                    net: net.id,
                    message: format!("Net {} ties together supplies at different voltages", net.id),
                });
                states.push(NetState::stiff(0.0, NetClass::Short));
                continue;
            }
        }
        let power = supplies.first().copied();

        match (power, has_ground) {
            (Some(_), true) => {
                hazards.push(Hazard {
                    code: WarningCode::ShortCircuit,
                    net: net.id,
                    message: format!("Net {} connects a supply directly to ground", net.id),
                });
                states.push(NetState::stiff(0.0, NetClass::Short));
                continue;
            }
            (Some((voltage, nominal)), false) => {
                if voltage > 0.0 && voltage < nominal * config.brownout_ratio {
                    hazards.push(Hazard {
                        code: WarningCode::Brownout,
                        net: net.id,
                        message: format!(
                            "Supply on net {} is at {:.2} V, below {:.0}% of its nominal {:.2} V",
                            net.id,
                            voltage,
                            config.brownout_ratio * 100.0,
                            nominal
                        ),
                    });
                }
                states.push(NetState::stiff(voltage, NetClass::Power));
                continue;
            }
            (None, true) => {
                states.push(NetState::stiff(0.0, NetClass::Ground));
                continue;
            }
            (None, false) => {}
        }

        weak.extend(net_drives.iter().map(|(pin, drive)| WeakSource {
            owner: Some(pin.component),
            voltage: drive.voltage,
            ohms: drive.ohms,
        }));
        if let Some((voltage, ohms)) = thevenin(weak.iter()) {
            states.push(NetState {
                voltage: Some(voltage),
                source_ohms: ohms,
                class: NetClass::Pulled,
                noise: false,
                weak,
            });
            continue;
        }

        if has_digital_input {
            let noise = rng.next() < 0.5;
            hazards.push(Hazard {
                code: WarningCode::FloatingInput,
                net: net.id,
                message: format!("Digital input on net {} is floating and reads noise", net.id),
            });
            states.push(NetState::floating(noise));
        } else {
            states.push(NetState::floating(false));
        }
    }

    (Resolution { nets: states }, hazards)
}
