//! Component runtime contract and the built-in device variants.
//!
//! Every part placed on the board is a [`Device`]. A device only talks to the
//! rest of the circuit through the [`SimContext`] it is handed by the engine:
//! it reads resolved nets, drives its own pins, schedules timers, attaches
//! interrupts, registers internal bridges and raises warnings. Nothing else
//! is shared between devices, so each variant can be unit tested against a
//! fake context.
//!
//! The set of variants is closed ([`ComponentKind`]); [`registry`] maps each
//! kind to its constructor and default properties.

pub mod battery;
pub mod buzzer;
pub mod junction;
pub mod led;
pub mod microcontroller;
pub mod motor;
pub mod potentiometer;
pub mod registry;
pub mod resistor;
pub mod sensor;
pub mod switch;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::circuit::resolver::NetView;
use crate::circuit::NetId;
use crate::core::EngineConfig;
use crate::diagnostics::WarningCode;

pub use microcontroller::{Firmware, McuIo, PinMode};
pub use registry::{default_properties, instantiate};

/// Index of a pin within its component's pin list.
pub type PinIndex = usize;

/// Closed set of device variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Battery,
    Microcontroller,
    Led,
    Resistor,
    PushButton,
    ToggleSwitch,
    Potentiometer,
    Motor,
    Buzzer,
    TemperatureSensor,
    Junction,
}

const TWO_TERMINAL_POLARIZED: &[&str] = &["+", "-"];
const SWITCH_PINS: &[&str] = &["1a", "1b", "2a", "2b"];
const THREE_TERMINAL: &[&str] = &["vcc", "wiper", "gnd"];
const SENSOR_PINS: &[&str] = &["vcc", "out", "gnd"];

impl ComponentKind {
    pub const ALL: [ComponentKind; 11] = [
        ComponentKind::Battery,
        ComponentKind::Microcontroller,
        ComponentKind::Led,
        ComponentKind::Resistor,
        ComponentKind::PushButton,
        ComponentKind::ToggleSwitch,
        ComponentKind::Potentiometer,
        ComponentKind::Motor,
        ComponentKind::Buzzer,
        ComponentKind::TemperatureSensor,
        ComponentKind::Junction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Battery => "battery",
            ComponentKind::Microcontroller => "microcontroller",
            ComponentKind::Led => "led",
            ComponentKind::Resistor => "resistor",
            ComponentKind::PushButton => "push_button",
            ComponentKind::ToggleSwitch => "toggle_switch",
            ComponentKind::Potentiometer => "potentiometer",
            ComponentKind::Motor => "motor",
            ComponentKind::Buzzer => "buzzer",
            ComponentKind::TemperatureSensor => "temperature_sensor",
            ComponentKind::Junction => "junction",
        }
    }

    /// Logical pin names, in pin-index order.
    pub fn pin_names(&self) -> &'static [&'static str] {
        match self {
            ComponentKind::Battery | ComponentKind::Motor | ComponentKind::Buzzer => {
                TWO_TERMINAL_POLARIZED
            }
            ComponentKind::Microcontroller => microcontroller::PIN_NAMES,
            ComponentKind::Led => &["anode", "cathode"],
            ComponentKind::Resistor => &["a", "b"],
            ComponentKind::PushButton | ComponentKind::ToggleSwitch => SWITCH_PINS,
            ComponentKind::Potentiometer => THREE_TERMINAL,
            ComponentKind::TemperatureSensor => SENSOR_PINS,
            ComponentKind::Junction => &["node"],
        }
    }

    pub fn pin_count(&self) -> usize {
        self.pin_names().len()
    }

    pub fn pin_index(&self, name: &str) -> Option<PinIndex> {
        self.pin_names().iter().position(|p| *p == name)
    }

    /// Pins that must be wired once any pin of the part is wired.
    pub fn required_pins(&self) -> &'static [PinIndex] {
        match self {
            ComponentKind::Led
            | ComponentKind::Resistor
            | ComponentKind::Motor
            | ComponentKind::Buzzer => &[0, 1],
            ComponentKind::Potentiometer | ComponentKind::TemperatureSensor => &[0, 1, 2],
            ComponentKind::Battery
            | ComponentKind::Microcontroller
            | ComponentKind::PushButton
            | ComponentKind::ToggleSwitch
            | ComponentKind::Junction => &[],
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ComponentKind::Battery => "DC supply with a ground-referenced negative terminal",
            ComponentKind::Microcontroller => "Arduino-style board with 5V/3V3 rails and 20 GPIOs",
            ComponentKind::Led => "Light-emitting diode with forward voltage and current ceiling",
            ComponentKind::Resistor => "Fixed resistor",
            ComponentKind::PushButton => "Momentary tactile switch with contact bounce",
            ComponentKind::ToggleSwitch => "Latching rocker switch",
            ComponentKind::Potentiometer => "Rotary voltage divider",
            ComponentKind::Motor => "Brushed DC motor with spin-up inertia",
            ComponentKind::Buzzer => "Active piezo buzzer",
            ComponentKind::TemperatureSensor => "TMP36-style analog temperature sensor",
            ComponentKind::Junction => "Zero-resistance wire junction",
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// How a pin takes part in voltage resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PinRole {
    Passive,
    /// Authoritative supply at `voltage`; `nominal` is the rated voltage.
    PowerSource { voltage: f64, nominal: f64 },
    /// Authoritative 0 V reference.
    Ground,
    DigitalInput,
    /// Digital input with an internal pull-up to `rail_v`.
    PullUpInput { rail_v: f64 },
    DigitalOutput,
}

impl PinRole {
    pub fn is_digital_input(&self) -> bool {
        matches!(self, PinRole::DigitalInput | PinRole::PullUpInput { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Edge {
    Rising,
    Falling,
}

impl Edge {
    pub fn between(before: bool, after: bool) -> Option<Edge> {
        match (before, after) {
            (false, true) => Some(Edge::Rising),
            (true, false) => Some(Edge::Falling),
            _ => None,
        }
    }
}

/// Edge filter of an interrupt attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeMode {
    Rising,
    Falling,
    Change,
}

impl EdgeMode {
    pub fn accepts(&self, edge: Edge) -> bool {
        match self {
            EdgeMode::Rising => edge == Edge::Rising,
            EdgeMode::Falling => edge == Edge::Falling,
            EdgeMode::Change => true,
        }
    }
}

/// A derived output value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<bool> for Reading {
    fn from(value: bool) -> Self {
        Reading::Bool(value)
    }
}

impl From<f64> for Reading {
    fn from(value: f64) -> Self {
        // Keep snapshots free of NaN/inf, which JSON cannot carry.
        Reading::Number(if value.is_finite() { value } else { 0.0 })
    }
}

impl From<&str> for Reading {
    fn from(value: &str) -> Self {
        Reading::Text(value.to_string())
    }
}

pub type Outputs = BTreeMap<String, Reading>;

/// User interaction applied to a part between ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DeviceInput {
    Press,
    Release,
    Toggle,
    /// Potentiometer knob position in `[0, 1]`.
    SetPosition { value: f64 },
    /// Ambient temperature seen by a sensor.
    SetTemperature { celsius: f64 },
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("unknown property '{0}'")]
    UnknownProperty(String),
    #[error("invalid value for '{key}': {reason}")]
    InvalidProperty { key: String, reason: String },
    #[error("invalid properties: {0}")]
    InvalidProperties(String),
    #[error("input {0:?} is not supported")]
    UnsupportedInput(DeviceInput),
    #[error("firmware can only be installed on a microcontroller")]
    FirmwareUnsupported,
    #[error("{0}")]
    Fault(String),
}

/// Hooks every device variant implements.
///
/// Hooks return `Err` to signal a runtime fault; the engine also catches
/// panics. Either way the device is marked faulted and stops receiving hooks.
pub trait Device: Send {
    fn kind(&self) -> ComponentKind;

    /// Current role of `pin`. Called before every resolution pass.
    fn pin_role(&self, _pin: PinIndex) -> PinRole {
        PinRole::Passive
    }

    /// Called once when the device enters a running simulation.
    fn init(&mut self, _ctx: &mut dyn SimContext) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Called once per tick after the first resolution pass.
    fn update(&mut self, dt_ms: f64, ctx: &mut dyn SimContext) -> Result<(), DeviceError>;

    /// A net attached to `pin` changed between the two resolution passes.
    fn on_pin_change(&mut self, _pin: PinIndex, _ctx: &mut dyn SimContext) -> Result<(), DeviceError> {
        Ok(())
    }

    /// A callback scheduled with [`SimContext::schedule`] fired.
    fn on_timer(&mut self, _token: u64, _ctx: &mut dyn SimContext) -> Result<(), DeviceError> {
        Ok(())
    }

    /// An interrupt attached with [`SimContext::attach_interrupt`] fired.
    fn on_interrupt(
        &mut self,
        _pin: PinIndex,
        _edge: Edge,
        _ctx: &mut dyn SimContext,
    ) -> Result<(), DeviceError> {
        Ok(())
    }

    fn props(&self) -> Value;

    fn set_property(&mut self, key: &str, value: &Value) -> Result<(), DeviceError>;

    fn apply_input(&mut self, input: &DeviceInput) -> Result<(), DeviceError> {
        Err(DeviceError::UnsupportedInput(input.clone()))
    }

    fn outputs(&self) -> Outputs;

    fn install_firmware(&mut self, _firmware: Box<dyn Firmware>) -> Result<(), DeviceError> {
        Err(DeviceError::FirmwareUnsupported)
    }
}

/// The only channel between a device and the rest of the simulation.
pub trait SimContext {
    fn now_ms(&self) -> u64;
    fn config(&self) -> &EngineConfig;
    fn component_id(&self) -> &str;

    fn net_of(&self, pin: PinIndex) -> Option<NetId>;
    /// Number of pins joined on `net`.
    fn net_size(&self, net: NetId) -> usize;
    /// Resolved voltage, `None` when floating.
    fn voltage(&self, net: NetId) -> Option<f64>;
    /// Logic level; floating nets read as seeded noise.
    fn level(&self, net: NetId) -> bool;
    /// Thevenin resistance behind the resolved voltage; infinite when floating.
    fn source_ohms(&self, net: NetId) -> f64;
    /// The net seen from `pin` with this device's own weak drives removed.
    fn external_view(&self, pin: PinIndex) -> NetView;

    /// Ideal drive onto `net` through one of this device's pins.
    fn set_voltage(&mut self, net: NetId, voltage: f64);
    /// Drive `pin` at `voltage` through `ohms` (0 for an ideal output).
    fn drive_pin(&mut self, pin: PinIndex, voltage: f64, ohms: f64);
    /// Resistive drive onto `net` through one of this device's pins.
    fn drive_through(&mut self, net: NetId, voltage: f64, ohms: f64);

    fn schedule(&mut self, delay_ms: u64, token: u64);
    fn raise_interrupt(&mut self, pin: PinIndex, edge: Edge);
    fn attach_interrupt(&mut self, pin: PinIndex, mode: EdgeMode);
    fn detach_interrupt(&mut self, pin: PinIndex);

    fn register_bridge(&mut self, name: &str, a: PinIndex, b: PinIndex);
    fn unregister_bridge(&mut self, name: &str);

    fn warn(&mut self, code: WarningCode, message: String);

    fn rng_next(&mut self) -> f64;
    fn rng_int(&mut self, min: i64, max: i64) -> i64;
    fn rng_gaussian(&mut self, mean: f64, std_dev: f64) -> f64;

    fn set_level(&mut self, net: NetId, high: bool) {
        let voltage = if high { self.config().logic_high_v } else { 0.0 };
        self.set_voltage(net, voltage);
    }

    fn pin_voltage(&self, pin: PinIndex) -> Option<f64> {
        self.net_of(pin).and_then(|net| self.voltage(net))
    }

    fn pin_level(&self, pin: PinIndex) -> bool {
        self.net_of(pin).map(|net| self.level(net)).unwrap_or(false)
    }

    fn pin_source_ohms(&self, pin: PinIndex) -> f64 {
        self.net_of(pin)
            .map(|net| self.source_ohms(net))
            .unwrap_or(f64::INFINITY)
    }

    /// True when the pin shares its net with at least one other pin.
    fn pin_connected(&self, pin: PinIndex) -> bool {
        self.net_of(pin)
            .map(|net| self.net_size(net) > 1)
            .unwrap_or(false)
    }
}

/// Typed property set of a device variant.
pub(crate) trait Props: Serialize + DeserializeOwned {
    fn check(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}

pub(crate) fn decode_props<P: Props>(value: &Value) -> Result<P, DeviceError> {
    let value = if value.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        value.clone()
    };
    let props: P =
        serde_json::from_value(value).map_err(|e| DeviceError::InvalidProperties(e.to_string()))?;
    props.check()?;
    Ok(props)
}

pub(crate) fn encode_props<P: Props>(props: &P) -> Value {
    serde_json::to_value(props).unwrap_or(Value::Null)
}

/// Replace one field of `props`, re-validating the result.
pub(crate) fn patch_props<P: Props>(props: &P, key: &str, value: &Value) -> Result<P, DeviceError> {
    let mut map = match serde_json::to_value(props) {
        Ok(Value::Object(map)) => map,
        _ => return Err(DeviceError::UnknownProperty(key.to_string())),
    };
    if !map.contains_key(key) {
        return Err(DeviceError::UnknownProperty(key.to_string()));
    }
    map.insert(key.to_string(), value.clone());
    let patched: P =
        serde_json::from_value(Value::Object(map)).map_err(|e| DeviceError::InvalidProperty {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
    patched.check()?;
    Ok(patched)
}

pub(crate) fn require_positive(key: &str, value: f64) -> Result<(), DeviceError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DeviceError::InvalidProperty {
            key: key.to_string(),
            reason: format!("must be a positive number, got {}", value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in ComponentKind::ALL {
            assert_eq!(kind.as_str().parse::<ComponentKind>(), Ok(kind));
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert!("flux_capacitor".parse::<ComponentKind>().is_err());
    }

    #[test]
    fn test_pin_lookup() {
        assert_eq!(ComponentKind::Led.pin_index("cathode"), Some(1));
        assert_eq!(ComponentKind::Led.pin_index("gate"), None);
        assert_eq!(ComponentKind::Microcontroller.pin_index("D13"), Some(16));
        assert_eq!(ComponentKind::Microcontroller.pin_index("A0"), Some(17));
        assert_eq!(ComponentKind::Junction.pin_count(), 1);
    }

    #[test]
    fn test_edge_mode_filter() {
        assert!(EdgeMode::Rising.accepts(Edge::Rising));
        assert!(!EdgeMode::Rising.accepts(Edge::Falling));
        assert!(EdgeMode::Falling.accepts(Edge::Falling));
        assert!(EdgeMode::Change.accepts(Edge::Rising));
        assert_eq!(Edge::between(false, true), Some(Edge::Rising));
        assert_eq!(Edge::between(true, true), None);
    }

    #[test]
    fn test_non_finite_reading_is_zeroed() {
        assert_eq!(Reading::from(f64::NAN), Reading::Number(0.0));
        assert_eq!(Reading::from(1.5), Reading::Number(1.5));
    }
}
