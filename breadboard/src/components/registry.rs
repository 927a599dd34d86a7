//! Kind → constructor and default properties.
//!
//! Both functions match exhaustively on [`ComponentKind`], so adding a variant
//! fails to compile until it is wired in here.

use serde_json::Value;

use super::battery::{Battery, BatteryProps};
use super::buzzer::{Buzzer, BuzzerProps};
use super::junction::{Junction, JunctionProps};
use super::led::{Led, LedProps};
use super::microcontroller::{Microcontroller, MicrocontrollerProps};
use super::motor::{Motor, MotorProps};
use super::potentiometer::{Potentiometer, PotentiometerProps};
use super::resistor::{Resistor, ResistorProps};
use super::sensor::{TemperatureSensor, TemperatureSensorProps};
use super::switch::{PushButton, PushButtonProps, ToggleSwitch, ToggleSwitchProps};
use super::{encode_props, ComponentKind, Device, DeviceError};

/// Build a device of `kind` from persisted properties. Missing fields take
/// their defaults; unknown fields are kept.
pub fn instantiate(kind: ComponentKind, properties: &Value) -> Result<Box<dyn Device>, DeviceError> {
    let device: Box<dyn Device> = match kind {
        ComponentKind::Battery => Box::new(Battery::from_value(properties)?),
        ComponentKind::Microcontroller => Box::new(Microcontroller::from_value(properties)?),
        ComponentKind::Led => Box::new(Led::from_value(properties)?),
        ComponentKind::Resistor => Box::new(Resistor::from_value(properties)?),
        ComponentKind::PushButton => Box::new(PushButton::from_value(properties)?),
        ComponentKind::ToggleSwitch => Box::new(ToggleSwitch::from_value(properties)?),
        ComponentKind::Potentiometer => Box::new(Potentiometer::from_value(properties)?),
        ComponentKind::Motor => Box::new(Motor::from_value(properties)?),
        ComponentKind::Buzzer => Box::new(Buzzer::from_value(properties)?),
        ComponentKind::TemperatureSensor => Box::new(TemperatureSensor::from_value(properties)?),
        ComponentKind::Junction => Box::new(Junction::from_value(properties)?),
    };
    Ok(device)
}

pub fn default_properties(kind: ComponentKind) -> Value {
    match kind {
        ComponentKind::Battery => encode_props(&BatteryProps::default()),
        ComponentKind::Microcontroller => encode_props(&MicrocontrollerProps::default()),
        ComponentKind::Led => encode_props(&LedProps::default()),
        ComponentKind::Resistor => encode_props(&ResistorProps::default()),
        ComponentKind::PushButton => encode_props(&PushButtonProps::default()),
        ComponentKind::ToggleSwitch => encode_props(&ToggleSwitchProps::default()),
        ComponentKind::Potentiometer => encode_props(&PotentiometerProps::default()),
        ComponentKind::Motor => encode_props(&MotorProps::default()),
        ComponentKind::Buzzer => encode_props(&BuzzerProps::default()),
        ComponentKind::TemperatureSensor => encode_props(&TemperatureSensorProps::default()),
        ComponentKind::Junction => encode_props(&JunctionProps::default()),
    }
}
