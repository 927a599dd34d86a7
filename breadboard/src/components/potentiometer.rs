use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    decode_props, encode_props, patch_props, require_positive, ComponentKind, Device,
    DeviceError, DeviceInput, Outputs, PinIndex, Props, SimContext,
};
use crate::diagnostics::WarningCode;

const VCC: PinIndex = 0;
const WIPER: PinIndex = 1;
const GND: PinIndex = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PotentiometerProps {
    /// End-to-end resistance in ohms.
    pub resistance: f64,
    /// Knob position, 0 at `gnd` and 1 at `vcc`.
    pub position: f64,
    pub max_voltage: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for PotentiometerProps {
    fn default() -> Self {
        Self {
            resistance: 10_000.0,
            position: 0.5,
            max_voltage: 5.5,
            extra: BTreeMap::new(),
        }
    }
}

impl Props for PotentiometerProps {
    fn check(&self) -> Result<(), DeviceError> {
        require_positive("resistance", self.resistance)?;
        require_positive("maxVoltage", self.max_voltage)?;
        if !(0.0..=1.0).contains(&self.position) {
            return Err(DeviceError::InvalidProperty {
                key: "position".to_string(),
                reason: format!("must be within 0..=1, got {}", self.position),
            });
        }
        Ok(())
    }
}

/// Rotary divider. Drives the wiper through the Thevenin resistance of the
/// two track halves.
#[derive(Debug, Clone)]
pub struct Potentiometer {
    props: PotentiometerProps,
    wiper_v: Option<f64>,
}

impl Potentiometer {
    pub fn new(props: PotentiometerProps) -> Self {
        Self {
            props,
            wiper_v: None,
        }
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, DeviceError> {
        Ok(Self::new(decode_props(value)?))
    }
}

impl Device for Potentiometer {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Potentiometer
    }

    fn update(&mut self, _dt_ms: f64, ctx: &mut dyn SimContext) -> Result<(), DeviceError> {
        let (Some(top), Some(bottom)) = (ctx.pin_voltage(VCC), ctx.pin_voltage(GND)) else {
            self.wiper_v = None;
            if [VCC, WIPER, GND].iter().any(|pin| ctx.pin_connected(*pin)) {
                ctx.warn(
                    WarningCode::PotUnpowered,
                    "Potentiometer needs both vcc and gnd connected".to_string(),
                );
            }
            return Ok(());
        };

        let span = top - bottom;
        if span.abs() > self.props.max_voltage {
            ctx.warn(
                WarningCode::PotOverVoltage,
                format!(
                    "Potentiometer sees {:.2} V across its track, rated for {:.2} V",
                    span.abs(),
                    self.props.max_voltage
                ),
            );
        }

        let p = self.props.position;
        let wiper = bottom + span * p;
        let ohms = (self.props.resistance * p * (1.0 - p)).max(1.0);
        ctx.drive_pin(WIPER, wiper, ohms);
        self.wiper_v = Some(wiper);
        Ok(())
    }

    fn props(&self) -> Value {
        encode_props(&self.props)
    }

    fn set_property(&mut self, key: &str, value: &Value) -> Result<(), DeviceError> {
        self.props = patch_props(&self.props, key, value)?;
        Ok(())
    }

    fn apply_input(&mut self, input: &DeviceInput) -> Result<(), DeviceError> {
        match input {
            DeviceInput::SetPosition { value } if value.is_finite() => {
                self.props.position = (*value).clamp(0.0, 1.0);
                Ok(())
            }
            other => Err(DeviceError::UnsupportedInput(other.clone())),
        }
    }

    fn outputs(&self) -> Outputs {
        let mut outputs = Outputs::new();
        outputs.insert("position".to_string(), self.props.position.into());
        if let Some(v) = self.wiper_v {
            outputs.insert("wiperVoltage".to_string(), v.into());
        }
        outputs
    }
}
