use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    decode_props, encode_props, patch_props, ComponentKind, Device, DeviceError, DeviceInput,
    Outputs, PinIndex, Props, SimContext,
};

const VCC: PinIndex = 0;
const OUT: PinIndex = 1;
const GND: PinIndex = 2;

/// Output at 0 °C.
const OFFSET_V: f64 = 0.5;
const VOLTS_PER_DEGREE: f64 = 0.01;
const MIN_SUPPLY_V: f64 = 2.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TemperatureSensorProps {
    pub temperature_c: f64,
    /// Standard deviation of the output noise.
    pub noise_v: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for TemperatureSensorProps {
    fn default() -> Self {
        Self {
            temperature_c: 25.0,
            noise_v: 0.002,
            extra: BTreeMap::new(),
        }
    }
}

impl Props for TemperatureSensorProps {
    fn check(&self) -> Result<(), DeviceError> {
        if !self.temperature_c.is_finite() {
            return Err(DeviceError::InvalidProperty {
                key: "temperatureC".to_string(),
                reason: "must be a finite number".to_string(),
            });
        }
        if !(self.noise_v.is_finite() && self.noise_v >= 0.0) {
            return Err(DeviceError::InvalidProperty {
                key: "noiseV".to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
        Ok(())
    }
}

/// TMP36-style analog sensor: `out = 0.5 V + 10 mV/°C` plus gaussian noise,
/// only while powered.
#[derive(Debug, Clone)]
pub struct TemperatureSensor {
    props: TemperatureSensorProps,
    output_v: Option<f64>,
}

impl TemperatureSensor {
    pub fn new(props: TemperatureSensorProps) -> Self {
        Self {
            props,
            output_v: None,
        }
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, DeviceError> {
        Ok(Self::new(decode_props(value)?))
    }
}

impl Device for TemperatureSensor {
    fn kind(&self) -> ComponentKind {
        ComponentKind::TemperatureSensor
    }

    fn update(&mut self, _dt_ms: f64, ctx: &mut dyn SimContext) -> Result<(), DeviceError> {
        let supply = match (ctx.pin_voltage(VCC), ctx.pin_voltage(GND)) {
            (Some(vcc), Some(gnd)) => vcc - gnd,
            _ => 0.0,
        };
        if supply < MIN_SUPPLY_V {
            self.output_v = None;
            return Ok(());
        }

        let ideal = OFFSET_V + VOLTS_PER_DEGREE * self.props.temperature_c;
        let noise = if self.props.noise_v > 0.0 {
            ctx.rng_gaussian(0.0, self.props.noise_v)
        } else {
            0.0
        };
        let out = (ideal + noise).clamp(0.0, supply);
        ctx.drive_pin(OUT, out, 0.0);
        self.output_v = Some(out);
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
            DeviceInput::SetTemperature { celsius } if celsius.is_finite() => {
                self.props.temperature_c = *celsius;
                Ok(())
            }
            other => Err(DeviceError::UnsupportedInput(other.clone())),
        }
    }

    fn outputs(&self) -> Outputs {
        let mut outputs = Outputs::new();
        outputs.insert("temperatureC".to_string(), self.props.temperature_c.into());
        if let Some(v) = self.output_v {
            outputs.insert("outputVoltage".to_string(), v.into());
        }
        outputs
    }
}
