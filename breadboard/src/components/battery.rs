use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    decode_props, encode_props, patch_props, ComponentKind, Device, DeviceError, Outputs,
    PinIndex, PinRole, Props, SimContext,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BatteryProps {
    /// Terminal voltage.
    pub voltage: f64,
    /// Rated voltage used for brownout detection.
    pub nominal_voltage: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for BatteryProps {
    fn default() -> Self {
        Self {
            voltage: 5.0,
            nominal_voltage: 5.0,
            extra: BTreeMap::new(),
        }
    }
}

impl Props for BatteryProps {
    fn check(&self) -> Result<(), DeviceError> {
        if !(self.voltage.is_finite() && self.voltage >= 0.0) {
            return Err(DeviceError::InvalidProperty {
                key: "voltage".to_string(),
                reason: "must be a non-negative number".to_string(),
            });
        }
        super::require_positive("nominalVoltage", self.nominal_voltage)
    }
}

#[derive(Debug, Clone)]
pub struct Battery {
    props: BatteryProps,
}

impl Battery {
    pub fn new(props: BatteryProps) -> Self {
        Self { props }
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, DeviceError> {
        Ok(Self::new(decode_props(value)?))
    }
}

impl Device for Battery {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Battery
    }

    fn pin_role(&self, pin: PinIndex) -> PinRole {
        match pin {
            0 => PinRole::PowerSource {
                voltage: self.props.voltage,
                nominal: self.props.nominal_voltage,
            },
            _ => PinRole::Ground,
        }
    }

    fn update(&mut self, _dt_ms: f64, _ctx: &mut dyn SimContext) -> Result<(), DeviceError> {
        Ok(())
    }

    fn props(&self) -> Value {
        encode_props(&self.props)
    }

    fn set_property(&mut self, key: &str, value: &Value) -> Result<(), DeviceError> {
        self.props = patch_props(&self.props, key, value)?;
        Ok(())
    }

    fn outputs(&self) -> Outputs {
        let mut outputs = Outputs::new();
        outputs.insert("voltage".to_string(), self.props.voltage.into());
        outputs
    }
}
