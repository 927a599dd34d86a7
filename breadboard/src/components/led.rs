//! Light-emitting diode.
//!
//! Current is estimated from the forward drop and the Thevenin resistance of
//! the two nets it sits between. With no series resistance the current is
//! clamped to `maxCurrentMa` and the LED reports full brightness.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    decode_props, encode_props, patch_props, require_positive, ComponentKind, Device,
    DeviceError, Outputs, PinIndex, Props, SimContext,
};
use crate::diagnostics::WarningCode;

const ANODE: PinIndex = 0;
const CATHODE: PinIndex = 1;

/// Below this much series resistance the LED is treated as unprotected.
const NO_RESISTOR_OHMS: f64 = 1.0;
/// Reverse drop that counts as reverse bias.
const REVERSE_BIAS_V: f64 = -0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LedProps {
    pub forward_voltage: f64,
    pub max_current_ma: f64,
    pub color: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for LedProps {
    fn default() -> Self {
        Self {
            forward_voltage: 2.0,
            max_current_ma: 20.0,
            color: "red".to_string(),
            extra: BTreeMap::new(),
        }
    }
}

impl Props for LedProps {
    fn check(&self) -> Result<(), DeviceError> {
        require_positive("forwardVoltage", self.forward_voltage)?;
        require_positive("maxCurrentMa", self.max_current_ma)
    }
}

#[derive(Debug, Clone)]
pub struct Led {
    props: LedProps,
    brightness: f64,
    current_ma: f64,
}

impl Led {
    pub fn new(props: LedProps) -> Self {
        Self {
            props,
            brightness: 0.0,
            current_ma: 0.0,
        }
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, DeviceError> {
        Ok(Self::new(decode_props(value)?))
    }

    pub fn brightness(&self) -> f64 {
        self.brightness
    }

    fn evaluate(&mut self, ctx: &mut dyn SimContext, report: bool) {
        self.brightness = 0.0;
        self.current_ma = 0.0;
        let (Some(anode), Some(cathode)) = (ctx.pin_voltage(ANODE), ctx.pin_voltage(CATHODE))
        else {
            return;
        };
        let drop = anode - cathode;
        if drop < REVERSE_BIAS_V {
            if report {
                ctx.warn(
                    WarningCode::LedReverseBias,
                    format!("LED is reverse biased by {:.2} V", -drop),
                );
            }
            return;
        }
        let vf = self.props.forward_voltage;
        if drop < vf {
            return;
        }

        let max = self.props.max_current_ma;
        let series = ctx.pin_source_ohms(ANODE) + ctx.pin_source_ohms(CATHODE);
        if series < NO_RESISTOR_OHMS {
            if report {
                ctx.warn(
                    WarningCode::LedNoResistor,
                    format!("LED has no series resistor; current limited to {} mA", max),
                );
            }
            self.current_ma = max;
            self.brightness = 1.0;
            return;
        }

        let current = (drop - vf) / series * 1000.0;
        if current > max {
            if report {
                ctx.warn(
                    WarningCode::LedOverCurrent,
                    format!("LED current {:.1} mA exceeds its {} mA rating", current, max),
                );
            }
            self.current_ma = max;
            self.brightness = 1.0;
        } else {
            self.current_ma = current;
            self.brightness = current / max;
        }
    }
}

impl Device for Led {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Led
    }

    fn update(&mut self, _dt_ms: f64, ctx: &mut dyn SimContext) -> Result<(), DeviceError> {
        self.evaluate(ctx, true);
        Ok(())
    }

    fn on_pin_change(&mut self, _pin: PinIndex, ctx: &mut dyn SimContext) -> Result<(), DeviceError> {
        self.evaluate(ctx, false);
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
        outputs.insert("on".to_string(), (self.brightness > 0.0).into());
        outputs.insert("brightness".to_string(), self.brightness.into());
        outputs.insert("currentMa".to_string(), self.current_ma.into());
        outputs
    }
}
