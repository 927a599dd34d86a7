//! Fixed resistor.
//!
//! Not a nodal solve: each tick the resistor looks at both sides with its own
//! drives removed. A side that is not held by a stiff source receives the
//! other side's Thevenin equivalent with `resistance` added in series.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    decode_props, encode_props, patch_props, require_positive, ComponentKind, Device,
    DeviceError, Outputs, Props, SimContext,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResistorProps {
    /// Ohms.
    pub resistance: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for ResistorProps {
    fn default() -> Self {
        Self {
            resistance: 220.0,
            extra: BTreeMap::new(),
        }
    }
}

impl Props for ResistorProps {
    fn check(&self) -> Result<(), DeviceError> {
        require_positive("resistance", self.resistance)
    }
}

#[derive(Debug, Clone)]
pub struct Resistor {
    props: ResistorProps,
    current_ma: f64,
    drop_v: f64,
}

impl Resistor {
    pub fn new(props: ResistorProps) -> Self {
        Self {
            props,
            current_ma: 0.0,
            drop_v: 0.0,
        }
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, DeviceError> {
        Ok(Self::new(decode_props(value)?))
    }
}

impl Device for Resistor {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Resistor
    }

    fn update(&mut self, _dt_ms: f64, ctx: &mut dyn SimContext) -> Result<(), DeviceError> {
        let r = self.props.resistance;
        let views = [ctx.external_view(0), ctx.external_view(1)];
        for (side, other) in [(0usize, 1usize), (1, 0)] {
            if views[side].is_stiff() {
                continue;
            }
            if let Some(voltage) = views[other].voltage {
                ctx.drive_pin(side, voltage, views[other].ohms + r);
            }
        }

        self.drop_v = match (views[0].voltage, views[1].voltage) {
            (Some(a), Some(b)) => a - b,
            _ => 0.0,
        };
        let loop_ohms = r + views[0].ohms + views[1].ohms;
        self.current_ma = if loop_ohms.is_finite() {
            self.drop_v / loop_ohms * 1000.0
        } else {
            0.0
        };
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
        outputs.insert("currentMa".to_string(), self.current_ma.into());
        outputs.insert("voltageDrop".to_string(), self.drop_v.into());
        outputs
    }
}
