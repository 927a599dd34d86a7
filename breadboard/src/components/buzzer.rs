use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    decode_props, encode_props, patch_props, require_positive, ComponentKind, Device,
    DeviceError, Outputs, PinIndex, Props, SimContext,
};

const PLUS: PinIndex = 0;
const MINUS: PinIndex = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuzzerProps {
    /// Minimum forward voltage that makes it sound.
    pub threshold_v: f64,
    pub frequency_hz: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for BuzzerProps {
    fn default() -> Self {
        Self {
            threshold_v: 1.5,
            frequency_hz: 2000.0,
            extra: BTreeMap::new(),
        }
    }
}

impl Props for BuzzerProps {
    fn check(&self) -> Result<(), DeviceError> {
        require_positive("thresholdV", self.threshold_v)?;
        require_positive("frequencyHz", self.frequency_hz)
    }
}

/// Active buzzer. Reports the tone it would play; audio is up to the host.
#[derive(Debug, Clone)]
pub struct Buzzer {
    props: BuzzerProps,
    sounding: bool,
    /// Number of times the buzzer started sounding.
    beeps: u64,
}

impl Buzzer {
    pub fn new(props: BuzzerProps) -> Self {
        Self {
            props,
            sounding: false,
            beeps: 0,
        }
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, DeviceError> {
        Ok(Self::new(decode_props(value)?))
    }
}

impl Device for Buzzer {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Buzzer
    }

    fn update(&mut self, _dt_ms: f64, ctx: &mut dyn SimContext) -> Result<(), DeviceError> {
        let sounding = match (ctx.pin_voltage(PLUS), ctx.pin_voltage(MINUS)) {
            (Some(plus), Some(minus)) => plus - minus >= self.props.threshold_v,
            _ => false,
        };
        if sounding && !self.sounding {
            self.beeps += 1;
        }
        self.sounding = sounding;
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
        let tone = if self.sounding {
            self.props.frequency_hz
        } else {
            0.0
        };
        let mut outputs = Outputs::new();
        outputs.insert("sounding".to_string(), self.sounding.into());
        outputs.insert("toneHz".to_string(), tone.into());
        outputs.insert("beeps".to_string(), (self.beeps as f64).into());
        outputs
    }
}
