use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    decode_props, encode_props, patch_props, require_positive, ComponentKind, Device,
    DeviceError, Outputs, PinIndex, Props, SimContext,
};

const PLUS: PinIndex = 0;
const MINUS: PinIndex = 1;

/// Below this speed the motor reports itself stopped.
const STOPPED_RPM: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MotorProps {
    pub rated_voltage: f64,
    pub max_rpm: f64,
    /// Time constant of the spin-up curve.
    pub spin_up_ms: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for MotorProps {
    fn default() -> Self {
        Self {
            rated_voltage: 5.0,
            max_rpm: 3000.0,
            spin_up_ms: 200.0,
            extra: BTreeMap::new(),
        }
    }
}

impl Props for MotorProps {
    fn check(&self) -> Result<(), DeviceError> {
        require_positive("ratedVoltage", self.rated_voltage)?;
        require_positive("maxRpm", self.max_rpm)?;
        require_positive("spinUpMs", self.spin_up_ms)
    }
}

/// Brushed DC motor. Speed approaches `maxRpm * V / ratedVoltage`
/// exponentially; the sign follows terminal polarity.
#[derive(Debug, Clone)]
pub struct Motor {
    props: MotorProps,
    rpm: f64,
}

impl Motor {
    pub fn new(props: MotorProps) -> Self {
        Self { props, rpm: 0.0 }
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, DeviceError> {
        Ok(Self::new(decode_props(value)?))
    }

    pub fn rpm(&self) -> f64 {
        self.rpm
    }

    fn direction(&self) -> &'static str {
        if self.rpm.abs() < STOPPED_RPM {
            "stopped"
        } else if self.rpm > 0.0 {
            "cw"
        } else {
            "ccw"
        }
    }
}

impl Device for Motor {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Motor
    }

    fn update(&mut self, dt_ms: f64, ctx: &mut dyn SimContext) -> Result<(), DeviceError> {
        let drop = match (ctx.pin_voltage(PLUS), ctx.pin_voltage(MINUS)) {
            (Some(plus), Some(minus)) => plus - minus,
            _ => 0.0,
        };
        let drive = (drop / self.props.rated_voltage).clamp(-1.0, 1.0);
        let target = drive * self.props.max_rpm;
        let alpha = 1.0 - (-dt_ms / self.props.spin_up_ms).exp();
        self.rpm += (target - self.rpm) * alpha;
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
        outputs.insert("rpm".to_string(), self.rpm.abs().into());
        outputs.insert("direction".to_string(), self.direction().into());
        outputs.insert("running".to_string(), (self.rpm.abs() >= STOPPED_RPM).into());
        outputs
    }
}
