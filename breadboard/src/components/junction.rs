use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    decode_props, encode_props, patch_props, ComponentKind, Device, DeviceError, Outputs, Props,
    SimContext,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JunctionProps {
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Props for JunctionProps {}

/// Single-pin pass-through. Every wire ending on `node` joins one net.
#[derive(Debug, Clone, Default)]
pub struct Junction {
    props: JunctionProps,
}

impl Junction {
    pub(crate) fn from_value(value: &Value) -> Result<Self, DeviceError> {
        Ok(Self {
            props: decode_props(value)?,
        })
    }
}

impl Device for Junction {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Junction
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
        Outputs::new()
    }
}
