//! Four-leg switches: the momentary push button and the latching rocker.
//!
//! Legs `1a`/`1b` and `2a`/`2b` are joined inside the part and stay bridged
//! for its whole life. Closing the contact bridges `1a` to `2a`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    decode_props, encode_props, patch_props, ComponentKind, Device, DeviceError, DeviceInput,
    Outputs, PinIndex, Props, SimContext,
};

const PIN_1A: PinIndex = 0;
const PIN_1B: PinIndex = 1;
const PIN_2A: PinIndex = 2;
const PIN_2B: PinIndex = 3;

const CONTACT: &str = "contact";

fn bridge_legs(ctx: &mut dyn SimContext) {
    ctx.register_bridge("legs-1", PIN_1A, PIN_1B);
    ctx.register_bridge("legs-2", PIN_2A, PIN_2B);
}

fn set_contact(ctx: &mut dyn SimContext, closed: bool) {
    if closed {
        ctx.register_bridge(CONTACT, PIN_1A, PIN_2A);
    } else {
        ctx.unregister_bridge(CONTACT);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PushButtonProps {
    /// Settle window after a press or release.
    pub bounce_ms: u64,
    /// Extra random settle time, drawn per transition in `0..=jitter_ms`.
    pub jitter_ms: u64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for PushButtonProps {
    fn default() -> Self {
        Self {
            bounce_ms: 5,
            jitter_ms: 1,
            extra: BTreeMap::new(),
        }
    }
}

impl Props for PushButtonProps {}

/// Momentary tactile switch.
///
/// The contact only follows the actuator once a settle timer fires. Each
/// transition bumps `generation` and tags its timer with it, so a timer that
/// was overtaken by a later press or release is ignored when it fires.
#[derive(Debug, Clone)]
pub struct PushButton {
    props: PushButtonProps,
    pressed: bool,
    closed: bool,
    pending: bool,
    generation: u64,
    settling: bool,
}

impl PushButton {
    pub fn new(props: PushButtonProps) -> Self {
        Self {
            props,
            pressed: false,
            closed: false,
            pending: false,
            generation: 0,
            settling: false,
        }
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, DeviceError> {
        Ok(Self::new(decode_props(value)?))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Device for PushButton {
    fn kind(&self) -> ComponentKind {
        ComponentKind::PushButton
    }

    fn init(&mut self, ctx: &mut dyn SimContext) -> Result<(), DeviceError> {
        bridge_legs(ctx);
        set_contact(ctx, self.closed);
        Ok(())
    }

    fn update(&mut self, _dt_ms: f64, ctx: &mut dyn SimContext) -> Result<(), DeviceError> {
        if !self.pending {
            return Ok(());
        }
        self.pending = false;
        self.generation += 1;
        self.settling = true;
        let jitter = ctx.rng_int(0, self.props.jitter_ms as i64) as u64;
        ctx.schedule(self.props.bounce_ms + jitter, self.generation);
        Ok(())
    }

    fn on_timer(&mut self, token: u64, ctx: &mut dyn SimContext) -> Result<(), DeviceError> {
        if token != self.generation {
            return Ok(());
        }
        self.settling = false;
        if self.closed != self.pressed {
            self.closed = self.pressed;
            set_contact(ctx, self.closed);
        }
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
        let pressed = match input {
            DeviceInput::Press => true,
            DeviceInput::Release => false,
            DeviceInput::Toggle => !self.pressed,
            other => return Err(DeviceError::UnsupportedInput(other.clone())),
        };
        if pressed != self.pressed {
            self.pressed = pressed;
            self.pending = true;
        }
        Ok(())
    }

    fn outputs(&self) -> Outputs {
        let mut outputs = Outputs::new();
        outputs.insert("pressed".to_string(), self.pressed.into());
        outputs.insert("closed".to_string(), self.closed.into());
        outputs.insert("bouncing".to_string(), self.settling.into());
        outputs
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToggleSwitchProps {
    pub on: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Props for ToggleSwitchProps {}

/// Latching rocker. The contact follows the `on` property.
#[derive(Debug, Clone)]
pub struct ToggleSwitch {
    props: ToggleSwitchProps,
    closed: bool,
}

impl ToggleSwitch {
    pub fn new(props: ToggleSwitchProps) -> Self {
        Self {
            props,
            closed: false,
        }
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, DeviceError> {
        Ok(Self::new(decode_props(value)?))
    }

    fn sync(&mut self, ctx: &mut dyn SimContext) {
        if self.closed != self.props.on {
            self.closed = self.props.on;
            set_contact(ctx, self.closed);
        }
    }
}

impl Device for ToggleSwitch {
    fn kind(&self) -> ComponentKind {
        ComponentKind::ToggleSwitch
    }

    fn init(&mut self, ctx: &mut dyn SimContext) -> Result<(), DeviceError> {
        bridge_legs(ctx);
        self.closed = self.props.on;
        set_contact(ctx, self.closed);
        Ok(())
    }

    fn update(&mut self, _dt_ms: f64, ctx: &mut dyn SimContext) -> Result<(), DeviceError> {
        self.sync(ctx);
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
        self.props.on = match input {
            DeviceInput::Press => true,
            DeviceInput::Release => false,
            DeviceInput::Toggle => !self.props.on,
            other => return Err(DeviceError::UnsupportedInput(other.clone())),
        };
        Ok(())
    }

    fn outputs(&self) -> Outputs {
        let mut outputs = Outputs::new();
        outputs.insert("on".to_string(), self.closed.into());
        outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::testing::FakeContext;

    #[test]
    fn test_button_bridges_legs_on_init() {
        let mut button = PushButton::new(PushButtonProps::default());
        let mut ctx = FakeContext::new(4);
        button.init(&mut ctx).unwrap();
        assert_eq!(ctx.bridges.get("legs-1"), Some(&(PIN_1A, PIN_1B)));
        assert_eq!(ctx.bridges.get("legs-2"), Some(&(PIN_2A, PIN_2B)));
        assert!(!ctx.bridges.contains_key(CONTACT));
    }

    #[test]
    fn test_press_closes_after_settle() {
        let props = PushButtonProps {
            bounce_ms: 5,
            jitter_ms: 0,
            ..PushButtonProps::default()
        };
        let mut button = PushButton::new(props);
        let mut ctx = FakeContext::new(4);
        button.init(&mut ctx).unwrap();
        button.apply_input(&DeviceInput::Press).unwrap();
        button.update(1.0, &mut ctx).unwrap();
        assert_eq!(ctx.scheduled, vec![(5, 1)]);
        assert!(!button.is_closed());

        button.on_timer(1, &mut ctx).unwrap();
        assert!(button.is_closed());
        assert_eq!(ctx.bridges.get(CONTACT), Some(&(PIN_1A, PIN_2A)));
    }

    #[test]
    fn test_stale_timer_is_ignored() {
        let mut button = PushButton::new(PushButtonProps::default());
        let mut ctx = FakeContext::new(4);
        button.init(&mut ctx).unwrap();
        button.apply_input(&DeviceInput::Press).unwrap();
        button.update(1.0, &mut ctx).unwrap();
        button.apply_input(&DeviceInput::Release).unwrap();
        button.update(1.0, &mut ctx).unwrap();
        assert_eq!(ctx.scheduled.len(), 2);

        button.on_timer(1, &mut ctx).unwrap();
        assert!(!button.is_closed());
        button.on_timer(2, &mut ctx).unwrap();
        assert!(!button.is_closed());
        assert!(!ctx.bridges.contains_key(CONTACT));
    }

    #[test]
    fn test_button_rejects_position_input() {
        let mut button = PushButton::new(PushButtonProps::default());
        assert!(matches!(
            button.apply_input(&DeviceInput::SetPosition { value: 0.5 }),
            Err(DeviceError::UnsupportedInput(_))
        ));
    }

    #[test]
    fn test_toggle_follows_property() {
        let mut switch = ToggleSwitch::new(ToggleSwitchProps::default());
        let mut ctx = FakeContext::new(4);
        switch.init(&mut ctx).unwrap();
        assert!(!ctx.bridges.contains_key(CONTACT));

        switch.set_property("on", &Value::Bool(true)).unwrap();
        switch.update(1.0, &mut ctx).unwrap();
        assert!(ctx.bridges.contains_key(CONTACT));

        switch.apply_input(&DeviceInput::Toggle).unwrap();
        switch.update(1.0, &mut ctx).unwrap();
        assert!(!ctx.bridges.contains_key(CONTACT));
        assert_eq!(switch.props()["on"], false);
    }
}
