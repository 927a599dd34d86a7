//! Arduino-style microcontroller board.
//!
//! The board exposes `5V`, `3V3` and `GND` rails and twenty GPIOs (`D0`..`D13`,
//! `A0`..`A5`). GPIOs are numbered the Arduino way: `D0`..`D13` are 0..13 and
//! `A0`..`A5` are 14..19.
//!
//! Behavior comes from an optional [`Firmware`], the user's control program.
//! It sees the board through [`McuIo`], which maps the familiar
//! `pinMode`/`digitalWrite`/`analogRead` calls onto the simulation context.
//! A GPIO that firmware never configured stays passive.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    decode_props, encode_props, patch_props, require_positive, ComponentKind, Device,
    DeviceError, Edge, EdgeMode, Outputs, PinIndex, PinRole, Props, SimContext,
};

pub const PIN_NAMES: &[&str] = &[
    "5V", "3V3", "GND", "D0", "D1", "D2", "D3", "D4", "D5", "D6", "D7", "D8", "D9", "D10", "D11",
    "D12", "D13", "A0", "A1", "A2", "A3", "A4", "A5",
];

pub const GPIO_COUNT: u8 = 20;
pub const LED_BUILTIN: u8 = 13;
pub const A0: u8 = 14;
pub const A1: u8 = 15;
pub const A2: u8 = 16;
pub const A3: u8 = 17;
pub const A4: u8 = 18;
pub const A5: u8 = 19;

const RAIL_5V: PinIndex = 0;
const RAIL_3V3: PinIndex = 1;
const GPIO_BASE: PinIndex = 3;
const RAIL_3V3_VOLTS: f64 = 3.3;
const ADC_MAX: u16 = 1023;

fn gpio_index(pin: u8) -> Option<PinIndex> {
    (pin < GPIO_COUNT).then_some(GPIO_BASE + pin as PinIndex)
}

/// Arduino pin number of a pin index (`D13` is 13, `A0` is 14).
pub fn gpio_number(index: PinIndex) -> Option<u8> {
    index
        .checked_sub(GPIO_BASE)
        .filter(|n| *n < GPIO_COUNT as usize)
        .map(|n| n as u8)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PinMode {
    /// Never configured; electrically passive.
    #[default]
    Unset,
    Input,
    InputPullup,
    Output,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MicrocontrollerProps {
    /// Logic supply, also the voltage of the `5V` rail.
    pub vcc: f64,
    pub board: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for MicrocontrollerProps {
    fn default() -> Self {
        Self {
            vcc: 5.0,
            board: "uno".to_string(),
            extra: BTreeMap::new(),
        }
    }
}

impl Props for MicrocontrollerProps {
    fn check(&self) -> Result<(), DeviceError> {
        require_positive("vcc", self.vcc)
    }
}

/// GPIO register file shared between the board and its firmware.
#[derive(Debug, Clone)]
struct GpioBank {
    vcc: f64,
    modes: [PinMode; GPIO_COUNT as usize],
    /// Output voltage per GPIO, only meaningful in `Output` mode.
    levels: [f64; GPIO_COUNT as usize],
}

impl GpioBank {
    fn new(vcc: f64) -> Self {
        Self {
            vcc,
            modes: [PinMode::Unset; GPIO_COUNT as usize],
            levels: [0.0; GPIO_COUNT as usize],
        }
    }

    fn drive(&self, ctx: &mut dyn SimContext) {
        for (n, mode) in self.modes.iter().enumerate() {
            if *mode == PinMode::Output {
                ctx.drive_pin(GPIO_BASE + n, self.levels[n], 0.0);
            }
        }
    }
}

/// A user control program running on the board.
pub trait Firmware: Send {
    /// Runs once when the board enters the simulation.
    fn setup(&mut self, io: &mut McuIo<'_>);

    /// Runs once per 1 ms tick.
    fn tick(&mut self, io: &mut McuIo<'_>);

    /// An interrupt attached with [`McuIo::attach_interrupt`] fired.
    fn on_interrupt(&mut self, _pin: u8, _edge: Edge, _io: &mut McuIo<'_>) {}
}

/// The board as firmware sees it. Out-of-range pin numbers are ignored.
pub struct McuIo<'a> {
    bank: &'a mut GpioBank,
    ctx: &'a mut dyn SimContext,
}

impl<'a> McuIo<'a> {
    pub fn pin_mode(&mut self, pin: u8, mode: PinMode) {
        if let Some(slot) = self.bank.modes.get_mut(pin as usize) {
            *slot = mode;
        }
    }

    pub fn mode(&self, pin: u8) -> Option<PinMode> {
        self.bank.modes.get(pin as usize).copied()
    }

    /// On an output, sets the level. On an input, toggles the pull-up like
    /// the real board does.
    pub fn digital_write(&mut self, pin: u8, high: bool) {
        let n = pin as usize;
        let Some(mode) = self.bank.modes.get(n).copied() else {
            return;
        };
        match mode {
            PinMode::Output => self.bank.levels[n] = if high { self.bank.vcc } else { 0.0 },
            PinMode::Input | PinMode::InputPullup => {
                self.bank.modes[n] = if high {
                    PinMode::InputPullup
                } else {
                    PinMode::Input
                };
            }
            PinMode::Unset => {}
        }
    }

    pub fn digital_read(&self, pin: u8) -> bool {
        let n = pin as usize;
        match self.bank.modes.get(n) {
            Some(PinMode::Output) => self.bank.levels[n] >= self.ctx.config().logic_threshold_v,
            Some(_) => gpio_index(pin)
                .map(|index| self.ctx.pin_level(index))
                .unwrap_or(false),
            None => false,
        }
    }

    /// 10-bit conversion against `vcc`. A floating pin reads noise.
    pub fn analog_read(&mut self, pin: u8) -> u16 {
        let Some(index) = gpio_index(pin) else {
            return 0;
        };
        match self.ctx.pin_voltage(index) {
            Some(v) => {
                let counts = (v / self.bank.vcc * f64::from(ADC_MAX)).round();
                counts.clamp(0.0, f64::from(ADC_MAX)) as u16
            }
            None => self.ctx.rng_int(0, i64::from(ADC_MAX)) as u16,
        }
    }

    /// 8-bit PWM, modelled as its average voltage. Puts the pin in `Output`.
    pub fn analog_write(&mut self, pin: u8, duty: u8) {
        let n = pin as usize;
        if n >= self.bank.modes.len() {
            return;
        }
        self.bank.modes[n] = PinMode::Output;
        self.bank.levels[n] = self.bank.vcc * f64::from(duty) / 255.0;
    }

    pub fn millis(&self) -> u64 {
        self.ctx.now_ms()
    }

    pub fn attach_interrupt(&mut self, pin: u8, mode: EdgeMode) {
        if let Some(index) = gpio_index(pin) {
            self.ctx.attach_interrupt(index, mode);
        }
    }

    pub fn detach_interrupt(&mut self, pin: u8) {
        if let Some(index) = gpio_index(pin) {
            self.ctx.detach_interrupt(index);
        }
    }

    /// Uniform integer in `[min, max)`, as Arduino's `random` returns.
    pub fn random(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        self.ctx.rng_int(min, max - 1)
    }
}

pub struct Microcontroller {
    props: MicrocontrollerProps,
    bank: GpioBank,
    firmware: Option<Box<dyn Firmware>>,
}

impl std::fmt::Debug for Microcontroller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Microcontroller")
            .field("props", &self.props)
            .field("bank", &self.bank)
            .field("firmware", &self.firmware.is_some())
            .finish()
    }
}

impl Microcontroller {
    pub fn new(props: MicrocontrollerProps) -> Self {
        let bank = GpioBank::new(props.vcc);
        Self {
            props,
            bank,
            firmware: None,
        }
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, DeviceError> {
        Ok(Self::new(decode_props(value)?))
    }

    pub fn with_firmware(mut self, firmware: Box<dyn Firmware>) -> Self {
        self.firmware = Some(firmware);
        self
    }
}

impl Device for Microcontroller {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Microcontroller
    }

    fn pin_role(&self, pin: PinIndex) -> PinRole {
        match pin {
            RAIL_5V => PinRole::PowerSource {
                voltage: self.props.vcc,
                nominal: self.props.vcc,
            },
            RAIL_3V3 => PinRole::PowerSource {
                voltage: RAIL_3V3_VOLTS,
                nominal: RAIL_3V3_VOLTS,
            },
            2 => PinRole::Ground,
            _ => match gpio_number(pin).map(|n| self.bank.modes[n as usize]) {
                Some(PinMode::Input) => PinRole::DigitalInput,
                Some(PinMode::InputPullup) => PinRole::PullUpInput {
                    rail_v: self.props.vcc,
                },
                Some(PinMode::Output) => PinRole::DigitalOutput,
                Some(PinMode::Unset) | None => PinRole::Passive,
            },
        }
    }

    fn init(&mut self, ctx: &mut dyn SimContext) -> Result<(), DeviceError> {
        if let Some(firmware) = self.firmware.as_mut() {
            let mut io = McuIo {
                bank: &mut self.bank,
                ctx: &mut *ctx,
            };
            firmware.setup(&mut io);
        }
        self.bank.drive(ctx);
        Ok(())
    }

    fn update(&mut self, _dt_ms: f64, ctx: &mut dyn SimContext) -> Result<(), DeviceError> {
        if let Some(firmware) = self.firmware.as_mut() {
            let mut io = McuIo {
                bank: &mut self.bank,
                ctx: &mut *ctx,
            };
            firmware.tick(&mut io);
        }
        self.bank.drive(ctx);
        Ok(())
    }

    fn on_interrupt(
        &mut self,
        pin: PinIndex,
        edge: Edge,
        ctx: &mut dyn SimContext,
    ) -> Result<(), DeviceError> {
        let Some(number) = gpio_number(pin) else {
            return Ok(());
        };
        if let Some(firmware) = self.firmware.as_mut() {
            let mut io = McuIo {
                bank: &mut self.bank,
                ctx: &mut *ctx,
            };
            firmware.on_interrupt(number, edge, &mut io);
        }
        self.bank.drive(ctx);
        Ok(())
    }

    fn props(&self) -> Value {
        encode_props(&self.props)
    }

    fn set_property(&mut self, key: &str, value: &Value) -> Result<(), DeviceError> {
        self.props = patch_props(&self.props, key, value)?;
        self.bank.vcc = self.props.vcc;
        Ok(())
    }

    fn outputs(&self) -> Outputs {
        let mut outputs = Outputs::new();
        outputs.insert("firmware".to_string(), self.firmware.is_some().into());
        for (n, mode) in self.bank.modes.iter().enumerate() {
            if *mode == PinMode::Output {
                outputs.insert(PIN_NAMES[GPIO_BASE + n].to_string(), self.bank.levels[n].into());
            }
        }
        outputs
    }

    fn install_firmware(&mut self, firmware: Box<dyn Firmware>) -> Result<(), DeviceError> {
        self.firmware = Some(firmware);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::resolver::Drive;
    use crate::components::testing::FakeContext;

    struct Blink {
        period_ms: u64,
    }

    impl Firmware for Blink {
        fn setup(&mut self, io: &mut McuIo<'_>) {
            io.pin_mode(LED_BUILTIN, PinMode::Output);
        }

        fn tick(&mut self, io: &mut McuIo<'_>) {
            let on = (io.millis() / self.period_ms) % 2 == 1;
            io.digital_write(LED_BUILTIN, on);
        }
    }

    fn d13() -> PinIndex {
        gpio_index(LED_BUILTIN).unwrap()
    }

    #[test]
    fn test_pin_table() {
        assert_eq!(PIN_NAMES.len(), 3 + GPIO_COUNT as usize);
        assert_eq!(PIN_NAMES[d13()], "D13");
        assert_eq!(PIN_NAMES[gpio_index(A0).unwrap()], "A0");
        assert_eq!(gpio_number(d13()), Some(13));
        assert_eq!(gpio_number(RAIL_5V), None);
        assert_eq!(gpio_index(20), None);
    }

    #[test]
    fn test_unconfigured_gpio_is_passive() {
        let mcu = Microcontroller::new(MicrocontrollerProps::default());
        assert_eq!(mcu.pin_role(d13()), PinRole::Passive);
        assert_eq!(mcu.pin_role(2), PinRole::Ground);
    }

    #[test]
    fn test_blink_firmware_drives_led_pin() {
        let mut mcu = Microcontroller::new(MicrocontrollerProps::default())
            .with_firmware(Box::new(Blink { period_ms: 10 }));
        let mut ctx = FakeContext::new(PIN_NAMES.len());
        mcu.init(&mut ctx).unwrap();
        assert_eq!(mcu.pin_role(d13()), PinRole::DigitalOutput);
        assert_eq!(ctx.drives.get(&d13()), Some(&Drive::ideal(0.0)));

        ctx.now = 15;
        mcu.update(1.0, &mut ctx).unwrap();
        assert_eq!(ctx.drives.get(&d13()), Some(&Drive::ideal(5.0)));
    }

    #[test]
    fn test_pullup_and_reads() {
        let mut bank = GpioBank::new(5.0);
        let mut ctx = FakeContext::new(PIN_NAMES.len());
        ctx.hold(gpio_index(2).unwrap(), 5.0)
            .hold(gpio_index(A0).unwrap(), 2.5);
        let mut io = McuIo {
            bank: &mut bank,
            ctx: &mut ctx,
        };
        io.pin_mode(2, PinMode::Input);
        io.digital_write(2, true);
        assert_eq!(io.mode(2), Some(PinMode::InputPullup));
        assert!(io.digital_read(2));
        assert_eq!(io.analog_read(A0), 512);
        io.analog_write(9, 51);
        assert_eq!(io.mode(9), Some(PinMode::Output));
        assert_eq!(io.random(3, 3), 3);
        let wide = io.random(i64::MIN, i64::MAX);
        assert!(wide < i64::MAX);
    }

    #[test]
    fn test_interrupts_map_to_gpio_numbers() {
        struct Counter;
        impl Firmware for Counter {
            fn setup(&mut self, io: &mut McuIo<'_>) {
                io.attach_interrupt(2, EdgeMode::Falling);
            }
            fn tick(&mut self, _io: &mut McuIo<'_>) {}
            fn on_interrupt(&mut self, pin: u8, _edge: Edge, io: &mut McuIo<'_>) {
                io.pin_mode(LED_BUILTIN, PinMode::Output);
                io.digital_write(LED_BUILTIN, pin == 2);
            }
        }

        let mut mcu = Microcontroller::new(MicrocontrollerProps::default());
        mcu.install_firmware(Box::new(Counter)).unwrap();
        let mut ctx = FakeContext::new(PIN_NAMES.len());
        mcu.init(&mut ctx).unwrap();
        let d2 = gpio_index(2).unwrap();
        assert_eq!(ctx.attached.get(&d2), Some(&EdgeMode::Falling));

        mcu.on_interrupt(d2, Edge::Falling, &mut ctx).unwrap();
        assert_eq!(ctx.drives.get(&d13()), Some(&Drive::ideal(5.0)));
        assert_eq!(mcu.outputs()["D13"], crate::components::Reading::Number(5.0));
    }
}
