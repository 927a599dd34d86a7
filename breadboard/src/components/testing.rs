//! Recording context for device unit tests. Pin `n` lives on net `n`.

use std::collections::BTreeMap;

use super::{Edge, EdgeMode, PinIndex, SimContext};
use crate::circuit::resolver::{Drive, NetView};
use crate::circuit::NetId;
use crate::core::EngineConfig;
use crate::diagnostics::WarningCode;
use crate::rng::SeededRng;

pub(crate) struct FakeContext {
    pub config: EngineConfig,
    pub now: u64,
    pub views: Vec<NetView>,
    pub connected: Vec<bool>,
    pub drives: BTreeMap<PinIndex, Drive>,
    pub scheduled: Vec<(u64, u64)>,
    pub raised: Vec<(PinIndex, Edge)>,
    pub attached: BTreeMap<PinIndex, EdgeMode>,
    pub bridges: BTreeMap<String, (PinIndex, PinIndex)>,
    pub warnings: Vec<(WarningCode, String)>,
    pub rng: SeededRng,
}

impl FakeContext {
    pub fn new(pins: usize) -> Self {
        Self {
            config: EngineConfig::default(),
            now: 0,
            views: vec![NetView::FLOATING; pins],
            connected: vec![false; pins],
            drives: BTreeMap::new(),
            scheduled: Vec::new(),
            raised: Vec::new(),
            attached: BTreeMap::new(),
            bridges: BTreeMap::new(),
            warnings: Vec::new(),
            rng: SeededRng::new(42),
        }
    }

    /// Put `pin` on a stiff source at `voltage`.
    pub fn hold(&mut self, pin: PinIndex, voltage: f64) -> &mut Self {
        self.views[pin] = NetView {
            voltage: Some(voltage),
            ohms: 0.0,
        };
        self.connected[pin] = true;
        self
    }

    /// Put `pin` on a weak source.
    pub fn pull(&mut self, pin: PinIndex, voltage: f64, ohms: f64) -> &mut Self {
        self.views[pin] = NetView {
            voltage: Some(voltage),
            ohms,
        };
        self.connected[pin] = true;
        self
    }

    pub fn codes(&self) -> Vec<WarningCode> {
        self.warnings.iter().map(|(code, _)| *code).collect()
    }
}

impl SimContext for FakeContext {
    fn now_ms(&self) -> u64 {
        self.now
    }

    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn component_id(&self) -> &str {
        "dut"
    }

    fn net_of(&self, pin: PinIndex) -> Option<NetId> {
        (pin < self.views.len()).then_some(pin as NetId)
    }

    fn net_size(&self, net: NetId) -> usize {
        if self.connected.get(net as usize).copied().unwrap_or(false) {
            2
        } else {
            1
        }
    }

    fn voltage(&self, net: NetId) -> Option<f64> {
        self.views.get(net as usize).and_then(|v| v.voltage)
    }

    fn level(&self, net: NetId) -> bool {
        self.voltage(net)
            .map(|v| v >= self.config.logic_threshold_v)
            .unwrap_or(false)
    }

    fn source_ohms(&self, net: NetId) -> f64 {
        self.views
            .get(net as usize)
            .map(|v| v.ohms)
            .unwrap_or(f64::INFINITY)
    }

    fn external_view(&self, pin: PinIndex) -> NetView {
        self.views.get(pin).copied().unwrap_or(NetView::FLOATING)
    }

    fn set_voltage(&mut self, net: NetId, voltage: f64) {
        self.drives.insert(net as PinIndex, Drive::ideal(voltage));
    }

    fn drive_pin(&mut self, pin: PinIndex, voltage: f64, ohms: f64) {
        self.drives.insert(pin, Drive::through(voltage, ohms));
    }

    fn drive_through(&mut self, net: NetId, voltage: f64, ohms: f64) {
        self.drives.insert(net as PinIndex, Drive::through(voltage, ohms));
    }

    fn schedule(&mut self, delay_ms: u64, token: u64) {
        self.scheduled.push((self.now + delay_ms, token));
    }

    fn raise_interrupt(&mut self, pin: PinIndex, edge: Edge) {
        self.raised.push((pin, edge));
    }

    fn attach_interrupt(&mut self, pin: PinIndex, mode: EdgeMode) {
        self.attached.insert(pin, mode);
    }

    fn detach_interrupt(&mut self, pin: PinIndex) {
        self.attached.remove(&pin);
    }

    fn register_bridge(&mut self, name: &str, a: PinIndex, b: PinIndex) {
        self.bridges.insert(name.to_string(), (a, b));
    }

    fn unregister_bridge(&mut self, name: &str) {
        self.bridges.remove(name);
    }

    fn warn(&mut self, code: WarningCode, message: String) {
        self.warnings.push((code, message));
    }

    fn rng_next(&mut self) -> f64 {
        self.rng.next()
    }

    fn rng_int(&mut self, min: i64, max: i64) -> i64 {
        self.rng.next_int(min, max)
    }

    fn rng_gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        self.rng.next_gaussian_scaled(mean, std_dev)
    }
}
