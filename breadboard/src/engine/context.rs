//! The engine side of [`SimContext`].

use super::scheduler::CallbackAction;
use super::World;
use crate::circuit::netlist::PinRef;
use crate::circuit::resolver::{Drive, NetView};
use crate::circuit::{ComponentKey, NetId};
use crate::components::{Edge, EdgeMode, PinIndex, SimContext};
use crate::core::EngineConfig;
use crate::diagnostics::{Subject, WarningCode};

/// Context handed to one component for one hook call.
pub(crate) struct EngineContext<'a> {
    world: &'a mut World,
    key: ComponentKey,
    position: usize,
    pin_count: usize,
    id: &'a str,
}

impl<'a> EngineContext<'a> {
    pub(crate) fn new(
        world: &'a mut World,
        key: ComponentKey,
        position: usize,
        pin_count: usize,
        id: &'a str,
    ) -> Self {
        Self {
            world,
            key,
            position,
            pin_count,
            id,
        }
    }

    fn pin_ref(&self, pin: PinIndex) -> PinRef {
        PinRef {
            component: self.position,
            pin,
        }
    }

    /// First pin of this component that sits on `net`.
    fn own_pin_on(&self, net: NetId) -> Option<PinIndex> {
        (0..self.pin_count).find(|pin| self.world.netlist.net_of(self.pin_ref(*pin)) == Some(net))
    }

    fn put_drive(&mut self, pin: PinIndex, drive: Drive) {
        if pin < self.pin_count {
            self.world.drives.insert((self.key, pin), drive);
        }
    }
}

impl SimContext for EngineContext<'_> {
    fn now_ms(&self) -> u64 {
        self.world.now_ms
    }

    fn config(&self) -> &EngineConfig {
        &self.world.config
    }

    fn component_id(&self) -> &str {
        self.id
    }

    fn net_of(&self, pin: PinIndex) -> Option<NetId> {
        if pin >= self.pin_count {
            return None;
        }
        self.world.netlist.net_of(self.pin_ref(pin))
    }

    fn net_size(&self, net: NetId) -> usize {
        self.world.netlist.net_size(net)
    }

    fn voltage(&self, net: NetId) -> Option<f64> {
        self.world.resolution.voltage(net)
    }

    fn level(&self, net: NetId) -> bool {
        self.world
            .resolution
            .level(net, self.world.config.logic_threshold_v)
    }

    fn source_ohms(&self, net: NetId) -> f64 {
        self.world.resolution.source_ohms(net)
    }

    fn external_view(&self, pin: PinIndex) -> NetView {
        self.net_of(pin)
            .map(|net| self.world.resolution.external_view(net, self.position))
            .unwrap_or(NetView::FLOATING)
    }

    fn set_voltage(&mut self, net: NetId, voltage: f64) {
        match self.own_pin_on(net) {
            Some(pin) => self.put_drive(pin, Drive::ideal(voltage)),
            None => tracing::debug!(component = self.id, net, "ignoring drive onto a foreign net"),
        }
    }

    fn drive_pin(&mut self, pin: PinIndex, voltage: f64, ohms: f64) {
        self.put_drive(pin, Drive::through(voltage, ohms));
    }

    fn drive_through(&mut self, net: NetId, voltage: f64, ohms: f64) {
        match self.own_pin_on(net) {
            Some(pin) => self.put_drive(pin, Drive::through(voltage, ohms)),
            None => tracing::debug!(component = self.id, net, "ignoring drive onto a foreign net"),
        }
    }

    fn schedule(&mut self, delay_ms: u64, token: u64) {
        let due = self.world.now_ms.saturating_add(delay_ms);
        self.world
            .scheduler
            .schedule(due, self.key, CallbackAction::Timer { token });
    }

    fn raise_interrupt(&mut self, pin: PinIndex, edge: Edge) {
        if pin < self.pin_count {
            self.world.pending_sync.push((self.key, pin, edge));
        }
    }

    fn attach_interrupt(&mut self, pin: PinIndex, mode: EdgeMode) {
        if pin < self.pin_count {
            self.world.interrupts.attach(self.key, pin, mode);
        }
    }

    fn detach_interrupt(&mut self, pin: PinIndex) {
        self.world.interrupts.detach(self.key, pin);
    }

    fn register_bridge(&mut self, name: &str, a: PinIndex, b: PinIndex) {
        if a >= self.pin_count || b >= self.pin_count {
            return;
        }
        if self.world.bridges.register(self.key, name, a, b) {
            self.world.topology_dirty = true;
        }
    }

    fn unregister_bridge(&mut self, name: &str) {
        if self.world.bridges.unregister(self.key, name) {
            self.world.topology_dirty = true;
        }
    }

    fn warn(&mut self, code: WarningCode, message: String) {
        let now = self.world.now_ms;
        self.world
            .diagnostics
            .push(code, message, Subject::component(self.id), now);
    }

    fn rng_next(&mut self) -> f64 {
        self.world.rng.next()
    }

    fn rng_int(&mut self, min: i64, max: i64) -> i64 {
        self.world.rng.next_int(min, max)
    }

    fn rng_gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        self.world.rng.next_gaussian_scaled(mean, std_dev)
    }
}
