//! Deterministic tick engine.
//!
//! One logical tick is 1 ms of simulated time and runs, in order:
//!
//! 1. queued edits, net rebuild, `init` for new components,
//! 2. resolution pass 1 (sees last tick's drives),
//! 3. `update` for every component, in component order,
//! 4. due callbacks, by `(due, seq)`,
//! 5. net rebuild if bridges changed, resolution pass 2,
//! 6. `on_pin_change` for pins whose value moved between the passes,
//! 7. interrupt edge detection against the previous tick.
//!
//! Components live in `slots`; everything a hook may touch lives in
//! [`World`], so a hook borrows its own slot and the world independently.

mod context;
pub mod document;
pub mod edit;
pub mod interrupts;
pub mod scheduler;
pub mod snapshot;

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};

use crate::circuit::netlist::{self, Netlist, PinRef, TopologyIssue};
use crate::circuit::resolver::{self, Drive, Resolution};
use crate::circuit::{ComponentKey, Endpoint, NetId, Point, Wire};
use crate::components::{
    ComponentKind, Device, DeviceError, Edge, Firmware, Outputs, PinIndex, PinRole, Reading,
    SimContext,
};
use crate::core::{DiagnosticsPolicy, EngineConfig, SimError};
use crate::diagnostics::{Diagnostics, Subject, Warning, WarningCode};
use crate::rng::SeededRng;
use crate::schema::DocumentMetadata;

use context::EngineContext;
use interrupts::{BridgeRegistry, InterruptTable};
use scheduler::{CallbackAction, Scheduler};

pub use edit::{Edit, EditOutcome};
pub use snapshot::{NetReport, Snapshot};

/// Simulated milliseconds per tick.
pub const TICK_MS: f64 = 1.0;

/// Cap on synchronous interrupt deliveries triggered by one hook call.
const MAX_SYNC_DELIVERIES: usize = 256;

/// Voltage change that counts as a pin change.
const PIN_CHANGE_EPSILON_V: f64 = 1.0e-6;

pub(crate) struct ComponentSlot {
    pub(crate) key: ComponentKey,
    pub(crate) id: String,
    pub(crate) kind: ComponentKind,
    pub(crate) device: Box<dyn Device>,
    pub(crate) faulted: bool,
    pub(crate) initialized: bool,
    pub(crate) position: Option<Point>,
}

/// Engine state reachable from a component hook.
pub(crate) struct World {
    pub(crate) config: EngineConfig,
    pub(crate) now_ms: u64,
    pub(crate) rng: SeededRng,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) wires: Vec<Wire>,
    pub(crate) netlist: Netlist,
    /// `(key, id, kind)` per component position at the last rebuild.
    pub(crate) layout: Vec<(ComponentKey, String, ComponentKind)>,
    pub(crate) topology_issues: Vec<TopologyIssue>,
    pub(crate) resolution: Resolution,
    pub(crate) roles: Vec<Vec<PinRole>>,
    pub(crate) drives: BTreeMap<(ComponentKey, PinIndex), Drive>,
    pub(crate) scheduler: Scheduler,
    pub(crate) interrupts: InterruptTable,
    pub(crate) bridges: BridgeRegistry,
    pub(crate) topology_dirty: bool,
    /// Interrupts raised with `raise_interrupt`, delivered after the hook returns.
    pub(crate) pending_sync: Vec<(ComponentKey, PinIndex, Edge)>,
    pub(crate) key_index: HashMap<ComponentKey, usize>,
    /// Hazards already reported this tick.
    pub(crate) reported: HashSet<(WarningCode, String)>,
}

impl World {
    fn new(config: EngineConfig) -> Self {
        Self {
            rng: SeededRng::new(config.seed),
            diagnostics: Diagnostics::new(config.diagnostics_policy),
            config,
            now_ms: 0,
            wires: Vec::new(),
            netlist: Netlist::default(),
            layout: Vec::new(),
            topology_issues: Vec::new(),
            resolution: Resolution::default(),
            roles: Vec::new(),
            drives: BTreeMap::new(),
            scheduler: Scheduler::new(),
            interrupts: InterruptTable::default(),
            bridges: BridgeRegistry::default(),
            topology_dirty: true,
            pending_sync: Vec::new(),
            key_index: HashMap::new(),
            reported: HashSet::new(),
        }
    }

    fn endpoint(&self, pin: PinRef) -> Option<Endpoint> {
        let (_, id, kind) = self.layout.get(pin.component)?;
        let name = kind.pin_names().get(pin.pin)?;
        Some(Endpoint::new(id.clone(), *name))
    }

    pub(crate) fn members(&self, net: NetId) -> Vec<Endpoint> {
        self.netlist
            .net(net)
            .map(|n| n.members.iter().filter_map(|m| self.endpoint(*m)).collect())
            .unwrap_or_default()
    }

    fn report_once(&mut self, code: WarningCode, key: String, subject: Subject, message: String) {
        if self.reported.insert((code, key)) {
            self.diagnostics.push(code, message, subject, self.now_ms);
        }
    }

    fn report_topology_issues(&mut self) {
        let issues = self.topology_issues.clone();
        for issue in issues {
            match issue {
                TopologyIssue::DanglingWire { wire, reason } => self.report_once(
                    WarningCode::DanglingWire,
                    format!("wire:{}", wire),
                    Subject::wire(wire.as_str()),
                    format!("Wire {} is dangling: {}", wire, reason),
                ),
                TopologyIssue::UnconnectedPin { component, pin } => self.report_once(
                    WarningCode::UnconnectedPin,
                    format!("{}:{}", component, pin),
                    Subject::component(component.as_str()),
                    format!("Pin {}:{} is not connected", component, pin),
                ),
            }
        }
    }

    /// Net of `(key, pin)` in the current build.
    fn net_of_key(&self, key: ComponentKey, pin: PinIndex) -> Option<NetId> {
        let component = *self.key_index.get(&key)?;
        self.netlist.net_of(PinRef { component, pin })
    }
}

#[derive(Debug, Clone, Copy)]
enum Hook {
    Init,
    Update(f64),
    PinChange(PinIndex),
    Timer(u64),
    Interrupt(PinIndex, Edge),
}

impl Hook {
    fn name(&self) -> &'static str {
        match self {
            Hook::Init => "init",
            Hook::Update(_) => "update",
            Hook::PinChange(_) => "on_pin_change",
            Hook::Timer(_) => "on_timer",
            Hook::Interrupt(..) => "on_interrupt",
        }
    }

    fn call(self, device: &mut dyn Device, ctx: &mut dyn SimContext) -> Result<(), DeviceError> {
        match self {
            Hook::Init => device.init(ctx),
            Hook::Update(dt_ms) => device.update(dt_ms, ctx),
            Hook::PinChange(pin) => device.on_pin_change(pin, ctx),
            Hook::Timer(token) => device.on_timer(token, ctx),
            Hook::Interrupt(pin, edge) => device.on_interrupt(pin, edge, ctx),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

/// Run one hook on one component, isolating errors and panics.
fn dispatch(slot: &mut ComponentSlot, world: &mut World, position: usize, hook: Hook) {
    if slot.faulted {
        return;
    }
    let outcome = {
        let ComponentSlot {
            key,
            id,
            kind,
            device,
            ..
        } = &mut *slot;
        let mut ctx = EngineContext::new(world, *key, position, kind.pin_count(), id.as_str());
        panic::catch_unwind(AssertUnwindSafe(|| hook.call(device.as_mut(), &mut ctx)))
    };
    let reason = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(error)) => error.to_string(),
        Err(payload) => panic_message(payload.as_ref()),
    };
    fault(slot, world, hook, &reason);
}

fn fault(slot: &mut ComponentSlot, world: &mut World, hook: Hook, reason: &str) {
    slot.faulted = true;
    let key = slot.key;
    world.scheduler.cancel_owner(key);
    world.interrupts.cancel_owner(key);
    if world.bridges.cancel_owner(key) > 0 {
        world.topology_dirty = true;
    }
    world.drives.retain(|(owner, _), _| *owner != key);
    world.pending_sync.retain(|(owner, _, _)| *owner != key);
    tracing::warn!(component = %slot.id, hook = hook.name(), reason, "component faulted");
    let now = world.now_ms;
    world.diagnostics.push(
        WarningCode::ComponentFault,
        format!("{} faulted in {}: {}", slot.id, hook.name(), reason),
        Subject::component(slot.id.as_str()),
        now,
    );
}

type PinValue = (Option<f64>, bool);

fn pin_changed(before: PinValue, after: PinValue) -> bool {
    if before.1 != after.1 {
        return true;
    }
    match (before.0, after.0) {
        (Some(a), Some(b)) => (a - b).abs() > PIN_CHANGE_EPSILON_V,
        (None, None) => false,
        _ => true,
    }
}

/// A single simulation instance. Owns the circuit, the clock and the RNG.
pub struct Engine {
    slots: Vec<ComponentSlot>,
    world: World,
    queue: VecDeque<Edit>,
    running: bool,
    accumulator_ms: f64,
    next_key: u32,
    wire_counter: u64,
    junction_counter: u64,
    metadata: DocumentMetadata,
    edit_errors: Vec<String>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("components", &self.slots.len())
            .field("wires", &self.world.wires.len())
            .field("now_ms", &self.world.now_ms)
            .field("running", &self.running)
            .finish()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::build(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    pub fn with_seed(seed: u32) -> Self {
        Self::build(EngineConfig {
            seed,
            ..EngineConfig::default()
        })
    }

    fn build(config: EngineConfig) -> Self {
        Self {
            slots: Vec::new(),
            world: World::new(config),
            queue: VecDeque::new(),
            running: true,
            accumulator_ms: 0.0,
            next_key: 0,
            wire_counter: 0,
            junction_counter: 0,
            metadata: DocumentMetadata::fresh(),
            edit_errors: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.world.config
    }

    pub fn seed(&self) -> u32 {
        self.world.config.seed
    }

    pub fn now_ms(&self) -> u64 {
        self.world.now_ms
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        if self.running != running {
            tracing::info!(running, now_ms = self.world.now_ms, "simulation run state changed");
        }
        self.running = running;
    }

    pub fn time_scale(&self) -> f64 {
        self.world.config.time_scale
    }

    pub fn set_time_scale(&mut self, time_scale: f64) -> Result<(), SimError> {
        let config = EngineConfig {
            time_scale,
            ..self.world.config.clone()
        };
        config.validate()?;
        self.world.config = config;
        Ok(())
    }

    pub fn set_diagnostics_policy(&mut self, policy: DiagnosticsPolicy) {
        self.world.config.diagnostics_policy = policy;
        self.world.diagnostics.set_policy(policy);
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.metadata.name = name.into();
    }

    /// Advance by `wall_dt_ms` of host time scaled by `time_scale`. Runs every
    /// whole tick that accumulated and returns how many ran. A paused engine
    /// only applies queued edits and rebuilds its nets; their voltages stay
    /// unresolved until the next tick.
    pub fn step(&mut self, wall_dt_ms: f64) -> u64 {
        if !self.running {
            self.apply_queued();
            self.ensure_topology();
            return 0;
        }
        if !(wall_dt_ms.is_finite() && wall_dt_ms > 0.0) {
            return 0;
        }
        self.accumulator_ms += wall_dt_ms * self.world.config.time_scale;
        let ticks = (self.accumulator_ms / TICK_MS).floor();
        self.accumulator_ms -= ticks * TICK_MS;
        let ticks = ticks as u64;
        for _ in 0..ticks {
            self.tick();
        }
        ticks
    }

    /// Run exactly `ticks` ticks, whether or not the engine is running.
    pub fn run_ticks(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Queue an edit for the start of the next tick.
    pub fn submit(&mut self, edit: Edit) {
        self.queue.push_back(edit);
    }

    pub fn pending_edits(&self) -> usize {
        self.queue.len()
    }

    /// Errors from queued edits that could not be applied.
    pub fn take_edit_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.edit_errors)
    }

    fn apply_queued(&mut self) {
        while let Some(edit) = self.queue.pop_front() {
            if let Err(error) = self.apply(edit) {
                tracing::warn!(%error, "queued edit rejected");
                self.edit_errors.push(error.to_string());
            }
        }
    }

    pub fn install_firmware(&mut self, id: &str, firmware: Box<dyn Firmware>) -> Result<(), SimError> {
        let position = self.position(id)?;
        let slot = &mut self.slots[position];
        slot.device
            .install_firmware(firmware)
            .map_err(|source| SimError::Device {
                component: id.to_string(),
                source,
            })?;
        // Run setup on the next tick.
        slot.initialized = false;
        slot.faulted = false;
        Ok(())
    }

    pub fn warnings(&self) -> &[Warning] {
        self.world.diagnostics.warnings()
    }

    pub fn drain_warnings(&mut self) -> Vec<Warning> {
        self.world.diagnostics.drain()
    }

    pub fn warning_count(&self, code: WarningCode) -> usize {
        self.world.diagnostics.count(code)
    }

    pub fn component_ids(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn kind_of(&self, id: &str) -> Option<ComponentKind> {
        self.slot(id).map(|s| s.kind)
    }

    pub fn wires(&self) -> &[Wire] {
        &self.world.wires
    }

    pub fn outputs(&self, id: &str) -> Option<Outputs> {
        self.slot(id).map(|s| s.device.outputs())
    }

    pub fn output(&self, id: &str, key: &str) -> Option<Reading> {
        self.outputs(id).and_then(|mut outputs| outputs.remove(key))
    }

    pub fn properties(&self, id: &str) -> Option<serde_json::Value> {
        self.slot(id).map(|s| s.device.props())
    }

    pub fn is_faulted(&self, id: &str) -> bool {
        self.slot(id).map(|s| s.faulted).unwrap_or(false)
    }

    /// Net of `id:pin` as of the last rebuild.
    pub fn net_of(&self, id: &str, pin: &str) -> Option<NetId> {
        let component = self.world.layout.iter().position(|(_, cid, _)| cid == id)?;
        let pin = self.world.layout[component].2.pin_index(pin)?;
        self.world.netlist.net_of(PinRef { component, pin })
    }

    pub fn voltage_at(&self, id: &str, pin: &str) -> Option<f64> {
        self.net_of(id, pin)
            .and_then(|net| self.world.resolution.voltage(net))
    }

    pub fn level_at(&self, id: &str, pin: &str) -> bool {
        self.net_of(id, pin)
            .map(|net| {
                self.world
                    .resolution
                    .level(net, self.world.config.logic_threshold_v)
            })
            .unwrap_or(false)
    }

    pub fn pending_callbacks(&self, id: &str) -> usize {
        self.slot(id)
            .map(|s| self.world.scheduler.pending_for(s.key))
            .unwrap_or(0)
    }

    pub fn interrupt_count(&self, id: &str) -> usize {
        self.slot(id)
            .map(|s| self.world.interrupts.iter().filter(|a| a.owner == s.key).count())
            .unwrap_or(0)
    }

    pub fn bridges_of(&self, id: &str) -> Vec<String> {
        self.slot(id)
            .map(|s| {
                self.world
                    .bridges
                    .owned_by(s.key)
                    .into_iter()
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Build nets from the current topology without touching engine state.
    /// Returns the members of each net, in net order.
    pub fn compute_nets(&self) -> Vec<Vec<Endpoint>> {
        let components: Vec<(&str, ComponentKind)> =
            self.slots.iter().map(|s| (s.id.as_str(), s.kind)).collect();
        let positions: HashMap<ComponentKey, usize> = self
            .slots
            .iter()
            .enumerate()
            .map(|(position, s)| (s.key, position))
            .collect();
        let links = self.world.bridges.links(|key| positions.get(&key).copied());
        let (built, _) = netlist::build(&components, &self.world.wires, &links);
        built
            .nets()
            .iter()
            .map(|net| {
                net.members
                    .iter()
                    .map(|m| {
                        let slot = &self.slots[m.component];
                        Endpoint::new(slot.id.clone(), slot.kind.pin_names()[m.pin])
                    })
                    .collect()
            })
            .collect()
    }

    fn slot(&self, id: &str) -> Option<&ComponentSlot> {
        self.slots.iter().find(|s| s.id == id)
    }

    fn position(&self, id: &str) -> Result<usize, SimError> {
        self.slots
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| SimError::UnknownComponent(id.to_string()))
    }

    fn reindex(&mut self) {
        self.world.key_index = self
            .slots
            .iter()
            .enumerate()
            .map(|(position, s)| (s.key, position))
            .collect();
    }

    fn run_hook(&mut self, position: usize, hook: Hook) {
        if let Some(slot) = self.slots.get_mut(position) {
            dispatch(slot, &mut self.world, position, hook);
        }
    }

    /// Deliver interrupts raised synchronously by the last hook to every
    /// attachment on the same net whose mode accepts the edge.
    fn flush_sync(&mut self) {
        let mut budget = MAX_SYNC_DELIVERIES;
        while !self.world.pending_sync.is_empty() {
            let batch = std::mem::take(&mut self.world.pending_sync);
            for (source, pin, edge) in batch {
                let Some(net) = self.world.net_of_key(source, pin) else {
                    continue;
                };
                let targets: Vec<(ComponentKey, PinIndex)> = self
                    .world
                    .interrupts
                    .iter()
                    .filter(|a| a.mode.accepts(edge))
                    .filter(|a| self.world.net_of_key(a.owner, a.pin) == Some(net))
                    .map(|a| (a.owner, a.pin))
                    .collect();
                for (owner, target_pin) in targets {
                    if budget == 0 {
                        tracing::warn!(now_ms = self.world.now_ms, "interrupt storm cut off");
                        self.world.pending_sync.clear();
                        return;
                    }
                    budget -= 1;
                    if let Some(&position) = self.world.key_index.get(&owner) {
                        self.run_hook(position, Hook::Interrupt(target_pin, edge));
                    }
                }
            }
        }
    }

    /// Rebuild nets if the topology changed. Returns whether it rebuilt.
    fn ensure_topology(&mut self) -> bool {
        if !self.world.topology_dirty {
            return false;
        }
        self.rebuild();
        true
    }

    fn rebuild(&mut self) {
        let components: Vec<(&str, ComponentKind)> =
            self.slots.iter().map(|s| (s.id.as_str(), s.kind)).collect();
        let key_index = &self.world.key_index;
        let links = self.world.bridges.links(|key| key_index.get(&key).copied());
        let (built, issues) = netlist::build(&components, &self.world.wires, &links);
        tracing::debug!(
            nets = built.len(),
            issues = issues.len(),
            now_ms = self.world.now_ms,
            "rebuilt nets"
        );

        self.world.netlist = built;
        self.world.layout = self
            .slots
            .iter()
            .map(|s| (s.key, s.id.clone(), s.kind))
            .collect();
        self.world.resolution = Resolution::default();
        self.world.topology_dirty = false;

        let changed = issues != self.world.topology_issues;
        self.world.topology_issues = issues;
        if changed || self.world.diagnostics.policy() == DiagnosticsPolicy::PerTick {
            self.world.report_topology_issues();
        }
    }

    fn collect_roles(&mut self) {
        self.world.roles = self
            .slots
            .iter()
            .map(|s| (0..s.kind.pin_count()).map(|p| s.device.pin_role(p)).collect())
            .collect();
    }

    fn resolve_pass(&mut self) {
        let world = &mut self.world;
        let drives: Vec<(PinRef, Drive)> = world
            .drives
            .iter()
            .filter_map(|(&(key, pin), &drive)| {
                world
                    .key_index
                    .get(&key)
                    .map(|&component| (PinRef { component, pin }, drive))
            })
            .collect();
        let (resolution, hazards) = resolver::resolve(
            &world.netlist,
            &world.roles,
            &drives,
            &world.config,
            &mut world.rng,
        );
        world.resolution = resolution;

        for hazard in hazards {
            let members = world.members(hazard.net);
            let key = members
                .first()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("net:{}", hazard.net));
            let listed: Vec<String> = members.iter().map(|m| m.to_string()).collect();
            world.report_once(
                hazard.code,
                key,
                Subject::net(hazard.net),
                format!("{} [{}]", hazard.message, listed.join(", ")),
            );
        }
    }

    fn pin_values(&self) -> Vec<Vec<PinValue>> {
        let threshold = self.world.config.logic_threshold_v;
        self.slots
            .iter()
            .enumerate()
            .map(|(component, s)| {
                (0..s.kind.pin_count())
                    .map(|pin| {
                        match self.world.netlist.net_of(PinRef { component, pin }) {
                            Some(net) => (
                                self.world.resolution.voltage(net),
                                self.world.resolution.level(net, threshold),
                            ),
                            None => (None, false),
                        }
                    })
                    .collect()
            })
            .collect()
    }

    fn init_pending(&mut self) {
        for position in 0..self.slots.len() {
            if self.slots[position].initialized {
                continue;
            }
            self.slots[position].initialized = true;
            self.run_hook(position, Hook::Init);
            self.flush_sync();
        }
    }

    fn detect_edges(&mut self) {
        let World {
            interrupts,
            netlist,
            resolution,
            key_index,
            config,
            scheduler,
            now_ms,
            ..
        } = &mut self.world;
        let threshold = config.logic_threshold_v;
        let fired = interrupts.detect_edges(|owner, pin| {
            let component = *key_index.get(&owner)?;
            let net = netlist.net_of(PinRef { component, pin })?;
            Some(resolution.level(net, threshold))
        });
        let due = *now_ms + config.interrupt_latency_steps();
        for (owner, pin, edge) in fired {
            scheduler.schedule(due, owner, CallbackAction::DeliverInterrupt { pin, edge });
        }
    }

    fn tick(&mut self) {
        self.world.diagnostics.begin_tick();
        self.world.reported.clear();

        self.apply_queued();
        if !self.ensure_topology() && self.world.diagnostics.policy() == DiagnosticsPolicy::PerTick
        {
            self.world.report_topology_issues();
        }
        self.init_pending();
        self.ensure_topology();

        self.collect_roles();
        self.resolve_pass();
        let before = self.pin_values();

        self.world.drives.clear();
        for position in 0..self.slots.len() {
            self.run_hook(position, Hook::Update(TICK_MS));
            self.flush_sync();
        }

        let limit = self.world.scheduler.next_seq();
        while let Some(callback) = self
            .world
            .scheduler
            .pop_due_before(self.world.now_ms, limit)
        {
            let Some(&position) = self.world.key_index.get(&callback.owner) else {
                continue;
            };
            let hook = match callback.action {
                CallbackAction::Timer { token } => Hook::Timer(token),
                CallbackAction::DeliverInterrupt { pin, edge } => Hook::Interrupt(pin, edge),
            };
            self.run_hook(position, hook);
            self.flush_sync();
        }

        self.ensure_topology();
        self.collect_roles();
        self.resolve_pass();

        let after = self.pin_values();
        for (position, (old, new)) in before.iter().zip(after.iter()).enumerate() {
            for (pin, (a, b)) in old.iter().zip(new.iter()).enumerate() {
                if pin_changed(*a, *b) {
                    self.run_hook(position, Hook::PinChange(pin));
                    self.flush_sync();
                }
            }
        }

        self.detect_edges();
        self.world.now_ms += 1;
    }
}
