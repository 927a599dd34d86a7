//! Topology and property edits.
//!
//! Edits are applied between ticks, either immediately through
//! [`Engine::apply`] or queued with [`Engine::submit`] and applied in
//! submission order at the start of the next tick.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ComponentSlot, Engine};
use crate::circuit::{Endpoint, Point, Wire};
use crate::components::{self, ComponentKind, DeviceInput};
use crate::core::SimError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Edit {
    AddComponent {
        id: String,
        kind: ComponentKind,
        #[serde(default)]
        properties: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<Point>,
    },
    RemoveComponent {
        id: String,
    },
    AddWire {
        wire: Wire,
    },
    RemoveWire {
        id: String,
    },
    SetProperty {
        component: String,
        key: String,
        value: Value,
    },
    /// Split a wire in two through a new junction.
    InsertJunction {
        wire: String,
        #[serde(default, rename = "junctionId", skip_serializing_if = "Option::is_none")]
        junction_id: Option<String>,
    },
    /// Remove a junction and reconnect everything it joined.
    RemoveJunction {
        id: String,
    },
    Input {
        component: String,
        input: DeviceInput,
    },
}

/// Ids created and removed by one edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EditOutcome {
    pub created: Vec<String>,
    pub removed: Vec<String>,
}

impl EditOutcome {
    fn created(id: impl Into<String>) -> Self {
        Self {
            created: vec![id.into()],
            removed: Vec::new(),
        }
    }

    fn removed(id: impl Into<String>) -> Self {
        Self {
            created: Vec::new(),
            removed: vec![id.into()],
        }
    }
}

impl Engine {
    /// Apply one edit now. Must not be called from inside a tick.
    pub fn apply(&mut self, edit: Edit) -> Result<EditOutcome, SimError> {
        match edit {
            Edit::AddComponent {
                id,
                kind,
                properties,
                position,
            } => self.add_slot(id, kind, &properties, position),
            Edit::RemoveComponent { id } => self.remove_component_inner(&id),
            Edit::AddWire { wire } => self.add_wire(wire),
            Edit::RemoveWire { id } => {
                let index = self.wire_index(&id)?;
                self.world.wires.remove(index);
                self.world.topology_dirty = true;
                Ok(EditOutcome::removed(id))
            }
            Edit::SetProperty {
                component,
                key,
                value,
            } => {
                let position = self.position(&component)?;
                self.slots[position]
                    .device
                    .set_property(&key, &value)
                    .map_err(|source| SimError::Device {
                        component: component.clone(),
                        source,
                    })?;
                Ok(EditOutcome::default())
            }
            Edit::InsertJunction { wire, junction_id } => self.split_wire(&wire, junction_id),
            Edit::RemoveJunction { id } => {
                let position = self.position(&id)?;
                if self.slots[position].kind != ComponentKind::Junction {
                    return Err(SimError::NotAJunction(id));
                }
                self.dissolve_junction(&id)
            }
            Edit::Input { component, input } => {
                let position = self.position(&component)?;
                self.slots[position]
                    .device
                    .apply_input(&input)
                    .map_err(|source| SimError::Device { component, source })?;
                Ok(EditOutcome::default())
            }
        }
    }

    pub fn add_component(&mut self, id: &str, kind: ComponentKind) -> Result<(), SimError> {
        self.add_component_with(id, kind, Value::Null)
    }

    pub fn add_component_with(
        &mut self,
        id: &str,
        kind: ComponentKind,
        properties: Value,
    ) -> Result<(), SimError> {
        self.apply(Edit::AddComponent {
            id: id.to_string(),
            kind,
            properties,
            position: None,
        })
        .map(|_| ())
    }

    pub fn remove_component(&mut self, id: &str) -> Result<EditOutcome, SimError> {
        self.apply(Edit::RemoveComponent { id: id.to_string() })
    }

    /// Wire two `"component:pin"` endpoints together. Returns the new wire id.
    pub fn connect(&mut self, from: &str, to: &str) -> Result<String, SimError> {
        let from = Endpoint::parse(from).ok_or_else(|| SimError::InvalidEndpoint(from.to_string()))?;
        let to = Endpoint::parse(to).ok_or_else(|| SimError::InvalidEndpoint(to.to_string()))?;
        let id = self.fresh_wire_id();
        self.add_wire(Wire::new(id.clone(), from, to))?;
        Ok(id)
    }

    pub fn disconnect(&mut self, wire: &str) -> Result<(), SimError> {
        self.apply(Edit::RemoveWire { id: wire.to_string() })
            .map(|_| ())
    }

    pub fn set_property(&mut self, id: &str, key: &str, value: Value) -> Result<(), SimError> {
        self.apply(Edit::SetProperty {
            component: id.to_string(),
            key: key.to_string(),
            value,
        })
        .map(|_| ())
    }

    pub fn send_input(&mut self, id: &str, input: DeviceInput) -> Result<(), SimError> {
        self.apply(Edit::Input {
            component: id.to_string(),
            input,
        })
        .map(|_| ())
    }

    pub fn press(&mut self, id: &str) -> Result<(), SimError> {
        self.send_input(id, DeviceInput::Press)
    }

    pub fn release(&mut self, id: &str) -> Result<(), SimError> {
        self.send_input(id, DeviceInput::Release)
    }

    pub fn toggle(&mut self, id: &str) -> Result<(), SimError> {
        self.send_input(id, DeviceInput::Toggle)
    }

    /// Returns the id of the new junction.
    pub fn insert_junction(&mut self, wire: &str) -> Result<String, SimError> {
        let outcome = self.apply(Edit::InsertJunction {
            wire: wire.to_string(),
            junction_id: None,
        })?;
        outcome
            .created
            .into_iter()
            .next()
            .ok_or_else(|| SimError::UnknownWire(wire.to_string()))
    }

    pub fn remove_junction(&mut self, id: &str) -> Result<EditOutcome, SimError> {
        self.apply(Edit::RemoveJunction { id: id.to_string() })
    }

    pub(crate) fn add_slot(
        &mut self,
        id: String,
        kind: ComponentKind,
        properties: &Value,
        position: Option<Point>,
    ) -> Result<EditOutcome, SimError> {
        if self.slot(&id).is_some() {
            return Err(SimError::DuplicateComponent(id));
        }
        let device = components::instantiate(kind, properties).map_err(|source| SimError::Device {
            component: id.clone(),
            source,
        })?;
        let key = crate::circuit::ComponentKey(self.next_key);
        self.next_key += 1;
        self.slots.push(ComponentSlot {
            key,
            id: id.clone(),
            kind,
            device,
            faulted: false,
            initialized: false,
            position,
        });
        self.reindex();
        self.world.topology_dirty = true;
        Ok(EditOutcome::created(id))
    }

    pub(crate) fn add_wire(&mut self, mut wire: Wire) -> Result<EditOutcome, SimError> {
        if wire.id.is_empty() {
            wire.id = self.fresh_wire_id();
        }
        if self.wire_index(&wire.id).is_ok() {
            return Err(SimError::DuplicateWire(wire.id));
        }
        let id = wire.id.clone();
        self.world.wires.push(wire);
        self.world.topology_dirty = true;
        Ok(EditOutcome::created(id))
    }

    fn remove_component_inner(&mut self, id: &str) -> Result<EditOutcome, SimError> {
        let position = self.position(id)?;
        if self.slots[position].kind == ComponentKind::Junction {
            return self.dissolve_junction(id);
        }
        let mut outcome = EditOutcome::default();
        self.world.wires.retain(|wire| {
            if wire.touches(id) {
                outcome.removed.push(wire.id.clone());
                false
            } else {
                true
            }
        });
        self.drop_slot(position);
        outcome.removed.push(id.to_string());
        Ok(outcome)
    }

    /// Remove the slot at `position` and everything it owns in the world.
    fn drop_slot(&mut self, position: usize) {
        let slot = self.slots.remove(position);
        let key = slot.key;
        self.world.scheduler.cancel_owner(key);
        self.world.interrupts.cancel_owner(key);
        self.world.bridges.cancel_owner(key);
        self.world.drives.retain(|(owner, _), _| *owner != key);
        self.world.pending_sync.retain(|(owner, _, _)| *owner != key);
        self.reindex();
        self.world.topology_dirty = true;
        tracing::debug!(component = %slot.id, "component removed");
    }

    fn split_wire(&mut self, wire_id: &str, junction_id: Option<String>) -> Result<EditOutcome, SimError> {
        let index = self.wire_index(wire_id)?;
        let junction = match junction_id {
            Some(id) => id,
            None => self.fresh_junction_id(),
        };
        let original = self.world.wires[index].clone();
        let position = original.route.get(original.route.len() / 2).copied();
        self.add_slot(junction.clone(), ComponentKind::Junction, &Value::Null, position)?;

        let node = Endpoint::new(junction.clone(), "node");
        let first_id = self.unused_wire_id(format!("{}-a", original.id));
        let mut first = Wire::new(first_id, original.from.clone(), node.clone());
        first.color = original.color.clone();
        self.world.wires[index] = first;
        let second_id = self.unused_wire_id(format!("{}-b", original.id));
        let mut second = Wire::new(second_id, node, original.to.clone());
        second.color = original.color;
        self.world.wires.insert(index + 1, second);
        self.world.topology_dirty = true;

        Ok(EditOutcome {
            created: vec![
                junction,
                self.world.wires[index].id.clone(),
                self.world.wires[index + 1].id.clone(),
            ],
            removed: vec![original.id],
        })
    }

    /// Remove a junction and star-connect its far endpoints from the first one.
    fn dissolve_junction(&mut self, id: &str) -> Result<EditOutcome, SimError> {
        let position = self.position(id)?;
        let mut outcome = EditOutcome::default();
        let mut far: Vec<Endpoint> = Vec::new();
        let mut color = None;
        self.world.wires.retain(|wire| {
            if !wire.touches(id) {
                return true;
            }
            let other = if wire.from.component == id { &wire.to } else { &wire.from };
            if other.component != id {
                far.push(other.clone());
                if color.is_none() {
                    color = Some(wire.color.clone());
                }
            }
            outcome.removed.push(wire.id.clone());
            false
        });
        self.drop_slot(position);
        outcome.removed.push(id.to_string());

        if let Some((hub, rest)) = far.split_first() {
            for endpoint in rest {
                let wire_id = self.fresh_wire_id();
                let mut wire = Wire::new(wire_id.clone(), hub.clone(), endpoint.clone());
                if let Some(ref color) = color {
                    wire.color = color.clone();
                }
                self.world.wires.push(wire);
                outcome.created.push(wire_id);
            }
        }
        self.world.topology_dirty = true;
        Ok(outcome)
    }

    fn wire_index(&self, id: &str) -> Result<usize, SimError> {
        self.world
            .wires
            .iter()
            .position(|w| w.id == id)
            .ok_or_else(|| SimError::UnknownWire(id.to_string()))
    }

    fn unused_wire_id(&mut self, preferred: String) -> String {
        if self.wire_index(&preferred).is_err() {
            preferred
        } else {
            self.fresh_wire_id()
        }
    }

    fn fresh_wire_id(&mut self) -> String {
        loop {
            self.wire_counter += 1;
            let id = format!("w{}", self.wire_counter);
            if self.wire_index(&id).is_err() {
                return id;
            }
        }
    }

    fn fresh_junction_id(&mut self) -> String {
        loop {
            self.junction_counter += 1;
            let id = format!("j{}", self.junction_counter);
            if self.slot(&id).is_none() {
                return id;
            }
        }
    }
}
