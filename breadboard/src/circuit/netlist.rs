//! Net builder.
//!
//! Every pin of every component gets an integer slot (`offset[component] +
//! pin`). Wires and active bridges union slots in a
//! [`petgraph::unionfind::UnionFind`]; the equivalence classes are the nets.
//! Net ids are handed out in order of each net's lowest slot, so the same
//! topology always yields the same ids and the same member order.
//!
//! Wires whose endpoints name a missing component or pin are left out of the
//! union and reported as [`TopologyIssue::DanglingWire`].

use std::collections::HashMap;

use petgraph::unionfind::UnionFind;

use super::{Endpoint, NetId, Wire};
use crate::components::{ComponentKind, PinIndex};

/// A pin addressed by component position and pin index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PinRef {
    pub component: usize,
    pub pin: PinIndex,
}

/// Internal connection contributed by a component, by component position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeLink {
    pub component: usize,
    pub a: PinIndex,
    pub b: PinIndex,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TopologyIssue {
    DanglingWire { wire: String, reason: String },
    UnconnectedPin { component: String, pin: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Net {
    pub id: NetId,
    /// Members in slot order.
    pub members: Vec<PinRef>,
}

#[derive(Debug, Clone, Default)]
pub struct Netlist {
    offsets: Vec<usize>,
    slot_net: Vec<NetId>,
    nets: Vec<Net>,
}

impl Netlist {
    pub fn net_of(&self, pin: PinRef) -> Option<NetId> {
        let offset = *self.offsets.get(pin.component)?;
        let end = self
            .offsets
            .get(pin.component + 1)
            .copied()
            .unwrap_or(self.slot_net.len());
        let slot = offset + pin.pin;
        if slot >= end {
            return None;
        }
        self.slot_net.get(slot).copied()
    }

    pub fn net(&self, id: NetId) -> Option<&Net> {
        self.nets.get(id as usize)
    }

    pub fn nets(&self) -> &[Net] {
        &self.nets
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    pub fn net_size(&self, id: NetId) -> usize {
        self.net(id).map(|n| n.members.len()).unwrap_or(0)
    }
}

/// Build nets for `components` (id and kind, in component order).
pub fn build(
    components: &[(&str, ComponentKind)],
    wires: &[Wire],
    bridges: &[BridgeLink],
) -> (Netlist, Vec<TopologyIssue>) {
    let mut offsets = Vec::with_capacity(components.len());
    let mut total = 0usize;
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(components.len());
    for (position, (id, kind)) in components.iter().enumerate() {
        offsets.push(total);
        total += kind.pin_count();
        index.insert(*id, position);
    }

    let mut issues = Vec::new();
    let mut sets: UnionFind<usize> = UnionFind::new(total);
    let mut wired = vec![false; total];

    let locate = |endpoint: &Endpoint| -> Result<usize, String> {
        let position = *index
            .get(endpoint.component.as_str())
            .ok_or_else(|| format!("component '{}' does not exist", endpoint.component))?;
        let kind = components[position].1;
        let pin = kind.pin_index(&endpoint.pin).ok_or_else(|| {
            format!("{} '{}' has no pin '{}'", kind, endpoint.component, endpoint.pin)
        })?;
        Ok(offsets[position] + pin)
    };

    for wire in wires {
        match (locate(&wire.from), locate(&wire.to)) {
            (Ok(a), Ok(b)) => {
                sets.union(a, b);
                wired[a] = true;
                wired[b] = true;
            }
            (Err(reason), _) | (_, Err(reason)) => {
                issues.push(TopologyIssue::DanglingWire {
                    wire: wire.id.clone(),
                    reason,
                });
            }
        }
    }

    for bridge in bridges {
        let Some(&offset) = offsets.get(bridge.component) else {
            continue;
        };
        let count = components[bridge.component].1.pin_count();
        if bridge.a < count && bridge.b < count {
            sets.union(offset + bridge.a, offset + bridge.b);
        }
    }

    let labels = sets.into_labeling();
    let mut root_to_net: HashMap<usize, NetId> = HashMap::new();
    let mut slot_net = Vec::with_capacity(total);
    let mut nets: Vec<Net> = Vec::new();
    let mut position = 0usize;
    for (slot, root) in labels.iter().enumerate() {
        while position + 1 < offsets.len() && offsets[position + 1] <= slot {
            position += 1;
        }
        let id = *root_to_net.entry(*root).or_insert_with(|| {
            nets.push(Net {
                id: nets.len() as NetId,
                members: Vec::new(),
            });
            (nets.len() - 1) as NetId
        });
        nets[id as usize].members.push(PinRef {
            component: position,
            pin: slot - offsets[position],
        });
        slot_net.push(id);
    }

    for (position, (id, kind)) in components.iter().enumerate() {
        let offset = offsets[position];
        let count = kind.pin_count();
        if !wired[offset..offset + count].iter().any(|w| *w) {
            continue;
        }
        for &pin in kind.required_pins() {
            let slot = offset + pin;
            if nets[slot_net[slot] as usize].members.len() == 1 {
                issues.push(TopologyIssue::UnconnectedPin {
                    component: (*id).to_string(),
                    pin: kind.pin_names()[pin].to_string(),
                });
            }
        }
    }

    (
        Netlist {
            offsets,
            slot_net,
            nets,
        },
        issues,
    )
}
