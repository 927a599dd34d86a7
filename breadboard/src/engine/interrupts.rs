//! Interrupt attachments and component bridges.

use std::collections::BTreeMap;

use crate::circuit::netlist::BridgeLink;
use crate::circuit::ComponentKey;
use crate::components::{Edge, EdgeMode, PinIndex};

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub owner: ComponentKey,
    pub pin: PinIndex,
    pub mode: EdgeMode,
    /// Level at the end of the previous tick.
    pub last_level: Option<bool>,
}

/// Attached interrupts, at most one per `(owner, pin)`.
#[derive(Debug, Clone, Default)]
pub struct InterruptTable {
    attachments: BTreeMap<(ComponentKey, PinIndex), Attachment>,
}

impl InterruptTable {
    /// Attach or re-attach. Re-attaching keeps the edge history.
    pub fn attach(&mut self, owner: ComponentKey, pin: PinIndex, mode: EdgeMode) {
        self.attachments
            .entry((owner, pin))
            .and_modify(|a| a.mode = mode)
            .or_insert(Attachment {
                owner,
                pin,
                mode,
                last_level: None,
            });
    }

    pub fn detach(&mut self, owner: ComponentKey, pin: PinIndex) -> bool {
        self.attachments.remove(&(owner, pin)).is_some()
    }

    pub fn cancel_owner(&mut self, owner: ComponentKey) -> usize {
        let before = self.attachments.len();
        self.attachments.retain(|(o, _), _| *o != owner);
        before - self.attachments.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attachment> {
        self.attachments.values()
    }

    /// Compare each attachment's level now against the previous tick and
    /// return the edges its mode accepts. `level_of` returns `None` for pins
    /// that are no longer on a net.
    pub fn detect_edges(
        &mut self,
        mut level_of: impl FnMut(ComponentKey, PinIndex) -> Option<bool>,
    ) -> Vec<(ComponentKey, PinIndex, Edge)> {
        let mut fired = Vec::new();
        for attachment in self.attachments.values_mut() {
            let now = level_of(attachment.owner, attachment.pin);
            if let (Some(before), Some(after)) = (attachment.last_level, now) {
                if let Some(edge) = Edge::between(before, after) {
                    if attachment.mode.accepts(edge) {
                        fired.push((attachment.owner, attachment.pin, edge));
                    }
                }
            }
            attachment.last_level = now;
        }
        fired
    }

    pub fn len(&self) -> usize {
        self.attachments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }
}

/// Named internal connections registered by components.
#[derive(Debug, Clone, Default)]
pub struct BridgeRegistry {
    bridges: BTreeMap<(ComponentKey, String), (PinIndex, PinIndex)>,
}

impl BridgeRegistry {
    /// Returns true when the registry changed.
    pub fn register(&mut self, owner: ComponentKey, name: &str, a: PinIndex, b: PinIndex) -> bool {
        let previous = self.bridges.insert((owner, name.to_string()), (a, b));
        previous != Some((a, b))
    }

    /// Returns true when a bridge was removed.
    pub fn unregister(&mut self, owner: ComponentKey, name: &str) -> bool {
        self.bridges.remove(&(owner, name.to_string())).is_some()
    }

    pub fn cancel_owner(&mut self, owner: ComponentKey) -> usize {
        let before = self.bridges.len();
        self.bridges.retain(|(o, _), _| *o != owner);
        before - self.bridges.len()
    }

    /// Bridges as union pairs, with owners mapped to component positions.
    pub fn links(&self, position_of: impl Fn(ComponentKey) -> Option<usize>) -> Vec<BridgeLink> {
        self.bridges
            .iter()
            .filter_map(|((owner, _), (a, b))| {
                position_of(*owner).map(|component| BridgeLink {
                    component,
                    a: *a,
                    b: *b,
                })
            })
            .collect()
    }

    pub fn owned_by(&self, owner: ComponentKey) -> Vec<&str> {
        self.bridges
            .keys()
            .filter(|(o, _)| *o == owner)
            .map(|(_, name)| name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bridges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bridges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_need_history() {
        let mut table = InterruptTable::default();
        let key = ComponentKey(1);
        table.attach(key, 5, EdgeMode::Falling);

        assert!(table.detect_edges(|_, _| Some(true)).is_empty());
        assert!(table.detect_edges(|_, _| Some(true)).is_empty());
        assert_eq!(
            table.detect_edges(|_, _| Some(false)),
            vec![(key, 5, Edge::Falling)]
        );
        assert!(table.detect_edges(|_, _| Some(true)).is_empty(), "rising filtered");
    }

    #[test]
    fn test_change_mode_sees_both_edges() {
        let mut table = InterruptTable::default();
        let key = ComponentKey(1);
        table.attach(key, 0, EdgeMode::Change);
        table.detect_edges(|_, _| Some(false));
        assert_eq!(table.detect_edges(|_, _| Some(true)).len(), 1);
        assert_eq!(table.detect_edges(|_, _| Some(false)).len(), 1);
    }

    #[test]
    fn test_cancel_owner_clears_attachments() {
        let mut table = InterruptTable::default();
        table.attach(ComponentKey(1), 0, EdgeMode::Rising);
        table.attach(ComponentKey(1), 1, EdgeMode::Rising);
        table.attach(ComponentKey(2), 0, EdgeMode::Rising);
        assert_eq!(table.cancel_owner(ComponentKey(1)), 2);
        assert_eq!(table.len(), 1);
        assert!(!table.detach(ComponentKey(1), 0));
    }

    #[test]
    fn test_bridge_registration_reports_changes() {
        let mut bridges = BridgeRegistry::default();
        let key = ComponentKey(3);
        assert!(bridges.register(key, "contact", 0, 2));
        assert!(!bridges.register(key, "contact", 0, 2));
        assert!(bridges.unregister(key, "contact"));
        assert!(!bridges.unregister(key, "contact"));

        bridges.register(key, "legs-1", 0, 1);
        let links = bridges.links(|k| (k == key).then_some(4));
        assert_eq!(links, vec![BridgeLink { component: 4, a: 0, b: 1 }]);
        assert_eq!(bridges.owned_by(key), vec!["legs-1"]);
    }
}
