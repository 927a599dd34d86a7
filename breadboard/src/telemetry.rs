//! Device-state view for telemetry publishers.
//!
//! Each component maps to a retained topic `devices/{id}/state` whose payload
//! mirrors what a physical board reports: device id, timestamp, outputs and,
//! for microcontrollers, the logic level of every GPIO on a driven net. The
//! transport itself lives outside this crate; [`TelemetryView::diff`] tells
//! it which topics to republish.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::circuit::NetId;
use crate::components::microcontroller::gpio_number;
use crate::components::{ComponentKind, Outputs};
use crate::engine::Snapshot;

pub const TOPIC_PREFIX: &str = "devices";

pub fn state_topic(component_id: &str) -> String {
    format!("{}/{}/state", TOPIC_PREFIX, component_id)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    pub device_id: String,
    pub kind: ComponentKind,
    /// Simulated ms.
    pub timestamp: u64,
    pub outputs: Outputs,
    /// GPIO number to level, `1` or `0`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub gpio: BTreeMap<String, u8>,
    pub faulted: bool,
}

impl DeviceState {
    /// Same reported state, ignoring the timestamp.
    fn same_as(&self, other: &DeviceState) -> bool {
        self.outputs == other.outputs && self.gpio == other.gpio && self.faulted == other.faulted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicChange {
    pub topic: String,
    /// `None` when the device is gone and the retained topic should be cleared.
    pub state: Option<DeviceState>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryView {
    topics: BTreeMap<String, DeviceState>,
}

impl TelemetryView {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let levels: BTreeMap<NetId, Option<bool>> = snapshot
            .nets
            .iter()
            .map(|net| (net.id, net.voltage.map(|_| net.level)))
            .collect();

        let topics = snapshot
            .state
            .components
            .iter()
            .map(|component| {
                let mut gpio = BTreeMap::new();
                if component.kind == ComponentKind::Microcontroller {
                    for (name, net) in &component.pins {
                        let number = component.kind.pin_index(name).and_then(gpio_number);
                        let level = levels.get(net).copied().flatten();
                        if let (Some(number), Some(level)) = (number, level) {
                            gpio.insert(number.to_string(), u8::from(level));
                        }
                    }
                }
                let state = DeviceState {
                    device_id: component.id.clone(),
                    kind: component.kind,
                    timestamp: snapshot.state.sim_time_ms,
                    outputs: component.outputs.clone(),
                    gpio,
                    faulted: component.faulted,
                };
                (state_topic(&component.id), state)
            })
            .collect();
        Self { topics }
    }

    pub fn get(&self, topic: &str) -> Option<&DeviceState> {
        self.topics.get(topic)
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn payload(&self, topic: &str) -> Option<Value> {
        self.topics
            .get(topic)
            .and_then(|state| serde_json::to_value(state).ok())
    }

    /// Topics whose state differs from `previous`, plus removed topics.
    pub fn diff(&self, previous: &TelemetryView) -> Vec<TopicChange> {
        let mut changes: Vec<TopicChange> = self
            .topics
            .iter()
            .filter(|(topic, state)| {
                previous
                    .topics
                    .get(*topic)
                    .map_or(true, |old| !old.same_as(state))
            })
            .map(|(topic, state)| TopicChange {
                topic: topic.clone(),
                state: Some(state.clone()),
            })
            .collect();
        changes.extend(
            previous
                .topics
                .keys()
                .filter(|topic| !self.topics.contains_key(*topic))
                .map(|topic| TopicChange {
                    topic: topic.clone(),
                    state: None,
                }),
        );
        changes
    }
}
