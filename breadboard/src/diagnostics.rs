//! Diagnostics collector.
//!
//! An append-only log of [`Warning`]s raised by the resolver, the topology
//! builder and the components. The collector never deduplicates; it hands
//! every warning a stable [`Warning::dedup_key`] so the consumer can.

use serde::{Deserialize, Serialize};

use crate::circuit::NetId;
use crate::core::DiagnosticsPolicy;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Closed taxonomy of warning codes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    ShortCircuit,
    FloatingInput,
    Brownout,
    LedReverseBias,
    LedNoResistor,
    LedOverCurrent,
    PotUnpowered,
    PotOverVoltage,
    ComponentFault,
    DanglingWire,
    UnconnectedPin,
}

impl WarningCode {
    pub const ALL: [WarningCode; 11] = [
        WarningCode::ShortCircuit,
        WarningCode::FloatingInput,
        WarningCode::Brownout,
        WarningCode::LedReverseBias,
        WarningCode::LedNoResistor,
        WarningCode::LedOverCurrent,
        WarningCode::PotUnpowered,
        WarningCode::PotOverVoltage,
        WarningCode::ComponentFault,
        WarningCode::DanglingWire,
        WarningCode::UnconnectedPin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCode::ShortCircuit => "SHORT_CIRCUIT",
            WarningCode::FloatingInput => "FLOATING_INPUT",
            WarningCode::Brownout => "BROWNOUT",
            WarningCode::LedReverseBias => "LED_REVERSE_BIAS",
            WarningCode::LedNoResistor => "LED_NO_RESISTOR",
            WarningCode::LedOverCurrent => "LED_OVER_CURRENT",
            WarningCode::PotUnpowered => "POT_UNPOWERED",
            WarningCode::PotOverVoltage => "POT_OVER_VOLTAGE",
            WarningCode::ComponentFault => "COMPONENT_FAULT",
            WarningCode::DanglingWire => "DANGLING_WIRE",
            WarningCode::UnconnectedPin => "UNCONNECTED_PIN",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            WarningCode::ShortCircuit
            | WarningCode::LedNoResistor
            | WarningCode::LedOverCurrent
            | WarningCode::PotOverVoltage
            | WarningCode::ComponentFault => Severity::Error,
            WarningCode::Brownout
            | WarningCode::FloatingInput
            | WarningCode::LedReverseBias
            | WarningCode::DanglingWire => Severity::Warning,
            WarningCode::PotUnpowered | WarningCode::UnconnectedPin => Severity::Info,
        }
    }
}

impl std::fmt::Display for WarningCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub id: String,
    pub code: WarningCode,
    pub message: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_id: Option<NetId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wire_id: Option<String>,
    /// Simulated time in ms.
    pub timestamp: u64,
}

impl Warning {
    /// `(code, subject)` where the subject is the component, net or wire the
    /// warning is about, in that order of preference.
    pub fn dedup_key(&self) -> (WarningCode, String) {
        let subject = if let Some(ref component) = self.component_id {
            format!("component:{}", component)
        } else if let Some(net) = self.net_id {
            format!("net:{}", net)
        } else if let Some(ref wire) = self.wire_id {
            format!("wire:{}", wire)
        } else {
            String::new()
        };
        (self.code, subject)
    }
}

/// Subject a warning is attached to.
#[derive(Debug, Clone, Default)]
pub struct Subject {
    pub component_id: Option<String>,
    pub net_id: Option<NetId>,
    pub wire_id: Option<String>,
}

impl Subject {
    pub fn component(id: impl Into<String>) -> Self {
        Self {
            component_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn net(net: NetId) -> Self {
        Self {
            net_id: Some(net),
            ..Self::default()
        }
    }

    pub fn wire(id: impl Into<String>) -> Self {
        Self {
            wire_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn with_net(mut self, net: NetId) -> Self {
        self.net_id = Some(net);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticStats {
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
}

impl DiagnosticStats {
    pub fn total(&self) -> usize {
        self.errors + self.warnings + self.info
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostics {
    policy: DiagnosticsPolicy,
    warnings: Vec<Warning>,
    next_id: u64,
}

impl Diagnostics {
    pub fn new(policy: DiagnosticsPolicy) -> Self {
        Self {
            policy,
            warnings: Vec::new(),
            next_id: 1,
        }
    }

    pub fn policy(&self) -> DiagnosticsPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: DiagnosticsPolicy) {
        self.policy = policy;
    }

    /// Called at the start of every tick.
    pub fn begin_tick(&mut self) {
        if self.policy == DiagnosticsPolicy::PerTick {
            self.warnings.clear();
        }
    }

    pub fn push(
        &mut self,
        code: WarningCode,
        message: impl Into<String>,
        subject: Subject,
        timestamp: u64,
    ) -> &Warning {
        let id = format!("w{}", self.next_id);
        self.next_id += 1;
        self.warnings.push(Warning {
            id,
            code,
            message: message.into(),
            severity: code.severity(),
            component_id: subject.component_id,
            net_id: subject.net_id,
            wire_id: subject.wire_id,
            timestamp,
        });
        &self.warnings[self.warnings.len() - 1]
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn drain(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    pub fn count(&self, code: WarningCode) -> usize {
        self.warnings.iter().filter(|w| w.code == code).count()
    }

    pub fn stats(&self) -> DiagnosticStats {
        stats_for(&self.warnings)
    }
}

pub fn stats_for(warnings: &[Warning]) -> DiagnosticStats {
    let mut stats = DiagnosticStats::default();
    for warning in warnings {
        match warning.severity {
            Severity::Error => stats.errors += 1,
            Severity::Warning => stats.warnings += 1,
            Severity::Info => stats.info += 1,
        }
    }
    stats
}
