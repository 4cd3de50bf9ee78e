// ── Notifications handed to the dispatch collaborator ──

use serde::{Deserialize, Serialize};
use strum::Display;

use super::ids::{MacAddress, OltId, TerminalKey};

/// Enough about a terminal to describe it in an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalRef {
    pub key: TerminalKey,
    pub mac: Option<MacAddress>,
    pub description: Option<String>,
    pub last_rx_power_dbm: Option<f64>,
    /// Same alert already went out for this terminal within the cooldown.
    /// The transition is still listed; dispatchers should not page again.
    #[serde(default)]
    pub alert_suppressed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HealthMetric {
    Cpu,
    Memory,
    Temperature,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// All terminal transitions one OLT produced in one cycle.
    TerminalBatch {
        olt: OltId,
        registered: Vec<TerminalRef>,
        came_online: Vec<TerminalRef>,
        went_offline: Vec<TerminalRef>,
        removed: Vec<TerminalRef>,
    },
    HealthThreshold {
        olt: OltId,
        metric: HealthMetric,
        value: f64,
        threshold: f64,
    },
    OltUnreachable {
        olt: OltId,
        error: String,
    },
    OltRecovered {
        olt: OltId,
    },
}

impl Notification {
    pub fn olt(&self) -> &OltId {
        match self {
            Self::TerminalBatch { olt, .. }
            | Self::HealthThreshold { olt, .. }
            | Self::OltUnreachable { olt, .. }
            | Self::OltRecovered { olt } => olt,
        }
    }
}
