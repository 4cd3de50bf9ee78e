// ── OLT domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::OltId;

/// Health scalars read from the OLT itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OltHealth {
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub temperature_c: Option<f64>,
    pub uptime_secs: Option<u64>,
    pub captured_at: Option<DateTime<Utc>>,
}

/// An OLT as the engine last saw it.
///
/// Created from configuration; `online`, `last_poll`, `last_error` and
/// `health` are only ever written by the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Olt {
    pub id: OltId,
    pub host: String,
    pub model: Option<String>,
    pub pon_ports: u16,
    pub online: bool,
    pub last_poll: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub health: Option<OltHealth>,
}

impl Olt {
    pub fn new(id: OltId, host: impl Into<String>, pon_ports: u16) -> Self {
        Self {
            id,
            host: host.into(),
            model: None,
            pon_ports,
            online: false,
            last_poll: None,
            last_error: None,
            health: None,
        }
    }
}
