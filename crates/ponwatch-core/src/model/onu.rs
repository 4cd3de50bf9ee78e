// ── ONU domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ids::{MacAddress, TerminalKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OnuState {
    Online,
    Offline,
}

impl OnuState {
    pub fn from_online(online: bool) -> Self {
        if online { Self::Online } else { Self::Offline }
    }

    pub fn is_online(self) -> bool {
        self == Self::Online
    }
}

/// Where an OLT-side optical value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OpticsSource {
    /// Interactive session optical dump.
    SessionDump,
    /// Structured telemetry optical table.
    Telemetry,
}

/// Optical readings taken at the OLT.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OltOptics {
    pub rx_power_dbm: Option<f64>,
    pub tx_power_dbm: Option<f64>,
    pub temperature_c: Option<f64>,
    pub voltage_v: Option<f64>,
    pub bias_ma: Option<f64>,
    /// Provider of `rx_power_dbm`.
    pub rx_source: Option<OpticsSource>,
}

impl OltOptics {
    pub fn is_empty(&self) -> bool {
        self.rx_power_dbm.is_none()
            && self.tx_power_dbm.is_none()
            && self.temperature_c.is_none()
            && self.voltage_v.is_none()
            && self.bias_ma.is_none()
    }
}

/// Optical readings the terminal reported about itself. A different
/// measurement point from [`OltOptics`]; the two are never merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelfReportedOptics {
    pub rx_power_dbm: Option<f64>,
    pub tx_power_dbm: Option<f64>,
    pub temperature_c: Option<f64>,
    pub voltage_v: Option<f64>,
    pub bias_ma: Option<f64>,
    pub model: Option<String>,
}

/// One subscriber terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Onu {
    pub key: TerminalKey,
    pub mac: Option<MacAddress>,
    pub description: Option<String>,
    pub state: OnuState,
    pub distance_m: Option<u32>,
    pub olt_optics: OltOptics,
    pub self_reported: SelfReportedOptics,
    /// Consecutive cycles in which the terminal was not observed.
    pub missing_polls: u32,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Onu {
    pub fn new(key: TerminalKey, state: OnuState, now: DateTime<Utc>) -> Self {
        Self {
            key,
            mac: None,
            description: None,
            state,
            distance_m: None,
            olt_optics: OltOptics::default(),
            self_reported: SelfReportedOptics::default(),
            missing_polls: 0,
            last_seen: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_online(&self) -> bool {
        self.state.is_online()
    }

    /// Drop every optical reading from both namespaces.
    pub fn clear_diagnostics(&mut self) {
        self.olt_optics = OltOptics::default();
        self.self_reported = SelfReportedOptics {
            model: self.self_reported.model.take(),
            ..SelfReportedOptics::default()
        };
    }
}
