// ── Traffic domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use ponwatch_api::SlotKey;

use super::ids::{MacAddress, OltId};

/// Last raw counters seen for one terminal, with the live feed's
/// smoothed rates riding along.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterSnapshot {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub captured_at: DateTime<Utc>,
    pub rx_smoothed_kbps: f64,
    pub tx_smoothed_kbps: f64,
}

impl CounterSnapshot {
    pub fn new(rx_bytes: u64, tx_bytes: u64, captured_at: DateTime<Utc>) -> Self {
        Self {
            rx_bytes,
            tx_bytes,
            captured_at,
            rx_smoothed_kbps: 0.0,
            tx_smoothed_kbps: 0.0,
        }
    }
}

/// What a history sample describes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Terminal,
    Port,
    Device,
}

/// One bandwidth point handed to the time-series sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficSample {
    pub olt: OltId,
    pub kind: EntityKind,
    /// MAC for terminals, port number for ports, OLT id for the device.
    pub entity: String,
    pub rx_kbps: f64,
    pub tx_kbps: f64,
    pub captured_at: DateTime<Utc>,
}

/// One terminal's rate on the live feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveRate {
    pub mac: MacAddress,
    pub slot: SlotKey,
    /// Smoothed receive rate.
    pub rx_kbps: f64,
    /// Smoothed transmit rate.
    pub tx_kbps: f64,
    /// Unsmoothed rate for this tick; `None` when the gap was invalid.
    pub instant_rx_kbps: Option<f64>,
    pub instant_tx_kbps: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

/// A full live-feed tick for one OLT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveUpdate {
    pub olt: OltId,
    pub rates: Vec<LiveRate>,
    pub captured_at: DateTime<Utc>,
}
