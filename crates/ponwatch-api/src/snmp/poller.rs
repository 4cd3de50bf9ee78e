// Structured telemetry poller.
//
// Every public operation here is infallible from the caller's point of
// view: a timeout, an unreachable agent or a malformed reply yields an
// empty result and a `warn!`. An empty terminal poll is the signal the
// reconciler uses to fall back to the interactive session.

use std::collections::HashMap;

use chrono::Utc;
use secrecy::SecretString;
use serde::Serialize;
use tracing::{debug, warn};

use super::oid::{Oid, OidTable};
use super::tables::{
    Column, CounterReading, OpticalTables, RegistrationTables, TerminalRow, TrafficTables,
    decode_dbm, decode_mac, decode_u16, decode_u32,
};
use super::walker::{SnmpOptions, SnmpSession, SnmpValue, TableWalker};
use crate::error::Error;
use crate::slot::SlotKey;

/// Result of a terminal poll.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TerminalPoll {
    pub terminals: Vec<TerminalRow>,
    /// Online flag per slot. Keyed by position, never by hardware address.
    pub status: HashMap<SlotKey, bool>,
}

impl TerminalPoll {
    pub fn is_empty(&self) -> bool {
        self.terminals.is_empty()
    }
}

/// Device-level health scalars.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthReading {
    pub description: Option<String>,
    pub uptime_secs: Option<u64>,
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub temperature_c: Option<f64>,
}

impl HealthReading {
    fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.uptime_secs.is_none()
            && self.cpu_percent.is_none()
            && self.memory_percent.is_none()
            && self.temperature_c.is_none()
    }
}

/// Reads terminal, traffic and health tables from one OLT family.
#[derive(Debug, Clone, Default)]
pub struct TelemetryPoller {
    oids: OidTable,
    options: SnmpOptions,
}

impl TelemetryPoller {
    pub fn new(oids: OidTable, options: SnmpOptions) -> Self {
        Self { oids, options }
    }

    pub fn oids(&self) -> &OidTable {
        &self.oids
    }

    fn open(&self, address: &str, community: &SecretString) -> Option<SnmpSession> {
        match SnmpSession::open(address, community, self.options.clone()) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(address, error = %e, "SNMP session could not be opened");
                None
            }
        }
    }

    // ── Terminals ───────────────────────────────────────────────────

    pub fn poll_terminals(&self, address: &str, community: &SecretString) -> TerminalPoll {
        match self.open(address, community) {
            Some(mut session) => self.poll_terminals_with(&mut session),
            None => TerminalPoll::default(),
        }
    }

    pub fn poll_terminals_with(&self, walker: &mut dyn TableWalker) -> TerminalPoll {
        let oids = &self.oids;

        // Port and terminal id give a row its identity; without them
        // nothing else in the table can be placed.
        let port = match walker.walk(&oids.onu_port) {
            Ok(raw) => Column::decode(raw, decode_u16),
            Err(e) => {
                warn!(error = %e, "terminal port table unavailable");
                return TerminalPoll::default();
            }
        };
        let onu_id = match walker.walk(&oids.onu_id) {
            Ok(raw) => Column::decode(raw, decode_u16),
            Err(e) => {
                warn!(error = %e, "terminal id table unavailable");
                return TerminalPoll::default();
            }
        };

        let online_values = oids.online_values.clone();
        let registration = RegistrationTables {
            port,
            onu_id,
            status: optional_column(walker, &oids.onu_status, move |v| {
                v.as_i64().map(|code| online_values.contains(&code))
            }),
            mac: optional_column(walker, &oids.onu_mac, decode_mac),
            description: optional_column(walker, &oids.onu_description, SnmpValue::as_text),
            distance: optional_column(walker, &oids.onu_distance, decode_u32),
        };

        let scale = oids.power_scale;
        let optical = OpticalTables {
            mac: optional_column(walker, &oids.opm_mac, decode_mac),
            rx_power: optional_column(walker, &oids.opm_rx_power, move |v| decode_dbm(v, scale)),
        };
        let rx_by_mac = optical.rx_power_by_mac();

        let mut terminals = registration.join();
        let mut status = HashMap::with_capacity(terminals.len());
        for row in &mut terminals {
            if let Some(mac) = &row.mac {
                row.rx_power_dbm = rx_by_mac.get(mac).copied();
            }
            status.insert(row.slot, row.online.unwrap_or(false));
        }

        debug!(
            terminals = terminals.len(),
            optics = rx_by_mac.len(),
            "terminal tables joined"
        );
        TerminalPoll { terminals, status }
    }

    // ── Traffic counters ────────────────────────────────────────────

    pub fn poll_traffic_counters(
        &self,
        address: &str,
        community: &SecretString,
    ) -> Vec<CounterReading> {
        match self.open(address, community) {
            Some(mut session) => self.poll_traffic_counters_with(&mut session),
            None => Vec::new(),
        }
    }

    pub fn poll_traffic_counters_with(&self, walker: &mut dyn TableWalker) -> Vec<CounterReading> {
        let oids = &self.oids;
        let counters = |walker: &mut dyn TableWalker, oid: &Oid| -> Result<Column<u64>, Error> {
            walker.walk(oid).map(|raw| Column::decode(raw, SnmpValue::as_u64))
        };

        let (in_octets, out_octets) = match (
            counters(&mut *walker, &oids.onu_in_octets),
            counters(&mut *walker, &oids.onu_out_octets),
        ) {
            (Ok(i), Ok(o)) => (i, o),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "traffic counter table unavailable");
                return Vec::new();
            }
        };

        let tables = TrafficTables {
            port: optional_column(walker, &oids.onu_port, decode_u16),
            onu_id: optional_column(walker, &oids.onu_id, decode_u16),
            mac: optional_column(walker, &oids.onu_mac, decode_mac),
            in_octets,
            out_octets,
        };
        let readings = tables.join(Utc::now());
        debug!(readings = readings.len(), "traffic counters read");
        readings
    }

    // ── Health ──────────────────────────────────────────────────────

    pub fn poll_health(&self, address: &str, community: &SecretString) -> Option<HealthReading> {
        let mut session = self.open(address, community)?;
        self.poll_health_with(&mut session)
    }

    pub fn poll_health_with(&self, walker: &mut dyn TableWalker) -> Option<HealthReading> {
        let oids = &self.oids;
        let mut scalar = |oid: &Oid| match walker.get(oid) {
            Ok(value) => value,
            Err(e) => {
                debug!(oid = %oid, error = %e, "health scalar unavailable");
                None
            }
        };

        #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
        let as_f64 = |v: SnmpValue| v.as_i64().map(|n| n as f64);

        let reading = HealthReading {
            description: scalar(&oids.sys_descr).and_then(|v| v.as_text()),
            // sysUpTime is in hundredths of a second.
            uptime_secs: scalar(&oids.sys_uptime)
                .and_then(|v| v.as_u64())
                .map(|ticks| ticks / 100),
            cpu_percent: scalar(&oids.cpu_usage).and_then(as_f64),
            memory_percent: scalar(&oids.memory_usage).and_then(as_f64),
            temperature_c: scalar(&oids.temperature).and_then(as_f64),
        };

        if reading.is_empty() {
            warn!("no health scalars answered");
            None
        } else {
            Some(reading)
        }
    }
}

/// Walk a column that may legitimately be missing. Failure yields an
/// empty column; joins then leave the field absent.
fn optional_column<T>(
    walker: &mut dyn TableWalker,
    oid: &Oid,
    decoder: impl Fn(&SnmpValue) -> Option<T>,
) -> Column<T> {
    match walker.walk(oid) {
        Ok(raw) => Column::decode(raw, decoder),
        Err(e) => {
            debug!(column = %oid, error = %e, "optional column unavailable");
            Column::default()
        }
    }
}
