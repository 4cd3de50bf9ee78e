// ── Typed per-table records, joined by row index ──
//
// Each column walk becomes a `Column<T>`: decoded values keyed by the row
// index the agent returned. Tables are joined explicitly on that index.
// A row present in one column and missing from another yields `None`
// for the missing field; it is never an error.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::trace;

use super::oid::RowIndex;
use super::walker::SnmpValue;
use crate::mac;
use crate::slot::SlotKey;

/// Optical readings outside this window are agent placeholders
/// (e.g. `-65535` for "no light"), not measurements.
const PLAUSIBLE_DBM: std::ops::RangeInclusive<f64> = -50.0..=10.0;

/// Decoded values of one column, keyed by row index.
#[derive(Debug, Clone, PartialEq)]
pub struct Column<T> {
    rows: BTreeMap<RowIndex, T>,
}

impl<T> Default for Column<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Column<T> {
    /// Decode a raw walk. Values the decoder rejects are dropped.
    pub fn decode(
        raw: Vec<(RowIndex, SnmpValue)>,
        decoder: impl Fn(&SnmpValue) -> Option<T>,
    ) -> Self {
        let mut rows = BTreeMap::new();
        for (index, value) in raw {
            match decoder(&value) {
                Some(v) => {
                    rows.insert(index, v);
                }
                None => trace!(%index, ?value, "undecodable cell skipped"),
            }
        }
        Self { rows }
    }

    pub fn get(&self, index: &RowIndex) -> Option<&T> {
        self.rows.get(index)
    }

    pub fn indexes(&self) -> impl Iterator<Item = &RowIndex> {
        self.rows.keys()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<T> FromIterator<(RowIndex, T)> for Column<T> {
    fn from_iter<I: IntoIterator<Item = (RowIndex, T)>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

// ── Decoders ────────────────────────────────────────────────────────

pub(crate) fn decode_u16(v: &SnmpValue) -> Option<u16> {
    v.as_u64().and_then(|n| u16::try_from(n).ok())
}

pub(crate) fn decode_u32(v: &SnmpValue) -> Option<u32> {
    v.as_u64().and_then(|n| u32::try_from(n).ok())
}

pub(crate) fn decode_mac(v: &SnmpValue) -> Option<String> {
    match v {
        SnmpValue::Octets(bytes) => mac::from_octets(bytes),
        _ => None,
    }
}

pub(crate) fn decode_dbm(v: &SnmpValue, scale: f64) -> Option<f64> {
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    let dbm = v.as_i64()? as f64 * scale;
    PLAUSIBLE_DBM.contains(&dbm).then_some(dbm)
}

// ── Registration table ──────────────────────────────────────────────

/// One terminal as seen by the structured telemetry tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminalRow {
    pub slot: SlotKey,
    pub mac: Option<String>,
    pub online: Option<bool>,
    pub description: Option<String>,
    pub distance_m: Option<u32>,
    pub rx_power_dbm: Option<f64>,
}

/// The columns of the terminal registration table.
#[derive(Debug, Clone, Default)]
pub struct RegistrationTables {
    pub port: Column<u16>,
    pub onu_id: Column<u16>,
    pub status: Column<bool>,
    pub mac: Column<String>,
    pub description: Column<String>,
    pub distance: Column<u32>,
}

impl RegistrationTables {
    /// Join every column by row index.
    ///
    /// A row needs both a port and a terminal id to have an identity;
    /// rows lacking either are skipped. Everything else is optional.
    pub fn join(&self) -> Vec<TerminalRow> {
        let indexes: BTreeSet<&RowIndex> = self.port.indexes().chain(self.onu_id.indexes()).collect();

        indexes
            .into_iter()
            .filter_map(|index| {
                let (Some(port), Some(onu_id)) = (self.port.get(index), self.onu_id.get(index))
                else {
                    trace!(%index, "row without port/terminal id skipped");
                    return None;
                };
                Some(TerminalRow {
                    slot: SlotKey::new(*port, *onu_id),
                    mac: self.mac.get(index).cloned(),
                    online: self.status.get(index).copied(),
                    description: self.description.get(index).cloned(),
                    distance_m: self.distance.get(index).copied(),
                    rx_power_dbm: None,
                })
            })
            .collect()
    }
}

// ── Optical table ───────────────────────────────────────────────────

/// The optical monitor table. Its index is unrelated to the registration
/// table, so the only link to a terminal is the hardware address column.
#[derive(Debug, Clone, Default)]
pub struct OpticalTables {
    pub mac: Column<String>,
    pub rx_power: Column<f64>,
}

impl OpticalTables {
    pub fn rx_power_by_mac(&self) -> HashMap<String, f64> {
        self.mac
            .indexes()
            .filter_map(|index| {
                let mac = self.mac.get(index)?;
                let rx = self.rx_power.get(index)?;
                Some((mac.clone(), *rx))
            })
            .collect()
    }
}

// ── Traffic table ───────────────────────────────────────────────────

/// Cumulative byte counters for one terminal, oriented from the
/// subscriber's point of view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterReading {
    pub slot: SlotKey,
    pub mac: String,
    /// Bytes downloaded by the subscriber.
    pub rx_bytes: u64,
    /// Bytes uploaded by the subscriber.
    pub tx_bytes: u64,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct TrafficTables {
    pub port: Column<u16>,
    pub onu_id: Column<u16>,
    pub mac: Column<String>,
    /// Device-labelled "in": arrives at the OLT from the terminal.
    pub in_octets: Column<u64>,
    /// Device-labelled "out": leaves the OLT towards the terminal.
    pub out_octets: Column<u64>,
}

impl TrafficTables {
    /// Join counters to terminal identity. The device's out/in pair is
    /// swapped here so `rx` always means "downloaded by the subscriber".
    pub fn join(&self, captured_at: DateTime<Utc>) -> Vec<CounterReading> {
        self.mac
            .indexes()
            .filter_map(|index| {
                let slot = SlotKey::new(*self.port.get(index)?, *self.onu_id.get(index)?);
                let mac = self.mac.get(index)?.clone();
                let (Some(out), Some(inn)) = (self.out_octets.get(index), self.in_octets.get(index))
                else {
                    return None;
                };
                Some(CounterReading {
                    slot,
                    mac,
                    rx_bytes: *out,
                    tx_bytes: *inn,
                    captured_at,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn col<T: Clone>(pairs: &[(u32, T)]) -> Column<T> {
        pairs
            .iter()
            .map(|(i, v)| (RowIndex::from(*i), v.clone()))
            .collect()
    }

    #[test]
    fn join_tolerates_short_columns() {
        let tables = RegistrationTables {
            port: col(&[(10, 1), (11, 1), (12, 2)]),
            onu_id: col(&[(10, 1), (11, 2), (12, 1)]),
            status: col(&[(10, true)]),
            mac: col(&[(10, "aa:bb:cc:dd:ee:01".to_owned()), (12, "aa:bb:cc:dd:ee:03".to_owned())]),
            description: Column::default(),
            distance: col(&[(11, 1250)]),
        };

        let rows = tables.join();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].slot, SlotKey::new(1, 1));
        assert_eq!(rows[0].online, Some(true));
        assert_eq!(rows[1].mac, None);
        assert_eq!(rows[1].distance_m, Some(1250));
        assert_eq!(rows[2].online, None);
        assert_eq!(rows[2].description, None);
    }

    #[test]
    fn join_skips_rows_without_identity() {
        let tables = RegistrationTables {
            port: col(&[(1, 1), (2, 1)]),
            onu_id: col(&[(1, 5)]),
            ..RegistrationTables::default()
        };
        let rows = tables.join();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].slot, SlotKey::new(1, 5));
    }

    #[test]
    fn optical_join_needs_both_columns() {
        let tables = OpticalTables {
            mac: col(&[(7, "aa:bb:cc:dd:ee:01".to_owned()), (8, "aa:bb:cc:dd:ee:02".to_owned())]),
            rx_power: col(&[(7, -22.5)]),
        };
        let by_mac = tables.rx_power_by_mac();
        assert_eq!(by_mac.len(), 1);
        assert_eq!(by_mac.get("aa:bb:cc:dd:ee:01"), Some(&-22.5));
    }

    #[test]
    fn traffic_join_swaps_direction() {
        let now = Utc::now();
        let tables = TrafficTables {
            port: col(&[(1, 3)]),
            onu_id: col(&[(1, 9)]),
            mac: col(&[(1, "aa:bb:cc:dd:ee:09".to_owned())]),
            in_octets: col(&[(1, 100)]),
            out_octets: col(&[(1, 5000)]),
        };
        let readings = tables.join(now);
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].rx_bytes, 5000);
        assert_eq!(readings[0].tx_bytes, 100);
        assert_eq!(readings[0].slot, SlotKey::new(3, 9));
    }

    #[test]
    fn dbm_decoder_drops_placeholders() {
        assert_eq!(decode_dbm(&SnmpValue::Integer(-2245), 0.01), Some(-22.45));
        assert_eq!(decode_dbm(&SnmpValue::Integer(-65535), 0.01), None);
        assert_eq!(decode_dbm(&SnmpValue::Null, 0.01), None);
    }
}
