// ── Object identifiers and the vendor table map ──

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// A numeric object identifier, e.g. `1.3.6.1.2.1.1.3.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The row index of `child` under this column, if `child` lies beneath it.
    pub fn index_of(&self, child: &[u32]) -> Option<RowIndex> {
        if child.len() > self.0.len() && child.starts_with(&self.0) {
            child.get(self.0.len()..).map(|rest| RowIndex(rest.to_vec()))
        } else {
            None
        }
    }
}

impl From<Vec<u32>> for Oid {
    fn from(v: Vec<u32>) -> Self {
        Self(v)
    }
}

impl FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .trim()
            .trim_start_matches('.')
            .split('.')
            .map(str::parse::<u32>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::Snmp {
                message: format!("invalid OID `{s}`: {e}"),
            })?;
        if parts.len() < 2 {
            return Err(Error::Snmp {
                message: format!("OID `{s}` is too short"),
            });
        }
        Ok(Self(parts))
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl Serialize for Oid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Oid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Row index suffix returned by a table walk. Columns of the same table
/// share it, which is the only thing rows are correlated by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowIndex(pub Vec<u32>);

impl fmt::Display for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl From<u32> for RowIndex {
    fn from(i: u32) -> Self {
        Self(vec![i])
    }
}

// ── Vendor table map ────────────────────────────────────────────────

/// Column and scalar identifiers for the supported OLT family.
///
/// Each `onu_*` column is walked independently and joined by row index.
/// The `opm_*` columns live in a separate table with its own index and are
/// tied back to terminals only through `opm_mac`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OidTable {
    pub onu_port: Oid,
    pub onu_id: Oid,
    pub onu_description: Oid,
    pub onu_mac: Oid,
    pub onu_status: Oid,
    pub onu_distance: Oid,
    pub opm_mac: Oid,
    pub opm_rx_power: Oid,
    pub onu_in_octets: Oid,
    pub onu_out_octets: Oid,
    pub sys_descr: Oid,
    pub sys_uptime: Oid,
    pub cpu_usage: Oid,
    pub memory_usage: Oid,
    pub temperature: Oid,
    /// Status codes that mean "registered and online".
    pub online_values: Vec<i64>,
    /// Multiplier turning the raw optical integer into dBm.
    pub power_scale: f64,
}

fn oid(s: &str) -> Oid {
    // Only used for the literals below, which are known-good.
    Oid(s.split('.').filter_map(|p| p.parse().ok()).collect())
}

impl Default for OidTable {
    fn default() -> Self {
        Self {
            onu_port: oid("1.3.6.1.4.1.17409.2.3.4.1.1.2"),
            onu_id: oid("1.3.6.1.4.1.17409.2.3.4.1.1.3"),
            onu_description: oid("1.3.6.1.4.1.17409.2.3.4.1.1.4"),
            onu_mac: oid("1.3.6.1.4.1.17409.2.3.4.1.1.7"),
            onu_status: oid("1.3.6.1.4.1.17409.2.3.4.1.1.8"),
            onu_distance: oid("1.3.6.1.4.1.17409.2.3.4.1.1.15"),
            opm_mac: oid("1.3.6.1.4.1.17409.2.3.4.2.1.1"),
            opm_rx_power: oid("1.3.6.1.4.1.17409.2.3.4.2.1.4"),
            onu_in_octets: oid("1.3.6.1.4.1.17409.2.3.10.1.1.4"),
            onu_out_octets: oid("1.3.6.1.4.1.17409.2.3.10.1.1.5"),
            sys_descr: oid("1.3.6.1.2.1.1.1.0"),
            sys_uptime: oid("1.3.6.1.2.1.1.3.0"),
            cpu_usage: oid("1.3.6.1.4.1.17409.2.3.1.3.1.0"),
            memory_usage: oid("1.3.6.1.4.1.17409.2.3.1.3.2.0"),
            temperature: oid("1.3.6.1.4.1.17409.2.3.1.3.3.0"),
            online_values: vec![1],
            power_scale: 0.01,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        let o: Oid = ".1.3.6.1.2.1.1.3.0".parse().unwrap();
        assert_eq!(o.to_string(), "1.3.6.1.2.1.1.3.0");
        assert_eq!(o.len(), 9);
    }

    #[test]
    fn rejects_garbage() {
        assert!("1.3.x.4".parse::<Oid>().is_err());
        assert!("1".parse::<Oid>().is_err());
    }

    #[test]
    fn index_of_child() {
        let base: Oid = "1.3.6.1.4.1.17409.2.3.4.1.1.2".parse().unwrap();
        let child = [1, 3, 6, 1, 4, 1, 17409, 2, 3, 4, 1, 1, 2, 16_777_473];
        assert_eq!(base.index_of(&child), Some(RowIndex(vec![16_777_473])));
        assert_eq!(base.index_of(base.as_slice()), None);
        assert_eq!(base.index_of(&[1, 3, 6, 1, 4, 1, 17409, 2, 3, 4, 1, 1, 3, 1]), None);
    }

    #[test]
    fn default_table_deserializes_partial_override() {
        let table: OidTable =
            serde_json::from_str(r#"{ "onu_status": "1.3.6.1.4.1.99.1", "online_values": [1, 3] }"#)
                .unwrap();
        assert_eq!(table.onu_status.to_string(), "1.3.6.1.4.1.99.1");
        assert_eq!(table.online_values, vec![1, 3]);
        assert_eq!(table.onu_port, OidTable::default().onu_port);
    }
}
