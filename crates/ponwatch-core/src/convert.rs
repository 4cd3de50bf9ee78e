// ── Transport → domain conversions ──

use chrono::Utc;

use ponwatch_api::parser::{OpticalRow, ParsedTerminal};
use ponwatch_api::{HealthReading, SelfReportedRow, TerminalRow};

use crate::engine::{Observation, OpticsReading};
use crate::model::{MacAddress, OltHealth, OpticsSource, SelfReportedOptics};

impl From<HealthReading> for OltHealth {
    fn from(r: HealthReading) -> Self {
        Self {
            cpu_percent: r.cpu_percent,
            memory_percent: r.memory_percent,
            temperature_c: r.temperature_c,
            uptime_secs: r.uptime_secs,
            captured_at: Some(Utc::now()),
        }
    }
}

impl From<&SelfReportedRow> for SelfReportedOptics {
    fn from(r: &SelfReportedRow) -> Self {
        Self {
            rx_power_dbm: r.rx_power_dbm,
            tx_power_dbm: r.tx_power_dbm,
            temperature_c: r.temperature_c,
            voltage_v: r.voltage_v,
            bias_ma: r.bias_ma,
            model: r.model.clone(),
        }
    }
}

impl From<&OpticalRow> for OpticsReading {
    fn from(r: &OpticalRow) -> Self {
        Self {
            source: OpticsSource::SessionDump,
            rx_power_dbm: r.rx_power_dbm,
            tx_power_dbm: r.tx_power_dbm,
            temperature_c: r.temperature_c,
            voltage_v: r.voltage_v,
            bias_ma: r.bias_ma,
        }
    }
}

/// A telemetry row with no status column counts as offline.
impl From<&TerminalRow> for Observation {
    fn from(r: &TerminalRow) -> Self {
        let optics = r
            .rx_power_dbm
            .map(|rx| OpticsReading {
                rx_power_dbm: Some(rx),
                ..OpticsReading::empty(OpticsSource::Telemetry)
            })
            .into_iter()
            .collect();
        Self {
            slot: r.slot,
            mac: r.mac.as_deref().and_then(MacAddress::parse),
            description: r.description.clone(),
            online: r.online.unwrap_or(false),
            distance_m: r.distance_m,
            optics,
            self_reported: None,
        }
    }
}

impl From<ParsedTerminal> for Observation {
    fn from(t: ParsedTerminal) -> Self {
        Self {
            slot: t.slot,
            mac: t.mac.as_deref().and_then(MacAddress::parse),
            description: t.description,
            online: t.online,
            distance_m: t.distance_m,
            optics: Vec::new(),
            self_reported: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ponwatch_api::SlotKey;

    use super::*;

    #[test]
    fn telemetry_row_without_power_has_no_readings() {
        let row = TerminalRow {
            slot: SlotKey::new(1, 4),
            mac: Some("AA-BB-CC-DD-EE-FF".into()),
            online: None,
            description: Some("shop".into()),
            distance_m: Some(812),
            rx_power_dbm: None,
        };
        let obs = Observation::from(&row);
        assert!(obs.optics.is_empty());
        assert!(!obs.online);
        assert_eq!(obs.mac.unwrap().as_str(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn telemetry_power_tagged_with_source() {
        let row = TerminalRow {
            slot: SlotKey::new(1, 4),
            mac: None,
            online: Some(true),
            description: None,
            distance_m: None,
            rx_power_dbm: Some(-21.5),
        };
        let obs = Observation::from(&row);
        assert_eq!(obs.optics.len(), 1);
        assert_eq!(obs.optics[0].source, OpticsSource::Telemetry);
        assert_eq!(obs.optics[0].rx_power_dbm, Some(-21.5));
        assert!(obs.mac.is_none());
    }
}
