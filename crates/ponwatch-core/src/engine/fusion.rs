// ── Multi-source optics fusion ──
//
// Each OLT-side optical field is resolved from an ordered provider list.
// Precedence, highest first:
//
//   1. session optical dump (`OpticsSource::SessionDump`)
//   2. structured telemetry optical table (`OpticsSource::Telemetry`)
//
// The first provider with a value wins, per field. Self-reported readings
// are measured at the subscriber end and resolve in their own namespace.

use crate::model::{OltOptics, OpticsSource, SelfReportedOptics};

impl OpticsSource {
    /// Lower ranks win.
    pub fn rank(self) -> u8 {
        match self {
            Self::SessionDump => 0,
            Self::Telemetry => 1,
        }
    }
}

/// One provider's view of a terminal's OLT-side optics.
#[derive(Debug, Clone, PartialEq)]
pub struct OpticsReading {
    pub source: OpticsSource,
    pub rx_power_dbm: Option<f64>,
    pub tx_power_dbm: Option<f64>,
    pub temperature_c: Option<f64>,
    pub voltage_v: Option<f64>,
    pub bias_ma: Option<f64>,
}

impl OpticsReading {
    pub fn empty(source: OpticsSource) -> Self {
        Self {
            source,
            rx_power_dbm: None,
            tx_power_dbm: None,
            temperature_c: None,
            voltage_v: None,
            bias_ma: None,
        }
    }
}

fn first<F>(ordered: &[&OpticsReading], field: F) -> Option<(f64, OpticsSource)>
where
    F: Fn(&OpticsReading) -> Option<f64>,
{
    ordered
        .iter()
        .find_map(|r| field(r).map(|v| (v, r.source)))
}

/// Resolve every field from `readings` by source precedence. Input order
/// does not matter.
pub fn resolve_optics(readings: &[OpticsReading]) -> OltOptics {
    let mut ordered: Vec<&OpticsReading> = readings.iter().collect();
    ordered.sort_by_key(|r| r.source.rank());

    let rx = first(&ordered, |r| r.rx_power_dbm);
    OltOptics {
        rx_power_dbm: rx.map(|(v, _)| v),
        rx_source: rx.map(|(_, s)| s),
        tx_power_dbm: first(&ordered, |r| r.tx_power_dbm).map(|(v, _)| v),
        temperature_c: first(&ordered, |r| r.temperature_c).map(|(v, _)| v),
        voltage_v: first(&ordered, |r| r.voltage_v).map(|(v, _)| v),
        bias_ma: first(&ordered, |r| r.bias_ma).map(|(v, _)| v),
    }
}

/// Lay this cycle's resolved values over the recorded ones. Fields this
/// cycle had no value for keep their recorded value.
pub fn overlay_optics(recorded: &mut OltOptics, fresh: OltOptics) {
    if fresh.rx_power_dbm.is_some() {
        recorded.rx_power_dbm = fresh.rx_power_dbm;
        recorded.rx_source = fresh.rx_source;
    }
    recorded.tx_power_dbm = fresh.tx_power_dbm.or(recorded.tx_power_dbm);
    recorded.temperature_c = fresh.temperature_c.or(recorded.temperature_c);
    recorded.voltage_v = fresh.voltage_v.or(recorded.voltage_v);
    recorded.bias_ma = fresh.bias_ma.or(recorded.bias_ma);
}

pub fn overlay_self_reported(recorded: &mut SelfReportedOptics, fresh: SelfReportedOptics) {
    recorded.rx_power_dbm = fresh.rx_power_dbm.or(recorded.rx_power_dbm);
    recorded.tx_power_dbm = fresh.tx_power_dbm.or(recorded.tx_power_dbm);
    recorded.temperature_c = fresh.temperature_c.or(recorded.temperature_c);
    recorded.voltage_v = fresh.voltage_v.or(recorded.voltage_v);
    recorded.bias_ma = fresh.bias_ma.or(recorded.bias_ma);
    if fresh.model.is_some() {
        recorded.model = fresh.model;
    }
}
