// ── Text output parser ──
//
// Turns session output into terminal records. Every parser is a single
// pass over lines; lines that match nothing are skipped at `trace`.
//
// Configuration dump (context-tracking):
//
//   interface epon 0/1
//    onu 1 bind mac aa:bb:cc:dd:ee:01
//    onu 1 description Cust-0042
//   exit
//   !
//
// Status table:   `0/1:2   aa:bb:cc:dd:ee:02   online   1250`
// Optical dump:   `0/1:2   45.2   3.30   12.5   2.10   -23.45`

use std::collections::HashMap;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use tracing::trace;

use crate::mac;
use crate::slot::SlotKey;

static INTERFACE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*interface\s+(?:epon|gpon|pon)\s+\d+/(\d+)\s*$").ok());
static BIND: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\s*onu\s+(\d+)\s+(?:bind\s+)?(?:mac|mac-address)\s+([0-9A-Fa-f:.\-]+)\s*$").ok()
});
static DESCRIPTION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"^\s*onu\s+(\d+)\s+description\s+"?(.*?)"?\s*$"#).ok());
static STATUS_ROW: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*\d+/(\d+)[:.](\d+)\s+([0-9A-Fa-f:.\-]{12,17})\s+(online|offline|up|down|deregistered|registered)\b(?:\s+(\d+))?",
    )
    .ok()
});
static OPTICAL_ROW: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^\s*\d+/(\d+)[:.](\d+)\s+(-?[\d.]+|N/A)\s+(-?[\d.]+|N/A)\s+(-?[\d.]+|N/A)\s+(-?[\d.]+|N/A)\s+(-?[\d.]+|N/A)\s*$",
    )
    .ok()
});

/// One terminal found in the configuration dump.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigTerminal {
    pub slot: SlotKey,
    pub mac: Option<String>,
    pub description: Option<String>,
}

/// One row of the status table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRow {
    pub slot: SlotKey,
    pub mac: String,
    pub online: bool,
    pub distance_m: Option<u32>,
}

/// One row of the optical diagnostics dump. Carries no hardware address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpticalRow {
    pub slot: SlotKey,
    pub temperature_c: Option<f64>,
    pub voltage_v: Option<f64>,
    pub bias_ma: Option<f64>,
    pub tx_power_dbm: Option<f64>,
    pub rx_power_dbm: Option<f64>,
}

/// A terminal assembled from configuration and status dumps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedTerminal {
    pub slot: SlotKey,
    pub mac: Option<String>,
    pub description: Option<String>,
    pub online: bool,
    pub distance_m: Option<u32>,
}

fn capture_u16(caps: &regex::Captures<'_>, i: usize) -> Option<u16> {
    caps.get(i)?.as_str().parse().ok()
}

fn capture_f64(caps: &regex::Captures<'_>, i: usize) -> Option<f64> {
    caps.get(i)?.as_str().parse().ok()
}

pub fn parse_running_config(text: &str) -> Vec<ConfigTerminal> {
    let (Some(interface), Some(bind), Some(description)) =
        (INTERFACE.as_ref(), BIND.as_ref(), DESCRIPTION.as_ref())
    else {
        return Vec::new();
    };

    let mut port: Option<u16> = None;
    let mut macs: IndexMap<SlotKey, String> = IndexMap::new();
    let mut descriptions: IndexMap<SlotKey, String> = IndexMap::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed == "exit" || trimmed.starts_with('!') {
            port = None;
            continue;
        }
        if let Some(caps) = interface.captures(line) {
            port = capture_u16(&caps, 1);
            continue;
        }
        let Some(current) = port else {
            continue;
        };

        if let Some(caps) = bind.captures(line) {
            let (Some(onu_id), Some(normalized)) = (
                capture_u16(&caps, 1),
                caps.get(2).and_then(|m| mac::normalize(m.as_str())),
            ) else {
                trace!(line, "unreadable binding skipped");
                continue;
            };
            macs.insert(SlotKey::new(current, onu_id), normalized);
        } else if let Some(caps) = description.captures(line) {
            let (Some(onu_id), Some(text)) = (capture_u16(&caps, 1), caps.get(2)) else {
                continue;
            };
            let text = text.as_str().trim();
            if !text.is_empty() {
                descriptions.insert(SlotKey::new(current, onu_id), text.to_owned());
            }
        } else if !trimmed.is_empty() {
            trace!(line, "config line ignored");
        }
    }

    let mut terminals: Vec<ConfigTerminal> = macs
        .iter()
        .map(|(slot, mac)| ConfigTerminal {
            slot: *slot,
            mac: Some(mac.clone()),
            description: descriptions.get(slot).cloned(),
        })
        .collect();
    terminals.extend(
        descriptions
            .iter()
            .filter(|(slot, _)| !macs.contains_key(*slot))
            .map(|(slot, text)| ConfigTerminal {
                slot: *slot,
                mac: None,
                description: Some(text.clone()),
            }),
    );
    terminals
}

pub fn parse_status_table(text: &str) -> Vec<StatusRow> {
    let Some(pattern) = STATUS_ROW.as_ref() else {
        return Vec::new();
    };
    text.lines()
        .filter_map(|line| {
            let Some(caps) = pattern.captures(line) else {
                trace!(line, "status line ignored");
                return None;
            };
            let slot = SlotKey::new(capture_u16(&caps, 1)?, capture_u16(&caps, 2)?);
            let mac = mac::normalize(caps.get(3)?.as_str())?;
            let state = caps.get(4)?.as_str().to_ascii_lowercase();
            Some(StatusRow {
                slot,
                mac,
                online: matches!(state.as_str(), "online" | "up" | "registered"),
                distance_m: caps.get(5).and_then(|m| m.as_str().parse().ok()),
            })
        })
        .collect()
}

pub fn parse_optical_dump(text: &str) -> Vec<OpticalRow> {
    let Some(pattern) = OPTICAL_ROW.as_ref() else {
        return Vec::new();
    };
    text.lines()
        .filter_map(|line| {
            let Some(caps) = pattern.captures(line) else {
                trace!(line, "optical line ignored");
                return None;
            };
            Some(OpticalRow {
                slot: SlotKey::new(capture_u16(&caps, 1)?, capture_u16(&caps, 2)?),
                temperature_c: capture_f64(&caps, 3),
                voltage_v: capture_f64(&caps, 4),
                bias_ma: capture_f64(&caps, 5),
                tx_power_dbm: capture_f64(&caps, 6),
                rx_power_dbm: capture_f64(&caps, 7),
            })
        })
        .collect()
}

/// Join configuration and status by slot. Slots only present in the
/// status table are included; their description is absent.
pub fn join_terminals(config: &[ConfigTerminal], status: &[StatusRow]) -> Vec<ParsedTerminal> {
    let by_slot: HashMap<SlotKey, &StatusRow> = status.iter().map(|r| (r.slot, r)).collect();

    let mut out: Vec<ParsedTerminal> = config
        .iter()
        .map(|c| {
            let row = by_slot.get(&c.slot);
            ParsedTerminal {
                slot: c.slot,
                mac: c.mac.clone().or_else(|| row.map(|r| r.mac.clone())),
                description: c.description.clone(),
                online: row.is_some_and(|r| r.online),
                distance_m: row.and_then(|r| r.distance_m),
            }
        })
        .collect();

    let known: std::collections::HashSet<SlotKey> = config.iter().map(|c| c.slot).collect();
    out.extend(status.iter().filter(|r| !known.contains(&r.slot)).map(|r| ParsedTerminal {
        slot: r.slot,
        mac: Some(r.mac.clone()),
        description: None,
        online: r.online,
        distance_m: r.distance_m,
    }));
    out
}

/// Key optical rows by hardware address, taken from the status table
/// through the shared slot.
pub fn optics_by_mac(optics: &[OpticalRow], status: &[StatusRow]) -> HashMap<String, OpticalRow> {
    let mac_by_slot: HashMap<SlotKey, &str> =
        status.iter().map(|r| (r.slot, r.mac.as_str())).collect();
    optics
        .iter()
        .filter_map(|row| {
            mac_by_slot
                .get(&row.slot)
                .map(|mac| ((*mac).to_owned(), row.clone()))
        })
        .collect()
}
