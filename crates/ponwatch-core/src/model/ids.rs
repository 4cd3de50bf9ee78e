// ── Core identity types ──
//
// OltId, MacAddress and TerminalKey form the foundation of every domain
// type. A terminal is identified by its position on an OLT, never by its
// hardware address alone.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use ponwatch_api::SlotKey;

// ── OltId ───────────────────────────────────────────────────────────

/// Operator-chosen name of an OLT (the config profile name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OltId(String);

impl OltId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OltId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OltId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for OltId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ── MacAddress ──────────────────────────────────────────────────────

/// MAC address, normalized to lowercase colon-separated format (aa:bb:cc:dd:ee:ff).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacAddress(String);

impl MacAddress {
    /// Normalize any common notation. Input that is not a hardware
    /// address is kept lowercased so it still compares consistently.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref();
        Self(ponwatch_api::mac::normalize(raw).unwrap_or_else(|| raw.trim().to_lowercase()))
    }

    /// Strict variant: `None` unless `raw` is a well-formed address.
    pub fn parse(raw: &str) -> Option<Self> {
        ponwatch_api::mac::normalize(raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MacAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

// ── TerminalKey ─────────────────────────────────────────────────────

/// (OLT, PON port, terminal id): the identity of one ONU record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TerminalKey {
    pub olt: OltId,
    pub port: u16,
    pub onu_id: u16,
}

impl TerminalKey {
    pub fn new(olt: OltId, port: u16, onu_id: u16) -> Self {
        Self { olt, port, onu_id }
    }

    pub fn from_slot(olt: &OltId, slot: SlotKey) -> Self {
        Self::new(olt.clone(), slot.port, slot.onu_id)
    }

    pub fn slot(&self) -> SlotKey {
        SlotKey::new(self.port, self.onu_id)
    }
}

impl fmt::Display for TerminalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.olt, self.port, self.onu_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_normalizes_notations() {
        assert_eq!(MacAddress::new("AA-BB-CC-DD-EE-01").as_str(), "aa:bb:cc:dd:ee:01");
        assert_eq!(MacAddress::new("aabb.ccdd.ee01"), MacAddress::new("AA:BB:CC:DD:EE:01"));
        assert_eq!(MacAddress::new(" Garbage ").as_str(), "garbage");
        assert!(MacAddress::parse("garbage").is_none());
    }

    #[test]
    fn terminal_key_distinguishes_slots() {
        let olt = OltId::from("east");
        let a = TerminalKey::new(olt.clone(), 1, 2);
        let b = TerminalKey::new(olt, 2, 2);
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "east/1:2");
        assert_eq!(a.slot().to_string(), "1:2");
    }
}
