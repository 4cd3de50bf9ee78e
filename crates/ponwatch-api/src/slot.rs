use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of a terminal on an OLT: PON port plus terminal id on that port.
///
/// This is the identity every transport agrees on. Hardware addresses are
/// not unique across slots during migrations, so nothing keys on them alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub port: u16,
    pub onu_id: u16,
}

impl SlotKey {
    pub fn new(port: u16, onu_id: u16) -> Self {
        Self { port, onu_id }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.port, self.onu_id)
    }
}
