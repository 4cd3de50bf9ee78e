// Structured telemetry over SNMP v2c.

mod oid;
mod poller;
mod tables;
mod walker;

pub use oid::{Oid, OidTable, RowIndex};
pub use poller::{HealthReading, TelemetryPoller, TerminalPoll};
pub use tables::{
    Column, CounterReading, OpticalTables, RegistrationTables, TerminalRow, TrafficTables,
};
pub use walker::{SnmpOptions, SnmpSession, SnmpValue, TableWalker};
