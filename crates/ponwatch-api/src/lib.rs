// ponwatch-api: device transports for EPON/GPON OLTs (SNMP telemetry,
// interactive CLI sessions, self-reported diagnostics scrape)

pub mod error;
pub mod mac;
pub mod parser;
pub mod selfdiag;
pub mod session;
pub mod slot;
pub mod snmp;
pub mod transport;

pub use error::Error;
pub use selfdiag::{SelfDiagClient, SelfReportedRow};
pub use session::{DeviceCommand, SessionOps, SshTarget};
pub use slot::SlotKey;
pub use snmp::{CounterReading, HealthReading, TelemetryPoller, TerminalPoll, TerminalRow};
pub use transport::{TlsMode, TransportConfig};
