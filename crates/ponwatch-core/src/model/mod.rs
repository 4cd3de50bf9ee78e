// ── Domain model ──

pub mod ids;
pub mod notification;
pub mod olt;
pub mod onu;
pub mod traffic;

pub use ids::{MacAddress, OltId, TerminalKey};
pub use notification::{HealthMetric, Notification, TerminalRef};
pub use olt::{Olt, OltHealth};
pub use onu::{OltOptics, Onu, OnuState, OpticsSource, SelfReportedOptics};
pub use traffic::{CounterSnapshot, EntityKind, LiveRate, LiveUpdate, TrafficSample};
