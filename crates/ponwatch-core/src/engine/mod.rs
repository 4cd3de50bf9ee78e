// ── Polling and reconciliation engine ──

pub mod backend;
pub mod cache;
pub mod fusion;
pub mod reconcile;
pub mod transition;

pub use backend::{DeviceBackend, NetworkBackend};
pub use cache::ExpiringCache;
pub use fusion::{OpticsReading, resolve_optics};
pub use reconcile::{
    CycleReport, DataSource, DeviceFailure, Observation, PollMode, PollOutcome, Reconciler,
};
pub use transition::{Transition, classify};
