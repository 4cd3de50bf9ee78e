//! Reconciliation engine between `ponwatch-api` and its consumers (CLI / daemon).
//!
//! This crate owns the domain model, the reactive store and every piece of
//! state carried between poll cycles:
//!
//! - **[`Poller`]** — Facade over a set of OLTs. [`start()`](Poller::start)
//!   spawns the periodic background cycle; [`poll_olt()`](Poller::poll_olt)
//!   runs an operator-triggered poll; [`execute()`](Poller::execute) sends a
//!   validated command over a short-lived session; [`live()`](Poller::live)
//!   joins a reference-counted live bandwidth feed.
//!
//! - **[`Reconciler`]** — Per device: structured telemetry first, session
//!   dumps when telemetry comes back empty, self-reported diagnostics merged
//!   last. Computes online/offline transitions, retains optics on terminals
//!   that drop out, and batches notifications behind a suppression cache.
//!
//! - **[`DataStore`]** — `DashMap` + `tokio::sync::watch` collections keyed
//!   by OLT id and by `(olt, port, onu)`. Implements the
//!   [`TerminalRepository`] / [`OltRepository`] seams the engine writes through.
//!
//! - **Traffic** ([`traffic`]) — Counter-to-rate math with wraparound and
//!   plausibility handling, history sampling with port/device aggregates,
//!   and EMA-smoothed live rates.

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod model;
pub mod poller;
pub mod store;
pub mod stream;
pub mod traffic;
pub mod worker;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{
    EngineConfig, HealthThresholds, LiveOptions, OltConfig, SelfDiagEndpoint, SshCredentials,
};
pub use engine::{
    CycleReport, DataSource, DeviceBackend, NetworkBackend, Observation, PollMode, PollOutcome,
    Reconciler,
};
pub use error::CoreError;
pub use poller::{Poller, PollerState};
pub use store::{DataStore, OltRepository, TerminalRepository};
pub use stream::TerminalWatch;
pub use traffic::{HistorySink, LiveSubscription, MemoryHistory};
pub use worker::WorkerPool;

pub use model::{
    EntityKind, HealthMetric, LiveRate, LiveUpdate, MacAddress, Notification, Olt, OltHealth,
    OltId, OltOptics, Onu, OnuState, OpticsSource, SelfReportedOptics, TerminalKey, TerminalRef,
    TrafficSample,
};
