// ── Runtime engine configuration ──
//
// These types describe *what* to poll and *how*. They carry already
// resolved credentials and tuning, but never touch disk. The CLI builds
// an `EngineConfig` plus one `OltConfig` per device and hands them in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use ponwatch_api::TlsMode;
use ponwatch_api::session::ReadPolicy;
use ponwatch_api::snmp::{OidTable, SnmpOptions};

use crate::model::OltId;

/// Health levels above which a threshold notification fires.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthThresholds {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub temperature_c: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            cpu_percent: 90.0,
            memory_percent: 90.0,
            temperature_c: 70.0,
        }
    }
}

/// Tuning for the per-device live traffic feed.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveOptions {
    pub interval: Duration,
    /// Smoothing factor: weight of the newest sample.
    pub alpha: f64,
    /// Multiplier applied to the smoothed rate when no valid sample exists.
    pub decay: f64,
    /// Gaps longer than this are treated as invalid.
    pub max_gap: Duration,
    /// Wall-clock bound on one counter read.
    pub timeout: Duration,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            alpha: 0.3,
            decay: 0.9,
            max_gap: Duration::from_secs(30),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Engine-wide settings shared by every OLT.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Background cycle cadence.
    pub poll_interval: Duration,
    /// Blocking worker pool size.
    pub workers: usize,
    pub snmp: SnmpOptions,
    pub read_policy: ReadPolicy,
    pub oids: OidTable,
    pub thresholds: HealthThresholds,
    pub live: LiveOptions,
    /// Minimum spacing between two alerts of one kind for one subject.
    pub alert_cooldown: Duration,
    /// Counter snapshots unseen for longer than this are evicted.
    pub counter_ttl: Duration,
    /// Samples kept per entity by the in-memory history sink.
    pub history_capacity: usize,
    /// Consecutive misses after which a manual poll deletes a terminal.
    pub removal_after_misses: u32,
    pub ssh_connect_timeout: Duration,
    pub self_diag_timeout: Duration,
    pub self_diag_tls: TlsMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(300),
            workers: 5,
            snmp: SnmpOptions::default(),
            read_policy: ReadPolicy::default(),
            oids: OidTable::default(),
            thresholds: HealthThresholds::default(),
            live: LiveOptions::default(),
            alert_cooldown: Duration::from_secs(3600),
            counter_ttl: Duration::from_secs(900),
            history_capacity: 288,
            removal_after_misses: 3,
            ssh_connect_timeout: Duration::from_secs(10),
            self_diag_timeout: Duration::from_secs(10),
            self_diag_tls: TlsMode::default(),
        }
    }
}

/// Interactive session credentials.
#[derive(Debug, Clone)]
pub struct SshCredentials {
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Sent to `enable` when the login lands in user mode.
    pub enable_password: Option<SecretString>,
}

/// Where terminals publish their own diagnostics page.
#[derive(Debug, Clone)]
pub struct SelfDiagEndpoint {
    pub url: Url,
    pub username: Option<String>,
    pub password: Option<SecretString>,
}

/// One OLT to poll.
///
/// Built by CLI, passed to `Poller` -- core never reads config files.
#[derive(Debug, Clone)]
pub struct OltConfig {
    pub id: OltId,
    pub host: String,
    pub model: Option<String>,
    pub pon_ports: u16,
    pub snmp_port: u16,
    pub community: SecretString,
    /// Without credentials the session transport is never used.
    pub ssh: Option<SshCredentials>,
    pub self_diag: Option<SelfDiagEndpoint>,
}

impl OltConfig {
    /// Telemetry-only device with the default port.
    pub fn new(id: impl Into<OltId>, host: impl Into<String>, community: SecretString) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            model: None,
            pon_ports: 8,
            snmp_port: 161,
            community,
            ssh: None,
            self_diag: None,
        }
    }
}
