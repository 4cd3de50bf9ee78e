//! Shared configuration for the ponwatch CLI and daemon.
//!
//! TOML file with `[defaults]`, `[thresholds]`, an optional `[oids]`
//! override and one `[olts.<name>]` table per device. Secrets resolve
//! env var → system keyring → plaintext, and the result is translated
//! into `ponwatch_core::{EngineConfig, OltConfig}`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ponwatch_api::TlsMode;
use ponwatch_api::snmp::OidTable;
use ponwatch_core::{
    EngineConfig, HealthThresholds, OltConfig, SelfDiagEndpoint, SshCredentials,
};

const KEYRING_SERVICE: &str = "ponwatch";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no {what} configured for OLT '{olt}'")]
    NoCredentials { olt: String, what: String },

    #[error("unknown OLT '{name}'")]
    UnknownOlt { name: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub thresholds: Thresholds,

    /// Replaces the built-in vendor table identifiers. Missing keys keep
    /// their defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oids: Option<OidTable>,

    /// Named OLT profiles, polled in name order.
    #[serde(default)]
    pub olts: BTreeMap<String, OltProfile>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Defaults {
    pub output: String,
    pub color: String,
    /// Seconds between background cycles.
    pub poll_interval: u64,
    /// Seconds per structured telemetry request.
    pub snmp_timeout: u64,
    pub snmp_retries: u32,
    /// Wall-clock ceiling in seconds for one session command.
    pub session_ceiling: u64,
    /// Consecutive empty reads that end a session command.
    pub idle_polls: u32,
    pub workers: usize,
    /// Seconds between live feed reads.
    pub live_interval: u64,
    /// Seconds before the same alert may fire again.
    pub alert_cooldown: u64,
    /// Consecutive misses after which a manual poll deletes a terminal.
    pub removal_after_misses: u32,
    /// Accept any certificate on self-reported diagnostics pages.
    pub insecure: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: "table".into(),
            color: "auto".into(),
            poll_interval: 300,
            snmp_timeout: 3,
            snmp_retries: 1,
            session_ceiling: 75,
            idle_polls: 5,
            workers: 5,
            live_interval: 3,
            alert_cooldown: 3600,
            removal_after_misses: 3,
            insecure: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Thresholds {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub temperature_c: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        let core = HealthThresholds::default();
        Self {
            cpu_percent: core.cpu_percent,
            memory_percent: core.memory_percent,
            temperature_c: core.temperature_c,
        }
    }
}

/// One OLT.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OltProfile {
    /// Management address (IP or hostname).
    pub host: String,

    /// Model string; when absent the device's own description is used.
    pub model: Option<String>,

    #[serde(default = "default_pon_ports")]
    pub pon_ports: u16,

    pub snmp_port: Option<u16>,

    /// Read community (plaintext -- prefer keyring or env var).
    pub community: Option<String>,

    /// Environment variable name containing the read community.
    pub community_env: Option<String>,

    pub ssh_port: Option<u16>,

    /// Session login. Without it the session transport is never used.
    pub username: Option<String>,

    /// Session password (plaintext -- prefer keyring).
    pub password: Option<String>,

    /// Environment variable name containing the session password.
    pub password_env: Option<String>,

    /// Privileged-mode password, if the login lands in user mode.
    pub enable_password: Option<String>,

    /// Page where terminals publish their own optical diagnostics.
    pub self_diag_url: Option<String>,
    pub self_diag_username: Option<String>,
    pub self_diag_password: Option<String>,
}

fn default_pon_ports() -> u16 {
    8
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "ponwatch", "ponwatch").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("ponwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Environment keys use a double underscore between levels, e.g.
/// `PONWATCH_DEFAULTS__POLL_INTERVAL=60`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PONWATCH_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

// ── Credential resolution ───────────────────────────────────────────

/// The secrets ponwatch keeps per OLT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    Community,
    SshPassword,
    EnablePassword,
}

impl SecretKind {
    /// Keyring entry suffix, also used in messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Community => "community",
            Self::SshPassword => "ssh-password",
            Self::EnablePassword => "enable-password",
        }
    }
}

fn keyring_entry(olt: &str, kind: SecretKind) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{olt}/{}", kind.as_str()),
    )?)
}

/// Store a secret in the system keyring.
pub fn store_secret(olt: &str, kind: SecretKind, value: &str) -> Result<(), ConfigError> {
    keyring_entry(olt, kind)?.set_password(value)?;
    Ok(())
}

/// Env var named by the profile, then the system keyring, then the
/// plaintext value from the file.
pub fn resolve_secret(
    olt: &str,
    kind: SecretKind,
    env_name: Option<&str>,
    plaintext: Option<&str>,
) -> Option<SecretString> {
    // 1. Named env var
    if let Some(name) = env_name {
        if let Ok(val) = std::env::var(name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(olt, kind) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    plaintext.map(|p| SecretString::from(p.to_owned()))
}

// ── Translation to core types ───────────────────────────────────────

/// Engine-wide settings from `[defaults]`, `[thresholds]` and `[oids]`.
pub fn engine_config(cfg: &Config) -> EngineConfig {
    let d = &cfg.defaults;
    let mut engine = EngineConfig {
        poll_interval: Duration::from_secs(d.poll_interval.max(1)),
        workers: d.workers.max(1),
        alert_cooldown: Duration::from_secs(d.alert_cooldown),
        removal_after_misses: d.removal_after_misses.max(1),
        thresholds: HealthThresholds {
            cpu_percent: cfg.thresholds.cpu_percent,
            memory_percent: cfg.thresholds.memory_percent,
            temperature_c: cfg.thresholds.temperature_c,
        },
        self_diag_tls: if d.insecure {
            TlsMode::DangerAcceptInvalid
        } else {
            TlsMode::System
        },
        ..EngineConfig::default()
    };
    engine.snmp.timeout = Duration::from_secs(d.snmp_timeout.max(1));
    engine.snmp.retries = d.snmp_retries;
    engine.read_policy.ceiling = Duration::from_secs(d.session_ceiling.max(1));
    engine.read_policy.idle_polls = d.idle_polls.max(1);
    engine.live.interval = Duration::from_secs(d.live_interval.max(1));
    if let Some(ref oids) = cfg.oids {
        engine.oids = oids.clone();
    }
    engine
}

/// Build an `OltConfig` from one profile, resolving its secrets.
pub fn profile_to_olt_config(name: &str, profile: &OltProfile) -> Result<OltConfig, ConfigError> {
    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: format!("olts.{name}.host"),
            reason: "must not be empty".into(),
        });
    }
    if profile.pon_ports == 0 {
        return Err(ConfigError::Validation {
            field: format!("olts.{name}.pon_ports"),
            reason: "must be at least 1".into(),
        });
    }

    let community = resolve_secret(
        name,
        SecretKind::Community,
        profile.community_env.as_deref(),
        profile.community.as_deref(),
    )
    .ok_or_else(|| ConfigError::NoCredentials {
        olt: name.into(),
        what: "SNMP community".into(),
    })?;

    let mut olt = OltConfig::new(name, profile.host.trim(), community);
    olt.model.clone_from(&profile.model);
    olt.pon_ports = profile.pon_ports;
    if let Some(port) = profile.snmp_port {
        olt.snmp_port = port;
    }

    if let Some(ref username) = profile.username {
        let password = resolve_secret(
            name,
            SecretKind::SshPassword,
            profile.password_env.as_deref(),
            profile.password.as_deref(),
        )
        .ok_or_else(|| ConfigError::NoCredentials {
            olt: name.into(),
            what: "session password".into(),
        })?;
        olt.ssh = Some(SshCredentials {
            port: profile.ssh_port.unwrap_or(22),
            username: username.clone(),
            password,
            enable_password: resolve_secret(
                name,
                SecretKind::EnablePassword,
                None,
                profile.enable_password.as_deref(),
            ),
        });
    }

    if let Some(ref raw) = profile.self_diag_url {
        let url = raw.parse().map_err(|_| ConfigError::Validation {
            field: format!("olts.{name}.self_diag_url"),
            reason: format!("invalid URL: {raw}"),
        })?;
        olt.self_diag = Some(SelfDiagEndpoint {
            url,
            username: profile.self_diag_username.clone(),
            password: profile
                .self_diag_password
                .as_ref()
                .map(|p| SecretString::from(p.clone())),
        });
    }

    Ok(olt)
}

/// Every configured OLT, or only `only` when given.
pub fn olt_configs(cfg: &Config, only: Option<&str>) -> Result<Vec<OltConfig>, ConfigError> {
    match only {
        Some(name) => {
            let profile = cfg.olts.get(name).ok_or_else(|| ConfigError::UnknownOlt {
                name: name.into(),
            })?;
            Ok(vec![profile_to_olt_config(name, profile)?])
        }
        None => cfg
            .olts
            .iter()
            .map(|(name, profile)| profile_to_olt_config(name, profile))
            .collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    const SAMPLE: &str = r#"
[defaults]
poll_interval = 120
workers = 3

[thresholds]
temperature_c = 65.0

[olts.east]
host = "192.0.2.10"
community = "public"
username = "admin"
password = "admin"
self_diag_url = "http://192.0.2.10/onu_diag.html"

[olts.west]
host = "192.0.2.20"
pon_ports = 16
snmp_port = 1161
community = "private"
"#;

    fn write(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.defaults.poll_interval, 300);
        assert!(cfg.olts.is_empty());
        assert!(cfg.oids.is_none());
    }

    #[test]
    fn loads_profiles_and_defaults() {
        let (_dir, path) = write(SAMPLE);
        let cfg = load_config_from(&path).unwrap();

        assert_eq!(cfg.defaults.poll_interval, 120);
        assert_eq!(cfg.defaults.session_ceiling, 75);
        assert_eq!(cfg.olts.len(), 2);
        assert_eq!(cfg.olts["west"].pon_ports, 16);
        assert_eq!(cfg.olts["east"].pon_ports, 8);

        let engine = engine_config(&cfg);
        assert_eq!(engine.poll_interval, Duration::from_secs(120));
        assert_eq!(engine.workers, 3);
        assert!((engine.thresholds.temperature_c - 65.0).abs() < f64::EPSILON);
        assert!((engine.thresholds.cpu_percent - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn translates_profiles() {
        let (_dir, path) = write(SAMPLE);
        let cfg = load_config_from(&path).unwrap();
        let olts = olt_configs(&cfg, None).unwrap();

        assert_eq!(olts.len(), 2);
        let east = &olts[0];
        assert_eq!(east.id.as_str(), "east");
        assert!(east.ssh.is_some());
        assert_eq!(east.ssh.as_ref().unwrap().port, 22);
        assert!(east.self_diag.is_some());

        let west = &olts[1];
        assert_eq!(west.snmp_port, 1161);
        assert!(west.ssh.is_none());
    }

    #[test]
    fn selects_single_olt() {
        let (_dir, path) = write(SAMPLE);
        let cfg = load_config_from(&path).unwrap();
        assert_eq!(olt_configs(&cfg, Some("west")).unwrap().len(), 1);
        assert!(matches!(
            olt_configs(&cfg, Some("north")),
            Err(ConfigError::UnknownOlt { .. })
        ));
    }

    #[test]
    fn community_env_wins() {
        let var = "PATH".to_owned();
        let value = std::env::var(&var).unwrap();
        let profile = OltProfile {
            host: "192.0.2.30".into(),
            pon_ports: 8,
            community: Some("from-file".into()),
            community_env: Some(var),
            ..OltProfile::default()
        };
        let olt = profile_to_olt_config("south", &profile).unwrap();
        assert_eq!(olt.community.expose_secret(), value);
    }

    #[test]
    fn rejects_bad_profiles() {
        let empty_host = OltProfile {
            pon_ports: 8,
            community: Some("public".into()),
            ..OltProfile::default()
        };
        assert!(matches!(
            profile_to_olt_config("x", &empty_host),
            Err(ConfigError::Validation { .. })
        ));

        let bad_url = OltProfile {
            host: "192.0.2.40".into(),
            pon_ports: 8,
            community: Some("public".into()),
            self_diag_url: Some("not a url".into()),
            ..OltProfile::default()
        };
        assert!(matches!(
            profile_to_olt_config("x", &bad_url),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.olts.insert(
            "east".into(),
            OltProfile {
                host: "192.0.2.10".into(),
                pon_ports: 4,
                community_env: Some("EAST_COMMUNITY".into()),
                ..OltProfile::default()
            },
        );
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.olts["east"].pon_ports, 4);
        assert_eq!(
            loaded.olts["east"].community_env.as_deref(),
            Some("EAST_COMMUNITY")
        );
    }
}
