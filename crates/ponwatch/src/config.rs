//! CLI configuration: thin wrapper around `ponwatch_config` shared types.
//!
//! Adds the `--config` path override and `GlobalOpts` flag overrides on
//! top of the file-level settings.

use std::path::PathBuf;
use std::time::Duration;

use ponwatch_core::Poller;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use ponwatch_config::{Config, OltProfile, save_config_to};

/// Config file in effect: `--config` / `PONWATCH_CONFIG`, else the
/// platform default.
pub fn active_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(ponwatch_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(ponwatch_config::load_config_from(&active_path(global))?)
}

/// Build a poller for every configured OLT, or just `only`.
///
/// CLI flag overrides take priority over file values.
pub fn build_poller(global: &GlobalOpts, only: Option<&str>) -> Result<Poller, CliError> {
    let cfg = load(global)?;
    if cfg.olts.is_empty() {
        return Err(CliError::NoConfig {
            path: active_path(global).display().to_string(),
        });
    }

    let mut engine = ponwatch_config::engine_config(&cfg);
    if let Some(secs) = global.timeout {
        engine.snmp.timeout = Duration::from_secs(secs);
    }

    let olts = ponwatch_config::olt_configs(&cfg, only)?;
    tracing::debug!(
        olts = olts.len(),
        interval_secs = engine.poll_interval.as_secs(),
        "built engine configuration"
    );
    Ok(Poller::new(engine, olts)?)
}
