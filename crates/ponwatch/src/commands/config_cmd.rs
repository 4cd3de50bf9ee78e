//! Config subcommand handlers.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use dialoguer::{Confirm, Input, Password, Select};
use serde::Serialize;

use ponwatch_config::{Defaults, SecretKind, Thresholds};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, SecretArg};
use crate::config::{self, Config, OltProfile};
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// What `config show` serializes: the file contents with secrets masked.
#[derive(Serialize)]
struct Redacted<'a> {
    defaults: &'a Defaults,
    thresholds: &'a Thresholds,
    olts: BTreeMap<String, OltProfile>,
}

fn mask(value: Option<&String>) -> Option<String> {
    value.map(|_| MASK.to_owned())
}

fn redact(cfg: &Config) -> Redacted<'_> {
    let olts = cfg
        .olts
        .iter()
        .map(|(name, p)| {
            let masked = OltProfile {
                community: mask(p.community.as_ref()),
                password: mask(p.password.as_ref()),
                enable_password: mask(p.enable_password.as_ref()),
                self_diag_password: mask(p.self_diag_password.as_ref()),
                ..p.clone()
            };
            (name.clone(), masked)
        })
        .collect();
    Redacted {
        defaults: &cfg.defaults,
        thresholds: &cfg.thresholds,
        olts,
    }
}

/// Format config for display, masking sensitive fields.
fn format_redacted(cfg: &Redacted<'_>) -> String {
    let mut out = String::new();
    let d = cfg.defaults;
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "poll_interval = {}", d.poll_interval);
    let _ = writeln!(out, "snmp_timeout = {}", d.snmp_timeout);
    let _ = writeln!(out, "snmp_retries = {}", d.snmp_retries);
    let _ = writeln!(out, "session_ceiling = {}", d.session_ceiling);
    let _ = writeln!(out, "workers = {}", d.workers);
    let _ = writeln!(out, "live_interval = {}", d.live_interval);
    let _ = writeln!(out, "alert_cooldown = {}", d.alert_cooldown);
    let _ = writeln!(out, "removal_after_misses = {}", d.removal_after_misses);

    let t = cfg.thresholds;
    let _ = writeln!(out);
    let _ = writeln!(out, "[thresholds]");
    let _ = writeln!(out, "cpu_percent = {}", t.cpu_percent);
    let _ = writeln!(out, "memory_percent = {}", t.memory_percent);
    let _ = writeln!(out, "temperature_c = {}", t.temperature_c);

    for (name, p) in &cfg.olts {
        let _ = writeln!(out);
        let _ = writeln!(out, "[olts.{name}]");
        let _ = writeln!(out, "host = \"{}\"", p.host);
        if let Some(ref model) = p.model {
            let _ = writeln!(out, "model = \"{model}\"");
        }
        let _ = writeln!(out, "pon_ports = {}", p.pon_ports);
        let fields = [
            ("community", &p.community),
            ("community_env", &p.community_env),
            ("username", &p.username),
            ("password", &p.password),
            ("password_env", &p.password_env),
            ("enable_password", &p.enable_password),
            ("self_diag_url", &p.self_diag_url),
            ("self_diag_username", &p.self_diag_username),
            ("self_diag_password", &p.self_diag_password),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                let _ = writeln!(out, "{key} = \"{value}\"");
            }
        }
    }
    out
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Offer to store a secret in the system keyring or return it for plaintext config.
///
/// Returns `Some(secret)` if the user chose plaintext, `None` if stored in keyring.
fn prompt_keyring_storage(
    olt: &str,
    kind: SecretKind,
    secret: String,
) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt(format!("Where to store the {}?", kind.as_str()))
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        ponwatch_config::store_secret(olt, kind, &secret)?;
        eprintln!("   ✓ {} stored in system keyring", kind.as_str());
        Ok(None)
    } else {
        Ok(Some(secret))
    }
}

fn prompt_secret(prompt: &str) -> Result<String, CliError> {
    let secret = Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(prompt_err)?;
    if secret.is_empty() {
        return Err(CliError::Validation {
            field: prompt.to_lowercase(),
            reason: "cannot be empty".into(),
        });
    }
    Ok(secret)
}

fn secret_kind(arg: SecretArg) -> SecretKind {
    match arg {
        SecretArg::Community => SecretKind::Community,
        SecretArg::SshPassword => SecretKind::SshPassword,
        SecretArg::EnablePassword => SecretKind::EnablePassword,
    }
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let path = config::active_path(global);
            let mut cfg = config::load(global)?;
            eprintln!("ponwatch configuration wizard");
            eprintln!("   Config path: {}\n", path.display());

            // 1. Name and address
            let name: String = Input::new()
                .with_prompt("OLT name")
                .default("olt1".into())
                .interact_text()
                .map_err(prompt_err)?;
            if cfg.olts.contains_key(&name)
                && !Confirm::new()
                    .with_prompt(format!("Replace the existing profile '{name}'?"))
                    .default(false)
                    .interact()
                    .map_err(prompt_err)?
            {
                return Ok(());
            }

            let host: String = Input::new()
                .with_prompt("Management address")
                .interact_text()
                .map_err(prompt_err)?;
            let pon_ports: u16 = Input::new()
                .with_prompt("PON ports")
                .default(8)
                .interact_text()
                .map_err(prompt_err)?;

            // 2. Telemetry community
            let community = prompt_secret("SNMP read community")?;
            let community = prompt_keyring_storage(&name, SecretKind::Community, community)?;

            // 3. Optional session login for the CLI fallback and commands
            let with_ssh = Confirm::new()
                .with_prompt("Configure SSH login (needed for commands and CLI fallback)?")
                .default(true)
                .interact()
                .map_err(prompt_err)?;
            let (username, password) = if with_ssh {
                let user: String = Input::new()
                    .with_prompt("SSH username")
                    .interact_text()
                    .map_err(prompt_err)?;
                let pass = prompt_secret("SSH password")?;
                let pass = prompt_keyring_storage(&name, SecretKind::SshPassword, pass)?;
                (Some(user), pass)
            } else {
                (None, None)
            };

            // 4. Build profile and write
            let profile = OltProfile {
                host,
                pon_ports,
                community,
                username,
                password,
                ..OltProfile::default()
            };
            if profile.host.trim().is_empty() {
                return Err(CliError::Validation {
                    field: "host".into(),
                    reason: "cannot be empty".into(),
                });
            }
            cfg.olts.insert(name.clone(), profile);
            config::save_config_to(&cfg, &path)?;

            eprintln!("\n✓ Configuration written to {}", path.display());
            eprintln!("\n  Test it: ponwatch poll {name}");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let redacted = redact(&cfg);
            let out = output::render_single(&global.output, &redacted, format_redacted, |_| {
                "config".into()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            println!("{}", config::active_path(global).display());
            Ok(())
        }

        // ── Set-secret ──────────────────────────────────────────────
        ConfigCommand::SetSecret { olt, kind } => {
            let cfg = config::load(global)?;
            if !cfg.olts.contains_key(&olt) {
                return Err(CliError::NotFound {
                    resource_type: "OLT".into(),
                    identifier: olt,
                    list_command: "olts".into(),
                });
            }
            let kind = secret_kind(kind);
            let secret = prompt_secret(&format!("{} for {olt}", kind.as_str()))?;
            ponwatch_config::store_secret(&olt, kind, &secret)?;
            if !global.quiet {
                eprintln!("✓ {} for '{olt}' stored in system keyring", kind.as_str());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redaction_masks_every_secret() {
        let mut cfg = Config::default();
        cfg.olts.insert(
            "east".into(),
            OltProfile {
                host: "10.0.0.1".into(),
                community: Some("s3cret".into()),
                password: Some("hunter2".into()),
                community_env: Some("EAST_COMMUNITY".into()),
                ..OltProfile::default()
            },
        );
        let text = format_redacted(&redact(&cfg));
        assert!(!text.contains("s3cret"));
        assert!(!text.contains("hunter2"));
        assert!(text.contains("community = \"****\""));
        assert!(text.contains("community_env = \"EAST_COMMUNITY\""));
    }
}
