//! Shared helpers for command handlers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};

use ponwatch_api::SlotKey;
use ponwatch_core::OltId;

use crate::cli::SlotArg;
use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Stderr spinner for device round-trips; hidden in quiet mode.
pub fn spinner(message: impl Into<String>, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} ({elapsed})") {
        bar.set_style(style);
    }
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

pub fn slot(arg: SlotArg) -> SlotKey {
    SlotKey::new(arg.port, arg.onu_id)
}

pub fn olt_id(name: &str) -> OltId {
    OltId::from(name)
}

/// "3m 12s ago" style age, truncated to whole seconds.
pub fn ago(at: Option<DateTime<Utc>>) -> String {
    let Some(at) = at else {
        return "never".into();
    };
    let secs = (Utc::now() - at).num_seconds().max(0).unsigned_abs();
    format!("{} ago", humantime::format_duration(Duration::from_secs(secs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ago_formats_missing_as_never() {
        assert_eq!(ago(None), "never");
    }

    #[test]
    fn ago_rounds_to_seconds() {
        let at = Utc::now() - chrono::Duration::seconds(75);
        let text = ago(Some(at));
        assert!(text.starts_with("1m 1"), "{text}");
        assert!(text.ends_with(" ago"));
    }

    #[test]
    fn yes_flag_skips_prompt() {
        assert!(matches!(confirm("Reboot?", true), Ok(true)));
    }
}
