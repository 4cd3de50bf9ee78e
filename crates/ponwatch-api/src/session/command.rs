// ── Command surface ──
//
// Nothing reaches a device session except a named template below or
// free-form text that passed `validate_free_form`. Validation happens
// before any connection is opened.

use serde::Serialize;

use crate::error::Error;
use crate::slot::SlotKey;

const MAX_COMMAND_LEN: usize = 256;
const MAX_DESCRIPTION_LEN: usize = 64;

/// Read-only verbs accepted for free-form execution.
const ALLOWED_PREFIXES: &[&str] = &[
    "show onu",
    "show pon",
    "show epon",
    "show interface",
    "show optical",
    "show version",
    "show system",
    "show mac-address",
    "show vlan",
    "display onu",
    "display interface",
    "ping",
    "traceroute",
];

/// Substrings rejected anywhere in free-form text, even after an
/// allowed prefix.
const DENIED_SUBSTRINGS: &[(&str, &str)] = &[
    // credential access
    ("password", "credential access"),
    ("passwd", "credential access"),
    ("secret", "credential access"),
    ("community", "credential access"),
    ("username", "credential access"),
    ("running-config", "credential access"),
    // shell access
    ("shell", "shell access"),
    ("bash", "shell access"),
    ("debug", "shell access"),
    ("enable", "shell access"),
    // file transfer
    ("tftp", "file transfer"),
    ("ftp", "file transfer"),
    ("scp", "file transfer"),
    ("copy", "file transfer"),
    ("upload", "file transfer"),
    ("download", "file transfer"),
    // state changes
    ("configure", "configuration change"),
    ("reboot", "configuration change"),
    ("reload", "configuration change"),
    ("delete", "configuration change"),
    ("erase", "configuration change"),
    ("format", "configuration change"),
    ("write", "configuration change"),
    ("reset", "configuration change"),
    ("shutdown", "configuration change"),
    // injection
    (";", "command chaining"),
    ("&&", "command chaining"),
    ("||", "command chaining"),
    ("|", "command chaining"),
    ("`", "command substitution"),
    ("$(", "command substitution"),
    (">", "redirection"),
    ("<", "redirection"),
];

fn reject(command: &str, reason: impl Into<String>) -> Error {
    Error::CommandRejected {
        command: command.to_owned(),
        reason: reason.into(),
    }
}

/// Check free-form text against the allow-list and deny-list.
/// Returns the trimmed command on success.
pub fn validate_free_form(command: &str) -> Result<String, Error> {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return Err(reject(command, "empty command"));
    }
    if trimmed.len() > MAX_COMMAND_LEN {
        return Err(reject(command, format!("longer than {MAX_COMMAND_LEN} characters")));
    }
    if trimmed.chars().any(|c| c.is_control() || !c.is_ascii()) {
        return Err(reject(command, "control or non-ASCII characters"));
    }

    let lower = trimmed.to_ascii_lowercase();
    let allowed = ALLOWED_PREFIXES.iter().any(|prefix| {
        lower == *prefix
            || lower
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with(' '))
    });
    if !allowed {
        return Err(reject(command, "not an allowed read-only command"));
    }

    if let Some((needle, reason)) = DENIED_SUBSTRINGS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
    {
        return Err(reject(command, format!("{reason} (`{needle}`)")));
    }

    Ok(trimmed.to_owned())
}

/// The operations a caller may run through an interactive session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DeviceCommand {
    SetDescription { slot: SlotKey, description: String },
    Reboot { slot: SlotKey },
    SetVlan { slot: SlotKey, uni_port: u8, vlan: u16 },
    SetPortEnabled { slot: SlotKey, uni_port: u8, enabled: bool },
    SaveConfig,
    FreeForm(String),
}

impl DeviceCommand {
    /// Whether the command changes device state.
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::FreeForm(_))
    }

    /// Validated command lines, in send order.
    pub fn script(&self) -> Result<Vec<String>, Error> {
        let lines = match self {
            Self::SetDescription { slot, description } => {
                let description = validate_description(description)?;
                on_terminal(*slot, format!("onu {} description {description}", slot.onu_id))
            }
            Self::Reboot { slot } => on_terminal(*slot, format!("onu reboot {}", slot.onu_id)),
            Self::SetVlan {
                slot,
                uni_port,
                vlan,
            } => {
                validate_uni_port(*uni_port)?;
                if !(1..=4094).contains(vlan) {
                    return Err(reject(&self.label(), format!("VLAN {vlan} outside 1-4094")));
                }
                on_terminal(
                    *slot,
                    format!("onu {} ctc eth {uni_port} vlan mode tag {vlan}", slot.onu_id),
                )
            }
            Self::SetPortEnabled {
                slot,
                uni_port,
                enabled,
            } => {
                validate_uni_port(*uni_port)?;
                let state = if *enabled { "enable" } else { "disable" };
                on_terminal(
                    *slot,
                    format!("onu {} ctc eth {uni_port} admin-status {state}", slot.onu_id),
                )
            }
            Self::SaveConfig => vec!["write".to_owned()],
            Self::FreeForm(text) => vec![validate_free_form(text)?],
        };
        Ok(lines)
    }

    /// Short human label for logs and errors.
    pub fn label(&self) -> String {
        match self {
            Self::SetDescription { slot, .. } => format!("set description on {slot}"),
            Self::Reboot { slot } => format!("reboot {slot}"),
            Self::SetVlan { slot, vlan, .. } => format!("set VLAN {vlan} on {slot}"),
            Self::SetPortEnabled { slot, enabled, .. } => {
                format!("{} port on {slot}", if *enabled { "enable" } else { "disable" })
            }
            Self::SaveConfig => "save configuration".to_owned(),
            Self::FreeForm(text) => text.clone(),
        }
    }
}

fn on_terminal(slot: SlotKey, line: String) -> Vec<String> {
    vec![
        "configure terminal".to_owned(),
        format!("interface epon 0/{}", slot.port),
        line,
        "exit".to_owned(),
        "exit".to_owned(),
    ]
}

fn validate_uni_port(uni_port: u8) -> Result<(), Error> {
    if (1..=4).contains(&uni_port) {
        Ok(())
    } else {
        Err(reject("uni port", format!("UNI port {uni_port} outside 1-4")))
    }
}

fn validate_description(description: &str) -> Result<&str, Error> {
    let trimmed = description.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_DESCRIPTION_LEN {
        return Err(reject(
            description,
            format!("description must be 1-{MAX_DESCRIPTION_LEN} characters"),
        ));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | '/' | ':'))
    {
        return Err(reject(description, "description contains disallowed characters"));
    }
    Ok(trimmed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rejected(cmd: &str) -> bool {
        validate_free_form(cmd).is_err_and(|e| e.is_rejection())
    }

    #[test]
    fn allows_read_only_verbs() {
        assert_eq!(validate_free_form("  show onu info  ").unwrap(), "show onu info");
        assert!(validate_free_form("ping 10.0.0.1").is_ok());
        assert!(validate_free_form("traceroute 8.8.8.8").is_ok());
        assert!(validate_free_form("show version").is_ok());
    }

    #[test]
    fn rejects_unlisted_verbs() {
        assert!(rejected("configure terminal"));
        assert!(rejected("showonu"));
        assert!(rejected("show running-config"));
        assert!(rejected(""));
    }

    #[test]
    fn rejects_denied_substrings_after_allowed_prefix() {
        assert!(rejected("show onu password"));
        assert!(rejected("ping 10.0.0.1; reboot"));
        assert!(rejected("show onu info | include aa"));
        assert!(rejected("show onu $(id)"));
        assert!(rejected("show onu info > /tmp/x"));
        assert!(rejected("ping tftp.example.com"));
        assert!(rejected("show onu info\nreboot"));
    }

    #[test]
    fn description_template() {
        let cmd = DeviceCommand::SetDescription {
            slot: SlotKey::new(1, 2),
            description: "Cust-0042 Main St".into(),
        };
        assert_eq!(
            cmd.script().unwrap(),
            vec![
                "configure terminal",
                "interface epon 0/1",
                "onu 2 description Cust-0042 Main St",
                "exit",
                "exit",
            ]
        );
        assert!(cmd.is_write());
    }

    #[test]
    fn description_rejects_injection() {
        let cmd = DeviceCommand::SetDescription {
            slot: SlotKey::new(1, 2),
            description: "x\nreboot".into(),
        };
        assert!(cmd.script().unwrap_err().is_rejection());
    }

    #[test]
    fn vlan_range_checked() {
        let slot = SlotKey::new(3, 4);
        let ok = DeviceCommand::SetVlan { slot, uni_port: 1, vlan: 100 };
        assert_eq!(ok.script().unwrap()[2], "onu 4 ctc eth 1 vlan mode tag 100");
        let bad = DeviceCommand::SetVlan { slot, uni_port: 1, vlan: 4095 };
        assert!(bad.script().is_err());
        let bad_port = DeviceCommand::SetPortEnabled { slot, uni_port: 9, enabled: false };
        assert!(bad_port.script().is_err());
    }

    #[test]
    fn free_form_goes_through_validator() {
        assert!(DeviceCommand::FreeForm("erase startup".into()).script().is_err());
        assert!(!DeviceCommand::FreeForm("show onu info".into()).is_write());
    }
}
