// ── Session driver ──
//
// Runs commands over a `ShellChannel`: privilege escalation, then one
// `OutputCollector` per command. Returned output has the command echo
// and the trailing prompt removed.

use std::time::Instant;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace, warn};

use super::channel::{ReadEvent, ShellChannel};
use super::reader::{CONTINUATION_KEY, Completion, OutputCollector, ReadPolicy, Step};
use crate::error::Error;

/// Prefixes the device uses to flag a rejected command.
const DEVICE_ERROR_MARKERS: &[&str] = &["% Unknown command", "% Invalid input", "% Incomplete command", "Error:"];

/// Output of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub completion: Completion,
    pub pages: u32,
}

pub struct SessionDriver<C: ShellChannel> {
    channel: C,
    policy: ReadPolicy,
    privileged: bool,
}

impl<C: ShellChannel> SessionDriver<C> {
    pub fn new(channel: C, policy: ReadPolicy) -> Self {
        Self {
            channel,
            policy,
            privileged: false,
        }
    }

    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    /// Wait for the login banner, then `enable` (with a password if asked)
    /// until the prompt ends in `#`.
    pub fn escalate(&mut self, enable_password: Option<&SecretString>) -> Result<(), Error> {
        let login = self.policy.for_login();
        let banner = self.collect(&login)?;
        if prompt_of(&banner.text).ends_with('#') {
            self.privileged = true;
            debug!("session already privileged");
            return Ok(());
        }

        self.channel.send(b"enable\n")?;
        let mut reply = self.collect(&login)?;
        if prompt_of(&reply.text).to_ascii_lowercase().ends_with("password:") {
            let Some(password) = enable_password else {
                return Err(Error::PrivilegeDenied {
                    message: "device asked for an enable password and none is configured".into(),
                });
            };
            self.channel.send(password.expose_secret().as_bytes())?;
            self.channel.send(b"\n")?;
            reply = self.collect(&login)?;
        }

        let prompt = prompt_of(&reply.text);
        if prompt.ends_with('#') {
            self.privileged = true;
            debug!(prompt, "privileged mode");
            Ok(())
        } else {
            Err(Error::PrivilegeDenied {
                message: format!("prompt after enable was `{prompt}`"),
            })
        }
    }

    /// Send one command and collect its output.
    pub fn run(&mut self, command: &str) -> Result<CommandOutput, Error> {
        trace!(command, "sending");
        self.channel.send(command.as_bytes())?;
        self.channel.send(b"\n")?;

        let policy = self.policy.clone();
        let mut output = self.collect(&policy)?;
        output.text = strip_echo_and_prompt(&output.text, command);

        if output.completion == Completion::Ceiling {
            warn!(command, bytes = output.text.len(), "command hit the wall-clock ceiling");
        }
        if let Some(line) = output
            .text
            .lines()
            .find(|l| DEVICE_ERROR_MARKERS.iter().any(|m| l.trim_start().starts_with(m)))
        {
            return Err(Error::DeviceRejected {
                command: command.to_owned(),
                output: line.trim().to_owned(),
            });
        }
        Ok(output)
    }

    /// Run several lines in order, stopping at the first rejection.
    pub fn run_script(&mut self, lines: &[String]) -> Result<String, Error> {
        let mut transcript = String::new();
        for line in lines {
            let out = self.run(line)?;
            if !out.text.is_empty() {
                transcript.push_str(&out.text);
                transcript.push('\n');
            }
        }
        Ok(transcript)
    }

    pub fn into_channel(self) -> C {
        self.channel
    }

    fn collect(&mut self, policy: &ReadPolicy) -> Result<CommandOutput, Error> {
        let mut collector = OutputCollector::new(policy.clone());
        let started = Instant::now();

        let completion = loop {
            if let Step::Done(c) = collector.on_elapsed(started.elapsed()) {
                break c;
            }
            let step = match self.channel.read_available()? {
                ReadEvent::Data(chunk) => collector.on_data(&chunk),
                ReadEvent::Empty => collector.on_idle(),
                ReadEvent::Closed => collector.on_closed(),
            };
            match step {
                Step::Done(c) => break c,
                Step::Continue => self.channel.send(CONTINUATION_KEY)?,
                Step::Wait => self.channel.pause(policy.poll_interval),
            }
        };

        let pages = collector.pages();
        Ok(CommandOutput {
            text: collector.into_output(),
            completion,
            pages,
        })
    }
}

/// Last non-empty line of `text`, trimmed.
fn prompt_of(text: &str) -> &str {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
}

/// Remove the echoed command line and a trailing bare prompt line.
fn strip_echo_and_prompt(text: &str, command: &str) -> String {
    let mut lines: Vec<&str> = text.lines().collect();

    if let Some(pos) = lines.iter().take(3).position(|l| l.trim_end().ends_with(command.trim())) {
        lines.drain(..=pos);
    }
    while lines.last().is_some_and(|l| {
        let l = l.trim();
        l.is_empty() || (!l.contains(' ') && (l.ends_with('#') || l.ends_with('>')))
    }) {
        lines.pop();
    }
    while lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_echo_and_prompt() {
        let raw = "OLT# show onu info\n0/1:1 aa:bb:cc:dd:ee:01 online\n\nOLT#";
        assert_eq!(
            strip_echo_and_prompt(raw, "show onu info"),
            "0/1:1 aa:bb:cc:dd:ee:01 online"
        );
    }

    #[test]
    fn keeps_output_without_echo() {
        assert_eq!(strip_echo_and_prompt("line a\nline b", "show x"), "line a\nline b");
    }

    #[test]
    fn prompt_is_last_non_empty_line() {
        assert_eq!(prompt_of("banner\nOLT>\n\n"), "OLT>");
        assert_eq!(prompt_of(""), "");
    }
}
