// ── Output collection state machine ──
//
// The collector is fed events by the driver (data arrived, a poll found
// nothing, time elapsed, channel closed) and answers with the next step.
// It owns no clock and no socket, so every completion rule can be tested
// by feeding it a script of events.
//
//   Reading ──(empty poll, enough output)──▶ IdleCounting
//   IdleCounting ──(data)──▶ Reading
//   IdleCounting ──(idle_polls reached)──▶ Done(Idle)
//   any ──(ceiling elapsed)──▶ Done(Ceiling)
//   any ──(channel closed)──▶ Done(Closed)

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Vendor pagination markers. Each is answered with one continuation
/// keystroke and removed from the collected output.
pub const PAGINATION_MARKERS: &[&str] = &[
    "<--- More --->",
    "---- More ----",
    "--- More ---",
    "-- More --",
    "--More--",
    "Press any key to continue",
];

/// Keystroke sent in response to a pagination marker.
pub const CONTINUATION_KEY: &[u8] = b" ";

/// Timing parameters for one command's output collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadPolicy {
    /// Hard wall-clock ceiling for one command.
    #[serde(with = "secs")]
    pub ceiling: Duration,
    /// Sleep between non-blocking reads.
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    /// Consecutive empty polls that end collection once `min_bytes` arrived.
    pub idle_polls: u32,
    /// Output size below which idle polls are not counted.
    pub min_bytes: usize,
    /// Trailing text that marks the device waiting for input. One empty
    /// poll with the output ending in one of these completes early.
    pub prompt_endings: Vec<String>,
}

impl Default for ReadPolicy {
    fn default() -> Self {
        Self {
            ceiling: Duration::from_secs(75),
            poll_interval: Duration::from_millis(300),
            idle_polls: 5,
            min_bytes: 32,
            prompt_endings: vec!["#".to_owned()],
        }
    }
}

impl ReadPolicy {
    /// Policy used while logging in and escalating: prompts are short and
    /// end in `>`, `#` or a password request.
    pub fn for_login(&self) -> Self {
        Self {
            ceiling: self.ceiling.min(Duration::from_secs(20)),
            prompt_endings: vec![">".into(), "#".into(), ":".into()],
            ..self.clone()
        }
    }
}

/// Why collection stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// No new output for `idle_polls` polls after `min_bytes` arrived.
    Idle,
    /// Output ended in a prompt and the device went quiet.
    Prompt,
    /// The wall-clock ceiling elapsed.
    Ceiling,
    /// The remote end closed the channel.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reading,
    IdleCounting { empty_polls: u32 },
    Done(Completion),
}

/// What the driver should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Sleep one poll interval, then read again.
    Wait,
    /// Send [`CONTINUATION_KEY`], then read again.
    Continue,
    Done(Completion),
}

/// Accumulates one command's output and decides when it is complete.
#[derive(Debug)]
pub struct OutputCollector {
    policy: ReadPolicy,
    buffer: String,
    phase: Phase,
    pages: u32,
}

impl OutputCollector {
    pub fn new(policy: ReadPolicy) -> Self {
        Self {
            policy,
            buffer: String::new(),
            phase: Phase::Reading,
            pages: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn pages(&self) -> u32 {
        self.pages
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// New output arrived. Pagination markers are stripped and answered.
    pub fn on_data(&mut self, chunk: &str) -> Step {
        if let Phase::Done(c) = self.phase {
            return Step::Done(c);
        }
        self.buffer.push_str(chunk);
        self.phase = Phase::Reading;

        // A marker can straddle two reads, so search the whole buffer;
        // earlier markers have already been removed.
        let mut paged = false;
        while let Some((at, marker)) = find_marker(&self.buffer) {
            self.buffer.replace_range(at..at + marker.len(), "");
            paged = true;
        }
        if paged {
            self.pages += 1;
            Step::Continue
        } else {
            Step::Wait
        }
    }

    /// A poll returned nothing.
    pub fn on_idle(&mut self) -> Step {
        let empty_polls = match self.phase {
            Phase::Done(c) => return Step::Done(c),
            Phase::Reading => 1,
            Phase::IdleCounting { empty_polls } => empty_polls + 1,
        };

        if self.at_prompt() {
            return self.finish_with(Completion::Prompt);
        }
        if self.buffer.len() < self.policy.min_bytes {
            // Too little output to trust silence; keep waiting for the ceiling.
            return Step::Wait;
        }
        if empty_polls >= self.policy.idle_polls {
            return self.finish_with(Completion::Idle);
        }
        self.phase = Phase::IdleCounting { empty_polls };
        Step::Wait
    }

    /// Wall-clock check, called before every read.
    pub fn on_elapsed(&mut self, elapsed: Duration) -> Step {
        match self.phase {
            Phase::Done(c) => Step::Done(c),
            _ if elapsed >= self.policy.ceiling => self.finish_with(Completion::Ceiling),
            _ => Step::Wait,
        }
    }

    pub fn on_closed(&mut self) -> Step {
        match self.phase {
            Phase::Done(c) => Step::Done(c),
            _ => self.finish_with(Completion::Closed),
        }
    }

    /// Collected output with terminal control sequences removed.
    pub fn into_output(self) -> String {
        clean_terminal_text(&self.buffer)
    }

    fn finish_with(&mut self, completion: Completion) -> Step {
        self.phase = Phase::Done(completion);
        Step::Done(completion)
    }

    fn at_prompt(&self) -> bool {
        let tail = self.buffer.trim_end_matches([' ', '\r', '\n']);
        let last_line = tail.rsplit('\n').next().unwrap_or(tail);
        // A prompt is a short single token, not the end of a data line.
        last_line.len() <= 64
            && !last_line.trim().contains(' ')
            && self
                .policy
                .prompt_endings
                .iter()
                .any(|end| last_line.ends_with(end.as_str()))
    }
}

fn find_marker(buffer: &str) -> Option<(usize, &'static str)> {
    PAGINATION_MARKERS
        .iter()
        .filter_map(|m| buffer.find(m).map(|at| (at, *m)))
        .min_by_key(|(at, m)| (*at, std::cmp::Reverse(m.len())))
}

/// Drop backspaces, ANSI escape sequences and carriage returns that
/// devices emit while erasing pagination prompts.
pub fn clean_terminal_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\u{1b}' => {
                // CSI: ESC [ params final-byte
                if chars.peek() == Some(&'[') {
                    chars.next();
                    for n in chars.by_ref() {
                        if n.is_ascii_alphabetic() {
                            break;
                        }
                    }
                }
            }
            // Erasing a pagination prompt never reaches the previous line.
            '\u{8}' => {
                if !out.ends_with('\n') {
                    out.pop();
                }
            }
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReadPolicy {
        ReadPolicy {
            min_bytes: 10,
            idle_polls: 3,
            ..ReadPolicy::default()
        }
    }

    #[test]
    fn idle_completion_after_threshold() {
        let mut c = OutputCollector::new(policy());
        assert_eq!(c.on_data("0/1:1 aa:bb:cc:dd:ee:01 online\n"), Step::Wait);
        assert_eq!(c.on_idle(), Step::Wait);
        assert_eq!(c.phase(), Phase::IdleCounting { empty_polls: 1 });
        assert_eq!(c.on_idle(), Step::Wait);
        assert_eq!(c.on_idle(), Step::Done(Completion::Idle));
    }

    #[test]
    fn data_resets_idle_count() {
        let mut c = OutputCollector::new(policy());
        c.on_data("first chunk of output\n");
        c.on_idle();
        c.on_idle();
        c.on_data("second chunk\n");
        assert_eq!(c.phase(), Phase::Reading);
        assert_eq!(c.on_idle(), Step::Wait);
        assert_eq!(c.on_idle(), Step::Wait);
        assert_eq!(c.on_idle(), Step::Done(Completion::Idle));
    }

    #[test]
    fn short_output_waits_for_ceiling() {
        let mut c = OutputCollector::new(policy());
        c.on_data("ok");
        for _ in 0..20 {
            assert_eq!(c.on_idle(), Step::Wait);
        }
        assert_eq!(c.on_elapsed(Duration::from_secs(10)), Step::Wait);
        assert_eq!(
            c.on_elapsed(Duration::from_secs(75)),
            Step::Done(Completion::Ceiling)
        );
        assert_eq!(c.on_data("late"), Step::Done(Completion::Ceiling));
    }

    #[test]
    fn prompt_ends_early() {
        let mut c = OutputCollector::new(policy().for_login());
        c.on_data("Welcome\r\nOLT>");
        assert_eq!(c.on_idle(), Step::Done(Completion::Prompt));
        assert_eq!(c.into_output(), "Welcome\nOLT>");
    }

    #[test]
    fn data_line_ending_in_hash_is_not_a_prompt() {
        let mut c = OutputCollector::new(ReadPolicy {
            min_bytes: 1000,
            ..policy()
        });
        c.on_data("interface count #");
        assert_eq!(c.on_idle(), Step::Wait);
    }

    #[test]
    fn three_pages_join_without_markers() {
        let mut c = OutputCollector::new(policy());
        assert_eq!(c.on_data("page one line\n --More-- "), Step::Continue);
        assert_eq!(c.on_data("page two line\n-- Mo"), Step::Wait);
        assert_eq!(c.on_data("re --"), Step::Continue);
        assert_eq!(c.on_data("page three line\n"), Step::Wait);
        assert_eq!(c.pages(), 2);
        let out = c.into_output();
        assert!(!out.contains("More"));
        assert!(out.contains("page one line"));
        assert!(out.contains("page three line"));
    }

    #[test]
    fn closed_channel_completes() {
        let mut c = OutputCollector::new(policy());
        c.on_data("partial");
        assert_eq!(c.on_closed(), Step::Done(Completion::Closed));
    }

    #[test]
    fn cleans_control_sequences() {
        assert_eq!(clean_terminal_text("ab\u{8}c\r\n\u{1b}[2Kxy"), "ac\nxy");
    }
}
