// Interactive command-line sessions.

mod channel;
mod command;
mod driver;
mod ops;
mod reader;

pub use channel::{ReadEvent, ShellChannel, SshChannel, SshTarget};
pub use command::{DeviceCommand, validate_free_form};
pub use driver::{CommandOutput, SessionDriver};
pub use ops::{Connector, OPTICAL_DUMP, RUNNING_CONFIG, STATUS_TABLE, SessionOps};
pub use reader::{
    CONTINUATION_KEY, Completion, OutputCollector, PAGINATION_MARKERS, Phase, ReadPolicy, Step,
    clean_terminal_text,
};
