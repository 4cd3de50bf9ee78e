// ── Session operations ──
//
// Each operation opens its own session, escalates, runs, and drops the
// connection. A stuck session can only ever stall the one operation
// that opened it.

use secrecy::SecretString;
use tracing::{debug, info};

use super::channel::{ShellChannel, SshChannel, SshTarget};
use super::command::{DeviceCommand, validate_free_form};
use super::driver::SessionDriver;
use super::reader::ReadPolicy;
use crate::error::Error;

pub const RUNNING_CONFIG: &str = "show running-config";
pub const STATUS_TABLE: &str = "show onu status all";
pub const OPTICAL_DUMP: &str = "show onu optical-info all";

/// Opens fresh channels to one device.
pub trait Connector {
    type Channel: ShellChannel;

    fn connect(&self) -> Result<Self::Channel, Error>;
}

impl Connector for SshTarget {
    type Channel = SshChannel;

    fn connect(&self) -> Result<SshChannel, Error> {
        SshChannel::connect(self)
    }
}

/// The narrow set of things callers may do over an interactive session.
pub struct SessionOps<K: Connector> {
    connector: K,
    enable_password: Option<SecretString>,
    policy: ReadPolicy,
}

impl<K: Connector> SessionOps<K> {
    pub fn new(connector: K, enable_password: Option<SecretString>, policy: ReadPolicy) -> Self {
        Self {
            connector,
            enable_password,
            policy,
        }
    }

    fn with_session<T>(
        &self,
        op: impl FnOnce(&mut SessionDriver<K::Channel>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let channel = self.connector.connect()?;
        let mut driver = SessionDriver::new(channel, self.policy.clone());
        driver.escalate(self.enable_password.as_ref())?;
        op(&mut driver)
    }

    fn read(&self, command: &str) -> Result<String, Error> {
        self.with_session(|driver| {
            let out = driver.run(command)?;
            debug!(command, bytes = out.text.len(), pages = out.pages, completion = ?out.completion, "read complete");
            Ok(out.text)
        })
    }

    /// Full configuration dump.
    pub fn running_config(&self) -> Result<String, Error> {
        self.read(RUNNING_CONFIG)
    }

    /// Per-terminal registration status table.
    pub fn status_table(&self) -> Result<String, Error> {
        self.read(STATUS_TABLE)
    }

    /// Per-terminal optical diagnostics.
    pub fn optical_dump(&self) -> Result<String, Error> {
        self.read(OPTICAL_DUMP)
    }

    /// Configuration and status in one session, for the fallback path.
    pub fn config_and_status(&self) -> Result<(String, String), Error> {
        self.with_session(|driver| {
            let config = driver.run(RUNNING_CONFIG)?.text;
            let status = driver.run(STATUS_TABLE)?.text;
            Ok((config, status))
        })
    }

    /// Status table and optical dump in one session. The dump has no
    /// hardware addresses; the status table supplies them.
    pub fn status_and_optics(&self) -> Result<(String, String), Error> {
        self.with_session(|driver| {
            let status = driver.run(STATUS_TABLE)?.text;
            let optics = driver.run(OPTICAL_DUMP)?.text;
            Ok((status, optics))
        })
    }

    /// Validated free-form read. Rejections never open a connection.
    pub fn execute_free_form(&self, command: &str) -> Result<String, Error> {
        let command = validate_free_form(command)?;
        self.read(&command)
    }

    /// Run a named operation. Its script is validated before connecting.
    pub fn execute(&self, command: &DeviceCommand) -> Result<String, Error> {
        let script = command.script()?;
        if command.is_write() {
            info!(operation = %command.label(), "running device operation");
        }
        self.with_session(|driver| driver.run_script(&script))
    }
}
