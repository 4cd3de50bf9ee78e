// ── Device access seam ──
//
// Everything the engine asks of a device goes through `DeviceBackend`.
// Telemetry and session calls block and are run on the worker pool; the
// self-reported scrape is async. Tests swap in a scripted backend.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tracing::debug;

use ponwatch_api::parser::{self, OpticalRow, ParsedTerminal};
use ponwatch_api::session::ReadPolicy;
use ponwatch_api::snmp::SnmpOptions;
use ponwatch_api::{
    CounterReading, DeviceCommand, Error, HealthReading, SelfDiagClient, SelfReportedRow,
    SessionOps, SshTarget, TelemetryPoller, TerminalPoll, TransportConfig,
};

use crate::config::{EngineConfig, OltConfig};
use crate::error::CoreError;

pub trait DeviceBackend: Send + Sync + 'static {
    /// Registration, status and optical tables. Empty on any failure.
    fn poll_terminals(&self, olt: &OltConfig) -> TerminalPoll;

    /// Raw per-terminal byte counters. Empty on any failure.
    fn poll_traffic(&self, olt: &OltConfig) -> Vec<CounterReading>;

    fn poll_health(&self, olt: &OltConfig) -> Option<HealthReading>;

    /// Session optical dump keyed by hardware address.
    fn session_optics(&self, olt: &OltConfig) -> Result<HashMap<String, OpticalRow>, Error>;

    /// Terminal inventory parsed from configuration and status dumps.
    fn session_inventory(&self, olt: &OltConfig) -> Result<Vec<ParsedTerminal>, Error>;

    fn execute(&self, olt: &OltConfig, command: &DeviceCommand) -> Result<String, Error>;

    fn self_reported(
        &self,
        olt: &OltConfig,
    ) -> impl Future<Output = Result<Vec<SelfReportedRow>, Error>> + Send;
}

// ── NetworkBackend ───────────────────────────────────────────────

/// Talks to real devices over SNMP, SSH and HTTP.
pub struct NetworkBackend {
    telemetry: TelemetryPoller,
    snmp: SnmpOptions,
    policy: ReadPolicy,
    connect_timeout: Duration,
    self_diag: SelfDiagClient,
}

impl NetworkBackend {
    pub fn new(config: &EngineConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            tls: config.self_diag_tls.clone(),
            timeout: config.self_diag_timeout,
        };
        Ok(Self {
            telemetry: TelemetryPoller::new(config.oids.clone(), config.snmp.clone()),
            snmp: config.snmp.clone(),
            policy: config.read_policy.clone(),
            connect_timeout: config.ssh_connect_timeout,
            self_diag: SelfDiagClient::new(&transport, None, None)?,
        })
    }

    fn poller_for(&self, olt: &OltConfig) -> TelemetryPoller {
        let options = SnmpOptions {
            port: olt.snmp_port,
            ..self.snmp.clone()
        };
        TelemetryPoller::new(self.telemetry.oids().clone(), options)
    }

    fn session(&self, olt: &OltConfig) -> Result<SessionOps<SshTarget>, Error> {
        let creds = olt.ssh.as_ref().ok_or_else(|| Error::Session {
            message: format!("no session credentials configured for {}", olt.id),
        })?;
        let target = SshTarget {
            host: olt.host.clone(),
            port: creds.port,
            username: creds.username.clone(),
            password: creds.password.clone(),
            connect_timeout: self.connect_timeout,
        };
        Ok(SessionOps::new(
            target,
            creds.enable_password.clone(),
            self.policy.clone(),
        ))
    }
}

impl DeviceBackend for NetworkBackend {
    fn poll_terminals(&self, olt: &OltConfig) -> TerminalPoll {
        self.poller_for(olt).poll_terminals(&olt.host, &olt.community)
    }

    fn poll_traffic(&self, olt: &OltConfig) -> Vec<CounterReading> {
        self.poller_for(olt)
            .poll_traffic_counters(&olt.host, &olt.community)
    }

    fn poll_health(&self, olt: &OltConfig) -> Option<HealthReading> {
        self.poller_for(olt).poll_health(&olt.host, &olt.community)
    }

    fn session_optics(&self, olt: &OltConfig) -> Result<HashMap<String, OpticalRow>, Error> {
        let (status, optics) = self.session(olt)?.status_and_optics()?;
        let status = parser::parse_status_table(&status);
        let optics = parser::parse_optical_dump(&optics);
        debug!(olt = %olt.id, status = status.len(), optics = optics.len(), "session optics parsed");
        Ok(parser::optics_by_mac(&optics, &status))
    }

    fn session_inventory(&self, olt: &OltConfig) -> Result<Vec<ParsedTerminal>, Error> {
        let (config, status) = self.session(olt)?.config_and_status()?;
        let config = parser::parse_running_config(&config);
        let status = parser::parse_status_table(&status);
        debug!(olt = %olt.id, configured = config.len(), status = status.len(), "session inventory parsed");
        Ok(parser::join_terminals(&config, &status))
    }

    fn execute(&self, olt: &OltConfig, command: &DeviceCommand) -> Result<String, Error> {
        // Rejections must not depend on credentials being present.
        command.script()?;
        self.session(olt)?.execute(command)
    }

    fn self_reported(
        &self,
        olt: &OltConfig,
    ) -> impl Future<Output = Result<Vec<SelfReportedRow>, Error>> + Send {
        let endpoint = olt.self_diag.clone();
        let client = self.self_diag.clone();
        async move {
            let Some(endpoint) = endpoint else {
                return Ok(Vec::new());
            };
            let client = match endpoint.username {
                Some(user) => client.with_credentials(user, endpoint.password),
                None => client,
            };
            client.fetch(&endpoint.url).await
        }
    }
}
