// Engine tests against a scripted in-process backend.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{Duration as ChronoDuration, Utc};
use secrecy::SecretString;

use ponwatch_api::parser::{OpticalRow, ParsedTerminal};
use ponwatch_api::{
    CounterReading, DeviceCommand, Error, HealthReading, SelfReportedRow, SlotKey, TerminalPoll,
    TerminalRow,
};
use ponwatch_core::{
    CoreError, DataSource, DataStore, DeviceBackend, EngineConfig, EntityKind, MemoryHistory,
    Notification, OltConfig, OltId, OltRepository, OnuState, OpticsSource, PollMode, Poller,
    Reconciler, SelfDiagEndpoint, SshCredentials, TerminalKey, TerminalRepository, WorkerPool,
};

// ── Helpers ─────────────────────────────────────────────────────────

#[derive(Default, Clone)]
struct Script {
    terminals: Vec<TerminalRow>,
    health: Option<HealthReading>,
    counters: Vec<CounterReading>,
    inventory: Vec<ParsedTerminal>,
    optics: HashMap<String, OpticalRow>,
    self_reported: Vec<SelfReportedRow>,
    session_down: bool,
}

#[derive(Default)]
struct ScriptedBackend {
    scripts: Mutex<HashMap<String, Script>>,
    executed: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn script(&self, olt: &str, script: Script) {
        self.scripts.lock().unwrap().insert(olt.to_owned(), script);
    }

    fn current(&self, olt: &OltConfig) -> Script {
        self.scripts
            .lock()
            .unwrap()
            .get(olt.id.as_str())
            .cloned()
            .unwrap_or_default()
    }
}

impl DeviceBackend for ScriptedBackend {
    fn poll_terminals(&self, olt: &OltConfig) -> TerminalPoll {
        let terminals = self.current(olt).terminals;
        let status = terminals
            .iter()
            .filter_map(|t| t.online.map(|o| (t.slot, o)))
            .collect();
        TerminalPoll { terminals, status }
    }

    fn poll_traffic(&self, olt: &OltConfig) -> Vec<CounterReading> {
        self.current(olt).counters
    }

    fn poll_health(&self, olt: &OltConfig) -> Option<HealthReading> {
        self.current(olt).health
    }

    fn session_optics(&self, olt: &OltConfig) -> Result<HashMap<String, OpticalRow>, Error> {
        let script = self.current(olt);
        if script.session_down {
            return Err(Error::Session {
                message: "connection refused".into(),
            });
        }
        Ok(script.optics)
    }

    fn session_inventory(&self, olt: &OltConfig) -> Result<Vec<ParsedTerminal>, Error> {
        let script = self.current(olt);
        if script.session_down {
            return Err(Error::Session {
                message: "connection refused".into(),
            });
        }
        Ok(script.inventory)
    }

    fn execute(&self, _olt: &OltConfig, command: &DeviceCommand) -> Result<String, Error> {
        let lines = command.script()?;
        self.executed.lock().unwrap().push(command.label());
        Ok(lines.join("\n"))
    }

    fn self_reported(
        &self,
        olt: &OltConfig,
    ) -> impl Future<Output = Result<Vec<SelfReportedRow>, Error>> + Send {
        std::future::ready(Ok(self.current(olt).self_reported))
    }
}

const MAC_A: &str = "aa:bb:cc:dd:ee:01";
const MAC_B: &str = "aa:bb:cc:dd:ee:02";

fn row(port: u16, onu: u16, mac: &str, online: bool, rx: Option<f64>) -> TerminalRow {
    TerminalRow {
        slot: SlotKey::new(port, onu),
        mac: Some(mac.to_owned()),
        online: Some(online),
        description: Some(format!("customer {port}-{onu}")),
        distance_m: Some(1200),
        rx_power_dbm: rx,
    }
}

fn health() -> Option<HealthReading> {
    Some(HealthReading {
        description: Some("EPON OLT V1.2".into()),
        uptime_secs: Some(86_400),
        cpu_percent: Some(12.0),
        memory_percent: Some(40.0),
        temperature_c: Some(45.0),
    })
}

fn olt(id: &str) -> OltConfig {
    OltConfig::new(id, "192.0.2.10", SecretString::from("public".to_owned()))
}

fn olt_with_ssh(id: &str) -> OltConfig {
    let mut cfg = olt(id);
    cfg.ssh = Some(SshCredentials {
        port: 22,
        username: "admin".into(),
        password: SecretString::from("admin".to_owned()),
        enable_password: None,
    });
    cfg
}

struct Harness {
    backend: Arc<ScriptedBackend>,
    store: Arc<DataStore>,
    history: Arc<MemoryHistory>,
    engine: Reconciler<ScriptedBackend>,
}

fn harness(olts: Vec<OltConfig>) -> Harness {
    let backend = Arc::new(ScriptedBackend::default());
    let store = Arc::new(DataStore::new());
    let history = Arc::new(MemoryHistory::new(16));
    let engine = Reconciler::new(
        Arc::clone(&backend),
        Arc::clone(&store),
        Arc::clone(&history) as Arc<dyn ponwatch_core::HistorySink>,
        WorkerPool::new(2),
        EngineConfig::default(),
        olts.into_iter().map(Arc::new),
    );
    Harness {
        backend,
        store,
        history,
        engine,
    }
}

fn key(olt: &str, port: u16, onu: u16) -> TerminalKey {
    TerminalKey::new(OltId::from(olt), port, onu)
}

fn batches(notifications: &[Notification]) -> Vec<&Notification> {
    notifications
        .iter()
        .filter(|n| matches!(n, Notification::TerminalBatch { .. }))
        .collect()
}

// ── Registration and transitions ────────────────────────────────────

#[tokio::test]
async fn test_first_sighting_is_registration_not_online_event() {
    let mut h = harness(vec![olt("east")]);
    h.backend.script(
        "east",
        Script {
            terminals: vec![row(1, 1, MAC_A, true, Some(-20.5))],
            health: health(),
            ..Script::default()
        },
    );

    let outcome = h.engine.poll_olt(&OltId::from("east"), PollMode::Background).await.unwrap();
    assert_eq!(outcome.registered, 1);
    assert_eq!(outcome.came_online, 0);
    assert_eq!(outcome.source, DataSource::Telemetry);

    let notifications = h.engine.take_notifications();
    let Notification::TerminalBatch {
        registered,
        came_online,
        ..
    } = batches(&notifications)[0]
    else {
        panic!("expected a terminal batch");
    };
    assert_eq!(registered.len(), 1);
    assert!(came_online.is_empty());

    let onu = h.store.terminal(&key("east", 1, 1)).unwrap();
    assert_eq!(onu.state, OnuState::Online);
    assert_eq!(onu.olt_optics.rx_power_dbm, Some(-20.5));
    assert_eq!(onu.olt_optics.rx_source, Some(OpticsSource::Telemetry));
    assert!(onu.last_seen.is_some());
}

#[tokio::test]
async fn test_duplicate_mac_keeps_distinct_records() {
    let mut h = harness(vec![olt("east")]);
    h.backend.script(
        "east",
        Script {
            terminals: vec![
                row(1, 1, MAC_A, true, None),
                row(3, 7, MAC_A, false, None),
            ],
            health: health(),
            ..Script::default()
        },
    );

    h.engine.poll_olt(&OltId::from("east"), PollMode::Background).await.unwrap();

    let records = h.store.terminals_for(&OltId::from("east"));
    assert_eq!(records.len(), 2);
    assert!(h.store.terminal(&key("east", 1, 1)).unwrap().is_online());
    assert!(!h.store.terminal(&key("east", 3, 7)).unwrap().is_online());
}

#[tokio::test]
async fn test_background_miss_retains_optics() {
    let mut h = harness(vec![olt("east")]);
    let id = OltId::from("east");
    h.backend.script(
        "east",
        Script {
            terminals: vec![row(1, 1, MAC_A, true, Some(-22.0)), row(1, 2, MAC_B, true, None)],
            health: health(),
            ..Script::default()
        },
    );
    h.engine.poll_olt(&id, PollMode::Background).await.unwrap();
    h.engine.take_notifications();

    h.backend.script(
        "east",
        Script {
            terminals: vec![row(1, 2, MAC_B, true, None)],
            health: health(),
            ..Script::default()
        },
    );
    for _ in 0..4 {
        h.engine.poll_olt(&id, PollMode::Background).await.unwrap();
    }

    let onu = h.store.terminal(&key("east", 1, 1)).unwrap();
    assert_eq!(onu.state, OnuState::Offline);
    assert_eq!(onu.olt_optics.rx_power_dbm, Some(-22.0));
    assert_eq!(onu.missing_polls, 4);

    let notifications = h.engine.take_notifications();
    let offline: Vec<_> = notifications
        .iter()
        .filter_map(|n| match n {
            Notification::TerminalBatch { went_offline, .. } => Some(went_offline),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(offline.len(), 1, "only the online->offline edge reports");
    assert_eq!(offline[0].last_rx_power_dbm, Some(-22.0));
}

#[tokio::test]
async fn test_manual_poll_clears_optics_and_removes_after_three_misses() {
    let mut h = harness(vec![olt("east")]);
    let id = OltId::from("east");
    h.backend.script(
        "east",
        Script {
            terminals: vec![row(1, 1, MAC_A, true, Some(-19.0)), row(1, 2, MAC_B, true, None)],
            health: health(),
            ..Script::default()
        },
    );
    h.engine.poll_olt(&id, PollMode::Manual).await.unwrap();

    h.backend.script(
        "east",
        Script {
            terminals: vec![row(1, 2, MAC_B, true, None)],
            health: health(),
            ..Script::default()
        },
    );

    h.engine.poll_olt(&id, PollMode::Manual).await.unwrap();
    let onu = h.store.terminal(&key("east", 1, 1)).unwrap();
    assert_eq!(onu.missing_polls, 1);
    assert!(onu.olt_optics.is_empty());

    h.engine.poll_olt(&id, PollMode::Manual).await.unwrap();
    assert!(h.store.terminal(&key("east", 1, 1)).is_some());

    let outcome = h.engine.poll_olt(&id, PollMode::Manual).await.unwrap();
    assert_eq!(outcome.removed, 1);
    assert!(h.store.terminal(&key("east", 1, 1)).is_none());
    assert!(h.store.terminal(&key("east", 1, 2)).is_some());
}

#[tokio::test]
async fn test_flapping_terminal_reports_every_offline_transition() {
    let mut h = harness(vec![olt("east")]);
    let id = OltId::from("east");
    let online = Script {
        terminals: vec![row(1, 1, MAC_A, true, None)],
        health: health(),
        ..Script::default()
    };
    let offline = Script {
        terminals: vec![row(1, 1, MAC_A, false, None)],
        health: health(),
        ..Script::default()
    };

    h.backend.script("east", online.clone());
    h.engine.poll_olt(&id, PollMode::Background).await.unwrap();
    h.engine.take_notifications();

    h.backend.script("east", offline.clone());
    let first = h.engine.poll_olt(&id, PollMode::Background).await.unwrap();
    h.backend.script("east", online);
    let back = h.engine.poll_olt(&id, PollMode::Background).await.unwrap();
    h.backend.script("east", offline);
    let second = h.engine.poll_olt(&id, PollMode::Background).await.unwrap();

    assert_eq!(first.went_offline, 1);
    assert_eq!(back.came_online, 1);
    assert_eq!(second.went_offline, 1);

    let notifications = h.engine.take_notifications();
    let offline: Vec<_> = notifications
        .iter()
        .filter_map(|n| match n {
            Notification::TerminalBatch { went_offline, .. } => Some(went_offline),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(offline.len(), 2);
    assert!(offline.iter().all(|t| t.key == key("east", 1, 1)));
    assert!(!offline[0].alert_suppressed);
    assert!(offline[1].alert_suppressed, "repeat within cooldown is flagged");
    assert!(!h.store.terminal(&key("east", 1, 1)).unwrap().is_online());
}

// ── Data sources ────────────────────────────────────────────────────

#[tokio::test]
async fn test_session_optics_outrank_telemetry() {
    let mut h = harness(vec![olt_with_ssh("east")]);
    h.backend.script(
        "east",
        Script {
            terminals: vec![row(1, 1, MAC_A, true, Some(-25.0))],
            health: health(),
            optics: HashMap::from([(
                MAC_A.to_owned(),
                OpticalRow {
                    slot: SlotKey::new(1, 1),
                    temperature_c: Some(41.0),
                    voltage_v: Some(3.3),
                    bias_ma: Some(12.0),
                    tx_power_dbm: Some(2.1),
                    rx_power_dbm: Some(-21.0),
                },
            )]),
            ..Script::default()
        },
    );

    h.engine.poll_olt(&OltId::from("east"), PollMode::Background).await.unwrap();

    let onu = h.store.terminal(&key("east", 1, 1)).unwrap();
    assert_eq!(onu.olt_optics.rx_power_dbm, Some(-21.0));
    assert_eq!(onu.olt_optics.rx_source, Some(OpticsSource::SessionDump));
    assert_eq!(onu.olt_optics.tx_power_dbm, Some(2.1));
    assert_eq!(onu.olt_optics.temperature_c, Some(41.0));
}

#[tokio::test]
async fn test_session_optics_failure_keeps_telemetry_values() {
    let mut h = harness(vec![olt_with_ssh("east")]);
    h.backend.script(
        "east",
        Script {
            terminals: vec![row(1, 1, MAC_A, true, Some(-25.0))],
            health: health(),
            session_down: true,
            ..Script::default()
        },
    );

    h.engine.poll_olt(&OltId::from("east"), PollMode::Background).await.unwrap();

    let onu = h.store.terminal(&key("east", 1, 1)).unwrap();
    assert_eq!(onu.olt_optics.rx_power_dbm, Some(-25.0));
}

#[tokio::test]
async fn test_empty_telemetry_falls_back_to_session() {
    let mut h = harness(vec![olt_with_ssh("east")]);
    h.backend.script(
        "east",
        Script {
            inventory: vec![ParsedTerminal {
                slot: SlotKey::new(2, 5),
                mac: Some(MAC_B.to_owned()),
                description: Some("bakery".into()),
                online: true,
                distance_m: Some(640),
            }],
            ..Script::default()
        },
    );

    let outcome = h.engine.poll_olt(&OltId::from("east"), PollMode::Background).await.unwrap();
    assert_eq!(outcome.source, DataSource::Session);
    assert_eq!(outcome.observed, 1);

    let onu = h.store.terminal(&key("east", 2, 5)).unwrap();
    assert_eq!(onu.description.as_deref(), Some("bakery"));
    assert_eq!(onu.mac.as_ref().map(|m| m.as_str()), Some(MAC_B));
}

#[tokio::test]
async fn test_self_reported_values_kept_apart_from_olt_optics() {
    let mut cfg = olt("east");
    cfg.self_diag = Some(SelfDiagEndpoint {
        url: "http://192.0.2.10/onu_diag.html".parse().unwrap(),
        username: None,
        password: None,
    });
    let mut h = harness(vec![cfg]);
    h.backend.script(
        "east",
        Script {
            terminals: vec![row(1, 1, MAC_A, true, Some(-24.0))],
            health: health(),
            self_reported: vec![SelfReportedRow {
                mac: "AA:BB:CC:DD:EE:01".into(),
                model: Some("HG8010H".into()),
                rx_power_dbm: Some(-23.1),
                tx_power_dbm: Some(2.0),
                temperature_c: None,
                voltage_v: None,
                bias_ma: None,
            }],
            ..Script::default()
        },
    );

    h.engine.poll_olt(&OltId::from("east"), PollMode::Background).await.unwrap();

    let onu = h.store.terminal(&key("east", 1, 1)).unwrap();
    assert_eq!(onu.olt_optics.rx_power_dbm, Some(-24.0));
    assert_eq!(onu.self_reported.rx_power_dbm, Some(-23.1));
    assert_eq!(onu.self_reported.model.as_deref(), Some("HG8010H"));
}

// ── Device status ───────────────────────────────────────────────────

#[tokio::test]
async fn test_device_failure_does_not_abort_cycle() {
    let mut h = harness(vec![olt("dead"), olt("east")]);
    h.backend.script(
        "east",
        Script {
            terminals: vec![row(1, 1, MAC_A, true, None)],
            health: health(),
            ..Script::default()
        },
    );
    h.engine.poll_olt(&OltId::from("east"), PollMode::Background).await.unwrap();
    let before = h.store.terminal(&key("east", 1, 1)).unwrap();

    let report = h.engine.run_cycle().await;
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].olt, OltId::from("dead"));
    assert_eq!(report.outcomes.len(), 1);

    let dead = h.store.olt(&OltId::from("dead")).unwrap();
    assert!(!dead.online);
    assert!(dead.last_error.is_some());

    let east = h.store.olt(&OltId::from("east")).unwrap();
    assert!(east.online);
    assert_eq!(east.model.as_deref(), Some("EPON OLT V1.2"));
    assert!(east.health.is_some());
    assert_eq!(h.store.terminal(&key("east", 1, 1)).unwrap().created_at, before.created_at);

    let notifications = h.engine.take_notifications();
    assert!(notifications.iter().any(|n| matches!(
        n,
        Notification::OltUnreachable { olt, .. } if olt.as_str() == "dead"
    )));
}

#[tokio::test]
async fn test_unreachable_then_recovered() {
    let mut h = harness(vec![olt("east")]);
    let id = OltId::from("east");

    assert!(matches!(
        h.engine.poll_olt(&id, PollMode::Background).await,
        Err(CoreError::NoDataSource { .. })
    ));
    // Second failure is not a new transition.
    let _ = h.engine.poll_olt(&id, PollMode::Background).await;
    h.backend.script(
        "east",
        Script {
            health: health(),
            ..Script::default()
        },
    );
    h.engine.poll_olt(&id, PollMode::Background).await.unwrap();

    let notifications = h.engine.take_notifications();
    let unreachable = notifications
        .iter()
        .filter(|n| matches!(n, Notification::OltUnreachable { .. }))
        .count();
    assert_eq!(unreachable, 1);
    assert!(matches!(notifications.last(), Some(Notification::OltRecovered { .. })));
    assert!(h.store.olt(&id).unwrap().last_error.is_none());
}

#[tokio::test]
async fn test_health_threshold_fires_once() {
    let mut h = harness(vec![olt("east")]);
    let id = OltId::from("east");
    let mut hot = health();
    if let Some(reading) = hot.as_mut() {
        reading.temperature_c = Some(78.0);
    }
    h.backend.script(
        "east",
        Script {
            terminals: vec![row(1, 1, MAC_A, true, None)],
            health: hot,
            ..Script::default()
        },
    );

    h.engine.poll_olt(&id, PollMode::Background).await.unwrap();
    h.engine.poll_olt(&id, PollMode::Background).await.unwrap();

    let fired: Vec<_> = h
        .engine
        .take_notifications()
        .into_iter()
        .filter(|n| matches!(n, Notification::HealthThreshold { .. }))
        .collect();
    assert_eq!(fired.len(), 1);
}

// ── Traffic ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_history_samples_after_second_reading() {
    let mut h = harness(vec![olt("east")]);
    let id = OltId::from("east");
    let start = Utc::now();
    let counters = |rx: u64, offset: i64| {
        vec![CounterReading {
            slot: SlotKey::new(1, 1),
            mac: MAC_A.to_owned(),
            rx_bytes: rx,
            tx_bytes: 0,
            captured_at: start + ChronoDuration::seconds(offset),
        }]
    };

    h.backend.script(
        "east",
        Script {
            terminals: vec![row(1, 1, MAC_A, true, None)],
            health: health(),
            counters: counters(1000, 0),
            ..Script::default()
        },
    );
    let first = h.engine.poll_olt(&id, PollMode::Background).await.unwrap();
    assert_eq!(first.samples, 0);

    h.backend.script(
        "east",
        Script {
            terminals: vec![row(1, 1, MAC_A, true, None)],
            health: health(),
            counters: counters(9000, 10),
            ..Script::default()
        },
    );
    let second = h.engine.poll_olt(&id, PollMode::Background).await.unwrap();
    assert_eq!(second.samples, 3);

    let series = h.history.series(&id, EntityKind::Terminal, MAC_A);
    assert_eq!(series.len(), 1);
    assert!((series[0].rx_kbps - 6.4).abs() < 1e-9);
}

// ── Poller facade ───────────────────────────────────────────────────

#[tokio::test]
async fn test_poller_rejects_free_form_before_connecting() {
    let backend = ScriptedBackend::default();
    let poller = Poller::with_backend(EngineConfig::default(), vec![olt_with_ssh("east")], backend);

    let err = poller
        .execute(&OltId::from("east"), DeviceCommand::FreeForm("erase startup-config".into()))
        .await
        .unwrap_err();
    assert!(err.is_rejection(), "{err}");
}

#[tokio::test]
async fn test_poller_requires_ssh_for_commands() {
    let poller = Poller::with_backend(
        EngineConfig::default(),
        vec![olt("east")],
        ScriptedBackend::default(),
    );

    let err = poller
        .execute(
            &OltId::from("east"),
            DeviceCommand::Reboot {
                slot: SlotKey::new(1, 1),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Unsupported { .. }));
}

#[tokio::test]
async fn test_poller_broadcasts_cycle_notifications() {
    let backend = ScriptedBackend::default();
    backend.script(
        "east",
        Script {
            terminals: vec![row(1, 1, MAC_A, true, None)],
            health: health(),
            ..Script::default()
        },
    );
    let poller = Poller::with_backend(EngineConfig::default(), vec![olt("east")], backend);
    let mut rx = poller.notifications();

    let report = poller.poll_now().await;
    assert!(report.failures.is_empty());
    assert!(poller.store().last_cycle().is_some());

    let notification = rx.recv().await.unwrap();
    assert!(matches!(*notification, Notification::TerminalBatch { .. }));
}
