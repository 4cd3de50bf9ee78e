// ── Reconciliation engine ──
//
// Turns what a device reports into record updates and notifications.
// Devices are polled one after another; a failure is recorded on that
// OLT and the cycle moves on. All state carried between cycles (alert
// suppression, counter snapshots) is owned here and expires.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use strum::Display;
use tracing::{debug, info, trace, warn};

use ponwatch_api::{HealthReading, SelfReportedRow, SlotKey};

use super::backend::DeviceBackend;
use super::cache::ExpiringCache;
use super::fusion::{OpticsReading, overlay_optics, overlay_self_reported, resolve_optics};
use super::transition::{Transition, classify};
use crate::config::{EngineConfig, OltConfig};
use crate::error::CoreError;
use crate::model::{
    HealthMetric, MacAddress, Notification, Olt, OltHealth, OltId, Onu, OnuState,
    SelfReportedOptics, TerminalKey, TerminalRef,
};
use crate::store::{DataStore, OltRepository, TerminalRepository};
use crate::traffic::{HistorySampler, HistorySink};
use crate::worker::WorkerPool;

/// How a poll treats terminals that were not observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PollMode {
    /// Periodic cycle: unseen terminals go offline, keep their optical
    /// readings, and are never deleted.
    Background,
    /// Operator-triggered single-device poll: unseen terminals lose their
    /// optical readings on going offline and are deleted after
    /// `EngineConfig::removal_after_misses` consecutive misses.
    Manual,
}

/// Where a poll's terminal list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataSource {
    Telemetry,
    /// Telemetry was empty; the list was parsed from session dumps.
    Session,
}

/// One terminal as seen this cycle, before it meets its record.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub slot: SlotKey,
    pub mac: Option<MacAddress>,
    pub description: Option<String>,
    pub online: bool,
    pub distance_m: Option<u32>,
    pub optics: Vec<OpticsReading>,
    pub self_reported: Option<SelfReportedOptics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollOutcome {
    pub olt: OltId,
    pub mode: PollMode,
    pub source: DataSource,
    pub observed: usize,
    pub registered: usize,
    pub came_online: usize,
    pub went_offline: usize,
    pub removed: usize,
    pub samples: usize,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceFailure {
    pub olt: OltId,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<PollOutcome>,
    pub failures: Vec<DeviceFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum AlertKey {
    TerminalOffline(TerminalKey),
    Health(OltId, HealthMetric),
}

struct Collected {
    source: DataSource,
    observations: Vec<Observation>,
    health: Option<HealthReading>,
}

#[derive(Default)]
struct Batch {
    registered: Vec<TerminalRef>,
    came_online: Vec<TerminalRef>,
    went_offline: Vec<TerminalRef>,
    removed: Vec<TerminalRef>,
}

impl Batch {
    fn into_notification(mut self, olt: &OltId) -> Option<Notification> {
        if self.registered.is_empty()
            && self.came_online.is_empty()
            && self.went_offline.is_empty()
            && self.removed.is_empty()
        {
            return None;
        }
        for list in [
            &mut self.registered,
            &mut self.came_online,
            &mut self.went_offline,
            &mut self.removed,
        ] {
            list.sort_by(|a, b| a.key.cmp(&b.key));
        }
        Some(Notification::TerminalBatch {
            olt: olt.clone(),
            registered: self.registered,
            came_online: self.came_online,
            went_offline: self.went_offline,
            removed: self.removed,
        })
    }
}

fn terminal_ref(onu: &Onu) -> TerminalRef {
    TerminalRef {
        key: onu.key.clone(),
        mac: onu.mac.clone(),
        description: onu.description.clone(),
        last_rx_power_dbm: onu.olt_optics.rx_power_dbm,
        alert_suppressed: false,
    }
}

// ── Reconciler ───────────────────────────────────────────────────

pub struct Reconciler<B: DeviceBackend, S = DataStore> {
    backend: Arc<B>,
    store: Arc<S>,
    history: Arc<dyn HistorySink>,
    workers: WorkerPool,
    config: EngineConfig,
    olts: IndexMap<OltId, Arc<OltConfig>>,
    alerts: ExpiringCache<AlertKey, DateTime<Utc>>,
    sampler: HistorySampler,
    outbox: Vec<Notification>,
}

impl<B, S> Reconciler<B, S>
where
    B: DeviceBackend,
    S: TerminalRepository + OltRepository + 'static,
{
    pub fn new(
        backend: Arc<B>,
        store: Arc<S>,
        history: Arc<dyn HistorySink>,
        workers: WorkerPool,
        config: EngineConfig,
        olts: impl IntoIterator<Item = Arc<OltConfig>>,
    ) -> Self {
        let olts: IndexMap<OltId, Arc<OltConfig>> =
            olts.into_iter().map(|o| (o.id.clone(), o)).collect();

        for cfg in olts.values() {
            if store.olt(&cfg.id).is_none() {
                let mut record = Olt::new(cfg.id.clone(), cfg.host.clone(), cfg.pon_ports);
                record.model.clone_from(&cfg.model);
                store.upsert_olt(record);
            }
        }

        Self {
            alerts: ExpiringCache::new(config.alert_cooldown),
            sampler: HistorySampler::new(config.counter_ttl),
            backend,
            store,
            history,
            workers,
            config,
            olts,
            outbox: Vec::new(),
        }
    }

    pub fn olt_config(&self, id: &OltId) -> Option<&Arc<OltConfig>> {
        self.olts.get(id)
    }

    pub fn olt_ids(&self) -> impl Iterator<Item = &OltId> {
        self.olts.keys()
    }

    /// Notifications produced since the last call, oldest first.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }

    // ── Cycles ───────────────────────────────────────────────────

    /// Poll every configured OLT in order. Never fails as a whole.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let started_at = Utc::now();
        let ids: Vec<OltId> = self.olts.keys().cloned().collect();
        let mut outcomes = Vec::with_capacity(ids.len());
        let mut failures = Vec::new();

        for id in ids {
            match self.poll_olt(&id, PollMode::Background).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => failures.push(DeviceFailure {
                    olt: id,
                    error: e.to_string(),
                }),
            }
        }

        let evicted = self.alerts.evict_expired();
        let finished_at = Utc::now();
        info!(
            polled = outcomes.len(),
            failed = failures.len(),
            alerts_evicted = evicted,
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "poll cycle complete"
        );

        CycleReport {
            started_at,
            finished_at,
            outcomes,
            failures,
        }
    }

    /// Poll one OLT and reconcile its terminals.
    ///
    /// On failure the OLT is marked offline with the error recorded and
    /// its terminal records are left untouched.
    pub async fn poll_olt(&mut self, id: &OltId, mode: PollMode) -> Result<PollOutcome, CoreError> {
        let olt = self
            .olts
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::OltNotFound {
                identifier: id.to_string(),
            })?;
        debug!(olt = %olt.id, %mode, "polling");

        match self.collect(&olt).await {
            Ok(collected) => {
                let now = Utc::now();
                let mut outcome = self.apply(&olt, collected.observations, mode, now);
                outcome.source = collected.source;
                self.mark_reachable(&olt, collected.health, now);
                outcome.samples = self.record_traffic(&olt).await;
                Ok(outcome)
            }
            Err(e) => {
                self.mark_unreachable(&olt, &e);
                Err(e)
            }
        }
    }

    // ── Collection ───────────────────────────────────────────────

    async fn blocking<T, F>(&self, olt: &Arc<OltConfig>, op: F) -> Result<T, CoreError>
    where
        F: FnOnce(&B, &OltConfig) -> T + Send + 'static,
        T: Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let olt = Arc::clone(olt);
        self.workers.run(move || op(&backend, &olt)).await
    }

    /// Telemetry first, then enrichment. An empty telemetry answer falls
    /// back to parsing session dumps when credentials exist.
    async fn collect(&self, olt: &Arc<OltConfig>) -> Result<Collected, CoreError> {
        let poll = self.blocking(olt, |b, o| b.poll_terminals(o)).await?;
        let health = self.blocking(olt, |b, o| b.poll_health(o)).await?;

        let mut source = DataSource::Telemetry;
        let mut observations: Vec<Observation> =
            poll.terminals.iter().map(Observation::from).collect();

        if observations.is_empty() {
            if olt.ssh.is_some() {
                warn!(olt = %olt.id, "telemetry returned no terminals, falling back to session");
                let parsed = self.blocking(olt, |b, o| b.session_inventory(o)).await??;
                observations = parsed.into_iter().map(Observation::from).collect();
                source = DataSource::Session;
            } else if health.is_none() {
                return Err(CoreError::NoDataSource {
                    olt: olt.id.to_string(),
                });
            } else {
                debug!(olt = %olt.id, "device answered with no registered terminals");
            }
        }

        if olt.ssh.is_some() && !observations.is_empty() {
            match self.blocking(olt, |b, o| b.session_optics(o)).await? {
                Ok(by_mac) => {
                    let mut matched = 0usize;
                    for obs in &mut observations {
                        let row = obs.mac.as_ref().and_then(|m| by_mac.get(m.as_str()));
                        if let Some(row) = row {
                            obs.optics.push(OpticsReading::from(row));
                            matched += 1;
                        }
                    }
                    debug!(olt = %olt.id, rows = by_mac.len(), matched, "session optics attached");
                }
                Err(e) => warn!(olt = %olt.id, error = %e, "session optics unavailable"),
            }
        }

        if olt.self_diag.is_some() && !observations.is_empty() {
            let timeout = self.config.self_diag_timeout;
            match tokio::time::timeout(timeout, self.backend.self_reported(olt)).await {
                Ok(Ok(rows)) => attach_self_reported(&mut observations, &rows),
                Ok(Err(e)) => warn!(olt = %olt.id, error = %e, "self-reported diagnostics unavailable"),
                Err(_) => warn!(
                    olt = %olt.id,
                    timeout_secs = timeout.as_secs(),
                    "self-reported diagnostics timed out"
                ),
            }
        }

        Ok(Collected {
            source,
            observations,
            health,
        })
    }

    // ── Reconciliation ───────────────────────────────────────────

    fn apply(
        &mut self,
        olt: &OltConfig,
        observations: Vec<Observation>,
        mode: PollMode,
        now: DateTime<Utc>,
    ) -> PollOutcome {
        let recorded: HashMap<SlotKey, Onu> = self
            .store
            .terminals_for(&olt.id)
            .into_iter()
            .map(|onu| (onu.key.slot(), onu))
            .collect();
        let observed = observations.len();
        let mut seen: HashSet<SlotKey> = HashSet::with_capacity(observed);
        let mut batch = Batch::default();

        for obs in observations {
            if !seen.insert(obs.slot) {
                trace!(olt = %olt.id, slot = %obs.slot, "duplicate row for slot ignored");
                continue;
            }
            let previous = recorded.get(&obs.slot);
            let state = OnuState::from_online(obs.online);
            let transition = classify(previous.map(|p| p.state), Some(state));

            let mut onu = previous.cloned().unwrap_or_else(|| {
                Onu::new(TerminalKey::from_slot(&olt.id, obs.slot), state, now)
            });
            merge_observation(&mut onu, obs, now);

            match transition {
                Transition::Registered { online } => {
                    debug!(terminal = %onu.key, online, "terminal registered");
                    batch.registered.push(terminal_ref(&onu));
                }
                Transition::CameOnline => batch.came_online.push(terminal_ref(&onu)),
                Transition::WentOffline => {
                    let mut reference = terminal_ref(&onu);
                    if mode == PollMode::Manual {
                        onu.clear_diagnostics();
                    }
                    reference.alert_suppressed =
                        !self.allow_alert(AlertKey::TerminalOffline(onu.key.clone()), now);
                    batch.went_offline.push(reference);
                }
                Transition::Unchanged { .. } | Transition::Vanished { .. } | Transition::Unseen => {}
            }
            self.store.upsert_terminal(onu);
        }

        for (slot, previous) in &recorded {
            if seen.contains(slot) {
                continue;
            }
            let Transition::Vanished { was_online } = classify(Some(previous.state), None) else {
                continue;
            };

            let mut onu = previous.clone();
            onu.state = OnuState::Offline;
            onu.missing_polls = onu.missing_polls.saturating_add(1);
            onu.updated_at = now;
            let mut reference = terminal_ref(&onu);

            if mode == PollMode::Manual {
                if was_online {
                    onu.clear_diagnostics();
                }
                if onu.missing_polls >= self.config.removal_after_misses {
                    info!(terminal = %onu.key, misses = onu.missing_polls, "stale terminal removed");
                    self.store.remove_terminal(&onu.key);
                    batch.removed.push(reference);
                    continue;
                }
            }

            if was_online {
                reference.alert_suppressed =
                    !self.allow_alert(AlertKey::TerminalOffline(onu.key.clone()), now);
                batch.went_offline.push(reference);
            }
            self.store.upsert_terminal(onu);
        }

        let outcome = PollOutcome {
            olt: olt.id.clone(),
            mode,
            source: DataSource::Telemetry,
            observed,
            registered: batch.registered.len(),
            came_online: batch.came_online.len(),
            went_offline: batch.went_offline.len(),
            removed: batch.removed.len(),
            samples: 0,
            finished_at: now,
        };
        if let Some(notification) = batch.into_notification(&olt.id) {
            self.outbox.push(notification);
        }
        outcome
    }

    /// `true` when no alert with this key went out within the cooldown.
    fn allow_alert(&mut self, key: AlertKey, now: DateTime<Utc>) -> bool {
        if let Some(sent) = self.alerts.get(&key) {
            debug!(?key, %sent, "alert suppressed");
            return false;
        }
        self.alerts.insert(key, now);
        true
    }

    fn olt_record(&self, olt: &OltConfig) -> Olt {
        self.store
            .olt(&olt.id)
            .unwrap_or_else(|| Olt::new(olt.id.clone(), olt.host.clone(), olt.pon_ports))
    }

    fn mark_reachable(&mut self, olt: &OltConfig, health: Option<HealthReading>, now: DateTime<Utc>) {
        let mut record = self.olt_record(olt);
        let recovered = !record.online && record.last_error.is_some();

        record.online = true;
        record.last_poll = Some(now);
        record.last_error = None;
        if let Some(reading) = health {
            record.model = olt.model.clone().or_else(|| reading.description.clone());
            let health = OltHealth::from(reading);
            self.check_thresholds(&olt.id, &health, now);
            record.health = Some(health);
        }
        self.store.upsert_olt(record);

        if recovered {
            info!(olt = %olt.id, "OLT reachable again");
            self.outbox.push(Notification::OltRecovered {
                olt: olt.id.clone(),
            });
        }
    }

    fn mark_unreachable(&mut self, olt: &OltConfig, error: &CoreError) {
        let mut record = self.olt_record(olt);
        // A device that fails its very first poll counts as a transition.
        let was_online = record.online || record.last_poll.is_none();

        record.online = false;
        record.last_poll = Some(Utc::now());
        record.last_error = Some(error.to_string());
        self.store.upsert_olt(record);
        warn!(olt = %olt.id, error = %error, "OLT poll failed");

        if was_online {
            self.outbox.push(Notification::OltUnreachable {
                olt: olt.id.clone(),
                error: error.to_string(),
            });
        }
    }

    fn check_thresholds(&mut self, olt: &OltId, health: &OltHealth, now: DateTime<Utc>) {
        let limits = self.config.thresholds.clone();
        let checks = [
            (HealthMetric::Cpu, health.cpu_percent, limits.cpu_percent),
            (HealthMetric::Memory, health.memory_percent, limits.memory_percent),
            (HealthMetric::Temperature, health.temperature_c, limits.temperature_c),
        ];
        for (metric, value, threshold) in checks {
            let Some(value) = value else { continue };
            if value <= threshold {
                continue;
            }
            if self.allow_alert(AlertKey::Health(olt.clone(), metric), now) {
                warn!(olt = %olt, %metric, value, threshold, "health threshold exceeded");
                self.outbox.push(Notification::HealthThreshold {
                    olt: olt.clone(),
                    metric,
                    value,
                    threshold,
                });
            }
        }
    }

    // ── Traffic ──────────────────────────────────────────────────

    async fn record_traffic(&mut self, olt: &Arc<OltConfig>) -> usize {
        let readings = match self.blocking(olt, |b, o| b.poll_traffic(o)).await {
            Ok(readings) => readings,
            Err(e) => {
                warn!(olt = %olt.id, error = %e, "traffic counters unavailable");
                return 0;
            }
        };
        let samples = self.sampler.sample(&olt.id, &readings);
        if !samples.is_empty() {
            self.history.record(&samples);
        }
        samples.len()
    }
}

fn merge_observation(onu: &mut Onu, obs: Observation, now: DateTime<Utc>) {
    if obs.mac.is_some() {
        onu.mac = obs.mac;
    }
    if obs.description.is_some() {
        onu.description = obs.description;
    }
    if obs.distance_m.is_some() {
        onu.distance_m = obs.distance_m;
    }
    overlay_optics(&mut onu.olt_optics, resolve_optics(&obs.optics));
    if let Some(reported) = obs.self_reported {
        overlay_self_reported(&mut onu.self_reported, reported);
    }

    onu.state = OnuState::from_online(obs.online);
    onu.missing_polls = 0;
    if obs.online {
        onu.last_seen = Some(now);
    }
    onu.updated_at = now;
}

fn attach_self_reported(observations: &mut [Observation], rows: &[SelfReportedRow]) {
    let by_mac: HashMap<MacAddress, &SelfReportedRow> = rows
        .iter()
        .map(|row| (MacAddress::new(&row.mac), row))
        .collect();
    for obs in observations {
        let row = obs.mac.as_ref().and_then(|m| by_mac.get(m));
        if let Some(row) = row {
            obs.self_reported = Some(SelfReportedOptics::from(*row));
        }
    }
}
