// ── Poller facade ──
//
// Owns the engine for a set of OLTs: the periodic background cycle,
// operator-triggered polls, device commands and live feeds. Consumers
// read results from the `DataStore`, the history sink and the
// notification broadcast.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ponwatch_api::DeviceCommand;

use crate::config::{EngineConfig, OltConfig};
use crate::engine::{CycleReport, DeviceBackend, NetworkBackend, PollMode, PollOutcome, Reconciler};
use crate::error::CoreError;
use crate::model::{Notification, OltId};
use crate::store::DataStore;
use crate::traffic::{HistorySink, LiveFeedHub, LiveSubscription, MemoryHistory};
use crate::worker::WorkerPool;

const NOTIFICATION_CHANNEL_SIZE: usize = 256;

/// Lifecycle of the background cycle, observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Stopped,
    Idle,
    Polling,
}

// ── Poller ───────────────────────────────────────────────────────

/// Cheaply cloneable via `Arc<PollerInner>`.
pub struct Poller<B: DeviceBackend = NetworkBackend> {
    inner: Arc<PollerInner<B>>,
}

impl<B: DeviceBackend> Clone for Poller<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct PollerInner<B: DeviceBackend> {
    config: EngineConfig,
    olts: IndexMap<OltId, Arc<OltConfig>>,
    backend: Arc<B>,
    workers: WorkerPool,
    store: Arc<DataStore>,
    history: Arc<MemoryHistory>,
    /// Serializes cycles: a manual poll waits for a running cycle.
    reconciler: Mutex<Reconciler<B>>,
    live: Arc<LiveFeedHub<B>>,
    notify_tx: broadcast::Sender<Arc<Notification>>,
    state: watch::Sender<PollerState>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Poller<NetworkBackend> {
    /// Poller over the real device transports.
    pub fn new(config: EngineConfig, olts: Vec<OltConfig>) -> Result<Self, CoreError> {
        let backend = NetworkBackend::new(&config)?;
        Ok(Self::with_backend(config, olts, backend))
    }
}

impl<B: DeviceBackend> Poller<B> {
    /// Does NOT start the background cycle -- call [`start()`](Self::start).
    pub fn with_backend(config: EngineConfig, olts: Vec<OltConfig>, backend: B) -> Self {
        let backend = Arc::new(backend);
        let workers = WorkerPool::new(config.workers);
        let store = Arc::new(DataStore::new());
        let history = Arc::new(MemoryHistory::new(config.history_capacity));
        let olts: IndexMap<OltId, Arc<OltConfig>> = olts
            .into_iter()
            .map(|o| (o.id.clone(), Arc::new(o)))
            .collect();

        let reconciler = Reconciler::new(
            Arc::clone(&backend),
            Arc::clone(&store),
            Arc::clone(&history) as Arc<dyn HistorySink>,
            workers.clone(),
            config.clone(),
            olts.values().cloned(),
        );
        let live = Arc::new(LiveFeedHub::new(
            Arc::clone(&backend),
            workers.clone(),
            config.live.clone(),
            config.counter_ttl,
        ));
        let (notify_tx, _) = broadcast::channel(NOTIFICATION_CHANNEL_SIZE);
        let (state, _) = watch::channel(PollerState::Stopped);

        Self {
            inner: Arc::new(PollerInner {
                config,
                olts,
                backend,
                workers,
                store,
                history,
                reconciler: Mutex::new(reconciler),
                live,
                notify_tx,
                state,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    pub fn history(&self) -> &Arc<MemoryHistory> {
        &self.inner.history
    }

    /// Configured OLTs in configuration order.
    pub fn olts(&self) -> impl Iterator<Item = &Arc<OltConfig>> {
        self.inner.olts.values()
    }

    pub fn olt(&self, id: &OltId) -> Result<&Arc<OltConfig>, CoreError> {
        self.inner
            .olts
            .get(id)
            .ok_or_else(|| CoreError::OltNotFound {
                identifier: id.to_string(),
            })
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the background cycle. The first cycle runs one interval
    /// from now; call [`poll_now()`](Self::poll_now) for an immediate one.
    pub async fn start(&self) {
        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            debug!("background cycle already running");
            return;
        }
        let _ = self.inner.state.send(PollerState::Idle);
        handles.push(tokio::spawn(cycle_task(
            self.clone(),
            self.inner.cancel.clone(),
        )));
        info!(
            olts = self.inner.olts.len(),
            interval_secs = self.inner.config.poll_interval.as_secs(),
            "background polling started"
        );
    }

    /// Cancel background work and wait for it to finish. Live feeds end.
    pub async fn stop(&self) {
        self.inner.cancel.cancel();
        self.inner.live.shutdown();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        let _ = self.inner.state.send(PollerState::Stopped);
        debug!("poller stopped");
    }

    // ── Polling ──────────────────────────────────────────────────

    /// Run one full cycle over every OLT now.
    pub async fn poll_now(&self) -> CycleReport {
        let mut reconciler = self.inner.reconciler.lock().await;
        let previous = *self.inner.state.borrow();
        let _ = self.inner.state.send(PollerState::Polling);

        let report = reconciler.run_cycle().await;
        self.inner.store.mark_cycle(report.finished_at);
        self.publish(reconciler.take_notifications());

        let _ = self.inner.state.send(if previous == PollerState::Stopped {
            PollerState::Stopped
        } else {
            PollerState::Idle
        });
        report
    }

    /// Poll a single OLT. Manual polls prune terminals that stay missing.
    pub async fn poll_olt(&self, id: &OltId, mode: PollMode) -> Result<PollOutcome, CoreError> {
        let mut reconciler = self.inner.reconciler.lock().await;
        let result = reconciler.poll_olt(id, mode).await;
        self.publish(reconciler.take_notifications());
        result
    }

    fn publish(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            debug!(olt = %notification.olt(), "notification");
            // Err only means nobody is subscribed.
            let _ = self.inner.notify_tx.send(Arc::new(notification));
        }
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Run a command on an OLT over its own short-lived session.
    ///
    /// Free-form text is validated before any connection is opened.
    pub async fn execute(&self, id: &OltId, command: DeviceCommand) -> Result<String, CoreError> {
        let olt = Arc::clone(self.olt(id)?);
        command.script()?;
        if olt.ssh.is_none() {
            return Err(CoreError::Unsupported {
                operation: command.label(),
                required: format!("SSH credentials for OLT '{id}'"),
            });
        }

        info!(olt = %id, command = %command.label(), "executing device command");
        let backend = Arc::clone(&self.inner.backend);
        let output = self
            .inner
            .workers
            .run(move || backend.execute(&olt, &command))
            .await??;
        Ok(output)
    }

    // ── Observation ──────────────────────────────────────────────

    /// Join the live rate feed for one OLT. The feed stops once every
    /// subscription is dropped.
    pub fn live(&self, id: &OltId) -> Result<LiveSubscription<B>, CoreError> {
        let olt = Arc::clone(self.olt(id)?);
        Ok(self.inner.live.subscribe(olt))
    }

    pub fn live_viewers(&self, id: &OltId) -> usize {
        self.inner.live.viewers(id)
    }

    pub fn notifications(&self) -> broadcast::Receiver<Arc<Notification>> {
        self.inner.notify_tx.subscribe()
    }

    pub fn state(&self) -> watch::Receiver<PollerState> {
        self.inner.state.subscribe()
    }
}

async fn cycle_task<B: DeviceBackend>(poller: Poller<B>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(poller.inner.config.poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let report = poller.poll_now().await;
                if !report.failures.is_empty() {
                    warn!(failed = report.failures.len(), "cycle finished with unreachable OLTs");
                }
            }
        }
    }
}
