// ── Live traffic feed ──
//
// One polling task per OLT with at least one viewer. The first viewer
// starts it, the last one to leave cancels it. Each tick reads counters,
// smooths rates and broadcasts a `LiveUpdate`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use ponwatch_api::{CounterReading, SlotKey};

use super::rate::{decay, ema, rate_kbps};
use crate::config::{LiveOptions, OltConfig};
use crate::engine::{DeviceBackend, ExpiringCache};
use crate::model::{CounterSnapshot, LiveRate, LiveUpdate, MacAddress, OltId};
use crate::worker::WorkerPool;

const LIVE_CHANNEL_SIZE: usize = 16;

// ── Rate tracker ─────────────────────────────────────────────────

struct Tracked {
    slot: SlotKey,
    snapshot: CounterSnapshot,
    /// Set once a valid interval has produced a smoothed rate.
    seeded: bool,
}

/// Smoothed per-terminal rates for one OLT's live feed. Owns its own
/// counter snapshots, separate from the history sampler's.
pub struct LiveRateTracker {
    options: LiveOptions,
    counters: ExpiringCache<MacAddress, Tracked>,
}

impl LiveRateTracker {
    pub fn new(options: LiveOptions, counter_ttl: Duration) -> Self {
        Self {
            options,
            counters: ExpiringCache::new(counter_ttl),
        }
    }

    fn gap_is_valid(&self, prev: &CounterSnapshot, reading: &CounterReading) -> bool {
        let gap = reading.captured_at - prev.captured_at;
        gap > chrono::Duration::zero()
            && gap.to_std().is_ok_and(|g| g <= self.options.max_gap)
    }

    /// Fold one tick of readings in. Terminals tracked earlier but missing
    /// from this tick decay toward zero.
    pub fn update(&mut self, readings: &[CounterReading]) -> Vec<LiveRate> {
        let mut rates = Vec::with_capacity(readings.len());
        let mut present = HashSet::with_capacity(readings.len());

        for reading in readings {
            let mac = MacAddress::new(&reading.mac);
            if !present.insert(mac.clone()) {
                debug!(%mac, slot = %reading.slot, "hardware address repeated in one tick, skipped");
                continue;
            }

            let mut snapshot =
                CounterSnapshot::new(reading.rx_bytes, reading.tx_bytes, reading.captured_at);
            let mut seeded = false;
            let mut instant = (None, None);

            if let Some(prev) = self.counters.get(&mac) {
                let then = prev.snapshot.captured_at;
                let measured = if self.gap_is_valid(&prev.snapshot, reading) {
                    rate_kbps(prev.snapshot.rx_bytes, then, reading.rx_bytes, reading.captured_at)
                        .zip(rate_kbps(
                            prev.snapshot.tx_bytes,
                            then,
                            reading.tx_bytes,
                            reading.captured_at,
                        ))
                } else {
                    None
                };

                match measured {
                    Some((rx, tx)) => {
                        instant = (Some(rx), Some(tx));
                        if prev.seeded {
                            snapshot.rx_smoothed_kbps =
                                ema(prev.snapshot.rx_smoothed_kbps, rx, self.options.alpha);
                            snapshot.tx_smoothed_kbps =
                                ema(prev.snapshot.tx_smoothed_kbps, tx, self.options.alpha);
                        } else {
                            snapshot.rx_smoothed_kbps = rx;
                            snapshot.tx_smoothed_kbps = tx;
                        }
                        seeded = true;
                    }
                    None => {
                        snapshot.rx_smoothed_kbps =
                            decay(prev.snapshot.rx_smoothed_kbps, self.options.decay);
                        snapshot.tx_smoothed_kbps =
                            decay(prev.snapshot.tx_smoothed_kbps, self.options.decay);
                        seeded = prev.seeded;
                    }
                }
            }

            rates.push(LiveRate {
                mac: mac.clone(),
                slot: reading.slot,
                rx_kbps: snapshot.rx_smoothed_kbps,
                tx_kbps: snapshot.tx_smoothed_kbps,
                instant_rx_kbps: instant.0,
                instant_tx_kbps: instant.1,
                captured_at: reading.captured_at,
            });
            self.counters.insert(
                mac,
                Tracked {
                    slot: reading.slot,
                    snapshot,
                    seeded,
                },
            );
        }

        // Absent this tick: fade, keep the counters for the next valid gap.
        let now = Utc::now();
        let factor = self.options.decay;
        let absent: Vec<MacAddress> = self
            .counters
            .iter()
            .filter(|(mac, _)| !present.contains(*mac))
            .map(|(mac, _)| mac.clone())
            .collect();
        for mac in absent {
            if let Some(tracked) = self.counters.get_mut(&mac) {
                tracked.snapshot.rx_smoothed_kbps = decay(tracked.snapshot.rx_smoothed_kbps, factor);
                tracked.snapshot.tx_smoothed_kbps = decay(tracked.snapshot.tx_smoothed_kbps, factor);
                rates.push(LiveRate {
                    mac: mac.clone(),
                    slot: tracked.slot,
                    rx_kbps: tracked.snapshot.rx_smoothed_kbps,
                    tx_kbps: tracked.snapshot.tx_smoothed_kbps,
                    instant_rx_kbps: None,
                    instant_tx_kbps: None,
                    captured_at: now,
                });
            }
        }

        self.counters.evict_expired();
        rates.sort_by_key(|r| r.slot);
        rates
    }
}

// ── Feed hub ─────────────────────────────────────────────────────

struct Feed {
    viewers: usize,
    tx: broadcast::Sender<Arc<LiveUpdate>>,
    cancel: CancellationToken,
}

/// Reference-counted per-OLT live feeds.
pub struct LiveFeedHub<B: DeviceBackend> {
    backend: Arc<B>,
    workers: WorkerPool,
    options: LiveOptions,
    counter_ttl: Duration,
    feeds: DashMap<OltId, Feed>,
}

impl<B: DeviceBackend> LiveFeedHub<B> {
    pub fn new(
        backend: Arc<B>,
        workers: WorkerPool,
        options: LiveOptions,
        counter_ttl: Duration,
    ) -> Self {
        Self {
            backend,
            workers,
            options,
            counter_ttl,
            feeds: DashMap::new(),
        }
    }

    /// Join the feed for `olt`, starting its task if this is the first viewer.
    pub fn subscribe(self: &Arc<Self>, olt: Arc<OltConfig>) -> LiveSubscription<B> {
        let id = olt.id.clone();
        let rx = match self.feeds.entry(id.clone()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().viewers += 1;
                entry.get().tx.subscribe()
            }
            Entry::Vacant(entry) => {
                let (tx, rx) = broadcast::channel(LIVE_CHANNEL_SIZE);
                let cancel = CancellationToken::new();
                tokio::spawn(feed_task(
                    Arc::clone(&self.backend),
                    self.workers.clone(),
                    olt,
                    self.options.clone(),
                    self.counter_ttl,
                    tx.clone(),
                    cancel.clone(),
                ));
                entry.insert(Feed {
                    viewers: 1,
                    tx,
                    cancel,
                });
                debug!(olt = %id, "live feed started");
                rx
            }
        };

        LiveSubscription {
            hub: Arc::clone(self),
            olt: id,
            rx,
        }
    }

    /// Viewers currently attached to `olt`.
    pub fn viewers(&self, olt: &OltId) -> usize {
        self.feeds.get(olt).map_or(0, |f| f.viewers)
    }

    /// OLTs with a running feed.
    pub fn active(&self) -> usize {
        self.feeds.len()
    }

    fn release(&self, olt: &OltId) {
        if let Entry::Occupied(mut entry) = self.feeds.entry(olt.clone()) {
            let feed = entry.get_mut();
            feed.viewers = feed.viewers.saturating_sub(1);
            if feed.viewers == 0 {
                feed.cancel.cancel();
                entry.remove();
                debug!(olt = %olt, "live feed stopped");
            }
        }
    }

    /// Cancel every feed regardless of viewers.
    pub fn shutdown(&self) {
        for feed in self.feeds.iter() {
            feed.cancel.cancel();
        }
        self.feeds.clear();
    }
}

/// A viewer's handle on one OLT's feed. Dropping it leaves the feed.
pub struct LiveSubscription<B: DeviceBackend> {
    hub: Arc<LiveFeedHub<B>>,
    olt: OltId,
    rx: broadcast::Receiver<Arc<LiveUpdate>>,
}

impl<B: DeviceBackend> LiveSubscription<B> {
    pub fn olt(&self) -> &OltId {
        &self.olt
    }

    /// Next update. Lagging viewers skip ahead. `None` once the feed ended.
    pub async fn recv(&mut self) -> Option<Arc<LiveUpdate>> {
        loop {
            match self.rx.recv().await {
                Ok(update) => return Some(update),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(olt = %self.olt, skipped, "live viewer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl<B: DeviceBackend> Drop for LiveSubscription<B> {
    fn drop(&mut self) {
        self.hub.release(&self.olt);
    }
}

async fn feed_task<B: DeviceBackend>(
    backend: Arc<B>,
    workers: WorkerPool,
    olt: Arc<OltConfig>,
    options: LiveOptions,
    counter_ttl: Duration,
    tx: broadcast::Sender<Arc<LiveUpdate>>,
    cancel: CancellationToken,
) {
    let mut tracker = LiveRateTracker::new(options.clone(), counter_ttl);
    let mut interval = tokio::time::interval(options.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let job = {
                    let backend = Arc::clone(&backend);
                    let olt = Arc::clone(&olt);
                    workers.run(move || backend.poll_traffic(&olt))
                };
                let readings = match tokio::time::timeout(options.timeout, job).await {
                    Ok(Ok(readings)) => readings,
                    Ok(Err(e)) => {
                        warn!(olt = %olt.id, error = %e, "live counter read failed");
                        Vec::new()
                    }
                    Err(_) => {
                        warn!(olt = %olt.id, timeout_secs = options.timeout.as_secs(), "live counter read timed out");
                        Vec::new()
                    }
                };
                let rates = tracker.update(&readings);
                let _ = tx.send(Arc::new(LiveUpdate {
                    olt: olt.id.clone(),
                    rates,
                    captured_at: Utc::now(),
                }));
            }
        }
    }
}
