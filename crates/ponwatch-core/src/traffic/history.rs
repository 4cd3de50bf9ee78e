// ── Bandwidth history ──
//
// After every successful poll the raw counters are turned into samples
// for each terminal, each PON port and the device as a whole, and handed
// to a `HistorySink`.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, trace};

use ponwatch_api::CounterReading;

use super::rate::rate_kbps;
use crate::engine::ExpiringCache;
use crate::model::{CounterSnapshot, EntityKind, MacAddress, OltId, TrafficSample};

/// Time-series persistence seam.
pub trait HistorySink: Send + Sync {
    fn record(&self, samples: &[TrafficSample]);
}

// ── Sampler ──────────────────────────────────────────────────────

/// Turns consecutive counter readings into rate samples. Owns its own
/// counter snapshots; entries unseen for a TTL are evicted.
pub struct HistorySampler {
    counters: ExpiringCache<(OltId, MacAddress), CounterSnapshot>,
}

impl HistorySampler {
    pub fn new(counter_ttl: Duration) -> Self {
        Self {
            counters: ExpiringCache::new(counter_ttl),
        }
    }

    /// Terminals with a prior snapshot produce a sample; the first reading
    /// of a terminal only seeds it. Port and device aggregates sum the
    /// terminal samples.
    pub fn sample(&mut self, olt: &OltId, readings: &[CounterReading]) -> Vec<TrafficSample> {
        let mut samples = Vec::new();
        let mut ports: BTreeMap<u16, (f64, f64)> = BTreeMap::new();
        let mut total = (0.0, 0.0);
        let mut latest: Option<DateTime<Utc>> = None;
        let mut seen: HashSet<MacAddress> = HashSet::with_capacity(readings.len());

        for reading in readings {
            let mac = MacAddress::new(&reading.mac);
            if !seen.insert(mac.clone()) {
                debug!(olt = %olt, %mac, slot = %reading.slot, "hardware address repeated in one reading set, skipped");
                continue;
            }
            let key = (olt.clone(), mac.clone());

            if let Some(prev) = self.counters.get(&key) {
                let (then, now) = (prev.captured_at, reading.captured_at);
                let rx = rate_kbps(prev.rx_bytes, then, reading.rx_bytes, now);
                let tx = rate_kbps(prev.tx_bytes, then, reading.tx_bytes, now);
                if let (Some(rx_kbps), Some(tx_kbps)) = (rx, tx) {
                    samples.push(TrafficSample {
                        olt: olt.clone(),
                        kind: EntityKind::Terminal,
                        entity: mac.to_string(),
                        rx_kbps,
                        tx_kbps,
                        captured_at: reading.captured_at,
                    });
                    let port = ports.entry(reading.slot.port).or_default();
                    port.0 += rx_kbps;
                    port.1 += tx_kbps;
                    total.0 += rx_kbps;
                    total.1 += tx_kbps;
                    latest = latest.max(Some(reading.captured_at));
                } else {
                    trace!(%mac, "no time elapsed since last reading");
                }
            }

            self.counters.insert(
                key,
                CounterSnapshot::new(reading.rx_bytes, reading.tx_bytes, reading.captured_at),
            );
        }

        let evicted = self.counters.evict_expired();
        if evicted > 0 {
            debug!(olt = %olt, evicted, "stale counter snapshots dropped");
        }

        let Some(captured_at) = latest else {
            return samples;
        };
        for (port, (rx_kbps, tx_kbps)) in ports {
            samples.push(TrafficSample {
                olt: olt.clone(),
                kind: EntityKind::Port,
                entity: port.to_string(),
                rx_kbps,
                tx_kbps,
                captured_at,
            });
        }
        samples.push(TrafficSample {
            olt: olt.clone(),
            kind: EntityKind::Device,
            entity: olt.to_string(),
            rx_kbps: total.0,
            tx_kbps: total.1,
            captured_at,
        });
        samples
    }

    pub fn tracked(&self) -> usize {
        self.counters.len()
    }
}

// ── In-memory sink ───────────────────────────────────────────────

type SeriesKey = (OltId, EntityKind, String);

/// Ring buffer per entity. Reference sink for the daemon and tests.
pub struct MemoryHistory {
    capacity: usize,
    series: DashMap<SeriesKey, VecDeque<TrafficSample>>,
}

impl MemoryHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: DashMap::new(),
        }
    }

    /// Samples for one entity, oldest first.
    pub fn series(&self, olt: &OltId, kind: EntityKind, entity: &str) -> Vec<TrafficSample> {
        self.series
            .get(&(olt.clone(), kind, entity.to_owned()))
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Most recent sample of every entity on one OLT.
    pub fn latest(&self, olt: &OltId) -> Vec<TrafficSample> {
        let mut out: Vec<TrafficSample> = self
            .series
            .iter()
            .filter(|e| &e.key().0 == olt)
            .filter_map(|e| e.value().back().cloned())
            .collect();
        out.sort_by(|a, b| (a.kind, &a.entity).cmp(&(b.kind, &b.entity)));
        out
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }
}

impl HistorySink for MemoryHistory {
    fn record(&self, samples: &[TrafficSample]) {
        for sample in samples {
            let key = (sample.olt.clone(), sample.kind, sample.entity.clone());
            let mut series = self.series.entry(key).or_default();
            if series.len() == self.capacity {
                series.pop_front();
            }
            series.push_back(sample.clone());
        }
    }
}
