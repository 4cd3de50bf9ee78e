// ── Central reactive data store ──
//
// Thread-safe storage for OLT and ONU records. Mutations are broadcast
// to subscribers via `watch` channels.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::collection::EntityCollection;
use super::repository::{OltRepository, TerminalRepository};
use crate::model::{MacAddress, Olt, OltId, Onu, TerminalKey};
use crate::stream::TerminalWatch;

/// In-memory store keyed the way the engine reasons: OLTs by id,
/// terminals by (OLT, port, terminal id).
pub struct DataStore {
    pub(crate) olts: EntityCollection<OltId, Olt>,
    pub(crate) terminals: EntityCollection<TerminalKey, Onu>,
    pub(crate) last_cycle: watch::Sender<Option<DateTime<Utc>>>,
}

impl DataStore {
    pub fn new() -> Self {
        let (last_cycle, _) = watch::channel(None);

        Self {
            olts: EntityCollection::new(),
            terminals: EntityCollection::new(),
            last_cycle,
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn olts_snapshot(&self) -> Arc<Vec<Arc<Olt>>> {
        self.olts.snapshot()
    }

    pub fn terminals_snapshot(&self) -> Arc<Vec<Arc<Onu>>> {
        self.terminals.snapshot()
    }

    // ── Lookups ──────────────────────────────────────────────────────

    /// Every record carrying `mac`. More than one is normal while a
    /// terminal is being moved between slots.
    pub fn terminals_by_mac(&self, mac: &MacAddress) -> Vec<Arc<Onu>> {
        self.terminals
            .snapshot()
            .iter()
            .filter(|t| t.mac.as_ref() == Some(mac))
            .cloned()
            .collect()
    }

    // ── Count accessors ──────────────────────────────────────────────

    pub fn olt_count(&self) -> usize {
        self.olts.len()
    }

    pub fn terminal_count(&self) -> usize {
        self.terminals.len()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Follow one OLT's terminals as cycles write them.
    pub fn watch_terminals(&self, olt: &OltId) -> TerminalWatch {
        TerminalWatch::new(olt.clone(), self.terminals.subscribe())
    }

    // ── Metadata ─────────────────────────────────────────────────────

    pub fn last_cycle(&self) -> Option<DateTime<Utc>> {
        *self.last_cycle.borrow()
    }

    pub(crate) fn mark_cycle(&self, at: DateTime<Utc>) {
        self.last_cycle.send_modify(|t| *t = Some(at));
    }

    /// How long ago the last full cycle finished, or `None` if never.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_cycle().map(|t| Utc::now() - t)
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalRepository for DataStore {
    fn terminals_for(&self, olt: &OltId) -> Vec<Onu> {
        self.terminals
            .filter_keys(|k| &k.olt == olt)
            .iter()
            .map(|t| Onu::clone(t))
            .collect()
    }

    fn terminal(&self, key: &TerminalKey) -> Option<Onu> {
        self.terminals.get(key).map(|t| Onu::clone(&t))
    }

    fn upsert_terminal(&self, onu: Onu) -> bool {
        self.terminals.upsert(onu.key.clone(), onu)
    }

    fn remove_terminal(&self, key: &TerminalKey) -> Option<Onu> {
        self.terminals.remove(key).map(|t| Onu::clone(&t))
    }
}

impl OltRepository for DataStore {
    fn olt(&self, id: &OltId) -> Option<Olt> {
        self.olts.get(id).map(|o| Olt::clone(&o))
    }

    fn upsert_olt(&self, olt: Olt) {
        self.olts.upsert(olt.id.clone(), olt);
    }

    fn olts(&self) -> Vec<Olt> {
        let mut all: Vec<Olt> = self.olts.snapshot().iter().map(|o| Olt::clone(o)).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}
