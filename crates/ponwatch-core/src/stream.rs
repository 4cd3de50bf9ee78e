// ── Per-OLT terminal watch ──
//
// Narrows the store's terminal snapshots to one OLT and only wakes the
// consumer when that OLT's records actually changed.

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::{OltId, Onu};

type Snapshot = Arc<Vec<Arc<Onu>>>;

/// One OLT's terminals as the reconciler writes them.
pub struct TerminalWatch {
    olt: OltId,
    receiver: watch::Receiver<Snapshot>,
}

impl TerminalWatch {
    pub(crate) fn new(olt: OltId, receiver: watch::Receiver<Snapshot>) -> Self {
        Self { olt, receiver }
    }

    pub fn olt(&self) -> &OltId {
        &self.olt
    }

    /// The OLT's terminals right now, ordered by slot.
    pub fn current(&self) -> Vec<Arc<Onu>> {
        view(&self.olt, &self.receiver.borrow())
    }

    /// Yields the current view first, then one view per store change that
    /// altered this OLT's terminals. Changes to other OLTs are skipped.
    /// Ends when the store is dropped.
    pub fn into_stream(self) -> impl Stream<Item = Vec<Arc<Onu>>> + Send + 'static {
        let Self { olt, receiver } = self;
        let mut last: Option<Vec<Arc<Onu>>> = None;
        WatchStream::new(receiver).filter_map(move |snapshot| {
            let next = view(&olt, &snapshot);
            let fresh = last.as_ref().is_none_or(|prev| *prev != next);
            if fresh {
                last = Some(next.clone());
            }
            std::future::ready(fresh.then_some(next))
        })
    }
}

fn view(olt: &OltId, snapshot: &[Arc<Onu>]) -> Vec<Arc<Onu>> {
    let mut terminals: Vec<Arc<Onu>> = snapshot
        .iter()
        .filter(|t| &t.key.olt == olt)
        .cloned()
        .collect();
    terminals.sort_by(|a, b| a.key.cmp(&b.key));
    terminals
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::model::{OnuState, TerminalKey};
    use crate::store::{DataStore, TerminalRepository};

    fn onu(olt: &str, port: u16, id: u16, state: OnuState) -> Onu {
        Onu::new(TerminalKey::new(OltId::from(olt), port, id), state, Utc::now())
    }

    #[test]
    fn current_is_scoped_and_ordered() {
        let store = DataStore::new();
        store.upsert_terminal(onu("east", 2, 1, OnuState::Online));
        store.upsert_terminal(onu("west", 1, 1, OnuState::Online));
        store.upsert_terminal(onu("east", 1, 4, OnuState::Offline));

        let watch = store.watch_terminals(&OltId::from("east"));
        let slots: Vec<String> = watch
            .current()
            .iter()
            .map(|t| t.key.slot().to_string())
            .collect();
        assert_eq!(slots, vec!["1:4", "2:1"]);
    }

    #[tokio::test]
    async fn stream_skips_changes_on_other_olts() {
        let store = DataStore::new();
        let east = onu("east", 1, 1, OnuState::Online);
        store.upsert_terminal(east.clone());

        let mut updates = std::pin::pin!(store.watch_terminals(&OltId::from("east")).into_stream());
        let first = updates.next().await.unwrap();
        assert_eq!(first.len(), 1);

        store.upsert_terminal(onu("west", 1, 1, OnuState::Online));
        let quiet = tokio::time::timeout(Duration::from_millis(50), updates.next()).await;
        assert!(quiet.is_err(), "west change must not wake an east watcher");

        let mut offline = east;
        offline.state = OnuState::Offline;
        store.upsert_terminal(offline);
        let next = updates.next().await.unwrap();
        assert_eq!(next[0].state, OnuState::Offline);
    }
}
