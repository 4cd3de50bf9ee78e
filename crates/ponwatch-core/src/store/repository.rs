// ── Persistence seams ──
//
// The reconciler only ever talks to these traits. `DataStore` is the
// in-memory implementation; a database-backed one plugs in the same way.
// Every method is a single atomic per-record operation.

use crate::model::{Olt, OltId, Onu, TerminalKey};

pub trait TerminalRepository: Send + Sync {
    /// All terminals recorded for one OLT.
    fn terminals_for(&self, olt: &OltId) -> Vec<Onu>;

    fn terminal(&self, key: &TerminalKey) -> Option<Onu>;

    /// Create or replace a record. Returns `true` when it was created.
    fn upsert_terminal(&self, onu: Onu) -> bool;

    fn remove_terminal(&self, key: &TerminalKey) -> Option<Onu>;
}

pub trait OltRepository: Send + Sync {
    fn olt(&self, id: &OltId) -> Option<Olt>;

    fn upsert_olt(&self, olt: Olt);

    fn olts(&self) -> Vec<Olt>;
}
