// ── Reactive data store ──
//
// Concurrent entity storage with push-based change notification, behind
// the repository traits the reconciler writes through.

mod collection;
mod data_store;
mod repository;

pub use data_store::DataStore;
pub use repository::{OltRepository, TerminalRepository};
