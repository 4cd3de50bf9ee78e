// ── Traffic accounting ──
//
// Rate math, history sampling and the live feed. The history sampler
// and each live feed own separate counter snapshots.

pub mod history;
pub mod live;
pub mod rate;

pub use history::{HistorySampler, HistorySink, MemoryHistory};
pub use live::{LiveFeedHub, LiveRateTracker, LiveSubscription};
