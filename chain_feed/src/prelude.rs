//! Minimal prelude for SDK consumers.

pub use crate::adapter::AdapterMode;
pub use crate::clock::{age, Clock, ManualClock, SystemClock};
pub use crate::config::FeedConfig;
pub use crate::data::{
    Block, ChainData, ChainFetcher, ChainId, NetworkStats, Snapshot, SnapshotSource, Tick,
    Transaction,
};
pub use crate::error::FetchError;
pub use crate::sdk::{Aggregator, AggregatorBuilder};
pub use crate::store::ChainView;
