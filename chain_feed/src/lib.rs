//! Chain feed — live multi-chain explorer data behind one schema.
//!
//! Library root: per-chain adapters, polling, the live clock and the
//! active-chain store.

pub mod adapter;
pub mod clock;
pub mod config;
pub mod data;
pub mod error;
pub mod scheduler;
pub mod store;

pub mod prelude;
pub mod sdk;

pub use adapter::{Adapter, AdapterMode, AdapterState};
pub use data::{ChainData, ChainFetcher, ChainId, Snapshot, SnapshotSource, Tick};
pub use error::FetchError;
pub use sdk::{Aggregator, AggregatorBuilder};
pub use store::{AgedBlock, AgedTransaction, ChainView};
