//! Per-chain adapter: wraps a fetcher with mode, caching and the fallback policy.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::data::synthetic;
use crate::data::{ChainData, ChainFetcher, ChainId, Snapshot, SnapshotSource};
use crate::error::{ConfigError, FetchError};

/// Whether an adapter talks to its upstream or serves synthetic data on purpose.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdapterMode {
    Live,
    Mock,
}

impl fmt::Display for AdapterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdapterMode::Live => "live",
            AdapterMode::Mock => "mock",
        })
    }
}

impl FromStr for AdapterMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(AdapterMode::Live),
            "mock" => Ok(AdapterMode::Mock),
            _ => Err(ConfigError::InvalidValue {
                var: "<CHAIN>_MODE",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdapterState {
    Idle,
    Fetching,
    Success,
    Failed,
}

/// One per chain. `fetch` never fails: errors become an `error` string next
/// to the last good data, or next to the fallback dataset.
pub struct Adapter {
    chain: ChainId,
    mode: AdapterMode,
    fetcher: Option<Box<dyn ChainFetcher>>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    last_good: Option<ChainData>,
    state: AdapterState,
    failures: u32,
}

impl Adapter {
    pub fn live(fetcher: Box<dyn ChainFetcher>, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            chain: fetcher.chain(),
            mode: AdapterMode::Live,
            fetcher: Some(fetcher),
            clock,
            timeout,
            last_good: None,
            state: AdapterState::Idle,
            failures: 0,
        }
    }

    pub fn mock(chain: ChainId, clock: Arc<dyn Clock>) -> Self {
        Self {
            chain,
            mode: AdapterMode::Mock,
            fetcher: None,
            clock,
            timeout: Duration::ZERO,
            last_good: None,
            state: AdapterState::Idle,
            failures: 0,
        }
    }

    pub fn chain(&self) -> ChainId {
        self.chain
    }

    pub fn mode(&self) -> AdapterMode {
        self.mode
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    /// Back to `Idle` between cycles.
    pub fn settle(&mut self) {
        self.state = AdapterState::Idle;
    }

    /// The deterministic synthetic snapshot, anchored at the clock's now.
    pub fn fallback(&self) -> Snapshot {
        let source = match self.mode {
            AdapterMode::Live => SnapshotSource::Fallback,
            AdapterMode::Mock => SnapshotSource::Mock,
        };
        let data = synthetic::dataset(self.chain, self.clock.now());
        Snapshot::from_data(self.chain, data, source, None)
    }

    /// Run one fetch cycle and resolve it into a publishable snapshot.
    pub async fn fetch(&mut self) -> Snapshot {
        let Some(fetcher) = self.fetcher.as_ref() else {
            self.state = AdapterState::Success;
            return self.fallback();
        };

        self.state = AdapterState::Fetching;
        let outcome = match tokio::time::timeout(self.timeout, fetcher.fetch()).await {
            Ok(result) => result.and_then(validate),
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(data) => {
                self.state = AdapterState::Success;
                self.failures = 0;
                self.last_good = Some(data.clone());
                Snapshot::from_data(self.chain, data, SnapshotSource::Live, None)
            }
            Err(err) => {
                self.state = AdapterState::Failed;
                self.failures = self.failures.saturating_add(1);
                self.recover(err)
            }
        }
    }

    fn recover(&self, err: FetchError) -> Snapshot {
        let message = err.to_string();
        match &self.last_good {
            Some(data) if !err.replaces_cache() => {
                log::warn!(
                    "{}: {} failure, serving last good data: {message}",
                    self.chain,
                    err.kind()
                );
                Snapshot::from_data(
                    self.chain,
                    data.clone(),
                    SnapshotSource::Cached,
                    Some(message),
                )
            }
            _ => {
                log::warn!(
                    "{}: {} failure, serving fallback dataset: {message}",
                    self.chain,
                    err.kind()
                );
                Snapshot {
                    error: Some(message),
                    ..self.fallback()
                }
            }
        }
    }

    /// Delay before the next cycle. With backoff, each consecutive failure
    /// doubles the interval up to `max_backoff`.
    pub fn next_delay(&self, interval: Duration, max_backoff: Option<Duration>) -> Duration {
        match max_backoff {
            Some(cap) if self.failures > 0 => {
                let factor = 1u32 << self.failures.min(16);
                interval.saturating_mul(factor).min(cap.max(interval))
            }
            _ => interval,
        }
    }
}

/// Shape check: entries without an identifier are dropped; nothing left is malformed.
fn validate(mut data: ChainData) -> Result<ChainData, FetchError> {
    data.blocks.retain(|b| !b.id.is_empty());
    data.transactions.retain(|tx| !tx.hash.is_empty());
    if data.blocks.is_empty() {
        return Err(FetchError::NoValidBlocks);
    }
    Ok(data)
}
