//! SDK entry points: builder and running aggregator handle.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Receiver;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::adapter::{Adapter, AdapterMode};
use crate::clock::{run_ticker, Clock, SystemClock};
use crate::config::FeedConfig;
use crate::data::evm::WorldChainFetcher;
use crate::data::explorer::{ExplorerFetcher, ExplorerProfile};
use crate::data::solana::SolanaFetcher;
use crate::data::{ChainFetcher, ChainId, Snapshot, Tick, TickHub};
use crate::error::FetchError;
use crate::scheduler::{poll_loop, PollSettings};
use crate::store::{ChainView, Store};

/// Floor for the poll and tick periods; a zero period would spin or panic the ticker.
const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Builder for an [`Aggregator`]. Chains without an explicit fetcher are
/// wired from [`FeedConfig`].
pub struct AggregatorBuilder {
    config: FeedConfig,
    fetchers: HashMap<ChainId, Box<dyn ChainFetcher>>,
    modes: HashMap<ChainId, AdapterMode>,
    clock: Arc<dyn Clock>,
}

impl Default for AggregatorBuilder {
    fn default() -> Self {
        Self {
            config: FeedConfig::default(),
            fetchers: HashMap::new(),
            modes: HashMap::new(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl AggregatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit configuration (replaces the default all-mock one).
    pub fn config(mut self, config: FeedConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from environment variables.
    pub fn from_env(self) -> Self {
        self.config(FeedConfig::from_env())
    }

    /// Follow a chain with a custom fetcher, in live mode.
    pub fn add_fetcher(mut self, fetcher: impl ChainFetcher) -> Self {
        let chain = fetcher.chain();
        self.fetchers.insert(chain, Box::new(fetcher));
        self.modes.insert(chain, AdapterMode::Live);
        self
    }

    /// Force a chain's mode regardless of configuration.
    pub fn mode(mut self, chain: ChainId, mode: AdapterMode) -> Self {
        self.modes.insert(chain, mode);
        self
    }

    pub fn active(mut self, chain: ChainId) -> Self {
        self.config.active = chain;
        self
    }

    /// Periods below 10ms are raised to 10ms when the aggregator starts.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Periods below 10ms are raised to 10ms when the aggregator starts.
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval = interval;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Back off exponentially after failures, up to `cap`.
    pub fn backoff(mut self, cap: Duration) -> Self {
        self.config.max_backoff = Some(cap);
        self
    }

    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn adapter(&mut self, chain: ChainId) -> Adapter {
        let settings = self.config.settings(chain);
        let mode = self.modes.get(&chain).copied().unwrap_or(settings.mode);
        if mode == AdapterMode::Mock {
            return Adapter::mock(chain, self.clock.clone());
        }
        // Per-cycle budget: the parallel block batch plus the follow-up metric calls.
        let cycle_timeout = self.config.request_timeout.saturating_mul(3);

        let fetcher = match self.fetchers.remove(&chain) {
            Some(fetcher) => Ok(Some(fetcher)),
            None => live_fetcher(chain, &self.config),
        };
        match fetcher {
            Ok(Some(fetcher)) => Adapter::live(fetcher, self.clock.clone(), cycle_timeout),
            Ok(None) => {
                log::warn!("{chain}: live mode requested without an endpoint, using mock mode");
                Adapter::mock(chain, self.clock.clone())
            }
            Err(err) => {
                log::warn!("{chain}: could not build fetcher ({err}), using mock mode");
                Adapter::mock(chain, self.clock.clone())
            }
        }
    }

    /// Wire one adapter per chain, seed the store with fallbacks and start polling.
    pub fn start(mut self) -> std::io::Result<Aggregator> {
        let adapters: Vec<Adapter> = ChainId::ALL
            .into_iter()
            .map(|chain| self.adapter(chain))
            .collect();
        let modes = adapters.iter().map(|a| (a.chain(), a.mode())).collect();
        let seeds = adapters.iter().map(|adapter| Snapshot {
            loading: adapter.mode() == AdapterMode::Live,
            ..adapter.fallback()
        });
        let store = Arc::new(Store::new(self.config.active, seeds, self.clock.now()));
        let hub = Arc::new(TickHub::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let settings = PollSettings {
            interval: self.config.poll_interval.max(MIN_INTERVAL),
            max_backoff: self.config.max_backoff,
        };
        let tick_interval = self.config.tick_interval.max(MIN_INTERVAL);
        let worker_store = store.clone();
        let worker_hub = hub.clone();
        let clock = self.clock.clone();

        let thread = thread::Builder::new()
            .name("chain-feed".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(err) => {
                        log::error!("failed to build tokio runtime: {err}");
                        worker_store.close();
                        return;
                    }
                };
                rt.block_on(async move {
                    let mut tasks = JoinSet::new();
                    for adapter in adapters {
                        tasks.spawn(poll_loop(
                            adapter,
                            worker_store.clone(),
                            settings,
                            shutdown_rx.clone(),
                        ));
                    }
                    tasks.spawn(run_ticker(
                        worker_store,
                        worker_hub,
                        clock,
                        tick_interval,
                        shutdown_rx,
                    ));
                    while let Some(joined) = tasks.join_next().await {
                        if let Err(err) = joined {
                            log::error!("feed task failed: {err}");
                        }
                    }
                });
            })?;

        log::info!("aggregator started, active chain {}", self.config.active);
        Ok(Aggregator {
            store,
            hub,
            shutdown: shutdown_tx,
            thread: Some(thread),
            modes,
        })
    }
}

/// The real fetcher for a chain's configured upstream, `None` if none is configured.
fn live_fetcher(
    chain: ChainId,
    config: &FeedConfig,
) -> Result<Option<Box<dyn ChainFetcher>>, FetchError> {
    let settings = config.settings(chain);
    let Some(endpoint) = settings.endpoint else {
        return Ok(None);
    };
    let timeout = config.request_timeout;
    let fetcher: Box<dyn ChainFetcher> = match chain {
        ChainId::Ethereum | ChainId::BinanceSmartChain => {
            let api_key = settings.api_key.unwrap_or_default();
            let mut profile = if chain == ChainId::Ethereum {
                ExplorerProfile::etherscan(endpoint, api_key)
            } else {
                ExplorerProfile::bscscan(endpoint, api_key)
            };
            if let Some(address) = settings.watch_address {
                profile.watch_address = address;
            }
            Box::new(ExplorerFetcher::new(profile, timeout)?)
        }
        ChainId::Solana => Box::new(SolanaFetcher::new(endpoint, timeout)?),
        ChainId::WorldChain => Box::new(WorldChainFetcher::new(endpoint, timeout)?),
        ChainId::Polkadot | ChainId::Cardano => return Ok(None),
    };
    Ok(Some(fetcher))
}

/// Handle to a running aggregator. Stops on drop.
pub struct Aggregator {
    store: Arc<Store>,
    hub: Arc<TickHub>,
    shutdown: watch::Sender<bool>,
    thread: Option<JoinHandle<()>>,
    modes: HashMap<ChainId, AdapterMode>,
}

impl Aggregator {
    pub fn builder() -> AggregatorBuilder {
        AggregatorBuilder::new()
    }

    /// Latest view of any chain, active or not.
    pub fn view(&self, chain: ChainId) -> Option<ChainView> {
        self.store.view(chain)
    }

    /// Latest view of the active chain. Always renderable.
    pub fn current_view(&self) -> ChainView {
        self.store.current_view()
    }

    pub fn active(&self) -> ChainId {
        self.store.active()
    }

    /// Returns `false` when `chain` was already active.
    pub fn switch_chain(&self, chain: ChainId) -> bool {
        let switched = self.store.switch_chain(chain);
        if switched {
            log::info!("active chain is now {chain}");
        }
        switched
    }

    pub fn select_contract(&self, index: usize) -> bool {
        self.store.select_contract(index)
    }

    /// One message per second, after ages were recomputed.
    pub fn subscribe_ticks(&self) -> Receiver<Tick> {
        self.hub.subscribe()
    }

    pub fn mode(&self, chain: ChainId) -> Option<AdapterMode> {
        self.modes.get(&chain).copied()
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some() && self.store.is_open()
    }

    /// Cancel every timer and in-flight fetch. Idempotent.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.store.close();
        let _ = self.shutdown.send(true);
        self.hub.close();
        if thread.join().is_err() {
            log::error!("feed thread panicked");
        }
        log::info!("aggregator stopped");
    }
}

impl Drop for Aggregator {
    fn drop(&mut self) {
        self.stop();
    }
}
