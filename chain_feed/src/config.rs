//! Env parsing, per-chain settings, and constants.

use std::collections::BTreeMap;
use std::time::Duration;

use url::Url;

use crate::adapter::AdapterMode;
use crate::data::ChainId;
use crate::error::ConfigError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(300);

const DEFAULT_ETHERSCAN_URL: &str = "https://api.etherscan.io/api";
const DEFAULT_BSCSCAN_URL: &str = "https://api.bscscan.com/api";
const DEFAULT_SOLANA_RPC: &str = "https://api.mainnet-beta.solana.com";

/// How one chain should be followed.
#[derive(Clone, Debug, PartialEq)]
pub struct ChainSettings {
    pub mode: AdapterMode,
    pub endpoint: Option<Url>,
    pub api_key: Option<String>,
    /// Explorer chains only: address whose history backs an empty newest block.
    pub watch_address: Option<String>,
}

impl ChainSettings {
    pub fn mock() -> Self {
        Self {
            mode: AdapterMode::Mock,
            endpoint: None,
            api_key: None,
            watch_address: None,
        }
    }

    pub fn live(endpoint: Url) -> Self {
        Self {
            mode: AdapterMode::Live,
            endpoint: Some(endpoint),
            api_key: None,
            watch_address: None,
        }
    }
}

/// Everything the aggregator needs to start.
#[derive(Clone, Debug)]
pub struct FeedConfig {
    pub poll_interval: Duration,
    pub tick_interval: Duration,
    pub request_timeout: Duration,
    pub max_backoff: Option<Duration>,
    pub active: ChainId,
    pub chains: BTreeMap<ChainId, ChainSettings>,
}

impl Default for FeedConfig {
    /// Every chain in mock mode: works offline, no keys needed.
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            tick_interval: DEFAULT_TICK_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_backoff: None,
            active: ChainId::Ethereum,
            chains: ChainId::ALL
                .into_iter()
                .map(|chain| (chain, ChainSettings::mock()))
                .collect(),
        }
    }
}

impl FeedConfig {
    pub fn settings(&self, chain: ChainId) -> ChainSettings {
        self.chains
            .get(&chain)
            .cloned()
            .unwrap_or_else(ChainSettings::mock)
    }

    /// Read configuration from the environment. Invalid values are reported
    /// and replaced by defaults; a live chain missing its credentials or
    /// endpoint is demoted to mock mode.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_u64("POLL_INTERVAL_SECS") {
            config.poll_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = env_u64("REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs.max(1));
        }
        if env_flag("POLL_BACKOFF") {
            config.max_backoff = Some(DEFAULT_MAX_BACKOFF);
        }
        if let Ok(raw) = std::env::var("ACTIVE_CHAIN") {
            match raw.parse() {
                Ok(chain) => config.active = chain,
                Err(err) => log::warn!("ACTIVE_CHAIN: {err}"),
            }
        }

        for chain in ChainId::ALL {
            let settings = chain_settings(chain);
            config.chains.insert(chain, settings);
        }
        config
    }
}

fn chain_settings(chain: ChainId) -> ChainSettings {
    let requested = requested_mode(chain);
    let settings = match chain {
        ChainId::Ethereum => explorer_settings(
            "ETHERSCAN_URL",
            DEFAULT_ETHERSCAN_URL,
            "ETHERSCAN_API_KEY",
            "ETH_WATCH_ADDRESS",
        ),
        ChainId::BinanceSmartChain => explorer_settings(
            "BSCSCAN_URL",
            DEFAULT_BSCSCAN_URL,
            "BSCSCAN_API_KEY",
            "BSC_WATCH_ADDRESS",
        ),
        ChainId::Solana => endpoint_or_default("SOLANA_RPC_URL", DEFAULT_SOLANA_RPC)
            .map(ChainSettings::live)
            .map_err(|err| err.to_string()),
        ChainId::WorldChain => match std::env::var("WORLDCHAIN_RPC_URL") {
            Ok(raw) => parse_url("WORLDCHAIN_RPC_URL", &raw)
                .map(ChainSettings::live)
                .map_err(|err| err.to_string()),
            Err(_) => Err("WORLDCHAIN_RPC_URL not set".to_string()),
        },
        // No live integration exists for these; mock is their only mode.
        ChainId::Polkadot | ChainId::Cardano => {
            if requested == Some(AdapterMode::Live) {
                log::warn!("{chain}: no live data source available, using mock mode");
            }
            return ChainSettings::mock();
        }
    };

    match (requested, settings) {
        (Some(AdapterMode::Mock), _) => ChainSettings::mock(),
        (_, Ok(settings)) => settings,
        (_, Err(reason)) => {
            log::warn!("{chain}: {reason}, using mock mode");
            ChainSettings::mock()
        }
    }
}

fn explorer_settings(
    url_var: &'static str,
    default_url: &str,
    key_var: &'static str,
    watch_var: &'static str,
) -> Result<ChainSettings, String> {
    let api_key = std::env::var(key_var).map_err(|_| format!("{key_var} not set"))?;
    let endpoint = endpoint_or_default(url_var, default_url).map_err(|err| err.to_string())?;
    Ok(ChainSettings {
        api_key: Some(api_key),
        watch_address: std::env::var(watch_var).ok(),
        ..ChainSettings::live(endpoint)
    })
}

/// `<CHAIN>_MODE`, e.g. `SOLANA_MODE=mock`.
fn requested_mode(chain: ChainId) -> Option<AdapterMode> {
    let var = format!("{}_MODE", chain.as_str().to_ascii_uppercase());
    let raw = std::env::var(&var).ok()?;
    match raw.parse() {
        Ok(mode) => Some(mode),
        Err(_) => {
            log::warn!("invalid {var} {raw:?}, expected live or mock");
            None
        }
    }
}

fn parse_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse::<Url>()
        .map_err(|source| ConfigError::InvalidUrl { var, source })
}

fn endpoint_or_default(var: &'static str, default: &str) -> Result<Url, ConfigError> {
    if let Ok(raw) = std::env::var(var) {
        match parse_url(var, &raw) {
            Ok(url) => return Ok(url),
            Err(err) => log::warn!("{err}, falling back to {default}"),
        }
    }
    parse_url(var, default)
}

fn env_u64(var: &'static str) -> Option<u64> {
    let raw = std::env::var(var).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("{}", ConfigError::InvalidValue { var, value: raw });
            None
        }
    }
}

fn env_flag(var: &str) -> bool {
    std::env::var(var)
        .map(|raw| matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
