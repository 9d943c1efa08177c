// Chain-agnostic blocks, transactions and stats.
// Upstream-specific shapes stay in the fetchers; conversion happens there.

use std::fmt;
use std::str::FromStr;

use alloy_chains::NamedChain;
use serde::{Deserialize, Serialize};

/// Newest blocks kept per chain.
pub const MAX_BLOCKS: usize = 5;
/// Newest transactions kept per chain.
pub const MAX_TRANSACTIONS: usize = 10;

/// The networks the feed knows how to follow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainId {
    Ethereum,
    #[serde(rename = "bsc")]
    BinanceSmartChain,
    Solana,
    Polkadot,
    Cardano,
    #[serde(rename = "worldchain")]
    WorldChain,
}

impl ChainId {
    pub const ALL: [ChainId; 6] = [
        ChainId::Ethereum,
        ChainId::BinanceSmartChain,
        ChainId::Solana,
        ChainId::Polkadot,
        ChainId::Cardano,
        ChainId::WorldChain,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChainId::Ethereum => "ethereum",
            ChainId::BinanceSmartChain => "bsc",
            ChainId::Solana => "solana",
            ChainId::Polkadot => "polkadot",
            ChainId::Cardano => "cardano",
            ChainId::WorldChain => "worldchain",
        }
    }

    pub fn native_symbol(self) -> &'static str {
        match self {
            ChainId::Ethereum | ChainId::WorldChain => "ETH",
            ChainId::BinanceSmartChain => "BNB",
            ChainId::Solana => "SOL",
            ChainId::Polkadot => "DOT",
            ChainId::Cardano => "ADA",
        }
    }

    /// The alloy chain for EVM networks, `None` elsewhere.
    pub fn evm_chain(self) -> Option<NamedChain> {
        match self {
            ChainId::Ethereum => Some(NamedChain::Mainnet),
            ChainId::BinanceSmartChain => Some(NamedChain::BinanceSmartChain),
            ChainId::WorldChain => Some(NamedChain::World),
            _ => None,
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown chain {0:?}")]
pub struct UnknownChain(pub String);

impl FromStr for ChainId {
    type Err = UnknownChain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ethereum" | "eth" => Ok(ChainId::Ethereum),
            "bsc" | "binance" | "bnb" => Ok(ChainId::BinanceSmartChain),
            "solana" | "sol" => Ok(ChainId::Solana),
            "polkadot" | "dot" => Ok(ChainId::Polkadot),
            "cardano" | "ada" => Ok(ChainId::Cardano),
            "worldchain" | "world" => Ok(ChainId::WorldChain),
            _ => Err(UnknownChain(s.to_string())),
        }
    }
}

/// A block summary. `timestamp` is absolute Unix seconds; ages derive from it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub height: u64,
    pub timestamp: i64,
    pub tx_count: u32,
    pub size_bytes: u64,
    pub producer: Option<String>,
}

/// A transaction with its value already converted to the native unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub block_height: u64,
    pub timestamp: i64,
    pub from: String,
    pub to: String,
    pub value: String,
}

/// Signed percent change, rendered with an explicit sign.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Change(pub f64);

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_change(self.0))
    }
}

/// `5 -> "+5%"`, `-5 -> "-5%"`, `1.24 -> "+1.2%"`, `0 -> "0%"`.
pub fn format_change(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return "0%".to_string();
    }
    let sign = if value > 0.0 { "+" } else { "-" };
    let abs = value.abs();
    if abs.fract() == 0.0 {
        format!("{sign}{abs:.0}%")
    } else {
        format!("{sign}{abs:.1}%")
    }
}

/// Headline figures for a chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub tps: f64,
    pub tps_change: Change,
    pub nodes: u64,
    pub nodes_change: Change,
    pub block_time_secs: f64,
    pub block_time_change: Change,
    pub contracts: u64,
    pub contracts_change: Change,
    pub gas_price: String,
    pub total_supply: String,
    pub active_addresses: String,
}

impl NetworkStats {
    /// Zeroed figures with the chain's placeholder text for extended fields.
    pub fn placeholder(chain: ChainId) -> Self {
        let (gas_price, total_supply, active_addresses) = match chain {
            ChainId::Ethereum => ("25 Gwei", "120.4M ETH", "~500K"),
            ChainId::BinanceSmartChain => ("3 Gwei", "145.9M BNB", "~1.1M"),
            ChainId::Solana => ("0.000005 SOL", "589M SOL", "~2.1M"),
            ChainId::Polkadot => ("0.0156 DOT", "1.49B DOT", "~300K"),
            ChainId::Cardano => ("0.17 ADA", "45B ADA", "~400K"),
            ChainId::WorldChain => ("0.001 Gwei", "N/A", "~700K"),
        };
        Self {
            tps: 0.0,
            tps_change: Change::default(),
            nodes: 0,
            nodes_change: Change::default(),
            block_time_secs: 0.0,
            block_time_change: Change::default(),
            contracts: 0,
            contracts_change: Change::default(),
            gas_price: gas_price.to_string(),
            total_supply: total_supply.to_string(),
            active_addresses: active_addresses.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractMetrics {
    pub deployments: u64,
    pub transactions: u64,
    pub verified: bool,
}

/// Illustrative contract/program entry from the static catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SmartContractSample {
    pub name: String,
    pub description: String,
    pub features: Vec<String>,
    pub metrics: ContractMetrics,
}

/// What one successful live fetch yields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainData {
    pub blocks: Vec<Block>,
    pub transactions: Vec<Transaction>,
    pub stats: NetworkStats,
}

impl ChainData {
    /// Sort blocks newest first and cap both lists.
    pub fn normalize(mut self) -> Self {
        self.blocks.sort_by(|a, b| b.height.cmp(&a.height));
        self.blocks.truncate(MAX_BLOCKS);
        self.transactions.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then(b.block_height.cmp(&a.block_height))
        });
        self.transactions.truncate(MAX_TRANSACTIONS);
        self
    }
}

/// Where a snapshot's data came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Live,
    Cached,
    Fallback,
    Mock,
}

/// One complete fetch-cycle result. Replaces the previous one wholesale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub chain: ChainId,
    pub blocks: Vec<Block>,
    pub transactions: Vec<Transaction>,
    pub stats: NetworkStats,
    pub smart_contracts: Vec<SmartContractSample>,
    pub loading: bool,
    pub error: Option<String>,
    pub source: SnapshotSource,
}

impl Snapshot {
    pub fn from_data(
        chain: ChainId,
        data: ChainData,
        source: SnapshotSource,
        error: Option<String>,
    ) -> Self {
        let data = data.normalize();
        Self {
            chain,
            blocks: data.blocks,
            transactions: data.transactions,
            stats: data.stats,
            smart_contracts: crate::data::catalog::smart_contracts(chain),
            loading: false,
            error,
            source,
        }
    }
}

pub fn wei_to_native(wei: u128) -> f64 {
    wei as f64 / 1e18
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 1e9
}

pub fn format_native(amount: f64, symbol: &str) -> String {
    format!("{amount:.4} {symbol}")
}

/// Parse `0x`-prefixed hex (or plain decimal) into a u64.
pub fn parse_hex_u64(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) if !hex.is_empty() => u64::from_str_radix(hex, 16).ok(),
        Some(_) => None,
        None => raw.parse().ok(),
    }
}

/// Parse `0x`-prefixed hex (or plain decimal) into a u128.
pub fn parse_hex_u128(raw: &str) -> Option<u128> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) if !hex.is_empty() => u128::from_str_radix(hex, 16).ok(),
        Some(_) => None,
        None => raw.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(height: u64) -> Block {
        Block {
            id: format!("0x{height:x}"),
            height,
            timestamp: height as i64,
            tx_count: 0,
            size_bytes: 0,
            producer: None,
        }
    }

    #[test]
    fn change_has_explicit_sign() {
        assert_eq!(Change(-5.0).to_string(), "-5%");
        assert_eq!(Change(5.0).to_string(), "+5%");
        assert_eq!(Change(0.0).to_string(), "0%");
        assert_eq!(format_change(1.24), "+1.2%");
    }

    #[test]
    fn normalize_sorts_descending_and_caps() {
        let data = ChainData {
            blocks: vec![block(3), block(9), block(1), block(7), block(5), block(8)],
            transactions: Vec::new(),
            stats: NetworkStats::placeholder(ChainId::Ethereum),
        }
        .normalize();

        let heights: Vec<u64> = data.blocks.iter().map(|b| b.height).collect();
        assert_eq!(heights, vec![9, 8, 7, 5, 3]);
    }

    #[test]
    fn chain_ids_parse_from_aliases() {
        assert_eq!("SOL".parse::<ChainId>().unwrap(), ChainId::Solana);
        assert_eq!("bsc".parse::<ChainId>().unwrap(), ChainId::BinanceSmartChain);
        assert!("dogecoin".parse::<ChainId>().is_err());
        for chain in ChainId::ALL {
            assert_eq!(chain.as_str().parse::<ChainId>().unwrap(), chain);
        }
    }

    #[test]
    fn hex_parsing() {
        assert_eq!(parse_hex_u64("0x10"), Some(16));
        assert_eq!(parse_hex_u64("42"), Some(42));
        assert_eq!(parse_hex_u64("0x"), None);
        assert_eq!(parse_hex_u128("0xde0b6b3a7640000"), Some(1_000_000_000_000_000_000));
    }

    #[test]
    fn wei_to_native_converts_1_eth() {
        let eth = wei_to_native(1_000_000_000_000_000_000);
        assert!((eth - 1.0).abs() < f64::EPSILON);
    }
}
