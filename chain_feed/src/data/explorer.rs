//! Etherscan-style explorer fetcher (Etherscan, BscScan): reqwest → ChainData.
//!
//! Every call is an action-keyed GET returning `{status, message, result}` or,
//! for the `proxy` module, a bare JSON-RPC envelope. Blocks are fetched in
//! parallel and buffered; nothing is published until the batch is sorted.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::task::JoinSet;
use url::Url;

use crate::data::model::{
    format_native, parse_hex_u128, parse_hex_u64, wei_to_native, Block, Change, ChainData,
    ChainId, NetworkStats, Transaction, MAX_BLOCKS, MAX_TRANSACTIONS,
};
use crate::data::{average_block_time, estimate_tps, percent_change, ChainFetcher};
use crate::error::FetchError;

/// Chain-specific knobs for an Etherscan-compatible API.
#[derive(Clone, Debug)]
pub struct ExplorerProfile {
    pub chain: ChainId,
    pub base_url: Url,
    pub api_key: String,
    /// Address whose recent transactions stand in when the newest block has none.
    pub watch_address: String,
    /// `stats` action reporting native supply (`ethsupply`, `bnbsupply`).
    pub supply_action: &'static str,
    pub default_block_time: f64,
    pub contracts: u64,
}

impl ExplorerProfile {
    pub fn etherscan(base_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            chain: ChainId::Ethereum,
            base_url,
            api_key: api_key.into(),
            watch_address: "0xdAC17F958D2ee523a2206206994597C13D831ec7".to_string(),
            supply_action: "ethsupply",
            default_block_time: 12.0,
            contracts: 61_000_000,
        }
    }

    pub fn bscscan(base_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            chain: ChainId::BinanceSmartChain,
            base_url,
            api_key: api_key.into(),
            watch_address: "0x55d398326f99059fF775485246999027B3197955".to_string(),
            supply_action: "bnbsupply",
            default_block_time: 3.0,
            contracts: 7_800_000,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Previous {
    tps: f64,
    nodes: Option<u64>,
    block_time: f64,
}

/// Explorer-backed fetcher for Ethereum-style chains.
pub struct ExplorerFetcher {
    profile: ExplorerProfile,
    client: Client,
    previous: Mutex<Option<Previous>>,
}

impl ExplorerFetcher {
    pub fn new(profile: ExplorerProfile, request_timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            profile,
            client,
            previous: Mutex::new(None),
        })
    }

    fn endpoint(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.profile.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            query.append_pair("apikey", &self.profile.api_key);
        }
        url
    }

    async fn latest_height(&self) -> Result<u64, FetchError> {
        let url = self.endpoint(&[("module", "proxy"), ("action", "eth_blockNumber")]);
        let result = call(&self.client, url).await?;
        result
            .as_str()
            .and_then(parse_hex_u64)
            .ok_or_else(|| FetchError::parse(format!("eth_blockNumber result {result}")))
    }

    /// Fetch the newest blocks concurrently and return them sorted newest first.
    async fn recent_blocks(
        &self,
        latest: u64,
    ) -> Result<Vec<(Block, Vec<Transaction>)>, FetchError> {
        let mut tasks = JoinSet::new();
        for height in (0..MAX_BLOCKS as u64).filter_map(|i| latest.checked_sub(i)) {
            let tag = format!("{height:#x}");
            let url = self.endpoint(&[
                ("module", "proxy"),
                ("action", "eth_getBlockByNumber"),
                ("tag", &tag),
                ("boolean", "true"),
            ]);
            let client = self.client.clone();
            let symbol = self.profile.chain.native_symbol();
            tasks.spawn(async move {
                let raw = call(&client, url).await?;
                Ok::<_, FetchError>(parse_block(&raw, symbol))
            });
        }

        let mut blocks = Vec::with_capacity(MAX_BLOCKS);
        let mut rejected = 0;
        let mut last_err = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(Ok(block))) => blocks.push(block),
                Ok(Ok(Err(err))) => {
                    log::warn!("{}: dropping block: {err}", self.profile.chain);
                    rejected += 1;
                }
                Ok(Err(err)) => last_err = Some(err),
                Err(err) => last_err = Some(FetchError::Network(err.to_string())),
            }
        }

        if blocks.is_empty() {
            // Every block that did arrive was unusable: nothing to render.
            return Err(match last_err {
                Some(err) if rejected == 0 => err,
                _ => FetchError::NoValidBlocks,
            });
        }
        blocks.sort_by(|a, b| b.0.height.cmp(&a.0.height));
        Ok(blocks)
    }

    async fn address_transactions(&self) -> Result<Vec<Transaction>, FetchError> {
        let offset = MAX_TRANSACTIONS.to_string();
        let url = self.endpoint(&[
            ("module", "account"),
            ("action", "txlist"),
            ("address", &self.profile.watch_address),
            ("page", "1"),
            ("offset", &offset),
            ("sort", "desc"),
        ]);
        let result = call(&self.client, url).await?;
        parse_tx_list(&result, self.profile.chain.native_symbol())
    }

    async fn node_count(&self) -> Result<u64, FetchError> {
        let url = self.endpoint(&[("module", "stats"), ("action", "nodecount")]);
        let result = call(&self.client, url).await?;
        field_str(&result, "TotalNodeCount")
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| partial("nodes", "missing TotalNodeCount"))
    }

    async fn gas_price(&self) -> Result<String, FetchError> {
        let url = self.endpoint(&[("module", "gastracker"), ("action", "gasoracle")]);
        let result = call(&self.client, url).await?;
        field_str(&result, "ProposeGasPrice")
            .map(|gwei| format!("{gwei} Gwei"))
            .ok_or_else(|| partial("gas_price", "missing ProposeGasPrice"))
    }

    async fn total_supply(&self) -> Result<String, FetchError> {
        let url = self.endpoint(&[("module", "stats"), ("action", self.profile.supply_action)]);
        let result = call(&self.client, url).await?;
        result
            .as_str()
            .and_then(parse_hex_u128)
            .map(|wei| format_supply(wei_to_native(wei), self.profile.chain.native_symbol()))
            .ok_or_else(|| partial("total_supply", "unparseable supply"))
    }

    /// Turn the block batch plus side metrics into stats. Each metric degrades on its own.
    fn build_stats(
        &self,
        blocks: &[Block],
        nodes: Result<u64, FetchError>,
        gas_price: Result<String, FetchError>,
        total_supply: Result<String, FetchError>,
    ) -> NetworkStats {
        let chain = self.profile.chain;
        let defaults = NetworkStats::placeholder(chain);
        let block_time = average_block_time(blocks).unwrap_or(self.profile.default_block_time);
        let total_txs: u64 = blocks.iter().map(|b| b.tx_count as u64).sum();
        let tps = estimate_tps(total_txs, blocks.len(), block_time);

        let nodes = nodes
            .map_err(|err| log::warn!("{chain}: {err}"))
            .ok();
        let gas_price = gas_price.unwrap_or_else(|err| {
            log::warn!("{chain}: {err}");
            defaults.gas_price.clone()
        });
        let total_supply = total_supply.unwrap_or_else(|err| {
            log::warn!("{chain}: {err}");
            defaults.total_supply.clone()
        });

        let mut previous = self
            .previous
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let last = *previous;
        // A failed node count keeps the last known figure and reports no change.
        let nodes_change = match (last.and_then(|prev| prev.nodes), nodes) {
            (Some(before), Some(now)) => percent_change(before as f64, now as f64),
            _ => 0.0,
        };
        let nodes = nodes.or(last.and_then(|prev| prev.nodes));
        let (tps_change, block_time_change) = match last {
            Some(prev) => (
                percent_change(prev.tps, tps),
                percent_change(prev.block_time, block_time),
            ),
            None => (0.0, 0.0),
        };
        *previous = Some(Previous {
            tps,
            nodes,
            block_time,
        });
        drop(previous);
        let nodes = nodes.unwrap_or(0);

        NetworkStats {
            tps,
            tps_change: Change(tps_change),
            nodes,
            nodes_change: Change(nodes_change),
            block_time_secs: block_time,
            block_time_change: Change(block_time_change),
            contracts: self.profile.contracts,
            contracts_change: Change(0.0),
            gas_price,
            total_supply,
            active_addresses: defaults.active_addresses,
        }
    }
}

#[async_trait]
impl ChainFetcher for ExplorerFetcher {
    fn chain(&self) -> ChainId {
        self.profile.chain
    }

    async fn fetch(&self) -> Result<ChainData, FetchError> {
        let latest = self.latest_height().await?;
        let batch = self.recent_blocks(latest).await?;

        let mut transactions = batch
            .first()
            .map(|(_, txs)| txs.clone())
            .unwrap_or_default();
        if transactions.is_empty() {
            transactions = self.address_transactions().await.unwrap_or_else(|err| {
                log::warn!("{}: txlist unavailable: {err}", self.profile.chain);
                Vec::new()
            });
        }
        let blocks: Vec<Block> = batch.into_iter().map(|(block, _)| block).collect();

        let (nodes, gas_price, total_supply) =
            tokio::join!(self.node_count(), self.gas_price(), self.total_supply());
        let stats = self.build_stats(&blocks, nodes, gas_price, total_supply);

        log::debug!(
            "{}: block {} ({} blocks, {} txs, {:.1} tps)",
            self.profile.chain,
            latest,
            blocks.len(),
            transactions.len(),
            stats.tps
        );
        Ok(ChainData {
            blocks,
            transactions,
            stats,
        })
    }
}

/// GET `url` and unwrap the explorer envelope into its `result`.
async fn call(client: &Client, url: Url) -> Result<Value, FetchError> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(FetchError::Network(format!("HTTP {}", response.status())));
    }
    let body: Value = response.json().await?;
    unwrap_envelope(body)
}

fn unwrap_envelope(mut body: Value) -> Result<Value, FetchError> {
    if body.get("status").and_then(Value::as_str) == Some("0") {
        let message = body.get("message").and_then(Value::as_str).unwrap_or("");
        // txlist reports an empty history as a failure status.
        if message.starts_with("No transactions found") {
            return Ok(Value::Array(Vec::new()));
        }
        let detail = match body.get("result") {
            Some(Value::String(s)) => s.clone(),
            _ => message.to_string(),
        };
        return Err(FetchError::RateLimit(detail));
    }
    if let Some(error) = body.get("error") {
        let detail = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(FetchError::RateLimit(detail));
    }
    match body.get_mut("result").map(Value::take) {
        Some(Value::Null) | None => Err(FetchError::parse("response has no result")),
        Some(result) => Ok(result),
    }
}

fn field_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn partial(metric: &'static str, reason: &str) -> FetchError {
    FetchError::PartialMetric {
        metric,
        reason: reason.to_string(),
    }
}

/// Map a proxy `eth_getBlockByNumber` result. A block without a hash is rejected.
fn parse_block(raw: &Value, symbol: &str) -> Result<(Block, Vec<Transaction>), FetchError> {
    let id = field_str(raw, "hash")
        .filter(|h| !h.is_empty())
        .ok_or_else(|| FetchError::parse("block missing hash"))?;
    let height = field_str(raw, "number")
        .and_then(parse_hex_u64)
        .ok_or_else(|| FetchError::parse(format!("block {id} missing number")))?;
    let timestamp = field_str(raw, "timestamp")
        .and_then(parse_hex_u64)
        .ok_or_else(|| FetchError::parse(format!("block {id} missing timestamp")))?
        as i64;
    let size_bytes = field_str(raw, "size").and_then(parse_hex_u64).unwrap_or(0);
    let producer = field_str(raw, "miner").map(str::to_string);

    let embedded = raw
        .get("transactions")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let transactions = embedded
        .iter()
        .filter(|tx| tx.is_object())
        .filter_map(|tx| parse_embedded_tx(tx, height, timestamp, symbol))
        .take(MAX_TRANSACTIONS)
        .collect();

    let block = Block {
        id: id.to_string(),
        height,
        timestamp,
        tx_count: embedded.len() as u32,
        size_bytes,
        producer,
    };
    Ok((block, transactions))
}

fn parse_embedded_tx(
    raw: &Value,
    height: u64,
    timestamp: i64,
    symbol: &str,
) -> Option<Transaction> {
    let hash = field_str(raw, "hash")?;
    let wei = field_str(raw, "value").and_then(parse_hex_u128).unwrap_or(0);
    Some(Transaction {
        hash: hash.to_string(),
        block_height: height,
        timestamp,
        from: field_str(raw, "from").unwrap_or_default().to_string(),
        to: field_str(raw, "to").unwrap_or("contract creation").to_string(),
        value: format_native(wei_to_native(wei), symbol),
    })
}

/// Map an `account/txlist` result (decimal strings throughout).
fn parse_tx_list(result: &Value, symbol: &str) -> Result<Vec<Transaction>, FetchError> {
    let entries = result
        .as_array()
        .ok_or_else(|| FetchError::parse("txlist result is not an array"))?;
    Ok(entries
        .iter()
        .filter_map(|raw| {
            let hash = field_str(raw, "hash")?;
            let wei: u128 = field_str(raw, "value")?.parse().ok()?;
            let to = match field_str(raw, "to") {
                Some("") | None => "contract creation",
                Some(to) => to,
            };
            Some(Transaction {
                hash: hash.to_string(),
                block_height: field_str(raw, "blockNumber")?.parse().ok()?,
                timestamp: field_str(raw, "timeStamp")?.parse().ok()?,
                from: field_str(raw, "from").unwrap_or_default().to_string(),
                to: to.to_string(),
                value: format_native(wei_to_native(wei), symbol),
            })
        })
        .take(MAX_TRANSACTIONS)
        .collect())
}

fn format_supply(amount: f64, symbol: &str) -> String {
    if amount >= 1e9 {
        format!("{:.2}B {symbol}", amount / 1e9)
    } else if amount >= 1e6 {
        format!("{:.1}M {symbol}", amount / 1e6)
    } else {
        format!("{amount:.0} {symbol}")
    }
}
