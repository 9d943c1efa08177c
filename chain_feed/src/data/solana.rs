//! Solana JSON-RPC fetcher: slot walk-back + performance samples → ChainData.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use crate::data::model::{
    format_native, lamports_to_sol, Block, Change, ChainData, ChainId, NetworkStats, Transaction,
    MAX_BLOCKS, MAX_TRANSACTIONS,
};
use crate::data::{percent_change, ChainFetcher};
use crate::error::FetchError;

const PERFORMANCE_SAMPLES: usize = 10;
const PROGRAM_COUNT: u64 = 9_400;

/// Solana fetcher speaking plain JSON-RPC.
pub struct SolanaFetcher {
    rpc_url: Url,
    client: Client,
}

impl SolanaFetcher {
    pub fn new(rpc_url: Url, request_timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { rpc_url, client })
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, FetchError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(self.rpc_url.clone())
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FetchError::Network(format!("HTTP {}", response.status())));
        }
        let body: Value = response.json().await?;
        rpc_result(body)
    }

    /// Walk back from `tip` over at most `MAX_BLOCKS` slots. Skipped or
    /// unavailable slots are passed over. A transport failure on every slot
    /// fails the batch with that error; otherwise an empty walk has no valid blocks.
    async fn recent_blocks(
        &self,
        tip: u64,
    ) -> Result<Vec<(Block, Vec<Transaction>)>, FetchError> {
        let config = json!({
            "encoding": "json",
            "maxSupportedTransactionVersion": 0,
            "transactionDetails": "full",
            "rewards": true,
        });
        let mut blocks = Vec::with_capacity(MAX_BLOCKS);
        let mut rejected = 0;
        let mut last_err = None;
        for slot in (0..MAX_BLOCKS as u64).filter_map(|i| tip.checked_sub(i)) {
            match self.rpc("getBlock", json!([slot, config])).await {
                Ok(Value::Null) => log::debug!("solana: slot {slot} has no block"),
                Ok(raw) => match parse_block(slot, &raw) {
                    Ok(block) => blocks.push(block),
                    Err(err) => {
                        log::warn!("solana: dropping slot {slot}: {err}");
                        rejected += 1;
                    }
                },
                Err(FetchError::RateLimit(msg)) if is_skipped_slot(&msg) => {
                    log::debug!("solana: slot {slot} skipped");
                }
                Err(err) => {
                    log::warn!("solana: slot {slot} unavailable: {err}");
                    last_err = Some(err);
                }
            }
        }
        if blocks.is_empty() {
            return Err(match last_err {
                Some(err) if rejected == 0 => err,
                _ => FetchError::NoValidBlocks,
            });
        }
        blocks.sort_by(|a, b| b.0.height.cmp(&a.0.height));
        Ok(blocks)
    }

    async fn performance(&self) -> Result<Performance, FetchError> {
        let samples = self
            .rpc("getRecentPerformanceSamples", json!([PERFORMANCE_SAMPLES]))
            .await?;
        parse_performance(&samples)
    }

    async fn node_count(&self) -> Result<u64, FetchError> {
        let accounts = self.rpc("getVoteAccounts", json!([])).await?;
        let count = |key: &str| accounts.get(key).and_then(Value::as_array).map(Vec::len);
        match (count("current"), count("delinquent")) {
            (Some(current), Some(delinquent)) => Ok((current + delinquent) as u64),
            _ => Err(FetchError::PartialMetric {
                metric: "nodes",
                reason: "vote account sets missing".to_string(),
            }),
        }
    }

    async fn total_supply(&self) -> Result<String, FetchError> {
        let supply = self
            .rpc("getSupply", json!([{ "excludeNonCirculatingAccountsList": true }]))
            .await?;
        supply
            .pointer("/value/total")
            .and_then(Value::as_u64)
            .map(|lamports| format!("{:.0}M SOL", lamports_to_sol(lamports) / 1e6))
            .ok_or_else(|| FetchError::PartialMetric {
                metric: "total_supply",
                reason: "missing value.total".to_string(),
            })
    }
}

#[async_trait]
impl ChainFetcher for SolanaFetcher {
    fn chain(&self) -> ChainId {
        ChainId::Solana
    }

    async fn fetch(&self) -> Result<ChainData, FetchError> {
        let tip = self
            .rpc("getSlot", json!([]))
            .await?
            .as_u64()
            .ok_or_else(|| FetchError::parse("getSlot result is not a number"))?;
        let batch = self.recent_blocks(tip).await?;

        let transactions = batch
            .first()
            .map(|(_, txs)| txs.clone())
            .unwrap_or_default();
        let blocks: Vec<Block> = batch.into_iter().map(|(block, _)| block).collect();

        let (performance, nodes, total_supply) =
            tokio::join!(self.performance(), self.node_count(), self.total_supply());

        let defaults = NetworkStats::placeholder(ChainId::Solana);
        let performance = performance.unwrap_or_else(|err| {
            log::warn!("solana: {err}");
            Performance::default()
        });
        let nodes = nodes.unwrap_or_else(|err| {
            log::warn!("solana: {err}");
            0
        });
        let total_supply = total_supply.unwrap_or_else(|err| {
            log::warn!("solana: {err}");
            defaults.total_supply.clone()
        });

        let stats = NetworkStats {
            tps: performance.tps,
            tps_change: Change(performance.tps_change),
            nodes,
            nodes_change: Change(0.0),
            block_time_secs: performance.slot_time,
            block_time_change: Change(0.0),
            contracts: PROGRAM_COUNT,
            contracts_change: Change(0.0),
            gas_price: defaults.gas_price,
            total_supply,
            active_addresses: defaults.active_addresses,
        };

        log::debug!(
            "solana: slot {tip} ({} blocks, {} txs, {:.0} tps)",
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

fn rpc_result(mut body: Value) -> Result<Value, FetchError> {
    if let Some(error) = body.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = error.get("message").and_then(Value::as_str).unwrap_or("");
        return Err(FetchError::RateLimit(format!("{code}: {message}")));
    }
    body.get_mut("result")
        .map(Value::take)
        .ok_or_else(|| FetchError::parse("response has no result"))
}

/// -32004 block not available, -32007 slot skipped, -32009 missing from storage.
fn is_skipped_slot(message: &str) -> bool {
    ["-32004:", "-32007:", "-32009:"]
        .iter()
        .any(|code| message.starts_with(code))
}

fn parse_block(slot: u64, raw: &Value) -> Result<(Block, Vec<Transaction>), FetchError> {
    let id = raw
        .get("blockhash")
        .and_then(Value::as_str)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| FetchError::parse("block missing blockhash"))?;
    let timestamp = raw
        .get("blockTime")
        .and_then(Value::as_i64)
        .ok_or_else(|| FetchError::parse(format!("slot {slot} missing blockTime")))?;
    let entries = raw
        .get("transactions")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let producer = raw
        .get("rewards")
        .and_then(Value::as_array)
        .and_then(|rewards| {
            rewards
                .iter()
                .find(|r| r.get("rewardType").and_then(Value::as_str) == Some("Fee"))
        })
        .and_then(|r| r.get("pubkey"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let transactions = entries
        .iter()
        .filter_map(|entry| parse_transaction(slot, timestamp, entry))
        .take(MAX_TRANSACTIONS)
        .collect();

    let block = Block {
        id: id.to_string(),
        height: slot,
        timestamp,
        tx_count: entries.len() as u32,
        size_bytes: 0,
        producer,
    };
    Ok((block, transactions))
}

/// Fee payer is account 0; the value shown is account 1's balance movement.
fn parse_transaction(slot: u64, timestamp: i64, entry: &Value) -> Option<Transaction> {
    let hash = entry.pointer("/transaction/signatures/0")?.as_str()?;
    let keys = entry.pointer("/transaction/message/accountKeys")?.as_array()?;
    let from = keys.first()?.as_str()?;
    let to = keys.get(1).and_then(Value::as_str).unwrap_or(from);
    let balance = |key: &str| {
        entry
            .pointer(&format!("/meta/{key}/1"))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    };
    let delta = balance("postBalances").abs_diff(balance("preBalances"));
    Some(Transaction {
        hash: hash.to_string(),
        block_height: slot,
        timestamp,
        from: from.to_string(),
        to: to.to_string(),
        value: format_native(lamports_to_sol(delta), "SOL"),
    })
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Performance {
    tps: f64,
    tps_change: f64,
    slot_time: f64,
}

impl Default for Performance {
    fn default() -> Self {
        Self {
            tps: 0.0,
            tps_change: 0.0,
            slot_time: 0.4,
        }
    }
}

/// Rolling average across samples; change compares the newest sample to that average.
fn parse_performance(samples: &Value) -> Result<Performance, FetchError> {
    let samples = samples
        .as_array()
        .ok_or_else(|| FetchError::parse("performance samples not an array"))?;
    let parsed: Vec<(f64, f64, f64)> = samples
        .iter()
        .filter_map(|s| {
            Some((
                s.get("numTransactions")?.as_u64()? as f64,
                s.get("numSlots")?.as_u64()? as f64,
                s.get("samplePeriodSecs")?.as_u64()? as f64,
            ))
        })
        .filter(|&(_, slots, secs)| slots > 0.0 && secs > 0.0)
        .collect();
    let newest = parsed
        .first()
        .ok_or_else(|| FetchError::parse("no usable performance samples"))?;

    let total_txs: f64 = parsed.iter().map(|s| s.0).sum();
    let total_slots: f64 = parsed.iter().map(|s| s.1).sum();
    let total_secs: f64 = parsed.iter().map(|s| s.2).sum();
    let tps = total_txs / total_secs;

    Ok(Performance {
        tps,
        tps_change: percent_change(tps, newest.0 / newest.2),
        slot_time: total_secs / total_slots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_block(hash: Option<&str>) -> Value {
        let mut raw = json!({
            "blockTime": 1_700_000_000,
            "blockHeight": 230_000_000,
            "rewards": [
                { "pubkey": "Leader111", "rewardType": "Fee", "lamports": 5000 }
            ],
            "transactions": [
                {
                    "transaction": {
                        "signatures": ["sig1"],
                        "message": { "accountKeys": ["payer", "receiver", "program"] }
                    },
                    "meta": {
                        "fee": 5000,
                        "preBalances": [10_000_000_000u64, 1_000_000_000u64, 1],
                        "postBalances": [8_999_995_000u64, 2_000_000_000u64, 1]
                    }
                },
                { "transaction": { "signatures": [] } }
            ]
        });
        if let Some(hash) = hash {
            raw["blockhash"] = json!(hash);
        }
        raw
    }

    #[test]
    fn parses_block_and_transfers() {
        let (block, txs) = parse_block(250_000_000, &raw_block(Some("Hash1"))).unwrap();
        assert_eq!(block.height, 250_000_000);
        assert_eq!(block.tx_count, 2);
        assert_eq!(block.producer.as_deref(), Some("Leader111"));
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].from, "payer");
        assert_eq!(txs[0].to, "receiver");
        assert_eq!(txs[0].value, "1.0000 SOL");
    }

    #[test]
    fn block_without_hash_is_rejected() {
        assert!(matches!(parse_block(1, &raw_block(None)), Err(FetchError::Parse(_))));
    }

    #[test]
    fn skipped_slot_codes() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "error": {
            "code": -32007,
            "message": "Slot 250000000 was skipped, or missing due to ledger jump to recent snapshot"
        }});
        match rpc_result(body) {
            Err(FetchError::RateLimit(msg)) => assert!(is_skipped_slot(&msg)),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!is_skipped_slot("-32005: node is behind"));
    }

    #[test]
    fn performance_is_rolling_average() {
        let samples = json!([
            { "numTransactions": 240_000, "numSlots": 150, "samplePeriodSecs": 60 },
            { "numTransactions": 120_000, "numSlots": 150, "samplePeriodSecs": 60 }
        ]);
        let perf = parse_performance(&samples).unwrap();
        assert!((perf.tps - 3_000.0).abs() < 1e-9);
        assert!((perf.slot_time - 0.4).abs() < 1e-9);
        // newest 4000 tps vs 3000 average
        assert!((perf.tps_change - 33.333).abs() < 0.01);
    }

    #[test]
    fn empty_performance_is_parse_error() {
        assert!(parse_performance(&json!([])).is_err());
    }

    mod upstream {
        use mockito::{Matcher, Mock, Server, ServerGuard};

        use super::*;

        fn fetcher(server: &ServerGuard) -> SolanaFetcher {
            SolanaFetcher::new(server.url().parse().unwrap(), Duration::from_secs(5)).unwrap()
        }

        async fn respond(server: &mut ServerGuard, matcher: Matcher, body: Value) -> Mock {
            server
                .mock("POST", "/")
                .match_body(matcher)
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(body.to_string())
                .create_async()
                .await
        }

        fn method(name: &str) -> Matcher {
            Matcher::Regex(format!(r#""method":"{name}""#))
        }

        fn slot(slot: u64) -> Matcher {
            Matcher::AllOf(vec![
                method("getBlock"),
                Matcher::Regex(format!(r#""params":\[{slot},"#)),
            ])
        }

        fn result(value: Value) -> Value {
            json!({"jsonrpc": "2.0", "id": 1, "result": value})
        }

        fn skipped(slot: u64) -> Value {
            json!({"jsonrpc": "2.0", "id": 1, "error": {
                "code": -32007,
                "message": format!("Slot {slot} was skipped, or missing in long-term storage")
            }})
        }

        #[tokio::test]
        async fn walks_past_skipped_and_empty_slots() {
            let mut server = Server::new_async().await;
            let samples = json!([
                { "numTransactions": 240_000, "numSlots": 150, "samplePeriodSecs": 60 },
                { "numTransactions": 120_000, "numSlots": 150, "samplePeriodSecs": 60 }
            ]);
            let _m = vec![
                respond(&mut server, method("getSlot"), result(json!(250))).await,
                respond(&mut server, slot(250), result(raw_block(Some("Hash250")))).await,
                respond(&mut server, slot(249), skipped(249)).await,
                respond(&mut server, slot(248), result(Value::Null)).await,
                respond(&mut server, slot(247), result(raw_block(Some("Hash247")))).await,
                respond(&mut server, slot(246), result(raw_block(Some("Hash246")))).await,
                respond(&mut server, method("getRecentPerformanceSamples"), result(samples)).await,
                respond(
                    &mut server,
                    method("getVoteAccounts"),
                    result(json!({"current": [{}, {}], "delinquent": [{}]})),
                )
                .await,
                respond(
                    &mut server,
                    method("getSupply"),
                    result(json!({"value": {"total": 589_000_000_000_000_000u64}})),
                )
                .await,
            ];

            let data = fetcher(&server).fetch().await.unwrap();

            let heights: Vec<u64> = data.blocks.iter().map(|b| b.height).collect();
            assert_eq!(heights, vec![250, 247, 246]);
            assert_eq!(data.blocks[0].id, "Hash250");
            assert_eq!(data.transactions.len(), 1);
            assert_eq!(data.transactions[0].block_height, 250);
            assert!((data.stats.tps - 3_000.0).abs() < 1e-9);
            assert_eq!(data.stats.nodes, 3);
            assert_eq!(data.stats.total_supply, "589M SOL");
        }

        #[tokio::test]
        async fn every_slot_skipped_means_no_valid_blocks() {
            let mut server = Server::new_async().await;
            let _slot = respond(&mut server, method("getSlot"), result(json!(3))).await;
            let _blocks = respond(&mut server, method("getBlock"), skipped(3)).await;

            let err = fetcher(&server).fetch().await.unwrap_err();

            assert!(matches!(err, FetchError::NoValidBlocks));
        }

        #[tokio::test]
        async fn transport_failure_on_every_slot_keeps_its_error() {
            let mut server = Server::new_async().await;
            let _slot = respond(&mut server, method("getSlot"), result(json!(250))).await;
            let _blocks = server
                .mock("POST", "/")
                .match_body(method("getBlock"))
                .with_status(503)
                .create_async()
                .await;

            let err = fetcher(&server).fetch().await.unwrap_err();

            assert!(matches!(err, FetchError::Network(_)));
            assert!(!err.replaces_cache());
        }
    }
}
