//! WorldChain fetcher: alloy provider on the OP-stack network → ChainData.

use std::time::Duration;

use alloy::eips::BlockNumberOrTag;
use alloy::network::TransactionResponse;
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::BlockTransactions;
use alloy::transports::http::Http;
use async_trait::async_trait;
use op_alloy::network::Optimism;
use reqwest::Client;
use url::Url;

use crate::data::model::{
    format_native, wei_to_native, Block, Change, ChainData, ChainId, NetworkStats, Transaction,
    MAX_BLOCKS, MAX_TRANSACTIONS,
};
use crate::data::{average_block_time, estimate_tps, ChainFetcher};
use crate::error::FetchError;

const DEFAULT_BLOCK_TIME: f64 = 2.0;
const CONTRACT_COUNT: u64 = 410_000;

type OpBlock = <Optimism as alloy::network::Network>::BlockResponse;
type OpTransaction = <Optimism as alloy::network::Network>::TransactionResponse;

/// OP-stack fetcher for WorldChain.
pub struct WorldChainFetcher {
    provider: RootProvider<Optimism>,
}

impl WorldChainFetcher {
    /// Every JSON-RPC request is bounded by `request_timeout`.
    pub fn new(rpc_url: Url, request_timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        let rpc = RpcClient::new(Http::with_client(client, rpc_url), false);
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .network::<Optimism>()
            .connect_client(rpc);
        Ok(Self {
            provider: provider.root().clone(),
        })
    }

    async fn block(&self, tag: BlockNumberOrTag) -> Result<OpBlock, FetchError> {
        self.provider
            .get_block_by_number(tag)
            .full()
            .await
            .map_err(|err| FetchError::Network(err.to_string()))?
            .ok_or_else(|| FetchError::parse(format!("block {tag} not found")))
    }

    async fn gas_price(&self) -> Result<String, FetchError> {
        let wei = self
            .provider
            .get_gas_price()
            .await
            .map_err(|err| FetchError::PartialMetric {
                metric: "gas_price",
                reason: err.to_string(),
            })?;
        Ok(format!("{:.4} Gwei", wei as f64 / 1e9))
    }

    /// Warn once per cycle if the endpoint is not actually WorldChain.
    async fn check_chain_id(&self) {
        let Some(expected) = ChainId::WorldChain.evm_chain() else {
            return;
        };
        match self.provider.get_chain_id().await {
            Ok(id) if id != expected as u64 => {
                log::warn!(
                    "worldchain: endpoint reports chain id {id}, expected {}",
                    expected as u64
                );
            }
            Ok(_) => {}
            Err(err) => log::debug!("worldchain: chain id unavailable: {err}"),
        }
    }
}

#[async_trait]
impl ChainFetcher for WorldChainFetcher {
    fn chain(&self) -> ChainId {
        ChainId::WorldChain
    }

    async fn fetch(&self) -> Result<ChainData, FetchError> {
        self.check_chain_id().await;
        let latest = self.block(BlockNumberOrTag::Latest).await?;
        let tip = latest.header.number;

        let mut blocks = Vec::with_capacity(MAX_BLOCKS);
        let mut transactions = Vec::with_capacity(MAX_TRANSACTIONS);
        blocks.push(block_summary(&latest));
        transactions.extend(block_transactions(&latest));

        for n in (1..MAX_BLOCKS as u64).filter_map(|i| tip.checked_sub(i)) {
            match self.block(BlockNumberOrTag::Number(n)).await {
                Ok(block) => {
                    blocks.push(block_summary(&block));
                    if transactions.len() < MAX_TRANSACTIONS {
                        transactions.extend(block_transactions(&block));
                    }
                }
                Err(err) => log::warn!("worldchain: skipping block {n}: {err}"),
            }
        }
        blocks.sort_by(|a, b| b.height.cmp(&a.height));
        transactions.truncate(MAX_TRANSACTIONS);

        let defaults = NetworkStats::placeholder(ChainId::WorldChain);
        let gas_price = self.gas_price().await.unwrap_or_else(|err| {
            log::warn!("worldchain: {err}");
            defaults.gas_price.clone()
        });
        let block_time = average_block_time(&blocks).unwrap_or(DEFAULT_BLOCK_TIME);
        let total_txs: u64 = blocks.iter().map(|b| b.tx_count as u64).sum();

        let stats = NetworkStats {
            tps: estimate_tps(total_txs, blocks.len(), block_time),
            tps_change: Change(0.0),
            nodes: 0,
            nodes_change: Change(0.0),
            block_time_secs: block_time,
            block_time_change: Change(0.0),
            contracts: CONTRACT_COUNT,
            contracts_change: Change(0.0),
            gas_price,
            total_supply: defaults.total_supply,
            active_addresses: defaults.active_addresses,
        };

        log::debug!(
            "worldchain: block {tip} ({} blocks, {} txs)",
            blocks.len(),
            transactions.len()
        );
        Ok(ChainData {
            blocks,
            transactions,
            stats,
        })
    }
}

fn block_summary(block: &OpBlock) -> Block {
    let header = &block.header;
    Block {
        id: header.hash.to_string(),
        height: header.number,
        timestamp: header.timestamp as i64,
        tx_count: block.transactions.len() as u32,
        size_bytes: header.size.map_or(0, |size| size.saturating_to::<u64>()),
        producer: Some(header.beneficiary.to_string()),
    }
}

fn block_transactions(block: &OpBlock) -> Vec<Transaction> {
    let header = &block.header;
    match &block.transactions {
        BlockTransactions::Full(txs) => txs
            .iter()
            .take(MAX_TRANSACTIONS)
            .map(|tx| tx_summary(header.number, header.timestamp as i64, tx))
            .collect(),
        _ => Vec::new(),
    }
}

fn tx_summary(height: u64, timestamp: i64, tx: &OpTransaction) -> Transaction {
    use alloy::consensus::Transaction as TxConsensus;

    let wei = u128::try_from(TxConsensus::value(tx)).unwrap_or(u128::MAX);
    Transaction {
        hash: tx.tx_hash().to_string(),
        block_height: height,
        timestamp,
        from: TransactionResponse::from(tx).to_string(),
        to: TxConsensus::to(tx)
            .map_or_else(|| "contract creation".to_string(), |to| to.to_string()),
        value: format_native(wei_to_native(wei), "ETH"),
    }
}
