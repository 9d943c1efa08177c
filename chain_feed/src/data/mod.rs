pub mod catalog;
mod channel;
pub mod evm;
pub mod explorer;
mod model;
pub mod solana;
pub mod synthetic;

use async_trait::async_trait;

use crate::error::FetchError;

pub use channel::{Tick, TickHub};
pub use model::{
    format_change, format_native, lamports_to_sol, parse_hex_u128, parse_hex_u64, wei_to_native,
    Block, Change, ChainData, ChainId, ContractMetrics, NetworkStats, SmartContractSample,
    Snapshot, SnapshotSource, Transaction, UnknownChain, MAX_BLOCKS, MAX_TRANSACTIONS,
};

/// Interface for chain-specific fetchers. One live fetch cycle per call;
/// fallback and caching live in [`crate::adapter::Adapter`].
#[async_trait]
pub trait ChainFetcher: Send + Sync + 'static {
    fn chain(&self) -> ChainId;
    async fn fetch(&self) -> Result<ChainData, FetchError>;
}

/// Percent change from `old` to `new`; zero when there is no baseline.
pub(crate) fn percent_change(old: f64, new: f64) -> f64 {
    if old == 0.0 || !old.is_finite() || !new.is_finite() {
        return 0.0;
    }
    (new - old) / old * 100.0
}

/// Mean spacing between consecutive blocks, newest-first input.
pub(crate) fn average_block_time(blocks: &[Block]) -> Option<f64> {
    let (newest, oldest) = (blocks.first()?, blocks.last()?);
    let span = newest.timestamp - oldest.timestamp;
    (blocks.len() > 1 && span > 0).then(|| span as f64 / (blocks.len() - 1) as f64)
}

/// Transactions across the batch over the wall time the batch covers.
pub(crate) fn estimate_tps(total_txs: u64, block_count: usize, block_time: f64) -> f64 {
    let window = block_count as f64 * block_time;
    if window <= 0.0 {
        return 0.0;
    }
    total_txs as f64 / window
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(height: u64, timestamp: i64) -> Block {
        Block {
            id: format!("0x{height:x}"),
            height,
            timestamp,
            tx_count: 0,
            size_bytes: 0,
            producer: None,
        }
    }

    #[test]
    fn tps_is_transactions_over_window() {
        // 5 blocks × 12s, 600 txs
        assert!((estimate_tps(600, 5, 12.0) - 10.0).abs() < 1e-9);
        assert_eq!(estimate_tps(10, 0, 12.0), 0.0);
    }

    #[test]
    fn block_time_from_timestamps() {
        let blocks = vec![
            block(5, 148),
            block(4, 136),
            block(3, 124),
            block(2, 112),
            block(1, 100),
        ];
        assert_eq!(average_block_time(&blocks), Some(12.0));
        assert_eq!(average_block_time(&blocks[..1]), None);
    }

    #[test]
    fn percent_change_without_baseline_is_zero() {
        assert_eq!(percent_change(0.0, 10.0), 0.0);
        assert!((percent_change(10.0, 9.5) + 5.0).abs() < 1e-9);
    }
}
