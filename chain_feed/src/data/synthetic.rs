//! Deterministic synthetic datasets for mock mode and fallback.
//!
//! Timestamps are laid out backwards from `now`, so a dataset generated at
//! startup keeps aging under the live clock like real data would.

use crate::data::model::{
    format_native, Block, Change, ChainData, ChainId, NetworkStats, Transaction, MAX_BLOCKS,
    MAX_TRANSACTIONS,
};

/// Per-chain shape of the synthetic data.
struct Profile {
    tip: u64,
    block_time: f64,
    txs_per_block: u32,
    block_size: u64,
    tps: f64,
    tps_change: f64,
    nodes: u64,
    nodes_change: f64,
    contracts: u64,
    contracts_change: f64,
    hash_prefix: &'static str,
    address_prefix: &'static str,
    producer: &'static str,
}

fn profile(chain: ChainId) -> Profile {
    match chain {
        ChainId::Ethereum => Profile {
            tip: 19_000_000,
            block_time: 12.0,
            txs_per_block: 150,
            block_size: 85_000,
            tps: 12.5,
            tps_change: 3.2,
            nodes: 5_900,
            nodes_change: 1.0,
            contracts: 61_000_000,
            contracts_change: 2.0,
            hash_prefix: "0x",
            address_prefix: "0x",
            producer: "0x95222290dd7278aa3ddd389cc1e1d165cc4bafe5",
        },
        ChainId::BinanceSmartChain => Profile {
            tip: 36_000_000,
            block_time: 3.0,
            txs_per_block: 120,
            block_size: 48_000,
            tps: 40.0,
            tps_change: -1.5,
            nodes: 1_200,
            nodes_change: 0.0,
            contracts: 7_800_000,
            contracts_change: 1.1,
            hash_prefix: "0x",
            address_prefix: "0x",
            producer: "0x72b61c6014342d914470ec7ac2975be345796c2b",
        },
        ChainId::Solana => Profile {
            tip: 250_000_000,
            block_time: 0.4,
            txs_per_block: 1_800,
            block_size: 1_200_000,
            tps: 3_200.0,
            tps_change: 4.0,
            nodes: 1_900,
            nodes_change: -2.0,
            contracts: 9_400,
            contracts_change: 5.0,
            hash_prefix: "",
            address_prefix: "",
            producer: "GdnSyH3YtwcxFvQrVVJMm1JhTS4QVX7MFsX56uJLUfiZ",
        },
        ChainId::Polkadot => Profile {
            tip: 19_500_000,
            block_time: 6.0,
            txs_per_block: 12,
            block_size: 6_000,
            tps: 1.8,
            tps_change: 0.5,
            nodes: 297,
            nodes_change: 0.0,
            contracts: 2_100,
            contracts_change: 3.0,
            hash_prefix: "0x",
            address_prefix: "1",
            producer: "14ShUZUYUR35RBZW6uVVt1zXDxmSQddkeDdXf1JkMA6P721N",
        },
        ChainId::Cardano => Profile {
            tip: 10_100_000,
            block_time: 20.0,
            txs_per_block: 18,
            block_size: 24_000,
            tps: 0.9,
            tps_change: -0.4,
            nodes: 3_000,
            nodes_change: 1.0,
            contracts: 8_300,
            contracts_change: 6.0,
            hash_prefix: "",
            address_prefix: "addr1",
            producer: "pool1pu5jlj4q9w9jlxeu370a3c9myx47md5j5m2str0naunn2q3lkdy",
        },
        ChainId::WorldChain => Profile {
            tip: 9_000_000,
            block_time: 2.0,
            txs_per_block: 60,
            block_size: 22_000,
            tps: 30.0,
            tps_change: 12.0,
            nodes: 150,
            nodes_change: 4.0,
            contracts: 410_000,
            contracts_change: 9.0,
            hash_prefix: "0x",
            address_prefix: "0x",
            producer: "0x4200000000000000000000000000000000000011",
        },
    }
}

/// Stable pseudo-random hex for `(chain, salt)`. splitmix64 over a chain seed.
fn pseudo_hex(chain: ChainId, salt: u64, len: usize) -> String {
    let mut state = (chain as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ salt;
    let mut out = String::with_capacity(len);
    while out.len() < len {
        state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        out.push_str(&format!("{z:016x}"));
    }
    out.truncate(len);
    out
}

/// The synthetic dataset for `chain`, anchored at `now`.
pub fn dataset(chain: ChainId, now: i64) -> ChainData {
    let p = profile(chain);
    let symbol = chain.native_symbol();

    let blocks: Vec<Block> = (0..MAX_BLOCKS as u64)
        .map(|i| {
            let height = p.tip - i;
            Block {
                id: format!("{}{}", p.hash_prefix, pseudo_hex(chain, height, 64)),
                height,
                timestamp: now - (p.block_time * i as f64).round() as i64,
                tx_count: p.txs_per_block + (i as u32 * 7) % 13,
                size_bytes: p.block_size + i * 1_024,
                producer: Some(p.producer.to_string()),
            }
        })
        .collect();

    let transactions: Vec<Transaction> = (0..MAX_TRANSACTIONS as u64)
        .map(|i| {
            let block = &blocks[(i as usize / 2).min(blocks.len() - 1)];
            let amount = 0.05 + (i as f64) * 0.137;
            Transaction {
                hash: format!("{}{}", p.hash_prefix, pseudo_hex(chain, 1_000 + i, 64)),
                block_height: block.height,
                timestamp: block.timestamp - i as i64 % 2,
                from: format!("{}{}", p.address_prefix, pseudo_hex(chain, 2_000 + i, 40)),
                to: format!("{}{}", p.address_prefix, pseudo_hex(chain, 3_000 + i, 40)),
                value: format_native(amount, symbol),
            }
        })
        .collect();

    let defaults = NetworkStats::placeholder(chain);
    let stats = NetworkStats {
        tps: p.tps,
        tps_change: Change(p.tps_change),
        nodes: p.nodes,
        nodes_change: Change(p.nodes_change),
        block_time_secs: p.block_time,
        block_time_change: Change(0.0),
        contracts: p.contracts,
        contracts_change: Change(p.contracts_change),
        ..defaults
    };

    ChainData {
        blocks,
        transactions,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn dataset_is_deterministic() {
        for chain in ChainId::ALL {
            assert_eq!(dataset(chain, NOW), dataset(chain, NOW));
        }
    }

    #[test]
    fn dataset_respects_caps_and_order() {
        for chain in ChainId::ALL {
            let data = dataset(chain, NOW);
            assert_eq!(data.blocks.len(), MAX_BLOCKS);
            assert_eq!(data.transactions.len(), MAX_TRANSACTIONS);
            assert!(data.blocks.windows(2).all(|w| w[0].height > w[1].height));
            assert!(data.blocks.iter().all(|b| b.timestamp <= NOW));
        }
    }

    #[test]
    fn timestamps_follow_now() {
        let early = dataset(ChainId::Polkadot, NOW);
        let later = dataset(ChainId::Polkadot, NOW + 60);
        assert_eq!(later.blocks[0].timestamp - early.blocks[0].timestamp, 60);
        assert_eq!(early.blocks[0].id, later.blocks[0].id);
    }

    #[test]
    fn chains_do_not_share_hashes() {
        let eth = dataset(ChainId::Ethereum, NOW);
        let bsc = dataset(ChainId::BinanceSmartChain, NOW);
        assert_ne!(eth.blocks[0].id, bsc.blocks[0].id);
    }
}
