// Static smart-contract showcase per chain. Illustrative, never fetched.

use crate::data::model::{ChainId, ContractMetrics, SmartContractSample};

type Entry = (&'static str, &'static str, &'static [&'static str], u64, u64, bool);

const ETHEREUM: [Entry; 3] = [
    (
        "ERC-20 Token",
        "Fungible token standard used by stablecoins and governance tokens.",
        &["Transfers", "Allowances", "Supply tracking"],
        512_000,
        1_250_000_000,
        true,
    ),
    (
        "Uniswap V3 Pool",
        "Concentrated-liquidity AMM pool.",
        &["Swaps", "Range orders", "Fee tiers"],
        18_400,
        420_000_000,
        true,
    ),
    (
        "ERC-721 Collection",
        "Non-fungible token contract with metadata URIs.",
        &["Minting", "Ownership", "Royalties"],
        96_000,
        210_000_000,
        true,
    ),
];

const BSC: [Entry; 3] = [
    (
        "BEP-20 Token",
        "BNB Smart Chain fungible token standard.",
        &["Transfers", "Allowances", "Minting"],
        1_100_000,
        2_400_000_000,
        true,
    ),
    (
        "PancakeSwap Router",
        "Routing contract for the PancakeSwap AMM.",
        &["Multi-hop swaps", "Liquidity", "Slippage guards"],
        12,
        980_000_000,
        true,
    ),
    (
        "Venus Lending Market",
        "Over-collateralized lending and borrowing.",
        &["Supply", "Borrow", "Liquidations"],
        40,
        65_000_000,
        true,
    ),
];

const SOLANA: [Entry; 3] = [
    (
        "SPL Token Program",
        "Native program for fungible and non-fungible tokens.",
        &["Mint accounts", "Token accounts", "Delegation"],
        1,
        9_800_000_000,
        true,
    ),
    (
        "Serum DEX",
        "On-chain central limit order book.",
        &["Order book", "Matching", "Settlement"],
        3,
        740_000_000,
        true,
    ),
    (
        "Metaplex Token Metadata",
        "Metadata standard for Solana NFTs.",
        &["Metadata", "Editions", "Collections"],
        1,
        1_300_000_000,
        true,
    ),
];

const POLKADOT: [Entry; 3] = [
    (
        "ink! ERC-20",
        "Fungible token written in ink! for Wasm contract parachains.",
        &["Transfers", "Approvals", "Events"],
        4_200,
        3_100_000,
        true,
    ),
    (
        "XCM Asset Bridge",
        "Cross-consensus asset transfer between parachains.",
        &["Teleports", "Reserve transfers", "Fee payment"],
        85,
        12_500_000,
        true,
    ),
    (
        "Nomination Pool",
        "Pooled staking for small DOT holders.",
        &["Join", "Claim rewards", "Unbond"],
        230,
        8_700_000,
        false,
    ),
];

const CARDANO: [Entry; 3] = [
    (
        "Plutus Validator",
        "eUTXO script guarding locked outputs.",
        &["Datum checks", "Redeemers", "Deterministic fees"],
        5_600,
        14_000_000,
        true,
    ),
    (
        "Minswap DEX",
        "Batcher-based AMM on Cardano.",
        &["Swaps", "Liquidity", "Batch orders"],
        14,
        27_000_000,
        true,
    ),
    (
        "Native Token Policy",
        "Minting policy for ledger-native assets.",
        &["Time locks", "Multisig", "Burning"],
        98_000,
        45_000_000,
        false,
    ),
];

const WORLDCHAIN: [Entry; 3] = [
    (
        "World ID Router",
        "Verifies World ID zero-knowledge proofs on chain.",
        &["Proof verification", "Nullifiers", "Groups"],
        2,
        38_000_000,
        true,
    ),
    (
        "WLD Token",
        "Bridged Worldcoin ERC-20.",
        &["Transfers", "Bridging", "Permit"],
        1,
        95_000_000,
        true,
    ),
    (
        "Priority Blockspace Gate",
        "Gas allowance for verified humans.",
        &["Quota tracking", "Sponsorship", "Rate limits"],
        3,
        21_000_000,
        false,
    ),
];

/// The three showcase contracts for a chain; the first is the default selection.
pub fn smart_contracts(chain: ChainId) -> Vec<SmartContractSample> {
    let entries = match chain {
        ChainId::Ethereum => &ETHEREUM,
        ChainId::BinanceSmartChain => &BSC,
        ChainId::Solana => &SOLANA,
        ChainId::Polkadot => &POLKADOT,
        ChainId::Cardano => &CARDANO,
        ChainId::WorldChain => &WORLDCHAIN,
    };
    entries
        .iter()
        .map(
            |&(name, description, features, deployments, transactions, verified)| {
                SmartContractSample {
                    name: name.to_string(),
                    description: description.to_string(),
                    features: features.iter().map(|f| f.to_string()).collect(),
                    metrics: ContractMetrics {
                        deployments,
                        transactions,
                        verified,
                    },
                }
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_chain_has_three_samples() {
        for chain in ChainId::ALL {
            let samples = smart_contracts(chain);
            assert_eq!(samples.len(), 3, "{chain}");
            assert!(samples.iter().all(|s| !s.features.is_empty()));
        }
    }
}
