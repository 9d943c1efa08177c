//! Active-chain store: latest snapshot per chain plus the derived ages.
//!
//! Everything sits behind one mutex so a view is always cut from a single
//! chain's snapshot, and a chain switch swaps the exposed view atomically.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::clock::age;
use crate::data::{
    Block, ChainId, NetworkStats, SmartContractSample, Snapshot, SnapshotSource, Transaction,
};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AgedBlock {
    #[serde(flatten)]
    pub block: Block,
    pub age: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AgedTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub age: String,
}

/// What consumers render for one chain.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChainView {
    pub chain: ChainId,
    pub blocks: Vec<AgedBlock>,
    pub transactions: Vec<AgedTransaction>,
    pub stats: NetworkStats,
    pub smart_contracts: Vec<SmartContractSample>,
    pub selected_contract: usize,
    pub loading: bool,
    pub error: Option<String>,
    pub source: SnapshotSource,
    /// Unix seconds the ages were computed against.
    pub ages_at: i64,
}

impl ChainView {
    pub fn selected(&self) -> Option<&SmartContractSample> {
        self.smart_contracts.get(self.selected_contract)
    }
}

struct Entry {
    snapshot: Snapshot,
    block_ages: Vec<String>,
    tx_ages: Vec<String>,
}

impl Entry {
    fn new(snapshot: Snapshot, now: i64) -> Self {
        let mut entry = Self {
            snapshot,
            block_ages: Vec::new(),
            tx_ages: Vec::new(),
        };
        entry.refresh(now);
        entry
    }

    fn refresh(&mut self, now: i64) {
        self.block_ages = self
            .snapshot
            .blocks
            .iter()
            .map(|b| age(b.timestamp, now))
            .collect();
        self.tx_ages = self
            .snapshot
            .transactions
            .iter()
            .map(|tx| age(tx.timestamp, now))
            .collect();
    }

    fn view(&self, selected_contract: usize, ages_at: i64) -> ChainView {
        let snapshot = &self.snapshot;
        ChainView {
            chain: snapshot.chain,
            blocks: snapshot
                .blocks
                .iter()
                .zip(&self.block_ages)
                .map(|(block, age)| AgedBlock {
                    block: block.clone(),
                    age: age.clone(),
                })
                .collect(),
            transactions: snapshot
                .transactions
                .iter()
                .zip(&self.tx_ages)
                .map(|(tx, age)| AgedTransaction {
                    transaction: tx.clone(),
                    age: age.clone(),
                })
                .collect(),
            stats: snapshot.stats.clone(),
            smart_contracts: snapshot.smart_contracts.clone(),
            selected_contract,
            loading: snapshot.loading,
            error: snapshot.error.clone(),
            source: snapshot.source,
            ages_at,
        }
    }
}

struct Inner {
    active: ChainId,
    selected_contract: usize,
    entries: HashMap<ChainId, Entry>,
    /// Last tick's now; new snapshots are labeled against it.
    now: i64,
    open: bool,
}

pub struct Store {
    inner: Mutex<Inner>,
}

impl Store {
    /// Seed with one snapshot per chain so no view is ever empty.
    pub fn new(active: ChainId, seeds: impl IntoIterator<Item = Snapshot>, now: i64) -> Self {
        let entries = seeds
            .into_iter()
            .map(|snapshot| (snapshot.chain, Entry::new(snapshot, now)))
            .collect();
        Self {
            inner: Mutex::new(Inner {
                active,
                selected_contract: 0,
                entries,
                now,
                open: true,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace a chain's snapshot wholesale. Returns `false` once closed.
    pub fn publish(&self, snapshot: Snapshot) -> bool {
        let mut inner = self.lock();
        if !inner.open {
            log::debug!("{}: dropping snapshot published after close", snapshot.chain);
            return false;
        }
        let entry = Entry::new(snapshot, inner.now);
        inner.entries.insert(entry.snapshot.chain, entry);
        true
    }

    /// Recompute every cached age against `now`. No-op once closed.
    pub fn refresh_ages(&self, now: i64) -> Option<usize> {
        let mut inner = self.lock();
        if !inner.open {
            return None;
        }
        inner.now = now;
        let mut refreshed = 0;
        for entry in inner.entries.values_mut() {
            entry.refresh(now);
            refreshed += entry.block_ages.len() + entry.tx_ages.len();
        }
        Some(refreshed)
    }

    pub fn view(&self, chain: ChainId) -> Option<ChainView> {
        let inner = self.lock();
        let selected = if chain == inner.active {
            inner.selected_contract
        } else {
            0
        };
        inner
            .entries
            .get(&chain)
            .map(|entry| entry.view(selected, inner.now))
    }

    /// The active chain's view, cut under the same lock that guards `active`.
    pub fn current_view(&self) -> ChainView {
        let inner = self.lock();
        match inner.entries.get(&inner.active) {
            Some(entry) => entry.view(inner.selected_contract, inner.now),
            None => ChainView {
                chain: inner.active,
                blocks: Vec::new(),
                transactions: Vec::new(),
                stats: NetworkStats::placeholder(inner.active),
                smart_contracts: crate::data::catalog::smart_contracts(inner.active),
                selected_contract: 0,
                loading: true,
                error: None,
                source: SnapshotSource::Fallback,
                ages_at: inner.now,
            },
        }
    }

    pub fn active(&self) -> ChainId {
        self.lock().active
    }

    /// Make `chain` active. Same chain is a no-op; otherwise the contract
    /// selection resets to the new chain's default.
    pub fn switch_chain(&self, chain: ChainId) -> bool {
        let mut inner = self.lock();
        if inner.active == chain {
            return false;
        }
        inner.active = chain;
        inner.selected_contract = 0;
        true
    }

    pub fn select_contract(&self, index: usize) -> bool {
        let mut inner = self.lock();
        let available = inner
            .entries
            .get(&inner.active)
            .map_or(0, |entry| entry.snapshot.smart_contracts.len());
        if index >= available {
            return false;
        }
        inner.selected_contract = index;
        true
    }

    pub fn close(&self) {
        self.lock().open = false;
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic;

    const NOW: i64 = 1_700_000_000;

    fn snapshot(chain: ChainId, source: SnapshotSource) -> Snapshot {
        Snapshot::from_data(chain, synthetic::dataset(chain, NOW), source, None)
    }

    fn store() -> Store {
        Store::new(
            ChainId::Ethereum,
            ChainId::ALL.map(|chain| snapshot(chain, SnapshotSource::Fallback)),
            NOW,
        )
    }

    #[test]
    fn seeded_store_is_never_empty() {
        let store = store();
        for chain in ChainId::ALL {
            let view = store.view(chain).unwrap();
            assert_eq!(view.blocks.len(), crate::data::MAX_BLOCKS);
            assert_eq!(view.smart_contracts.len(), 3);
        }
    }

    #[test]
    fn switch_is_atomic_and_resets_selection() {
        let store = store();
        assert!(store.select_contract(2));
        assert_eq!(store.current_view().selected_contract, 2);

        assert!(!store.switch_chain(ChainId::Ethereum));
        assert_eq!(store.current_view().selected_contract, 2);

        assert!(store.switch_chain(ChainId::Solana));
        let view = store.current_view();
        assert_eq!(view.chain, ChainId::Solana);
        assert_eq!(view.selected_contract, 0);
        assert_eq!(view.smart_contracts[0].name, "SPL Token Program");
        let solana_ids: Vec<_> = synthetic::dataset(ChainId::Solana, NOW)
            .blocks
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert!(view.blocks.iter().all(|b| solana_ids.contains(&b.block.id)));
    }

    #[test]
    fn round_trip_keeps_shape() {
        let store = store();
        let before = store.current_view();
        store.switch_chain(ChainId::Cardano);
        store.switch_chain(ChainId::Ethereum);
        let after = store.current_view();
        assert_eq!(before.chain, after.chain);
        assert_eq!(before.blocks.len(), after.blocks.len());
        assert_eq!(before.transactions.len(), after.transactions.len());
        assert_eq!(before.smart_contracts, after.smart_contracts);
    }

    #[test]
    fn ages_move_only_on_refresh() {
        let store = store();
        let first = store.current_view().blocks[0].age.clone();
        assert_eq!(first, "0s ago");

        store.publish(snapshot(ChainId::Ethereum, SnapshotSource::Live));
        assert_eq!(store.current_view().blocks[0].age, "0s ago");

        assert!(store.refresh_ages(NOW + 125).unwrap() > 0);
        assert_eq!(store.current_view().blocks[0].age, "2m 5s ago");
        store.refresh_ages(NOW + 125);
        assert_eq!(store.current_view().blocks[0].age, "2m 5s ago");
    }

    #[test]
    fn publish_replaces_whole_snapshot() {
        let store = store();
        let mut replacement = snapshot(ChainId::Ethereum, SnapshotSource::Live);
        replacement.blocks.truncate(1);
        replacement.transactions.clear();
        replacement.error = Some("stale".into());
        assert!(store.publish(replacement));

        let view = store.current_view();
        assert_eq!(view.blocks.len(), 1);
        assert!(view.transactions.is_empty());
        assert_eq!(view.error.as_deref(), Some("stale"));
        assert_eq!(view.source, SnapshotSource::Live);
    }

    #[test]
    fn closed_store_rejects_writes() {
        let store = store();
        let before = store.current_view();
        store.close();

        let mut late = snapshot(ChainId::Ethereum, SnapshotSource::Live);
        late.blocks.clear();
        assert!(!store.publish(late));
        assert!(store.refresh_ages(NOW + 60).is_none());
        assert_eq!(store.current_view(), before);
    }

    #[test]
    fn selection_is_bounds_checked() {
        let store = store();
        assert!(!store.select_contract(3));
        assert_eq!(store.current_view().selected().unwrap().name, "ERC-20 Token");
    }
}
