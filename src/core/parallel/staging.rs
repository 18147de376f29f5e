//! Thread-safe staging area for per-card results
//!
//! Tasks reconcile into their own working ledgers and park the result here.
//! Nothing in the staging area is visible to the snapshot until the
//! reconciler commits the whole batch.
//!
//! # Thread Safety
//!
//! Backed by `DashMap` for lock-free concurrent inserts from many tasks.

use crate::core::ledger::CardLedger;
use crate::strategy::CardResult;
use crate::types::{CardId, CardOutcome};
use dashmap::DashMap;

/// Finished per-card work awaiting commit
#[derive(Debug, Default)]
pub struct LedgerStaging {
    results: DashMap<CardId, (CardLedger, CardOutcome)>,
}

impl LedgerStaging {
    pub fn new() -> Self {
        Self {
            results: DashMap::new(),
        }
    }

    /// Park a card's result, replacing any earlier one for the same card
    pub fn stage(&self, card_id: CardId, ledger: CardLedger, outcome: CardOutcome) {
        self.results.insert(card_id, (ledger, outcome));
    }

    pub fn is_staged(&self, card_id: &str) -> bool {
        self.results.contains_key(card_id)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Remove and return every staged result, ordered by card id
    pub fn drain_sorted(&self) -> Vec<CardResult> {
        let mut card_ids: Vec<CardId> = self
            .results
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        card_ids.sort();

        card_ids
            .into_iter()
            .filter_map(|card_id| self.results.remove(&card_id))
            .map(|(card_id, (ledger, outcome))| CardResult {
                card_id,
                ledger,
                outcome,
            })
            .collect()
    }
}
