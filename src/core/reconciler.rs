//! Sync reconciler
//!
//! Owns one data source's persisted state (cursor plus per-card ledgers) and
//! drives the sync state machine:
//!
//! ```text
//! Idle -> Fetching -> Reconciling -> Committed | Conflicted
//!   ^________________________|  (fatal error, state untouched)
//! ```
//!
//! # Batches
//!
//! A batch is sorted into reconciliation order, partitioned by card and
//! handed to the configured [`ReconcileStrategy`] along with working copies
//! of the affected ledgers. Only when every card succeeds are the working
//! copies committed to the snapshot. A fatal error from any card aborts the
//! whole batch.
//!
//! # Incremental vs full
//!
//! - Incremental: ledgers continue from the snapshot. Transactions dated
//!   before the cursor are still reconciled (deduplication makes that safe)
//!   but flag the sync as conflicted and hold the cursor back.
//! - Full: every ledger is rebuilt from scratch out of the fetched history.
//!   No conflicts are possible. This is the recovery path after conflicts or
//!   a newly detected anniversary.

use crate::config::EngineConfig;
use crate::core::card_sync::CardContext;
use crate::core::catalog::Catalog;
use crate::core::ledger::CardLedger;
use crate::core::traits::TransactionSource;
use crate::strategy::{CardWork, ReconcileStrategy};
use crate::types::transaction::reconciliation_order;
use crate::types::{
    CardId, CardOutcome, EngineError, FetchWindow, SkipReason, SkippedTransaction, SyncConflict,
    SyncCursor, SyncMode, SyncReport, SyncState, SyncStatus, Transaction,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Persisted state of one data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub cursor: SyncCursor,
    pub cards: BTreeMap<CardId, CardLedger>,
}

impl SyncSnapshot {
    /// Empty snapshot for a source that has never synced
    pub fn new(source: &str) -> Self {
        Self {
            cursor: SyncCursor::new(source),
            cards: BTreeMap::new(),
        }
    }

    pub fn ledger(&self, card_id: &str) -> Option<&CardLedger> {
        self.cards.get(card_id)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string_pretty(self).map_err(EngineError::snapshot)
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(EngineError::snapshot)
    }
}

/// Drives syncs for one data source
#[derive(Debug)]
pub struct SyncReconciler {
    snapshot: SyncSnapshot,
    state: SyncState,
    strategy: Box<dyn ReconcileStrategy>,
}

impl SyncReconciler {
    /// Create a reconciler over `snapshot` using `strategy`
    pub fn new(snapshot: SyncSnapshot, strategy: Box<dyn ReconcileStrategy>) -> Self {
        Self {
            snapshot,
            state: SyncState::Idle,
            strategy,
        }
    }

    /// Create a reconciler with the strategy `config` selects
    pub fn with_config(snapshot: SyncSnapshot, config: &EngineConfig) -> Self {
        Self::new(snapshot, config.create_strategy())
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn snapshot(&self) -> &SyncSnapshot {
        &self.snapshot
    }

    pub fn cursor(&self) -> &SyncCursor {
        &self.snapshot.cursor
    }

    pub fn into_snapshot(self) -> SyncSnapshot {
        self.snapshot
    }

    /// Window the fetch collaborator is asked for
    pub fn fetch_window(&self, mode: SyncMode, config: &EngineConfig, now: NaiveDate) -> FetchWindow {
        let from = match mode {
            SyncMode::Incremental => self
                .snapshot
                .cursor
                .last_reconciled
                .unwrap_or(config.initial_sync_date),
            SyncMode::Full => config.initial_sync_date,
        };
        FetchWindow {
            from: from.min(now),
            to: now,
        }
    }

    /// Fetch from `source` and reconcile the result
    ///
    /// # Arguments
    ///
    /// * `catalog` - Validated catalog
    /// * `config` - Engine settings (initial sync date, overage policy)
    /// * `source` - Fetch collaborator
    /// * `mode` - Incremental from the cursor, or full rebuild
    /// * `now` - Sync time; end of the fetch window and expiry reference
    ///
    /// # Errors
    ///
    /// Fetch failures and fatal reconciliation errors. The reconciler is
    /// back in `Idle` and the snapshot is untouched.
    pub fn sync(
        &mut self,
        catalog: &Arc<Catalog>,
        config: &EngineConfig,
        source: &mut dyn TransactionSource,
        mode: SyncMode,
        now: NaiveDate,
    ) -> Result<SyncReport, EngineError> {
        let window = self.fetch_window(mode, config, now);
        self.state = SyncState::Fetching;
        info!(
            source = %source.source_id(),
            ?mode,
            from = %window.from,
            to = %window.to,
            "sync started"
        );

        let transactions = match source.fetch(window) {
            Ok(transactions) => transactions,
            Err(error) => {
                warn!(source = %source.source_id(), %error, "fetch failed");
                self.state = SyncState::Idle;
                return Err(error);
            }
        };

        self.reconcile(catalog, config, transactions, mode, now)
    }

    /// Rebuild every ledger from the full history
    pub fn full_resync(
        &mut self,
        catalog: &Arc<Catalog>,
        config: &EngineConfig,
        source: &mut dyn TransactionSource,
        now: NaiveDate,
    ) -> Result<SyncReport, EngineError> {
        self.sync(catalog, config, source, SyncMode::Full, now)
    }

    /// Reconcile an already-fetched batch
    ///
    /// # Errors
    ///
    /// Fatal reconciliation errors; the snapshot is untouched.
    pub fn reconcile(
        &mut self,
        catalog: &Arc<Catalog>,
        config: &EngineConfig,
        mut transactions: Vec<Transaction>,
        mode: SyncMode,
        now: NaiveDate,
    ) -> Result<SyncReport, EngineError> {
        self.state = SyncState::Reconciling;
        transactions.sort_by(reconciliation_order);

        let previous_cursor = self.snapshot.cursor.clone();
        let processed = transactions.len();
        let latest = transactions.iter().map(|transaction| transaction.date).max();
        let conflicts = match (mode, previous_cursor.last_reconciled) {
            (SyncMode::Incremental, Some(cursor)) => detect_conflicts(&transactions, cursor),
            _ => Vec::new(),
        };

        let mut outcome = CardOutcome::default();
        let work = self.partition(catalog, mode, transactions, &mut outcome);
        let context = CardContext {
            now,
            overage_policy: config.overage_policy,
        };

        let results = match self.strategy.reconcile_cards(catalog, context, work) {
            Ok(results) => results,
            Err(error) => {
                warn!(%error, "reconciliation aborted, no changes committed");
                self.state = SyncState::Idle;
                return Err(error);
            }
        };

        for result in results {
            outcome.merge(result.outcome);
            self.snapshot.cards.insert(result.card_id, result.ledger);
        }

        let status = if conflicts.is_empty() {
            self.snapshot.cursor = previous_cursor.advanced_to(latest.unwrap_or(now));
            SyncStatus::Committed
        } else {
            SyncStatus::Conflicted
        };
        self.state = status.into();

        info!(
            source = %self.snapshot.cursor.source,
            state = %self.state,
            processed,
            conflicts = conflicts.len(),
            unresolved = outcome.unresolved_credits.len(),
            cursor = ?self.snapshot.cursor.last_reconciled,
            "sync finished"
        );

        Ok(SyncReport {
            source: self.snapshot.cursor.source.clone(),
            mode,
            status,
            previous_cursor,
            cursor: self.snapshot.cursor.clone(),
            processed,
            conflicts,
            outcome,
        })
    }

    /// Split a sorted batch into per-card work items
    ///
    /// Every catalog card with state in the snapshot gets an item, so expiry
    /// runs even for cards without new transactions. Transactions for cards
    /// missing from the catalog are skipped.
    fn partition(
        &self,
        catalog: &Catalog,
        mode: SyncMode,
        transactions: Vec<Transaction>,
        outcome: &mut CardOutcome,
    ) -> Vec<CardWork> {
        let mut by_card: BTreeMap<CardId, Vec<Transaction>> = self
            .snapshot
            .cards
            .keys()
            .filter(|card_id| catalog.contains_card(card_id))
            .map(|card_id| (card_id.clone(), Vec::new()))
            .collect();

        for transaction in transactions {
            if !catalog.contains_card(&transaction.card_id) {
                warn!(card = %transaction.card_id, transaction = %transaction.id, "unknown card");
                outcome.skipped.push(SkippedTransaction {
                    card_id: transaction.card_id.clone(),
                    transaction_id: transaction.id.clone(),
                    skip: SkipReason::UnknownCard,
                });
                continue;
            }
            by_card
                .entry(transaction.card_id.clone())
                .or_default()
                .push(transaction);
        }

        by_card
            .into_iter()
            .map(|(card_id, transactions)| {
                let ledger = match mode {
                    SyncMode::Full => CardLedger::new(&card_id),
                    SyncMode::Incremental => self
                        .snapshot
                        .cards
                        .get(&card_id)
                        .cloned()
                        .unwrap_or_else(|| CardLedger::new(&card_id)),
                };
                CardWork {
                    card_id,
                    ledger,
                    transactions,
                }
            })
            .collect()
    }
}

fn detect_conflicts(transactions: &[Transaction], cursor: NaiveDate) -> Vec<SyncConflict> {
    transactions
        .iter()
        .filter(|transaction| transaction.date < cursor)
        .map(|transaction| {
            warn!(
                card = %transaction.card_id,
                transaction = %transaction.id,
                date = %transaction.date,
                %cursor,
                "transaction predates sync cursor"
            );
            SyncConflict {
                card_id: transaction.card_id.clone(),
                transaction_id: transaction.id.clone(),
                date: transaction.date,
                cursor,
            }
        })
        .collect()
}
