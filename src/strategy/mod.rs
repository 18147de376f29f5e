//! Execution strategies for per-card reconciliation
//!
//! A sync partitions its batch by card; cards never share state, so each
//! card's slice can be reconciled independently. This module defines the
//! Strategy pattern that decides how those slices run (one after another, or
//! concurrently on a tokio runtime) and lets the choice be made at runtime.
//!
//! Whatever the strategy, the result for a card depends only on that card's
//! ledger and transactions: both strategies produce identical snapshots.

use crate::config::{ParallelConfig, StrategyType};
use crate::core::card_sync::CardContext;
use crate::core::catalog::Catalog;
use crate::core::ledger::CardLedger;
use crate::types::{CardId, CardOutcome, EngineError, Transaction};
use std::fmt::Debug;
use std::sync::Arc;

pub mod parallel;
pub mod sequential;

pub use parallel::ParallelStrategy;
pub use sequential::SequentialStrategy;

/// One card's share of a sync
#[derive(Debug, Clone)]
pub struct CardWork {
    pub card_id: CardId,

    /// Working copy of the card's ledger
    pub ledger: CardLedger,

    /// The card's transactions, in reconciliation order
    pub transactions: Vec<Transaction>,
}

/// A card's reconciled ledger and what changed
#[derive(Debug, Clone)]
pub struct CardResult {
    pub card_id: CardId,
    pub ledger: CardLedger,
    pub outcome: CardOutcome,
}

/// Strategy trait for running per-card reconciliation
pub trait ReconcileStrategy: Send + Sync + Debug {
    /// Reconcile every card in `work`
    ///
    /// # Arguments
    ///
    /// * `catalog` - Shared, validated catalog
    /// * `context` - Sync time and overage policy
    /// * `work` - One entry per card, ledgers already copied
    ///
    /// # Returns
    ///
    /// One result per card, ordered by card id.
    ///
    /// # Errors
    ///
    /// The first fatal error in card-id order. Results of other cards are
    /// discarded; nothing has been committed at this point.
    fn reconcile_cards(
        &self,
        catalog: &Arc<Catalog>,
        context: CardContext,
        work: Vec<CardWork>,
    ) -> Result<Vec<CardResult>, EngineError>;
}

/// Create a reconcile strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - Sequential or parallel
/// * `config` - Optional worker configuration (ignored for sequential)
///
/// # Returns
///
/// A boxed trait object implementing [`ReconcileStrategy`]
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<ParallelConfig>,
) -> Box<dyn ReconcileStrategy> {
    match strategy_type {
        StrategyType::Sequential => Box::new(SequentialStrategy),
        StrategyType::Parallel => {
            let config = config.unwrap_or_default();
            Box::new(ParallelStrategy::new(config))
        }
    }
}
