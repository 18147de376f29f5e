//! Card-partitioned batch processing
//!
//! This module provides the `CardBatchProcessor`, which reconciles the cards
//! of one sync concurrently.
//!
//! # Design
//!
//! Cards share no mutable state: each card's slice of the batch is applied
//! to its own working ledger by a single task, so per-card ordering is
//! preserved while different cards run in parallel.
//!
//! # Architecture
//!
//! ```text
//! CardBatchProcessor
//!     ├── Arc<Catalog>         (read-only, shared by all tasks)
//!     ├── CardContext          (sync time, overage policy)
//!     └── Arc<LedgerStaging>   (finished per-card results)
//! ```
//!
//! # Thread Safety
//!
//! The processor is cloneable and can be moved into spawned tasks. Only
//! `Arc`s and `Copy` data are held.

use super::LedgerStaging;
use crate::core::card_sync::{reconcile_card, CardContext};
use crate::core::catalog::Catalog;
use crate::strategy::{CardResult, CardWork};
use crate::types::{CardId, EngineError};
use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

/// Concurrent per-card reconciler
#[derive(Debug, Clone)]
pub struct CardBatchProcessor {
    catalog: Arc<Catalog>,
    context: CardContext,
    staging: Arc<LedgerStaging>,
}

impl CardBatchProcessor {
    /// Create a new CardBatchProcessor
    ///
    /// # Arguments
    ///
    /// * `catalog` - Arc-wrapped catalog shared by all tasks
    /// * `context` - Sync time and overage policy
    pub fn new(catalog: Arc<Catalog>, context: CardContext) -> Self {
        Self {
            catalog,
            context,
            staging: Arc::new(LedgerStaging::new()),
        }
    }

    /// Reconcile one card and stage the result
    ///
    /// # Errors
    ///
    /// Fatal errors from the card pipeline; nothing is staged for the card.
    pub async fn process_card(&self, work: CardWork) -> Result<(), EngineError> {
        let CardWork {
            card_id,
            mut ledger,
            transactions,
        } = work;
        debug!(card = %card_id, transactions = transactions.len(), "reconciling card");

        let outcome = reconcile_card(&self.catalog, self.context, &mut ledger, &transactions)?;
        self.staging.stage(card_id, ledger, outcome);
        Ok(())
    }

    /// Reconcile all cards concurrently, one task per card
    ///
    /// # Returns
    ///
    /// Staged results ordered by card id.
    ///
    /// # Errors
    ///
    /// - The first fatal card error, in card-id order
    /// - `WorkerFailed` if a task panicked or was cancelled
    pub async fn process_batch(&self, work: Vec<CardWork>) -> Result<Vec<CardResult>, EngineError> {
        let mut card_ids: Vec<CardId> = Vec::with_capacity(work.len());
        let mut tasks = Vec::with_capacity(work.len());
        for item in work {
            card_ids.push(item.card_id.clone());
            let processor = self.clone();
            tasks.push(tokio::spawn(async move { processor.process_card(item).await }));
        }

        let mut failures: Vec<(CardId, EngineError)> = Vec::new();
        for (card_id, joined) in card_ids.into_iter().zip(join_all(tasks).await) {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(error)) => failures.push((card_id, error)),
                Err(join_error) => {
                    let error = EngineError::worker_failed(&card_id, join_error);
                    failures.push((card_id, error));
                }
            }
        }

        let staged = self.staging.drain_sorted();
        failures.sort_by(|a, b| a.0.cmp(&b.0));
        match failures.into_iter().next() {
            Some((_, error)) => Err(error),
            None => Ok(staged),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OveragePolicy;
    use crate::core::catalog::tests::test_catalog;
    use crate::core::ledger::CardLedger;
    use crate::types::{Transaction, UsageStatus};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn processor() -> CardBatchProcessor {
        CardBatchProcessor::new(
            Arc::new(test_catalog()),
            CardContext {
                now: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
                overage_policy: OveragePolicy::Warn,
            },
        )
    }

    fn tx(id: &str, card: &str, day: u32, amount: i64, description: &str) -> Transaction {
        Transaction::new(
            Some(id),
            card,
            NaiveDate::from_ymd_opt(2026, 2, day).unwrap(),
            Decimal::new(amount, 0),
            description,
        )
    }

    fn work(card: &str, transactions: Vec<Transaction>) -> CardWork {
        CardWork {
            card_id: card.to_string(),
            ledger: CardLedger::new(card),
            transactions,
        }
    }

    #[test]
    fn test_processor_is_cloneable() {
        let processor = processor();
        let clone = processor.clone();
        assert!(Arc::ptr_eq(&processor.catalog, &clone.catalog));
        assert!(Arc::ptr_eq(&processor.staging, &clone.staging));
    }

    #[tokio::test]
    async fn test_process_card_stages_result() {
        let processor = processor();
        processor
            .process_card(work("amex-plat", vec![tx("t1", "amex-plat", 1, 75, "LULULEMON")]))
            .await
            .unwrap();

        assert!(processor.staging.is_staged("amex-plat"));
        let results = processor.staging.drain_sorted();
        let period = results[0].ledger.periods().next().unwrap();
        assert_eq!(period.status, UsageStatus::FullyUsed);
    }

    #[tokio::test]
    async fn test_process_batch_empty() {
        let results = processor().process_batch(Vec::new()).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_process_batch_many_cards() {
        let batch = vec![
            work("gold", vec![tx("g1", "gold", 2, 5, "GRUBHUB")]),
            work("amex-plat", vec![tx("a1", "amex-plat", 2, 20, "UBER TRIP")]),
        ];

        let results = processor().process_batch(batch).await.unwrap();

        let ids: Vec<_> = results.iter().map(|r| r.card_id.as_str()).collect();
        assert_eq!(ids, vec!["amex-plat", "gold"]);
        assert_eq!(results[0].outcome.period_deltas[0].period.benefit_id, "uber-cash");
        assert_eq!(results[1].outcome.period_deltas[0].period.benefit_id, "dining");
    }

    #[tokio::test]
    async fn test_fatal_card_error_fails_batch() {
        let batch = vec![
            work("gold", vec![tx("g1", "gold", 2, 5, "GRUBHUB")]),
            work(
                "amex-plat",
                vec![
                    tx("a2", "amex-plat", 9, 20, "LULULEMON"),
                    tx("a1", "amex-plat", 2, 20, "LULULEMON"),
                ],
            ),
        ];

        let error = processor().process_batch(batch).await.unwrap_err();
        assert!(matches!(error, EngineError::OutOfOrderApplication { .. }));
    }
}
