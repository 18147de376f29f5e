//! Parallel reconcile strategy
//!
//! Runs each card's reconciliation as its own tokio task on a multi-threaded
//! runtime.
//!
//! # Architecture
//!
//! ```text
//! ParallelStrategy
//!     ├── ParallelConfig      (worker_threads)
//!     └── CardBatchProcessor  (one task per card)
//!         └── LedgerStaging   (DashMap of finished per-card results)
//! ```
//!
//! Callers stay synchronous. Outside any runtime one is built per call with
//! `worker_threads` and blocked on. Inside a multi-threaded runtime the
//! batch runs on the caller's runtime through `block_in_place`; inside a
//! current-thread runtime it runs on a scoped thread with its own runtime.
//! Transactions of one card are still applied in order by a single task.

use crate::config::ParallelConfig;
use crate::core::card_sync::CardContext;
use crate::core::catalog::Catalog;
use crate::core::parallel::CardBatchProcessor;
use crate::strategy::{CardResult, CardWork, ReconcileStrategy};
use crate::types::EngineError;
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::debug;

/// Multi-threaded strategy
///
/// # Thread Safety
///
/// `ParallelStrategy` holds only its configuration; every call builds its
/// own runtime and processor.
#[derive(Debug, Clone)]
pub struct ParallelStrategy {
    config: ParallelConfig,
}

impl ParallelStrategy {
    /// Create a new ParallelStrategy
    ///
    /// # Arguments
    ///
    /// * `config` - Worker configuration; zero threads falls back to the default
    pub fn new(config: ParallelConfig) -> Self {
        Self {
            config: config.normalized(),
        }
    }

    pub fn config(&self) -> &ParallelConfig {
        &self.config
    }

    fn run_on_own_runtime(
        &self,
        processor: CardBatchProcessor,
        work: Vec<CardWork>,
    ) -> Result<Vec<CardResult>, EngineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.worker_threads)
            .build()
            .map_err(|e| EngineError::worker_failed("*", format!("failed to create runtime: {}", e)))?;
        runtime.block_on(processor.process_batch(work))
    }
}

impl ReconcileStrategy for ParallelStrategy {
    fn reconcile_cards(
        &self,
        catalog: &Arc<Catalog>,
        context: CardContext,
        work: Vec<CardWork>,
    ) -> Result<Vec<CardResult>, EngineError> {
        if work.is_empty() {
            return Ok(Vec::new());
        }

        let processor = CardBatchProcessor::new(Arc::clone(catalog), context);
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                debug!(cards = work.len(), "reconciling on the caller's runtime");
                tokio::task::block_in_place(|| handle.block_on(processor.process_batch(work)))
            }
            Ok(_) => std::thread::scope(|scope| {
                scope
                    .spawn(move || self.run_on_own_runtime(processor, work))
                    .join()
                    .unwrap_or_else(|_| {
                        Err(EngineError::worker_failed("*", "reconciliation thread panicked"))
                    })
            }),
            Err(_) => self.run_on_own_runtime(processor, work),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OveragePolicy;
    use crate::core::catalog::tests::test_catalog;
    use crate::core::ledger::CardLedger;
    use crate::strategy::SequentialStrategy;
    use crate::types::Transaction;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn work() -> Vec<CardWork> {
        let tx = |id: &str, card: &str, date: (i32, u32, u32), amount: &str, description: &str| {
            Transaction::new(
                Some(id),
                card,
                NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
                Decimal::from_str(amount).unwrap(),
                description,
            )
        };
        vec![
            CardWork {
                card_id: "gold".to_string(),
                ledger: CardLedger::new("gold"),
                transactions: vec![
                    tx("g1", "gold", (2026, 2, 1), "8.00", "GRUBHUB"),
                    tx("g2", "gold", (2026, 2, 3), "-8.00", "DINING CREDIT"),
                ],
            },
            CardWork {
                card_id: "amex-plat".to_string(),
                ledger: CardLedger::new("amex-plat"),
                transactions: vec![
                    tx("a1", "amex-plat", (2026, 2, 1), "60.00", "LULULEMON"),
                    tx("a2", "amex-plat", (2026, 2, 5), "-60.00", "PLATINUM LULULEMON CREDIT"),
                ],
            },
        ]
    }

    fn context() -> CardContext {
        CardContext {
            now: NaiveDate::from_ymd_opt(2026, 2, 10).unwrap(),
            overage_policy: OveragePolicy::Warn,
        }
    }

    #[test]
    fn test_zero_threads_falls_back_to_default() {
        let strategy = ParallelStrategy::new(ParallelConfig { worker_threads: 0 });
        assert_eq!(strategy.config(), &ParallelConfig::default());
    }

    #[test]
    fn test_matches_sequential_strategy() {
        let catalog = Arc::new(test_catalog());

        let parallel = ParallelStrategy::new(ParallelConfig::new(2))
            .reconcile_cards(&catalog, context(), work())
            .unwrap();
        let sequential = SequentialStrategy
            .reconcile_cards(&catalog, context(), work())
            .unwrap();

        assert_eq!(parallel.len(), 2);
        assert_eq!(parallel[0].card_id, "amex-plat");
        for (p, s) in parallel.iter().zip(&sequential) {
            assert_eq!(p.card_id, s.card_id);
            assert_eq!(p.ledger, s.ledger);
            assert_eq!(p.outcome, s.outcome);
        }
    }

    fn assert_matches_sequential(parallel: Vec<CardResult>) {
        let sequential = SequentialStrategy
            .reconcile_cards(&Arc::new(test_catalog()), context(), work())
            .unwrap();
        assert_eq!(parallel.len(), sequential.len());
        for (p, s) in parallel.iter().zip(&sequential) {
            assert_eq!(p.card_id, s.card_id);
            assert_eq!(p.ledger, s.ledger);
            assert_eq!(p.outcome, s.outcome);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_runs_inside_multi_thread_runtime() {
        let catalog = Arc::new(test_catalog());
        let results = ParallelStrategy::new(ParallelConfig::new(2))
            .reconcile_cards(&catalog, context(), work())
            .unwrap();
        assert_matches_sequential(results);
    }

    #[tokio::test]
    async fn test_runs_inside_current_thread_runtime() {
        let catalog = Arc::new(test_catalog());
        let results = ParallelStrategy::new(ParallelConfig::new(2))
            .reconcile_cards(&catalog, context(), work())
            .unwrap();
        assert_matches_sequential(results);
    }

    #[test]
    fn test_empty_work() {
        let catalog = Arc::new(test_catalog());
        let results = ParallelStrategy::new(ParallelConfig::default())
            .reconcile_cards(&catalog, context(), Vec::new())
            .unwrap();
        assert!(results.is_empty());
    }
}
