//! Sequential reconcile strategy
//!
//! Reconciles cards one after another on the calling thread. The reference
//! behaviour the parallel strategy is checked against.

use crate::core::card_sync::{reconcile_card, CardContext};
use crate::core::catalog::Catalog;
use crate::strategy::{CardResult, CardWork, ReconcileStrategy};
use crate::types::EngineError;
use std::sync::Arc;

/// Single-threaded strategy
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialStrategy;

impl ReconcileStrategy for SequentialStrategy {
    fn reconcile_cards(
        &self,
        catalog: &Arc<Catalog>,
        context: CardContext,
        mut work: Vec<CardWork>,
    ) -> Result<Vec<CardResult>, EngineError> {
        work.sort_by(|a, b| a.card_id.cmp(&b.card_id));

        let mut results = Vec::with_capacity(work.len());
        for CardWork {
            card_id,
            mut ledger,
            transactions,
        } in work
        {
            let outcome = reconcile_card(catalog, context, &mut ledger, &transactions)?;
            results.push(CardResult {
                card_id,
                ledger,
                outcome,
            });
        }
        Ok(results)
    }
}
