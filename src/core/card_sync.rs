//! Per-card reconciliation pipeline
//!
//! Runs one card's slice of a batch through classify, resolve and apply, in
//! reconciliation order, against a working copy of that card's ledger. The
//! reconciler decides whether the working copy is committed.
//!
//! # Anniversary
//!
//! A transaction resolves under the latest fee posted on or before it, else
//! the catalog anniversary. When neither exists and the batch itself carries
//! the card's first fee posting, that posting anchors the transactions before
//! it too, so replaying a full history never falls back to calendar windows
//! the history itself can correct.
//!
//! # Retried credits
//!
//! Unresolved credits from an earlier batch rejoin this one when it brings a
//! new transaction that sorts before them on the same date, which is the
//! order a full replay would have applied them in.
//!
//! # Errors
//!
//! Fatal errors (see [`EngineError::is_fatal`]) abort the card and are
//! returned as-is. Local errors such as an overflowing amount or a date
//! outside the representable range skip the one transaction and are
//! reported in [`CardOutcome::skipped`].

use crate::config::OveragePolicy;
use crate::core::catalog::Catalog;
use crate::core::classifier::{classify, Classification};
use crate::core::ledger::{CardLedger, ChargeOutcome, CreditCandidate, CreditOutcome, LedgerBatch};
use crate::core::period_resolver::{period_bounds, resolve_period};
use crate::types::transaction::reconciliation_order;
use crate::types::{
    AnnualFeeEvent, BenefitId, Card, CardOutcome, EngineError, PeriodDelta, PeriodKey, PeriodRef,
    RejectedCharge, SkipReason, SkippedTransaction, SyncWarning, Transaction, TransactionId,
    UnresolvedCredit,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Inputs shared by every card in a sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardContext {
    /// Sync time; periods ending on or before it may expire
    pub now: NaiveDate,
    pub overage_policy: OveragePolicy,
}

#[derive(Debug, Default)]
struct DeltaAccumulator {
    used_before: Decimal,
    charges: Vec<TransactionId>,
    credits: Vec<TransactionId>,
}

/// Reconcile `transactions` into `ledger`
///
/// `transactions` must all belong to the ledger's card and be sorted in
/// reconciliation order. On error the ledger may be partially updated and
/// should be discarded.
///
/// # Arguments
///
/// * `catalog` - Validated card and benefit definitions
/// * `context` - Sync time and overage policy
/// * `ledger` - Working copy of the card's ledger
/// * `transactions` - The card's slice of the batch
pub fn reconcile_card(
    catalog: &Catalog,
    context: CardContext,
    ledger: &mut CardLedger,
    transactions: &[Transaction],
) -> Result<CardOutcome, EngineError> {
    let Some(card) = catalog.card(ledger.card_id()) else {
        let skipped = transactions
            .iter()
            .map(|transaction| SkippedTransaction {
                card_id: transaction.card_id.clone(),
                transaction_id: transaction.id.clone(),
                skip: SkipReason::UnknownCard,
            })
            .collect();
        return Ok(CardOutcome {
            skipped,
            ..Default::default()
        });
    };

    let anchor_hint = match ledger.anniversary(card) {
        Some(_) => None,
        None => transactions
            .iter()
            .find(|transaction| {
                matches!(classify(transaction, card, catalog), Classification::AnnualFee(_))
            })
            .map(|fee| fee.date),
    };

    let retry = retryable_credits(ledger, transactions);
    let retried = ledger.take_unresolved_credits(&retry);
    let mut ordered: Vec<&Transaction> = transactions.iter().chain(&retried).collect();
    if !retried.is_empty() {
        debug!(card = %card.id, credits = retried.len(), "retrying unresolved credits");
        ordered.sort_by(|a, b| reconciliation_order(a, b));
    }

    let mut run = CardRun::new(card, context, anchor_hint);
    let mut batch = ledger.begin_batch();
    for transaction in ordered {
        match run.apply(catalog, &mut batch, transaction) {
            Ok(()) => {}
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => {
                warn!(card = %card.id, transaction = %transaction.id, %error, "skipping transaction");
                run.outcome.skipped.push(SkippedTransaction {
                    card_id: card.id.clone(),
                    transaction_id: transaction.id.clone(),
                    skip: SkipReason::Error {
                        message: error.to_string(),
                    },
                });
            }
        }
    }
    run.expire(&mut batch);

    Ok(run.finish(ledger))
}

/// Unresolved credits that a new same-date transaction in `transactions`
/// sorts before, so a single replay would have applied it first
fn retryable_credits(ledger: &CardLedger, transactions: &[Transaction]) -> Vec<TransactionId> {
    ledger
        .unresolved_credits()
        .iter()
        .filter(|credit| {
            transactions.iter().any(|transaction| {
                transaction.date == credit.date
                    && !ledger.contains(&transaction.id)
                    && reconciliation_order(transaction, credit) == Ordering::Less
            })
        })
        .map(|credit| credit.id.clone())
        .collect()
}

struct CardRun<'a> {
    card: &'a Card,
    context: CardContext,
    anchor_hint: Option<NaiveDate>,
    outcome: CardOutcome,
    deltas: BTreeMap<(BenefitId, PeriodKey), DeltaAccumulator>,
    fallback_reported: BTreeSet<(BenefitId, PeriodKey)>,
}

impl<'a> CardRun<'a> {
    fn new(card: &'a Card, context: CardContext, anchor_hint: Option<NaiveDate>) -> Self {
        Self {
            card,
            context,
            anchor_hint,
            outcome: CardOutcome::default(),
            deltas: BTreeMap::new(),
            fallback_reported: BTreeSet::new(),
        }
    }

    fn anniversary(&self, batch: &LedgerBatch<'_>) -> Option<NaiveDate> {
        batch.ledger().anniversary(self.card).or(self.anchor_hint)
    }

    fn period_ref(&self, benefit_id: &str, key: PeriodKey) -> PeriodRef {
        PeriodRef {
            card_id: self.card.id.clone(),
            benefit_id: benefit_id.to_string(),
            key,
        }
    }

    fn track(&mut self, benefit_id: &str, key: PeriodKey, used_before: Decimal) -> &mut DeltaAccumulator {
        self.deltas
            .entry((benefit_id.to_string(), key))
            .or_insert_with(|| DeltaAccumulator {
                used_before,
                ..Default::default()
            })
    }

    fn apply(
        &mut self,
        catalog: &Catalog,
        batch: &mut LedgerBatch<'_>,
        transaction: &Transaction,
    ) -> Result<(), EngineError> {
        let classification = classify(transaction, self.card, catalog);
        debug!(
            card = %self.card.id,
            transaction = %transaction.id,
            date = %transaction.date,
            amount = %transaction.amount,
            ?classification,
            "classified"
        );

        match classification {
            Classification::AnnualFee(event) => self.apply_fee(batch, transaction, event),
            Classification::BenefitCharge(benefit_id) => {
                self.apply_charge(catalog, batch, transaction, &benefit_id)
            }
            Classification::BenefitCredit(candidates) => {
                self.apply_credit(catalog, batch, transaction, candidates)
            }
            Classification::Unmatched => {
                self.outcome.unmatched.push(transaction.id.clone());
                Ok(())
            }
        }
    }

    fn apply_fee(
        &mut self,
        batch: &mut LedgerBatch<'_>,
        transaction: &Transaction,
        event: AnnualFeeEvent,
    ) -> Result<(), EngineError> {
        let had_fallback = batch.ledger().has_fallback_periods();
        if !batch.record_fee(transaction, event.clone())? {
            return Ok(());
        }

        info!(
            card = %self.card.id,
            posted = %event.posted,
            next_due = %event.next_due,
            "annual fee detected"
        );
        if had_fallback {
            warn!(
                card = %self.card.id,
                anniversary = %event.posted,
                "anniversary detected after calendar fallback; full resync recommended"
            );
            self.outcome.warnings.push(SyncWarning::AnniversaryDetected {
                card_id: self.card.id.clone(),
                anniversary: event.posted,
            });
            self.outcome.recommend_full_resync = true;
        }
        self.outcome.fee_events.push(event);
        Ok(())
    }

    fn apply_charge(
        &mut self,
        catalog: &Catalog,
        batch: &mut LedgerBatch<'_>,
        transaction: &Transaction,
        benefit_id: &str,
    ) -> Result<(), EngineError> {
        let Some(benefit) = catalog.benefit(benefit_id) else {
            self.outcome.unmatched.push(transaction.id.clone());
            return Ok(());
        };

        let anniversary = self.anniversary(batch);
        let resolved = resolve_period(benefit, anniversary, transaction.date)?;
        let key = resolved.key;
        if resolved.anniversary_unknown {
            batch.note_fallback();
            if self.fallback_reported.insert((benefit.id.clone(), key)) {
                let period = self.period_ref(&benefit.id, key);
                self.outcome
                    .warnings
                    .push(SyncWarning::AnniversaryUnknown { period });
            }
        }

        let policy = self.context.overage_policy;
        match batch.apply_charge(transaction, benefit, key, policy)? {
            ChargeOutcome::Applied { used_before, overage } => {
                self.track(&benefit.id, key, used_before)
                    .charges
                    .push(transaction.id.clone());
                if let Some(overage) = overage {
                    debug!(benefit = %benefit.id, period = %key, %overage, "limit exceeded");
                    if policy == OveragePolicy::Warn {
                        warn!(
                            card = %self.card.id,
                            benefit = %benefit.id,
                            period = %key,
                            %overage,
                            "benefit usage exceeds limit"
                        );
                        let period = self.period_ref(&benefit.id, key);
                        self.outcome.warnings.push(SyncWarning::Overage {
                            period,
                            transaction_id: transaction.id.clone(),
                            overage,
                        });
                    }
                }
            }
            ChargeOutcome::Duplicate => {
                debug!(transaction = %transaction.id, "already applied");
            }
            ChargeOutcome::Rejected { overage } => {
                warn!(
                    card = %self.card.id,
                    benefit = %benefit.id,
                    period = %key,
                    transaction = %transaction.id,
                    %overage,
                    "charge rejected, benefit limit exceeded"
                );
                let period = self.period_ref(&benefit.id, key);
                self.outcome.rejected_charges.push(RejectedCharge {
                    period,
                    transaction_id: transaction.id.clone(),
                    amount: transaction.amount,
                    overage,
                });
            }
        }
        Ok(())
    }

    fn apply_credit(
        &mut self,
        catalog: &Catalog,
        batch: &mut LedgerBatch<'_>,
        transaction: &Transaction,
        candidates: Vec<BenefitId>,
    ) -> Result<(), EngineError> {
        let anniversary = self.anniversary(batch);
        let mut credit_candidates = Vec::with_capacity(candidates.len());
        for benefit_id in &candidates {
            let Some(benefit) = catalog.benefit(benefit_id) else {
                continue;
            };
            let ceiling = resolve_period(benefit, anniversary, transaction.date)?.key;
            credit_candidates.push(CreditCandidate {
                benefit_id: benefit.id.clone(),
                ceiling,
                tolerance: benefit.credit_tolerance,
            });
        }

        match batch.apply_credit(transaction, &credit_candidates)? {
            CreditOutcome::Matched {
                benefit_id,
                key,
                used_before,
            } => {
                debug!(transaction = %transaction.id, benefit = %benefit_id, period = %key, "credit matched");
                self.track(&benefit_id, key, used_before)
                    .credits
                    .push(transaction.id.clone());
            }
            CreditOutcome::Duplicate => {
                debug!(transaction = %transaction.id, "already applied");
            }
            CreditOutcome::Unresolved => {
                warn!(
                    card = %self.card.id,
                    transaction = %transaction.id,
                    amount = %transaction.amount,
                    ?candidates,
                    "credit could not be attributed"
                );
                self.outcome.unresolved_credits.push(UnresolvedCredit {
                    card_id: self.card.id.clone(),
                    transaction_id: transaction.id.clone(),
                    date: transaction.date,
                    amount: transaction.amount.abs(),
                    description: transaction.description.clone(),
                    candidates,
                });
            }
        }
        Ok(())
    }

    fn expire(&mut self, batch: &mut LedgerBatch<'_>) {
        let now = self.context.now;
        let expired = batch.expire(|period| {
            period_bounds(period.key).is_some_and(|bounds| bounds.end <= now)
        });
        for (benefit_id, key) in expired {
            debug!(card = %self.card.id, benefit = %benefit_id, period = %key, "period expired");
            let period = self.period_ref(&benefit_id, key);
            self.outcome.expired.push(period);
        }
    }

    fn finish(mut self, ledger: &CardLedger) -> CardOutcome {
        for ((benefit_id, key), delta) in std::mem::take(&mut self.deltas) {
            let Some(state) = ledger.period(&benefit_id, key) else {
                continue;
            };
            let period = self.period_ref(&benefit_id, key);
            self.outcome.period_deltas.push(PeriodDelta {
                period,
                charges_attributed: delta.charges,
                credits_matched: delta.credits,
                used_before: delta.used_before,
                state: state.clone(),
            });
        }
        self.outcome
    }
}
