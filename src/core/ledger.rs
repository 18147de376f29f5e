//! Usage ledger
//!
//! This module provides the `CardLedger`, the mutable per-card state: usage
//! periods per benefit, the annual fee history, and a card-wide index of
//! which period each transaction was attributed to.
//!
//! The ledger is responsible for:
//! - Applying classified, period-resolved transactions as idempotent updates
//! - Enforcing the no-double-counting invariant: a transaction id is
//!   attributed to at most one period on the card
//! - Resolving ambiguous credits by greedy best-fit over candidate periods
//! - Enforcing date-ordered application within a pass
//!
//! # Atomicity
//!
//! Every update computes the new period value first, with checked
//! arithmetic, and only then writes it back together with the index entry.
//! A failed update leaves the ledger untouched.
//!
//! # Ordering
//!
//! Updates go through a [`LedgerBatch`], which rejects a transaction dated
//! before one already applied in the same pass. Ordering is enforced per
//! pass, not across passes: a later incremental batch may legitimately carry
//! late-posted data, which the reconciler flags as a conflict instead.

use crate::config::OveragePolicy;
use crate::core::period_resolver::period_bounds;
use crate::types::{
    AnnualFeeEvent, Benefit, BenefitId, Card, CardId, Contribution, ContributionKind, EngineError,
    PeriodKey, Transaction, TransactionId, UsagePeriod, UsageStatus,
};
use crate::types::transaction::reconciliation_order;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Where a transaction was attributed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub benefit_id: BenefitId,
    pub key: PeriodKey,
}

/// Result of applying a benefit charge
#[derive(Debug, Clone, PartialEq)]
pub enum ChargeOutcome {
    /// Usage increased; `overage` is set when usage now exceeds the limit
    Applied {
        used_before: Decimal,
        overage: Option<Decimal>,
    },
    /// Transaction already attributed; nothing changed
    Duplicate,
    /// Refused under [`OveragePolicy::Reject`]
    Rejected { overage: Decimal },
}

/// Result of applying a statement credit
#[derive(Debug, Clone, PartialEq)]
pub enum CreditOutcome {
    Matched {
        benefit_id: BenefitId,
        key: PeriodKey,
        used_before: Decimal,
    },
    /// Transaction already attributed; nothing changed
    Duplicate,
    /// No candidate period could absorb the credit
    Unresolved,
}

/// A benefit a credit may belong to
///
/// `ceiling` is the credit date's own window for that benefit; only periods
/// starting no later than it are considered.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditCandidate {
    pub benefit_id: BenefitId,
    pub ceiling: PeriodKey,
    pub tolerance: Decimal,
}

/// Persisted form of a card ledger; the attribution index is rebuilt on load
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CardLedgerRecord {
    card_id: CardId,
    periods: BTreeMap<BenefitId, Vec<UsagePeriod>>,
    fee_history: Vec<AnnualFeeEvent>,
    #[serde(default)]
    unattributed: BTreeSet<TransactionId>,
    #[serde(default)]
    unresolved_credits: Vec<Transaction>,
    #[serde(default)]
    fallback_periods: bool,
}

/// Per-card usage state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CardLedgerRecord", into = "CardLedgerRecord")]
pub struct CardLedger {
    card_id: CardId,

    /// Usage periods per benefit, sorted by key
    periods: BTreeMap<BenefitId, Vec<UsagePeriod>>,

    /// Append-only fee history, sorted by posting date
    fee_history: Vec<AnnualFeeEvent>,

    /// Charges seen but refused under the reject overage policy
    unattributed: BTreeSet<TransactionId>,

    /// Credits no period could absorb, in reconciliation order; kept whole so
    /// a later batch can retry them
    unresolved_credits: Vec<Transaction>,

    /// Whether any period was resolved with the calendar fallback
    fallback_periods: bool,

    attributions: HashMap<TransactionId, Attribution>,
}

impl From<CardLedgerRecord> for CardLedger {
    fn from(record: CardLedgerRecord) -> Self {
        let mut periods = record.periods;
        for list in periods.values_mut() {
            list.sort_by_key(|period| period.key);
        }

        let mut attributions = HashMap::new();
        for (benefit_id, list) in &periods {
            for period in list {
                for contribution in &period.contributions {
                    attributions
                        .entry(contribution.transaction_id.clone())
                        .or_insert_with(|| Attribution {
                            benefit_id: benefit_id.clone(),
                            key: period.key,
                        });
                }
            }
        }

        let mut fee_history = record.fee_history;
        fee_history.sort_by_key(|event| event.posted);

        let mut unresolved_credits = record.unresolved_credits;
        unresolved_credits.sort_by(reconciliation_order);

        Self {
            card_id: record.card_id,
            periods,
            fee_history,
            unattributed: record.unattributed,
            unresolved_credits,
            fallback_periods: record.fallback_periods,
            attributions,
        }
    }
}

impl From<CardLedger> for CardLedgerRecord {
    fn from(ledger: CardLedger) -> Self {
        Self {
            card_id: ledger.card_id,
            periods: ledger.periods,
            fee_history: ledger.fee_history,
            unattributed: ledger.unattributed,
            unresolved_credits: ledger.unresolved_credits,
            fallback_periods: ledger.fallback_periods,
        }
    }
}

impl CardLedger {
    /// Empty ledger for a card
    pub fn new(card_id: &str) -> Self {
        Self {
            card_id: card_id.to_string(),
            periods: BTreeMap::new(),
            fee_history: Vec::new(),
            unattributed: BTreeSet::new(),
            unresolved_credits: Vec::new(),
            fallback_periods: false,
            attributions: HashMap::new(),
        }
    }

    pub fn card_id(&self) -> &str {
        &self.card_id
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty() && self.fee_history.is_empty()
    }

    /// Effective anniversary: latest fee posting, else the catalog value
    pub fn anniversary(&self, card: &Card) -> Option<NaiveDate> {
        self.fee_history
            .last()
            .map(|event| event.posted)
            .or(card.anniversary)
    }

    /// Next annual fee due date, from the latest fee posting
    pub fn next_fee_due(&self) -> Option<NaiveDate> {
        self.fee_history.last().map(|event| event.next_due)
    }

    pub fn fee_history(&self) -> &[AnnualFeeEvent] {
        &self.fee_history
    }

    pub fn has_fallback_periods(&self) -> bool {
        self.fallback_periods
    }

    /// All periods, grouped by benefit id then ordered by key
    pub fn periods(&self) -> impl Iterator<Item = &UsagePeriod> {
        self.periods.values().flatten()
    }

    /// Periods of one benefit, ordered by key
    pub fn periods_for(&self, benefit_id: &str) -> &[UsagePeriod] {
        self.periods
            .get(benefit_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn period(&self, benefit_id: &str, key: PeriodKey) -> Option<&UsagePeriod> {
        self.periods_for(benefit_id)
            .binary_search_by_key(&key, |period| period.key)
            .ok()
            .map(|i| &self.periods[benefit_id][i])
    }

    /// Where a transaction was attributed, if anywhere
    pub fn attribution(&self, transaction_id: &str) -> Option<&Attribution> {
        self.attributions.get(transaction_id)
    }

    /// Whether a transaction was seen and left out (unresolved or rejected)
    pub fn is_unattributed(&self, transaction_id: &str) -> bool {
        self.unattributed.contains(transaction_id) || self.is_unresolved_credit(transaction_id)
    }

    /// Credits still waiting for a period, in reconciliation order
    pub fn unresolved_credits(&self) -> &[Transaction] {
        &self.unresolved_credits
    }

    fn is_unresolved_credit(&self, transaction_id: &str) -> bool {
        self.unresolved_credits
            .iter()
            .any(|credit| credit.id == transaction_id)
    }

    /// Remove the unresolved credits with the given ids so they can be
    /// applied again; returns them in reconciliation order
    pub fn take_unresolved_credits(&mut self, ids: &[TransactionId]) -> Vec<Transaction> {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.unresolved_credits)
            .into_iter()
            .partition(|credit| ids.contains(&credit.id));
        self.unresolved_credits = kept;
        taken
    }

    /// Whether a transaction has already been consumed by this ledger
    pub fn contains(&self, transaction_id: &str) -> bool {
        self.attributions.contains_key(transaction_id)
            || self.is_unattributed(transaction_id)
            || self
                .fee_history
                .iter()
                .any(|event| event.transaction_id == transaction_id)
    }

    /// Start a date-ordered application pass
    pub fn begin_batch(&mut self) -> LedgerBatch<'_> {
        LedgerBatch {
            ledger: self,
            watermark: None,
        }
    }

    fn store_period(&mut self, period: UsagePeriod) {
        let list = self.periods.entry(period.benefit_id.clone()).or_default();
        match list.binary_search_by_key(&period.key, |existing| existing.key) {
            Ok(i) => list[i] = period,
            Err(i) => list.insert(i, period),
        }
    }
}

/// A single date-ordered application pass over a [`CardLedger`]
#[derive(Debug)]
pub struct LedgerBatch<'a> {
    ledger: &'a mut CardLedger,
    watermark: Option<NaiveDate>,
}

impl LedgerBatch<'_> {
    /// Read access to the ledger mid-pass
    pub fn ledger(&self) -> &CardLedger {
        self.ledger
    }

    fn admit(&mut self, transaction: &Transaction) -> Result<(), EngineError> {
        if let Some(watermark) = self.watermark {
            if transaction.date < watermark {
                return Err(EngineError::out_of_order(
                    &self.ledger.card_id,
                    &transaction.id,
                    transaction.date,
                    watermark,
                ));
            }
        }
        self.watermark = Some(transaction.date);
        Ok(())
    }

    /// Record that a period was resolved with the calendar fallback
    pub fn note_fallback(&mut self) {
        self.ledger.fallback_periods = true;
    }

    /// Apply an eligible charge to `benefit`'s period `key`
    ///
    /// # Errors
    ///
    /// - `OutOfOrderApplication` if the charge predates the pass watermark
    /// - `ArithmeticOverflow` if usage cannot be represented
    pub fn apply_charge(
        &mut self,
        transaction: &Transaction,
        benefit: &Benefit,
        key: PeriodKey,
        policy: OveragePolicy,
    ) -> Result<ChargeOutcome, EngineError> {
        self.admit(transaction)?;
        if self.ledger.contains(&transaction.id) {
            return Ok(ChargeOutcome::Duplicate);
        }

        let mut period = self
            .ledger
            .period(&benefit.id, key)
            .cloned()
            .unwrap_or_else(|| UsagePeriod::new(&benefit.id, key, benefit.limit));
        let used_before = period.used;
        let overflow = || EngineError::arithmetic_overflow("charge", &transaction.id);

        let used = period.used.checked_add(transaction.amount).ok_or_else(overflow)?;
        let charged = period.charged.checked_add(transaction.amount).ok_or_else(overflow)?;
        let overage = used
            .checked_sub(period.limit)
            .ok_or_else(overflow)?
            .max(Decimal::ZERO);

        if overage > Decimal::ZERO && policy == OveragePolicy::Reject {
            self.ledger.unattributed.insert(transaction.id.clone());
            return Ok(ChargeOutcome::Rejected { overage });
        }

        period.used = used;
        period.charged = charged;
        if overage > Decimal::ZERO {
            period.overage = Some(overage);
        }
        period.contributions.push(Contribution {
            transaction_id: transaction.id.clone(),
            date: transaction.date,
            amount: transaction.amount,
            kind: ContributionKind::Charge,
        });
        period.status = period.charge_status();

        self.commit(transaction, period);
        Ok(ChargeOutcome::Applied {
            used_before,
            overage: (overage > Decimal::ZERO).then_some(overage),
        })
    }

    /// Attribute a statement credit by greedy best-fit
    ///
    /// For each candidate benefit, the latest-starting period that starts no
    /// later than its ceiling window is considered. A period fits when its usage minus the credit
    /// stays at or above `-tolerance`; among fitting periods the one left
    /// closest to zero wins, ties going to the earlier candidate. Usage is
    /// floored at zero and the status is left as charges set it.
    ///
    /// # Errors
    ///
    /// - `OutOfOrderApplication` if the credit predates the pass watermark
    /// - `ArithmeticOverflow` if usage cannot be represented
    pub fn apply_credit(
        &mut self,
        transaction: &Transaction,
        candidates: &[CreditCandidate],
    ) -> Result<CreditOutcome, EngineError> {
        self.admit(transaction)?;
        if self.ledger.contains(&transaction.id) {
            return Ok(CreditOutcome::Duplicate);
        }

        let credit = transaction.amount.abs();
        let overflow = || EngineError::arithmetic_overflow("credit", &transaction.id);

        let mut best: Option<(Decimal, Decimal, &UsagePeriod)> = None;
        for candidate in candidates {
            let Some(ceiling) = period_bounds(candidate.ceiling) else {
                continue;
            };
            let Some(period) = self
                .ledger
                .periods_for(&candidate.benefit_id)
                .iter()
                .filter_map(|period| Some((period_bounds(period.key)?.start, period)))
                .filter(|(start, _)| *start <= ceiling.start)
                .max_by_key(|(start, _)| *start)
                .map(|(_, period)| period)
            else {
                continue;
            };

            let remaining = period.used.checked_sub(credit).ok_or_else(overflow)?;
            if remaining < -candidate.tolerance {
                continue;
            }
            let distance = remaining.abs();
            match best {
                Some((best_distance, _, _)) if best_distance <= distance => {}
                _ => best = Some((distance, remaining, period)),
            }
        }

        let chosen = best.map(|(_, remaining, period)| (remaining, period.clone()));
        let Some((remaining, mut period)) = chosen else {
            let credits = &mut self.ledger.unresolved_credits;
            let position = credits.partition_point(|existing| {
                reconciliation_order(existing, transaction) == Ordering::Less
            });
            credits.insert(position, transaction.clone());
            return Ok(CreditOutcome::Unresolved);
        };

        let used_before = period.used;
        period.used = remaining.max(Decimal::ZERO);
        period.credited = period.credited.checked_add(credit).ok_or_else(overflow)?;
        period.contributions.push(Contribution {
            transaction_id: transaction.id.clone(),
            date: transaction.date,
            amount: credit,
            kind: ContributionKind::Credit,
        });

        let outcome = CreditOutcome::Matched {
            benefit_id: period.benefit_id.clone(),
            key: period.key,
            used_before,
        };
        self.commit(transaction, period);
        Ok(outcome)
    }

    /// Append an annual fee posting; returns false for a replayed one
    pub fn record_fee(
        &mut self,
        transaction: &Transaction,
        event: AnnualFeeEvent,
    ) -> Result<bool, EngineError> {
        self.admit(transaction)?;
        if self.ledger.contains(&transaction.id) {
            return Ok(false);
        }
        let history = &mut self.ledger.fee_history;
        let position = history.partition_point(|existing| existing.posted <= event.posted);
        history.insert(position, event);
        Ok(true)
    }

    /// Mark ended periods that never reached their limit as expired
    ///
    /// `has_ended` decides per period; returns the newly expired periods.
    pub fn expire(&mut self, has_ended: impl Fn(&UsagePeriod) -> bool) -> Vec<(BenefitId, PeriodKey)> {
        let mut expired = Vec::new();
        for period in self.ledger.periods.values_mut().flatten() {
            let expirable = matches!(period.status, UsageStatus::Open | UsageStatus::PartiallyUsed);
            if expirable && has_ended(period) {
                period.status = UsageStatus::Expired;
                expired.push((period.benefit_id.clone(), period.key));
            }
        }
        expired
    }

    fn commit(&mut self, transaction: &Transaction, period: UsagePeriod) {
        self.ledger.attributions.insert(
            transaction.id.clone(),
            Attribution {
                benefit_id: period.benefit_id.clone(),
                key: period.key,
            },
        );
        self.ledger.store_period(period);
    }
}
