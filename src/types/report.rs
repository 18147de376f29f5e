//! Reconciliation results handed to the presentation layer
//!
//! Non-fatal conditions (ambiguous credits, out-of-order data, calendar
//! fallbacks, overages) are surfaced here as records, never as errors.

use super::benefit::BenefitId;
use super::card::{AnnualFeeEvent, CardId};
use super::period::{PeriodKey, UsagePeriod, UsageStatus};
use super::sync::{SourceId, SyncCursor, SyncMode, SyncStatus};
use super::transaction::TransactionId;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Address of a usage period across the whole snapshot
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeriodRef {
    pub card_id: CardId,
    pub benefit_id: BenefitId,
    pub key: PeriodKey,
}

/// What one sync changed on one usage period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodDelta {
    pub period: PeriodRef,

    /// Charges newly attributed in this sync
    pub charges_attributed: Vec<TransactionId>,

    /// Credits newly matched in this sync
    pub credits_matched: Vec<TransactionId>,

    /// Net usage before the first change in this sync (zero for new periods)
    pub used_before: Decimal,

    /// Period state after the sync
    pub state: UsagePeriod,
}

/// A credit that could not be attributed with confidence
///
/// Reported, never discarded; the ledger is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedCredit {
    pub card_id: CardId,
    pub transaction_id: TransactionId,
    pub date: NaiveDate,

    /// Absolute credit amount
    pub amount: Decimal,

    pub description: String,

    /// Benefits whose credit rules matched; empty when none of them had a
    /// period to credit
    pub candidates: Vec<BenefitId>,
}

/// Out-of-order data in an incremental batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    pub card_id: CardId,
    pub transaction_id: TransactionId,
    pub date: NaiveDate,

    /// Cursor the transaction predates
    pub cursor: NaiveDate,
}

/// Why a transaction was left out of the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "reason")]
pub enum SkipReason {
    /// Card id not present in the catalog
    UnknownCard,
    /// A local error (overflow, date range), rendered
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTransaction {
    pub card_id: CardId,
    pub transaction_id: TransactionId,
    pub skip: SkipReason,
}

/// A charge refused under the `reject` overage policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedCharge {
    pub period: PeriodRef,
    pub transaction_id: TransactionId,
    pub amount: Decimal,

    /// Amount by which the charge would have exceeded the limit
    pub overage: Decimal,
}

/// Informational notices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum SyncWarning {
    /// Period resolved with the calendar-year fallback
    AnniversaryUnknown { period: PeriodRef },

    /// A fee posting fixed the anniversary of a card that had fallback periods
    AnniversaryDetected { card_id: CardId, anniversary: NaiveDate },

    /// Usage exceeded the benefit limit
    Overage {
        period: PeriodRef,
        transaction_id: TransactionId,
        overage: Decimal,
    },
}

/// Everything one card's reconciliation produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardOutcome {
    pub period_deltas: Vec<PeriodDelta>,
    pub unresolved_credits: Vec<UnresolvedCredit>,
    pub fee_events: Vec<AnnualFeeEvent>,
    pub rejected_charges: Vec<RejectedCharge>,
    pub unmatched: Vec<TransactionId>,
    pub skipped: Vec<SkippedTransaction>,
    pub expired: Vec<PeriodRef>,
    pub warnings: Vec<SyncWarning>,
    pub recommend_full_resync: bool,
}

impl CardOutcome {
    /// Fold another card's outcome into this one
    pub fn merge(&mut self, other: CardOutcome) {
        self.period_deltas.extend(other.period_deltas);
        self.unresolved_credits.extend(other.unresolved_credits);
        self.fee_events.extend(other.fee_events);
        self.rejected_charges.extend(other.rejected_charges);
        self.unmatched.extend(other.unmatched);
        self.skipped.extend(other.skipped);
        self.expired.extend(other.expired);
        self.warnings.extend(other.warnings);
        self.recommend_full_resync |= other.recommend_full_resync;
    }
}

/// Result of one sync for one data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub source: SourceId,
    pub mode: SyncMode,
    pub status: SyncStatus,

    /// Cursor before the sync
    pub previous_cursor: SyncCursor,

    /// Cursor after the sync; equal to `previous_cursor` when conflicted
    pub cursor: SyncCursor,

    /// Number of transactions fed through the pipeline
    pub processed: usize,

    pub conflicts: Vec<SyncConflict>,

    #[serde(flatten)]
    pub outcome: CardOutcome,
}

impl SyncReport {
    /// Periods touched by the sync whose status is `status`
    pub fn periods_with_status(&self, status: UsageStatus) -> impl Iterator<Item = &PeriodDelta> {
        self.outcome
            .period_deltas
            .iter()
            .filter(move |delta| delta.state.status == status)
    }

    /// Delta for a specific period, if the sync touched it
    pub fn delta_for(&self, card_id: &str, benefit_id: &str, key: PeriodKey) -> Option<&PeriodDelta> {
        self.outcome.period_deltas.iter().find(|delta| {
            delta.period.card_id == card_id
                && delta.period.benefit_id == benefit_id
                && delta.period.key == key
        })
    }

    pub fn is_conflicted(&self) -> bool {
        self.status == SyncStatus::Conflicted
    }
}
