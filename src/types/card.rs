//! Card-related types
//!
//! Cards are owned by the catalog and immutable for the duration of a sync
//! run. Annual-fee postings detected during reconciliation are recorded as
//! [`AnnualFeeEvent`]s in the card's ledger rather than mutating the card.

use super::benefit::MatchRule;
use super::transaction::TransactionId;
use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Card identifier
pub type CardId = String;

/// Rule recognizing a card's annual fee posting
#[derive(Debug, Clone)]
pub struct FeePattern {
    /// Description rule for the fee line
    pub rule: MatchRule,

    /// Amount the fee is expected to post at
    pub expected_amount: Decimal,

    /// Allowed absolute difference from `expected_amount`
    pub tolerance: Decimal,
}

impl FeePattern {
    /// Whether a charge amount falls inside this pattern's tolerance band
    pub fn accepts_amount(&self, amount: Decimal) -> bool {
        (amount - self.expected_amount).abs() <= self.tolerance
    }
}

/// A tracked credit card
#[derive(Debug, Clone)]
pub struct Card {
    pub id: CardId,

    /// Human-readable name, for reports
    pub name: String,

    /// Annual fee as published
    pub annual_fee: Decimal,

    /// Rules recognizing the annual fee posting
    pub fee_patterns: Vec<FeePattern>,

    /// Date of the last known fee posting, if any
    ///
    /// Benefit periods are anchored to this date. When unknown they fall back
    /// to the calendar year.
    pub anniversary: Option<NaiveDate>,
}

/// A detected annual fee posting
///
/// Appended to the card ledger's fee history; the most recent event is the
/// card's effective anniversary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnualFeeEvent {
    pub card_id: CardId,

    /// Transaction the fee was detected on
    pub transaction_id: TransactionId,

    /// Posting date
    pub posted: NaiveDate,

    pub amount: Decimal,

    /// Posting date plus one year
    pub next_due: NaiveDate,
}

impl AnnualFeeEvent {
    /// Build an event, computing the next due date
    ///
    /// Returns `None` only when the due date would overflow the calendar.
    pub fn new(
        card_id: &str,
        transaction_id: &str,
        posted: NaiveDate,
        amount: Decimal,
    ) -> Option<Self> {
        let next_due = posted.checked_add_months(Months::new(12))?;
        Some(Self {
            card_id: card_id.to_string(),
            transaction_id: transaction_id.to_string(),
            posted,
            amount,
            next_due,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::benefit::MatchKind;

    #[test]
    fn test_fee_event_next_due_is_one_year_later() {
        let posted = NaiveDate::from_ymd_opt(2025, 1, 22).unwrap();
        let event = AnnualFeeEvent::new("amex-plat", "t-1", posted, Decimal::new(69500, 2)).unwrap();
        assert_eq!(event.next_due, NaiveDate::from_ymd_opt(2026, 1, 22).unwrap());
    }

    #[test]
    fn test_fee_event_leap_day_clamps() {
        let posted = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let event = AnnualFeeEvent::new("c", "t", posted, Decimal::ONE).unwrap();
        assert_eq!(event.next_due, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
    }

    #[test]
    fn test_fee_pattern_tolerance_band() {
        let pattern = FeePattern {
            rule: MatchRule::new("c", "annual fee", MatchKind::Contains).unwrap(),
            expected_amount: Decimal::new(69500, 2),
            tolerance: Decimal::ONE,
        };
        assert!(pattern.accepts_amount(Decimal::new(69500, 2)));
        assert!(pattern.accepts_amount(Decimal::new(69400, 2)));
        assert!(pattern.accepts_amount(Decimal::new(69600, 2)));
        assert!(!pattern.accepts_amount(Decimal::new(69601, 2)));
        assert!(!pattern.accepts_amount(Decimal::new(32500, 2)));
    }
}
