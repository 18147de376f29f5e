//! Usage period types
//!
//! A [`UsagePeriod`] is the mutable state of one benefit within one benefit
//! window. Its start and end dates are not stored; they are recomputed from
//! the [`PeriodKey`], which carries the anniversary anchor the window was
//! resolved under, by the period resolver.

use super::benefit::{BenefitId, PeriodKind};
use super::transaction::TransactionId;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Month and day a card's benefit cycle starts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeriodAnchor {
    pub month: u32,
    pub day: u32,
}

impl PeriodAnchor {
    /// January 1st, used while the anniversary is unknown
    pub const CALENDAR: PeriodAnchor = PeriodAnchor { month: 1, day: 1 };

    pub fn from_anniversary(anniversary: Option<NaiveDate>) -> Self {
        match anniversary {
            Some(date) => PeriodAnchor {
                month: date.month(),
                day: date.day(),
            },
            None => Self::CALENDAR,
        }
    }
}

impl Default for PeriodAnchor {
    fn default() -> Self {
        Self::CALENDAR
    }
}

/// Canonical benefit-window key
///
/// `cycle_year` is the year in which the anniversary cycle containing the
/// window starts, `index` is the 1-based window number within that cycle.
/// `anchor` is the cycle start the key was resolved under, so a key keeps
/// describing the same dates after the card's anniversary moves. Keys with
/// the same anchor order naturally by (cycle_year, index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeriodKey {
    pub cycle_year: i32,
    pub index: u32,
    pub kind: PeriodKind,
    #[serde(default)]
    pub anchor: PeriodAnchor,
}

impl fmt::Display for PeriodKey {
    /// `2026`, `2026-H1`, `2026-Q1` or `2026-01`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PeriodKind::Annual => write!(f, "{}", self.cycle_year),
            PeriodKind::Semiannual => write!(f, "{}-H{}", self.cycle_year, self.index),
            PeriodKind::Quarterly => write!(f, "{}-Q{}", self.cycle_year, self.index),
            PeriodKind::Monthly => write!(f, "{}-{:02}", self.cycle_year, self.index),
        }
    }
}

/// Lifecycle of a usage period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UsageStatus {
    /// Created, nothing charged yet
    Open,
    /// Some eligible spend, below the limit
    PartiallyUsed,
    /// Eligible spend reached the limit
    FullyUsed,
    /// Window ended before the limit was reached
    Expired,
}

/// Which side of the benefit a contribution came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContributionKind {
    Charge,
    Credit,
}

/// A transaction attributed to a usage period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub transaction_id: TransactionId,
    pub date: NaiveDate,
    /// Absolute amount applied
    pub amount: Decimal,
    pub kind: ContributionKind,
}

/// Per benefit-window usage state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsagePeriod {
    pub benefit_id: BenefitId,
    pub key: PeriodKey,

    /// Benefit limit at the time the period was created
    pub limit: Decimal,

    /// Net usage: charges minus matched credits, never negative
    pub used: Decimal,

    /// Gross eligible charges
    pub charged: Decimal,

    /// Gross matched credits
    pub credited: Decimal,

    /// How far usage exceeded the limit at the last charge that overran it
    ///
    /// Kept after credits reduce `used`, as a note on the period.
    pub overage: Option<Decimal>,

    pub status: UsageStatus,

    /// Every transaction applied to this period, in application order
    pub contributions: Vec<Contribution>,
}

impl UsagePeriod {
    /// Empty period, created lazily on the first matching charge
    pub fn new(benefit_id: &str, key: PeriodKey, limit: Decimal) -> Self {
        Self {
            benefit_id: benefit_id.to_string(),
            key,
            limit,
            used: Decimal::ZERO,
            charged: Decimal::ZERO,
            credited: Decimal::ZERO,
            overage: None,
            status: UsageStatus::Open,
            contributions: Vec::new(),
        }
    }

    pub fn contains(&self, transaction_id: &str) -> bool {
        self.contributions
            .iter()
            .any(|c| c.transaction_id == transaction_id)
    }

    /// Benefit allowance not yet spent in this window
    pub fn remaining(&self) -> Decimal {
        (self.limit - self.charged).max(Decimal::ZERO)
    }

    /// Eligible spend that has not been reimbursed yet
    pub fn pending_credit(&self) -> Decimal {
        (self.charged.min(self.limit) - self.credited).max(Decimal::ZERO)
    }

    /// Status implied by gross charges alone
    pub(crate) fn charge_status(&self) -> UsageStatus {
        if self.charged >= self.limit {
            UsageStatus::FullyUsed
        } else if self.charged > Decimal::ZERO {
            UsageStatus::PartiallyUsed
        } else {
            UsageStatus::Open
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn key(kind: PeriodKind, cycle_year: i32, index: u32) -> PeriodKey {
        PeriodKey {
            cycle_year,
            index,
            kind,
            anchor: PeriodAnchor::CALENDAR,
        }
    }

    #[rstest]
    #[case(key(PeriodKind::Annual, 2026, 1), "2026")]
    #[case(key(PeriodKind::Semiannual, 2026, 2), "2026-H2")]
    #[case(key(PeriodKind::Quarterly, 2026, 1), "2026-Q1")]
    #[case(key(PeriodKind::Monthly, 2025, 12), "2025-12")]
    #[case(key(PeriodKind::Monthly, 2026, 1), "2026-01")]
    fn test_key_display(#[case] key: PeriodKey, #[case] expected: &str) {
        assert_eq!(key.to_string(), expected);
    }

    #[test]
    fn test_key_ordering_follows_cycle_then_index() {
        let a = key(PeriodKind::Monthly, 2025, 12);
        let b = key(PeriodKind::Monthly, 2026, 1);
        let c = key(PeriodKind::Monthly, 2026, 2);
        assert!(a < b && b < c);
    }

    #[rstest]
    #[case(None, PeriodAnchor::CALENDAR)]
    #[case(NaiveDate::from_ymd_opt(2025, 1, 22), PeriodAnchor { month: 1, day: 22 })]
    #[case(NaiveDate::from_ymd_opt(2026, 3, 15), PeriodAnchor { month: 3, day: 15 })]
    fn test_anchor_from_anniversary(#[case] anniversary: Option<NaiveDate>, #[case] expected: PeriodAnchor) {
        assert_eq!(PeriodAnchor::from_anniversary(anniversary), expected);
    }

    #[test]
    fn test_remaining_and_pending_credit() {
        let mut period = UsagePeriod::new("lululemon", key(PeriodKind::Quarterly, 2026, 1), Decimal::new(75, 0));
        period.charged = Decimal::new(92, 0);
        period.used = Decimal::new(17, 0);
        period.credited = Decimal::new(75, 0);
        assert_eq!(period.remaining(), Decimal::ZERO);
        assert_eq!(period.pending_credit(), Decimal::ZERO);

        period.charged = Decimal::new(40, 0);
        period.credited = Decimal::new(10, 0);
        assert_eq!(period.remaining(), Decimal::new(35, 0));
        assert_eq!(period.pending_credit(), Decimal::new(30, 0));
    }

    #[rstest]
    #[case(0, UsageStatus::Open)]
    #[case(10, UsageStatus::PartiallyUsed)]
    #[case(75, UsageStatus::FullyUsed)]
    #[case(92, UsageStatus::FullyUsed)]
    fn test_charge_status(#[case] charged: i64, #[case] expected: UsageStatus) {
        let mut period = UsagePeriod::new("b", key(PeriodKind::Monthly, 2026, 1), Decimal::new(75, 0));
        period.charged = Decimal::new(charged, 0);
        assert_eq!(period.charge_status(), expected);
    }
}
