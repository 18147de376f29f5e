//! Period resolver
//!
//! Maps a transaction date to the canonical benefit-window key under a
//! card's anniversary rule:
//!
//! - `annual`: the 12-month window starting on the anniversary month/day that
//!   contains the date.
//! - `semiannual`, `quarterly`, `monthly`: that window split evenly into 2, 4
//!   or 12 parts, anchored to the anniversary.
//! - Without a known anniversary, windows are anchored to January 1st and the
//!   result is flagged `anniversary_unknown`.
//!
//! Windows are half-open `[start, end)`: a date equal to `end` belongs to the
//! next window. Resolution is a pure function of (period kind, anniversary,
//! date), which is what makes a full resync reproduce incremental results.
//! The resulting key records its anchor, so its bounds never depend on the
//! card's current anniversary.
//!
//! Anniversaries on days a later month lacks (the 29th to 31st) clamp to that
//! month's last day; each window start is computed from the original anchor,
//! so clamping never drifts.

use crate::types::{Benefit, EngineError, PeriodAnchor, PeriodKey, PeriodKind};
use chrono::{Datelike, NaiveDate};

/// A resolved key plus whether the calendar fallback was used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPeriod {
    pub key: PeriodKey,
    pub anniversary_unknown: bool,
}

/// Half-open date range of a benefit window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodBounds {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodBounds {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

/// The anchor date `offset_months` after the start of `cycle_year`'s cycle
fn anchor_date(anchor: PeriodAnchor, cycle_year: i32, offset_months: u32) -> Option<NaiveDate> {
    let total = anchor.month.checked_sub(1)? + offset_months;
    let year = cycle_year.checked_add(i32::try_from(total / 12).ok()?)?;
    let month = total % 12 + 1;
    (1..=anchor.day)
        .rev()
        .find_map(|day| NaiveDate::from_ymd_opt(year, month, day))
}

/// Resolve the window of `benefit` containing `date`
///
/// `anniversary` is the card's effective anniversary (latest fee posting,
/// else the catalog value), `None` when unknown.
pub fn resolve_period(
    benefit: &Benefit,
    anniversary: Option<NaiveDate>,
    date: NaiveDate,
) -> Result<ResolvedPeriod, EngineError> {
    resolve_key(benefit.period, anniversary, date)
}

/// Resolve a window key for a bare period kind
pub fn resolve_key(
    kind: PeriodKind,
    anniversary: Option<NaiveDate>,
    date: NaiveDate,
) -> Result<ResolvedPeriod, EngineError> {
    let out_of_range = || EngineError::DateOutOfRange { date };
    let anchor = PeriodAnchor::from_anniversary(anniversary);

    let mut cycle_year = date.year();
    let cycle_start = anchor_date(anchor, cycle_year, 0).ok_or_else(out_of_range)?;
    if date < cycle_start {
        cycle_year = cycle_year.checked_sub(1).ok_or_else(out_of_range)?;
    }

    let months = kind.months();
    let mut index = 1;
    for i in (0..kind.periods_per_year()).rev() {
        let start = anchor_date(anchor, cycle_year, i * months).ok_or_else(out_of_range)?;
        if start <= date {
            index = i + 1;
            break;
        }
    }

    Ok(ResolvedPeriod {
        key: PeriodKey {
            cycle_year,
            index,
            kind,
            anchor,
        },
        anniversary_unknown: anniversary.is_none(),
    })
}

/// Recompute a key's `[start, end)` range from the anchor it was resolved under
///
/// `None` when the key's index is outside its kind's range or the dates are
/// not representable.
pub fn period_bounds(key: PeriodKey) -> Option<PeriodBounds> {
    if key.index == 0 || key.index > key.kind.periods_per_year() {
        return None;
    }
    let months = key.kind.months();
    Some(PeriodBounds {
        start: anchor_date(key.anchor, key.cycle_year, (key.index - 1) * months)?,
        end: anchor_date(key.anchor, key.cycle_year, key.index * months)?,
    })
}
