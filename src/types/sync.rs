//! Sync-state types: cursors, modes and the reconciler state machine

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Data source identifier (a budgeting API account, a statement importer...)
pub type SourceId = String;

/// Per-source record of how far reconciliation has progressed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub source: SourceId,

    /// Last successfully reconciled date; `None` before the first sync
    pub last_reconciled: Option<NaiveDate>,
}

impl SyncCursor {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            last_reconciled: None,
        }
    }

    /// Cursor moved forward to `date`, never backwards
    pub fn advanced_to(&self, date: NaiveDate) -> Self {
        let last_reconciled = match self.last_reconciled {
            Some(current) if current > date => current,
            _ => date,
        };
        Self {
            source: self.source.clone(),
            last_reconciled: Some(last_reconciled),
        }
    }
}

/// Incremental syncs fetch from the cursor; full syncs rebuild from scratch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Incremental,
    Full,
}

/// Reconciler state machine
///
/// `Idle -> Fetching -> Reconciling -> {Committed, Conflicted}`; a fatal error
/// in any phase returns the machine to `Idle` with state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Fetching,
    Reconciling,
    Committed,
    Conflicted,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::Idle => "idle",
            SyncState::Fetching => "fetching",
            SyncState::Reconciling => "reconciling",
            SyncState::Committed => "committed",
            SyncState::Conflicted => "conflicted",
        };
        f.write_str(name)
    }
}

/// Terminal outcome of one sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Committed,
    Conflicted,
}

impl From<SyncStatus> for SyncState {
    fn from(status: SyncStatus) -> Self {
        match status {
            SyncStatus::Committed => SyncState::Committed,
            SyncStatus::Conflicted => SyncState::Conflicted,
        }
    }
}

/// Inclusive date range the fetch collaborator is asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl FetchWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_never_moves_backwards() {
        let d1 = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let d0 = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();

        let cursor = SyncCursor::new("monarch").advanced_to(d1);
        assert_eq!(cursor.last_reconciled, Some(d1));
        assert_eq!(cursor.advanced_to(d0).last_reconciled, Some(d1));
        assert_eq!(cursor.advanced_to(d2).last_reconciled, Some(d2));
    }

    #[test]
    fn test_fetch_window_is_inclusive() {
        let window = FetchWindow {
            from: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
        };
        assert!(window.contains(window.from));
        assert!(window.contains(window.to));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()));
    }
}
