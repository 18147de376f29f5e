//! Types module
//!
//! Contains the plain data structures used throughout the engine:
//! - `card`: cards, fee patterns and annual fee events
//! - `benefit`: benefits, period kinds and match rules
//! - `transaction`: transaction records and identifiers
//! - `period`: usage period keys and state
//! - `sync`: cursors, sync modes and the reconciler state machine
//! - `report`: reconciliation results
//! - `error`: the engine error type

pub mod benefit;
pub mod card;
pub mod error;
pub mod period;
pub mod report;
pub mod sync;
pub mod transaction;

pub use benefit::{Benefit, BenefitId, MatchKind, MatchRule, PeriodKind};
pub use card::{AnnualFeeEvent, Card, CardId, FeePattern};
pub use error::EngineError;
pub use period::{Contribution, ContributionKind, PeriodAnchor, PeriodKey, UsagePeriod, UsageStatus};
pub use report::{
    CardOutcome, PeriodDelta, PeriodRef, RejectedCharge, SkipReason, SkippedTransaction,
    SyncConflict, SyncReport, SyncWarning, UnresolvedCredit,
};
pub use sync::{FetchWindow, SourceId, SyncCursor, SyncMode, SyncState, SyncStatus};
pub use transaction::{Transaction, TransactionId};
