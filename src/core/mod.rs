//! Core business logic module
//!
//! This module contains the reconciliation components:
//! - `catalog` - Validated card and benefit definitions
//! - `classifier` - Transaction classification
//! - `period_resolver` - Anniversary-aware benefit windows
//! - `ledger` - Per-card usage state and idempotent updates
//! - `card_sync` - The per-card classify, resolve and apply pipeline
//! - `reconciler` - Sync state machine, cursors and commit
//! - `parallel` - Concurrent per-card processing
//! - `traits` - Collaborator abstractions

pub mod card_sync;
pub mod catalog;
pub mod classifier;
pub mod ledger;
pub mod parallel;
pub mod period_resolver;
pub mod reconciler;
pub mod traits;

pub use card_sync::{reconcile_card, CardContext};
pub use catalog::{Catalog, CatalogConfig};
pub use classifier::{classify, Classification};
pub use ledger::{CardLedger, ChargeOutcome, CreditCandidate, CreditOutcome, LedgerBatch};
pub use period_resolver::{period_bounds, resolve_key, resolve_period, PeriodBounds, ResolvedPeriod};
pub use reconciler::{SyncReconciler, SyncSnapshot};
pub use traits::{TransactionSource, VecSource};
