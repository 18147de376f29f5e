//! Benefit Sync Engine Library
//! # Overview
//!
//! This library reconciles credit-card transactions against a catalog of
//! card benefits (periodic statement credits such as a quarterly $75
//! merchant credit) and keeps per-benefit, per-period usage up to date
//! across repeated incremental syncs.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Card, Benefit, Transaction, UsagePeriod, ...)
//! - [`config`] - Engine settings
//! - [`core`] - Business logic components:
//!   - [`core::catalog`] - Card and benefit definitions, validated on load
//!   - [`core::classifier`] - Fee, charge, credit or unmatched
//!   - [`core::period_resolver`] - Transaction date to benefit window
//!   - [`core::ledger`] - Idempotent usage updates and credit best-fit
//!   - [`core::reconciler`] - Sync cursors, conflicts and atomic commit
//! - [`strategy`] - Sequential or parallel per-card execution
//!
//! # Transaction Kinds
//!
//! - **Annual fee**: a charge matching a card's fee pattern; fixes the card's
//!   anniversary and next due date
//! - **Benefit charge**: eligible spend, increases a period's usage
//! - **Benefit credit**: a statement credit, matched to the period it
//!   reimburses by greedy best-fit
//! - **Unmatched**: everything else, listed for visibility
//!
//! # Period States
//!
//! - `open`: created, nothing charged
//! - `partially-used`: some eligible spend, below the limit
//! - `fully-used`: eligible spend reached the limit
//! - `expired`: window ended first

pub mod config;
pub mod core;
pub mod strategy;
pub mod types;

pub use config::{EngineConfig, OveragePolicy, ParallelConfig, StrategyType};
pub use core::{Catalog, CardLedger, SyncReconciler, SyncSnapshot, TransactionSource, VecSource};
pub use strategy::{create_strategy, ReconcileStrategy};
pub use types::{
    AnnualFeeEvent, Benefit, Card, EngineError, PeriodAnchor, PeriodKey, PeriodKind, SyncCursor, SyncMode,
    SyncReport, SyncState, SyncStatus, Transaction, UsagePeriod, UsageStatus,
};
