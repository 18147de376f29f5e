//! Concurrent per-card reconciliation
//!
//! - `batch_processor` - Spawns one tokio task per card
//! - `staging` - DashMap-backed holding area for finished card results

pub mod batch_processor;
pub mod staging;

pub use batch_processor::CardBatchProcessor;
pub use staging::LedgerStaging;
