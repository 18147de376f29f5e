//! Engine configuration
//!
//! Runtime knobs that are not part of the catalog: where a full fetch starts,
//! how overages are reported and how per-card work is executed. Deserialized
//! from JSON by the surrounding tooling; every field has a default.

use crate::strategy::{create_strategy, ReconcileStrategy};
use crate::types::EngineError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What to do when a charge pushes usage past the benefit limit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OveragePolicy {
    /// Apply the charge and note the overage on the period
    Flag,
    /// Like `Flag`, plus a warning in the report
    #[default]
    Warn,
    /// Refuse the charge and list it as rejected
    Reject,
}

/// How per-card reconciliation work is executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyType {
    /// One card after another on the calling thread
    #[default]
    Sequential,
    /// One tokio task per card on a multi-threaded runtime
    Parallel,
}

/// Configuration for parallel per-card reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Runtime worker threads
    pub worker_threads: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
        }
    }
}

impl ParallelConfig {
    /// Create a ParallelConfig, falling back to the default for zero threads
    pub fn new(worker_threads: usize) -> Self {
        if worker_threads == 0 {
            let default = Self::default();
            tracing::warn!(
                worker_threads,
                fallback = default.worker_threads,
                "invalid worker_threads, using default"
            );
            return default;
        }
        Self { worker_threads }
    }

    /// Re-validate values that came in through deserialization
    pub fn normalized(&self) -> Self {
        Self::new(self.worker_threads)
    }
}

fn default_initial_sync_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default()
}

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// First date requested by a full fetch, and by an incremental fetch
    /// with no cursor yet
    #[serde(default = "default_initial_sync_date")]
    pub initial_sync_date: NaiveDate,

    #[serde(default)]
    pub overage_policy: OveragePolicy,

    #[serde(default)]
    pub strategy: StrategyType,

    #[serde(default)]
    pub parallel: ParallelConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_sync_date: default_initial_sync_date(),
            overage_policy: OveragePolicy::default(),
            strategy: StrategyType::default(),
            parallel: ParallelConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse engine settings from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(EngineError::config_parse)
    }

    /// Build the execution strategy this configuration selects
    pub fn create_strategy(&self) -> Box<dyn ReconcileStrategy> {
        create_strategy(self.strategy, Some(self.parallel.normalized()))
    }
}
