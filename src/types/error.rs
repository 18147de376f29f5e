//! Error types for the benefit sync engine
//!
//! This module defines every error that can abort or skip work during
//! catalog construction and reconciliation.
//!
//! # Error Categories
//!
//! - **Configuration Errors**: malformed catalog entries. Fatal, no partial
//!   catalog is ever used.
//! - **Ordering Errors**: a transaction applied before one already applied in
//!   the same pass. Fatal to the run.
//! - **Collaborator Errors**: the transaction fetch failed, a worker task
//!   died, or a persisted snapshot is unreadable. Fatal, never retried
//!   internally.
//! - **Local Errors**: arithmetic or date overflow on a single transaction.
//!   The transaction is skipped and reported, the batch continues.
//!
//! Ambiguous credits, sync conflicts and unknown anniversaries are not errors
//! at all; they are report records (see [`crate::types::report`]).

use chrono::NaiveDate;
use thiserror::Error;

/// Main error type for the engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A benefit declares a period kind the engine does not know
    #[error("Configuration error: benefit '{benefit}' has unknown period kind '{kind}'")]
    UnknownPeriodKind {
        /// Benefit id
        benefit: String,
        /// The unrecognized kind string
        kind: String,
    },

    /// A match rule declares an unknown match kind
    #[error("Configuration error: rule '{pattern}' on '{owner}' has unknown match kind '{kind}'")]
    UnknownMatchKind {
        /// Card or benefit id owning the rule
        owner: String,
        /// Rule pattern
        pattern: String,
        /// The unrecognized kind string
        kind: String,
    },

    /// A required pattern set is empty
    #[error("Configuration error: '{owner}' is missing {side} patterns")]
    MissingPatterns {
        /// Card or benefit id
        owner: String,
        /// Which pattern set ("charge", "credit" or "fee")
        side: String,
    },

    /// A pattern is empty or fails to compile
    #[error("Configuration error: invalid pattern '{pattern}' on '{owner}': {message}")]
    InvalidPattern {
        /// Card or benefit id owning the rule
        owner: String,
        /// Offending pattern
        pattern: String,
        /// Why it was rejected
        message: String,
    },

    /// A numeric or date field is out of range
    #[error("Configuration error: '{owner}' has invalid {field} '{value}'")]
    InvalidCatalogValue {
        /// Card or benefit id
        owner: String,
        /// Field name
        field: String,
        /// Offending value, rendered
        value: String,
    },

    /// Two catalog entries share an id
    #[error("Configuration error: duplicate {kind} id '{id}'")]
    DuplicateCatalogEntry {
        /// "card" or "benefit"
        kind: String,
        /// The duplicated id
        id: String,
    },

    /// Catalog data could not be parsed at all
    #[error("Configuration error: invalid catalog: {message}")]
    CatalogParse {
        /// Parser message
        message: String,
    },

    /// Engine settings could not be parsed
    #[error("Configuration error: invalid engine config: {message}")]
    ConfigParse {
        /// Parser message
        message: String,
    },

    /// A persisted snapshot could not be read or written
    #[error("Snapshot error: {message}")]
    Snapshot {
        /// Serializer message
        message: String,
    },

    /// A transaction was applied to a ledger before one already applied
    #[error("Transaction {transaction} for card {card} dated {date} applied after {watermark}")]
    OutOfOrderApplication {
        /// Card id
        card: String,
        /// Transaction id
        transaction: String,
        /// Date of the rejected transaction
        date: NaiveDate,
        /// Latest date already applied in this pass
        watermark: NaiveDate,
    },

    /// The fetch collaborator failed
    #[error("Fetch from source '{source_id}' failed: {message}")]
    Fetch {
        /// Data source id
        source_id: String,
        /// Collaborator message
        message: String,
    },

    /// A per-card worker task failed to complete
    #[error("Reconciliation worker for card {card} failed: {message}")]
    WorkerFailed {
        /// Card id the worker was handling
        card: String,
        /// Join error text
        message: String,
    },

    /// Decimal arithmetic overflowed while applying a transaction
    #[error("Arithmetic overflow in {operation} for transaction {transaction}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Transaction id
        transaction: String,
    },

    /// Period arithmetic left the representable date range
    #[error("Date out of range while resolving period for {date}")]
    DateOutOfRange {
        /// Date being resolved
        date: NaiveDate,
    },
}

impl EngineError {
    /// Create a CatalogParse error
    pub fn catalog_parse(error: serde_json::Error) -> Self {
        EngineError::CatalogParse {
            message: error.to_string(),
        }
    }

    /// Create a ConfigParse error
    pub fn config_parse(error: serde_json::Error) -> Self {
        EngineError::ConfigParse {
            message: error.to_string(),
        }
    }

    /// Create a Snapshot error
    pub fn snapshot(error: serde_json::Error) -> Self {
        EngineError::Snapshot {
            message: error.to_string(),
        }
    }

    /// Create an UnknownPeriodKind error
    pub fn unknown_period_kind(benefit: &str, kind: &str) -> Self {
        EngineError::UnknownPeriodKind {
            benefit: benefit.to_string(),
            kind: kind.to_string(),
        }
    }

    /// Create an UnknownMatchKind error
    pub fn unknown_match_kind(owner: &str, pattern: &str, kind: &str) -> Self {
        EngineError::UnknownMatchKind {
            owner: owner.to_string(),
            pattern: pattern.to_string(),
            kind: kind.to_string(),
        }
    }

    /// Create a MissingPatterns error
    pub fn missing_patterns(owner: &str, side: &str) -> Self {
        EngineError::MissingPatterns {
            owner: owner.to_string(),
            side: side.to_string(),
        }
    }

    /// Create an InvalidPattern error
    pub fn invalid_pattern(owner: &str, pattern: &str, message: &str) -> Self {
        EngineError::InvalidPattern {
            owner: owner.to_string(),
            pattern: pattern.to_string(),
            message: message.to_string(),
        }
    }

    /// Create an InvalidCatalogValue error
    pub fn invalid_catalog_value(owner: &str, field: &str, value: impl ToString) -> Self {
        EngineError::InvalidCatalogValue {
            owner: owner.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// Create a DuplicateCatalogEntry error
    pub fn duplicate_catalog_entry(kind: &str, id: &str) -> Self {
        EngineError::DuplicateCatalogEntry {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    /// Create an OutOfOrderApplication error
    pub fn out_of_order(
        card: &str,
        transaction: &str,
        date: NaiveDate,
        watermark: NaiveDate,
    ) -> Self {
        EngineError::OutOfOrderApplication {
            card: card.to_string(),
            transaction: transaction.to_string(),
            date,
            watermark,
        }
    }

    /// Create a Fetch error
    pub fn fetch(source_id: &str, message: impl ToString) -> Self {
        EngineError::Fetch {
            source_id: source_id.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a WorkerFailed error
    pub fn worker_failed(card: &str, message: impl ToString) -> Self {
        EngineError::WorkerFailed {
            card: card.to_string(),
            message: message.to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, transaction: &str) -> Self {
        EngineError::ArithmeticOverflow {
            operation: operation.to_string(),
            transaction: transaction.to_string(),
        }
    }

    /// True for malformed catalog or engine configuration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownPeriodKind { .. }
                | EngineError::UnknownMatchKind { .. }
                | EngineError::MissingPatterns { .. }
                | EngineError::InvalidPattern { .. }
                | EngineError::InvalidCatalogValue { .. }
                | EngineError::DuplicateCatalogEntry { .. }
                | EngineError::CatalogParse { .. }
                | EngineError::ConfigParse { .. }
        )
    }

    /// True when the error must abort the whole run
    ///
    /// Local errors (overflow, date range) only skip the offending
    /// transaction.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            EngineError::ArithmeticOverflow { .. } | EngineError::DateOutOfRange { .. }
        )
    }
}
