//! Transaction-related types
//!
//! Transactions are immutable facts supplied by the fetch collaborator. The
//! engine classifies and consumes them but never mutates them.

use super::card::CardId;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;

/// Transaction identifier
///
/// Either the source-provided id or a derived `derived-<hash>` id.
pub type TransactionId = String;

/// A single posted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,

    /// Card the transaction posted to
    pub card_id: CardId,

    /// Posting date
    pub date: NaiveDate,

    /// Signed amount: positive is a charge, negative is a credit
    pub amount: Decimal,

    /// Raw merchant description
    pub description: String,
}

impl Transaction {
    /// Build a transaction, deriving its id when the source has none
    ///
    /// Blank source ids count as absent.
    pub fn new(
        source_id: Option<&str>,
        card_id: &str,
        date: NaiveDate,
        amount: Decimal,
        description: &str,
    ) -> Self {
        let id = match source_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => derive_id(date, amount, description),
        };

        Self {
            id,
            card_id: card_id.to_string(),
            date,
            amount,
            description: description.to_string(),
        }
    }

    pub fn is_charge(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_credit(&self) -> bool {
        self.amount < Decimal::ZERO
    }
}

/// Stable id for a transaction without a source id
///
/// Hashes date, normalized amount and the upper-cased description, so
/// `75.0` and `75.00` from two fetches of the same row collapse to one id.
pub fn derive_id(date: NaiveDate, amount: Decimal, description: &str) -> TransactionId {
    let mut hasher = Sha256::new();
    hasher.update(date.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(amount.normalize().to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(description.trim().to_uppercase().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("derived-{}", &digest[..16])
}

/// Total order used for every reconciliation pass
///
/// Date first; within a day charges precede credits so a same-day
/// reimbursement finds the charge it pays back; ties break on id.
pub fn reconciliation_order(a: &Transaction, b: &Transaction) -> Ordering {
    a.date
        .cmp(&b.date)
        .then_with(|| a.is_credit().cmp(&b.is_credit()))
        .then_with(|| a.id.cmp(&b.id))
}
