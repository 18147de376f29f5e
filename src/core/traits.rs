//! Collaborator traits
//!
//! The engine never retrieves data itself. A [`TransactionSource`] is handed
//! a date window and returns whatever the backing feed (HTTP API, browser
//! export, file import) has for it; the reconciler consumes the result.

use crate::types::{EngineError, FetchWindow, Transaction};

/// A feed of transactions for one data source
pub trait TransactionSource {
    /// Stable identifier of the source; owner of the sync cursor
    fn source_id(&self) -> &str;

    /// Fetch transactions for the inclusive `window`
    ///
    /// Implementations may return transactions outside the window (late
    /// postings, overlapping pages); they are reconciled like any other.
    ///
    /// # Errors
    ///
    /// Any retrieval failure, mapped to [`EngineError::Fetch`]. The sync is
    /// aborted and no state changes.
    fn fetch(&mut self, window: FetchWindow) -> Result<Vec<Transaction>, EngineError>;
}

/// In-memory source returning the stored transactions that fall in the window
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    id: String,
    transactions: Vec<Transaction>,
}

impl VecSource {
    pub fn new(id: &str, transactions: Vec<Transaction>) -> Self {
        Self {
            id: id.to_string(),
            transactions,
        }
    }

    /// Add transactions, e.g. ones that posted since the last fetch
    pub fn extend(&mut self, transactions: impl IntoIterator<Item = Transaction>) {
        self.transactions.extend(transactions);
    }
}

impl TransactionSource for VecSource {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn fetch(&mut self, window: FetchWindow) -> Result<Vec<Transaction>, EngineError> {
        Ok(self
            .transactions
            .iter()
            .filter(|transaction| window.contains(transaction.date))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn tx(date: (i32, u32, u32)) -> Transaction {
        Transaction::new(
            None,
            "amex-plat",
            NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            Decimal::ONE,
            "X",
        )
    }

    #[test]
    fn test_vec_source_filters_to_window() {
        let mut source = VecSource::new("bank", vec![tx((2026, 1, 1)), tx((2026, 2, 1)), tx((2026, 3, 1))]);
        let window = FetchWindow {
            from: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        };
        let fetched = source.fetch(window).unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(source.source_id(), "bank");

        source.extend([tx((2026, 2, 15))]);
        assert_eq!(source.fetch(window).unwrap().len(), 3);
    }
}
