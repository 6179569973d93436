//! Upstream ledger access: transaction pages and the polling transaction stream.

use async_trait::async_trait;
use std::fmt;

pub mod aptos;
pub mod mock;
pub mod stream;
pub mod transaction;

pub use aptos::AptosLedgerSource;
pub use mock::MockLedgerSource;
pub use stream::{StreamOptions, TransactionBatch, TransactionStream, TransactionStreamError};
pub use transaction::{
    parse_transactions_page, CommittedTransaction, Transaction, TransactionKind,
    TransactionPage, WriteResource, WriteSetChange,
};

/// Source of committed ledger transactions.
///
/// Implementations do not retry; any error is surfaced to the caller as-is.
#[async_trait]
pub trait LedgerSource: Send + Sync + fmt::Debug {
    /// Fetch up to `limit` committed transactions with version `>= start_version`.
    ///
    /// # Returns
    /// The page with its total row count (all kinds), its last row's
    /// version/timestamp, and the user transactions in ledger order.
    async fn fetch_transactions(
        &self,
        start_version: u64,
        limit: u64,
    ) -> Result<TransactionPage, DataSourceError>;
}

/// Error type for ledger source operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// Non-success HTTP status from the ledger API
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Other error
    Other(String),
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DataSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            DataSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DataSourceError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datasource_error_display() {
        let err = DataSourceError::NetworkError("connection timeout".to_string());
        assert_eq!(err.to_string(), "Network error: connection timeout");

        let err = DataSourceError::HttpError {
            status: 429,
            message: "Too many requests".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 429: Too many requests");

        let err = DataSourceError::ParseError("invalid JSON".to_string());
        assert_eq!(err.to_string(), "Parse error: invalid JSON");
    }
}
