//! Mock ledger source for testing without network calls.

use super::transaction::{CommittedTransaction, Transaction};
use super::{DataSourceError, LedgerSource, TransactionPage};
use async_trait::async_trait;
use std::sync::Mutex;

/// In-memory ledger that serves predefined committed transactions.
#[derive(Debug, Default)]
pub struct MockLedgerSource {
    rows: Vec<CommittedTransaction>,
    fail_from: Option<(u64, DataSourceError)>,
    requests: Mutex<Vec<(u64, u64)>>,
}

impl MockLedgerSource {
    /// Create a new mock source with an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user transaction.
    pub fn with_transaction(mut self, transaction: Transaction) -> Self {
        self.rows.push(CommittedTransaction::user(transaction));
        self.sort();
        self
    }

    /// Append multiple user transactions.
    pub fn with_transactions(mut self, transactions: Vec<Transaction>) -> Self {
        self.rows
            .extend(transactions.into_iter().map(CommittedTransaction::user));
        self.sort();
        self
    }

    /// Append any committed transaction, e.g. a block metadata row.
    pub fn with_committed(mut self, row: CommittedTransaction) -> Self {
        self.rows.push(row);
        self.sort();
        self
    }

    /// Fail every request whose start version is `>= version`.
    pub fn failing_from(mut self, version: u64, error: DataSourceError) -> Self {
        self.fail_from = Some((version, error));
        self
    }

    /// `(start_version, limit)` of every request served so far.
    pub fn requests(&self) -> Vec<(u64, u64)> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn sort(&mut self) {
        self.rows.sort_by_key(|row| row.version);
    }
}

#[async_trait]
impl LedgerSource for MockLedgerSource {
    async fn fetch_transactions(
        &self,
        start_version: u64,
        limit: u64,
    ) -> Result<TransactionPage, DataSourceError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((start_version, limit));
        }

        if let Some((version, error)) = &self.fail_from {
            if start_version >= *version {
                return Err(error.clone());
            }
        }

        let rows = self
            .rows
            .iter()
            .filter(|row| row.version >= start_version)
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok(TransactionPage::from_committed(rows))
    }
}
