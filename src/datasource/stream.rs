//! Poll-based tailing of the ledger into a bounded stream of transaction batches.

use super::{DataSourceError, LedgerSource, Transaction};
use crate::domain::TimestampUs;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Upper bound on the page size requested upstream.
pub const MAX_PAGE_LIMIT: u64 = 25;

/// A full page of the ledger, filtered to user transactions.
#[derive(Debug, Clone)]
pub struct TransactionBatch {
    /// User transactions in ledger order; may be empty.
    pub transactions: Vec<Transaction>,
    /// Version of the last row of the page, of any kind.
    pub end_version: u64,
    pub end_timestamp: TimestampUs,
    /// Rows fetched upstream for this page.
    pub fetched: usize,
}

impl TransactionBatch {
    pub fn first_version(&self) -> Option<u64> {
        self.transactions.first().map(|tx| tx.version)
    }
}

#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Sleep after a short page before polling the head again.
    pub poll_delay: Duration,
    /// Batches buffered before the poll loop blocks.
    pub channel_capacity: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            poll_delay: Duration::from_millis(25),
            channel_capacity: 128,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransactionStreamError {
    #[error("ledger fetch failed at version {version}: {source}")]
    Fetch {
        version: u64,
        #[source]
        source: DataSourceError,
    },
}

type StreamItem = Result<TransactionBatch, TransactionStreamError>;

/// Ordered stream of transaction batches fed by a background poll loop.
///
/// A fetch error ends the stream: it is delivered once through [`recv`](Self::recv)
/// after any batches already buffered, then the stream reports end-of-stream.
pub struct TransactionStream {
    rx: mpsc::Receiver<StreamItem>,
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl TransactionStream {
    /// Start tailing from `start_version`, requesting `page_limit` rows per poll
    /// (clamped to `1..=MAX_PAGE_LIMIT`).
    pub fn open(
        source: Arc<dyn LedgerSource>,
        start_version: u64,
        page_limit: u64,
        options: StreamOptions,
    ) -> Self {
        let limit = page_limit.clamp(1, MAX_PAGE_LIMIT);
        let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
        let (cancel, cancel_rx) = watch::channel(false);

        info!(start_version, limit, "Opening transaction stream");
        let task = tokio::spawn(poll_loop(
            source,
            start_version,
            limit,
            options.poll_delay,
            tx,
            cancel_rx,
        ));

        Self {
            rx,
            cancel,
            task: Some(task),
        }
    }

    /// Next batch, `Ok(None)` at end of stream.
    pub async fn recv(&mut self) -> Result<Option<TransactionBatch>, TransactionStreamError> {
        match self.rx.recv().await {
            Some(Ok(batch)) => Ok(Some(batch)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    /// Cancel the poll loop and wait until it has fully exited.
    pub async fn close(mut self) {
        let _ = self.cancel.send(true);
        self.rx.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Transaction stream task ended abnormally");
            }
        }
        debug!("Transaction stream closed");
    }
}

impl Drop for TransactionStream {
    fn drop(&mut self) {
        let _ = self.cancel.send(true);
    }
}

async fn poll_loop(
    source: Arc<dyn LedgerSource>,
    mut cursor: u64,
    limit: u64,
    poll_delay: Duration,
    tx: mpsc::Sender<StreamItem>,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        if *cancel.borrow() {
            return;
        }

        let fetched = tokio::select! {
            _ = cancel.changed() => return,
            res = source.fetch_transactions(cursor, limit) => res,
        };

        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                error!(version = cursor, error = %e, "Failed to fetch transactions");
                let item = Err(TransactionStreamError::Fetch {
                    version: cursor,
                    source: e,
                });
                tokio::select! {
                    _ = cancel.changed() => {}
                    _ = tx.send(item) => {}
                }
                return;
            }
        };

        // A short page means the head of the ledger; the count includes
        // non-user rows so a page of block metadata still advances the cursor.
        let end = match page.end {
            Some(end) if page.fetched as u64 >= limit => end,
            _ => {
                tokio::select! {
                    _ = cancel.changed() => return,
                    _ = tokio::time::sleep(poll_delay) => continue,
                }
            }
        };

        let (end_version, end_timestamp) = end;
        cursor = end_version.saturating_add(1);

        let batch = TransactionBatch {
            transactions: page.transactions,
            end_version,
            end_timestamp,
            fetched: page.fetched,
        };

        tokio::select! {
            _ = cancel.changed() => return,
            sent = tx.send(Ok(batch)) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}
