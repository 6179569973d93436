use crate::config::Config;
use crate::datasource::{LedgerSource, StreamOptions, TransactionBatch, TransactionStream};
use crate::db::{Repository, UpsertOutcome};
use crate::domain::ResourceTags;
use crate::engine::WriteSetProcessor;
use crate::error::IndexerError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Settings the indexer needs, split out of [`Config`] so tests can build them directly.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub processor_name: String,
    /// Resource type tags built from the perp contract address.
    pub tags: ResourceTags,
    pub start_version: u64,
    pub page_limit: u64,
    pub stream: StreamOptions,
}

impl IndexerConfig {
    pub fn new(processor_name: impl Into<String>) -> Self {
        Self {
            processor_name: processor_name.into(),
            tags: ResourceTags::default(),
            start_version: 0,
            page_limit: 100,
            stream: StreamOptions::default(),
        }
    }
}

impl From<&Config> for IndexerConfig {
    fn from(config: &Config) -> Self {
        Self {
            processor_name: config.processor_name.clone(),
            tags: ResourceTags::new(&config.contract_address),
            start_version: config.start_version,
            page_limit: config.page_limit,
            stream: StreamOptions {
                poll_delay: config.poll_delay,
                channel_capacity: config.channel_capacity,
            },
        }
    }
}

/// What one batch did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub end_version: u64,
    pub positions: usize,
    pub upsert: UpsertOutcome,
    pub checkpoint_advanced: bool,
}

/// Wires the ledger stream through the processor into the repository.
#[derive(Clone)]
pub struct Indexer {
    source: Arc<dyn LedgerSource>,
    repo: Arc<Repository>,
    processor: WriteSetProcessor,
    config: IndexerConfig,
}

impl Indexer {
    pub fn new(
        source: Arc<dyn LedgerSource>,
        repo: Arc<Repository>,
        config: IndexerConfig,
    ) -> Self {
        let processor = WriteSetProcessor::new(config.tags.clone());
        Self {
            source,
            repo,
            processor,
            config,
        }
    }

    /// First version to fetch: one past the stored checkpoint, or the configured start.
    pub async fn resume_version(&self) -> Result<u64, IndexerError> {
        let checkpoint = self.repo.get_checkpoint(&self.config.processor_name).await?;
        Ok(checkpoint
            .map(|c| c.next_version())
            .unwrap_or(self.config.start_version))
    }

    /// Process, persist and checkpoint one batch.
    ///
    /// The checkpoint moves only after the positions are committed, so a crash
    /// in between replays the batch; the version gate makes the replay a no-op.
    pub async fn process_batch(
        &self,
        batch: &TransactionBatch,
    ) -> Result<BatchSummary, IndexerError> {
        let processed = self.processor.process(batch)?;

        let upsert = if processed.records.is_empty() {
            UpsertOutcome::default()
        } else {
            self.repo.upsert_positions(&processed.records).await?
        };

        let checkpoint_advanced = self
            .repo
            .advance_checkpoint(
                &self.config.processor_name,
                processed.last_version,
                processed.last_timestamp,
            )
            .await?;

        info!(
            start = ?processed.first_version,
            end = processed.last_version,
            count = batch.transactions.len(),
            positions = processed.records.len(),
            applied = upsert.applied,
            "Processed batch"
        );

        Ok(BatchSummary {
            end_version: processed.last_version,
            positions: processed.records.len(),
            upsert,
            checkpoint_advanced,
        })
    }

    /// Resume from the checkpoint and run the consumer loop in the background.
    pub async fn start(self) -> Result<IndexerHandle, IndexerError> {
        let start_version = self.resume_version().await?;
        let stream = TransactionStream::open(
            self.source.clone(),
            start_version,
            self.config.page_limit,
            self.config.stream.clone(),
        );

        info!(
            processor = %self.config.processor_name,
            start_version,
            "Indexer started"
        );

        let running = Arc::new(AtomicBool::new(true));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(stream, shutdown_rx, running.clone()));

        Ok(IndexerHandle {
            shutdown,
            task: Some(task),
            running,
        })
    }

    async fn run(
        self,
        mut stream: TransactionStream,
        mut shutdown: watch::Receiver<bool>,
        running: Arc<AtomicBool>,
    ) -> Result<(), IndexerError> {
        let result = loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break Ok(()),
                next = stream.recv() => match next {
                    Ok(Some(batch)) => {
                        if let Err(e) = self.process_batch(&batch).await {
                            error!(
                                error = %e,
                                kind = e.kind(),
                                start = ?batch.first_version(),
                                end = batch.end_version,
                                "Indexer stopped"
                            );
                            break Err(e);
                        }
                    }
                    Ok(None) => break Ok(()),
                    Err(e) => {
                        let e = IndexerError::from(e);
                        error!(error = %e, kind = e.kind(), "Indexer stopped");
                        break Err(e);
                    }
                },
            }
        };

        stream.close().await;
        running.store(false, Ordering::SeqCst);
        info!(processor = %self.config.processor_name, "Indexer exited");
        result
    }
}

/// Control handle for a running indexer.
pub struct IndexerHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<Result<(), IndexerError>>>,
    running: Arc<AtomicBool>,
}

impl IndexerHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Shared flag that turns false once the consumer loop has exited.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Wait for the consumer loop to end on its own and return its fatal error, if any.
    ///
    /// Cancel-safe: dropping the future leaves the handle usable.
    pub async fn join(&mut self) -> Result<(), IndexerError> {
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };
        let result = task.await;
        self.task = None;
        match result {
            Ok(result) => result,
            Err(e) => Err(IndexerError::Task(e.to_string())),
        }
    }

    /// Request shutdown and wait for the consumer and the stream to finish.
    pub async fn close(mut self) -> Result<(), IndexerError> {
        let _ = self.shutdown.send(true);
        self.join().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::{
        CommittedTransaction, DataSourceError, MockLedgerSource, Transaction, WriteSetChange,
    };
    use crate::db::migrations::init_db;
    use crate::domain::{Address, MarketId, TimestampUs, Uint64};
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn setup_repo() -> (Arc<Repository>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Arc::new(Repository::new(pool)), temp_dir)
    }

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    fn test_config() -> IndexerConfig {
        let mut config = IndexerConfig::new("test-indexer");
        config.stream.poll_delay = Duration::from_millis(1);
        config
    }

    fn crossed_tx(version: u64, account: &str, market: &str, size: &str) -> Transaction {
        let tags = ResourceTags::default();
        let payload = json!({
            "positions": [{
                "size": size,
                "entry_px_times_size_sum": "0",
                "avg_acquire_entry_px": "0",
                "user_leverage": 5,
                "max_allowed_leverage": 20,
                "is_long": true,
                "funding_index_at_last_update": { "index": "0" },
                "unrealized_funding_amount_before_last_update": { "is_positive": true, "amount": "0" },
                "market": { "inner": market },
                "tp_reqs": { "full_sized": { "vec": [] }, "fixed_sized": [] },
                "sl_reqs": { "full_sized": { "vec": [] }, "fixed_sized": [] },
                "reduce_only_orders": []
            }]
        });
        let tag = tags.crossed_position();
        let change = WriteSetChange::write_resource(addr(account), tag, &payload).unwrap();
        Transaction::new(version, TimestampUs::new(version * 1_000), vec![change])
    }

    async fn wait_for_checkpoint(repo: &Repository, name: &str, version: u64) {
        for _ in 0..500 {
            if let Some(c) = repo.get_checkpoint(name).await.unwrap() {
                if c.last_processed_version >= version {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("checkpoint never reached {}", version);
    }

    #[tokio::test]
    async fn test_resume_version_defaults_to_start_version() {
        let (repo, _temp) = setup_repo().await;
        let mut config = test_config();
        config.start_version = 42;
        let indexer = Indexer::new(Arc::new(MockLedgerSource::new()), repo.clone(), config);

        assert_eq!(indexer.resume_version().await.unwrap(), 42);

        repo.advance_checkpoint("test-indexer", 100, TimestampUs::new(1))
            .await
            .unwrap();
        assert_eq!(indexer.resume_version().await.unwrap(), 101);
    }

    #[tokio::test]
    async fn test_process_batch_without_positions_still_checkpoints() {
        let (repo, _temp) = setup_repo().await;
        let indexer = Indexer::new(Arc::new(MockLedgerSource::new()), repo.clone(), test_config());

        let batch = TransactionBatch {
            transactions: vec![],
            end_version: 17,
            end_timestamp: TimestampUs::new(170),
            fetched: 3,
        };
        let summary = indexer.process_batch(&batch).await.unwrap();
        assert_eq!(summary.positions, 0);
        assert!(summary.checkpoint_advanced);

        let checkpoint = repo.get_checkpoint("test-indexer").await.unwrap().unwrap();
        assert_eq!(checkpoint.last_processed_version, 17);
        assert_eq!(repo.count_positions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_indexes_and_resumes_after_close() {
        let (repo, _temp) = setup_repo().await;
        let source = Arc::new(
            MockLedgerSource::new()
                .with_transaction(crossed_tx(10, "0xa", "BTC", "5"))
                .with_committed(CommittedTransaction::other(
                    "block_metadata_transaction",
                    11,
                    TimestampUs::new(11_000),
                ))
                .with_transaction(crossed_tx(12, "0xa", "BTC", "8")),
        );

        // Only full pages are published, so size the page to the ledger.
        let mut config = test_config();
        config.page_limit = 3;
        let handle = Indexer::new(source.clone(), repo.clone(), config)
            .start()
            .await
            .unwrap();
        assert!(handle.is_running());
        wait_for_checkpoint(&repo, "test-indexer", 12).await;
        handle.close().await.unwrap();

        let stored = repo
            .get_position(&addr("0xa"), &MarketId::new("BTC"), true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.version, 12);
        assert_eq!(stored.position.size, Uint64::new(8));

        // A restart picks up right after the checkpoint.
        let indexer = Indexer::new(source, repo.clone(), test_config());
        assert_eq!(indexer.resume_version().await.unwrap(), 13);
    }

    #[tokio::test]
    async fn test_fetch_error_stops_indexer() {
        let (repo, _temp) = setup_repo().await;
        let source = Arc::new(
            MockLedgerSource::new()
                .with_transaction(crossed_tx(1, "0xa", "BTC", "5"))
                .failing_from(
                    2,
                    DataSourceError::HttpError {
                        status: 500,
                        message: "boom".to_string(),
                    },
                ),
        );

        let mut config = test_config();
        config.page_limit = 1;
        let mut handle = Indexer::new(source, repo.clone(), config)
            .start()
            .await
            .unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("indexer did not stop");

        let err = result.unwrap_err();
        assert_eq!(err.kind(), "transport");
        assert!(!handle.is_running());
        assert_eq!(
            repo.get_checkpoint("test-indexer")
                .await
                .unwrap()
                .unwrap()
                .last_processed_version,
            1
        );
    }

    #[tokio::test]
    async fn test_decode_error_leaves_store_untouched() {
        let (repo, _temp) = setup_repo().await;
        let source = Arc::new(
            MockLedgerSource::new()
                .with_transaction(crossed_tx(5, "0xa", "BTC", "not-a-number")),
        );

        let mut config = test_config();
        config.page_limit = 1;
        let mut handle = Indexer::new(source, repo.clone(), config)
            .start()
            .await
            .unwrap();
        let err = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("indexer did not stop")
            .unwrap_err();

        assert_eq!(err.kind(), "decode");
        assert_eq!(repo.count_positions().await.unwrap(), 0);
        assert!(repo.get_checkpoint("test-indexer").await.unwrap().is_none());
    }
}
