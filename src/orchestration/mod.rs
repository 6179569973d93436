//! Long-running pipeline: ledger stream -> write-set processor -> repository.

pub mod indexer;

pub use indexer::{BatchSummary, Indexer, IndexerConfig, IndexerHandle};
