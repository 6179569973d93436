pub mod api;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::Config;
pub use datasource::{
    AptosLedgerSource, DataSourceError, LedgerSource, MockLedgerSource, TransactionBatch,
    TransactionStream,
};
pub use db::{init_db, Repository, UpsertOutcome};
pub use domain::{
    Address, IndexerCheckpoint, MarketId, NumericError, PerpPosition, PerpPositionRecord,
    TimestampUs, Uint128, Uint256, Uint64,
};
pub use engine::WriteSetProcessor;
pub use error::{AppError, IndexerError};
pub use orchestration::{Indexer, IndexerConfig, IndexerHandle};
