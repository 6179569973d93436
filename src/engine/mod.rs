//! Pure computation engine: ledger write sets to position records.

pub mod processor;

pub use processor::{ProcessError, ProcessedBatch, WriteSetProcessor};
