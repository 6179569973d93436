//! Persisted shapes: position records and the indexer checkpoint.

use super::position::PerpPosition;
use super::primitives::{Address, MarketId, TimestampUs};
use serde::{Deserialize, Serialize};

/// Identity of a position row: one position per market under one address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PositionKey {
    pub position_address: Address,
    pub market: MarketId,
}

impl std::fmt::Display for PositionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.position_address, self.market)
    }
}

/// Mirror of one on-chain position as of `version`.
///
/// A stored record is only replaced by a write with a strictly greater ledger version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerpPositionRecord {
    pub position_address: Address,
    pub market: MarketId,
    pub is_crossed: bool,
    pub version: u64,
    pub version_timestamp: TimestampUs,
    pub owner: Address,
    pub position: PerpPosition,
}

impl PerpPositionRecord {
    pub fn new(
        position_address: Address,
        version: u64,
        version_timestamp: TimestampUs,
        owner: Address,
        is_crossed: bool,
        position: PerpPosition,
    ) -> Self {
        Self {
            market: position.market().clone(),
            position_address,
            is_crossed,
            version,
            version_timestamp,
            owner,
            position,
        }
    }

    pub fn key(&self) -> PositionKey {
        PositionKey {
            position_address: self.position_address.clone(),
            market: self.market.clone(),
        }
    }
}

/// Durable resume cursor, one per processor name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerCheckpoint {
    pub processor_name: String,
    pub last_processed_version: u64,
    pub last_processed_timestamp: TimestampUs,
}

impl IndexerCheckpoint {
    /// First ledger version still to be processed after this checkpoint.
    pub fn next_version(&self) -> u64 {
        self.last_processed_version.saturating_add(1)
    }
}
