//! Domain types for the perp position mirror.
//!
//! This module provides:
//! - Exact-precision unsigned integers with JSON and store codecs
//! - Domain primitives: Address, MarketId, TimestampUs
//! - Move payload schemas for perp positions and object metadata
//! - Persisted record and checkpoint shapes

pub mod numeric;
pub mod position;
pub mod primitives;
pub mod record;
pub mod resource;

pub use numeric::{NumericError, Uint128, Uint256, Uint64};
pub use position::{
    AccumulativeIndex, MarketRef, MoveOption, OrderId, PendingTpSlKey, PendingTpSls,
    PerpPosition, PriceIndexKey, SignedAmount,
};
pub use primitives::{Address, AddressParseError, MarketId, TimestampUs};
pub use record::{IndexerCheckpoint, PerpPositionRecord, PositionKey};
pub use resource::{
    CrossedPosition, IsolatedPosition, LedgerResource, ObjectCore, ResourceKind, ResourceTags,
    DEFAULT_CONTRACT_ADDRESS, OBJECT_CORE_TAG,
};
