//! Closed set of on-chain resources this indexer understands.
//!
//! Resources are dispatched on their fully-qualified Move type tag. Each known
//! kind has its own schema; unknown tags are ignored.

use super::numeric::Uint64;
use super::position::PerpPosition;
use super::primitives::Address;
use serde::{Deserialize, Serialize};

/// Type tag of the framework object core resource.
pub const OBJECT_CORE_TAG: &str = "0x1::object::ObjectCore";

/// Default address of the perp contract whose position resources are indexed.
pub const DEFAULT_CONTRACT_ADDRESS: &str =
    "0xb8a5788314451ce4d2fbbad32e1bad88d4184b73943b7fe5166eab93cf1a5a95";

/// All positions held under one shared-margin account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossedPosition {
    pub positions: Vec<PerpPosition>,
}

/// A single position owned by a dedicated sub-account object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolatedPosition {
    pub position: PerpPosition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidId {
    pub addr: Address,
    pub creation_num: Uint64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guid {
    pub id: GuidId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHandle {
    pub counter: Uint64,
    pub guid: Guid,
}

/// Generic object metadata linking an object address to its owning account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCore {
    pub allow_ungated_transfer: bool,
    pub guid_creation_num: Uint64,
    pub owner: Address,
    pub transfer_events: EventHandle,
}

/// Resource kind resolved from a type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    CrossedPosition,
    IsolatedPosition,
    ObjectCore,
}

/// A decoded resource write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerResource {
    CrossedPosition(CrossedPosition),
    IsolatedPosition(IsolatedPosition),
    ObjectCore(ObjectCore),
}

/// Maps type tags to resource kinds for one contract deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTags {
    crossed_position: String,
    isolated_position: String,
}

impl ResourceTags {
    pub fn new(contract: &Address) -> Self {
        Self::for_module_address(contract.as_str())
    }

    fn for_module_address(contract: &str) -> Self {
        Self {
            crossed_position: format!("{}::perp_positions::CrossedPosition", contract),
            isolated_position: format!("{}::perp_positions::IsolatedPosition", contract),
        }
    }

    pub fn crossed_position(&self) -> &str {
        &self.crossed_position
    }

    pub fn isolated_position(&self) -> &str {
        &self.isolated_position
    }

    /// Resolve a type tag; `None` for anything outside the known set.
    pub fn classify(&self, type_tag: &str) -> Option<ResourceKind> {
        if type_tag == self.crossed_position {
            Some(ResourceKind::CrossedPosition)
        } else if type_tag == self.isolated_position {
            Some(ResourceKind::IsolatedPosition)
        } else if type_tag == OBJECT_CORE_TAG {
            Some(ResourceKind::ObjectCore)
        } else {
            None
        }
    }
}

impl ResourceKind {
    /// Strictly decode a payload according to this kind's schema.
    pub fn decode(self, payload: &str) -> Result<LedgerResource, serde_json::Error> {
        Ok(match self {
            ResourceKind::CrossedPosition => {
                LedgerResource::CrossedPosition(serde_json::from_str(payload)?)
            }
            ResourceKind::IsolatedPosition => {
                LedgerResource::IsolatedPosition(serde_json::from_str(payload)?)
            }
            ResourceKind::ObjectCore => LedgerResource::ObjectCore(serde_json::from_str(payload)?),
        })
    }
}

impl Default for ResourceTags {
    fn default() -> Self {
        Self::for_module_address(DEFAULT_CONTRACT_ADDRESS)
    }
}
