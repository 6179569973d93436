use crate::datasource::{Transaction, TransactionBatch, WriteResource};
use crate::domain::{
    Address, CrossedPosition, IsolatedPosition, LedgerResource, PerpPositionRecord, PositionKey,
    ResourceKind, ResourceTags, TimestampUs,
};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to decode {type_tag} at {address} in version {version}: {source}")]
    Decode {
        version: u64,
        address: Address,
        type_tag: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("owner not found for isolated position {address} in version {version}")]
    OwnerNotFound { version: u64, address: Address },
}

impl ProcessError {
    pub fn version(&self) -> u64 {
        match self {
            ProcessError::Decode { version, .. } | ProcessError::OwnerNotFound { version, .. } => {
                *version
            }
        }
    }
}

/// Position records derived from one batch, plus the range it covers.
#[derive(Debug, Clone)]
pub struct ProcessedBatch {
    /// Latest record per (position address, market), sorted by that key.
    pub records: Vec<PerpPositionRecord>,
    pub first_version: Option<u64>,
    pub last_version: u64,
    pub last_timestamp: TimestampUs,
    /// Transactions that wrote at least one position resource.
    pub relevant_transactions: usize,
}

/// Decodes resource writes into position records.
#[derive(Debug, Clone, Default)]
pub struct WriteSetProcessor {
    tags: ResourceTags,
}

impl WriteSetProcessor {
    pub fn new(tags: ResourceTags) -> Self {
        Self { tags }
    }

    /// Process a stream batch. Any decode or ownership failure aborts the whole batch.
    pub fn process(&self, batch: &TransactionBatch) -> Result<ProcessedBatch, ProcessError> {
        let mut latest = BTreeMap::new();
        let mut relevant_transactions = 0;
        for tx in &batch.transactions {
            if self.process_transaction(tx, &mut latest)? {
                relevant_transactions += 1;
            }
        }

        Ok(ProcessedBatch {
            records: latest.into_values().collect(),
            first_version: batch.first_version(),
            last_version: batch.end_version,
            last_timestamp: batch.end_timestamp,
            relevant_transactions,
        })
    }

    /// Process transactions outside of a stream batch.
    ///
    /// # Returns
    /// The latest record per (position address, market), sorted by that key.
    pub fn process_transactions(
        &self,
        transactions: &[Transaction],
    ) -> Result<Vec<PerpPositionRecord>, ProcessError> {
        let mut latest = BTreeMap::new();
        for tx in transactions {
            self.process_transaction(tx, &mut latest)?;
        }
        Ok(latest.into_values().collect())
    }

    /// Fold one transaction's position writes into `latest`.
    ///
    /// Returns false when the transaction wrote no position resource.
    fn process_transaction(
        &self,
        tx: &Transaction,
        latest: &mut BTreeMap<PositionKey, PerpPositionRecord>,
    ) -> Result<bool, ProcessError> {
        let mut crossed: Vec<(&Address, CrossedPosition)> = Vec::new();
        let mut isolated: Vec<(&Address, IsolatedPosition)> = Vec::new();
        let mut object_cores: Vec<&WriteResource> = Vec::new();

        for write in tx.write_resources() {
            match self.tags.classify(&write.type_tag) {
                Some(ResourceKind::CrossedPosition) => {
                    if let LedgerResource::CrossedPosition(p) =
                        decode(tx.version, write, ResourceKind::CrossedPosition)?
                    {
                        crossed.push((&write.address, p));
                    }
                }
                Some(ResourceKind::IsolatedPosition) => {
                    if let LedgerResource::IsolatedPosition(p) =
                        decode(tx.version, write, ResourceKind::IsolatedPosition)?
                    {
                        isolated.push((&write.address, p));
                    }
                }
                Some(ResourceKind::ObjectCore) => object_cores.push(write),
                None => {}
            }
        }

        if crossed.is_empty() && isolated.is_empty() {
            return Ok(false);
        }

        // Object cores are only decoded for transactions that touch positions.
        let mut owners: HashMap<&Address, Address> = HashMap::with_capacity(object_cores.len());
        for write in object_cores {
            if let LedgerResource::ObjectCore(core) =
                decode(tx.version, write, ResourceKind::ObjectCore)?
            {
                owners.insert(&write.address, core.owner);
            }
        }

        let mut produced = 0usize;
        for (address, account) in crossed {
            for position in account.positions {
                let record = PerpPositionRecord::new(
                    address.clone(),
                    tx.version,
                    tx.timestamp,
                    address.clone(),
                    true,
                    position,
                );
                keep_latest(latest, record);
                produced += 1;
            }
        }

        for (address, sub_account) in isolated {
            let owner = owners
                .get(address)
                .cloned()
                .ok_or_else(|| ProcessError::OwnerNotFound {
                    version: tx.version,
                    address: address.clone(),
                })?;
            let record = PerpPositionRecord::new(
                address.clone(),
                tx.version,
                tx.timestamp,
                owner,
                false,
                sub_account.position,
            );
            keep_latest(latest, record);
            produced += 1;
        }

        debug!(version = tx.version, positions = produced, "Decoded position writes");
        Ok(true)
    }
}

fn decode(
    version: u64,
    write: &WriteResource,
    kind: ResourceKind,
) -> Result<LedgerResource, ProcessError> {
    kind.decode(write.data.get())
        .map_err(|source| ProcessError::Decode {
            version,
            address: write.address.clone(),
            type_tag: write.type_tag.clone(),
            source,
        })
}

/// Keep the record with the higher ledger version for its key.
fn keep_latest(latest: &mut BTreeMap<PositionKey, PerpPositionRecord>, record: PerpPositionRecord) {
    match latest.entry(record.key()) {
        Entry::Occupied(mut slot) => {
            if record.version > slot.get().version {
                slot.insert(record);
            }
        }
        Entry::Vacant(slot) => {
            slot.insert(record);
        }
    }
}
