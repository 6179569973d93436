//! Wire types for committed ledger transactions and their write sets.

use super::DataSourceError;
use crate::domain::{Address, TimestampUs, Uint64};
use serde::Deserialize;
use serde_json::value::RawValue;

/// Transaction kind tag of user-submitted transactions.
pub const USER_TRANSACTION_KIND: &str = "user_transaction";

/// A user transaction with its write set, in ledger order.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub version: u64,
    pub timestamp: TimestampUs,
    pub changes: Vec<WriteSetChange>,
}

impl Transaction {
    pub fn new(version: u64, timestamp: TimestampUs, changes: Vec<WriteSetChange>) -> Self {
        Self {
            version,
            timestamp,
            changes,
        }
    }

    /// Resource writes in write-set order; deletes and table items are skipped.
    pub fn write_resources(&self) -> impl Iterator<Item = &WriteResource> {
        self.changes.iter().filter_map(|change| match change {
            WriteSetChange::WriteResource(resource) => Some(resource),
            _ => None,
        })
    }
}

/// One effect of a transaction on ledger state.
#[derive(Debug, Clone)]
pub enum WriteSetChange {
    WriteResource(WriteResource),
    DeleteResource { address: Address, type_tag: String },
    WriteTableItem { handle: String, key: String },
    DeleteTableItem { handle: String, key: String },
    /// Module writes and any change type added upstream later.
    Other(String),
}

impl WriteSetChange {
    /// Build a resource write from a JSON payload.
    pub fn write_resource(
        address: Address,
        type_tag: impl Into<String>,
        payload: &serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        Ok(WriteSetChange::WriteResource(WriteResource {
            address,
            type_tag: type_tag.into(),
            data: RawValue::from_string(payload.to_string())?,
        }))
    }
}

/// A resource write: the resource type tag plus its undecoded payload.
#[derive(Debug, Clone)]
pub struct WriteResource {
    pub address: Address,
    pub type_tag: String,
    pub data: Box<RawValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionKind {
    User,
    Other(String),
}

impl TransactionKind {
    fn from_tag(tag: &str) -> Self {
        if tag == USER_TRANSACTION_KIND {
            TransactionKind::User
        } else {
            TransactionKind::Other(tag.to_string())
        }
    }
}

/// Any committed transaction; only user transactions carry a decoded write set.
#[derive(Debug, Clone)]
pub struct CommittedTransaction {
    pub kind: TransactionKind,
    pub version: u64,
    pub timestamp: TimestampUs,
    pub changes: Vec<WriteSetChange>,
}

impl CommittedTransaction {
    pub fn user(transaction: Transaction) -> Self {
        Self {
            kind: TransactionKind::User,
            version: transaction.version,
            timestamp: transaction.timestamp,
            changes: transaction.changes,
        }
    }

    pub fn other(kind: &str, version: u64, timestamp: TimestampUs) -> Self {
        Self {
            kind: TransactionKind::from_tag(kind),
            version,
            timestamp,
            changes: Vec::new(),
        }
    }
}

/// One page of the upstream transaction listing.
#[derive(Debug, Clone, Default)]
pub struct TransactionPage {
    /// Rows returned upstream, including non-user transactions.
    pub fetched: usize,
    /// Version and timestamp of the last row of any kind.
    pub end: Option<(u64, TimestampUs)>,
    /// User transactions only, in ledger order.
    pub transactions: Vec<Transaction>,
}

impl TransactionPage {
    pub fn from_committed(rows: Vec<CommittedTransaction>) -> Self {
        let fetched = rows.len();
        let end = rows.last().map(|row| (row.version, row.timestamp));
        let transactions = rows
            .into_iter()
            .filter(|row| row.kind == TransactionKind::User)
            .map(|row| Transaction::new(row.version, row.timestamp, row.changes))
            .collect();
        Self {
            fetched,
            end,
            transactions,
        }
    }
}

#[derive(Deserialize)]
struct RawCommittedTransaction {
    #[serde(rename = "type")]
    kind: String,
    version: Uint64,
    #[serde(default)]
    timestamp: Option<Uint64>,
    #[serde(default)]
    changes: Option<Box<RawValue>>,
}

#[derive(Deserialize)]
struct RawWriteSetChange {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    address: Option<Address>,
    #[serde(default)]
    resource: Option<String>,
    #[serde(default)]
    handle: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    data: Option<Box<RawValue>>,
}

#[derive(Deserialize)]
struct RawMoveResource {
    #[serde(rename = "type")]
    type_tag: String,
    data: Box<RawValue>,
}

/// Parse a `GET /transactions` response body.
pub fn parse_transactions_page(body: &[u8]) -> Result<TransactionPage, DataSourceError> {
    let rows: Vec<RawCommittedTransaction> = serde_json::from_slice(body)
        .map_err(|e| DataSourceError::ParseError(format!("transactions: {}", e)))?;

    let mut committed = Vec::with_capacity(rows.len());
    for row in rows {
        let version = row.version.get();
        let timestamp = TimestampUs::new(row.timestamp.map(|t| t.get()).unwrap_or_default());
        let kind = TransactionKind::from_tag(&row.kind);
        let changes = match (&kind, row.changes) {
            (TransactionKind::User, Some(raw)) => parse_changes(version, raw.get())?,
            _ => Vec::new(),
        };
        committed.push(CommittedTransaction {
            kind,
            version,
            timestamp,
            changes,
        });
    }

    Ok(TransactionPage::from_committed(committed))
}

fn parse_changes(version: u64, raw: &str) -> Result<Vec<WriteSetChange>, DataSourceError> {
    let rows: Vec<RawWriteSetChange> = serde_json::from_str(raw).map_err(|e| {
        DataSourceError::ParseError(format!("changes of version {}: {}", version, e))
    })?;
    rows.into_iter()
        .map(|row| parse_change(version, row))
        .collect()
}

fn parse_change(version: u64, row: RawWriteSetChange) -> Result<WriteSetChange, DataSourceError> {
    let missing = |field: &str| {
        DataSourceError::ParseError(format!(
            "{} change in version {} has no {}",
            row.kind, version, field
        ))
    };

    let change = match row.kind.as_str() {
        "write_resource" => {
            let address = row.address.clone().ok_or_else(|| missing("address"))?;
            let data = row.data.as_ref().ok_or_else(|| missing("data"))?;
            let resource: RawMoveResource = serde_json::from_str(data.get()).map_err(|e| {
                DataSourceError::ParseError(format!(
                    "write_resource in version {}: {}",
                    version, e
                ))
            })?;
            WriteSetChange::WriteResource(WriteResource {
                address,
                type_tag: resource.type_tag,
                data: resource.data,
            })
        }
        "delete_resource" => WriteSetChange::DeleteResource {
            address: row.address.clone().ok_or_else(|| missing("address"))?,
            type_tag: row.resource.clone().unwrap_or_default(),
        },
        "write_table_item" => WriteSetChange::WriteTableItem {
            handle: row.handle.clone().unwrap_or_default(),
            key: row.key.clone().unwrap_or_default(),
        },
        "delete_table_item" => WriteSetChange::DeleteTableItem {
            handle: row.handle.clone().unwrap_or_default(),
            key: row.key.clone().unwrap_or_default(),
        },
        other => WriteSetChange::Other(other.to_string()),
    };
    Ok(change)
}
