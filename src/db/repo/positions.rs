//! Version-gated position upserts and reads.

use super::{decode_error, encode_error, version_from_i64, version_to_i64, Repository};
use crate::domain::{
    AccumulativeIndex, Address, MarketId, MarketRef, OrderId, PendingTpSls, PerpPosition,
    PerpPositionRecord, SignedAmount, TimestampUs, Uint128, Uint64,
};
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{QueryBuilder, Row};
use tracing::debug;

/// Rows per INSERT statement; 18 binds per row keeps well below SQLite's variable limit.
const UPSERT_CHUNK_ROWS: usize = 500;

const POSITION_COLUMNS: &str = "address, market, is_crossed, version, version_timestamp_us, owner, \
     size, entry_px_times_size_sum, avg_acquire_entry_px, user_leverage, max_allowed_leverage, \
     is_long, funding_index_at_last_update, unrealized_funding_amount_before_last_update, \
     reduce_only_orders, sl_reqs, tp_reqs, updated_at";

/// Result of a batched upsert. Rows not applied were older than or equal to the stored version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub submitted: usize,
    pub applied: u64,
}

impl UpsertOutcome {
    pub fn rejected(&self) -> u64 {
        (self.submitted as u64).saturating_sub(self.applied)
    }
}

/// Column values of one position row, encoded ahead of statement building.
struct PositionRow {
    address: String,
    market: String,
    is_crossed: bool,
    version: i64,
    version_timestamp_us: i64,
    owner: String,
    size: Uint64,
    entry_px_times_size_sum: Uint128,
    avg_acquire_entry_px: Uint64,
    user_leverage: i64,
    max_allowed_leverage: i64,
    is_long: bool,
    funding_index_at_last_update: Uint128,
    unrealized_funding: String,
    reduce_only_orders: String,
    sl_reqs: String,
    tp_reqs: String,
}

impl PositionRow {
    fn encode(record: &PerpPositionRecord) -> Result<Self, sqlx::Error> {
        let p = &record.position;
        Ok(Self {
            address: record.position_address.to_string(),
            market: record.market.to_string(),
            is_crossed: record.is_crossed,
            version: version_to_i64(record.version)?,
            version_timestamp_us: record.version_timestamp.to_i64().map_err(encode_error)?,
            owner: record.owner.to_string(),
            size: p.size,
            entry_px_times_size_sum: p.entry_px_times_size_sum,
            avg_acquire_entry_px: p.avg_acquire_entry_px,
            user_leverage: i64::from(p.user_leverage),
            max_allowed_leverage: i64::from(p.max_allowed_leverage),
            is_long: p.is_long,
            funding_index_at_last_update: p.funding_index_at_last_update.index,
            unrealized_funding: serde_json::to_string(
                &p.unrealized_funding_amount_before_last_update,
            )
            .map_err(encode_error)?,
            reduce_only_orders: serde_json::to_string(&p.reduce_only_orders)
                .map_err(encode_error)?,
            sl_reqs: serde_json::to_string(&p.sl_reqs).map_err(encode_error)?,
            tp_reqs: serde_json::to_string(&p.tp_reqs).map_err(encode_error)?,
        })
    }
}

fn record_from_row(row: &SqliteRow) -> Result<PerpPositionRecord, sqlx::Error> {
    let address = Address::parse(row.try_get::<&str, _>("address")?).map_err(decode_error)?;
    let market = MarketId::new(row.try_get::<&str, _>("market")?);
    let owner = Address::parse(row.try_get::<&str, _>("owner")?).map_err(decode_error)?;

    let unrealized: SignedAmount =
        serde_json::from_str(row.try_get("unrealized_funding_amount_before_last_update")?)
            .map_err(decode_error)?;
    let reduce_only_orders: Vec<OrderId> =
        serde_json::from_str(row.try_get("reduce_only_orders")?).map_err(decode_error)?;
    let sl_reqs: PendingTpSls =
        serde_json::from_str(row.try_get("sl_reqs")?).map_err(decode_error)?;
    let tp_reqs: PendingTpSls =
        serde_json::from_str(row.try_get("tp_reqs")?).map_err(decode_error)?;

    let position = PerpPosition {
        size: row.try_get("size")?,
        entry_px_times_size_sum: row.try_get("entry_px_times_size_sum")?,
        avg_acquire_entry_px: row.try_get("avg_acquire_entry_px")?,
        user_leverage: u32::try_from(row.try_get::<i64, _>("user_leverage")?)
            .map_err(decode_error)?,
        max_allowed_leverage: u32::try_from(row.try_get::<i64, _>("max_allowed_leverage")?)
            .map_err(decode_error)?,
        is_long: row.try_get("is_long")?,
        funding_index_at_last_update: AccumulativeIndex {
            index: row.try_get("funding_index_at_last_update")?,
        },
        unrealized_funding_amount_before_last_update: unrealized,
        market: MarketRef {
            inner: market.clone(),
        },
        tp_reqs,
        sl_reqs,
        reduce_only_orders,
    };

    Ok(PerpPositionRecord {
        position_address: address,
        market,
        is_crossed: row.try_get("is_crossed")?,
        version: version_from_i64(row.try_get("version")?)?,
        version_timestamp: TimestampUs::try_from_i64(row.try_get("version_timestamp_us")?)
            .map_err(decode_error)?,
        owner,
        position,
    })
}

impl Repository {
    /// Insert or update positions keyed by (address, market, is_crossed).
    ///
    /// An existing row is overwritten only when the incoming version is strictly
    /// greater than the stored one; older or equal versions are silently skipped,
    /// so a batch may apply partially. All chunks commit in one transaction.
    ///
    /// # Errors
    /// Returns an error if encoding or any statement fails; nothing is committed then.
    pub async fn upsert_positions(
        &self,
        records: &[PerpPositionRecord],
    ) -> Result<UpsertOutcome, sqlx::Error> {
        if records.is_empty() {
            return Ok(UpsertOutcome::default());
        }

        let rows = records
            .iter()
            .map(PositionRow::encode)
            .collect::<Result<Vec<_>, _>>()?;
        let updated_at = chrono::Utc::now().timestamp_millis();

        let mut applied = 0u64;
        let mut tx = self.pool.begin().await?;

        for chunk in rows.chunks(UPSERT_CHUNK_ROWS) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("INSERT INTO perp_positions ({}) ", POSITION_COLUMNS));
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(row.address.clone())
                    .push_bind(row.market.clone())
                    .push_bind(row.is_crossed)
                    .push_bind(row.version)
                    .push_bind(row.version_timestamp_us)
                    .push_bind(row.owner.clone())
                    .push_bind(row.size)
                    .push_bind(row.entry_px_times_size_sum)
                    .push_bind(row.avg_acquire_entry_px)
                    .push_bind(row.user_leverage)
                    .push_bind(row.max_allowed_leverage)
                    .push_bind(row.is_long)
                    .push_bind(row.funding_index_at_last_update)
                    .push_bind(row.unrealized_funding.clone())
                    .push_bind(row.reduce_only_orders.clone())
                    .push_bind(row.sl_reqs.clone())
                    .push_bind(row.tp_reqs.clone())
                    .push_bind(updated_at);
            });
            builder.push(
                r#"
                ON CONFLICT(address, market, is_crossed) DO UPDATE SET
                    version = excluded.version,
                    version_timestamp_us = excluded.version_timestamp_us,
                    owner = excluded.owner,
                    size = excluded.size,
                    entry_px_times_size_sum = excluded.entry_px_times_size_sum,
                    avg_acquire_entry_px = excluded.avg_acquire_entry_px,
                    user_leverage = excluded.user_leverage,
                    max_allowed_leverage = excluded.max_allowed_leverage,
                    is_long = excluded.is_long,
                    funding_index_at_last_update = excluded.funding_index_at_last_update,
                    unrealized_funding_amount_before_last_update = excluded.unrealized_funding_amount_before_last_update,
                    reduce_only_orders = excluded.reduce_only_orders,
                    sl_reqs = excluded.sl_reqs,
                    tp_reqs = excluded.tp_reqs,
                    updated_at = excluded.updated_at
                WHERE excluded.version > perp_positions.version
                "#,
            );

            let result = builder.build().execute(&mut *tx).await?;
            applied += result.rows_affected();
        }

        tx.commit().await?;

        let outcome = UpsertOutcome {
            submitted: records.len(),
            applied,
        };
        if outcome.rejected() > 0 {
            debug!(
                submitted = outcome.submitted,
                rejected = outcome.rejected(),
                "Skipped stale position writes"
            );
        }
        Ok(outcome)
    }

    /// Get one position by its full key.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored column cannot be decoded.
    pub async fn get_position(
        &self,
        address: &Address,
        market: &MarketId,
        is_crossed: bool,
    ) -> Result<Option<PerpPositionRecord>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM perp_positions WHERE address = ? AND market = ? AND is_crossed = ?",
            POSITION_COLUMNS
        ))
        .bind(address.as_str())
        .bind(market.as_str())
        .bind(is_crossed)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    /// All positions owned by `owner`, ordered by (address, market, is_crossed).
    pub async fn list_positions_by_owner(
        &self,
        owner: &Address,
    ) -> Result<Vec<PerpPositionRecord>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM perp_positions WHERE owner = ? \
             ORDER BY address ASC, market ASC, is_crossed ASC",
            POSITION_COLUMNS
        ))
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// Number of stored position rows.
    pub async fn count_positions(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM perp_positions")
            .fetch_one(&self.pool)
            .await?;
        row.try_get("n")
    }
}
