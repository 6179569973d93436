//! Move payload schemas for perp positions as rendered by the ledger JSON API.

use super::numeric::{Uint128, Uint64};
use super::primitives::{Address, MarketId};
use serde::{Deserialize, Serialize};

/// Move `Option<T>`, rendered as `{"vec": []}` or `{"vec": [value]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOption<T> {
    pub vec: Vec<T>,
}

impl<T> MoveOption<T> {
    pub fn none() -> Self {
        MoveOption { vec: Vec::new() }
    }

    pub fn some(value: T) -> Self {
        MoveOption { vec: vec![value] }
    }

    pub fn get(&self) -> Option<&T> {
        self.vec.first()
    }
}

impl<T> Default for MoveOption<T> {
    fn default() -> Self {
        Self::none()
    }
}

/// Market reference, `{"inner": ".."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRef {
    pub inner: MarketId,
}

/// Signed amount encoded as sign flag plus magnitude.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedAmount {
    pub is_positive: bool,
    pub amount: Uint64,
}

impl SignedAmount {
    /// Signed value; the magnitude always fits since `|i128| > u64::MAX`.
    pub fn to_i128(&self) -> i128 {
        let magnitude = i128::from(self.amount.get());
        if self.is_positive {
            magnitude
        } else {
            -magnitude
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulativeIndex {
    pub index: Uint128,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId {
    pub order_id: Uint128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceIndexKey {
    pub trigger_price: Uint64,
    pub position_address: Address,
    pub limit_price: MoveOption<Uint64>,
    pub is_full_size: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTpSlKey {
    pub price_index: PriceIndexKey,
    pub order_id: OrderId,
}

/// Pending take-profit or stop-loss requests attached to a position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTpSls {
    pub full_sized: MoveOption<PendingTpSlKey>,
    pub fixed_sized: Vec<PendingTpSlKey>,
}

/// A single perpetual position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerpPosition {
    pub size: Uint64,
    /// Running sum of entry price times size; 128-bit to leave headroom.
    pub entry_px_times_size_sum: Uint128,
    pub avg_acquire_entry_px: Uint64,
    pub user_leverage: u32,
    pub max_allowed_leverage: u32,
    pub is_long: bool,
    pub funding_index_at_last_update: AccumulativeIndex,
    pub unrealized_funding_amount_before_last_update: SignedAmount,
    pub market: MarketRef,
    pub tp_reqs: PendingTpSls,
    pub sl_reqs: PendingTpSls,
    pub reduce_only_orders: Vec<OrderId>,
}

impl PerpPosition {
    pub fn market(&self) -> &MarketId {
        &self.market.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> serde_json::Value {
        serde_json::json!({
            "size": "1357042816",
            "entry_px_times_size_sum": "96124480614400",
            "avg_acquire_entry_px": "70834",
            "user_leverage": 10,
            "max_allowed_leverage": 40,
            "is_long": true,
            "funding_index_at_last_update": { "index": "170141183460469231731684588685638315128" },
            "unrealized_funding_amount_before_last_update": { "is_positive": false, "amount": "12" },
            "market": { "inner": "0xbeef" },
            "tp_reqs": { "full_sized": { "vec": [] }, "fixed_sized": [] },
            "sl_reqs": {
                "full_sized": { "vec": [{
                    "price_index": {
                        "trigger_price": "60000",
                        "position_address": "0xa",
                        "limit_price": { "vec": ["59000"] },
                        "is_full_size": true
                    },
                    "order_id": { "order_id": "77" }
                }] },
                "fixed_sized": []
            },
            "reduce_only_orders": [{ "order_id": "5" }]
        })
    }

    #[test]
    fn test_decode_perp_position() {
        let text = sample_json().to_string();
        let pos: PerpPosition = serde_json::from_str(&text).unwrap();

        assert_eq!(pos.size, Uint64::new(1357042816));
        assert_eq!(
            pos.funding_index_at_last_update.index,
            Uint128::new(170141183460469231731684588685638315128)
        );
        assert_eq!(pos.user_leverage, 10);
        assert!(pos.is_long);
        assert_eq!(pos.unrealized_funding_amount_before_last_update.to_i128(), -12);
        assert_eq!(pos.market(), &MarketId::from(Address::parse("0xbeef").unwrap()));

        let sl = pos.sl_reqs.full_sized.get().unwrap();
        assert_eq!(sl.order_id.order_id, Uint128::new(77));
        assert_eq!(sl.price_index.limit_price.get(), Some(&Uint64::new(59000)));
        assert_eq!(pos.reduce_only_orders, vec![OrderId { order_id: Uint128::new(5) }]);
    }

    #[test]
    fn test_decode_rejects_negative_size() {
        let mut json = sample_json();
        json["size"] = serde_json::json!("-3");
        let err = serde_json::from_str::<PerpPosition>(&json.to_string()).unwrap_err();
        assert!(err.to_string().contains("negative uint64"));
    }

    #[test]
    fn test_decode_symbol_market() {
        let mut json = sample_json();
        json["market"] = serde_json::json!({ "inner": "BTC" });
        let pos: PerpPosition = serde_json::from_str(&json.to_string()).unwrap();
        assert_eq!(pos.market().as_str(), "BTC");
    }

    #[test]
    fn test_decode_requires_market() {
        let mut json = sample_json();
        json.as_object_mut().unwrap().remove("market");
        assert!(serde_json::from_str::<PerpPosition>(&json.to_string()).is_err());
    }
}
