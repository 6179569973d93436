//! Domain primitives: Address, MarketId, TimestampUs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::num::TryFromIntError;
use thiserror::Error;

/// Ledger timestamp in microseconds since Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimestampUs(pub u64);

impl TimestampUs {
    pub fn new(us: u64) -> Self {
        TimestampUs(us)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Store representation; values above `i64::MAX` are rejected rather than clamped.
    pub fn to_i64(&self) -> Result<i64, TryFromIntError> {
        i64::try_from(self.0)
    }

    pub fn try_from_i64(us: i64) -> Result<Self, TryFromIntError> {
        u64::try_from(us).map(TimestampUs)
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(self.to_i64().ok()?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("empty address")]
    Empty,
    #[error("address {0:?} is longer than 32 bytes")]
    TooLong(String),
    #[error("address {0:?} is not hex")]
    NotHex(String),
}

/// On-chain account or object address in long form: `0x` + 64 lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Address(String);

impl Address {
    /// Parse and normalise an address; short forms such as `0x1` are left-padded.
    pub fn parse(raw: &str) -> Result<Self, AddressParseError> {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if body.is_empty() {
            return Err(AddressParseError::Empty);
        }
        if body.len() > 64 {
            return Err(AddressParseError::TooLong(raw.to_string()));
        }
        let padded = format!("{:0>64}", body.to_ascii_lowercase());
        let bytes =
            hex::decode(&padded).map_err(|_| AddressParseError::NotHex(raw.to_string()))?;
        Ok(Address(format!("0x{}", hex::encode(bytes))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Market identifier carried in a position's `market.inner`.
///
/// `0x`-prefixed hex normalises like an [`Address`]; any other text, such as `BTC`,
/// is kept as given (trimmed).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MarketId(String);

impl MarketId {
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        let hex_form = trimmed.starts_with("0x") || trimmed.starts_with("0X");
        match Address::parse(trimmed) {
            Ok(addr) if hex_form => MarketId(addr.0),
            _ => MarketId(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Address> for MarketId {
    fn from(addr: Address) -> Self {
        MarketId(addr.0)
    }
}

impl std::fmt::Display for MarketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for MarketId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(MarketId::new(&raw))
    }
}
