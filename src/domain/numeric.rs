//! Exact-precision unsigned integers for Move `u64`/`u128`/`u256` fields.
//!
//! The ledger API renders wide integers as quoted decimal strings, but small
//! values occasionally show up as bare numerals. Decoding accepts both forms,
//! encoding always emits a quoted decimal string so consumers that parse JSON
//! numbers as binary floats never lose precision.
//!
//! JSON decoding works on the raw value text (via `serde_json::value::RawValue`),
//! so these types must be deserialized with `serde_json` directly, not through
//! an intermediate `serde_json::Value`.

use num_bigint::BigUint;
use num_traits::Zero;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use sqlx::decode::Decode;
use sqlx::encode::{Encode, IsNull};
use sqlx::error::BoxDynError;
use sqlx::sqlite::{Sqlite, SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef};
use sqlx::{Type, TypeInfo, ValueRef};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Decode failure for an unsigned integer of `bits` width.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumericError {
    #[error("empty value for uint{bits}")]
    Empty { bits: u16 },
    #[error("null value for uint{bits}")]
    Null { bits: u16 },
    #[error("invalid uint{bits} {value:?}")]
    Invalid { bits: u16, value: String },
    #[error("negative uint{bits} {value:?}")]
    Negative { bits: u16, value: String },
    #[error("uint{bits} overflow {value:?}")]
    Overflow { bits: u16, value: String },
    #[error("cannot decode uint{bits} from store type {type_name}")]
    UnsupportedStoreType { bits: u16, type_name: String },
}

/// Extract the decimal text from a raw JSON value: a quoted string or a bare numeral.
fn json_numeric_text(raw: &str, bits: u16) -> Result<String, NumericError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NumericError::Empty { bits });
    }
    if trimmed == "null" {
        return Err(NumericError::Null { bits });
    }
    if trimmed.starts_with('"') {
        return serde_json::from_str::<String>(trimmed).map_err(|_| NumericError::Invalid {
            bits,
            value: trimmed.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// Validate decimal text and return the digit run.
///
/// Only plain ASCII digits are accepted. A leading `-` is reported as
/// `Negative` rather than `Invalid`.
fn checked_digits(text: &str, bits: u16) -> Result<&str, NumericError> {
    let s = text.trim();
    if s.is_empty() {
        return Err(NumericError::Empty { bits });
    }
    if let Some(rest) = s.strip_prefix('-') {
        if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NumericError::Negative {
                bits,
                value: s.to_string(),
            });
        }
        return Err(NumericError::Invalid {
            bits,
            value: s.to_string(),
        });
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NumericError::Invalid {
            bits,
            value: s.to_string(),
        });
    }
    Ok(s)
}

/// Unsigned 64-bit integer with string-preserving codecs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uint64(pub u64);

/// Unsigned 128-bit integer with string-preserving codecs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uint128(pub u128);

/// Unsigned 256-bit integer backed by an arbitrary-precision integer bounded to 256 bits.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uint256(BigUint);

impl Uint64 {
    pub const BITS: u16 = 64;

    pub fn new(value: u64) -> Self {
        Uint64(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    /// Parse decimal text (no JSON quoting).
    pub fn parse_decimal(text: &str) -> Result<Self, NumericError> {
        let digits = checked_digits(text, Self::BITS)?;
        digits
            .parse::<u64>()
            .map(Uint64)
            .map_err(|_| NumericError::Overflow {
                bits: Self::BITS,
                value: digits.to_string(),
            })
    }
}

impl Uint128 {
    pub const BITS: u16 = 128;

    pub fn new(value: u128) -> Self {
        Uint128(value)
    }

    pub fn get(&self) -> u128 {
        self.0
    }

    /// Parse decimal text (no JSON quoting).
    pub fn parse_decimal(text: &str) -> Result<Self, NumericError> {
        let digits = checked_digits(text, Self::BITS)?;
        digits
            .parse::<u128>()
            .map(Uint128)
            .map_err(|_| NumericError::Overflow {
                bits: Self::BITS,
                value: digits.to_string(),
            })
    }
}

impl Uint256 {
    pub const BITS: u16 = 256;

    /// Largest representable value, `2^256 - 1`.
    pub fn max_value() -> Self {
        Uint256((BigUint::from(1u8) << 256usize) - 1u8)
    }

    /// Wrap a big integer, rejecting anything wider than 256 bits.
    pub fn from_biguint(value: BigUint) -> Result<Self, NumericError> {
        if value.bits() > u64::from(Self::BITS) {
            return Err(NumericError::Overflow {
                bits: Self::BITS,
                value: value.to_string(),
            });
        }
        Ok(Uint256(value))
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Parse decimal text (no JSON quoting).
    pub fn parse_decimal(text: &str) -> Result<Self, NumericError> {
        let digits = checked_digits(text, Self::BITS)?;
        let value = BigUint::from_str(digits).map_err(|_| NumericError::Invalid {
            bits: Self::BITS,
            value: digits.to_string(),
        })?;
        Self::from_biguint(value)
    }
}

impl From<u64> for Uint64 {
    fn from(value: u64) -> Self {
        Uint64(value)
    }
}

impl From<u128> for Uint128 {
    fn from(value: u128) -> Self {
        Uint128(value)
    }
}

impl From<u64> for Uint128 {
    fn from(value: u64) -> Self {
        Uint128(u128::from(value))
    }
}

impl From<u128> for Uint256 {
    fn from(value: u128) -> Self {
        Uint256(BigUint::from(value))
    }
}

/// Shared JSON and SQLite codecs. Every type provides `BITS`, `parse_decimal`
/// and `Display`; the impls below are identical across widths.
macro_rules! impl_uint_codecs {
    ($ty:ident) => {
        impl $ty {
            /// Decode from raw JSON text: a quoted decimal string or a bare numeral.
            pub fn from_json_text(raw: &str) -> Result<Self, NumericError> {
                let text = json_numeric_text(raw, Self::BITS)?;
                Self::parse_decimal(&text)
            }

            /// Encode as a quoted JSON decimal string.
            pub fn to_json_text(&self) -> String {
                format!("\"{}\"", self)
            }
        }

        impl FromStr for $ty {
            type Err = NumericError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse_decimal(s)
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = Box::<RawValue>::deserialize(deserializer)?;
                Self::from_json_text(raw.get()).map_err(D::Error::custom)
            }
        }

        impl Type<Sqlite> for $ty {
            fn type_info() -> SqliteTypeInfo {
                <String as Type<Sqlite>>::type_info()
            }

            fn compatible(ty: &SqliteTypeInfo) -> bool {
                <String as Type<Sqlite>>::compatible(ty)
                    || <i64 as Type<Sqlite>>::compatible(ty)
                    || <Vec<u8> as Type<Sqlite>>::compatible(ty)
            }
        }

        impl<'q> Encode<'q, Sqlite> for $ty {
            fn encode_by_ref(&self, buf: &mut Vec<SqliteArgumentValue<'q>>) -> IsNull {
                <String as Encode<'q, Sqlite>>::encode(self.to_string(), buf)
            }
        }

        impl<'r> Decode<'r, Sqlite> for $ty {
            fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
                if value.is_null() {
                    return Ok(Self::default());
                }
                let type_name = value.type_info().name().to_string();
                let text = match type_name.as_str() {
                    "INTEGER" => {
                        let v = <i64 as Decode<'r, Sqlite>>::decode(value)?;
                        v.to_string()
                    }
                    "TEXT" => <String as Decode<'r, Sqlite>>::decode(value)?,
                    "BLOB" => {
                        let bytes = <Vec<u8> as Decode<'r, Sqlite>>::decode(value)?;
                        String::from_utf8(bytes)?
                    }
                    _ => {
                        return Err(Box::new(NumericError::UnsupportedStoreType {
                            bits: Self::BITS,
                            type_name,
                        }))
                    }
                };
                // Empty store text is a zero value, unlike the JSON path.
                if text.trim().is_empty() {
                    return Ok(Self::default());
                }
                Ok(Self::parse_decimal(&text)?)
            }
        }
    };
}

impl_uint_codecs!(Uint64);
impl_uint_codecs!(Uint128);
impl_uint_codecs!(Uint256);

impl fmt::Display for Uint64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Uint128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Uint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
