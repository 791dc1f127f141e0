//! Token quantities: unsigned 256-bit `Amount` and signed `Balance`.
//!
//! Both cross the JSON boundary as lowercase hexadecimal strings without a `0x` prefix.
//! `Amount` is canonically encoded as 32 little-endian bytes.

use std::{fmt, str::FromStr};

use alloy_primitives::U256;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    codec::{Canonical, Reader},
    error::{FormatError, ValidationError},
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(U256);

impl Amount {
    pub const ZERO: Self = Self(U256::ZERO);
    pub const MAX: Self = Self(U256::MAX);

    pub const fn new(value: U256) -> Self {
        Self(value)
    }

    pub const fn as_u256(&self) -> &U256 {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn from_hex(value: &str) -> Result<Self, ValidationError> {
        let digits = value.strip_prefix("0x").unwrap_or(value);
        if digits.is_empty() {
            return Err(ValidationError::InvalidAmount("empty hex string".to_string()));
        }
        U256::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|err| ValidationError::InvalidAmount(format!("{value}: {err}")))
    }

    pub fn to_hex(&self) -> String {
        format!("{:x}", self.0)
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(U256::from(value))
    }
}

impl From<U256> for Amount {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl FromStr for Amount {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount(0x{})", self.to_hex())
    }
}

impl Canonical for Amount {
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0.to_le_bytes::<32>());
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
        let bytes: [u8; 32] = reader.read_array()?;
        Ok(Self(U256::from_le_bytes(bytes)))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(D::Error::custom)
    }
}

/// Account balance as reported by validators. May be temporarily negative, bounded in
/// magnitude by `2^256 - 1`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Balance {
    negative: bool,
    magnitude: U256,
}

impl Balance {
    pub const ZERO: Self = Self {
        negative: false,
        magnitude: U256::ZERO,
    };

    pub fn from_amount(amount: Amount) -> Self {
        Self {
            negative: false,
            magnitude: amount.0,
        }
    }

    pub fn negative(amount: Amount) -> Self {
        Self {
            negative: !amount.is_zero(),
            magnitude: amount.0,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn magnitude(&self) -> Amount {
        Amount(self.magnitude)
    }

    /// The balance as a spendable amount, or `None` when negative.
    pub fn as_amount(&self) -> Option<Amount> {
        (!self.negative).then_some(Amount(self.magnitude))
    }

    pub fn to_hex(&self) -> String {
        if self.negative {
            format!("-{:x}", self.magnitude)
        } else {
            format!("{:x}", self.magnitude)
        }
    }

    pub fn from_hex(value: &str) -> Result<Self, ValidationError> {
        match value.strip_prefix('-') {
            Some(rest) => Amount::from_hex(rest).map(Self::negative),
            None => Amount::from_hex(value).map(Self::from_amount),
        }
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Balance({})", self.to_hex())
    }
}

impl Serialize for Balance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Balance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(D::Error::custom)
    }
}
