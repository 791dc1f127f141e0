use std::{fmt, str::FromStr};

use bech32::{Bech32m, Hrp};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    codec::{Canonical, Reader},
    error::{FormatError, ValidationError},
};

pub type Nonce = u64;

/// Optional opaque payload attached to a transfer.
pub type UserData = Option<[u8; 32]>;

/// Human-readable part of bech32m addresses.
pub const ADDRESS_HRP: Hrp = Hrp::parse_unchecked("set");

// Byte arrays cross the JSON boundary as arrays of integers, which serde only derives up to
// 32 elements, so the impls are written out for every width.
macro_rules! impl_fixed_bytes_id {
    ($name:ident, $len:expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn from_slice(bytes: &[u8]) -> Result<Self, ValidationError> {
                if bytes.len() != Self::LEN {
                    return Err(ValidationError::InvalidLength {
                        kind: stringify!($name),
                        expected: Self::LEN,
                        actual: bytes.len(),
                    });
                }
                let mut out = [0u8; Self::LEN];
                out.copy_from_slice(bytes);
                Ok(Self(out))
            }

            pub fn from_hex(value: &str) -> Result<Self, ValidationError> {
                let stripped = value.strip_prefix("0x").unwrap_or(value);
                let bytes =
                    hex::decode(stripped).map_err(|err| ValidationError::InvalidHex(err.to_string()))?;
                Self::from_slice(&bytes)
            }

            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub const fn into_inner(self) -> [u8; $len] {
                self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self([0u8; Self::LEN])
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(0x{})", stringify!($name), self.to_hex())
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(value: [u8; $len]) -> Self {
                Self::new(value)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = ValidationError;

            fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
                Self::from_slice(value)
            }
        }

        impl Canonical for $name {
            fn encode_into(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.0);
            }

            fn decode_from(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
                Ok(Self(reader.read_array()?))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_seq(self.0.iter())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let bytes = Vec::<u8>::deserialize(deserializer)?;
                Self::from_slice(&bytes).map_err(D::Error::custom)
            }
        }
    };
}

impl_fixed_bytes_id!(Address, 32);
impl_fixed_bytes_id!(TokenId, 32);
impl_fixed_bytes_id!(Signature, 64);
impl_fixed_bytes_id!(TransactionHash, 32);

/// Validators are identified by their public key.
pub type ValidatorName = Address;

impl Address {
    /// bech32m form with the `set` prefix.
    pub fn to_bech32(&self) -> String {
        // Encoding 32 bytes under a valid, constant HRP cannot exceed the bech32 length limit.
        bech32::encode::<Bech32m>(ADDRESS_HRP, &self.0).unwrap_or_else(|_| self.to_hex())
    }

    pub fn from_bech32(value: &str) -> Result<Self, ValidationError> {
        let (hrp, data) =
            bech32::decode(value).map_err(|err| ValidationError::InvalidAddress(err.to_string()))?;
        if hrp != ADDRESS_HRP {
            return Err(ValidationError::InvalidAddress(format!(
                "unexpected prefix `{hrp}`"
            )));
        }
        Self::from_slice(&data)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bech32())
    }
}

/// Accepts bech32m (`set1...`) or 64-character hex, with or without `0x`.
impl FromStr for Address {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("set1") {
            Self::from_bech32(s)
        } else {
            Self::from_hex(s)
        }
    }
}

/// Native SET token: `0xFA575E70` followed by zeroes.
pub const NATIVE_TOKEN_ID: TokenId = TokenId::new([
    0xfa, 0x57, 0x5e, 0x70, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
]);

impl TokenId {
    pub const fn native() -> Self {
        NATIVE_TOKEN_ID
    }

    pub fn is_native(&self) -> bool {
        *self == NATIVE_TOKEN_ID
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Display for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::{Address, Signature, TokenId};

    #[test]
    fn address_bech32_round_trip() {
        let address = Address::new([0x42; 32]);
        let encoded = address.to_string();
        assert!(encoded.starts_with("set1"));
        assert_eq!(encoded.parse::<Address>().unwrap(), address);
    }

    #[test]
    fn address_parses_hex_with_and_without_prefix() {
        let address = Address::new([0x0f; 32]);
        let hex = address.to_hex();
        assert_eq!(hex.parse::<Address>().unwrap(), address);
        assert_eq!(format!("0x{hex}").parse::<Address>().unwrap(), address);
        assert!("0x1234".parse::<Address>().is_err());
    }

    #[test]
    fn signatures_serialize_as_integer_arrays() {
        let signature = Signature::new([7; 64]);
        let json = serde_json::to_value(signature).unwrap();
        let items = json.as_array().expect("array");
        assert_eq!(items.len(), 64);
        assert_eq!(items[0], serde_json::json!(7));
        let back: Signature = serde_json::from_value(json).unwrap();
        assert_eq!(back, signature);
    }

    #[test]
    fn wrong_length_json_is_rejected() {
        let err = serde_json::from_value::<Address>(serde_json::json!([1, 2, 3]));
        assert!(err.is_err());
    }

    #[test]
    fn native_token_prefix() {
        assert_eq!(&TokenId::native().as_bytes()[..4], &[0xfa, 0x57, 0x5e, 0x70]);
        assert!(TokenId::native().is_native());
    }
}
