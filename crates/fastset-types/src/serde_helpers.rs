//! Serde adapters for wire fields whose JSON form differs from their Rust type.

/// `u128` values that fit in `u64` serialize as JSON numbers, larger ones as decimal strings.
/// Both forms are accepted when deserializing.
pub mod u128_number_or_string {
    use std::fmt;

    use serde::{
        de::{self, Visitor},
        Deserializer, Serializer,
    };

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        match u64::try_from(*value) {
            Ok(small) => serializer.serialize_u64(small),
            Err(_) => serializer.serialize_str(&value.to_string()),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        deserializer.deserialize_any(U128Visitor)
    }

    struct U128Visitor;

    impl<'de> Visitor<'de> for U128Visitor {
        type Value = u128;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an unsigned integer or a decimal string")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<u128, E> {
            Ok(u128::from(value))
        }

        fn visit_u128<E: de::Error>(self, value: u128) -> Result<u128, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<u128, E> {
            u128::try_from(value).map_err(|_| E::custom("negative timestamp"))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<u128, E> {
            value.parse().map_err(E::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Stamp {
        #[serde(with = "super::u128_number_or_string")]
        at: u128,
    }

    #[test]
    fn small_values_are_numbers() {
        let json = serde_json::to_value(Stamp { at: 42 }).unwrap();
        assert_eq!(json, serde_json::json!({ "at": 42 }));
    }

    #[test]
    fn large_values_are_strings_and_both_forms_parse() {
        let big = u128::from(u64::MAX) + 1;
        let json = serde_json::to_value(Stamp { at: big }).unwrap();
        assert_eq!(json, serde_json::json!({ "at": "18446744073709551616" }));
        assert_eq!(serde_json::from_value::<Stamp>(json).unwrap().at, big);
        let from_str: Stamp = serde_json::from_str(r#"{"at":"17"}"#).unwrap();
        assert_eq!(from_str.at, 17);
        assert!(serde_json::from_str::<Stamp>(r#"{"at":-1}"#).is_err());
    }
}
