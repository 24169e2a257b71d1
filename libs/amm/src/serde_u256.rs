//! Serde helpers carrying 256-bit amounts as decimal strings
//!
//! `ethers` serializes `U256` as `0x` hex; amounts in settlements and
//! configuration files read better in decimal. Deserialization accepts a
//! decimal string, a `0x` hex string or a plain integer.

use ethers_core::types::U256;
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;

pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    deserializer.deserialize_any(U256Visitor)
}

/// Parse a decimal or `0x`-prefixed hex amount
pub fn parse(text: &str) -> Result<U256, String> {
    let text = text.trim().replace('_', "");
    match text.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| format!("{text}: {e}")),
        None => U256::from_dec_str(&text).map_err(|e| format!("{text}: {e:?}")),
    }
}

struct U256Visitor;

impl<'de> Visitor<'de> for U256Visitor {
    type Value = U256;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a non-negative integer or a decimal/hex string")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<U256, E> {
        Ok(U256::from(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<U256, E> {
        u64::try_from(value)
            .map(U256::from)
            .map_err(|_| E::custom(format!("negative amount {value}")))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<U256, E> {
        parse(value).map_err(E::custom)
    }
}

/// Same encoding for `Option<U256>`
pub mod option {
    use super::*;
    use serde::Deserialize;

    pub fn serialize<S: Serializer>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => super::serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<U256>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "super")] U256);

        let wrapped: Option<Wrapper> = Option::deserialize(deserializer)?;
        Ok(wrapped.map(|Wrapper(value)| value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Amount {
        #[serde(with = "super")]
        value: U256,
    }

    #[test]
    fn test_decimal_round_trip() {
        let amount = Amount {
            value: U256::from_dec_str("415974997160672055381700").unwrap(),
        };
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, r#"{"value":"415974997160672055381700"}"#);
        assert_eq!(serde_json::from_str::<Amount>(&json).unwrap(), amount);
    }

    #[test]
    fn test_accepts_hex_and_integers() {
        let hex: Amount = serde_json::from_str(r#"{"value":"0xff"}"#).unwrap();
        assert_eq!(hex.value, U256::from(255u64));
        let int: Amount = serde_json::from_str(r#"{"value":100000}"#).unwrap();
        assert_eq!(int.value, U256::from(100_000u64));
        assert!(serde_json::from_str::<Amount>(r#"{"value":-1}"#).is_err());
    }

    #[test]
    fn test_parse_allows_separators() {
        assert_eq!(parse("1_000_000").unwrap(), U256::from(1_000_000u64));
        assert!(parse("12abc").is_err());
    }
}
