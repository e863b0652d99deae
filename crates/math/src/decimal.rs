//! Serde adapters that write [`BigUint`] as decimal strings
//!
//! JSON numbers lose precision past 2^53 in most readers, so big integers are
//! written as strings. Reading accepts either a string or a plain unsigned
//! JSON number, which keeps hand-written config files convenient.
//!
//! ```ignore
//! #[serde(with = "primebench_math::decimal")]
//! number: BigUint,
//! #[serde(with = "primebench_math::decimal::vec")]
//! numbers: Vec<BigUint>,
//! ```

use num_bigint::BigUint;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum DecimalRepr {
    Text(String),
    Number(u64),
}

impl DecimalRepr {
    fn into_biguint<E: de::Error>(self) -> Result<BigUint, E> {
        match self {
            DecimalRepr::Number(n) => Ok(BigUint::from(n)),
            DecimalRepr::Text(text) => parse(&text).map_err(E::custom),
        }
    }
}

/// Parse a decimal string, ignoring `_` separators and surrounding spaces.
pub fn parse(text: &str) -> Result<BigUint, String> {
    let cleaned: String = text.trim().chars().filter(|c| *c != '_').collect();
    if cleaned.is_empty() {
        return Err("empty integer literal".to_string());
    }
    BigUint::parse_bytes(cleaned.as_bytes(), 10)
        .ok_or_else(|| format!("invalid unsigned integer: {text}"))
}

pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_str_radix(10))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
    DecimalRepr::deserialize(deserializer)?.into_biguint()
}

/// Same encoding for a list of integers.
pub mod vec {
    use super::*;
    use serde::ser::SerializeSeq;

    pub fn serialize<S: Serializer>(values: &[BigUint], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(&value.to_str_radix(10))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<BigUint>, D::Error> {
        Vec::<DecimalRepr>::deserialize(deserializer)?
            .into_iter()
            .map(DecimalRepr::into_biguint)
            .collect()
    }
}
