use num_bigint::BigInt;
use serde::{Deserialize, Deserializer, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecimalError {
    #[error("empty time value")]
    Empty,
    #[error("not a base-10 integer: {0:?}")]
    Invalid(String),
}

/// Parse a signed base-10 integer, tolerating surrounding whitespace and a
/// leading `+`.
pub fn parse_decimal(text: &str) -> Result<BigInt, DecimalError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DecimalError::Empty);
    }
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let unsigned = digits.strip_prefix('-').unwrap_or(digits);
    if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecimalError::Invalid(text.to_string()));
    }
    BigInt::parse_bytes(digits.as_bytes(), 10).ok_or_else(|| DecimalError::Invalid(text.to_string()))
}

/// `BigInt` as a base-10 string, for `#[serde(with = "crate::decimal")]`.
/// JSON numbers lose precision past 2^53.
pub fn serialize<S: Serializer>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigInt, D::Error> {
    let text = String::deserialize(deserializer)?;
    parse_decimal(&text).map_err(serde::de::Error::custom)
}

pub mod option {
    use num_bigint::BigInt;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<BigInt>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.collect_str(v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<BigInt>, D::Error> {
        let text: Option<String> = Option::deserialize(deserializer)?;
        text.map(|t| super::parse_decimal(&t).map_err(serde::de::Error::custom))
            .transpose()
    }
}
