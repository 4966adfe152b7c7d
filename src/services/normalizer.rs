use ethers::types::{Address, U256};
use ethers::utils::to_checksum;
use serde::Deserialize;

use crate::error::{AppError, Result};

/// Numeric input as callers supply it: a JSON integer or a base-10 string.
///
/// Floating-point JSON numbers are rejected when converted; amounts must be
/// pre-scaled to the smallest currency unit by the caller.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Integer(u64),
    Text(String),
    Float(f64),
    #[serde(skip)]
    Big(U256),
}

impl From<u64> for NumericInput {
    fn from(value: u64) -> Self {
        NumericInput::Integer(value)
    }
}

impl From<u32> for NumericInput {
    fn from(value: u32) -> Self {
        NumericInput::Integer(u64::from(value))
    }
}

impl From<u128> for NumericInput {
    fn from(value: u128) -> Self {
        NumericInput::Big(U256::from(value))
    }
}

impl From<U256> for NumericInput {
    fn from(value: U256) -> Self {
        NumericInput::Big(value)
    }
}

impl From<&str> for NumericInput {
    fn from(value: &str) -> Self {
        NumericInput::Text(value.to_string())
    }
}

impl From<String> for NumericInput {
    fn from(value: String) -> Self {
        NumericInput::Text(value)
    }
}

/// Validates a 20-byte hex address (`0x` + 40 hex digits, any case).
pub fn normalize_address(value: &str) -> Result<Address> {
    let trimmed = value.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| AppError::InvalidAddress(format!("missing 0x prefix: {}", value)))?;

    if hex_part.len() != 40 {
        return Err(AppError::InvalidAddress(format!(
            "expected 40 hex characters, got {}: {}",
            hex_part.len(),
            value
        )));
    }

    let bytes = hex::decode(hex_part)
        .map_err(|_| AppError::InvalidAddress(format!("non-hex characters: {}", value)))?;
    Ok(Address::from_slice(&bytes))
}

/// Like [`normalize_address`], but absent or malformed input yields `None`.
pub fn normalize_optional_address(value: Option<&str>) -> Option<Address> {
    let value = value?;
    if value.trim().is_empty() {
        return None;
    }
    normalize_address(value).ok()
}

/// EIP-55 checksummed rendering.
pub fn checksum(address: &Address) -> String {
    to_checksum(address, None)
}

/// Parses an unsigned base-10 integer into `U256`.
pub fn to_big_int(value: impl Into<NumericInput>) -> Result<U256> {
    match value.into() {
        NumericInput::Integer(value) => Ok(U256::from(value)),
        NumericInput::Big(value) => Ok(value),
        NumericInput::Float(value) => Err(AppError::InvalidNumeric(format!(
            "{} is not an integer; pass large or fractional amounts as base-10 strings in the smallest unit",
            value
        ))),
        NumericInput::Text(text) => parse_decimal_integer(&text),
    }
}

fn parse_decimal_integer(text: &str) -> Result<U256> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidNumeric("empty value".to_string()));
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::InvalidNumeric(format!(
            "not a base-10 integer literal: {}",
            text
        )));
    }
    U256::from_dec_str(trimmed)
        .map_err(|e| AppError::InvalidNumeric(format!("{}: {:?}", text, e)))
}

/// Normalizes every address of a list, failing on the first invalid entry.
pub fn normalize_addresses(values: &[String]) -> Result<Vec<Address>> {
    values.iter().map(|value| normalize_address(value)).collect()
}

/// Converts every numeric of a list, failing on the first invalid entry.
pub fn to_big_ints(values: &[NumericInput]) -> Result<Vec<U256>> {
    values.iter().map(|value| to_big_int(value.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_address_returns_checksum_form() {
        let address = normalize_address("0x2a6f460129dbaeb66fda5fcbd5b3b0ccf7791bfd").unwrap();
        assert_eq!(
            checksum(&address),
            "0x2A6f460129DBAeB66Fda5FcbD5b3b0CCf7791Bfd"
        );
    }

    #[test]
    fn normalize_address_is_case_insensitive() {
        let lower = normalize_address("0x2a6f460129dbaeb66fda5fcbd5b3b0ccf7791bfd").unwrap();
        let upper = normalize_address("0x2A6F460129DBAEB66FDA5FCBD5B3B0CCF7791BFD").unwrap();
        let mixed = normalize_address("0x2A6f460129DBAeB66Fda5FcbD5b3b0CCf7791Bfd").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower, mixed);
    }

    #[test]
    fn normalize_address_rejects_malformed_input() {
        for bad in [
            "",
            "0x",
            "2a6f460129dbaeb66fda5fcbd5b3b0ccf7791bfd",
            "0x2a6f460129dbaeb66fda5fcbd5b3b0ccf7791bf",
            "0x2a6f460129dbaeb66fda5fcbd5b3b0ccf7791bfdd",
            "0xzz6f460129dbaeb66fda5fcbd5b3b0ccf7791bfd",
        ] {
            let result = normalize_address(bad);
            assert!(
                matches!(result, Err(AppError::InvalidAddress(_))),
                "expected InvalidAddress for {:?}",
                bad
            );
        }
    }

    #[test]
    fn normalize_optional_address_swallows_absent_and_invalid() {
        assert_eq!(normalize_optional_address(None), None);
        assert_eq!(normalize_optional_address(Some("  ")), None);
        assert_eq!(normalize_optional_address(Some("0x12")), None);
        assert!(normalize_optional_address(Some(
            "0x2a6f460129dbaeb66fda5fcbd5b3b0ccf7791bfd"
        ))
        .is_some());
    }

    #[test]
    fn to_big_int_round_trips_integers_and_strings() {
        assert_eq!(to_big_int(42u64).unwrap(), U256::from(42u64));
        assert_eq!(to_big_int("42").unwrap(), U256::from(42u64));
        assert_eq!(
            to_big_int("1000000000000000000").unwrap(),
            U256::exp10(18)
        );
        assert_eq!(to_big_int(u128::MAX).unwrap(), U256::from(u128::MAX));
        assert_eq!(to_big_int(U256::MAX).unwrap(), U256::MAX);
    }

    #[test]
    fn to_big_int_rejects_fractions_and_garbage() {
        for bad in ["1.5", "-1", "abc", "", "0x10", "1e18", "+3"] {
            assert!(
                matches!(to_big_int(bad), Err(AppError::InvalidNumeric(_))),
                "expected InvalidNumeric for {:?}",
                bad
            );
        }
        assert!(matches!(
            to_big_int(NumericInput::Float(1.0)),
            Err(AppError::InvalidNumeric(_))
        ));
    }

    #[test]
    fn to_big_int_rejects_overflow() {
        let too_big = format!("{}0", U256::MAX);
        assert!(matches!(
            to_big_int(too_big.as_str()),
            Err(AppError::InvalidNumeric(_))
        ));
    }

    #[test]
    fn numeric_input_deserializes_numbers_and_strings() {
        let int: NumericInput = serde_json::from_str("42").unwrap();
        let text: NumericInput = serde_json::from_str("\"42\"").unwrap();
        let float: NumericInput = serde_json::from_str("1.5").unwrap();
        assert_eq!(to_big_int(int).unwrap(), U256::from(42u64));
        assert_eq!(to_big_int(text).unwrap(), U256::from(42u64));
        assert!(to_big_int(float).is_err());
    }
}
