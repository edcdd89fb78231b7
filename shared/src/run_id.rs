//! Run identifiers assigned by the agent contract
//!
//! A run id is an unsigned integer of arbitrary width. The agent emits it as
//! a 32-byte indexed event field, so it always round-trips through 256 bits
//! in practice, but nothing here truncates or rounds it.

use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Errors from parsing or re-encoding a run id
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunIdError {
    #[error("Run id must start with 0x: {0:?}")]
    MissingPrefix(String),

    #[error("Run id has no digits")]
    Empty,

    #[error("Run id contains non-hex characters: {0:?}")]
    InvalidHex(String),

    #[error("Run id {0} does not fit in 256 bits")]
    TooWide(RunId),
}

/// Non-negative integer identifying one oracle run.
///
/// Stored big-endian with leading zero bytes stripped, so equal values have
/// equal representations regardless of how they were written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RunId {
    bytes: Vec<u8>,
}

impl RunId {
    /// Parse a `0x`-prefixed hex quantity or word (e.g. an event topic)
    pub fn from_hex(s: &str) -> Result<Self, RunIdError> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| RunIdError::MissingPrefix(s.to_string()))?;

        if digits.is_empty() {
            return Err(RunIdError::Empty);
        }

        let padded;
        let even = if digits.len() % 2 == 1 {
            padded = format!("0{digits}");
            padded.as_str()
        } else {
            digits
        };

        let bytes = hex::decode(even).map_err(|_| RunIdError::InvalidHex(s.to_string()))?;
        Ok(Self::from_be_bytes(&bytes))
    }

    /// Build from big-endian bytes of any length
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        Self {
            bytes: bytes[first..].to_vec(),
        }
    }

    /// Encode as a 32-byte big-endian word for a `uint256` argument
    pub fn to_word(&self) -> Result<[u8; 32], RunIdError> {
        if self.bytes.len() > 32 {
            return Err(RunIdError::TooWide(self.clone()));
        }
        let mut word = [0u8; 32];
        word[32 - self.bytes.len()..].copy_from_slice(&self.bytes);
        Ok(word)
    }

    pub fn is_zero(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lower-case `0x` hex form without leading zeros
    pub fn to_hex(&self) -> String {
        if self.bytes.is_empty() {
            return "0x0".into();
        }
        let encoded = hex::encode(&self.bytes);
        format!("0x{}", encoded.trim_start_matches('0'))
    }
}

impl From<u64> for RunId {
    fn from(value: u64) -> Self {
        Self::from_be_bytes(&value.to_be_bytes())
    }
}

impl From<u128> for RunId {
    fn from(value: u128) -> Self {
        Self::from_be_bytes(&value.to_be_bytes())
    }
}

/// Decimal rendering by repeated long division over the byte string
impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bytes.is_empty() {
            return f.write_str("0");
        }

        let mut digits = Vec::new();
        let mut number = self.bytes.clone();

        while !number.is_empty() {
            let mut remainder: u32 = 0;
            let mut quotient = Vec::with_capacity(number.len());

            for byte in &number {
                let current = (remainder << 8) | u32::from(*byte);
                let q = current / 10;
                remainder = current % 10;
                if !(quotient.is_empty() && q == 0) {
                    quotient.push(q as u8);
                }
            }

            digits.push(b'0' + remainder as u8);
            number = quotient;
        }

        digits.reverse();
        // Only ASCII digits were pushed
        f.write_str(&String::from_utf8_lossy(&digits))
    }
}

impl Serialize for RunId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_word() {
        let id = RunId::from_hex(
            "0x000000000000000000000000000000000000000000000000000000000000002a",
        )
        .unwrap();
        assert_eq!(id, RunId::from(42u64));
        assert_eq!(id.to_string(), "42");
        assert_eq!(id.to_hex(), "0x2a");
    }

    #[test]
    fn test_odd_digit_count() {
        assert_eq!(RunId::from_hex("0x7").unwrap(), RunId::from(7u64));
        assert_eq!(RunId::from_hex("0x100").unwrap(), RunId::from(256u64));
    }

    #[test]
    fn test_zero() {
        let zero = RunId::from_hex("0x00").unwrap();
        assert!(zero.is_zero());
        assert_eq!(zero.to_string(), "0");
        assert_eq!(zero.to_hex(), "0x0");
    }

    #[test]
    fn test_full_width_decimal() {
        let max = RunId::from_hex(&format!("0x{}", "ff".repeat(32))).unwrap();
        assert_eq!(
            max.to_string(),
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );

        let big = RunId::from(u128::MAX);
        assert_eq!(big.to_string(), u128::MAX.to_string());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(RunId::from_hex("42"), Err(RunIdError::MissingPrefix(_))));
        assert!(matches!(RunId::from_hex("0x"), Err(RunIdError::Empty)));
        assert!(matches!(RunId::from_hex("0xnothex"), Err(RunIdError::InvalidHex(_))));
    }

    #[test]
    fn test_to_word() {
        let word = RunId::from(0x0102u64).to_word().unwrap();
        assert_eq!(word[30], 0x01);
        assert_eq!(word[31], 0x02);
        assert!(word[..30].iter().all(|b| *b == 0));

        let wide = RunId::from_be_bytes(&[1u8; 33]);
        assert!(matches!(wide.to_word(), Err(RunIdError::TooWide(_))));
    }
}
