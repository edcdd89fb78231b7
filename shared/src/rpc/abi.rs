//! Minimal contract ABI codec
//!
//! Covers exactly the calls the protocol makes:
//! ```text
//! sendMessage(string)
//! messageResponse(uint256) returns (string)
//! lights(address) returns (address, string, bool)
//! ```
//! Every value occupies 32-byte words; dynamic values (strings) are written
//! as an offset in the head and `[length][padded bytes]` in the tail.

use crate::address::Address;
use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

const WORD: usize = 32;

/// Errors from decoding return data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("Not enough data: need {needed} bytes, have {available}")]
    NotEnoughData { needed: usize, available: usize },

    #[error("Integer does not fit in a usize: 0x{0}")]
    Overflow(String),

    #[error("Invalid bool word: 0x{0}")]
    InvalidBool(String),

    #[error("Invalid address word: 0x{0}")]
    InvalidAddress(String),

    #[error("String is not valid UTF-8")]
    InvalidUtf8,
}

/// A light record as stored by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightRecord {
    pub device: Address,
    pub name: String,
    pub is_on: bool,
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD) * WORD
}

fn put_usize(buf: &mut BytesMut, value: usize) {
    buf.put_bytes(0, WORD - 8);
    buf.put_u64(value as u64);
}

/// Encode `selector(string)`
pub fn encode_string_call(selector: [u8; 4], value: &str) -> Bytes {
    let data = value.as_bytes();
    let padded = padded_len(data.len());
    let mut buf = BytesMut::with_capacity(4 + 2 * WORD + padded);

    buf.put_slice(&selector);
    // Head: offset of the string, right after the single head word
    put_usize(&mut buf, WORD);
    // Tail: length, then bytes padded to a word boundary
    put_usize(&mut buf, data.len());
    buf.put_slice(data);
    buf.put_bytes(0, padded - data.len());

    buf.freeze()
}

/// Encode `selector(uint256)` from a big-endian word
pub fn encode_word_call(selector: [u8; 4], word: &[u8; 32]) -> Bytes {
    let mut buf = BytesMut::with_capacity(4 + WORD);
    buf.put_slice(&selector);
    buf.put_slice(word);
    buf.freeze()
}

/// Encode `selector(address)`
pub fn encode_address_call(selector: [u8; 4], address: &Address) -> Bytes {
    let mut buf = BytesMut::with_capacity(4 + WORD);
    buf.put_slice(&selector);
    buf.put_bytes(0, WORD - 20);
    buf.put_slice(address.as_bytes());
    buf.freeze()
}

fn word_at(data: &[u8], at: usize) -> Result<&[u8], AbiError> {
    let end = at.checked_add(WORD).ok_or_else(|| AbiError::Overflow(hex::encode(at.to_be_bytes())))?;
    data.get(at..end).ok_or(AbiError::NotEnoughData {
        needed: end,
        available: data.len(),
    })
}

fn usize_at(data: &[u8], at: usize) -> Result<usize, AbiError> {
    let word = word_at(data, at)?;
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(AbiError::Overflow(hex::encode(word)));
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&word[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(low)).map_err(|_| AbiError::Overflow(hex::encode(word)))
}

fn string_at(data: &[u8], offset: usize) -> Result<String, AbiError> {
    let len = usize_at(data, offset)?;
    let start = offset + WORD;
    let end = start
        .checked_add(len)
        .ok_or_else(|| AbiError::Overflow(hex::encode(len.to_be_bytes())))?;
    let bytes = data.get(start..end).ok_or(AbiError::NotEnoughData {
        needed: end,
        available: data.len(),
    })?;
    String::from_utf8(bytes.to_vec()).map_err(|_| AbiError::InvalidUtf8)
}

/// Decode a single `string` return value
pub fn decode_string(data: &[u8]) -> Result<String, AbiError> {
    let offset = usize_at(data, 0)?;
    string_at(data, offset)
}

/// Decode the `(address, string, bool)` light record
pub fn decode_light(data: &[u8]) -> Result<LightRecord, AbiError> {
    let address_word = word_at(data, 0)?;
    if address_word[..WORD - 20].iter().any(|b| *b != 0) {
        return Err(AbiError::InvalidAddress(hex::encode(address_word)));
    }
    let mut device = [0u8; 20];
    device.copy_from_slice(&address_word[WORD - 20..]);

    let name_offset = usize_at(data, WORD)?;

    let bool_word = word_at(data, 2 * WORD)?;
    let is_on = match usize_at(data, 2 * WORD)? {
        0 => false,
        1 => true,
        _ => return Err(AbiError::InvalidBool(hex::encode(bool_word))),
    };

    Ok(LightRecord {
        device: Address::from_bytes(device),
        name: string_at(data, name_offset)?,
        is_on,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol;

    fn word(n: u64) -> Vec<u8> {
        let mut w = vec![0u8; 24];
        w.extend_from_slice(&n.to_be_bytes());
        w
    }

    fn string_tail(s: &str) -> Vec<u8> {
        let mut out = word(s.len() as u64);
        out.extend_from_slice(s.as_bytes());
        out.resize(WORD + padded_len(s.len()), 0);
        out
    }

    #[test]
    fn test_encode_send_message() {
        let call = encode_string_call(protocol::SEND_MESSAGE_SELECTOR, "turn on workspace light");

        assert_eq!(&call[..4], &protocol::SEND_MESSAGE_SELECTOR);
        assert_eq!(&call[4..36], word(32).as_slice());
        assert_eq!(&call[36..68], word(23).as_slice());
        assert_eq!(&call[68..91], b"turn on workspace light");
        assert_eq!(call.len(), 4 + 32 + 32 + 32);
        assert!(call[91..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_encode_empty_string() {
        let call = encode_string_call(protocol::SEND_MESSAGE_SELECTOR, "");
        assert_eq!(call.len(), 4 + 64);
    }

    #[test]
    fn test_encode_address_call() {
        let address: Address = "0x1F5C3E486DB709edd174fc4763AC4D645CB1E600".parse().unwrap();
        let call = encode_address_call(protocol::LIGHTS_SELECTOR, &address);
        assert_eq!(call.len(), 36);
        assert!(call[4..16].iter().all(|b| *b == 0));
        assert_eq!(&call[16..], address.as_bytes());
    }

    #[test]
    fn test_decode_string() {
        let mut data = word(32);
        data.extend(string_tail("TGLOON:0xabc"));
        assert_eq!(decode_string(&data).unwrap(), "TGLOON:0xabc");
    }

    #[test]
    fn test_decode_empty_string() {
        let mut data = word(32);
        data.extend(word(0));
        assert_eq!(decode_string(&data).unwrap(), "");
    }

    #[test]
    fn test_decode_truncated() {
        let mut data = word(32);
        data.extend(word(40));
        data.extend_from_slice(b"short");
        assert!(matches!(
            decode_string(&data),
            Err(AbiError::NotEnoughData { .. })
        ));
        assert!(matches!(decode_string(&[]), Err(AbiError::NotEnoughData { .. })));
    }

    #[test]
    fn test_decode_light() {
        let address: Address = "0xb1956626438724c69Df340406795D404AD774f90".parse().unwrap();
        let mut data = vec![0u8; 12];
        data.extend_from_slice(address.as_bytes());
        data.extend(word(96));
        data.extend(word(1));
        data.extend(string_tail("Living Room"));

        let record = decode_light(&data).unwrap();
        assert_eq!(record.device, address);
        assert_eq!(record.name, "Living Room");
        assert!(record.is_on);
    }

    #[test]
    fn test_decode_light_bad_bool() {
        let mut data = vec![0u8; 32];
        data.extend(word(96));
        data.extend(word(2));
        data.extend(string_tail(""));
        assert!(matches!(decode_light(&data), Err(AbiError::InvalidBool(_))));
    }
}
