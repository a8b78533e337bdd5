//! Fixed-width hexadecimal representation of 64-bit keys

use crate::error::{CodecError, Result};

/// Number of characters in the hexadecimal form of a key
pub const HEX_KEY_LEN: usize = 16;

/// Formats a key as 16 lowercase, zero-padded hexadecimal characters
#[must_use]
pub fn key_hex(key: u64) -> String {
    format!("{key:016x}")
}

/// Parses a 16-character hexadecimal key (case-insensitive)
///
/// # Errors
///
/// Returns `CodecError::InvalidHexLength` when the input is not exactly 16 bytes
/// long and `CodecError::InvalidHexDigit` on the first non-hexadecimal byte.
pub fn parse_key_hex(hex: &str) -> Result<u64> {
    if hex.len() != HEX_KEY_LEN {
        return Err(CodecError::InvalidHexLength(hex.len()).into());
    }
    hex.bytes().enumerate().try_fold(0u64, |acc, (pos, b)| {
        let nibble = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => return Err(CodecError::InvalidHexDigit(char::from(b), pos).into()),
        };
        Ok((acc << 4) | u64::from(nibble))
    })
}
