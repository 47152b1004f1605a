//! Fixed-width hex codec for headers, targets and seeds
//!
//! Every hex string crossing the verifier boundary has a known width, so
//! decoding checks the length before touching the characters. Byte `i` always
//! comes from characters `[2i, 2i + 2)`; nothing is reordered.

use crate::error::{Error, Result};

/// Decode a hex string that must encode exactly `expected_len` bytes
pub fn decode_fixed(hex_str: &str, expected_len: usize) -> Result<Vec<u8>> {
    check_len(hex_str, expected_len)?;
    hex::decode(hex_str).map_err(|e| Error::format(format!("Invalid hex string: {}", e)))
}

/// Decode a hex string into a fixed-size array
pub fn decode_array<const N: usize>(hex_str: &str) -> Result<[u8; N]> {
    check_len(hex_str, N)?;
    let mut bytes = [0u8; N];
    hex::decode_to_slice(hex_str, &mut bytes)
        .map_err(|e| Error::format(format!("Invalid hex string: {}", e)))?;
    Ok(bytes)
}

/// Encode bytes as a lowercase hex string
pub fn encode_fixed(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

fn check_len(hex_str: &str, expected_len: usize) -> Result<()> {
    if hex_str.len() != expected_len * 2 {
        return Err(Error::format(format!(
            "Invalid hex length: expected {} chars, got {}",
            expected_len * 2,
            hex_str.len()
        )));
    }
    Ok(())
}
