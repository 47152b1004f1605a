//! Scash block header
//!
//! Bitcoin's 80-byte header followed by a 32-byte RandomX hash field:
//!
//! | offset | size | field             | encoding       |
//! |--------|------|-------------------|----------------|
//! | 0      | 4    | `version`         | i32 LE         |
//! | 4      | 32   | `prev_block_hash` | raw bytes      |
//! | 36     | 32   | `merkle_root`     | raw bytes      |
//! | 68     | 4    | `timestamp`       | u32 LE         |
//! | 72     | 4    | `bits`            | u32 LE         |
//! | 76     | 4    | `nonce`           | u32 LE         |
//! | 80     | 32   | `hash_field`      | raw bytes      |
//!
//! The hash field carries the RandomX output the header claims, so it is
//! zeroed in the bytes that get hashed.

use crate::codec;
use crate::epoch::{epoch_of, Epoch};
use crate::error::{Error, Result};
use crate::target::Target;
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Header field offsets
pub mod offsets {
    /// `version`
    pub const VERSION: usize = 0;
    /// `prev_block_hash`
    pub const PREV_BLOCK_HASH: usize = 4;
    /// `merkle_root`
    pub const MERKLE_ROOT: usize = 36;
    /// `timestamp`
    pub const TIMESTAMP: usize = 68;
    /// `bits`
    pub const BITS: usize = 72;
    /// `nonce`
    pub const NONCE: usize = 76;
    /// `hash_field`
    pub const HASH_FIELD: usize = 80;
}

/// Block header as submitted in a share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block_hash: [u8; 32],
    pub merkle_root: [u8; 32],
    /// Seconds since the Unix epoch
    pub timestamp: u32,
    /// Compact network target
    pub bits: u32,
    pub nonce: u32,
    /// RandomX output claimed by the miner
    pub hash_field: [u8; 32],
}

impl BlockHeader {
    /// Encoded size in bytes
    pub const SIZE: usize = 112;

    /// Encoded size in hex characters
    pub const HEX_LEN: usize = Self::SIZE * 2;

    /// Decode a header from its 112-byte encoding
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            version: LittleEndian::read_i32(&bytes[offsets::VERSION..offsets::PREV_BLOCK_HASH]),
            prev_block_hash: array32(&bytes[offsets::PREV_BLOCK_HASH..offsets::MERKLE_ROOT]),
            merkle_root: array32(&bytes[offsets::MERKLE_ROOT..offsets::TIMESTAMP]),
            timestamp: LittleEndian::read_u32(&bytes[offsets::TIMESTAMP..offsets::BITS]),
            bits: LittleEndian::read_u32(&bytes[offsets::BITS..offsets::NONCE]),
            nonce: LittleEndian::read_u32(&bytes[offsets::NONCE..offsets::HASH_FIELD]),
            hash_field: array32(&bytes[offsets::HASH_FIELD..Self::SIZE]),
        }
    }

    /// Decode a header from a byte slice of any length
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: &[u8; Self::SIZE] = bytes.try_into().map_err(|_| {
            Error::format(format!(
                "Invalid header size: expected {} bytes, got {}",
                Self::SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self::from_bytes(array))
    }

    /// Parse a header from 224 hex characters
    pub fn parse(hex_str: &str) -> Result<Self> {
        let bytes = codec::decode_array::<{ BlockHeader::SIZE }>(hex_str)?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Encode the header into its 112-byte form
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        LittleEndian::write_i32(&mut bytes[offsets::VERSION..offsets::PREV_BLOCK_HASH], self.version);
        bytes[offsets::PREV_BLOCK_HASH..offsets::MERKLE_ROOT].copy_from_slice(&self.prev_block_hash);
        bytes[offsets::MERKLE_ROOT..offsets::TIMESTAMP].copy_from_slice(&self.merkle_root);
        LittleEndian::write_u32(&mut bytes[offsets::TIMESTAMP..offsets::BITS], self.timestamp);
        LittleEndian::write_u32(&mut bytes[offsets::BITS..offsets::NONCE], self.bits);
        LittleEndian::write_u32(&mut bytes[offsets::NONCE..offsets::HASH_FIELD], self.nonce);
        bytes[offsets::HASH_FIELD..Self::SIZE].copy_from_slice(&self.hash_field);
        bytes
    }

    /// Convert to hexadecimal string
    pub fn to_hex(&self) -> String {
        codec::encode_fixed(&self.to_bytes())
    }

    /// Bytes fed to the hash: the encoding with `hash_field` zeroed
    ///
    /// Computed on every call; callers reuse headers across nonces.
    pub fn hash_input(&self) -> [u8; Self::SIZE] {
        let mut bytes = self.to_bytes();
        bytes[offsets::HASH_FIELD..Self::SIZE].fill(0);
        bytes
    }

    /// Epoch this header's timestamp falls into
    pub fn epoch(&self, duration_secs: u32) -> Result<Epoch> {
        epoch_of(self.timestamp, duration_secs)
    }

    /// Network target encoded in `bits`
    pub fn network_target(&self) -> Result<Target> {
        Target::from_compact(self.bits)
    }
}

fn array32(bytes: &[u8]) -> [u8; 32] {
    let mut array = [0u8; 32];
    array.copy_from_slice(bytes);
    array
}

impl FromStr for BlockHeader {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for BlockHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for BlockHeader {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BlockHeader {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BlockHeader::parse(&s).map_err(serde::de::Error::custom)
    }
}
