//! Epoch keying
//!
//! The RandomX key rotates once per epoch. The epoch is the block timestamp
//! divided by the epoch duration, and the key (seed) is the double SHA-256 of
//! a domain-tagged decimal rendering of the epoch number.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Default epoch duration on mainnet (7 days)
pub const DEFAULT_EPOCH_DURATION: u32 = 604_800;

/// Domain-separation prefix for seed derivation
pub const DEFAULT_SEED_TAG: &str = "Scash/RandomX/Epoch/";

/// Epoch number derived from a block timestamp
pub type Epoch = u32;

/// 32-byte key used to initialize the hashing context for one epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeedKey(pub [u8; 32]);

impl SeedKey {
    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for SeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for SeedKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SeedKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        crate::codec::decode_array::<32>(&s)
            .map(SeedKey)
            .map_err(serde::de::Error::custom)
    }
}

/// Compute the epoch a timestamp falls into
pub fn epoch_of(timestamp: u32, duration_secs: u32) -> Result<Epoch> {
    if duration_secs == 0 {
        return Err(Error::invalid_config("Epoch duration must be greater than 0"));
    }
    Ok(timestamp / duration_secs)
}

/// First timestamp of an epoch and the first timestamp of the next one
///
/// The end is widened to `u64` because the last epoch of the `u32` range
/// ends past `u32::MAX`.
pub fn epoch_window(epoch: Epoch, duration_secs: u32) -> Result<(u64, u64)> {
    if duration_secs == 0 {
        return Err(Error::invalid_config("Epoch duration must be greater than 0"));
    }
    let start = epoch as u64 * duration_secs as u64;
    Ok((start, start + duration_secs as u64))
}

/// Derive the mainnet seed key for an epoch
pub fn seed_for(epoch: Epoch) -> SeedKey {
    seed_for_tagged(DEFAULT_SEED_TAG, epoch)
}

/// Derive the seed key for an epoch under an explicit domain tag
pub fn seed_for_tagged(tag: &str, epoch: Epoch) -> SeedKey {
    let preimage = format!("{}{}", tag, epoch);
    let first = Sha256::digest(preimage.as_bytes());
    let second = Sha256::digest(first);
    SeedKey(second.into())
}
