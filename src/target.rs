//! Share and network targets
//!
//! A target is a 256-bit magnitude stored big-endian, so byte 0 is the most
//! significant. A commitment meets the target when it is numerically less
//! than or equal to it.

use crate::codec;
use crate::engine::Digest32;
use crate::error::{Error, Result};
use num_bigint::BigUint;
use num_traits::{FromPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Easiest target of the network, used as difficulty 1
pub const POW_LIMIT: [u8; 32] = [
    0x00, 0x00, 0x7f, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00,
];

/// 256-bit big-endian target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Target(pub [u8; 32]);

impl Target {
    /// Size in bytes
    pub const SIZE: usize = 32;

    /// Create a target from big-endian bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a target from exactly 64 hex characters
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        codec::decode_array::<{ Target::SIZE }>(hex_str).map(Self)
    }

    /// Get the target as bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        codec::encode_fixed(&self.0)
    }

    /// Maximum possible target (every commitment meets it)
    pub fn max() -> Self {
        Self([0xFF; 32])
    }

    /// Minimum possible target (only the zero commitment meets it)
    pub fn min() -> Self {
        Self([0; 32])
    }

    /// Compare a commitment against this target, most significant byte first
    pub fn compare(&self, commitment: &Digest32) -> Ordering {
        for i in 0..Self::SIZE {
            match commitment[i].cmp(&self.0[i]) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    }

    /// Check whether a commitment meets this target (equality counts)
    pub fn is_met_by(&self, commitment: &Digest32) -> bool {
        self.compare(commitment) != Ordering::Greater
    }

    /// Pool share target for a difficulty: `POW_LIMIT / floor(difficulty)`
    pub fn from_difficulty(difficulty: f64) -> Result<Self> {
        if !difficulty.is_finite() || difficulty < 1.0 {
            return Err(Error::invalid_config(format!(
                "Share difficulty must be a finite number >= 1, got {}",
                difficulty
            )));
        }
        let divisor = BigUint::from_f64(difficulty.floor()).ok_or_else(|| {
            Error::invalid_config(format!("Share difficulty {} is not representable", difficulty))
        })?;
        let value = BigUint::from_bytes_be(&POW_LIMIT) / divisor;
        Self::from_biguint(&value)
    }

    /// Decode a compact (`nBits`) target
    ///
    /// The low 23 bits are the mantissa and the top byte the base-256
    /// exponent. The sign bit is masked off.
    pub fn from_compact(bits: u32) -> Result<Self> {
        let exponent = bits >> 24;
        let mantissa = bits & 0x007f_ffff;

        let value = if exponent <= 3 {
            BigUint::from(mantissa >> (8 * (3 - exponent)))
        } else {
            BigUint::from(mantissa) << ((8 * (exponent - 3)) as usize)
        };

        if value.bits() > 256 {
            return Err(Error::format(format!(
                "Compact target {:#010x} overflows 256 bits",
                bits
            )));
        }
        Self::from_biguint(&value)
    }

    fn from_biguint(value: &BigUint) -> Result<Self> {
        let mut bytes = [0u8; 32];
        if value.is_zero() {
            return Ok(Self(bytes));
        }
        let be = value.to_bytes_be();
        if be.len() > Self::SIZE {
            return Err(Error::format("Target value exceeds 256 bits"));
        }
        bytes[Self::SIZE - be.len()..].copy_from_slice(&be);
        Ok(Self(bytes))
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Target {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Target::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
