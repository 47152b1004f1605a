//! Hashing engine seam
//!
//! The memory-hard hash itself lives in an external library. The verifier only
//! needs four capabilities from it: build a context from a seed key, release
//! it, hash bytes under a context, and bind a digest back to its input as a
//! commitment. [`HashEngine`] captures exactly that.

use crate::epoch::SeedKey;
use crate::error::Result;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

#[cfg(feature = "randomx")]
pub mod randomx;

#[cfg(feature = "randomx")]
pub use self::randomx::RandomXEngine;

#[cfg(test)]
pub(crate) mod testing;

/// Size of every digest produced by an engine
pub const DIGEST_SIZE: usize = 32;

/// 32-byte digest
pub type Digest32 = [u8; DIGEST_SIZE];

type Blake2b256 = Blake2b<U32>;

/// Capabilities the verifier needs from a memory-hard hashing library
///
/// Contexts are expensive to build (hundreds of megabytes of cache on
/// RandomX) and are owned by [`crate::cache::HashContextCache`], which never
/// hashes under the same context from two threads at once.
pub trait HashEngine {
    /// Keyed hashing state (cache + VM on RandomX)
    type Context;

    /// Engine name for logging
    fn name(&self) -> &'static str;

    /// Build a new context keyed by `seed`
    fn derive_context(&self, seed: &SeedKey) -> Result<Self::Context>;

    /// Release a context. The default simply drops it.
    fn release_context(&self, context: Self::Context) {
        drop(context);
    }

    /// Hash `data` under `context`
    fn compute_hash(&self, context: &Self::Context, data: &[u8]) -> Result<Digest32>;

    /// Bind `digest` back to the bytes it was computed from
    fn compute_commitment(&self, data: &[u8], digest: &Digest32) -> Result<Digest32> {
        Ok(blake2b_commitment(data, digest))
    }
}

/// BLAKE2b-256 over `data || digest`
///
/// This is RandomX's `calculate_commitment`: the commitment is what gets
/// compared against the target, not the raw RandomX output.
pub fn blake2b_commitment(data: &[u8], digest: &Digest32) -> Digest32 {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    hasher.update(digest);
    hasher.finalize().into()
}
