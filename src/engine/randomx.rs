//! RandomX backend
//!
//! Light-mode verification: one cache plus one VM per epoch, no dataset.
//! Note that the Argon2 salt is compiled into the RandomX library; a build
//! bundling the upstream salt produces hashes for upstream RandomX, not for a
//! chain that customizes it.

use super::{Digest32, HashEngine, DIGEST_SIZE};
use crate::epoch::SeedKey;
use crate::error::{Error, Result};
use randomx_rs::{RandomXCache, RandomXFlag, RandomXVM};
use tracing::debug;

/// Cache and VM bound to one seed key
pub struct RandomXContext {
    vm: RandomXVM,
}

// SAFETY: the VM owns its cache and holds no thread-local state. The context
// cache only ever touches it from one thread at a time, behind its mutex.
unsafe impl Send for RandomXContext {}

/// Hashing engine backed by the RandomX library
#[derive(Debug, Clone, Copy)]
pub struct RandomXEngine {
    flags: RandomXFlag,
}

impl RandomXEngine {
    /// Create an engine using the flags recommended for this CPU
    pub fn new() -> Self {
        Self {
            flags: RandomXFlag::get_recommended_flags(),
        }
    }

    /// Create an engine that runs the VM interpreted
    pub fn interpreted() -> Self {
        let mut flags = RandomXFlag::get_recommended_flags();
        flags.remove(RandomXFlag::FLAG_JIT);
        Self { flags }
    }

    /// Create an engine with explicit flags
    pub fn with_flags(flags: RandomXFlag) -> Self {
        Self { flags }
    }
}

impl Default for RandomXEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HashEngine for RandomXEngine {
    type Context = RandomXContext;

    fn name(&self) -> &'static str {
        "randomx"
    }

    fn derive_context(&self, seed: &SeedKey) -> Result<RandomXContext> {
        let cache = RandomXCache::new(self.flags, seed.as_bytes())
            .map_err(|e| Error::engine(format!("Failed to allocate RandomX cache: {}", e)))?;
        let vm = RandomXVM::new(self.flags, Some(cache), None)
            .map_err(|e| Error::engine(format!("Failed to create RandomX VM: {}", e)))?;
        debug!(flags = ?self.flags, "RandomX VM created");
        Ok(RandomXContext { vm })
    }

    fn release_context(&self, context: RandomXContext) {
        // Dropping the VM releases it together with its linked cache
        drop(context);
        debug!("RandomX VM released");
    }

    fn compute_hash(&self, context: &RandomXContext, data: &[u8]) -> Result<Digest32> {
        let hash = context
            .vm
            .calculate_hash(data)
            .map_err(|e| Error::engine(format!("RandomX hash failed: {}", e)))?;
        if hash.len() != DIGEST_SIZE {
            return Err(Error::engine(format!(
                "RandomX returned {} bytes, expected {}",
                hash.len(),
                DIGEST_SIZE
            )));
        }
        let mut digest = [0u8; DIGEST_SIZE];
        digest.copy_from_slice(&hash);
        Ok(digest)
    }
}
