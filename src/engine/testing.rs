//! In-process engine for unit tests
//!
//! Hashes are BLAKE2b over the seed and input, which is enough to exercise
//! keying and caching without allocating a RandomX cache.

use super::{Digest32, HashEngine};
use crate::epoch::SeedKey;
use crate::error::{Error, Result};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct FakeContext {
    pub seed: SeedKey,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeEngine {
    pub builds: Arc<AtomicUsize>,
    pub releases: Arc<AtomicUsize>,
    pub hashes: Arc<AtomicUsize>,
    pub fail_init: Arc<AtomicBool>,
    pub fail_hash: Arc<AtomicBool>,
    pub panic_init: Arc<AtomicBool>,
    pub panic_hash: Arc<AtomicBool>,
}

impl FakeEngine {
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn set_fail_init(&self, fail: bool) {
        self.fail_init.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_hash(&self, fail: bool) {
        self.fail_hash.store(fail, Ordering::SeqCst);
    }

    pub fn set_panic_init(&self, panic: bool) {
        self.panic_init.store(panic, Ordering::SeqCst);
    }

    pub fn set_panic_hash(&self, panic: bool) {
        self.panic_hash.store(panic, Ordering::SeqCst);
    }
}

impl HashEngine for FakeEngine {
    type Context = FakeContext;

    fn name(&self) -> &'static str {
        "fake"
    }

    fn derive_context(&self, seed: &SeedKey) -> Result<FakeContext> {
        if self.panic_init.load(Ordering::SeqCst) {
            panic!("cache allocation aborted");
        }
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(Error::engine("cache allocation failed"));
        }
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(FakeContext { seed: *seed })
    }

    fn release_context(&self, context: FakeContext) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        drop(context);
    }

    fn compute_hash(&self, context: &FakeContext, data: &[u8]) -> Result<Digest32> {
        if self.panic_hash.load(Ordering::SeqCst) {
            panic!("vm aborted");
        }
        if self.fail_hash.load(Ordering::SeqCst) {
            return Err(Error::engine("vm fault"));
        }
        self.hashes.fetch_add(1, Ordering::SeqCst);
        let mut hasher = Blake2b::<U32>::new();
        hasher.update(context.seed.as_bytes());
        hasher.update(data);
        Ok(hasher.finalize().into())
    }
}
