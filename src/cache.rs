//! Epoch-keyed hashing context cache
//!
//! Holds at most one hashing context, bound to one epoch. Building a context
//! is the expensive step of verification, so consecutive shares from the same
//! epoch reuse it; an epoch change releases the old context before the new
//! one is built. Any failure while building leaves the cache empty.

use crate::engine::{Digest32, HashEngine};
use crate::epoch::{epoch_of, seed_for_tagged, Epoch, DEFAULT_SEED_TAG};
use crate::error::{Error, Result};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Default number of consecutive failures before escalating
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Cache tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Domain tag used for seed derivation
    pub seed_tag: String,
    /// Consecutive hash failures against one context before it is rebuilt;
    /// consecutive build failures before they are reported as errors
    pub max_consecutive_failures: u32,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            seed_tag: DEFAULT_SEED_TAG.to_string(),
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

/// Lifetime counters of a cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Contexts built
    pub builds: u64,
    /// `ensure_for` calls served by the existing context
    pub hits: u64,
    /// Contexts released
    pub teardowns: u64,
    /// Failed context builds
    pub init_failures: u64,
    /// Failed hash or commitment computations
    pub compute_failures: u64,
}

/// Digest and commitment of one hash input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashOutput {
    /// Raw engine output
    pub digest: Digest32,
    /// Commitment binding the digest to the input
    pub commitment: Digest32,
}

/// Owner of the current hashing context
pub struct HashContextCache<E: HashEngine> {
    engine: E,
    options: CacheOptions,
    current_epoch: Option<Epoch>,
    context: Option<E::Context>,
    configured_duration: Option<u32>,
    consecutive_init_failures: u32,
    consecutive_compute_failures: u32,
    stats: CacheStats,
}

impl<E: HashEngine> HashContextCache<E> {
    /// Create an empty cache with default options
    pub fn new(engine: E) -> Self {
        Self::with_options(engine, CacheOptions::default())
    }

    /// Create an empty cache
    pub fn with_options(engine: E, options: CacheOptions) -> Self {
        Self {
            engine,
            options,
            current_epoch: None,
            context: None,
            configured_duration: None,
            consecutive_init_failures: 0,
            consecutive_compute_failures: 0,
            stats: CacheStats::default(),
        }
    }

    /// Make sure a context for the epoch of `timestamp` is loaded
    ///
    /// Returns the epoch. A zero duration fails with `InvalidConfig` before
    /// the cache is touched; a failed build fails with `ContextInit` and
    /// leaves the cache empty.
    pub fn ensure_for(&mut self, timestamp: u32, duration_secs: u32) -> Result<Epoch> {
        let epoch = epoch_of(timestamp, duration_secs)?;

        if self.current_epoch == Some(epoch) && self.context.is_some() {
            self.stats.hits += 1;
            self.configured_duration = Some(duration_secs);
            return Ok(epoch);
        }

        self.teardown();

        let seed = seed_for_tagged(&self.options.seed_tag, epoch);
        let started = Instant::now();
        let engine = &self.engine;
        let built = panic::catch_unwind(AssertUnwindSafe(|| engine.derive_context(&seed)))
            .unwrap_or_else(|_| Err(Error::engine("hashing library panicked")));

        match built {
            Ok(context) => {
                self.context = Some(context);
                self.current_epoch = Some(epoch);
                self.configured_duration = Some(duration_secs);
                self.consecutive_init_failures = 0;
                self.consecutive_compute_failures = 0;
                self.stats.builds += 1;
                info!(
                    epoch,
                    seed = %seed,
                    engine = self.engine.name(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Hashing context initialized"
                );
                Ok(epoch)
            }
            Err(e) => {
                self.consecutive_init_failures += 1;
                self.stats.init_failures += 1;
                if self.consecutive_init_failures >= self.options.max_consecutive_failures {
                    error!(
                        epoch,
                        failures = self.consecutive_init_failures,
                        "Repeated hashing context failures: {}",
                        e
                    );
                } else {
                    warn!(epoch, "Failed to initialize hashing context: {}", e);
                }
                Err(Error::context_init(epoch, engine_message(e)))
            }
        }
    }

    /// Borrow the current context
    pub fn current(&self) -> Result<&E::Context> {
        self.context.as_ref().ok_or(Error::NotInitialized)
    }

    /// Hash `data` under the current context and derive its commitment
    ///
    /// A failure keeps the context, unless it is the
    /// `max_consecutive_failures`-th in a row, in which case the context is
    /// released and rebuilt by the next `ensure_for`.
    pub fn compute(&mut self, data: &[u8]) -> Result<HashOutput> {
        let engine = &self.engine;
        let context = self.context.as_ref().ok_or(Error::NotInitialized)?;

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let digest = engine.compute_hash(context, data)?;
            let commitment = engine.compute_commitment(data, &digest)?;
            Ok(HashOutput { digest, commitment })
        }))
        .unwrap_or_else(|_| Err(Error::engine("hashing library panicked")));

        match result {
            Ok(output) => {
                self.consecutive_compute_failures = 0;
                Ok(output)
            }
            Err(e) => {
                self.consecutive_compute_failures += 1;
                self.stats.compute_failures += 1;
                if self.consecutive_compute_failures >= self.options.max_consecutive_failures {
                    warn!(
                        epoch = ?self.current_epoch,
                        failures = self.consecutive_compute_failures,
                        "Hash failures keep recurring, rebuilding context on next use"
                    );
                    self.teardown();
                }
                Err(match e {
                    Error::HashComputation { .. } => e,
                    other => Error::hash_computation(engine_message(other)),
                })
            }
        }
    }

    /// Release the context, if any. Idempotent.
    pub fn teardown(&mut self) {
        if let Some(context) = self.context.take() {
            self.engine.release_context(context);
            self.stats.teardowns += 1;
            debug!(epoch = ?self.current_epoch, "Hashing context released");
        }
        self.current_epoch = None;
        self.consecutive_compute_failures = 0;
    }

    /// Epoch of the loaded context
    pub fn epoch(&self) -> Option<Epoch> {
        self.current_epoch
    }

    /// Duration passed to the last successful `ensure_for`
    pub fn configured_duration(&self) -> Option<u32> {
        self.configured_duration
    }

    /// Whether a context is loaded
    pub fn is_initialized(&self) -> bool {
        self.context.is_some()
    }

    /// Lifetime counters
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// The underlying engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Active options
    pub fn options(&self) -> &CacheOptions {
        &self.options
    }
}

/// Message of an engine failure without the engine prefix
fn engine_message(err: Error) -> String {
    match err {
        Error::Engine { message } => message,
        other => other.to_string(),
    }
}

impl<E: HashEngine> Drop for HashContextCache<E> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeEngine;
    use crate::epoch::seed_for;
    use assert_matches::assert_matches;

    const WEEK: u32 = 604_800;

    #[test]
    fn test_same_epoch_builds_once() {
        let engine = FakeEngine::default();
        let mut cache = HashContextCache::new(engine.clone());

        assert_eq!(cache.ensure_for(1_707_657_600, WEEK).unwrap(), 2823);
        assert_eq!(cache.ensure_for(1_707_657_600 + 3600, WEEK).unwrap(), 2823);

        assert_eq!(engine.builds(), 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.current().unwrap().seed, seed_for(2823));
    }

    #[test]
    fn test_epoch_change_rebuilds() {
        let engine = FakeEngine::default();
        let mut cache = HashContextCache::new(engine.clone());

        cache.ensure_for(0, 600).unwrap();
        cache.ensure_for(600, 600).unwrap();

        assert_eq!(engine.builds(), 2);
        assert_eq!(engine.releases(), 1);
        assert_eq!(cache.epoch(), Some(1));
        assert_eq!(cache.current().unwrap().seed, seed_for(1));
    }

    #[test]
    fn test_duration_change_moves_epoch() {
        let engine = FakeEngine::default();
        let mut cache = HashContextCache::new(engine.clone());

        cache.ensure_for(1_707_657_600, WEEK).unwrap();
        cache.ensure_for(1_707_657_600, 3600).unwrap();

        assert_eq!(cache.epoch(), Some(1_707_657_600 / 3600));
        assert_eq!(cache.configured_duration(), Some(3600));
        assert_eq!(engine.builds(), 2);
    }

    #[test]
    fn test_zero_duration_leaves_cache_untouched() {
        let engine = FakeEngine::default();
        let mut cache = HashContextCache::new(engine.clone());
        cache.ensure_for(0, 600).unwrap();

        assert_matches!(cache.ensure_for(0, 0), Err(Error::InvalidConfig { .. }));
        assert!(cache.is_initialized());
        assert_eq!(cache.epoch(), Some(0));
    }

    #[test]
    fn test_failed_build_leaves_cache_empty() {
        let engine = FakeEngine::default();
        let mut cache = HashContextCache::new(engine.clone());
        cache.ensure_for(0, 600).unwrap();

        engine.set_fail_init(true);
        assert_matches!(cache.ensure_for(600, 600), Err(Error::ContextInit { epoch: 1, .. }));
        assert!(!cache.is_initialized());
        assert_eq!(cache.epoch(), None);
        assert_matches!(cache.current(), Err(Error::NotInitialized));
        assert_eq!(engine.releases(), 1);

        engine.set_fail_init(false);
        cache.ensure_for(600, 600).unwrap();
        assert!(cache.is_initialized());
        assert_eq!(cache.stats().init_failures, 1);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let engine = FakeEngine::default();
        let mut cache = HashContextCache::new(engine.clone());
        cache.ensure_for(0, 600).unwrap();

        cache.teardown();
        cache.teardown();

        assert_eq!(engine.releases(), 1);
        assert_eq!(cache.epoch(), None);
        assert_matches!(cache.current(), Err(Error::NotInitialized));

        cache.ensure_for(0, 600).unwrap();
        assert_eq!(engine.builds(), 2);
    }

    #[test]
    fn test_compute_requires_context() {
        let mut cache = HashContextCache::new(FakeEngine::default());
        assert_matches!(cache.compute(b"data"), Err(Error::NotInitialized));
        assert_eq!(cache.stats().compute_failures, 0);
    }

    #[test]
    fn test_compute_failure_keeps_context_until_threshold() {
        let engine = FakeEngine::default();
        let mut cache = HashContextCache::with_options(
            engine.clone(),
            CacheOptions {
                max_consecutive_failures: 2,
                ..CacheOptions::default()
            },
        );
        cache.ensure_for(0, 600).unwrap();

        engine.set_fail_hash(true);
        assert_matches!(cache.compute(b"data"), Err(Error::HashComputation { .. }));
        assert!(cache.is_initialized());

        assert_matches!(cache.compute(b"data"), Err(Error::HashComputation { .. }));
        assert!(!cache.is_initialized());

        engine.set_fail_hash(false);
        cache.ensure_for(0, 600).unwrap();
        assert!(cache.compute(b"data").is_ok());
        assert_eq!(engine.builds(), 2);
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let engine = FakeEngine::default();
        let mut cache = HashContextCache::with_options(
            engine.clone(),
            CacheOptions {
                max_consecutive_failures: 2,
                ..CacheOptions::default()
            },
        );
        cache.ensure_for(0, 600).unwrap();

        engine.set_fail_hash(true);
        assert!(cache.compute(b"data").is_err());
        engine.set_fail_hash(false);
        assert!(cache.compute(b"data").is_ok());
        engine.set_fail_hash(true);
        assert!(cache.compute(b"data").is_err());

        assert!(cache.is_initialized());
        assert_eq!(cache.stats().compute_failures, 2);
    }

    #[test]
    fn test_compute_output_uses_commitment() {
        let mut cache = HashContextCache::new(FakeEngine::default());
        cache.ensure_for(0, 600).unwrap();
        let output = cache.compute(b"data").unwrap();
        assert_eq!(
            output.commitment,
            crate::engine::blake2b_commitment(b"data", &output.digest)
        );
    }

    #[test]
    fn test_build_failure_message_names_epoch_once() {
        let engine = FakeEngine::default();
        engine.set_fail_init(true);
        let mut cache = HashContextCache::new(engine);

        let err = cache.ensure_for(600, 600).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Context initialization failed for epoch 1: cache allocation failed"
        );
    }

    #[test]
    fn test_panicking_build_leaves_cache_empty() {
        let engine = FakeEngine::default();
        let mut cache = HashContextCache::new(engine.clone());
        cache.ensure_for(0, 600).unwrap();

        engine.set_panic_init(true);
        let err = cache.ensure_for(600, 600).unwrap_err();
        assert_matches!(&err, Error::ContextInit { epoch: 1, message } if message == "hashing library panicked");
        assert!(!cache.is_initialized());
        assert_eq!(cache.epoch(), None);
        assert_eq!(cache.stats().init_failures, 1);

        engine.set_panic_init(false);
        assert_eq!(cache.ensure_for(600, 600).unwrap(), 1);
    }

    #[test]
    fn test_panicking_hash_keeps_context() {
        let engine = FakeEngine::default();
        let mut cache = HashContextCache::new(engine.clone());
        cache.ensure_for(0, 600).unwrap();

        engine.set_panic_hash(true);
        assert_matches!(
            cache.compute(b"data"),
            Err(Error::HashComputation { message }) if message == "hashing library panicked"
        );
        assert!(cache.is_initialized());
        assert_eq!(cache.epoch(), Some(0));
        assert_eq!(cache.stats().compute_failures, 1);

        engine.set_panic_hash(false);
        assert!(cache.compute(b"data").is_ok());
        assert_eq!(engine.builds(), 1);
    }

    #[test]
    fn test_drop_releases_context() {
        let engine = FakeEngine::default();
        {
            let mut cache = HashContextCache::new(engine.clone());
            cache.ensure_for(0, 600).unwrap();
        }
        assert_eq!(engine.releases(), 1);
    }
}
