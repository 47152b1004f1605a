//! Share verification pipeline
//!
//! Parses the header and target, makes sure the hashing context matches the
//! header's epoch, hashes the header with its hash field zeroed, derives the
//! commitment and compares it against the target.
//!
//! The cache sits behind a mutex: ensuring the context, hashing and the
//! commitment all run under one guard, so an epoch switch triggered by one
//! caller is never observed half-done by another, and the same context is
//! never hashed from two threads at once. Independent verifiers run in
//! parallel.

use crate::cache::{CacheOptions, CacheStats, HashContextCache, HashOutput};
use crate::engine::{Digest32, HashEngine};
use crate::epoch::Epoch;
use crate::error::Error;
use crate::header::BlockHeader;
use crate::target::Target;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, warn};

/// Boundary code: commitment meets the target
pub const CODE_MEETS_TARGET: i32 = 1;
/// Boundary code: valid share, commitment above the target
pub const CODE_BELOW_TARGET: i32 = 0;
/// Boundary code: invalid input or internal failure
pub const CODE_INVALID: i32 = -1;

/// Outcome of a successful verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareVerdict {
    /// Commitment is less than or equal to the target
    MeetsTarget,
    /// Commitment was computed but is greater than the target
    ValidButBelowTarget,
}

impl ShareVerdict {
    /// Verdict for a commitment against a target
    pub fn of(target: &Target, commitment: &Digest32) -> Self {
        if target.is_met_by(commitment) {
            ShareVerdict::MeetsTarget
        } else {
            ShareVerdict::ValidButBelowTarget
        }
    }

    /// Tri-state boundary code
    pub fn code(self) -> i32 {
        match self {
            ShareVerdict::MeetsTarget => CODE_MEETS_TARGET,
            ShareVerdict::ValidButBelowTarget => CODE_BELOW_TARGET,
        }
    }

    /// Whether the share qualifies
    pub fn meets_target(self) -> bool {
        self == ShareVerdict::MeetsTarget
    }
}

/// Verification failures
///
/// Every variant collapses to [`CODE_INVALID`] at the boundary, but they stay
/// distinct in logs: a pool must read `ContextInitFailed` as "cannot verify
/// right now", not as an invalid share.
#[derive(thiserror::Error, Debug)]
pub enum VerifyError {
    /// Header hex is malformed
    #[error("Invalid header: {0}")]
    InvalidHeader(#[source] Error),

    /// Target hex is malformed
    #[error("Invalid target: {0}")]
    InvalidTarget(#[source] Error),

    /// Caller supplied an unusable parameter (zero epoch duration)
    #[error("Invalid parameter: {0}")]
    InvalidConfig(#[source] Error),

    /// Hashing context could not be built
    #[error("Hashing context unavailable: {0}")]
    ContextInitFailed(#[source] Error),

    /// The hashing library failed during hash or commitment
    #[error("Hash computation failed: {0}")]
    HashComputationFailed(#[source] Error),

    /// Verifier reached a state it should never be in
    #[error("Internal verifier error: {0}")]
    Internal(#[source] Error),

    /// The caller's deadline expired
    #[error("Verification timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
}

impl VerifyError {
    /// Tri-state boundary code
    pub fn code(&self) -> i32 {
        CODE_INVALID
    }

    /// Whether the failure is the caller's input rather than the verifier
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            VerifyError::InvalidHeader(_) | VerifyError::InvalidTarget(_) | VerifyError::InvalidConfig(_)
        )
    }

    /// Check if the same share may verify when retried after a backoff
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VerifyError::ContextInitFailed(_)
                | VerifyError::HashComputationFailed(_)
                | VerifyError::Timeout { .. }
        )
    }

    /// Get error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            VerifyError::InvalidHeader(_) => "invalid_header",
            VerifyError::InvalidTarget(_) => "invalid_target",
            VerifyError::InvalidConfig(_) => "invalid_config",
            VerifyError::ContextInitFailed(_) => "context_init_failed",
            VerifyError::HashComputationFailed(_) => "hash_computation_failed",
            VerifyError::Internal(_) => "internal",
            VerifyError::Timeout { .. } => "timeout",
        }
    }
}

/// Collapse a verification result to the tri-state boundary code
pub fn verdict_code(result: &Result<ShareVerdict, VerifyError>) -> i32 {
    match result {
        Ok(verdict) => verdict.code(),
        Err(e) => e.code(),
    }
}

/// Log a failed verification with its category before it is collapsed
pub fn log_failure(err: &VerifyError) {
    if err.is_input_error() {
        warn!(category = err.category(), "Rejected share: {}", err);
    } else {
        error!(
            category = err.category(),
            retryable = err.is_retryable(),
            "Share could not be verified: {}",
            err
        );
    }
}

/// Full result of checking one share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShareOutcome {
    /// Epoch the header was hashed under
    pub epoch: Epoch,
    /// Raw engine output
    #[serde(with = "hex_digest")]
    pub digest: Digest32,
    /// Commitment compared against the targets
    #[serde(with = "hex_digest")]
    pub commitment: Digest32,
    /// Verdict against the pool share target
    pub verdict: ShareVerdict,
    /// Whether the commitment also meets the network target from `bits`
    pub block_candidate: bool,
}

mod hex_digest {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(digest: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(digest))
    }
}

/// Share verifier owning one hashing context cache
pub struct ShareVerifier<E: HashEngine> {
    cache: Mutex<HashContextCache<E>>,
}

impl<E: HashEngine> ShareVerifier<E> {
    /// Create a verifier with default cache options
    pub fn new(engine: E) -> Self {
        Self::with_options(engine, CacheOptions::default())
    }

    /// Create a verifier
    pub fn with_options(engine: E, options: CacheOptions) -> Self {
        Self {
            cache: Mutex::new(HashContextCache::with_options(engine, options)),
        }
    }

    /// Verify a share given as hex strings
    pub fn verify(
        &self,
        header_hex: &str,
        target_hex: &str,
        epoch_duration_secs: u32,
    ) -> Result<ShareVerdict, VerifyError> {
        let header = BlockHeader::parse(header_hex).map_err(VerifyError::InvalidHeader)?;
        let target = Target::from_hex(target_hex).map_err(VerifyError::InvalidTarget)?;
        self.verify_header(&header, &target, epoch_duration_secs)
    }

    /// Verify a parsed share
    pub fn verify_header(
        &self,
        header: &BlockHeader,
        target: &Target,
        epoch_duration_secs: u32,
    ) -> Result<ShareVerdict, VerifyError> {
        let (epoch, output) = self.commit(header, epoch_duration_secs)?;
        let verdict = ShareVerdict::of(target, &output.commitment);
        debug!(
            epoch,
            nonce = header.nonce,
            verdict = ?verdict,
            commitment = %hex::encode(output.commitment),
            "Share verified"
        );
        Ok(verdict)
    }

    /// Verify a share and collapse the result to `1`, `0` or `-1`
    pub fn verify_code(&self, header_hex: &str, target_hex: &str, epoch_duration_secs: u32) -> i32 {
        let result = self.verify(header_hex, target_hex, epoch_duration_secs);
        if let Err(e) = &result {
            log_failure(e);
        }
        verdict_code(&result)
    }

    /// Check a share against the pool target and the header's network target
    ///
    /// The commitment is computed once; a share whose commitment also meets
    /// the target encoded in `bits` is a block candidate.
    pub fn check_share(
        &self,
        header: &BlockHeader,
        pool_target: &Target,
        epoch_duration_secs: u32,
    ) -> Result<ShareOutcome, VerifyError> {
        let (epoch, output) = self.commit(header, epoch_duration_secs)?;
        let block_candidate = match header.network_target() {
            Ok(network_target) => network_target.is_met_by(&output.commitment),
            Err(e) => {
                warn!(bits = header.bits, "Ignoring unusable network target: {}", e);
                false
            }
        };
        Ok(ShareOutcome {
            epoch,
            digest: output.digest,
            commitment: output.commitment,
            verdict: ShareVerdict::of(pool_target, &output.commitment),
            block_candidate,
        })
    }

    /// Release the hashing context; the next verification rebuilds it
    pub fn teardown(&self) {
        self.cache.lock().teardown();
    }

    /// Epoch of the loaded context
    pub fn epoch(&self) -> Option<Epoch> {
        self.cache.lock().epoch()
    }

    /// Cache counters
    pub fn stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    fn commit(
        &self,
        header: &BlockHeader,
        epoch_duration_secs: u32,
    ) -> Result<(Epoch, HashOutput), VerifyError> {
        let mut cache = self.cache.lock();

        let epoch = cache
            .ensure_for(header.timestamp, epoch_duration_secs)
            .map_err(|e| match e {
                Error::InvalidConfig { .. } => VerifyError::InvalidConfig(e),
                other => VerifyError::ContextInitFailed(other),
            })?;

        let output = cache.compute(&header.hash_input()).map_err(|e| match e {
            Error::NotInitialized => VerifyError::Internal(e),
            other => VerifyError::HashComputationFailed(other),
        })?;

        Ok((epoch, output))
    }
}
