//! Async verification service
//!
//! Verification is CPU-bound and context construction can take seconds, so
//! the service runs it on the blocking pool and stops waiting once the
//! deadline passes. The abandoned call still runs to completion under the
//! cache lock, which leaves the cache either built or empty, never partial.

use crate::engine::HashEngine;
use crate::error::Error;
use crate::header::BlockHeader;
use crate::target::Target;
use crate::verifier::{log_failure, verdict_code, ShareOutcome, ShareVerdict, ShareVerifier, VerifyError};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default deadline for one verification
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline-bounded front end to a [`ShareVerifier`]
pub struct VerifierService<E: HashEngine> {
    verifier: Arc<ShareVerifier<E>>,
    timeout: Duration,
}

impl<E: HashEngine> Clone for VerifierService<E> {
    fn clone(&self) -> Self {
        Self {
            verifier: Arc::clone(&self.verifier),
            timeout: self.timeout,
        }
    }
}

impl<E> VerifierService<E>
where
    E: HashEngine + Send + 'static,
    E::Context: Send + 'static,
{
    /// Create a service around a verifier
    pub fn new(verifier: ShareVerifier<E>, timeout: Duration) -> Self {
        Self {
            verifier: Arc::new(verifier),
            timeout,
        }
    }

    /// The wrapped verifier
    pub fn verifier(&self) -> &ShareVerifier<E> {
        &self.verifier
    }

    /// Active deadline
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Verify a share without blocking the async runtime
    pub async fn verify(
        &self,
        header_hex: String,
        target_hex: String,
        epoch_duration_secs: u32,
    ) -> Result<ShareVerdict, VerifyError> {
        self.run_blocking(move |verifier| verifier.verify(&header_hex, &target_hex, epoch_duration_secs))
            .await
    }

    /// Check a parsed share against a pool target and the header's network target
    pub async fn check_share(
        &self,
        header: BlockHeader,
        pool_target: Target,
        epoch_duration_secs: u32,
    ) -> Result<ShareOutcome, VerifyError> {
        self.run_blocking(move |verifier| verifier.check_share(&header, &pool_target, epoch_duration_secs))
            .await
    }

    async fn run_blocking<T, F>(&self, f: F) -> Result<T, VerifyError>
    where
        T: Send + 'static,
        F: FnOnce(&ShareVerifier<E>) -> Result<T, VerifyError> + Send + 'static,
    {
        let verifier = Arc::clone(&self.verifier);
        let task = tokio::task::spawn_blocking(move || f(verifier.as_ref()));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(VerifyError::HashComputationFailed(Error::hash_computation(
                format!("Verification task failed: {}", join_error),
            ))),
            Err(_) => {
                debug!(timeout_ms = self.timeout.as_millis() as u64, "Verification deadline passed");
                Err(VerifyError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Verify a share and collapse the result to `1`, `0` or `-1`
    pub async fn verify_code(&self, header_hex: String, target_hex: String, epoch_duration_secs: u32) -> i32 {
        let result = self.verify(header_hex, target_hex, epoch_duration_secs).await;
        if let Err(e) = &result {
            log_failure(e);
        }
        verdict_code(&result)
    }

    /// Release the hashing context
    pub async fn teardown(&self) {
        let verifier = Arc::clone(&self.verifier);
        // A join error here means the teardown panicked; nothing is left to release
        let _ = tokio::task::spawn_blocking(move || verifier.teardown()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{FakeContext, FakeEngine};
    use crate::engine::Digest32;
    use crate::epoch::SeedKey;
    use crate::error::Result;
    use crate::verifier::{CODE_INVALID, CODE_MEETS_TARGET};
    use assert_matches::assert_matches;

    const WEEK: u32 = 604_800;

    #[derive(Clone, Default)]
    struct SlowEngine {
        inner: FakeEngine,
    }

    impl HashEngine for SlowEngine {
        type Context = FakeContext;

        fn name(&self) -> &'static str {
            "slow"
        }

        fn derive_context(&self, seed: &SeedKey) -> Result<FakeContext> {
            std::thread::sleep(Duration::from_millis(300));
            self.inner.derive_context(seed)
        }

        fn compute_hash(&self, context: &FakeContext, data: &[u8]) -> Result<Digest32> {
            self.inner.compute_hash(context, data)
        }
    }

    fn header() -> String {
        format!("01000000{}", "0".repeat(216))
    }

    #[tokio::test]
    async fn test_service_verifies() {
        let service = VerifierService::new(ShareVerifier::new(FakeEngine::default()), DEFAULT_VERIFY_TIMEOUT);
        assert_eq!(
            service.verify_code(header(), "ff".repeat(32), WEEK).await,
            CODE_MEETS_TARGET
        );
        assert_eq!(service.verify_code(header(), "ff".repeat(31), WEEK).await, CODE_INVALID);
    }

    #[tokio::test]
    async fn test_service_timeout_leaves_cache_consistent() {
        let engine = SlowEngine::default();
        let service = VerifierService::new(ShareVerifier::new(engine.clone()), Duration::from_millis(20));

        assert_matches!(
            service.verify(header(), "ff".repeat(32), WEEK).await,
            Err(VerifyError::Timeout { timeout_ms: 20 })
        );

        // The abandoned build finishes in the background
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(service.verifier().epoch(), Some(0));
        assert_eq!(engine.inner.builds(), 1);

        assert_eq!(
            service.verify_code(header(), "ff".repeat(32), WEEK).await,
            CODE_MEETS_TARGET
        );
        assert_eq!(engine.inner.builds(), 1);
    }

    #[tokio::test]
    async fn test_service_check_share() {
        let service = VerifierService::new(ShareVerifier::new(FakeEngine::default()), DEFAULT_VERIFY_TIMEOUT);
        let header = BlockHeader::parse(&header()).unwrap();

        let outcome = service.check_share(header, Target::max(), WEEK).await.unwrap();
        assert_eq!(outcome.epoch, 0);
        assert_eq!(outcome.verdict, ShareVerdict::MeetsTarget);

        let outcome = service.check_share(header, Target::min(), WEEK).await.unwrap();
        assert_eq!(outcome.verdict, ShareVerdict::ValidButBelowTarget);

        assert_matches!(
            service.check_share(header, Target::max(), 0).await,
            Err(VerifyError::InvalidConfig(_))
        );
    }

    #[tokio::test]
    async fn test_service_teardown() {
        let engine = FakeEngine::default();
        let service = VerifierService::new(ShareVerifier::new(engine.clone()), DEFAULT_VERIFY_TIMEOUT);
        service.verify(header(), "ff".repeat(32), WEEK).await.unwrap();

        service.teardown().await;
        assert_eq!(service.verifier().epoch(), None);
        assert_eq!(engine.releases(), 1);
    }
}
