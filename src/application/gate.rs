use crate::domain::idempotency::{LockAttempt, RequestFingerprint, StoredResponse};
use crate::domain::ports::IdempotencyStoreBox;
use crate::error::{PaymentError, Result};
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// A lock older than this is considered stale and may be reclaimed. A
/// merely slow (not dead) original request can then race its retry; the
/// window is an acknowledged soundness gap, not a hard guarantee.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(60);

/// Wraps a side-effecting operation so client retries are at-most-once:
/// the first completion is stored per `(key, fingerprint)` and replayed
/// verbatim to every later duplicate, while concurrent duplicates of an
/// in-flight request fail fast with `Locked`.
pub struct IdempotencyGate {
    store: IdempotencyStoreBox,
    lock_ttl: Duration,
}

impl IdempotencyGate {
    pub fn new(store: IdempotencyStoreBox) -> Self {
        Self::with_lock_ttl(store, DEFAULT_LOCK_TTL)
    }

    pub fn with_lock_ttl(store: IdempotencyStoreBox, lock_ttl: Duration) -> Self {
        Self { store, lock_ttl }
    }

    /// Runs `op` under the idempotency protocol. With no key the gate is
    /// bypassed and `op` executes unconditionally; callers of mutating
    /// operations must require a key before getting here.
    pub async fn run<F, Fut>(
        &self,
        key: Option<&str>,
        fingerprint: &RequestFingerprint,
        op: F,
    ) -> Result<StoredResponse>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<StoredResponse>> + Send,
    {
        let Some(key) = key else {
            return op().await;
        };
        let hash = fingerprint.as_str();

        if let Some(stored) = self.store.find_completed(key, hash).await? {
            debug!(key, "idempotent replay");
            return Ok(stored);
        }

        match self
            .store
            .try_lock(key, hash, Utc::now(), self.lock_ttl)
            .await?
        {
            LockAttempt::Completed(stored) => Ok(stored),
            LockAttempt::Busy => Err(PaymentError::Locked),
            LockAttempt::Acquired => match op().await {
                Ok(response) => {
                    self.store.complete(key, hash, response.clone()).await?;
                    Ok(response)
                }
                Err(e) => {
                    // Release so a later retry can re-execute; the wrapped
                    // operation is atomic, so nothing was applied.
                    if let Err(unlock_err) = self.store.unlock(key, hash).await {
                        warn!(key, error = %unlock_err, "failed to release idempotency lock");
                    }
                    Err(e)
                }
            },
        }
    }
}
