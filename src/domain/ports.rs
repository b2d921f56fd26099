use crate::domain::account::{Account, AccountId, AccountType};
use crate::domain::directory::{Listing, ListingId, UserId, UserRecord};
use crate::domain::idempotency::{LockAttempt, StoredResponse};
use crate::domain::intent::{IntentId, IntentStatus, NewIntent, PaymentIntent};
use crate::domain::ledger::{LedgerEntry, Posting};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Durable, atomic persistence of accounts, ledger entries, and payment
/// intents. Implementations must make `commit` all-or-nothing and serialize
/// concurrent commits on the same intent.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Creates an account, enforcing uniqueness: singleton types exist at
    /// most once system-wide, `User` accounts at most once per owner.
    /// Fails with `Conflict` when the constraint is violated.
    async fn create_account(
        &self,
        account_type: AccountType,
        user_id: Option<UserId>,
    ) -> Result<Account>;

    async fn find_account_by_type(&self, account_type: AccountType) -> Result<Option<Account>>;
    async fn find_account_for_user(&self, user_id: UserId) -> Result<Option<Account>>;
    async fn account(&self, id: AccountId) -> Result<Option<Account>>;
    async fn all_accounts(&self) -> Result<Vec<Account>>;

    async fn create_intent(&self, new_intent: NewIntent) -> Result<PaymentIntent>;
    async fn intent(&self, id: IntentId) -> Result<Option<PaymentIntent>>;
    /// All intents, newest first.
    async fn list_intents(&self) -> Result<Vec<PaymentIntent>>;

    /// The transactional primitive: compare-and-set the intent status from
    /// `from` to `to` and append the posting batch, atomically. Fails with
    /// `InvalidState` when the intent's current status is not `from` (a
    /// concurrent transition won), and `Validation` when the batch does not
    /// sum to zero. On failure nothing is written.
    async fn commit(
        &self,
        intent_id: IntentId,
        from: IntentStatus,
        to: IntentStatus,
        postings: Vec<Posting>,
    ) -> Result<PaymentIntent>;

    /// Aggregate balance: sum of `delta_cfa` over the account's entries.
    async fn sum_deltas(&self, account_id: AccountId) -> Result<i64>;
    /// Ledger entries, newest first, capped at `limit`.
    async fn list_entries(&self, limit: usize) -> Result<Vec<LedgerEntry>>;
}

/// Keyed store backing the idempotency gate.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn find_completed(&self, key: &str, request_hash: &str)
    -> Result<Option<StoredResponse>>;

    /// Attempts to acquire the in-flight lock for `(key, request_hash)`.
    /// A lock older than `ttl` is stale and may be reacquired.
    async fn try_lock(
        &self,
        key: &str,
        request_hash: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<LockAttempt>;

    /// Stores the response and releases the lock.
    async fn complete(&self, key: &str, request_hash: &str, response: StoredResponse)
    -> Result<()>;

    /// Releases the lock without storing a response, so a later retry can
    /// re-execute after the wrapped operation failed.
    async fn unlock(&self, key: &str, request_hash: &str) -> Result<()>;
}

/// Listing catalogue collaborator.
#[async_trait]
pub trait ListingProvider: Send + Sync {
    async fn listing(&self, id: ListingId) -> Result<Option<Listing>>;
}

/// User/identity collaborator; supplies block and KYC status.
#[async_trait]
pub trait UserProvider: Send + Sync {
    async fn user(&self, id: UserId) -> Result<Option<UserRecord>>;
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;
pub type IdempotencyStoreBox = Box<dyn IdempotencyStore>;
pub type ListingProviderBox = Box<dyn ListingProvider>;
pub type UserProviderBox = Box<dyn UserProvider>;
