use crate::domain::account::{Account, AccountId, AccountType};
use crate::domain::directory::UserId;
use crate::domain::idempotency::{IdempotencyRecord, LockAttempt, StoredResponse};
use crate::domain::intent::{IntentId, IntentStatus, NewIntent, PaymentIntent};
use crate::domain::ledger::{EntryId, LedgerEntry, Posting, batch_sum};
use crate::domain::ports::{IdempotencyStore, LedgerStore};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Default)]
struct LedgerState {
    accounts: Vec<Account>,
    entries: Vec<LedgerEntry>,
    intents: BTreeMap<IntentId, PaymentIntent>,
    next_account: u64,
    next_entry: u64,
    next_intent: u64,
}

/// Thread-safe in-memory ledger store. A single `RwLock` over the whole
/// state is the transaction primitive: `commit` holds the write lock for
/// the status compare-and-set plus all entry appends, so concurrent
/// transitions on the same intent serialize and the loser fails its
/// precondition.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn create_account(
        &self,
        account_type: AccountType,
        user_id: Option<UserId>,
    ) -> Result<Account> {
        let mut state = self.state.write().await;
        if account_type.is_singleton() {
            if state.accounts.iter().any(|a| a.account_type == account_type) {
                return Err(PaymentError::Conflict(format!(
                    "account of type {account_type} already exists"
                )));
            }
        } else {
            let owner = user_id.ok_or_else(|| {
                PaymentError::Validation("user account requires an owner".to_string())
            })?;
            if state.accounts.iter().any(|a| a.user_id == Some(owner)) {
                return Err(PaymentError::Conflict(format!(
                    "account for user {owner} already exists"
                )));
            }
        }

        state.next_account += 1;
        let account = Account {
            id: AccountId(state.next_account),
            account_type,
            user_id,
            created_at: Utc::now(),
        };
        state.accounts.push(account.clone());
        Ok(account)
    }

    async fn find_account_by_type(&self, account_type: AccountType) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .iter()
            .find(|a| a.account_type == account_type)
            .cloned())
    }

    async fn find_account_for_user(&self, user_id: UserId) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .iter()
            .find(|a| a.user_id == Some(user_id))
            .cloned())
    }

    async fn account(&self, id: AccountId) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn all_accounts(&self) -> Result<Vec<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.clone())
    }

    async fn create_intent(&self, new_intent: NewIntent) -> Result<PaymentIntent> {
        let mut state = self.state.write().await;
        state.next_intent += 1;
        let intent = PaymentIntent {
            id: IntentId(state.next_intent),
            buyer_id: new_intent.buyer_id,
            seller_id: new_intent.seller_id,
            listing_id: new_intent.listing_id,
            amount_cfa: new_intent.amount_cfa,
            fee_cfa: new_intent.fee_cfa,
            status: IntentStatus::RequiresConfirmation,
            created_at: Utc::now(),
        };
        state.intents.insert(intent.id, intent.clone());
        Ok(intent)
    }

    async fn intent(&self, id: IntentId) -> Result<Option<PaymentIntent>> {
        let state = self.state.read().await;
        Ok(state.intents.get(&id).cloned())
    }

    async fn list_intents(&self) -> Result<Vec<PaymentIntent>> {
        let state = self.state.read().await;
        // Ids are monotonic, so descending id order is newest first.
        Ok(state.intents.values().rev().cloned().collect())
    }

    async fn commit(
        &self,
        intent_id: IntentId,
        from: IntentStatus,
        to: IntentStatus,
        postings: Vec<Posting>,
    ) -> Result<PaymentIntent> {
        if !from.can_transition_to(to) {
            return Err(PaymentError::InvalidState(format!(
                "no transition from {from} to {to}"
            )));
        }
        if batch_sum(&postings) != 0 {
            return Err(PaymentError::Validation(format!(
                "posting batch for intent {intent_id} does not balance: {}",
                batch_sum(&postings)
            )));
        }

        let mut state = self.state.write().await;
        let current = state
            .intents
            .get(&intent_id)
            .ok_or(PaymentError::NotFound("intent"))?
            .status;
        if current != from {
            return Err(PaymentError::InvalidState(format!(
                "intent {intent_id} is {current}, expected {from}"
            )));
        }

        let now = Utc::now();
        let mut new_entries = Vec::with_capacity(postings.len());
        for posting in postings {
            state.next_entry += 1;
            new_entries.push(LedgerEntry {
                id: EntryId(state.next_entry),
                account_id: posting.account_id,
                intent_id,
                delta_cfa: posting.delta_cfa,
                desc: posting.desc,
                created_at: now,
            });
        }
        state.entries.append(&mut new_entries);

        let intent = state
            .intents
            .get_mut(&intent_id)
            .ok_or(PaymentError::NotFound("intent"))?;
        intent.status = to;
        Ok(intent.clone())
    }

    async fn sum_deltas(&self, account_id: AccountId) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.account_id == account_id)
            .map(|e| e.delta_cfa)
            .sum())
    }

    async fn list_entries(&self, limit: usize) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        Ok(state.entries.iter().rev().take(limit).cloned().collect())
    }
}

/// Thread-safe in-memory idempotency store. `try_lock` performs its
/// check-then-set under the write lock, so concurrent duplicates never both
/// acquire.
#[derive(Default, Clone)]
pub struct InMemoryIdempotencyStore {
    records: Arc<RwLock<HashMap<(String, String), IdempotencyRecord>>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_is_fresh(locked_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    let ttl = chrono::TimeDelta::from_std(ttl).unwrap_or(chrono::TimeDelta::MAX);
    now.signed_duration_since(locked_at) < ttl
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn find_completed(
        &self,
        key: &str,
        request_hash: &str,
    ) -> Result<Option<StoredResponse>> {
        let records = self.records.read().await;
        Ok(records
            .get(&(key.to_string(), request_hash.to_string()))
            .filter(|r| r.completed_at.is_some())
            .and_then(|r| r.response.clone()))
    }

    async fn try_lock(
        &self,
        key: &str,
        request_hash: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<LockAttempt> {
        let mut records = self.records.write().await;
        let map_key = (key.to_string(), request_hash.to_string());
        match records.get_mut(&map_key) {
            None => {
                records.insert(
                    map_key,
                    IdempotencyRecord {
                        key: key.to_string(),
                        request_hash: request_hash.to_string(),
                        locked_at: Some(now),
                        completed_at: None,
                        response: None,
                    },
                );
                Ok(LockAttempt::Acquired)
            }
            Some(record) => {
                if record.completed_at.is_some() {
                    let response = record.response.clone().ok_or_else(|| {
                        PaymentError::Persistence(Box::new(std::io::Error::other(
                            "completed idempotency record without a response",
                        )))
                    })?;
                    return Ok(LockAttempt::Completed(response));
                }
                if let Some(locked_at) = record.locked_at
                    && lock_is_fresh(locked_at, now, ttl)
                {
                    return Ok(LockAttempt::Busy);
                }
                record.locked_at = Some(now);
                Ok(LockAttempt::Acquired)
            }
        }
    }

    async fn complete(
        &self,
        key: &str,
        request_hash: &str,
        response: StoredResponse,
    ) -> Result<()> {
        let mut records = self.records.write().await;
        let map_key = (key.to_string(), request_hash.to_string());
        let now = Utc::now();
        let record = records
            .entry(map_key)
            .or_insert_with(|| IdempotencyRecord {
                key: key.to_string(),
                request_hash: request_hash.to_string(),
                locked_at: None,
                completed_at: None,
                response: None,
            });
        record.response = Some(response);
        record.completed_at = Some(now);
        record.locked_at = None;
        Ok(())
    }

    async fn unlock(&self, key: &str, request_hash: &str) -> Result<()> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&(key.to_string(), request_hash.to_string()))
            && record.completed_at.is_none()
        {
            record.locked_at = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::directory::ListingId;
    use serde_json::json;

    fn new_intent() -> NewIntent {
        NewIntent {
            buyer_id: UserId(1),
            seller_id: UserId(2),
            listing_id: ListingId(10),
            amount_cfa: 10_000,
            fee_cfa: 500,
        }
    }

    #[tokio::test]
    async fn singleton_account_duplicate_is_conflict() {
        let store = InMemoryLedgerStore::new();
        store
            .create_account(AccountType::PlatformEscrow, None)
            .await
            .unwrap();
        let err = store
            .create_account(AccountType::PlatformEscrow, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Conflict(_)));
    }

    #[tokio::test]
    async fn user_account_duplicate_is_conflict() {
        let store = InMemoryLedgerStore::new();
        store
            .create_account(AccountType::User, Some(UserId(1)))
            .await
            .unwrap();
        let err = store
            .create_account(AccountType::User, Some(UserId(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Conflict(_)));

        // A different user gets their own account.
        store
            .create_account(AccountType::User, Some(UserId(2)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn user_account_requires_owner() {
        let store = InMemoryLedgerStore::new();
        let err = store
            .create_account(AccountType::User, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }

    #[tokio::test]
    async fn commit_applies_entries_and_status_atomically() {
        let store = InMemoryLedgerStore::new();
        let psp = store
            .create_account(AccountType::ExternalPsp, None)
            .await
            .unwrap();
        let escrow = store
            .create_account(AccountType::PlatformEscrow, None)
            .await
            .unwrap();
        let intent = store.create_intent(new_intent()).await.unwrap();

        let updated = store
            .commit(
                intent.id,
                IntentStatus::RequiresConfirmation,
                IntentStatus::Confirmed,
                vec![
                    Posting::new(psp.id, -10_000, "confirm: debit external"),
                    Posting::new(escrow.id, 10_000, "confirm: credit escrow"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(updated.status, IntentStatus::Confirmed);
        assert_eq!(store.sum_deltas(psp.id).await.unwrap(), -10_000);
        assert_eq!(store.sum_deltas(escrow.id).await.unwrap(), 10_000);
        assert_eq!(store.list_entries(200).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn commit_cas_loser_fails_without_writing() {
        let store = InMemoryLedgerStore::new();
        let intent = store.create_intent(new_intent()).await.unwrap();
        store
            .commit(
                intent.id,
                IntentStatus::RequiresConfirmation,
                IntentStatus::Canceled,
                Vec::new(),
            )
            .await
            .unwrap();

        // The status moved, so a commit expecting the old status loses.
        let err = store
            .commit(
                intent.id,
                IntentStatus::RequiresConfirmation,
                IntentStatus::Confirmed,
                Vec::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidState(_)));
        assert!(store.list_entries(200).await.unwrap().is_empty());
        assert_eq!(
            store.intent(intent.id).await.unwrap().unwrap().status,
            IntentStatus::Canceled
        );
    }

    #[tokio::test]
    async fn commit_rejects_unbalanced_batch() {
        let store = InMemoryLedgerStore::new();
        let psp = store
            .create_account(AccountType::ExternalPsp, None)
            .await
            .unwrap();
        let intent = store.create_intent(new_intent()).await.unwrap();

        let err = store
            .commit(
                intent.id,
                IntentStatus::RequiresConfirmation,
                IntentStatus::Confirmed,
                vec![Posting::new(psp.id, -10_000, "lopsided")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
        assert!(store.list_entries(200).await.unwrap().is_empty());
        assert_eq!(
            store.intent(intent.id).await.unwrap().unwrap().status,
            IntentStatus::RequiresConfirmation
        );
    }

    #[tokio::test]
    async fn commit_rejects_illegal_transition() {
        let store = InMemoryLedgerStore::new();
        let intent = store.create_intent(new_intent()).await.unwrap();
        let err = store
            .commit(
                intent.id,
                IntentStatus::RequiresConfirmation,
                IntentStatus::Captured,
                Vec::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidState(_)));
    }

    #[tokio::test]
    async fn commit_unknown_intent_is_not_found() {
        let store = InMemoryLedgerStore::new();
        let err = store
            .commit(
                IntentId(99),
                IntentStatus::RequiresConfirmation,
                IntentStatus::Canceled,
                Vec::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::NotFound("intent")));
    }

    #[tokio::test]
    async fn intents_listed_newest_first() {
        let store = InMemoryLedgerStore::new();
        let a = store.create_intent(new_intent()).await.unwrap();
        let b = store.create_intent(new_intent()).await.unwrap();

        let listed = store.list_intents().await.unwrap();
        assert_eq!(listed[0].id, b.id);
        assert_eq!(listed[1].id, a.id);
    }

    #[tokio::test]
    async fn idempotency_lock_and_complete_round_trip() {
        let store = InMemoryIdempotencyStore::new();
        let ttl = Duration::from_secs(60);

        assert!(
            store
                .find_completed("k", "h")
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(
            store.try_lock("k", "h", Utc::now(), ttl).await.unwrap(),
            LockAttempt::Acquired
        );
        assert_eq!(
            store.try_lock("k", "h", Utc::now(), ttl).await.unwrap(),
            LockAttempt::Busy
        );

        let response = StoredResponse {
            status_code: 201,
            body: json!({ "id": 1 }),
        };
        store.complete("k", "h", response.clone()).await.unwrap();

        assert_eq!(
            store.find_completed("k", "h").await.unwrap(),
            Some(response.clone())
        );
        // After completion, the lock attempt returns the stored response.
        assert_eq!(
            store.try_lock("k", "h", Utc::now(), ttl).await.unwrap(),
            LockAttempt::Completed(response)
        );
    }

    #[tokio::test]
    async fn stale_lock_can_be_reacquired() {
        let store = InMemoryIdempotencyStore::new();
        assert_eq!(
            store
                .try_lock("k", "h", Utc::now(), Duration::ZERO)
                .await
                .unwrap(),
            LockAttempt::Acquired
        );
        // With a zero ttl the lock is immediately stale.
        assert_eq!(
            store
                .try_lock("k", "h", Utc::now(), Duration::ZERO)
                .await
                .unwrap(),
            LockAttempt::Acquired
        );
    }

    #[tokio::test]
    async fn unlock_releases_an_uncompleted_record() {
        let store = InMemoryIdempotencyStore::new();
        let ttl = Duration::from_secs(60);
        store.try_lock("k", "h", Utc::now(), ttl).await.unwrap();
        store.unlock("k", "h").await.unwrap();
        assert_eq!(
            store.try_lock("k", "h", Utc::now(), ttl).await.unwrap(),
            LockAttempt::Acquired
        );
    }
}
