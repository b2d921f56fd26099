use crate::domain::account::{Account, AccountId, AccountType};
use crate::domain::directory::UserId;
use crate::domain::idempotency::{IdempotencyRecord, LockAttempt, StoredResponse};
use crate::domain::intent::{IntentId, IntentStatus, NewIntent, PaymentIntent};
use crate::domain::ledger::{EntryId, LedgerEntry, Posting, batch_sum};
use crate::domain::ports::{IdempotencyStore, LedgerStore};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamilyDescriptor, DB, Options, WriteBatch};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Column Family for account records.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for ledger entries.
pub const CF_ENTRIES: &str = "entries";
/// Column Family for payment intents.
pub const CF_INTENTS: &str = "intents";
/// Column Family for idempotency records.
pub const CF_IDEMPOTENCY: &str = "idempotency";
/// Column Family for id counters.
pub const CF_META: &str = "meta";

const NEXT_ACCOUNT: &[u8] = b"next_account";
const NEXT_ENTRY: &[u8] = b"next_entry";
const NEXT_INTENT: &[u8] = b"next_intent";

/// Persistent store backed by RocksDB. Entries, intents, and the intent
/// status change of a transition go through one `WriteBatch`, so a commit is
/// all-or-nothing. A process-wide mutex serializes writers: the store is
/// single-process, which is what the CLI needs.
///
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the given path, ensuring all
    /// required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_ACCOUNTS, CF_ENTRIES, CF_INTENTS, CF_IDEMPOTENCY, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();
        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            PaymentError::Persistence(Box::new(std::io::Error::other(format!(
                "column family {name} not found"
            ))))
        })
    }

    fn next_id(&self, counter: &[u8]) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        let current = match self.db.get_cf(cf, counter)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    PaymentError::Persistence(Box::new(std::io::Error::other(
                        "corrupt id counter",
                    )))
                })?;
                u64::from_be_bytes(arr)
            }
            None => 0,
        };
        let next = current + 1;
        self.db.put_cf(cf, counter, next.to_be_bytes())?;
        Ok(next)
    }

    fn get_intent_sync(&self, id: IntentId) -> Result<Option<PaymentIntent>> {
        let cf = self.cf(CF_INTENTS)?;
        match self.db.get_cf(cf, id.0.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_accounts(&self) -> Result<Vec<Account>> {
        let cf = self.cf(CF_ACCOUNTS)?;
        let mut accounts = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            accounts.push(serde_json::from_slice(&value)?);
        }
        Ok(accounts)
    }

    fn idempotency_key(key: &str, request_hash: &str) -> Vec<u8> {
        format!("{key}|{request_hash}").into_bytes()
    }

    fn get_record(&self, key: &str, request_hash: &str) -> Result<Option<IdempotencyRecord>> {
        let cf = self.cf(CF_IDEMPOTENCY)?;
        match self.db.get_cf(cf, Self::idempotency_key(key, request_hash))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_record(&self, record: &IdempotencyRecord) -> Result<()> {
        let cf = self.cf(CF_IDEMPOTENCY)?;
        self.db.put_cf(
            cf,
            Self::idempotency_key(&record.key, &record.request_hash),
            serde_json::to_vec(record)?,
        )?;
        Ok(())
    }
}

fn lock_is_fresh(locked_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    let ttl = chrono::TimeDelta::from_std(ttl).unwrap_or(chrono::TimeDelta::MAX);
    now.signed_duration_since(locked_at) < ttl
}

#[async_trait]
impl LedgerStore for RocksDbStore {
    async fn create_account(
        &self,
        account_type: AccountType,
        user_id: Option<UserId>,
    ) -> Result<Account> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Uniqueness check under the writer lock.
        let existing = self.scan_accounts()?;
        if account_type.is_singleton() {
            if existing.iter().any(|a| a.account_type == account_type) {
                return Err(PaymentError::Conflict(format!(
                    "account of type {account_type} already exists"
                )));
            }
        } else {
            let owner = user_id.ok_or_else(|| {
                PaymentError::Validation("user account requires an owner".to_string())
            })?;
            if existing.iter().any(|a| a.user_id == Some(owner)) {
                return Err(PaymentError::Conflict(format!(
                    "account for user {owner} already exists"
                )));
            }
        }

        let account = Account {
            id: AccountId(self.next_id(NEXT_ACCOUNT)?),
            account_type,
            user_id,
            created_at: Utc::now(),
        };
        let cf = self.cf(CF_ACCOUNTS)?;
        self.db
            .put_cf(cf, account.id.0.to_be_bytes(), serde_json::to_vec(&account)?)?;
        Ok(account)
    }

    async fn find_account_by_type(&self, account_type: AccountType) -> Result<Option<Account>> {
        Ok(self
            .scan_accounts()?
            .into_iter()
            .find(|a| a.account_type == account_type))
    }

    async fn find_account_for_user(&self, user_id: UserId) -> Result<Option<Account>> {
        Ok(self
            .scan_accounts()?
            .into_iter()
            .find(|a| a.user_id == Some(user_id)))
    }

    async fn account(&self, id: AccountId) -> Result<Option<Account>> {
        let cf = self.cf(CF_ACCOUNTS)?;
        match self.db.get_cf(cf, id.0.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn all_accounts(&self) -> Result<Vec<Account>> {
        self.scan_accounts()
    }

    async fn create_intent(&self, new_intent: NewIntent) -> Result<PaymentIntent> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let intent = PaymentIntent {
            id: IntentId(self.next_id(NEXT_INTENT)?),
            buyer_id: new_intent.buyer_id,
            seller_id: new_intent.seller_id,
            listing_id: new_intent.listing_id,
            amount_cfa: new_intent.amount_cfa,
            fee_cfa: new_intent.fee_cfa,
            status: IntentStatus::RequiresConfirmation,
            created_at: Utc::now(),
        };
        let cf = self.cf(CF_INTENTS)?;
        self.db
            .put_cf(cf, intent.id.0.to_be_bytes(), serde_json::to_vec(&intent)?)?;
        Ok(intent)
    }

    async fn intent(&self, id: IntentId) -> Result<Option<PaymentIntent>> {
        self.get_intent_sync(id)
    }

    async fn list_intents(&self) -> Result<Vec<PaymentIntent>> {
        let cf = self.cf(CF_INTENTS)?;
        let mut intents = Vec::new();
        // Keys are big-endian ids, so End-to-Start iteration is newest first.
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::End) {
            let (_key, value) = item?;
            intents.push(serde_json::from_slice(&value)?);
        }
        Ok(intents)
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

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut intent = self
            .get_intent_sync(intent_id)?
            .ok_or(PaymentError::NotFound("intent"))?;
        if intent.status != from {
            return Err(PaymentError::InvalidState(format!(
                "intent {intent_id} is {}, expected {from}",
                intent.status
            )));
        }
        intent.status = to;

        let now = Utc::now();
        let mut batch = WriteBatch::default();
        let cf_entries = self.cf(CF_ENTRIES)?;
        for posting in postings {
            let entry = LedgerEntry {
                id: EntryId(self.next_id(NEXT_ENTRY)?),
                account_id: posting.account_id,
                intent_id,
                delta_cfa: posting.delta_cfa,
                desc: posting.desc,
                created_at: now,
            };
            batch.put_cf(cf_entries, entry.id.0.to_be_bytes(), serde_json::to_vec(&entry)?);
        }
        let cf_intents = self.cf(CF_INTENTS)?;
        batch.put_cf(
            cf_intents,
            intent.id.0.to_be_bytes(),
            serde_json::to_vec(&intent)?,
        );
        self.db.write(batch)?;
        Ok(intent)
    }

    async fn sum_deltas(&self, account_id: AccountId) -> Result<i64> {
        let cf = self.cf(CF_ENTRIES)?;
        let mut sum = 0i64;
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            let entry: LedgerEntry = serde_json::from_slice(&value)?;
            if entry.account_id == account_id {
                sum += entry.delta_cfa;
            }
        }
        Ok(sum)
    }

    async fn list_entries(&self, limit: usize) -> Result<Vec<LedgerEntry>> {
        let cf = self.cf(CF_ENTRIES)?;
        let mut entries = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::End) {
            if entries.len() >= limit {
                break;
            }
            let (_key, value) = item?;
            entries.push(serde_json::from_slice(&value)?);
        }
        Ok(entries)
    }
}

#[async_trait]
impl IdempotencyStore for RocksDbStore {
    async fn find_completed(
        &self,
        key: &str,
        request_hash: &str,
    ) -> Result<Option<StoredResponse>> {
        Ok(self
            .get_record(key, request_hash)?
            .filter(|r| r.completed_at.is_some())
            .and_then(|r| r.response))
    }

    async fn try_lock(
        &self,
        key: &str,
        request_hash: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<LockAttempt> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        match self.get_record(key, request_hash)? {
            None => {
                self.put_record(&IdempotencyRecord {
                    key: key.to_string(),
                    request_hash: request_hash.to_string(),
                    locked_at: Some(now),
                    completed_at: None,
                    response: None,
                })?;
                Ok(LockAttempt::Acquired)
            }
            Some(mut record) => {
                if record.completed_at.is_some() {
                    let response = record.response.ok_or_else(|| {
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
                self.put_record(&record)?;
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
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut record =
            self.get_record(key, request_hash)?
                .unwrap_or_else(|| IdempotencyRecord {
                    key: key.to_string(),
                    request_hash: request_hash.to_string(),
                    locked_at: None,
                    completed_at: None,
                    response: None,
                });
        record.response = Some(response);
        record.completed_at = Some(Utc::now());
        record.locked_at = None;
        self.put_record(&record)
    }

    async fn unlock(&self, key: &str, request_hash: &str) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(mut record) = self.get_record(key, request_hash)?
            && record.completed_at.is_none()
        {
            record.locked_at = None;
            self.put_record(&record)?;
        }
        Ok(())
    }
}
