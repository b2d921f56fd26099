use crate::domain::account::AccountId;
use crate::domain::intent::IntentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One signed movement of funds against one account. Immutable once written;
/// an account's balance is the sum of its entry deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub account_id: AccountId,
    /// Originating payment intent, kept for traceability.
    pub intent_id: IntentId,
    /// Signed amount in the smallest currency unit (CFA francs).
    pub delta_cfa: i64,
    pub desc: String,
    pub created_at: DateTime<Utc>,
}

/// A not-yet-persisted ledger movement. Transitions emit a batch of postings
/// that must sum to zero; the store re-validates before committing.
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    pub account_id: AccountId,
    pub delta_cfa: i64,
    pub desc: String,
}

impl Posting {
    pub fn new(account_id: AccountId, delta_cfa: i64, desc: &str) -> Self {
        Self {
            account_id,
            delta_cfa,
            desc: desc.to_string(),
        }
    }
}

/// Sum of deltas across a posting batch. A legal batch balances to zero.
pub fn batch_sum(postings: &[Posting]) -> i64 {
    postings.iter().map(|p| p.delta_cfa).sum()
}
