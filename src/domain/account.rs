use crate::domain::directory::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque account identifier, assigned by the store on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    /// Platform-held funds between buyer confirmation and seller payout.
    PlatformEscrow,
    /// Accumulated platform commission.
    PlatformFees,
    /// Placeholder mirror of the external payment service provider.
    ExternalPsp,
    /// Per-seller payout account, owned by exactly one user.
    User,
}

impl AccountType {
    /// Singleton types exist at most once system-wide; `User` accounts are
    /// unique per owner instead.
    pub fn is_singleton(&self) -> bool {
        !matches!(self, AccountType::User)
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AccountType::PlatformEscrow => "PLATFORM_ESCROW",
            AccountType::PlatformFees => "PLATFORM_FEES",
            AccountType::ExternalPsp => "EXTERNAL_PSP",
            AccountType::User => "USER",
        };
        f.write_str(name)
    }
}

/// A ledger account. Created lazily on first reference, never mutated or
/// deleted afterwards. Its balance is always recomputed from the entry log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub account_type: AccountType,
    /// Present only when `account_type` is `User`.
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// Balance snapshot produced by the read path; `balance_cfa` is the sum of
/// all entry deltas for the account at query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub id: AccountId,
    pub account_type: AccountType,
    pub user_id: Option<UserId>,
    pub balance_cfa: i64,
}
