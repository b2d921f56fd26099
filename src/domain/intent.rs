use crate::domain::directory::{ListingId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentId(pub u64);

impl std::fmt::Display for IntentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payment intent lifecycle. The only legal transitions are:
/// `RequiresConfirmation -> Confirmed -> Captured`,
/// `Confirmed -> Refunded`, and `RequiresConfirmation -> Canceled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentStatus {
    RequiresConfirmation,
    Confirmed,
    Captured,
    Refunded,
    Canceled,
}

impl IntentStatus {
    pub fn can_transition_to(&self, next: IntentStatus) -> bool {
        use IntentStatus::*;
        matches!(
            (self, next),
            (RequiresConfirmation, Confirmed)
                | (RequiresConfirmation, Canceled)
                | (Confirmed, Captured)
                | (Confirmed, Refunded)
        )
    }
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IntentStatus::RequiresConfirmation => "REQUIRES_CONFIRMATION",
            IntentStatus::Confirmed => "CONFIRMED",
            IntentStatus::Captured => "CAPTURED",
            IntentStatus::Refunded => "REFUNDED",
            IntentStatus::Canceled => "CANCELED",
        };
        f.write_str(name)
    }
}

/// A requested payment. Created once, never deleted; mutated only by the
/// state machine's transition functions, each a single atomic commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: IntentId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub listing_id: ListingId,
    /// Full listing price, frozen at creation.
    pub amount_cfa: i64,
    /// Platform commission, computed at creation and never recomputed.
    pub fee_cfa: i64,
    pub status: IntentStatus,
    pub created_at: DateTime<Utc>,
}

impl PaymentIntent {
    pub fn seller_amount_cfa(&self) -> i64 {
        self.amount_cfa - self.fee_cfa
    }
}

/// Fields the state machine supplies when asking the store to create an
/// intent; id and timestamp are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIntent {
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub listing_id: ListingId,
    pub amount_cfa: i64,
    pub fee_cfa: i64,
}
