use crate::application::resolver::ensure_accounts;
use crate::domain::account::AccountBalance;
use crate::domain::directory::{KycStatus, ListingId, Principal, UserId, UserRecord};
use crate::domain::intent::{IntentId, IntentStatus, NewIntent, PaymentIntent};
use crate::domain::ledger::{LedgerEntry, Posting};
use crate::domain::ports::{LedgerStoreBox, ListingProviderBox, UserProviderBox};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Default cap on ledger listings, matching the audit read path.
pub const DEFAULT_LEDGER_LIMIT: usize = 200;

/// Platform commission rate, injected into the engine rather than hardcoded
/// so tests can vary it. Fees are floored to whole CFA francs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeePolicy {
    rate: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeSplit {
    pub fee_cfa: i64,
    pub seller_cfa: i64,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self { rate: dec!(0.05) }
    }
}

impl FeePolicy {
    pub fn new(rate: Decimal) -> Result<Self> {
        if rate < Decimal::ZERO || rate >= Decimal::ONE {
            return Err(PaymentError::Validation(format!(
                "fee rate must be in [0, 1), got {rate}"
            )));
        }
        Ok(Self { rate })
    }

    pub fn split(&self, amount_cfa: i64) -> FeeSplit {
        let fee = (Decimal::from(amount_cfa) * self.rate).floor();
        // Rate is within [0, 1) and the amount fits in i64, so the floored
        // fee does too.
        let fee_cfa = fee.to_i64().unwrap_or(0);
        FeeSplit {
            fee_cfa,
            seller_cfa: amount_cfa - fee_cfa,
        }
    }
}

/// Response to intent creation; this is the body the idempotency gate
/// stores and replays verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentReceipt {
    pub id: IntentId,
    pub amount_cfa: i64,
    pub fee_cfa: i64,
    pub seller_amount_cfa: i64,
    pub status: IntentStatus,
}

/// Response to confirm/capture/refund/cancel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionReceipt {
    pub id: IntentId,
    pub status: IntentStatus,
}

/// The payment intent state machine. Owns the intent lifecycle and emits a
/// balanced posting batch for every transition, committed atomically through
/// the ledger store. Knows nothing about idempotency keys; the gate owns
/// that concern.
pub struct PaymentEngine {
    store: LedgerStoreBox,
    listings: ListingProviderBox,
    users: UserProviderBox,
    fees: FeePolicy,
}

impl PaymentEngine {
    pub fn new(
        store: LedgerStoreBox,
        listings: ListingProviderBox,
        users: UserProviderBox,
        fees: FeePolicy,
    ) -> Self {
        Self {
            store,
            listings,
            users,
            fees,
        }
    }

    /// Creates an intent for the listing's full price. No ledger entries are
    /// written until confirmation.
    pub async fn create_intent(
        &self,
        buyer_id: UserId,
        listing_id: ListingId,
    ) -> Result<IntentReceipt> {
        let listing = self
            .listings
            .listing(listing_id)
            .await?
            .ok_or(PaymentError::NotFound("listing"))?;
        if listing.price_cfa <= 0 {
            return Err(PaymentError::Validation(format!(
                "listing {listing_id} has non-positive price {}",
                listing.price_cfa
            )));
        }

        let split = self.fees.split(listing.price_cfa);
        let intent = self
            .store
            .create_intent(NewIntent {
                buyer_id,
                seller_id: listing.seller_id,
                listing_id,
                amount_cfa: listing.price_cfa,
                fee_cfa: split.fee_cfa,
            })
            .await?;

        info!(intent = %intent.id, amount_cfa = intent.amount_cfa, "intent created");
        Ok(IntentReceipt {
            id: intent.id,
            amount_cfa: intent.amount_cfa,
            fee_cfa: intent.fee_cfa,
            seller_amount_cfa: split.seller_cfa,
            status: intent.status,
        })
    }

    /// Buyer confirmation: moves the full amount from the external PSP
    /// placeholder into escrow.
    pub async fn confirm_intent(&self, intent_id: IntentId) -> Result<TransitionReceipt> {
        let intent = self.load_intent(intent_id).await?;
        self.require_status(&intent, IntentStatus::RequiresConfirmation, "confirm")?;
        self.require_active_seller(intent.seller_id).await?;
        self.require_active_buyer(intent.buyer_id).await?;

        let accounts = ensure_accounts(self.store.as_ref(), intent.seller_id).await?;
        let postings = vec![
            Posting::new(accounts.psp, -intent.amount_cfa, "confirm: debit external"),
            Posting::new(accounts.escrow, intent.amount_cfa, "confirm: credit escrow"),
        ];
        let intent = self
            .store
            .commit(
                intent.id,
                IntentStatus::RequiresConfirmation,
                IntentStatus::Confirmed,
                postings,
            )
            .await?;

        info!(intent = %intent.id, "intent confirmed");
        Ok(TransitionReceipt {
            id: intent.id,
            status: intent.status,
        })
    }

    /// Releases escrowed funds: the seller share to the seller account and
    /// the commission to the platform fees account.
    pub async fn capture_intent(&self, intent_id: IntentId) -> Result<TransitionReceipt> {
        let intent = self.load_intent(intent_id).await?;
        self.require_status(&intent, IntentStatus::Confirmed, "capture")?;
        self.require_active_seller(intent.seller_id).await?;

        let accounts = ensure_accounts(self.store.as_ref(), intent.seller_id).await?;
        let seller_amount = intent.seller_amount_cfa();
        let postings = vec![
            Posting::new(
                accounts.escrow,
                -seller_amount,
                "capture: debit escrow to seller",
            ),
            Posting::new(accounts.seller, seller_amount, "capture: credit seller"),
            Posting::new(
                accounts.escrow,
                -intent.fee_cfa,
                "capture: debit escrow to fees",
            ),
            Posting::new(
                accounts.fees,
                intent.fee_cfa,
                "capture: credit platform fees",
            ),
        ];
        let intent = self
            .store
            .commit(
                intent.id,
                IntentStatus::Confirmed,
                IntentStatus::Captured,
                postings,
            )
            .await?;

        info!(intent = %intent.id, seller_amount_cfa = seller_amount, "intent captured");
        Ok(TransitionReceipt {
            id: intent.id,
            status: intent.status,
        })
    }

    /// Returns escrowed funds to the external PSP placeholder.
    pub async fn refund_intent(&self, intent_id: IntentId) -> Result<TransitionReceipt> {
        let intent = self.load_intent(intent_id).await?;
        self.require_status(&intent, IntentStatus::Confirmed, "refund")?;

        let accounts = ensure_accounts(self.store.as_ref(), intent.seller_id).await?;
        let postings = vec![
            Posting::new(accounts.escrow, -intent.amount_cfa, "refund: debit escrow"),
            Posting::new(accounts.psp, intent.amount_cfa, "refund: credit user"),
        ];
        let intent = self
            .store
            .commit(
                intent.id,
                IntentStatus::Confirmed,
                IntentStatus::Refunded,
                postings,
            )
            .await?;

        info!(intent = %intent.id, "intent refunded");
        Ok(TransitionReceipt {
            id: intent.id,
            status: intent.status,
        })
    }

    /// Cancels an unconfirmed intent. Only the buyer, the seller, or an
    /// admin may cancel. No money has moved yet, so no postings.
    pub async fn cancel_intent(
        &self,
        intent_id: IntentId,
        caller: UserId,
        is_admin: bool,
    ) -> Result<TransitionReceipt> {
        let intent = self.load_intent(intent_id).await?;
        if !is_admin && caller != intent.buyer_id && caller != intent.seller_id {
            return Err(PaymentError::Forbidden(format!(
                "user {caller} is not a party to intent {intent_id}"
            )));
        }
        self.require_status(&intent, IntentStatus::RequiresConfirmation, "cancel")?;

        let intent = self
            .store
            .commit(
                intent.id,
                IntentStatus::RequiresConfirmation,
                IntentStatus::Canceled,
                Vec::new(),
            )
            .await?;

        info!(intent = %intent.id, "intent canceled");
        Ok(TransitionReceipt {
            id: intent.id,
            status: intent.status,
        })
    }

    /// Intents visible to the caller, newest first. Admins see everything;
    /// everyone else only intents where they are buyer or seller.
    pub async fn list_intents(&self, principal: &Principal) -> Result<Vec<PaymentIntent>> {
        let intents = self.store.list_intents().await?;
        if principal.is_admin() {
            return Ok(intents);
        }
        Ok(intents
            .into_iter()
            .filter(|i| i.buyer_id == principal.user_id || i.seller_id == principal.user_id)
            .collect())
    }

    pub async fn get_intent(&self, id: IntentId, principal: &Principal) -> Result<PaymentIntent> {
        let intent = self.load_intent(id).await?;
        if !principal.is_admin()
            && intent.buyer_id != principal.user_id
            && intent.seller_id != principal.user_id
        {
            return Err(PaymentError::Forbidden(format!(
                "user {} is not a party to intent {id}",
                principal.user_id
            )));
        }
        Ok(intent)
    }

    /// Every account with its balance recomputed from the entry log.
    pub async fn all_account_balances(&self) -> Result<Vec<AccountBalance>> {
        let accounts = self.store.all_accounts().await?;
        let mut balances = Vec::with_capacity(accounts.len());
        for account in accounts {
            let balance_cfa = self.store.sum_deltas(account.id).await?;
            balances.push(AccountBalance {
                id: account.id,
                account_type: account.account_type,
                user_id: account.user_id,
                balance_cfa,
            });
        }
        Ok(balances)
    }

    pub async fn list_ledger(&self, limit: Option<usize>) -> Result<Vec<LedgerEntry>> {
        self.store
            .list_entries(limit.unwrap_or(DEFAULT_LEDGER_LIMIT))
            .await
    }

    /// Intents where the user is the buyer, newest first.
    pub async fn user_orders(&self, user_id: UserId) -> Result<Vec<PaymentIntent>> {
        let intents = self.store.list_intents().await?;
        Ok(intents.into_iter().filter(|i| i.buyer_id == user_id).collect())
    }

    /// Intents where the user is the seller, newest first.
    pub async fn user_sales(&self, user_id: UserId) -> Result<Vec<PaymentIntent>> {
        let intents = self.store.list_intents().await?;
        Ok(intents
            .into_iter()
            .filter(|i| i.seller_id == user_id)
            .collect())
    }

    async fn load_intent(&self, id: IntentId) -> Result<PaymentIntent> {
        self.store
            .intent(id)
            .await?
            .ok_or(PaymentError::NotFound("intent"))
    }

    fn require_status(
        &self,
        intent: &PaymentIntent,
        expected: IntentStatus,
        action: &str,
    ) -> Result<()> {
        if intent.status != expected {
            return Err(PaymentError::InvalidState(format!(
                "cannot {action} intent {} in status {}",
                intent.id, intent.status
            )));
        }
        Ok(())
    }

    async fn require_active_seller(&self, seller_id: UserId) -> Result<()> {
        let seller = self.load_user(seller_id).await?;
        if seller.is_blocked {
            return Err(PaymentError::Forbidden(format!(
                "seller {seller_id} is blocked"
            )));
        }
        if seller.kyc_status != KycStatus::Approved {
            return Err(PaymentError::Forbidden(format!(
                "seller {seller_id} KYC not approved"
            )));
        }
        Ok(())
    }

    async fn require_active_buyer(&self, buyer_id: UserId) -> Result<()> {
        let buyer = self.load_user(buyer_id).await?;
        if buyer.is_blocked {
            return Err(PaymentError::Forbidden(format!(
                "buyer {buyer_id} is blocked"
            )));
        }
        Ok(())
    }

    async fn load_user(&self, id: UserId) -> Result<UserRecord> {
        self.users
            .user(id)
            .await?
            .ok_or(PaymentError::NotFound("user"))
    }
}
