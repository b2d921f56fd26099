use crate::domain::account::{AccountId, AccountType};
use crate::domain::directory::UserId;
use crate::domain::ports::LedgerStore;
use crate::error::{PaymentError, Result};

/// Identifiers of the four accounts every transition posts against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlatformAccounts {
    pub escrow: AccountId,
    pub fees: AccountId,
    pub psp: AccountId,
    pub seller: AccountId,
}

/// Finds or lazily creates the platform singleton accounts and the
/// per-seller account. A `Conflict` from the store means a concurrent
/// caller created the account first; the resolver re-reads and uses theirs.
pub async fn ensure_accounts(
    store: &dyn LedgerStore,
    seller_id: UserId,
) -> Result<PlatformAccounts> {
    let escrow = ensure_singleton(store, AccountType::PlatformEscrow).await?;
    let fees = ensure_singleton(store, AccountType::PlatformFees).await?;
    let psp = ensure_singleton(store, AccountType::ExternalPsp).await?;
    let seller = ensure_user_account(store, seller_id).await?;
    Ok(PlatformAccounts {
        escrow,
        fees,
        psp,
        seller,
    })
}

async fn ensure_singleton(store: &dyn LedgerStore, account_type: AccountType) -> Result<AccountId> {
    if let Some(account) = store.find_account_by_type(account_type).await? {
        return Ok(account.id);
    }
    match store.create_account(account_type, None).await {
        Ok(account) => Ok(account.id),
        Err(PaymentError::Conflict(_)) => {
            // Lost the creation race; the winner's account must exist now.
            store
                .find_account_by_type(account_type)
                .await?
                .map(|a| a.id)
                .ok_or(PaymentError::NotFound("account"))
        }
        Err(e) => Err(e),
    }
}

async fn ensure_user_account(store: &dyn LedgerStore, user_id: UserId) -> Result<AccountId> {
    if let Some(account) = store.find_account_for_user(user_id).await? {
        return Ok(account.id);
    }
    match store.create_account(AccountType::User, Some(user_id)).await {
        Ok(account) => Ok(account.id),
        Err(PaymentError::Conflict(_)) => store
            .find_account_for_user(user_id)
            .await?
            .map(|a| a.id)
            .ok_or(PaymentError::NotFound("account")),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryLedgerStore;

    #[tokio::test]
    async fn creates_all_accounts_on_first_call() {
        let store = InMemoryLedgerStore::new();
        let accounts = ensure_accounts(&store, UserId(7)).await.unwrap();

        let all = store.all_accounts().await.unwrap();
        assert_eq!(all.len(), 4);
        assert_ne!(accounts.escrow, accounts.fees);
        assert_ne!(accounts.fees, accounts.psp);
        assert_ne!(accounts.psp, accounts.seller);
    }

    #[tokio::test]
    async fn second_call_reuses_existing_accounts() {
        let store = InMemoryLedgerStore::new();
        let first = ensure_accounts(&store, UserId(7)).await.unwrap();
        let second = ensure_accounts(&store, UserId(7)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.all_accounts().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn distinct_sellers_get_distinct_accounts() {
        let store = InMemoryLedgerStore::new();
        let a = ensure_accounts(&store, UserId(1)).await.unwrap();
        let b = ensure_accounts(&store, UserId(2)).await.unwrap();

        assert_eq!(a.escrow, b.escrow);
        assert_eq!(a.fees, b.fees);
        assert_eq!(a.psp, b.psp);
        assert_ne!(a.seller, b.seller);
        assert_eq!(store.all_accounts().await.unwrap().len(), 5);
    }
}
