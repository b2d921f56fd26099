#![cfg(feature = "storage-rocksdb")]

use cauris::application::engine::{FeePolicy, PaymentEngine};
use cauris::domain::account::AccountType;
use cauris::domain::directory::{KycStatus, Listing, ListingId, UserId, UserRecord};
use cauris::domain::intent::IntentStatus;
use cauris::domain::ports::LedgerStore;
use cauris::infrastructure::directory::{InMemoryListings, InMemoryUsers};
use cauris::infrastructure::rocksdb::RocksDbStore;
use tempfile::tempdir;

const BUYER: UserId = UserId(1);
const SELLER: UserId = UserId(2);
const LISTING: ListingId = ListingId(10);

async fn engine_on(store: RocksDbStore) -> PaymentEngine {
    let listings = InMemoryListings::new();
    listings
        .insert(Listing {
            id: LISTING,
            seller_id: SELLER,
            price_cfa: 10_000,
        })
        .await;
    let users = InMemoryUsers::new();
    for id in [BUYER, SELLER] {
        users
            .insert(UserRecord {
                id,
                is_blocked: false,
                kyc_status: KycStatus::Approved,
            })
            .await;
    }
    PaymentEngine::new(
        Box::new(store),
        Box::new(listings),
        Box::new(users),
        FeePolicy::default(),
    )
}

#[tokio::test]
async fn lifecycle_survives_reopen() {
    let dir = tempdir().unwrap();

    let intent_id = {
        let store = RocksDbStore::open(dir.path()).unwrap();
        let engine = engine_on(store).await;
        let receipt = engine.create_intent(BUYER, LISTING).await.unwrap();
        engine.confirm_intent(receipt.id).await.unwrap();
        receipt.id
    };

    // Reopen the database and capture with a fresh engine.
    let store = RocksDbStore::open(dir.path()).unwrap();
    let engine = engine_on(store.clone()).await;

    let intent = store.intent(intent_id).await.unwrap().unwrap();
    assert_eq!(intent.status, IntentStatus::Confirmed);

    engine.capture_intent(intent_id).await.unwrap();

    let balances = engine.all_account_balances().await.unwrap();
    let of = |t: AccountType| {
        balances
            .iter()
            .find(|b| b.account_type == t)
            .map(|b| b.balance_cfa)
            .unwrap_or(0)
    };
    assert_eq!(of(AccountType::PlatformEscrow), 0);
    assert_eq!(of(AccountType::PlatformFees), 500);
    assert_eq!(of(AccountType::ExternalPsp), -10_000);
    assert_eq!(of(AccountType::User), 9_500);

    // The resolver found the persisted accounts instead of creating new
    // ones.
    assert_eq!(store.all_accounts().await.unwrap().len(), 4);
}
