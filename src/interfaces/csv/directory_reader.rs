use crate::domain::directory::{KycStatus, Listing, ListingId, UserId, UserRecord};
use crate::error::Result;
use crate::infrastructure::directory::{InMemoryListings, InMemoryUsers};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct ListingRow {
    id: u64,
    seller: u64,
    price: i64,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    id: u64,
    blocked: bool,
    kyc: KycStatus,
}

/// Loads a listing catalogue from CSV (`id, seller, price`).
pub async fn load_listings<R: Read>(source: R) -> Result<InMemoryListings> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);
    let listings = InMemoryListings::new();
    for row in reader.deserialize() {
        let row: ListingRow = row?;
        listings
            .insert(Listing {
                id: ListingId(row.id),
                seller_id: UserId(row.seller),
                price_cfa: row.price,
            })
            .await;
    }
    Ok(listings)
}

/// Loads a user directory from CSV (`id, blocked, kyc`).
pub async fn load_users<R: Read>(source: R) -> Result<InMemoryUsers> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);
    let users = InMemoryUsers::new();
    for row in reader.deserialize() {
        let row: UserRow = row?;
        users
            .insert(UserRecord {
                id: UserId(row.id),
                is_blocked: row.blocked,
                kyc_status: row.kyc,
            })
            .await;
    }
    Ok(users)
}
