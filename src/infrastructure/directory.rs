//! In-memory listing and user directories. Stand-ins for the external
//! catalogue and identity collaborators; the CLI loads them from CSV.

use crate::domain::directory::{Listing, ListingId, UserId, UserRecord};
use crate::domain::ports::{ListingProvider, UserProvider};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default, Clone)]
pub struct InMemoryListings {
    listings: Arc<RwLock<HashMap<ListingId, Listing>>>,
}

impl InMemoryListings {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, listing: Listing) {
        let mut listings = self.listings.write().await;
        listings.insert(listing.id, listing);
    }
}

#[async_trait]
impl ListingProvider for InMemoryListings {
    async fn listing(&self, id: ListingId) -> Result<Option<Listing>> {
        let listings = self.listings.read().await;
        Ok(listings.get(&id).cloned())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryUsers {
    users: Arc<RwLock<HashMap<UserId, UserRecord>>>,
}

impl InMemoryUsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user: UserRecord) {
        let mut users = self.users.write().await;
        users.insert(user.id, user);
    }
}

#[async_trait]
impl UserProvider for InMemoryUsers {
    async fn user(&self, id: UserId) -> Result<Option<UserRecord>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::directory::KycStatus;

    #[tokio::test]
    async fn listings_round_trip() {
        let listings = InMemoryListings::new();
        let listing = Listing {
            id: ListingId(1),
            seller_id: UserId(2),
            price_cfa: 10_000,
        };
        listings.insert(listing.clone()).await;

        assert_eq!(listings.listing(ListingId(1)).await.unwrap(), Some(listing));
        assert!(listings.listing(ListingId(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn users_round_trip() {
        let users = InMemoryUsers::new();
        let user = UserRecord {
            id: UserId(1),
            is_blocked: false,
            kyc_status: KycStatus::Approved,
        };
        users.insert(user.clone()).await;

        assert_eq!(users.user(UserId(1)).await.unwrap(), Some(user));
        assert!(users.user(UserId(9)).await.unwrap().is_none());
    }
}
