//! Domain entities, value types, and the ports the application layer
//! depends on. Nothing in here touches a concrete storage backend.

pub mod account;
pub mod directory;
pub mod idempotency;
pub mod intent;
pub mod ledger;
pub mod ports;
