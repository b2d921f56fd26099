//! Application layer: the payment intent state machine, the account
//! resolver, and the idempotency gate that wraps intent creation.

pub mod engine;
pub mod gate;
pub mod resolver;
