use crate::domain::directory::{ListingId, UserId};
use crate::domain::intent::IntentId;
use crate::error::{PaymentError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandOp {
    Create,
    Confirm,
    Capture,
    Refund,
    Cancel,
}

/// One row of the command CSV: `op, user, listing, intent, key`.
/// `create` takes `user` (the buyer), `listing`, and a mandatory `key`;
/// `cancel` takes `intent` and `user` (the caller); the rest take `intent`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct PaymentCommand {
    pub op: CommandOp,
    pub user: Option<UserId>,
    pub listing: Option<ListingId>,
    pub intent: Option<IntentId>,
    pub key: Option<String>,
}

/// Reads payment commands from a CSV source, streaming.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn commands(self) -> impl Iterator<Item = Result<PaymentCommand>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }
}
