use crate::domain::account::AccountBalance;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct BalanceRow {
    account: u64,
    r#type: String,
    user: Option<u64>,
    balance: i64,
}

/// Writes the final balance report as CSV: `account,type,user,balance`.
pub struct BalanceWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BalanceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_balances(&mut self, balances: Vec<AccountBalance>) -> Result<()> {
        for balance in balances {
            self.writer.serialize(BalanceRow {
                account: balance.id.0,
                r#type: balance.account_type.to_string(),
                user: balance.user_id.map(|u| u.0),
                balance: balance.balance_cfa,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
