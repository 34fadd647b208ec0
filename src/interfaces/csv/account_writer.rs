use crate::domain::account::AccountBalance;
use crate::error::Result;
use std::io::Write;

/// Writes account balances as CSV (`user_id,wallet_type,account_type,cents`).
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_accounts(
        &mut self,
        accounts: impl IntoIterator<Item = AccountBalance>,
    ) -> Result<()> {
        for account in accounts {
            self.writer.serialize(account)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
