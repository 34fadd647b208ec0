use crate::application::service::WalletProvision;
use crate::domain::account::{AccountRole, Balance, WalletKind};
use crate::error::Result;
use serde::Deserialize;
use std::io::Read;

/// One wallet seed row: opening balances per account role, in cents.
///
/// An empty balance column means the wallet has no account of that role.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct WalletRecord {
    pub user_id: String,
    pub wallet_type: WalletKind,
    pub default: Option<Balance>,
    pub payment: Option<Balance>,
    pub incoming: Option<Balance>,
}

impl From<WalletRecord> for WalletProvision {
    fn from(record: WalletRecord) -> Self {
        let accounts = [
            (AccountRole::Default, record.default),
            (AccountRole::Payment, record.payment),
            (AccountRole::Incoming, record.incoming),
        ]
        .into_iter()
        .filter_map(|(role, balance)| balance.map(|b| (role, b)))
        .collect();

        WalletProvision {
            user_id: record.user_id,
            kind: record.wallet_type,
            accounts,
        }
    }
}

/// Reads wallet seeds from a CSV source.
pub struct WalletReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> WalletReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn wallets(self) -> impl Iterator<Item = Result<WalletProvision>> {
        self.reader.into_deserialize().map(|result| {
            let record: WalletRecord = result?;
            Ok(record.into())
        })
    }
}
