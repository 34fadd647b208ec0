use super::account::{Account, AccountId, AccountRole, Amount, Wallet, WalletId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Payment identifier correlating the authorize and capture legs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(String);

impl Pid {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Pid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Pid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable audit row for one balance movement (a leg).
///
/// Two rows share a pid: the authorize leg and the capture leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub pid: Pid,
    pub src_user_id: String,
    pub dst_user_id: String,
    pub src_account_wallet_id: WalletId,
    pub dst_account_wallet_id: WalletId,
    pub src_account_id: AccountId,
    pub dst_account_id: AccountId,
    pub src_account_type: AccountRole,
    pub dst_account_type: AccountRole,
    pub final_dst_merchant_wallet_id: WalletId,
    pub amount: Amount,
}

/// A leg waiting to be inserted; the store assigns the row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub pid: Pid,
    pub src_user_id: String,
    pub dst_user_id: String,
    pub src_account_wallet_id: WalletId,
    pub dst_account_wallet_id: WalletId,
    pub src_account_id: AccountId,
    pub dst_account_id: AccountId,
    pub src_account_type: AccountRole,
    pub dst_account_type: AccountRole,
    pub final_dst_merchant_wallet_id: WalletId,
    pub amount: Amount,
}

/// Endpoint of a leg: the wallet and the account inside it.
pub struct LegEnd<'a> {
    pub wallet: &'a Wallet,
    pub account: &'a Account,
}

impl NewTransaction {
    pub fn leg(
        pid: Pid,
        src: LegEnd<'_>,
        dst: LegEnd<'_>,
        final_merchant: &Wallet,
        amount: Amount,
    ) -> Self {
        Self {
            pid,
            src_user_id: src.wallet.user_id.clone(),
            dst_user_id: dst.wallet.user_id.clone(),
            src_account_wallet_id: src.wallet.id,
            dst_account_wallet_id: dst.wallet.id,
            src_account_id: src.account.id,
            dst_account_id: dst.account.id,
            src_account_type: src.account.role,
            dst_account_type: dst.account.role,
            final_dst_merchant_wallet_id: final_merchant.id,
            amount,
        }
    }

    pub fn with_id(self, id: i64) -> TransactionRecord {
        TransactionRecord {
            id,
            pid: self.pid,
            src_user_id: self.src_user_id,
            dst_user_id: self.dst_user_id,
            src_account_wallet_id: self.src_account_wallet_id,
            dst_account_wallet_id: self.dst_account_wallet_id,
            src_account_id: self.src_account_id,
            dst_account_id: self.dst_account_id,
            src_account_type: self.src_account_type,
            dst_account_type: self.dst_account_type,
            final_dst_merchant_wallet_id: self.final_dst_merchant_wallet_id,
            amount: self.amount,
        }
    }
}
