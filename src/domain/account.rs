use crate::error::PaymentError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type WalletId = i32;
pub type AccountId = i32;

/// Non-negative account balance in minor currency units (cents).
///
/// Arithmetic is checked: a debit that would go below zero yields `None`
/// instead of a negative balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Balance(i64);

/// Strictly positive amount of cents moved by a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    pub fn new(cents: i64) -> Result<Self, PaymentError> {
        if cents > 0 {
            Ok(Self(cents))
        } else {
            Err(PaymentError::InvalidArgument(format!(
                "amount must be positive, got {cents} cents"
            )))
        }
    }

    pub fn cents(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Amount {
    type Error = PaymentError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Balance {
    pub const ZERO: Self = Self(0);

    pub fn new(cents: i64) -> Result<Self, PaymentError> {
        if cents >= 0 {
            Ok(Self(cents))
        } else {
            Err(PaymentError::InvalidArgument(format!(
                "balance cannot be negative, got {cents} cents"
            )))
        }
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the balance left after removing `amount`, or `None` when the
    /// funds are insufficient.
    pub fn debit(self, amount: Amount) -> Option<Self> {
        self.0.checked_sub(amount.0).filter(|c| *c >= 0).map(Self)
    }

    /// Returns the balance after adding `amount`, or `None` on overflow.
    pub fn credit(self, amount: Amount) -> Option<Self> {
        self.0.checked_add(amount.0).map(Self)
    }

    pub fn covers(&self, amount: Amount) -> bool {
        self.0 >= amount.0
    }
}

impl TryFrom<i64> for Balance {
    type Error = PaymentError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Balance> for i64 {
    fn from(balance: Balance) -> Self {
        balance.0
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO-4217 style currency code, normalised to upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    pub const USD: &'static str = "USD";

    pub fn new(code: &str) -> Self {
        Self(code.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::new(Self::USD)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role an account plays inside its wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountRole {
    /// Spendable funds of a customer.
    Default,
    /// Hold account that receives authorized funds until capture.
    Payment,
    /// Merchant account credited on capture.
    Incoming,
}

impl AccountRole {
    pub const ALL: [AccountRole; 3] = [
        AccountRole::Default,
        AccountRole::Payment,
        AccountRole::Incoming,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::Default => "DEFAULT",
            AccountRole::Payment => "PAYMENT",
            AccountRole::Incoming => "INCOMING",
        }
    }
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountRole {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEFAULT" => Ok(AccountRole::Default),
            "PAYMENT" => Ok(AccountRole::Payment),
            "INCOMING" => Ok(AccountRole::Incoming),
            other => Err(PaymentError::InvalidArgument(format!(
                "unknown account type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    Customer,
    Merchant,
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletKind::Customer => f.write_str("customer"),
            WalletKind::Merchant => f.write_str("merchant"),
        }
    }
}

/// A participant's container of accounts, keyed by an external user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub user_id: String,
    pub kind: WalletKind,
}

/// A balance-holding ledger line within a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub wallet_id: WalletId,
    pub role: AccountRole,
    pub balance: Balance,
}

/// Flattened account row used for reporting balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountBalance {
    pub user_id: String,
    pub wallet_type: WalletKind,
    pub account_type: AccountRole,
    pub cents: i64,
}
