use super::account::{
    Account, AccountBalance, AccountId, AccountRole, Balance, Wallet, WalletId, WalletKind,
};
use super::payment::Payment;
use super::transaction::{NewTransaction, Pid, TransactionRecord};
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Durable owner of wallets, accounts, legs and payments.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Opens one ACID unit of work. Dropping it without `commit` discards
    /// every write made through it.
    async fn begin<'a>(&'a self) -> Result<Box<dyn LedgerTx + 'a>>;

    /// Committed balance of every account, in account creation order.
    async fn balances(&self) -> Result<Vec<AccountBalance>>;
}

/// Reads and writes scoped to a single transaction.
///
/// Lookup misses are `NotFound`; any other fault is `Internal`.
#[async_trait]
pub trait LedgerTx: Send {
    async fn wallet_by_user(&mut self, user_id: &str) -> Result<Wallet>;
    async fn wallet_by_id(&mut self, wallet_id: WalletId) -> Result<Wallet>;
    async fn account(&mut self, wallet_id: WalletId, role: AccountRole) -> Result<Account>;
    async fn set_balance(&mut self, account_id: AccountId, balance: Balance) -> Result<()>;

    /// Most recently inserted leg for `pid`.
    async fn latest_leg(&mut self, pid: &Pid) -> Result<TransactionRecord>;
    /// Every leg for `pid`, oldest first. Empty when unknown.
    async fn legs(&mut self, pid: &Pid) -> Result<Vec<TransactionRecord>>;
    async fn insert_leg(&mut self, leg: NewTransaction) -> Result<TransactionRecord>;

    async fn payment(&mut self, pid: &Pid) -> Result<Payment>;
    async fn insert_payment(&mut self, payment: Payment) -> Result<()>;
    async fn update_payment(&mut self, payment: Payment) -> Result<()>;

    async fn insert_wallet(&mut self, user_id: &str, kind: WalletKind) -> Result<Wallet>;
    async fn insert_account(
        &mut self,
        wallet_id: WalletId,
        role: AccountRole,
        balance: Balance,
    ) -> Result<Account>;

    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Broker acknowledgement for one published message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Long-lived handle to the message broker.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<Delivery>;
}

pub type LedgerStoreRef = Arc<dyn LedgerStore>;
pub type EventPublisherRef = Arc<dyn EventPublisher>;
