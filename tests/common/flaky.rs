use async_trait::async_trait;
use money_movement::domain::account::{
    Account, AccountBalance, AccountId, AccountRole, Balance, Wallet, WalletId, WalletKind,
};
use money_movement::domain::payment::Payment;
use money_movement::domain::ports::{LedgerStore, LedgerTx};
use money_movement::domain::transaction::{NewTransaction, Pid, TransactionRecord};
use money_movement::error::{PaymentError, Result};
use std::sync::atomic::{AtomicBool, Ordering};

/// Wraps a ledger store and injects faults on demand.
pub struct FlakyStore<S> {
    inner: S,
    pub fail_insert_leg: AtomicBool,
    pub fail_update_payment: AtomicBool,
    pub fail_rollback: AtomicBool,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_insert_leg: AtomicBool::new(false),
            fail_update_payment: AtomicBool::new(false),
            fail_rollback: AtomicBool::new(false),
        }
    }
}

pub struct FlakyTx<'a> {
    inner: Box<dyn LedgerTx + 'a>,
    fail_insert_leg: bool,
    fail_update_payment: bool,
    fail_rollback: bool,
}

#[async_trait]
impl<S: LedgerStore> LedgerStore for FlakyStore<S> {
    async fn begin<'a>(&'a self) -> Result<Box<dyn LedgerTx + 'a>> {
        let inner = self.inner.begin().await?;
        Ok(Box::new(FlakyTx {
            inner,
            fail_insert_leg: self.fail_insert_leg.load(Ordering::SeqCst),
            fail_update_payment: self.fail_update_payment.load(Ordering::SeqCst),
            fail_rollback: self.fail_rollback.load(Ordering::SeqCst),
        }))
    }

    async fn balances(&self) -> Result<Vec<AccountBalance>> {
        self.inner.balances().await
    }
}

#[async_trait]
impl<'a> LedgerTx for FlakyTx<'a> {
    async fn wallet_by_user(&mut self, user_id: &str) -> Result<Wallet> {
        self.inner.wallet_by_user(user_id).await
    }

    async fn wallet_by_id(&mut self, wallet_id: WalletId) -> Result<Wallet> {
        self.inner.wallet_by_id(wallet_id).await
    }

    async fn account(&mut self, wallet_id: WalletId, role: AccountRole) -> Result<Account> {
        self.inner.account(wallet_id, role).await
    }

    async fn set_balance(&mut self, account_id: AccountId, balance: Balance) -> Result<()> {
        self.inner.set_balance(account_id, balance).await
    }

    async fn latest_leg(&mut self, pid: &Pid) -> Result<TransactionRecord> {
        self.inner.latest_leg(pid).await
    }

    async fn legs(&mut self, pid: &Pid) -> Result<Vec<TransactionRecord>> {
        self.inner.legs(pid).await
    }

    async fn insert_leg(&mut self, leg: NewTransaction) -> Result<TransactionRecord> {
        if self.fail_insert_leg {
            return Err(PaymentError::Internal("failed to insert transaction: disk full".into()));
        }
        self.inner.insert_leg(leg).await
    }

    async fn payment(&mut self, pid: &Pid) -> Result<Payment> {
        self.inner.payment(pid).await
    }

    async fn insert_payment(&mut self, payment: Payment) -> Result<()> {
        self.inner.insert_payment(payment).await
    }

    async fn update_payment(&mut self, payment: Payment) -> Result<()> {
        if self.fail_update_payment {
            return Err(PaymentError::Internal("failed to update payment: disk full".into()));
        }
        self.inner.update_payment(payment).await
    }

    async fn insert_wallet(&mut self, user_id: &str, kind: WalletKind) -> Result<Wallet> {
        self.inner.insert_wallet(user_id, kind).await
    }

    async fn insert_account(
        &mut self,
        wallet_id: WalletId,
        role: AccountRole,
        balance: Balance,
    ) -> Result<Account> {
        self.inner.insert_account(wallet_id, role, balance).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let fail = self.fail_rollback;
        self.inner.rollback().await?;
        if fail {
            return Err(PaymentError::Internal("connection reset".into()));
        }
        Ok(())
    }
}
