use crate::domain::account::{
    Account, AccountBalance, AccountId, AccountRole, Balance, Wallet, WalletId, WalletKind,
};
use crate::domain::payment::Payment;
use crate::domain::ports::{LedgerStore, LedgerTx};
use crate::domain::transaction::{NewTransaction, Pid, TransactionRecord};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct LedgerState {
    wallets: BTreeMap<WalletId, Wallet>,
    accounts: BTreeMap<AccountId, Account>,
    transactions: Vec<TransactionRecord>,
    payments: HashMap<Pid, Payment>,
    wallets_by_user: HashMap<String, WalletId>,
    accounts_by_role: HashMap<(WalletId, AccountRole), AccountId>,
    legs_by_pid: HashMap<Pid, Vec<usize>>,
}

impl LedgerState {
    fn next_wallet_id(&self) -> WalletId {
        self.wallets.keys().next_back().map_or(1, |id| id + 1)
    }

    fn next_account_id(&self) -> AccountId {
        self.accounts.keys().next_back().map_or(1, |id| id + 1)
    }

    fn push_leg(&mut self, record: TransactionRecord) {
        self.legs_by_pid
            .entry(record.pid.clone())
            .or_default()
            .push(self.transactions.len());
        self.transactions.push(record);
    }

    fn pop_leg(&mut self) {
        let Some(record) = self.transactions.pop() else {
            return;
        };
        if let Some(positions) = self.legs_by_pid.get_mut(&record.pid) {
            positions.pop();
            if positions.is_empty() {
                self.legs_by_pid.remove(&record.pid);
            }
        }
    }

    fn remove_wallet(&mut self, id: WalletId) {
        if let Some(wallet) = self.wallets.remove(&id) {
            self.wallets_by_user.remove(&wallet.user_id);
        }
    }

    fn remove_account(&mut self, id: AccountId) {
        if let Some(account) = self.accounts.remove(&id) {
            self.accounts_by_role.remove(&(account.wallet_id, account.role));
        }
    }

    fn leg_positions(&self, pid: &Pid) -> &[usize] {
        self.legs_by_pid
            .get(pid)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// A thread-safe in-memory ledger.
///
/// Transactions are serializable: `begin` takes the store lock for the whole
/// unit of work. Writes apply in place and are journaled, so rollback or
/// dropping the transaction replays the journal backwards. Ideal for tests
/// or runs where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin<'a>(&'a self) -> Result<Box<dyn LedgerTx + 'a>> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(InMemoryLedgerTx {
            guard,
            undo: Vec::new(),
        }))
    }

    async fn balances(&self) -> Result<Vec<AccountBalance>> {
        let state = self.state.lock().await;
        let mut rows = Vec::with_capacity(state.accounts.len());
        for account in state.accounts.values() {
            let wallet = state.wallets.get(&account.wallet_id).ok_or_else(|| {
                PaymentError::Internal(format!(
                    "account {} references missing wallet {}",
                    account.id, account.wallet_id
                ))
            })?;
            rows.push(AccountBalance {
                user_id: wallet.user_id.clone(),
                wallet_type: wallet.kind,
                account_type: account.role,
                cents: account.balance.cents(),
            });
        }
        Ok(rows)
    }
}

/// Ledger state held under the store lock, plus the journal that undoes
/// this transaction's writes if it does not commit.
pub struct InMemoryLedgerTx {
    guard: OwnedMutexGuard<LedgerState>,
    undo: Vec<Undo>,
}

/// Inverse of one write, replayed newest first on rollback.
enum Undo {
    Balance(AccountId, Balance),
    Leg,
    InsertedPayment(Pid),
    UpdatedPayment(Payment),
    Wallet(WalletId),
    Account(AccountId),
}

impl InMemoryLedgerTx {
    fn revert(&mut self) {
        while let Some(step) = self.undo.pop() {
            let state = &mut *self.guard;
            match step {
                Undo::Balance(id, balance) => {
                    if let Some(account) = state.accounts.get_mut(&id) {
                        account.balance = balance;
                    }
                }
                Undo::Leg => state.pop_leg(),
                Undo::InsertedPayment(pid) => {
                    state.payments.remove(&pid);
                }
                Undo::UpdatedPayment(previous) => {
                    state.payments.insert(previous.pid.clone(), previous);
                }
                Undo::Wallet(id) => state.remove_wallet(id),
                Undo::Account(id) => state.remove_account(id),
            }
        }
    }
}

impl Drop for InMemoryLedgerTx {
    fn drop(&mut self) {
        if !self.undo.is_empty() {
            self.revert();
        }
    }
}

#[async_trait]
impl LedgerTx for InMemoryLedgerTx {
    async fn wallet_by_user(&mut self, user_id: &str) -> Result<Wallet> {
        let state = &*self.guard;
        state
            .wallets_by_user
            .get(user_id)
            .and_then(|id| state.wallets.get(id))
            .cloned()
            .ok_or_else(|| PaymentError::NotFound(format!("wallet not found for user: {user_id}")))
    }

    async fn wallet_by_id(&mut self, wallet_id: WalletId) -> Result<Wallet> {
        self.guard
            .wallets
            .get(&wallet_id)
            .cloned()
            .ok_or_else(|| PaymentError::NotFound(format!("wallet not found for ID: {wallet_id}")))
    }

    async fn account(&mut self, wallet_id: WalletId, role: AccountRole) -> Result<Account> {
        let state = &*self.guard;
        state
            .accounts_by_role
            .get(&(wallet_id, role))
            .and_then(|id| state.accounts.get(id))
            .cloned()
            .ok_or_else(|| {
                PaymentError::NotFound(format!(
                    "account not found for wallet ID: {wallet_id} and type: {role}"
                ))
            })
    }

    async fn set_balance(&mut self, account_id: AccountId, balance: Balance) -> Result<()> {
        let account = self.guard.accounts.get_mut(&account_id).ok_or_else(|| {
            PaymentError::Internal(format!("failed to update account {account_id}: no such row"))
        })?;
        let previous = std::mem::replace(&mut account.balance, balance);
        self.undo.push(Undo::Balance(account_id, previous));
        Ok(())
    }

    async fn latest_leg(&mut self, pid: &Pid) -> Result<TransactionRecord> {
        let state = &*self.guard;
        state
            .leg_positions(pid)
            .last()
            .and_then(|&at| state.transactions.get(at))
            .cloned()
            .ok_or_else(|| PaymentError::NotFound(format!("transaction not found for pid: {pid}")))
    }

    async fn legs(&mut self, pid: &Pid) -> Result<Vec<TransactionRecord>> {
        let state = &*self.guard;
        Ok(state
            .leg_positions(pid)
            .iter()
            .filter_map(|&at| state.transactions.get(at))
            .cloned()
            .collect())
    }

    async fn insert_leg(&mut self, leg: NewTransaction) -> Result<TransactionRecord> {
        let id = self.guard.transactions.len() as i64 + 1;
        let record = leg.with_id(id);
        self.guard.push_leg(record.clone());
        self.undo.push(Undo::Leg);
        Ok(record)
    }

    async fn payment(&mut self, pid: &Pid) -> Result<Payment> {
        self.guard
            .payments
            .get(pid)
            .cloned()
            .ok_or_else(|| PaymentError::NotFound(format!("payment not found for pid: {pid}")))
    }

    async fn insert_payment(&mut self, payment: Payment) -> Result<()> {
        if self.guard.payments.contains_key(&payment.pid) {
            return Err(PaymentError::Internal(format!(
                "duplicate payment row for pid: {}",
                payment.pid
            )));
        }
        self.undo.push(Undo::InsertedPayment(payment.pid.clone()));
        self.guard.payments.insert(payment.pid.clone(), payment);
        Ok(())
    }

    async fn update_payment(&mut self, payment: Payment) -> Result<()> {
        match self.guard.payments.get_mut(&payment.pid) {
            Some(row) => {
                let previous = std::mem::replace(row, payment);
                self.undo.push(Undo::UpdatedPayment(previous));
                Ok(())
            }
            None => Err(PaymentError::NotFound(format!(
                "payment not found for pid: {}",
                payment.pid
            ))),
        }
    }

    async fn insert_wallet(&mut self, user_id: &str, kind: WalletKind) -> Result<Wallet> {
        if self.guard.wallets_by_user.contains_key(user_id) {
            return Err(PaymentError::FailedPrecondition(format!(
                "wallet already exists for user: {user_id}"
            )));
        }
        let wallet = Wallet {
            id: self.guard.next_wallet_id(),
            user_id: user_id.to_string(),
            kind,
        };
        self.guard.wallets.insert(wallet.id, wallet.clone());
        self.guard
            .wallets_by_user
            .insert(wallet.user_id.clone(), wallet.id);
        self.undo.push(Undo::Wallet(wallet.id));
        Ok(wallet)
    }

    async fn insert_account(
        &mut self,
        wallet_id: WalletId,
        role: AccountRole,
        balance: Balance,
    ) -> Result<Account> {
        if !self.guard.wallets.contains_key(&wallet_id) {
            return Err(PaymentError::NotFound(format!(
                "wallet not found for ID: {wallet_id}"
            )));
        }
        if self.guard.accounts_by_role.contains_key(&(wallet_id, role)) {
            return Err(PaymentError::FailedPrecondition(format!(
                "wallet {wallet_id} already has a {role} account"
            )));
        }
        let account = Account {
            id: self.guard.next_account_id(),
            wallet_id,
            role,
            balance,
        };
        self.guard.accounts.insert(account.id, account.clone());
        self.guard
            .accounts_by_role
            .insert((wallet_id, role), account.id);
        self.undo.push(Undo::Account(account.id));
        Ok(account)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.undo.clear();
        debug!("in-memory ledger transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.revert();
        debug!("in-memory ledger transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::Amount;
    use crate::domain::payment::PaymentStatus;

    async fn seeded() -> (InMemoryLedgerStore, Wallet, Account) {
        let store = InMemoryLedgerStore::new();
        let mut tx = store.begin().await.unwrap();
        let wallet = tx.insert_wallet("alice", WalletKind::Customer).await.unwrap();
        let account = tx
            .insert_account(wallet.id, AccountRole::Default, Balance::new(100).unwrap())
            .await
            .unwrap();
        tx.commit().await.unwrap();
        (store, wallet, account)
    }

    #[tokio::test]
    async fn test_lookups() {
        let (store, wallet, account) = seeded().await;
        let mut tx = store.begin().await.unwrap();

        assert_eq!(tx.wallet_by_user("alice").await.unwrap(), wallet);
        assert_eq!(tx.wallet_by_id(wallet.id).await.unwrap(), wallet);
        assert_eq!(
            tx.account(wallet.id, AccountRole::Default).await.unwrap(),
            account
        );

        assert!(matches!(
            tx.wallet_by_user("bob").await,
            Err(PaymentError::NotFound(_))
        ));
        assert!(matches!(
            tx.account(wallet.id, AccountRole::Incoming).await,
            Err(PaymentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_discarded() {
        let (store, _, account) = seeded().await;

        let mut tx = store.begin().await.unwrap();
        tx.set_balance(account.id, Balance::ZERO).await.unwrap();
        tx.rollback().await.unwrap();

        {
            let tx = store.begin().await.unwrap();
            // dropped without commit
            drop(tx);
        }

        let balances = store.balances().await.unwrap();
        assert_eq!(balances[0].cents, 100);
    }

    #[tokio::test]
    async fn test_reads_see_own_writes() {
        let (store, wallet, account) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        tx.set_balance(account.id, Balance::new(40).unwrap())
            .await
            .unwrap();
        let reread = tx.account(wallet.id, AccountRole::Default).await.unwrap();
        assert_eq!(reread.balance.cents(), 40);
    }

    #[tokio::test]
    async fn test_latest_leg_is_most_recent() {
        let (store, wallet, account) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        let pid = Pid::from("p-1");
        let leg = |amount: i64| NewTransaction {
            pid: pid.clone(),
            src_user_id: wallet.user_id.clone(),
            dst_user_id: wallet.user_id.clone(),
            src_account_wallet_id: wallet.id,
            dst_account_wallet_id: wallet.id,
            src_account_id: account.id,
            dst_account_id: account.id,
            src_account_type: AccountRole::Default,
            dst_account_type: AccountRole::Default,
            final_dst_merchant_wallet_id: wallet.id,
            amount: Amount::new(amount).unwrap(),
        };

        tx.insert_leg(leg(1)).await.unwrap();
        tx.insert_leg(leg(2)).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.latest_leg(&pid).await.unwrap().amount.cents(), 2);
        assert_eq!(tx.legs(&pid).await.unwrap().len(), 2);
        assert!(matches!(
            tx.latest_leg(&Pid::from("unknown")).await,
            Err(PaymentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rolled_back_rows_leave_lookups() {
        let (store, wallet, account) = seeded().await;
        let pid = Pid::from("p-2");

        let mut tx = store.begin().await.unwrap();
        let bob = tx.insert_wallet("bob", WalletKind::Customer).await.unwrap();
        tx.insert_account(bob.id, AccountRole::Default, Balance::ZERO)
            .await
            .unwrap();
        tx.insert_account(wallet.id, AccountRole::Payment, Balance::ZERO)
            .await
            .unwrap();
        tx.insert_leg(NewTransaction {
            pid: pid.clone(),
            src_user_id: wallet.user_id.clone(),
            dst_user_id: wallet.user_id.clone(),
            src_account_wallet_id: wallet.id,
            dst_account_wallet_id: wallet.id,
            src_account_id: account.id,
            dst_account_id: account.id,
            src_account_type: AccountRole::Default,
            dst_account_type: AccountRole::Default,
            final_dst_merchant_wallet_id: wallet.id,
            amount: Amount::new(5).unwrap(),
        })
        .await
        .unwrap();
        assert_eq!(tx.wallet_by_user("bob").await.unwrap(), bob);
        assert_eq!(tx.legs(&pid).await.unwrap().len(), 1);
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.wallet_by_user("bob").await,
            Err(PaymentError::NotFound(_))
        ));
        assert!(matches!(
            tx.account(wallet.id, AccountRole::Payment).await,
            Err(PaymentError::NotFound(_))
        ));
        assert!(matches!(
            tx.latest_leg(&pid).await,
            Err(PaymentError::NotFound(_))
        ));
        assert!(tx.legs(&pid).await.unwrap().is_empty());

        // the freed slots are reusable after the rollback
        let again = tx.insert_wallet("bob", WalletKind::Customer).await.unwrap();
        assert_eq!(again.id, bob.id);
        tx.insert_account(wallet.id, AccountRole::Payment, Balance::ZERO)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.balances().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_wallet_rejected() {
        let (store, _, _) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.insert_wallet("alice", WalletKind::Customer).await,
            Err(PaymentError::FailedPrecondition(_))
        ));
    }

    #[tokio::test]
    async fn test_payment_rows() {
        let store = InMemoryLedgerStore::new();
        let pid = Pid::from("p-9");
        let mut payment = Payment::authorized(pid.clone(), "alice".into(), 1, Amount::new(30).unwrap());

        let mut tx = store.begin().await.unwrap();
        tx.insert_payment(payment.clone()).await.unwrap();
        assert!(matches!(
            tx.insert_payment(payment.clone()).await,
            Err(PaymentError::Internal(_))
        ));
        tx.commit().await.unwrap();

        payment.capture().unwrap();
        let mut tx = store.begin().await.unwrap();
        tx.update_payment(payment).await.unwrap();
        assert_eq!(tx.payment(&pid).await.unwrap().status, PaymentStatus::Captured);
        assert!(matches!(
            tx.payment(&Pid::from("p-0")).await,
            Err(PaymentError::NotFound(_))
        ));
        let orphan = Payment::authorized(Pid::from("p-0"), "bob".into(), 1, Amount::new(1).unwrap());
        assert!(matches!(
            tx.update_payment(orphan).await,
            Err(PaymentError::NotFound(_))
        ));
    }
}
