use crate::domain::account::{
    Account, AccountBalance, AccountId, AccountRole, Balance, Wallet, WalletId, WalletKind,
};
use crate::domain::payment::Payment;
use crate::domain::ports::{LedgerStore, LedgerTx};
use crate::domain::transaction::{NewTransaction, Pid, TransactionRecord};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, Transaction, TransactionDB,
    TransactionDBOptions,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Wallet rows keyed by wallet id.
pub const CF_WALLETS: &str = "wallets";
/// Index from user id to wallet id.
pub const CF_WALLETS_BY_USER: &str = "wallets_by_user";
/// Account rows keyed by account id.
pub const CF_ACCOUNTS: &str = "accounts";
/// Index from `"{wallet_id}/{ROLE}"` to account id.
pub const CF_ACCOUNTS_BY_ROLE: &str = "accounts_by_role";
/// Leg rows keyed by transaction id.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Index from pid to the ids of its legs, oldest first.
pub const CF_LEGS_BY_PID: &str = "legs_by_pid";
/// Payment state rows keyed by pid.
pub const CF_PAYMENTS: &str = "payments";
/// Id sequences.
pub const CF_META: &str = "meta";

const COLUMN_FAMILIES: [&str; 8] = [
    CF_WALLETS,
    CF_WALLETS_BY_USER,
    CF_ACCOUNTS,
    CF_ACCOUNTS_BY_ROLE,
    CF_TRANSACTIONS,
    CF_LEGS_BY_PID,
    CF_PAYMENTS,
    CF_META,
];

const SEQ_WALLET: &str = "next_wallet_id";
const SEQ_ACCOUNT: &str = "next_account_id";
const SEQ_TRANSACTION: &str = "next_transaction_id";

/// A persistent ledger backed by a RocksDB `TransactionDB`.
///
/// Every ledger transaction maps onto a pessimistic RocksDB transaction.
/// Rows that are read before being written (accounts, payments, sequences)
/// are fetched with `get_for_update`, so concurrent transfers touching the
/// same account are serialized by the database's row locks.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<TransactionDB>`).
#[derive(Clone)]
pub struct RocksDBLedgerStore {
    db: Arc<TransactionDB>,
}

impl RocksDBLedgerStore {
    /// Opens or creates a ledger at the specified path, creating the
    /// column families it needs.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));

        let db = TransactionDB::open_cf_descriptors(
            &opts,
            &TransactionDBOptions::default(),
            path,
            descriptors,
        )?;

        Ok(Self { db: Arc::new(db) })
    }
}

fn column<'a>(db: &'a TransactionDB, name: &str) -> Result<&'a ColumnFamily> {
    db.cf_handle(name)
        .ok_or_else(|| PaymentError::Internal(format!("column family {name} not found")))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| PaymentError::internal("failed to decode ledger row", e))
}

fn decode_id(bytes: &[u8]) -> Result<i64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| PaymentError::Internal(format!("corrupt id of {} bytes", bytes.len())))?;
    Ok(i64::from_be_bytes(raw))
}

fn narrow(id: i64) -> Result<i32> {
    i32::try_from(id).map_err(|_| PaymentError::Internal(format!("id {id} out of range")))
}

fn role_key(wallet_id: WalletId, role: AccountRole) -> String {
    format!("{wallet_id}/{role}")
}

#[async_trait]
impl LedgerStore for RocksDBLedgerStore {
    async fn begin<'a>(&'a self) -> Result<Box<dyn LedgerTx + 'a>> {
        let db: &'a TransactionDB = &self.db;
        Ok(Box::new(RocksDBLedgerTx {
            db,
            txn: db.transaction(),
        }))
    }

    async fn balances(&self) -> Result<Vec<AccountBalance>> {
        let accounts = column(&self.db, CF_ACCOUNTS)?;
        let wallets = column(&self.db, CF_WALLETS)?;

        let mut rows = Vec::new();
        for item in self.db.iterator_cf(accounts, IteratorMode::Start) {
            let (_key, value) = item?;
            let account: Account = decode(&value)?;
            let wallet_bytes = self
                .db
                .get_cf(wallets, (account.wallet_id as i64).to_be_bytes())?
                .ok_or_else(|| {
                    PaymentError::Internal(format!(
                        "account {} references missing wallet {}",
                        account.id, account.wallet_id
                    ))
                })?;
            let wallet: Wallet = decode(&wallet_bytes)?;
            rows.push(AccountBalance {
                user_id: wallet.user_id,
                wallet_type: wallet.kind,
                account_type: account.role,
                cents: account.balance.cents(),
            });
        }
        Ok(rows)
    }
}

/// One open RocksDB transaction.
pub struct RocksDBLedgerTx<'a> {
    db: &'a TransactionDB,
    txn: Transaction<'a, TransactionDB>,
}

impl<'a> RocksDBLedgerTx<'a> {
    fn get<T: DeserializeOwned>(&self, cf: &str, key: &[u8], for_update: bool) -> Result<Option<T>> {
        let handle = column(self.db, cf)?;
        let bytes = if for_update {
            self.txn.get_for_update_cf(handle, key, true)?
        } else {
            self.txn.get_cf(handle, key)?
        };
        bytes.map(|b| decode(&b)).transpose()
    }

    fn get_id(&self, cf: &str, key: &[u8]) -> Result<Option<i64>> {
        let handle = column(self.db, cf)?;
        self.txn
            .get_cf(handle, key)?
            .map(|b| decode_id(&b))
            .transpose()
    }

    fn put<T: Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<()> {
        let handle = column(self.db, cf)?;
        let bytes = serde_json::to_vec(value)?;
        self.txn.put_cf(handle, key, bytes)?;
        Ok(())
    }

    fn put_id(&self, cf: &str, key: &[u8], id: i64) -> Result<()> {
        let handle = column(self.db, cf)?;
        self.txn.put_cf(handle, key, id.to_be_bytes())?;
        Ok(())
    }

    fn next_id(&self, sequence: &str) -> Result<i64> {
        let handle = column(self.db, CF_META)?;
        let current = self
            .txn
            .get_for_update_cf(handle, sequence, true)?
            .map(|b| decode_id(&b))
            .transpose()?
            .unwrap_or(1);
        self.txn.put_cf(handle, sequence, (current + 1).to_be_bytes())?;
        Ok(current)
    }

    fn leg_ids(&self, pid: &Pid) -> Result<Vec<i64>> {
        Ok(self
            .get(CF_LEGS_BY_PID, pid.as_str().as_bytes(), false)?
            .unwrap_or_default())
    }

    fn load_leg(&self, id: i64) -> Result<TransactionRecord> {
        self.get(CF_TRANSACTIONS, &id.to_be_bytes(), false)?
            .ok_or_else(|| PaymentError::Internal(format!("leg {id} missing from index")))
    }
}

#[async_trait]
impl<'a> LedgerTx for RocksDBLedgerTx<'a> {
    async fn wallet_by_user(&mut self, user_id: &str) -> Result<Wallet> {
        let id = self
            .get_id(CF_WALLETS_BY_USER, user_id.as_bytes())?
            .ok_or_else(|| PaymentError::NotFound(format!("wallet not found for user: {user_id}")))?;
        self.wallet_by_id(narrow(id)?).await
    }

    async fn wallet_by_id(&mut self, wallet_id: WalletId) -> Result<Wallet> {
        self.get(CF_WALLETS, &(wallet_id as i64).to_be_bytes(), false)?
            .ok_or_else(|| PaymentError::NotFound(format!("wallet not found for ID: {wallet_id}")))
    }

    async fn account(&mut self, wallet_id: WalletId, role: AccountRole) -> Result<Account> {
        let not_found = || {
            PaymentError::NotFound(format!(
                "account not found for wallet ID: {wallet_id} and type: {role}"
            ))
        };
        let id = self
            .get_id(CF_ACCOUNTS_BY_ROLE, role_key(wallet_id, role).as_bytes())?
            .ok_or_else(not_found)?;
        self.get(CF_ACCOUNTS, &id.to_be_bytes(), true)?
            .ok_or_else(not_found)
    }

    async fn set_balance(&mut self, account_id: AccountId, balance: Balance) -> Result<()> {
        let key = (account_id as i64).to_be_bytes();
        let mut account: Account = self.get(CF_ACCOUNTS, &key, true)?.ok_or_else(|| {
            PaymentError::Internal(format!("failed to update account {account_id}: no such row"))
        })?;
        account.balance = balance;
        self.put(CF_ACCOUNTS, &key, &account)
    }

    async fn latest_leg(&mut self, pid: &Pid) -> Result<TransactionRecord> {
        match self.leg_ids(pid)?.last() {
            Some(id) => self.load_leg(*id),
            None => Err(PaymentError::NotFound(format!(
                "transaction not found for pid: {pid}"
            ))),
        }
    }

    async fn legs(&mut self, pid: &Pid) -> Result<Vec<TransactionRecord>> {
        self.leg_ids(pid)?
            .into_iter()
            .map(|id| self.load_leg(id))
            .collect()
    }

    async fn insert_leg(&mut self, leg: NewTransaction) -> Result<TransactionRecord> {
        let id = self.next_id(SEQ_TRANSACTION)?;
        let pid_key = leg.pid.as_str().as_bytes().to_vec();
        let mut ids: Vec<i64> = self
            .get(CF_LEGS_BY_PID, &pid_key, true)?
            .unwrap_or_default();

        let record = leg.with_id(id);
        self.put(CF_TRANSACTIONS, &id.to_be_bytes(), &record)?;
        ids.push(id);
        self.put(CF_LEGS_BY_PID, &pid_key, &ids)?;
        debug!(pid = %record.pid, id, "leg inserted");
        Ok(record)
    }

    async fn payment(&mut self, pid: &Pid) -> Result<Payment> {
        self.get(CF_PAYMENTS, pid.as_str().as_bytes(), true)?
            .ok_or_else(|| PaymentError::NotFound(format!("payment not found for pid: {pid}")))
    }

    async fn insert_payment(&mut self, payment: Payment) -> Result<()> {
        let key = payment.pid.as_str().as_bytes().to_vec();
        if self.get::<Payment>(CF_PAYMENTS, &key, true)?.is_some() {
            return Err(PaymentError::Internal(format!(
                "duplicate payment row for pid: {}",
                payment.pid
            )));
        }
        self.put(CF_PAYMENTS, &key, &payment)
    }

    async fn update_payment(&mut self, payment: Payment) -> Result<()> {
        let key = payment.pid.as_str().as_bytes().to_vec();
        if self.get::<Payment>(CF_PAYMENTS, &key, true)?.is_none() {
            return Err(PaymentError::NotFound(format!(
                "payment not found for pid: {}",
                payment.pid
            )));
        }
        self.put(CF_PAYMENTS, &key, &payment)
    }

    async fn insert_wallet(&mut self, user_id: &str, kind: WalletKind) -> Result<Wallet> {
        let by_user = column(self.db, CF_WALLETS_BY_USER)?;
        if self
            .txn
            .get_for_update_cf(by_user, user_id.as_bytes(), true)?
            .is_some()
        {
            return Err(PaymentError::FailedPrecondition(format!(
                "wallet already exists for user: {user_id}"
            )));
        }
        let id = self.next_id(SEQ_WALLET)?;
        let wallet = Wallet {
            id: narrow(id)?,
            user_id: user_id.to_string(),
            kind,
        };
        self.put(CF_WALLETS, &id.to_be_bytes(), &wallet)?;
        self.put_id(CF_WALLETS_BY_USER, user_id.as_bytes(), id)?;
        Ok(wallet)
    }

    async fn insert_account(
        &mut self,
        wallet_id: WalletId,
        role: AccountRole,
        balance: Balance,
    ) -> Result<Account> {
        self.wallet_by_id(wallet_id).await?;

        let index_key = role_key(wallet_id, role);
        let by_role = column(self.db, CF_ACCOUNTS_BY_ROLE)?;
        if self
            .txn
            .get_for_update_cf(by_role, index_key.as_bytes(), true)?
            .is_some()
        {
            return Err(PaymentError::FailedPrecondition(format!(
                "wallet {wallet_id} already has a {role} account"
            )));
        }

        let id = self.next_id(SEQ_ACCOUNT)?;
        let account = Account {
            id: narrow(id)?,
            wallet_id,
            role,
            balance,
        };
        self.put(CF_ACCOUNTS, &id.to_be_bytes(), &account)?;
        self.put_id(CF_ACCOUNTS_BY_ROLE, index_key.as_bytes(), id)?;
        Ok(account)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.txn
            .commit()
            .map_err(|e| PaymentError::internal("failed to commit transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.txn
            .rollback()
            .map_err(|e| PaymentError::internal("failed to rollback transaction", e))
    }
}
