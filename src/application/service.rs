use super::config::ServiceConfig;
use super::notifier::{CaptureNotifier, PublishReport};
use super::transfer::transfer;
use crate::domain::account::{AccountBalance, AccountRole, Amount, Balance, Wallet, WalletKind};
use crate::domain::payment::Payment;
use crate::domain::ports::{EventPublisherRef, LedgerStoreRef, LedgerTx};
use crate::domain::transaction::{LegEnd, NewTransaction, Pid, TransactionRecord};
use crate::error::{PaymentError, Result};
use serde::Deserialize;
use tracing::{error, info, warn};

/// Inbound authorize call as received from the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthorizeRequest {
    pub customer_wallet_user_id: String,
    pub merchant_wallet_user_id: String,
    pub cents: i64,
    pub currency: String,
}

/// Result of a committed capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReceipt {
    pub pid: Pid,
    pub customer_user_id: String,
    pub amount: Amount,
    /// Delivery of the follow-up events. Failures here do not undo the capture.
    pub events: PublishReport,
}

/// A wallet to create together with its accounts and opening balances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletProvision {
    pub user_id: String,
    pub kind: WalletKind,
    pub accounts: Vec<(AccountRole, Balance)>,
}

/// Why a capture transaction was abandoned.
enum Abort {
    /// Roll back and return the error.
    Reject(PaymentError),
    /// Roll back, then mark the payment FAILED: the held funds cannot settle.
    Unsettleable(PaymentError),
}

impl From<PaymentError> for Abort {
    fn from(err: PaymentError) -> Self {
        Abort::Reject(err)
    }
}

/// The money-movement engine: two-phase authorize/capture over a ledger store.
///
/// Holds no per-request state; every call runs in its own store transaction,
/// so one instance can be cloned into any number of concurrent tasks.
#[derive(Clone)]
pub struct MoneyMovementService {
    store: LedgerStoreRef,
    notifier: CaptureNotifier,
    config: ServiceConfig,
}

impl MoneyMovementService {
    pub fn new(store: LedgerStoreRef, publisher: EventPublisherRef, config: ServiceConfig) -> Self {
        Self {
            store,
            notifier: CaptureNotifier::new(publisher),
            config,
        }
    }

    /// Reserves funds by moving them from the customer's DEFAULT account to
    /// their PAYMENT hold account and returns the new payment id.
    pub async fn authorize(&self, request: &AuthorizeRequest) -> Result<Pid> {
        let result = self.try_authorize(request).await;
        match &result {
            Ok(pid) => info!(
                %pid,
                customer = %request.customer_wallet_user_id,
                merchant = %request.merchant_wallet_user_id,
                cents = request.cents,
                "payment authorized"
            ),
            Err(e) => warn!(
                customer = %request.customer_wallet_user_id,
                code = %e.code(),
                error = %e,
                "authorize rejected"
            ),
        }
        result
    }

    async fn try_authorize(&self, request: &AuthorizeRequest) -> Result<Pid> {
        let currency = &self.config.settlement_currency;
        if request.currency != currency.as_str() {
            return Err(PaymentError::InvalidArgument(format!(
                "only {currency} currency is supported"
            )));
        }
        let amount = Amount::new(request.cents)?;

        let mut tx = self.store.begin().await?;
        let outcome = authorize_in(tx.as_mut(), request, amount).await;
        finish(tx, outcome).await
    }

    /// Settles an authorized payment: moves the held funds to the merchant's
    /// INCOMING account, then publishes the ledger and email events.
    ///
    /// A second capture of the same pid is rejected with
    /// `FailedPrecondition` and moves nothing.
    pub async fn capture(&self, pid: &Pid) -> Result<CaptureReceipt> {
        let authorized = match self.try_capture(pid).await {
            Ok(leg) => leg,
            Err(e) => {
                warn!(%pid, code = %e.code(), error = %e, "capture rejected");
                return Err(e);
            }
        };
        info!(%pid, cents = authorized.amount.cents(), "payment captured");

        let events = self
            .notifier
            .notify_capture(pid, &authorized.src_user_id, authorized.amount)
            .await;
        if !events.all_delivered() {
            error!(
                %pid,
                failed = ?events.failed_topics(),
                "capture committed but events were not delivered"
            );
        }

        Ok(CaptureReceipt {
            pid: pid.clone(),
            customer_user_id: authorized.src_user_id,
            amount: authorized.amount,
            events,
        })
    }

    async fn try_capture(&self, pid: &Pid) -> Result<TransactionRecord> {
        let mut tx = self.store.begin().await?;
        match capture_in(tx.as_mut(), pid).await {
            Ok(leg) => {
                tx.commit().await?;
                Ok(leg)
            }
            Err(Abort::Reject(cause)) => Err(roll_back(tx, cause).await),
            Err(Abort::Unsettleable(cause)) => {
                let err = roll_back(tx, cause).await;
                if matches!(err, PaymentError::FailedPrecondition(_)) {
                    self.mark_failed(pid).await;
                }
                Err(err)
            }
        }
    }

    async fn mark_failed(&self, pid: &Pid) {
        let result = async {
            let mut tx = self.store.begin().await?;
            let outcome = async {
                let mut payment = tx.payment(pid).await?;
                payment.fail()?;
                tx.update_payment(payment).await
            }
            .await;
            finish(tx, outcome).await
        }
        .await;
        match result {
            Ok(()) => warn!(%pid, "payment marked FAILED"),
            Err(e) => error!(%pid, error = %e, "failed to mark payment FAILED"),
        }
    }

    /// Creates a wallet and its accounts in one transaction.
    pub async fn provision_wallet(&self, provision: &WalletProvision) -> Result<Wallet> {
        let mut tx = self.store.begin().await?;
        let outcome = async {
            let wallet = tx.insert_wallet(&provision.user_id, provision.kind).await?;
            for (role, balance) in &provision.accounts {
                tx.insert_account(wallet.id, *role, *balance).await?;
            }
            Ok::<_, PaymentError>(wallet)
        }
        .await;
        let wallet = finish(tx, outcome).await?;
        info!(
            user_id = %wallet.user_id,
            wallet_id = wallet.id,
            kind = %wallet.kind,
            "wallet provisioned"
        );
        Ok(wallet)
    }

    /// Current state of a payment.
    pub async fn payment(&self, pid: &Pid) -> Result<Payment> {
        let mut tx = self.store.begin().await?;
        let outcome = tx.payment(pid).await;
        finish(tx, outcome).await
    }

    /// Recorded legs of a payment, oldest first.
    pub async fn legs(&self, pid: &Pid) -> Result<Vec<TransactionRecord>> {
        let mut tx = self.store.begin().await?;
        let outcome = tx.legs(pid).await;
        finish(tx, outcome).await
    }

    pub async fn balances(&self) -> Result<Vec<AccountBalance>> {
        self.store.balances().await
    }
}

async fn authorize_in(
    tx: &mut dyn LedgerTx,
    request: &AuthorizeRequest,
    amount: Amount,
) -> Result<Pid> {
    let merchant = tx.wallet_by_user(&request.merchant_wallet_user_id).await?;
    let customer = tx.wallet_by_user(&request.customer_wallet_user_id).await?;

    let source = tx.account(customer.id, AccountRole::Default).await?;
    let hold = tx.account(customer.id, AccountRole::Payment).await?;

    transfer(tx, &source, &hold, amount).await?;

    let pid = Pid::generate();
    tx.insert_leg(NewTransaction::leg(
        pid.clone(),
        LegEnd {
            wallet: &customer,
            account: &source,
        },
        LegEnd {
            wallet: &customer,
            account: &hold,
        },
        &merchant,
        amount,
    ))
    .await?;
    tx.insert_payment(Payment::authorized(
        pid.clone(),
        customer.user_id.clone(),
        merchant.id,
        amount,
    ))
    .await?;
    Ok(pid)
}

async fn capture_in(
    tx: &mut dyn LedgerTx,
    pid: &Pid,
) -> std::result::Result<TransactionRecord, Abort> {
    let authorized = tx.latest_leg(pid).await?;
    let mut payment = tx.payment(pid).await?;
    payment.ensure_capturable()?;

    let hold = tx
        .account(authorized.dst_account_wallet_id, AccountRole::Payment)
        .await?;
    let incoming = tx
        .account(authorized.final_dst_merchant_wallet_id, AccountRole::Incoming)
        .await?;

    transfer(tx, &hold, &incoming, authorized.amount)
        .await
        .map_err(|e| match e {
            PaymentError::FailedPrecondition(_) => Abort::Unsettleable(e),
            other => Abort::Reject(other),
        })?;

    let merchant = tx.wallet_by_id(authorized.final_dst_merchant_wallet_id).await?;
    let customer = tx.wallet_by_user(&authorized.src_user_id).await?;

    tx.insert_leg(NewTransaction::leg(
        pid.clone(),
        LegEnd {
            wallet: &customer,
            account: &hold,
        },
        LegEnd {
            wallet: &merchant,
            account: &incoming,
        },
        &merchant,
        authorized.amount,
    ))
    .await?;

    payment.capture()?;
    tx.update_payment(payment).await?;
    Ok(authorized)
}

/// Commits on success, rolls back on failure.
async fn finish<T>(tx: Box<dyn LedgerTx + '_>, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(cause) => Err(roll_back(tx, cause).await),
    }
}

/// Rolls back and hands back the error to return. A failed rollback
/// replaces `cause` with an `Internal` error naming both.
async fn roll_back(tx: Box<dyn LedgerTx + '_>, cause: PaymentError) -> PaymentError {
    match tx.rollback().await {
        Ok(()) => cause,
        Err(rollback_err) => {
            error!(error = %rollback_err, original = %cause, "rollback failed");
            PaymentError::Internal(format!(
                "failed to rollback transaction: {rollback_err}; original error: {cause}"
            ))
        }
    }
}
