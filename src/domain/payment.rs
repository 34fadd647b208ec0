use super::account::{Amount, WalletId};
use super::transaction::Pid;
use crate::error::PaymentError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Authorized,
    Captured,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Authorized => f.write_str("AUTHORIZED"),
            PaymentStatus::Captured => f.write_str("CAPTURED"),
            PaymentStatus::Failed => f.write_str("FAILED"),
        }
    }
}

/// Current state of a two-phase payment, one row per pid.
///
/// `AUTHORIZED -> CAPTURED` on a successful capture, `AUTHORIZED -> FAILED`
/// when the held funds can no longer be settled. Both are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub pid: Pid,
    pub customer_user_id: String,
    pub merchant_wallet_id: WalletId,
    pub amount: Amount,
    pub status: PaymentStatus,
}

impl Payment {
    pub fn authorized(
        pid: Pid,
        customer_user_id: String,
        merchant_wallet_id: WalletId,
        amount: Amount,
    ) -> Self {
        Self {
            pid,
            customer_user_id,
            merchant_wallet_id,
            amount,
            status: PaymentStatus::Authorized,
        }
    }

    /// Checks that the payment may still be captured.
    pub fn ensure_capturable(&self) -> Result<(), PaymentError> {
        match self.status {
            PaymentStatus::Authorized => Ok(()),
            PaymentStatus::Captured => Err(PaymentError::FailedPrecondition(format!(
                "payment {} already captured",
                self.pid
            ))),
            PaymentStatus::Failed => Err(PaymentError::FailedPrecondition(format!(
                "payment {} has failed and cannot be captured",
                self.pid
            ))),
        }
    }

    pub fn capture(&mut self) -> Result<(), PaymentError> {
        self.ensure_capturable()?;
        self.status = PaymentStatus::Captured;
        Ok(())
    }

    pub fn fail(&mut self) -> Result<(), PaymentError> {
        self.ensure_capturable()?;
        self.status = PaymentStatus::Failed;
        Ok(())
    }
}
