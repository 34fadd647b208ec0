use crate::domain::account::{Account, Amount};
use crate::domain::ports::LedgerTx;
use crate::error::{PaymentError, Result};

/// Moves `amount` from `source` to `destination` inside the caller's
/// transaction.
///
/// Fails with `FailedPrecondition` before writing anything when the source
/// cannot cover the amount. The two balance writes are only durable together
/// once the enclosing transaction commits.
pub async fn transfer(
    tx: &mut dyn LedgerTx,
    source: &Account,
    destination: &Account,
    amount: Amount,
) -> Result<()> {
    let debited = source.balance.debit(amount).ok_or_else(|| {
        PaymentError::FailedPrecondition("insufficient funds in source account".to_string())
    })?;
    let credited = destination.balance.credit(amount).ok_or_else(|| {
        PaymentError::Internal(format!(
            "failed to update destination account {}: balance overflow",
            destination.id
        ))
    })?;

    tx.set_balance(source.id, debited).await?;
    tx.set_balance(destination.id, credited).await?;
    Ok(())
}
