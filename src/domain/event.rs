use super::account::Amount;
use super::transaction::Pid;
use crate::error::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const LEDGER_TOPIC: &str = "ledger";
pub const EMAIL_TOPIC: &str = "email";

/// Something that can be written to a broker topic.
pub trait Event {
    fn topic(&self) -> &str;
    fn serialize(&self) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LedgerOperation {
    Debit,
}

/// Ledger-debit notification for a captured payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub order_id: Pid,
    pub user_id: String,
    pub amount: i64,
    pub operation: LedgerOperation,
    /// Calendar date of the capture, `YYYY-MM-DD`.
    pub date: NaiveDate,
}

/// Order confirmation request for the email service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailEvent {
    pub order_id: Pid,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    Ledger(LedgerEvent),
    Email(EmailEvent),
}

impl DomainEvent {
    /// Events emitted once a capture has committed.
    pub fn for_capture(pid: &Pid, user_id: &str, amount: Amount, date: NaiveDate) -> [Self; 2] {
        [
            DomainEvent::Ledger(LedgerEvent {
                order_id: pid.clone(),
                user_id: user_id.to_string(),
                amount: amount.cents(),
                operation: LedgerOperation::Debit,
                date,
            }),
            DomainEvent::Email(EmailEvent {
                order_id: pid.clone(),
                user_id: user_id.to_string(),
            }),
        ]
    }
}

impl Event for LedgerEvent {
    fn topic(&self) -> &str {
        LEDGER_TOPIC
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl Event for EmailEvent {
    fn topic(&self) -> &str {
        EMAIL_TOPIC
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl Event for DomainEvent {
    fn topic(&self) -> &str {
        match self {
            DomainEvent::Ledger(e) => e.topic(),
            DomainEvent::Email(e) => e.topic(),
        }
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        match self {
            DomainEvent::Ledger(e) => Event::serialize(e),
            DomainEvent::Email(e) => Event::serialize(e),
        }
    }
}
