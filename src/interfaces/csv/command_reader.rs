use crate::application::service::AuthorizeRequest;
use crate::error::{PaymentError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Authorize,
    Capture,
}

/// One row of a payment command script.
///
/// `reference` is a caller-chosen label: an `authorize` row binds it to the
/// pid the engine returns and a later `capture` row names the payment by it.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CommandRecord {
    pub r#type: CommandType,
    pub reference: String,
    pub customer: Option<String>,
    pub merchant: Option<String>,
    pub cents: Option<i64>,
    pub currency: Option<String>,
}

/// A validated command ready to run against the service.
#[derive(Debug, PartialEq, Clone)]
pub enum Command {
    Authorize {
        reference: String,
        request: AuthorizeRequest,
    },
    Capture {
        reference: String,
    },
}

impl TryFrom<CommandRecord> for Command {
    type Error = PaymentError;

    fn try_from(record: CommandRecord) -> Result<Self> {
        if record.reference.is_empty() {
            return Err(PaymentError::InvalidArgument(
                "command is missing a reference".to_string(),
            ));
        }
        let missing = |field: &str| {
            PaymentError::InvalidArgument(format!(
                "authorize {} is missing {field}",
                record.reference
            ))
        };
        match record.r#type {
            CommandType::Capture => Ok(Command::Capture {
                reference: record.reference,
            }),
            CommandType::Authorize => {
                let request = AuthorizeRequest {
                    customer_wallet_user_id: record
                        .customer
                        .clone()
                        .ok_or_else(|| missing("customer"))?,
                    merchant_wallet_user_id: record
                        .merchant
                        .clone()
                        .ok_or_else(|| missing("merchant"))?,
                    cents: record.cents.ok_or_else(|| missing("cents"))?,
                    currency: record
                        .currency
                        .clone()
                        .ok_or_else(|| missing("currency"))?,
                };
                Ok(Command::Authorize {
                    reference: record.reference,
                    request,
                })
            }
        }
    }
}

/// Reads payment commands from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<Command>`.
/// It handles whitespace trimming and flexible record lengths automatically.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and validates commands.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader.into_deserialize().map(|result| {
            let record: CommandRecord = result?;
            Command::try_from(record)
        })
    }
}
