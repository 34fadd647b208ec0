use miette::Diagnostic;
use std::fmt;
use thiserror::Error;

/// Failure conditions surfaced by the money-movement engine.
///
/// Every variant carries a human readable message that the gateway forwards
/// verbatim; [`PaymentError::code`] classifies it.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("{0}")]
    #[diagnostic(code(money_movement::invalid_argument))]
    InvalidArgument(String),
    #[error("{0}")]
    #[diagnostic(code(money_movement::not_found))]
    NotFound(String),
    #[error("{0}")]
    #[diagnostic(code(money_movement::failed_precondition))]
    FailedPrecondition(String),
    #[error("{0}")]
    #[diagnostic(code(money_movement::unauthenticated))]
    Unauthenticated(String),
    #[error("{0}")]
    #[diagnostic(code(money_movement::internal))]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PaymentError>;

/// Condition classes shared with the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    InvalidArgument,
    NotFound,
    FailedPrecondition,
    Unauthenticated,
    Internal,
}

impl StatusCode {
    /// HTTP status the gateway answers with for this condition.
    pub fn http_status(self) -> u16 {
        match self {
            StatusCode::InvalidArgument => 400,
            StatusCode::Unauthenticated => 401,
            StatusCode::NotFound => 404,
            StatusCode::FailedPrecondition => 412,
            StatusCode::Internal => 500,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::FailedPrecondition => "FAILED_PRECONDITION",
            StatusCode::Unauthenticated => "UNAUTHENTICATED",
            StatusCode::Internal => "INTERNAL",
        };
        f.write_str(name)
    }
}

impl PaymentError {
    pub fn code(&self) -> StatusCode {
        match self {
            PaymentError::InvalidArgument(_) => StatusCode::InvalidArgument,
            PaymentError::NotFound(_) => StatusCode::NotFound,
            PaymentError::FailedPrecondition(_) => StatusCode::FailedPrecondition,
            PaymentError::Unauthenticated(_) => StatusCode::Unauthenticated,
            PaymentError::Internal(_) => StatusCode::Internal,
        }
    }

    pub fn http_status(&self) -> u16 {
        self.code().http_status()
    }

    pub fn internal(context: &str, err: impl fmt::Display) -> Self {
        PaymentError::Internal(format!("{context}: {err}"))
    }
}

impl From<std::io::Error> for PaymentError {
    fn from(err: std::io::Error) -> Self {
        PaymentError::internal("IO error", err)
    }
}

impl From<csv::Error> for PaymentError {
    fn from(err: csv::Error) -> Self {
        PaymentError::internal("CSV error", err)
    }
}

impl From<serde_json::Error> for PaymentError {
    fn from(err: serde_json::Error) -> Self {
        PaymentError::internal("serialization error", err)
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for PaymentError {
    fn from(err: rocksdb::Error) -> Self {
        PaymentError::internal("RocksDB error", err)
    }
}
