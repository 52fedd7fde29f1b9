use std::path::PathBuf;

use thiserror::Error;

use crate::decimal::Money;
use crate::types::LoanId;

/// The single error type surfaced by the loan desk.
///
/// "Loan not found" from a by-id read is not an error (it is `Ok(None)`);
/// it only becomes `LoanNotFound` in operations that cannot proceed without
/// the loan.
#[derive(Error, Debug)]
pub enum InvalidLoanError {
    #[error("loan not found: {loan_id}")]
    LoanNotFound {
        loan_id: LoanId,
    },

    #[error("payment below one EMI: emi {emi:.2}, provided {provided:.2}")]
    PaymentBelowEmi {
        emi: Money,
        provided: Money,
    },

    #[error("invalid loan term: {term_months} months")]
    InvalidTerm {
        term_months: u32,
    },

    #[error("invalid loan: {message}")]
    InvalidLoan {
        message: String,
    },

    #[error("calculation error: {message}")]
    CalculationError {
        message: String,
    },

    #[error("corrupt loan record {loan_id}: {message}")]
    CorruptRecord {
        loan_id: LoanId,
        message: String,
    },

    #[error("{context}: {source}")]
    Database {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("cannot read config {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {message}")]
    InvalidConfiguration {
        message: String,
    },
}

impl InvalidLoanError {
    /// true for failures of the underlying data access rather than business rules
    pub fn is_data_access(&self) -> bool {
        matches!(self, InvalidLoanError::Database { .. })
    }
}

/// attach a context message to a storage error
pub(crate) fn db_err(context: impl Into<String>) -> impl FnOnce(rusqlite::Error) -> InvalidLoanError {
    let context = context.into();
    move |source| InvalidLoanError::Database { context, source }
}

pub type Result<T> = std::result::Result<T, InvalidLoanError>;
