use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// unique identifier for a loan
pub type LoanId = i64;

/// unique identifier for a customer
pub type CustomerId = i64;

/// discriminator stored for home loans
pub const HOME_LOAN_TAG: &str = "HomeLoan";

/// discriminator stored for car loans
pub const CAR_LOAN_TAG: &str = "CarLoan";

/// longest loan term accepted, in months
pub const MAX_TERM_MONTHS: u32 = 1200;

/// credit score a customer must exceed to be approved
pub const APPROVAL_CREDIT_SCORE: i32 = 650;

/// loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LoanStatus {
    /// submitted, no decision yet
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "Pending",
            LoanStatus::Approved => "Approved",
            LoanStatus::Rejected => "Rejected",
        }
    }

    /// approval rule: strictly above the threshold
    pub fn decide(credit_score: i32) -> LoanStatus {
        if credit_score > APPROVAL_CREDIT_SCORE {
            LoanStatus::Approved
        } else {
            LoanStatus::Rejected
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// error for status text that is none of the known values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown loan status {:?}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for LoanStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(LoanStatus::Pending),
            "Approved" => Ok(LoanStatus::Approved),
            "Rejected" => Ok(LoanStatus::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}
