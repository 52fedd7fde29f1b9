pub mod calculator;
pub mod config;
pub mod customer;
pub mod db;
pub mod decimal;
pub mod errors;
pub mod loan;
pub mod payments;
pub mod store;
pub mod types;

// re-export key types
pub use calculator::{emi, simple_interest};
pub use config::{AppConfig, DatabaseConfig};
pub use customer::Customer;
pub use db::Session;
pub use decimal::{Money, Rate};
pub use errors::{InvalidLoanError, Result};
pub use loan::{CarLoan, HomeLoan, Loan, LoanBuilder, LoanDetails};
pub use payments::{
    split_payment, AmortizationSchedule, RepaymentProcessor, RepaymentReceipt, ScheduledPayment,
};
pub use store::LoanStore;
pub use types::{CustomerId, LoanId, LoanStatus, APPROVAL_CREDIT_SCORE, MAX_TERM_MONTHS};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
