pub mod amortization;
pub mod repayment;

pub use amortization::{AmortizationSchedule, ScheduledPayment};
pub use repayment::{split_payment, RepaymentProcessor, RepaymentReceipt};
