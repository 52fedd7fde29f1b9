use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{InvalidLoanError, Result};
use crate::store::LoanStore;
use crate::types::LoanId;

/// outcome of checking a payment against a loan's EMI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentReceipt {
    pub receipt_id: Uuid,
    pub loan_id: LoanId,
    pub amount: Money,
    pub emi: Money,
    pub emis_paid: u64,
    /// part of the payment not applied to any EMI
    pub remainder: Money,
    pub processed_at: DateTime<Utc>,
}

/// Validates repayments against one EMI.
///
/// Stateless: no balance is decremented and nothing is written back, so the
/// same payment can be checked any number of times.
pub struct RepaymentProcessor<'a, 's> {
    store: &'a LoanStore<'s>,
}

impl<'a, 's> RepaymentProcessor<'a, 's> {
    pub fn new(store: &'a LoanStore<'s>) -> Self {
        Self { store }
    }

    pub fn apply_repayment(
        &self,
        loan_id: LoanId,
        amount: Money,
        time_provider: &SafeTimeProvider,
    ) -> Result<RepaymentReceipt> {
        let emi = self.store.emi_for(loan_id)?;

        let (emis_paid, remainder) = split_payment(emi, amount).map_err(|e| {
            tracing::warn!(loan_id, amount = %amount, emi = %emi.round_dp(2), "repayment rejected");
            e
        })?;

        tracing::info!(loan_id, emis_paid, remainder = %remainder.round_dp(2), "repayment accepted");

        Ok(RepaymentReceipt {
            receipt_id: Uuid::new_v4(),
            loan_id,
            amount,
            emi,
            emis_paid,
            remainder,
            processed_at: time_provider.now(),
        })
    }
}

/// split a payment into whole EMIs and the leftover
pub fn split_payment(emi: Money, amount: Money) -> Result<(u64, Money)> {
    if !emi.is_positive() {
        return Err(InvalidLoanError::CalculationError {
            message: format!("EMI must be positive, got {}", emi),
        });
    }
    if amount < emi {
        return Err(InvalidLoanError::PaymentBelowEmi { emi, provided: amount });
    }

    let emis_paid = amount
        .as_decimal()
        .checked_div(emi.as_decimal())
        .and_then(|whole| whole.floor().to_u64())
        .ok_or_else(|| InvalidLoanError::CalculationError {
            message: format!("payment of {} covers too many EMIs of {}", amount, emi),
        })?;
    let remainder = amount - emi * Decimal::from(emis_paid);

    Ok((emis_paid, remainder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customer::Customer;
    use crate::db::Session;
    use crate::decimal::Rate;
    use crate::loan::Loan;
    use chrono::TimeZone;
    use hourglass_rs::TimeSource;

    #[test]
    fn test_split_whole_emis_and_remainder() {
        let (paid, remainder) = split_payment(Money::from_major(1_000), Money::from_major(2_500)).unwrap();
        assert_eq!(paid, 2);
        assert!((remainder.to_f64() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_split_exact_multiple_has_no_remainder() {
        let (paid, remainder) = split_payment(Money::from_major(1_000), Money::from_major(3_000)).unwrap();
        assert_eq!(paid, 3);
        assert!(remainder.is_zero());
    }

    #[test]
    fn test_split_below_emi_rejected() {
        let err = split_payment(Money::from_major(1_000), Money::from_major(999)).unwrap_err();
        assert!(matches!(err, InvalidLoanError::PaymentBelowEmi { .. }));
    }

    #[test]
    fn test_split_huge_payment_against_tiny_emi() {
        let emi = Money::from_str_exact("0.00000000001").unwrap();
        let amount = Money::from_str_exact("100000000000000000000").unwrap();
        let err = split_payment(emi, amount).unwrap_err();
        assert!(matches!(err, InvalidLoanError::CalculationError { .. }));
    }

    #[test]
    fn test_apply_repayment_against_stored_loan() {
        let mut session = Session::in_memory().unwrap();
        let mut store = LoanStore::new(&mut session);

        let customer = Customer::new(3, "Meera Iyer", "meera@example.com", "555-0103", "9 Bay Rd", 710);
        let loan = Loan::builder(30, customer)
            .principal(Money::from_major(12_000))
            .rate(Rate::ZERO)
            .term_months(12)
            .generic("PersonalLoan")
            .build()
            .unwrap();
        store.apply_loan(&loan).unwrap();

        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let time = SafeTimeProvider::new(TimeSource::Test(now));
        let processor = RepaymentProcessor::new(&store);

        let receipt = processor
            .apply_repayment(30, Money::from_major(2_500), &time)
            .unwrap();
        assert_eq!(receipt.emi, Money::from_major(1_000));
        assert_eq!(receipt.emis_paid, 2);
        assert_eq!(receipt.remainder, Money::from_major(500));
        assert_eq!(receipt.processed_at, now);

        // nothing is recorded, so the same check gives the same answer
        let again = processor
            .apply_repayment(30, Money::from_major(2_500), &time)
            .unwrap();
        assert_eq!(again.emis_paid, 2);
        assert_ne!(again.receipt_id, receipt.receipt_id);

        let err = processor
            .apply_repayment(30, Money::from_str_exact("999.99").unwrap(), &time)
            .unwrap_err();
        assert!(matches!(err, InvalidLoanError::PaymentBelowEmi { .. }));
    }

    #[test]
    fn test_apply_repayment_unknown_loan() {
        let mut session = Session::in_memory().unwrap();
        let store = LoanStore::new(&mut session);
        let time = SafeTimeProvider::new(TimeSource::Test(Utc::now()));

        let err = RepaymentProcessor::new(&store)
            .apply_repayment(404, Money::from_major(5_000), &time)
            .unwrap_err();
        assert!(matches!(err, InvalidLoanError::LoanNotFound { loan_id: 404 }));
    }
}
