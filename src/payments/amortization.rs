use rust_decimal::Decimal;

use crate::calculator;
use crate::decimal::{Money, Rate};
use crate::errors::Result;
use crate::types::LoanId;

/// one month of an amortization schedule
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledPayment {
    pub payment_number: u32,
    pub beginning_balance: Money,
    pub payment_amount: Money,
    pub principal_portion: Money,
    pub interest_portion: Money,
    pub ending_balance: Money,
    pub cumulative_interest: Money,
}

/// month-by-month preview of how EMIs retire a loan
#[derive(Debug, Clone)]
pub struct AmortizationSchedule {
    pub loan_id: Option<LoanId>,
    pub principal: Money,
    pub interest_rate: Rate,
    pub term_months: u32,
    pub emi: Money,
    pub payments: Vec<ScheduledPayment>,
    pub total_interest: Money,
    pub total_payment: Money,
}

impl AmortizationSchedule {
    /// generate payment schedule
    pub fn generate(principal: Money, interest_rate: Rate, term_months: u32) -> Result<Self> {
        let emi = calculator::emi(principal, interest_rate, term_months)?;
        let monthly_rate = interest_rate.monthly_rate().as_decimal();

        let mut payments = Vec::with_capacity(term_months as usize);
        let mut balance = principal;
        let mut cumulative_interest = Money::ZERO;

        for i in 1..=term_months {
            let interest_portion = Money::from_decimal(balance.as_decimal() * monthly_rate);
            let mut principal_portion = emi - interest_portion;
            let mut payment_amount = emi;

            // last payment absorbs whatever rounding residue is left
            if i == term_months {
                principal_portion = balance;
                payment_amount = balance + interest_portion;
            }

            cumulative_interest += interest_portion;
            let ending_balance = (balance - principal_portion).max(Money::ZERO);

            payments.push(ScheduledPayment {
                payment_number: i,
                beginning_balance: balance,
                payment_amount,
                principal_portion,
                interest_portion,
                ending_balance,
                cumulative_interest,
            });

            balance = ending_balance;
        }

        let total_payment = payments
            .iter()
            .map(|p| p.payment_amount)
            .fold(Money::ZERO, |acc, x| acc + x);

        Ok(Self {
            loan_id: None,
            principal,
            interest_rate,
            term_months,
            emi,
            payments,
            total_interest: cumulative_interest,
            total_payment,
        })
    }

    /// tag the schedule with the loan it was generated for
    pub fn for_loan(mut self, loan_id: LoanId) -> Self {
        self.loan_id = Some(loan_id);
        self
    }

    /// get payment for specific period (1-based)
    pub fn get_payment(&self, payment_number: u32) -> Option<&ScheduledPayment> {
        payment_number
            .checked_sub(1)
            .and_then(|idx| self.payments.get(idx as usize))
    }

    /// remaining balance after payment
    pub fn balance_after_payment(&self, payment_number: u32) -> Money {
        self.get_payment(payment_number)
            .map(|p| p.ending_balance)
            .unwrap_or(self.principal)
    }

    /// interest share of total repayment, as a fraction
    pub fn interest_share(&self) -> Decimal {
        if self.total_payment.is_zero() {
            return Decimal::ZERO;
        }
        self.total_interest.as_decimal() / self.total_payment.as_decimal()
    }
}
