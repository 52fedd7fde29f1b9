//! Loan arithmetic: simple interest and equated monthly installments.
//!
//! Both functions are pure and work on exact decimals. Nothing is rounded
//! here; presentation code decides how many places to show.

use rust_decimal::Decimal;

use crate::decimal::{Money, Rate};
use crate::errors::{InvalidLoanError, Result};
use crate::types::MAX_TERM_MONTHS;

/// `principal * annual_rate_percent * term_months / 1200`
pub fn simple_interest(principal: Money, annual_rate: Rate, term_months: u32) -> Result<Money> {
    principal
        .as_decimal()
        .checked_mul(annual_rate.as_percentage())
        .and_then(|v| v.checked_mul(Decimal::from(term_months)))
        .and_then(|v| v.checked_div(Decimal::from(1200)))
        .map(Money::from_decimal)
        .ok_or_else(|| InvalidLoanError::CalculationError {
            message: format!(
                "interest on {} at {} over {} months overflows",
                principal, annual_rate, term_months
            ),
        })
}

/// equated monthly installment
///
/// EMI = P * r * (1 + r)^n / ((1 + r)^n - 1) with r the monthly rate.
/// At a zero rate the formula degenerates, so the principal is split evenly.
pub fn emi(principal: Money, annual_rate: Rate, term_months: u32) -> Result<Money> {
    if term_months == 0 || term_months > MAX_TERM_MONTHS {
        return Err(InvalidLoanError::InvalidTerm { term_months });
    }

    let r = annual_rate.monthly_rate().as_decimal();
    if r.is_zero() {
        return Ok(principal / Decimal::from(term_months));
    }

    let compound = compound_factor(r, term_months)?;
    let denominator = compound - Decimal::ONE;
    if denominator.is_zero() {
        return Err(InvalidLoanError::CalculationError {
            message: format!("monthly rate {} too small to amortize over {} months", r, term_months),
        });
    }

    let numerator = principal
        .as_decimal()
        .checked_mul(r)
        .and_then(|v| v.checked_mul(compound))
        .ok_or_else(|| overflow(term_months))?;

    Ok(Money::from_decimal(numerator / denominator))
}

/// (1 + r)^n
fn compound_factor(r: Decimal, n: u32) -> Result<Decimal> {
    let base = Decimal::ONE + r;
    let mut compound = Decimal::ONE;
    for _ in 0..n {
        compound = compound.checked_mul(base).ok_or_else(|| overflow(n))?;
    }
    Ok(compound)
}

fn overflow(term_months: u32) -> InvalidLoanError {
    InvalidLoanError::CalculationError {
        message: format!("EMI overflows over {} months", term_months),
    }
}
