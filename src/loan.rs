use std::fmt;

use serde::{Deserialize, Serialize};

use crate::customer::Customer;
use crate::decimal::{Money, Rate};
use crate::errors::{InvalidLoanError, Result};
use crate::types::{LoanId, LoanStatus, CAR_LOAN_TAG, HOME_LOAN_TAG, MAX_TERM_MONTHS};

/// home loan extension fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeLoan {
    pub property_address: String,
    pub property_value: Money,
}

/// car loan extension fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarLoan {
    pub car_model: String,
    pub car_value: Money,
}

/// loan variant with its extension fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanDetails {
    /// no extension row; the tag is kept as stored
    Generic { loan_type: String },
    Home(HomeLoan),
    Car(CarLoan),
}

impl LoanDetails {
    /// discriminator written to the `loan_type` column
    pub fn tag(&self) -> &str {
        match self {
            LoanDetails::Generic { loan_type } => loan_type,
            LoanDetails::Home(_) => HOME_LOAN_TAG,
            LoanDetails::Car(_) => CAR_LOAN_TAG,
        }
    }
}

/// a loan and its owning customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub loan_id: LoanId,
    pub customer: Customer,
    pub principal_amount: Money,
    pub interest_rate: Rate,
    /// term in months
    pub loan_term: u32,
    pub loan_status: LoanStatus,
    pub details: LoanDetails,
}

impl Loan {
    /// builder for creating loans; a customer is always required
    pub fn builder(loan_id: LoanId, customer: Customer) -> LoanBuilder {
        LoanBuilder::new(loan_id, customer)
    }

    pub fn loan_type(&self) -> &str {
        self.details.tag()
    }

    pub fn home(&self) -> Option<&HomeLoan> {
        match &self.details {
            LoanDetails::Home(home) => Some(home),
            _ => None,
        }
    }

    pub fn car(&self) -> Option<&CarLoan> {
        match &self.details {
            LoanDetails::Car(car) => Some(car),
            _ => None,
        }
    }

    /// check the invariants a persisted loan must hold
    pub fn validate(&self) -> Result<()> {
        if !self.principal_amount.is_positive() {
            return Err(invalid(format!(
                "principal must be positive, got {}",
                self.principal_amount
            )));
        }
        if self.interest_rate.is_negative() {
            return Err(invalid(format!(
                "interest rate must not be negative, got {}",
                self.interest_rate
            )));
        }
        if self.loan_term == 0 || self.loan_term > MAX_TERM_MONTHS {
            return Err(InvalidLoanError::InvalidTerm {
                term_months: self.loan_term,
            });
        }

        match &self.details {
            LoanDetails::Generic { loan_type } => {
                if loan_type == HOME_LOAN_TAG || loan_type == CAR_LOAN_TAG {
                    return Err(invalid(format!(
                        "{} loans must carry their extension fields",
                        loan_type
                    )));
                }
            }
            LoanDetails::Home(home) => {
                if home.property_value.is_negative() {
                    return Err(invalid("property value must not be negative".to_string()));
                }
            }
            LoanDetails::Car(car) => {
                if car.car_value.is_negative() {
                    return Err(invalid("car value must not be negative".to_string()));
                }
            }
        }

        Ok(())
    }

    /// pretty JSON rendering
    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn invalid(message: String) -> InvalidLoanError {
    InvalidLoanError::InvalidLoan { message }
}

impl fmt::Display for Loan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Loan ID: {}", self.loan_id)?;
        writeln!(f, "Loan Type: {}", self.loan_type())?;
        writeln!(f, "Principal Amount: {}", self.principal_amount)?;
        writeln!(f, "Interest Rate: {}", self.interest_rate)?;
        writeln!(f, "Loan Term: {} months", self.loan_term)?;
        writeln!(f, "Loan Status: {}", self.loan_status)?;
        writeln!(f, "Customer Details:")?;
        write!(f, "{}", self.customer)?;

        match &self.details {
            LoanDetails::Generic { .. } => Ok(()),
            LoanDetails::Home(home) => {
                write!(
                    f,
                    "\nProperty Address: {}\nProperty Value: {}",
                    home.property_address, home.property_value
                )
            }
            LoanDetails::Car(car) => {
                write!(f, "\nCar Model: {}\nCar Value: {}", car.car_model, car.car_value)
            }
        }
    }
}

/// builder for [`Loan`]
pub struct LoanBuilder {
    loan_id: LoanId,
    customer: Customer,
    principal_amount: Option<Money>,
    interest_rate: Option<Rate>,
    loan_term: Option<u32>,
    loan_status: LoanStatus,
    details: Option<LoanDetails>,
}

impl LoanBuilder {
    pub fn new(loan_id: LoanId, customer: Customer) -> Self {
        Self {
            loan_id,
            customer,
            principal_amount: None,
            interest_rate: None,
            loan_term: None,
            loan_status: LoanStatus::Pending,
            details: None,
        }
    }

    pub fn principal(mut self, amount: Money) -> Self {
        self.principal_amount = Some(amount);
        self
    }

    pub fn rate(mut self, rate: Rate) -> Self {
        self.interest_rate = Some(rate);
        self
    }

    pub fn term_months(mut self, months: u32) -> Self {
        self.loan_term = Some(months);
        self
    }

    pub fn status(mut self, status: LoanStatus) -> Self {
        self.loan_status = status;
        self
    }

    pub fn home(mut self, property_address: impl Into<String>, property_value: Money) -> Self {
        self.details = Some(LoanDetails::Home(HomeLoan {
            property_address: property_address.into(),
            property_value,
        }));
        self
    }

    pub fn car(mut self, car_model: impl Into<String>, car_value: Money) -> Self {
        self.details = Some(LoanDetails::Car(CarLoan {
            car_model: car_model.into(),
            car_value,
        }));
        self
    }

    pub fn generic(mut self, loan_type: impl Into<String>) -> Self {
        self.details = Some(LoanDetails::Generic {
            loan_type: loan_type.into(),
        });
        self
    }

    pub fn build(self) -> Result<Loan> {
        let loan = Loan {
            loan_id: self.loan_id,
            customer: self.customer,
            principal_amount: self
                .principal_amount
                .ok_or_else(|| invalid("principal amount is required".to_string()))?,
            interest_rate: self
                .interest_rate
                .ok_or_else(|| invalid("interest rate is required".to_string()))?,
            loan_term: self
                .loan_term
                .ok_or_else(|| invalid("loan term is required".to_string()))?,
            loan_status: self.loan_status,
            details: self
                .details
                .ok_or_else(|| invalid("loan kind is required".to_string()))?,
        };

        loan.validate()?;
        Ok(loan)
    }
}
