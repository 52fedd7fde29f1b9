//! Loan persistence.
//!
//! A loan is one `Loan` row joined to its `Customer`, plus at most one
//! extension row (`HomeLoan` or `CarLoan`) chosen by the `loan_type`
//! discriminator. Reads join base and customer first, then do a single
//! point lookup into the extension table the tag names.

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use crate::calculator;
use crate::customer::Customer;
use crate::db::Session;
use crate::decimal::{Money, Rate};
use crate::errors::{db_err, InvalidLoanError, Result};
use crate::loan::{CarLoan, HomeLoan, Loan, LoanDetails};
use crate::payments::AmortizationSchedule;
use crate::types::{LoanId, LoanStatus, CAR_LOAN_TAG, HOME_LOAN_TAG};

const LOAN_SELECT: &str = "
    SELECT l.loan_id, l.principal_amount, l.interest_rate, l.loan_term,
           l.loan_type, l.loan_status,
           c.customer_id, c.name, c.email_address, c.phone_number,
           c.address, c.credit_score
    FROM Loan l
    JOIN Customer c ON l.customer_id = c.customer_id";

/// which extension table a discriminator points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extension {
    Home,
    Car,
    Base,
}

impl Extension {
    fn for_tag(tag: &str) -> Self {
        match tag {
            HOME_LOAN_TAG => Extension::Home,
            CAR_LOAN_TAG => Extension::Car,
            _ => Extension::Base,
        }
    }
}

/// base row joined with its customer
struct LoanRow {
    loan_id: LoanId,
    principal_amount: Money,
    interest_rate: Rate,
    loan_term: u32,
    loan_type: String,
    loan_status: String,
    customer: Customer,
}

impl LoanRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            loan_id: row.get(0)?,
            principal_amount: row.get(1)?,
            interest_rate: row.get(2)?,
            loan_term: row.get(3)?,
            loan_type: row.get(4)?,
            loan_status: row.get(5)?,
            customer: Customer {
                customer_id: row.get(6)?,
                name: row.get(7)?,
                email_address: row.get(8)?,
                phone_number: row.get(9)?,
                address: row.get(10)?,
                credit_score: row.get(11)?,
            },
        })
    }
}

/// Persistence for customers and loans over a borrowed session.
///
/// The store never opens or closes the session it is given.
pub struct LoanStore<'s> {
    session: &'s mut Session,
}

impl<'s> LoanStore<'s> {
    pub fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    fn conn(&self) -> &Connection {
        self.session.connection()
    }

    /// Persist a new loan application.
    ///
    /// Customer upsert, base row and extension row commit together or not at
    /// all.
    pub fn apply_loan(&mut self, loan: &Loan) -> Result<()> {
        loan.validate()?;

        let loan_id = loan.loan_id;
        let tx = self
            .session
            .connection_mut()
            .transaction()
            .map_err(db_err(format!("starting application for loan {}", loan_id)))?;

        match write_loan(&tx, loan) {
            Ok(()) => {
                tx.commit()
                    .map_err(db_err(format!("committing application for loan {}", loan_id)))?;
                tracing::info!(
                    loan_id,
                    customer_id = loan.customer.customer_id,
                    loan_type = loan.loan_type(),
                    "loan application stored"
                );
                Ok(())
            }
            Err(err) => {
                tracing::warn!(loan_id, error = %err, "loan application rolled back");
                if let Err(rollback_err) = tx.rollback() {
                    tracing::error!(loan_id, error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Loan by id, or `None` when no such loan exists.
    pub fn get_loan_by_id(&self, loan_id: LoanId) -> Result<Option<Loan>> {
        let sql = format!("{} WHERE l.loan_id = ?1", LOAN_SELECT);
        let row = self
            .conn()
            .query_row(&sql, params![loan_id], LoanRow::from_row)
            .optional()
            .map_err(db_err(format!("reading loan {}", loan_id)))?;

        match row {
            Some(row) => self.reconstruct(row).map(Some),
            None => {
                tracing::debug!(loan_id, "loan not found");
                Ok(None)
            }
        }
    }

    /// Every stored loan. Callers must not rely on the order.
    pub fn get_all_loans(&self) -> Result<Vec<Loan>> {
        let sql = format!("{} ORDER BY l.loan_id", LOAN_SELECT);
        let mut stmt = self
            .conn()
            .prepare(&sql)
            .map_err(db_err("preparing loan listing"))?;
        let rows = stmt
            .query_map([], LoanRow::from_row)
            .map_err(db_err("listing loans"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("listing loans"))?;

        tracing::debug!(count = rows.len(), "loans listed");
        rows.into_iter().map(|row| self.reconstruct(row)).collect()
    }

    /// Decide approval from the customer's credit score and persist it.
    pub fn set_computed_status(&self, loan_id: LoanId) -> Result<LoanStatus> {
        let loan = self.require_loan(loan_id)?;
        let status = LoanStatus::decide(loan.customer.credit_score);

        let updated = self
            .conn()
            .execute(
                "UPDATE Loan SET loan_status = ?1 WHERE loan_id = ?2",
                params![status.as_str(), loan_id],
            )
            .map_err(db_err(format!("updating status of loan {}", loan_id)))?;
        if updated == 0 {
            return Err(InvalidLoanError::LoanNotFound { loan_id });
        }

        tracing::info!(
            loan_id,
            credit_score = loan.customer.credit_score,
            status = status.as_str(),
            "loan status updated"
        );
        Ok(status)
    }

    /// simple interest over the full term of a stored loan
    pub fn interest_for(&self, loan_id: LoanId) -> Result<Money> {
        let loan = self.require_loan(loan_id)?;
        calculator::simple_interest(loan.principal_amount, loan.interest_rate, loan.loan_term)
    }

    /// EMI of a stored loan
    pub fn emi_for(&self, loan_id: LoanId) -> Result<Money> {
        let loan = self.require_loan(loan_id)?;
        calculator::emi(loan.principal_amount, loan.interest_rate, loan.loan_term)
    }

    /// amortization preview of a stored loan
    pub fn schedule_for(&self, loan_id: LoanId) -> Result<AmortizationSchedule> {
        let loan = self.require_loan(loan_id)?;
        AmortizationSchedule::generate(loan.principal_amount, loan.interest_rate, loan.loan_term)
            .map(|schedule| schedule.for_loan(loan_id))
    }

    fn require_loan(&self, loan_id: LoanId) -> Result<Loan> {
        self.get_loan_by_id(loan_id)?
            .ok_or(InvalidLoanError::LoanNotFound { loan_id })
    }

    fn reconstruct(&self, row: LoanRow) -> Result<Loan> {
        let loan_id = row.loan_id;
        let loan_status = row
            .loan_status
            .parse::<LoanStatus>()
            .map_err(|e| InvalidLoanError::CorruptRecord {
                loan_id,
                message: e.to_string(),
            })?;

        let details = match Extension::for_tag(&row.loan_type) {
            Extension::Home => LoanDetails::Home(self.home_extension(loan_id)?),
            Extension::Car => LoanDetails::Car(self.car_extension(loan_id)?),
            Extension::Base => LoanDetails::Generic {
                loan_type: row.loan_type,
            },
        };

        Ok(Loan {
            loan_id,
            customer: row.customer,
            principal_amount: row.principal_amount,
            interest_rate: row.interest_rate,
            loan_term: row.loan_term,
            loan_status,
            details,
        })
    }

    fn home_extension(&self, loan_id: LoanId) -> Result<HomeLoan> {
        self.conn()
            .query_row(
                "SELECT property_address, property_value FROM HomeLoan WHERE loan_id = ?1",
                params![loan_id],
                |row| {
                    Ok(HomeLoan {
                        property_address: row.get(0)?,
                        property_value: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(db_err(format!("reading home loan {}", loan_id)))?
            .ok_or_else(|| missing_extension(loan_id, HOME_LOAN_TAG))
    }

    fn car_extension(&self, loan_id: LoanId) -> Result<CarLoan> {
        self.conn()
            .query_row(
                "SELECT car_model, car_value FROM CarLoan WHERE loan_id = ?1",
                params![loan_id],
                |row| {
                    Ok(CarLoan {
                        car_model: row.get(0)?,
                        car_value: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(db_err(format!("reading car loan {}", loan_id)))?
            .ok_or_else(|| missing_extension(loan_id, CAR_LOAN_TAG))
    }
}

fn missing_extension(loan_id: LoanId, table: &str) -> InvalidLoanError {
    InvalidLoanError::CorruptRecord {
        loan_id,
        message: format!("tagged {} but has no {} row", table, table),
    }
}

/// the three statements of a loan application, inside the caller's transaction
fn write_loan(tx: &Transaction<'_>, loan: &Loan) -> Result<()> {
    let loan_id = loan.loan_id;
    let customer = &loan.customer;

    tx.execute(
        "INSERT INTO Customer (customer_id, name, email_address, phone_number, address, credit_score)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (customer_id) DO UPDATE SET
             name = excluded.name,
             email_address = excluded.email_address,
             phone_number = excluded.phone_number,
             address = excluded.address,
             credit_score = excluded.credit_score",
        params![
            customer.customer_id,
            customer.name,
            customer.email_address,
            customer.phone_number,
            customer.address,
            customer.credit_score,
        ],
    )
    .map_err(db_err(format!("upserting customer {}", customer.customer_id)))?;

    tx.execute(
        "INSERT INTO Loan (loan_id, customer_id, principal_amount, interest_rate, loan_term, loan_type, loan_status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            loan_id,
            customer.customer_id,
            loan.principal_amount,
            loan.interest_rate,
            loan.loan_term,
            loan.loan_type(),
            loan.loan_status.as_str(),
        ],
    )
    .map_err(db_err(format!("inserting loan {}", loan_id)))?;

    match &loan.details {
        LoanDetails::Home(home) => {
            tx.execute(
                "INSERT INTO HomeLoan (loan_id, property_address, property_value) VALUES (?1, ?2, ?3)",
                params![loan_id, home.property_address, home.property_value],
            )
            .map_err(db_err(format!("inserting home loan {}", loan_id)))?;
        }
        LoanDetails::Car(car) => {
            tx.execute(
                "INSERT INTO CarLoan (loan_id, car_model, car_value) VALUES (?1, ?2, ?3)",
                params![loan_id, car.car_model, car.car_value],
            )
            .map_err(db_err(format!("inserting car loan {}", loan_id)))?;
        }
        LoanDetails::Generic { .. } => {}
    }

    tracing::debug!(loan_id, "loan rows written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn customer(id: i64, credit_score: i32) -> Customer {
        Customer::new(
            id,
            "Anil Mehta",
            "anil@example.com",
            "555-0110",
            "3 Station Rd",
            credit_score,
        )
    }

    fn home_loan(loan_id: LoanId, customer: Customer) -> Loan {
        Loan::builder(loan_id, customer)
            .principal(Money::from_str_exact("2500000.50").unwrap())
            .rate(Rate::from_percentage(dec!(8.5)))
            .term_months(240)
            .home("22 Palm Ave, Pune", Money::from_major(4_000_000))
            .build()
            .unwrap()
    }

    fn car_loan(loan_id: LoanId, customer: Customer, model: &str) -> Loan {
        Loan::builder(loan_id, customer)
            .principal(Money::from_major(600_000))
            .rate(Rate::from_percentage(dec!(9.25)))
            .term_months(60)
            .car(model, Money::from_major(750_000))
            .build()
            .unwrap()
    }

    fn count(session: &Session, table: &str) -> i64 {
        session
            .connection()
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_home_loan_round_trip() {
        let mut session = Session::in_memory().unwrap();
        let mut store = LoanStore::new(&mut session);
        let loan = home_loan(1, customer(100, 700));

        store.apply_loan(&loan).unwrap();
        let read = store.get_loan_by_id(1).unwrap().unwrap();

        assert_eq!(read.loan_type(), "HomeLoan");
        let home = read.home().unwrap();
        assert_eq!(home.property_address, "22 Palm Ave, Pune");
        assert_eq!(home.property_value, Money::from_major(4_000_000));
        assert_eq!(read.principal_amount, Money::from_str_exact("2500000.50").unwrap());
        assert_eq!(read.loan_status, LoanStatus::Pending);
        assert_eq!(read, loan);
    }

    #[test]
    fn test_car_loan_round_trip() {
        let mut session = Session::in_memory().unwrap();
        let mut store = LoanStore::new(&mut session);
        let loan = car_loan(2, customer(100, 700), "Nexon EV");

        store.apply_loan(&loan).unwrap();
        let read = store.get_loan_by_id(2).unwrap().unwrap();

        assert_eq!(read.loan_type(), "CarLoan");
        assert_eq!(read.car().unwrap().car_model, "Nexon EV");
        assert_eq!(read.car().unwrap().car_value, Money::from_major(750_000));
        assert_eq!(read.interest_rate, Rate::from_percentage(dec!(9.25)));
    }

    #[test]
    fn test_generic_loan_keeps_its_tag() {
        let mut session = Session::in_memory().unwrap();
        let mut store = LoanStore::new(&mut session);
        let loan = Loan::builder(3, customer(100, 700))
            .principal(Money::from_major(50_000))
            .rate(Rate::from_percentage(dec!(14)))
            .term_months(24)
            .generic("PersonalLoan")
            .build()
            .unwrap();

        store.apply_loan(&loan).unwrap();
        let read = store.get_loan_by_id(3).unwrap().unwrap();

        assert_eq!(read.loan_type(), "PersonalLoan");
        assert!(read.home().is_none() && read.car().is_none());
    }

    #[test]
    fn test_unknown_loan_is_none() {
        let mut session = Session::in_memory().unwrap();
        let store = LoanStore::new(&mut session);

        assert!(store.get_loan_by_id(42).unwrap().is_none());
        assert!(store.get_all_loans().unwrap().is_empty());
    }

    #[test]
    fn test_reads_are_fresh_equal_values() {
        let mut session = Session::in_memory().unwrap();
        let mut store = LoanStore::new(&mut session);
        store.apply_loan(&home_loan(1, customer(100, 700))).unwrap();

        let mut first = store.get_loan_by_id(1).unwrap().unwrap();
        let second = store.get_loan_by_id(1).unwrap().unwrap();
        assert_eq!(first, second);

        first.customer.name = "changed".to_string();
        assert_eq!(store.get_loan_by_id(1).unwrap().unwrap(), second);
    }

    #[test]
    fn test_get_all_loans_reconstructs_each_variant() {
        let mut session = Session::in_memory().unwrap();
        let mut store = LoanStore::new(&mut session);
        store.apply_loan(&home_loan(1, customer(100, 700))).unwrap();
        store.apply_loan(&car_loan(2, customer(101, 640), "City ZX")).unwrap();
        store
            .apply_loan(
                &Loan::builder(3, customer(100, 700))
                    .principal(Money::from_major(10_000))
                    .rate(Rate::from_percentage(dec!(11)))
                    .term_months(12)
                    .generic("EducationLoan")
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let loans = store.get_all_loans().unwrap();
        assert_eq!(loans.len(), 3);

        let mut tags: Vec<&str> = loans.iter().map(|l| l.loan_type()).collect();
        tags.sort();
        assert_eq!(tags, vec!["CarLoan", "EducationLoan", "HomeLoan"]);

        let car = loans.iter().find(|l| l.loan_id == 2).unwrap();
        assert_eq!(car.car().unwrap().car_model, "City ZX");
        assert_eq!(car.customer.credit_score, 640);
    }

    #[test]
    fn test_customer_upsert_overwrites_contact_fields() {
        let mut session = Session::in_memory().unwrap();
        let mut store = LoanStore::new(&mut session);
        store.apply_loan(&home_loan(1, customer(100, 600))).unwrap();

        let updated = Customer::new(100, "Anil Mehta", "anil@new.example", "555-0999", "8 Ring Rd", 720);
        store.apply_loan(&car_loan(2, updated.clone(), "Creta")).unwrap();

        let first = store.get_loan_by_id(1).unwrap().unwrap();
        assert_eq!(first.customer, updated);
        drop(store);
        assert_eq!(count(&session, "Customer"), 1);
    }

    #[test]
    fn test_failed_extension_insert_rolls_back_everything() {
        let mut session = Session::in_memory().unwrap();
        let mut store = LoanStore::new(&mut session);

        // empty car model violates the CarLoan check constraint
        let err = store.apply_loan(&car_loan(5, customer(200, 700), "")).unwrap_err();
        assert!(err.is_data_access());

        assert!(store.get_loan_by_id(5).unwrap().is_none());
        drop(store);
        assert_eq!(count(&session, "Customer"), 0);
        assert_eq!(count(&session, "Loan"), 0);
    }

    #[test]
    fn test_failed_application_keeps_previous_customer() {
        let mut session = Session::in_memory().unwrap();
        let mut store = LoanStore::new(&mut session);
        store.apply_loan(&home_loan(1, customer(100, 700))).unwrap();

        let renamed = Customer::new(100, "Someone Else", "else@example.com", "1", "x", 300);
        assert!(store.apply_loan(&car_loan(2, renamed, "")).is_err());

        let loan = store.get_loan_by_id(1).unwrap().unwrap();
        assert_eq!(loan.customer, customer(100, 700));
        assert!(store.get_loan_by_id(2).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_loan_id_rejected() {
        let mut session = Session::in_memory().unwrap();
        let mut store = LoanStore::new(&mut session);
        let loan = home_loan(1, customer(100, 700));

        store.apply_loan(&loan).unwrap();
        let err = store.apply_loan(&loan).unwrap_err();

        assert!(err.is_data_access());
        assert!(err.to_string().contains("inserting loan 1"));
        assert_eq!(store.get_all_loans().unwrap().len(), 1);
    }

    #[test]
    fn test_status_decision_persists() {
        let mut session = Session::in_memory().unwrap();
        let mut store = LoanStore::new(&mut session);
        store.apply_loan(&home_loan(1, customer(100, 651))).unwrap();
        store.apply_loan(&car_loan(2, customer(101, 650), "Alto")).unwrap();

        assert_eq!(store.set_computed_status(1).unwrap(), LoanStatus::Approved);
        assert_eq!(store.set_computed_status(2).unwrap(), LoanStatus::Rejected);

        assert_eq!(store.get_loan_by_id(1).unwrap().unwrap().loan_status, LoanStatus::Approved);
        assert_eq!(store.get_loan_by_id(2).unwrap().unwrap().loan_status, LoanStatus::Rejected);
    }

    #[test]
    fn test_lookup_operations_reject_unknown_loan() {
        let mut session = Session::in_memory().unwrap();
        let store = LoanStore::new(&mut session);

        assert!(matches!(
            store.set_computed_status(9),
            Err(InvalidLoanError::LoanNotFound { loan_id: 9 })
        ));
        assert!(matches!(
            store.interest_for(9),
            Err(InvalidLoanError::LoanNotFound { loan_id: 9 })
        ));
        assert!(matches!(
            store.emi_for(9),
            Err(InvalidLoanError::LoanNotFound { loan_id: 9 })
        ));
        assert!(store.schedule_for(9).is_err());
    }

    #[test]
    fn test_interest_and_emi_for_stored_loan() {
        let mut session = Session::in_memory().unwrap();
        let mut store = LoanStore::new(&mut session);
        let loan = Loan::builder(7, customer(100, 700))
            .principal(Money::from_major(100_000))
            .rate(Rate::from_percentage(dec!(10)))
            .term_months(12)
            .generic("PersonalLoan")
            .build()
            .unwrap();
        store.apply_loan(&loan).unwrap();

        assert_eq!(store.interest_for(7).unwrap(), Money::from_major(10_000));
        assert_eq!(
            store.emi_for(7).unwrap().round_dp(2),
            Money::from_str_exact("8791.59").unwrap()
        );

        let schedule = store.schedule_for(7).unwrap();
        assert_eq!(schedule.loan_id, Some(7));
        assert_eq!(schedule.payments.len(), 12);
    }

    #[test]
    fn test_oversized_loans_fail_without_panicking() {
        let mut session = Session::in_memory().unwrap();
        session
            .connection()
            .execute_batch(
                "INSERT INTO Customer VALUES (1, 'Dev', 'd@example.com', '555', 'Lane 1', 700);
                 INSERT INTO Loan VALUES (8, 1, '1000', '0', 4294967295, 'PersonalLoan', 'Pending');",
            )
            .unwrap();
        let mut store = LoanStore::new(&mut session);

        assert!(matches!(
            store.schedule_for(8),
            Err(InvalidLoanError::InvalidTerm { .. })
        ));

        let loan = Loan::builder(7, customer(100, 700))
            .principal(Money::from_str_exact("1000000000000000000000000000").unwrap())
            .rate(Rate::from_percentage(dec!(10)))
            .term_months(12)
            .generic("PersonalLoan")
            .build()
            .unwrap();
        store.apply_loan(&loan).unwrap();
        assert!(matches!(
            store.interest_for(7),
            Err(InvalidLoanError::CalculationError { .. })
        ));
    }

    #[test]
    fn test_tag_without_extension_row_is_corrupt() {
        let mut session = Session::in_memory().unwrap();
        session
            .connection()
            .execute_batch(
                "INSERT INTO Customer VALUES (1, 'Dev', 'd@example.com', '555', 'Lane 1', 700);
                 INSERT INTO Loan VALUES (9, 1, '1000', '10', 12, 'HomeLoan', 'Pending');",
            )
            .unwrap();
        let store = LoanStore::new(&mut session);

        let err = store.get_loan_by_id(9).unwrap_err();
        assert!(matches!(err, InvalidLoanError::CorruptRecord { loan_id: 9, .. }));
        assert!(store.get_all_loans().is_err());
    }

    #[test]
    fn test_invalid_loan_never_reaches_the_database() {
        let mut session = Session::in_memory().unwrap();
        let mut store = LoanStore::new(&mut session);
        let mut loan = home_loan(1, customer(100, 700));
        loan.details = LoanDetails::Generic {
            loan_type: "CarLoan".to_string(),
        };

        assert!(matches!(
            store.apply_loan(&loan),
            Err(InvalidLoanError::InvalidLoan { .. })
        ));
        drop(store);
        assert_eq!(count(&session, "Customer"), 0);
    }
}
