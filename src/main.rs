//! Loan desk console.
//!
//! Reads configuration from the environment, opens the database session once,
//! runs the menu until exit or end of input, then closes the session.

use std::io::{self, BufRead, Write};
use std::str::FromStr;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loan_desk_rs::{
    AppConfig, Customer, InvalidLoanError, Loan, LoanId, LoanStore, Money, Rate,
    RepaymentProcessor, SafeTimeProvider, Session, TimeSource,
};

fn main() -> Result<()> {
    let config = AppConfig::load().context("loading configuration")?;

    // RUST_LOG wins over the configured filter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let mut session = Session::open(&config.database).context("opening database")?;
    let outcome = run(&mut session);
    session.close().context("closing database")?;
    outcome
}

fn run(session: &mut Session) -> Result<()> {
    let stdin = io::stdin();
    let mut console = Console::new(stdin.lock());
    let mut store = LoanStore::new(session);
    let time = SafeTimeProvider::new(TimeSource::System);

    loop {
        println!("\nLoan Management System");
        println!("1. Apply for Loan");
        println!("2. Get All Loans");
        println!("3. Get Loan by ID");
        println!("4. Check Loan Status");
        println!("5. Calculate EMI");
        println!("6. Calculate Interest");
        println!("7. Show Repayment Schedule");
        println!("8. Make Loan Repayment");
        println!("9. Exit");

        let step = match console.ask::<u32>("Enter your choice: ") {
            Ok(9) => {
                println!("Exiting the system. Goodbye!");
                return Ok(());
            }
            Ok(choice) => dispatch(choice, &mut console, &mut store, &time),
            Err(e) => Err(e.into()),
        };

        if let Err(err) = step {
            if is_end_of_input(&err) {
                return Ok(());
            }
            match err.downcast_ref::<InvalidLoanError>() {
                Some(loan_err) => println!("Error: {}", loan_err),
                None => return Err(err),
            }
        }
    }
}

fn dispatch<R: BufRead>(
    choice: u32,
    console: &mut Console<R>,
    store: &mut LoanStore<'_>,
    time: &SafeTimeProvider,
) -> Result<()> {
    match choice {
        1 => apply_loan(console, store),
        2 => {
            let loans = store.get_all_loans()?;
            if loans.is_empty() {
                println!("No loans found.");
            }
            for loan in loans {
                println!("{}\n----------------------", loan);
            }
            Ok(())
        }
        3 => {
            let loan_id: LoanId = console.ask("Enter Loan ID: ")?;
            match store.get_loan_by_id(loan_id)? {
                Some(loan) => println!("{}", loan),
                None => println!("No loan found with ID: {}", loan_id),
            }
            Ok(())
        }
        4 => {
            let loan_id: LoanId = console.ask("Enter Loan ID: ")?;
            println!("Loan Status: {}", store.set_computed_status(loan_id)?);
            Ok(())
        }
        5 => {
            let loan_id: LoanId = console.ask("Enter Loan ID: ")?;
            println!("EMI for loan {}: {:.2} per month", loan_id, store.emi_for(loan_id)?);
            Ok(())
        }
        6 => {
            let loan_id: LoanId = console.ask("Enter Loan ID: ")?;
            println!("Interest for loan {}: {:.2}", loan_id, store.interest_for(loan_id)?);
            Ok(())
        }
        7 => {
            let loan_id: LoanId = console.ask("Enter Loan ID: ")?;
            let schedule = store.schedule_for(loan_id)?;
            println!("{:>4} {:>14} {:>12} {:>12} {:>14}", "#", "Opening", "Interest", "Principal", "Closing");
            for p in &schedule.payments {
                println!(
                    "{:>4} {:>14} {:>12} {:>12} {:>14}",
                    p.payment_number,
                    format!("{:.2}", p.beginning_balance),
                    format!("{:.2}", p.interest_portion),
                    format!("{:.2}", p.principal_portion),
                    format!("{:.2}", p.ending_balance),
                );
            }
            println!(
                "Total interest: {:.2}, total payable: {:.2}",
                schedule.total_interest, schedule.total_payment
            );
            Ok(())
        }
        8 => {
            let loan_id: LoanId = console.ask("Enter Loan ID: ")?;
            let amount: Money = console.ask("Enter Payment Amount: ")?;
            let receipt = RepaymentProcessor::new(store).apply_repayment(loan_id, amount, time)?;
            println!("Payment successful. {} EMIs paid.", receipt.emis_paid);
            if receipt.remainder.is_positive() {
                println!(
                    "Remaining amount: {:.2} will not be applied to next EMI.",
                    receipt.remainder
                );
            }
            Ok(())
        }
        _ => {
            println!("Invalid choice. Please try again.");
            Ok(())
        }
    }
}

fn apply_loan<R: BufRead>(console: &mut Console<R>, store: &mut LoanStore<'_>) -> Result<()> {
    println!("\nApply for Loan");
    println!("1. Home Loan");
    println!("2. Car Loan");
    let kind: u32 = console.ask("Enter loan type: ")?;

    let customer = Customer::new(
        console.ask("Enter Customer ID: ")?,
        console.line("Enter Name: ")?,
        console.line("Enter Email: ")?,
        console.line("Enter Phone: ")?,
        console.line("Enter Address: ")?,
        console.ask("Enter Credit Score: ")?,
    );

    let loan_id: LoanId = console.ask("Enter Loan ID: ")?;
    let builder = Loan::builder(loan_id, customer)
        .principal(console.ask("Enter Principal Amount: ")?)
        .rate(console.ask::<Rate>("Enter Interest Rate: ")?)
        .term_months(console.ask("Enter Loan Term (months): ")?);

    let builder = if kind == 1 {
        let address = console.line("Enter Property Address: ")?;
        builder.home(address, console.ask("Enter Property Value: ")?)
    } else {
        let model = console.line("Enter Car Model: ")?;
        builder.car(model, console.ask("Enter Car Value: ")?)
    };
    let loan = builder.build()?;

    let confirmation = console.line("Confirm loan application (yes/no): ")?;
    if !confirmation.eq_ignore_ascii_case("yes") {
        println!("Loan application cancelled.");
        return Ok(());
    }

    store.apply_loan(&loan)?;
    println!("Loan application submitted successfully. Status: {}", loan.loan_status);
    Ok(())
}

fn is_end_of_input(err: &anyhow::Error) -> bool {
    err.downcast_ref::<io::Error>()
        .map(|e| e.kind() == io::ErrorKind::UnexpectedEof)
        .unwrap_or(false)
}

/// line-oriented prompt over any buffered reader
struct Console<R> {
    input: R,
}

impl<R: BufRead> Console<R> {
    fn new(input: R) -> Self {
        Self { input }
    }

    /// one trimmed line; end of input is an `UnexpectedEof` error
    fn line(&mut self, label: &str) -> io::Result<String> {
        print!("{}", label);
        io::stdout().flush()?;

        let mut buf = String::new();
        if self.input.read_line(&mut buf)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
        }
        Ok(buf.trim().to_string())
    }

    /// re-prompts until the line parses
    fn ask<T: FromStr>(&mut self, label: &str) -> io::Result<T> {
        loop {
            let text = self.line(label)?;
            match text.parse() {
                Ok(value) => return Ok(value),
                Err(_) => println!("Please enter a valid value."),
            }
        }
    }
}
