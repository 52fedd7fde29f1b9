use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::CustomerId;

/// loan applicant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: CustomerId,
    pub name: String,
    pub email_address: String,
    pub phone_number: String,
    pub address: String,
    pub credit_score: i32,
}

impl Customer {
    pub fn new(
        customer_id: CustomerId,
        name: impl Into<String>,
        email_address: impl Into<String>,
        phone_number: impl Into<String>,
        address: impl Into<String>,
        credit_score: i32,
    ) -> Self {
        Self {
            customer_id,
            name: name.into(),
            email_address: email_address.into(),
            phone_number: phone_number.into(),
            address: address.into(),
            credit_score,
        }
    }
}

impl fmt::Display for Customer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Customer ID: {}", self.customer_id)?;
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "Email: {}", self.email_address)?;
        writeln!(f, "Phone: {}", self.phone_number)?;
        writeln!(f, "Address: {}", self.address)?;
        write!(f, "Credit Score: {}", self.credit_score)
    }
}
