use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::error::{Error, Result};

/// Mutable customer attributes that may carry a protection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    BirthDate,
    FirstName,
    LastName,
    SocialSecurityNumber,
    Address,
    Salary,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::BirthDate,
        Field::FirstName,
        Field::LastName,
        Field::SocialSecurityNumber,
        Field::Address,
        Field::Salary,
    ];

    /// Column name in the `customers` table.
    pub fn column(self) -> &'static str {
        match self {
            Field::BirthDate => "birth_date",
            Field::FirstName => "first_name",
            Field::LastName => "last_name",
            Field::SocialSecurityNumber => "social_security_number",
            Field::Address => "address",
            Field::Salary => "salary",
        }
    }

    /// Key used in form submissions and JSON bodies.
    pub fn form_key(self) -> &'static str {
        match self {
            Field::SocialSecurityNumber => "ssn",
            other => other.column(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerFields {
    pub birth_date: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "ssn")]
    pub social_security_number: String,
    pub address: String,
    pub salary: String,
}

impl CustomerFields {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::BirthDate => &self.birth_date,
            Field::FirstName => &self.first_name,
            Field::LastName => &self.last_name,
            Field::SocialSecurityNumber => &self.social_security_number,
            Field::Address => &self.address,
            Field::Salary => &self.salary,
        }
    }

    pub fn get_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::BirthDate => &mut self.birth_date,
            Field::FirstName => &mut self.first_name,
            Field::LastName => &mut self.last_name,
            Field::SocialSecurityNumber => &mut self.social_security_number,
            Field::Address => &mut self.address,
            Field::Salary => &mut self.salary,
        }
    }
}

/// Field values in their stored form: ciphertext or tokens in protected
/// columns, plaintext elsewhere.
///
/// Only [`crate::FieldCodec`] turns plaintext fields into stored fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFields(CustomerFields);

impl StoredFields {
    pub(crate) fn new(fields: CustomerFields) -> Self {
        Self(fields)
    }

    /// Wrap values exactly as they were read from a table row.
    pub fn from_row(fields: CustomerFields) -> Self {
        Self(fields)
    }

    pub fn get(&self, field: Field) -> &str {
        self.0.get(field)
    }

    /// The stored values, unmodified. Used for raw inspection.
    pub fn into_raw(self) -> CustomerFields {
        self.0
    }
}

/// A customer as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub customer_number: i64,
    pub create_date: String,
    #[serde(flatten)]
    pub fields: CustomerFields,
}

/// Input for creating a customer.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub fields: CustomerFields,
    pub create_date: Option<String>,
}

/// Input for updating a customer. `create_date` is not updatable.
#[derive(Debug, Clone)]
pub struct CustomerUpdate {
    pub customer_number: i64,
    pub fields: CustomerFields,
}

/// Form-encoded customer submission (`POST`/`PUT /customers`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerForm {
    pub cust_no: Option<String>,
    pub birth_date: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub ssn: Option<String>,
    pub address: Option<String>,
    pub salary: Option<String>,
    pub create_date: Option<String>,
}

impl CustomerForm {
    pub fn into_new_customer(self) -> Result<NewCustomer> {
        let create_date = self.create_date.clone().filter(|d| !d.trim().is_empty());
        Ok(NewCustomer {
            fields: self.into_fields()?,
            create_date,
        })
    }

    pub fn into_update(self) -> Result<CustomerUpdate> {
        let customer_number = parse_customer_number(self.cust_no.as_deref())?;
        Ok(CustomerUpdate {
            customer_number,
            fields: self.into_fields()?,
        })
    }

    fn into_fields(self) -> Result<CustomerFields> {
        let mut missing = Vec::new();
        let mut take = |value: Option<String>, key: &'static str| {
            value.unwrap_or_else(|| {
                missing.push(key);
                String::new()
            })
        };

        let fields = CustomerFields {
            birth_date: take(self.birth_date, "birth_date"),
            first_name: take(self.first_name, "first_name"),
            last_name: take(self.last_name, "last_name"),
            social_security_number: take(self.ssn, "ssn"),
            address: take(self.address, "address"),
            salary: take(self.salary, "salary"),
        };

        if missing.is_empty() {
            Ok(fields)
        } else {
            Err(Error::Validation(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )))
        }
    }
}

/// Parse the `cust_no` request argument.
pub fn parse_customer_number(raw: Option<&str>) -> Result<i64> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
        Error::Validation("cust_no is a required argument for the customer endpoint".to_string())
    })?;
    raw.parse::<i64>()
        .map_err(|_| Error::Validation(format!("cust_no must be an integer, got '{}'", raw)))
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS.ffffff`.
pub fn now_timestamp() -> Result<String> {
    let format =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]");
    OffsetDateTime::now_utc()
        .format(format)
        .map_err(|e| Error::Internal(format!("formatting timestamp: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn larry_form() -> CustomerForm {
        CustomerForm {
            cust_no: None,
            birth_date: Some("3/14/1969".to_string()),
            first_name: Some("Larry".to_string()),
            last_name: Some("Johnson".to_string()),
            ssn: Some("360-56-6750".to_string()),
            address: Some("Tyler, Texas".to_string()),
            salary: Some("7000000".to_string()),
            create_date: None,
        }
    }

    #[test]
    fn test_form_into_new_customer() {
        let new = larry_form().into_new_customer().unwrap();
        assert_eq!(new.fields.social_security_number, "360-56-6750");
        assert!(new.create_date.is_none());
    }

    #[test]
    fn test_form_reports_all_missing_fields() {
        let form = CustomerForm {
            ssn: None,
            salary: None,
            ..larry_form()
        };
        match form.into_new_customer() {
            Err(Error::Validation(msg)) => {
                assert!(msg.contains("ssn"));
                assert!(msg.contains("salary"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_update_requires_cust_no() {
        assert!(matches!(
            larry_form().into_update(),
            Err(Error::Validation(_))
        ));

        let form = CustomerForm {
            cust_no: Some("2".to_string()),
            ..larry_form()
        };
        assert_eq!(form.into_update().unwrap().customer_number, 2);
    }

    #[test]
    fn test_parse_customer_number() {
        assert_eq!(parse_customer_number(Some(" 40 ")).unwrap(), 40);
        assert!(parse_customer_number(None).is_err());
        assert!(parse_customer_number(Some("")).is_err());
        assert!(parse_customer_number(Some("1 OR 1=1")).is_err());
    }

    #[test]
    fn test_record_json_shape() {
        let record = CustomerRecord {
            customer_number: 2,
            create_date: "2020-01-01T14:49:12.301977".to_string(),
            fields: larry_form().into_new_customer().unwrap().fields,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["customer_number"], 2);
        assert_eq!(value["ssn"], "360-56-6750");
        assert_eq!(value["first_name"], "Larry");
        assert!(value.get("social_security_number").is_none());
    }

    #[test]
    fn test_now_timestamp_shape() {
        let ts = now_timestamp().unwrap();
        // 2024-05-01T12:34:56.123456
        assert_eq!(ts.len(), 26);
        assert_eq!(&ts[10..11], "T");
        assert_eq!(&ts[19..20], ".");
    }

    #[test]
    fn test_field_names() {
        assert_eq!(Field::SocialSecurityNumber.column(), "social_security_number");
        assert_eq!(Field::SocialSecurityNumber.form_key(), "ssn");
        assert_eq!(Field::Salary.form_key(), "salary");
    }
}
