//! Core domain models and logic for custvault
//!
//! This crate contains:
//! - Domain models (CustomerRecord, CustomerFields, form input)
//! - Protection policy (which field gets which protection)
//! - Field codec (plaintext <-> stored representation)

pub mod codec;
pub mod customer;
pub mod error;
pub mod policy;

pub use codec::FieldCodec;
pub use customer::{
    CustomerFields, CustomerForm, CustomerRecord, CustomerUpdate, Field, NewCustomer,
    StoredFields, now_timestamp, parse_customer_number,
};
pub use error::{Error, Result};
pub use policy::{ProtectionMode, ProtectionPolicy};
