//! HTTP surface for custvault
//!
//! Routes:
//! - `GET /customers` - list records (`limit`, `raw`)
//! - `GET /customer?cust_no=N` - one record
//! - `POST /customers` - create from form fields
//! - `PUT /customers` - update from form fields
//! - `GET /health` - name, version and protection state

mod error;
mod server;

pub use error::ApiError;
pub use server::{AppContext, CustomerServer, router};
