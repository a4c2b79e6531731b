//! Customer CRUD composed with the field codec

use custvault_core::{
    CustomerFields, CustomerRecord, CustomerUpdate, FieldCodec, NewCustomer, StoredFields,
    now_timestamp,
};
use sqlx::any::AnyArguments;
use sqlx::query::Query;
use sqlx::{Any, FromRow};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::schema::{self, DatabaseKind, SEED_CUSTOMERS};
use crate::{Result, StorageError};

pub const DEFAULT_LIMIT: u32 = 50;

const SELECT_COLUMNS: &str = "SELECT cust_no, birth_date, first_name, last_name, create_date, \
     social_security_number, address, salary FROM customers";

const INSERT_CUSTOMER: &str = "INSERT INTO customers (birth_date, first_name, last_name, \
     social_security_number, address, salary, create_date) VALUES (?, ?, ?, ?, ?, ?, ?)";

const UPDATE_CUSTOMER: &str = "UPDATE customers SET birth_date = ?, first_name = ?, \
     last_name = ?, social_security_number = ?, address = ?, salary = ? WHERE cust_no = ?";

#[derive(Debug, FromRow)]
struct CustomerRow {
    cust_no: i64,
    birth_date: String,
    first_name: String,
    last_name: String,
    create_date: String,
    social_security_number: String,
    address: String,
    salary: String,
}

impl CustomerRow {
    fn split(self) -> (i64, String, StoredFields) {
        let fields = CustomerFields {
            birth_date: self.birth_date,
            first_name: self.first_name,
            last_name: self.last_name,
            social_security_number: self.social_security_number,
            address: self.address,
            salary: self.salary,
        };
        (self.cust_no, self.create_date, StoredFields::from_row(fields))
    }
}

/// Bind the six mutable columns in `INSERT`/`UPDATE` order.
fn bind_fields<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    stored: &StoredFields,
) -> Query<'q, Any, AnyArguments<'q>> {
    let raw = stored.clone().into_raw();
    query
        .bind(raw.birth_date)
        .bind(raw.first_name)
        .bind(raw.last_name)
        .bind(raw.social_security_number)
        .bind(raw.address)
        .bind(raw.salary)
}

pub struct CustomerRepository {
    db: Database,
    codec: Arc<FieldCodec>,
}

impl CustomerRepository {
    pub fn new(db: Database, codec: Arc<FieldCodec>) -> Self {
        Self { db, codec }
    }

    pub fn codec(&self) -> &FieldCodec {
        &self.codec
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Insert a customer. Protection happens before any SQL runs, so a
    /// gateway failure leaves the table untouched.
    pub async fn create(&self, new: NewCustomer) -> Result<CustomerRecord> {
        let create_date = match new.create_date {
            Some(date) => date,
            None => now_timestamp()?,
        };
        let stored = self.codec.protect(new.fields).await?;

        let id = match self.db.kind() {
            DatabaseKind::MySql => {
                let result = self
                    .db
                    .run("insert customer", |pool| {
                        let query = bind_fields(sqlx::query(INSERT_CUSTOMER), &stored)
                            .bind(create_date.clone());
                        async move { query.execute(&pool).await }
                    })
                    .await?;
                result.last_insert_id().ok_or_else(|| {
                    StorageError::Core(custvault_core::Error::Internal(
                        "database did not report the new customer number".to_string(),
                    ))
                })?
            }
            // the Any driver never reports a SQLite rowid
            DatabaseKind::Sqlite => {
                let sql = format!("{} RETURNING cust_no", INSERT_CUSTOMER);
                self.db
                    .run("insert customer", |pool| {
                        let raw = stored.clone().into_raw();
                        let query = sqlx::query_scalar::<_, i64>(&sql)
                            .bind(raw.birth_date)
                            .bind(raw.first_name)
                            .bind(raw.last_name)
                            .bind(raw.social_security_number)
                            .bind(raw.address)
                            .bind(raw.salary)
                            .bind(create_date.clone());
                        async move { query.fetch_one(&pool).await }
                    })
                    .await?
            }
        };
        info!(customer_number = id, "Created customer");

        self.read(id).await
    }

    pub async fn read(&self, id: i64) -> Result<CustomerRecord> {
        let sql = format!("{} WHERE cust_no = ?", SELECT_COLUMNS);
        let row = self
            .db
            .run("select customer", |pool| {
                let query = sqlx::query_as::<_, CustomerRow>(&sql).bind(id);
                async move { query.fetch_optional(&pool).await }
            })
            .await?
            .ok_or(StorageError::NotFound(id))?;

        let (customer_number, create_date, stored) = row.split();
        let fields = self.codec.unprotect(stored).await?;
        Ok(CustomerRecord {
            customer_number,
            create_date,
            fields,
        })
    }

    /// Up to `limit` customers ordered by number, fresh from the table on
    /// every call.
    ///
    /// With `raw` the stored values are returned as-is. Otherwise a record
    /// that cannot be unprotected is logged and left out of the result; it
    /// does not fail the batch.
    pub async fn read_all(&self, limit: u32, raw: bool) -> Result<Vec<CustomerRecord>> {
        let sql = format!("{} ORDER BY cust_no LIMIT ?", SELECT_COLUMNS);
        let rows = self
            .db
            .run("select customers", |pool| {
                let query = sqlx::query_as::<_, CustomerRow>(&sql).bind(i64::from(limit));
                async move { query.fetch_all(&pool).await }
            })
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let (customer_number, create_date, stored) = row.split();
            let fields = if raw {
                stored.into_raw()
            } else {
                match self.codec.unprotect(stored).await {
                    Ok(fields) => fields,
                    Err(e) => {
                        warn!(
                            customer_number,
                            error = %e,
                            "Skipping record that could not be unprotected"
                        );
                        continue;
                    }
                }
            };
            records.push(CustomerRecord {
                customer_number,
                create_date,
                fields,
            });
        }

        debug!(count = records.len(), raw, "Read customers");
        Ok(records)
    }

    /// Replace every mutable field of an existing customer.
    pub async fn update(&self, update: CustomerUpdate) -> Result<CustomerRecord> {
        let id = update.customer_number;
        let stored = self.codec.protect(update.fields).await?;

        self.db
            .run("update customer", |pool| {
                let query = bind_fields(sqlx::query(UPDATE_CUSTOMER), &stored).bind(id);
                async move { query.execute(&pool).await }
            })
            .await?;

        let record = self.read(id).await?;
        info!(customer_number = id, "Updated customer");
        Ok(record)
    }

    /// Insert the demo customers unless rows with their numbers already
    /// exist. Values go through the codec like any other write.
    pub async fn seed_demo_customers(&self) -> Result<()> {
        let sql = schema::seed_statement(self.db.kind());
        for (id, birth, first, last, created, ssn, address, salary) in SEED_CUSTOMERS {
            let fields = CustomerFields {
                birth_date: birth.to_string(),
                first_name: first.to_string(),
                last_name: last.to_string(),
                social_security_number: ssn.to_string(),
                address: address.to_string(),
                salary: salary.to_string(),
            };
            let stored = self.codec.protect(fields).await?;

            self.db
                .run("seed customer", |pool| {
                    let query = bind_fields(sqlx::query(&sql).bind(id), &stored).bind(created);
                    async move { query.execute(&pool).await }
                })
                .await?;
        }
        info!(rows = SEED_CUSTOMERS.len(), "Seeded demo customers");
        Ok(())
    }
}
