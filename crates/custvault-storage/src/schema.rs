//! `customers` table definition and demo seed rows

use tracing::info;

use crate::db::Database;
use crate::{Result, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    MySql,
    Sqlite,
}

const MYSQL_CUSTOMERS: &str = r#"
CREATE TABLE IF NOT EXISTS `customers` (
    `cust_no` bigint NOT NULL AUTO_INCREMENT,
    `birth_date` varchar(255) NOT NULL,
    `first_name` varchar(255) NOT NULL,
    `last_name` varchar(255) NOT NULL,
    `create_date` varchar(255) NOT NULL,
    `social_security_number` varchar(255) NOT NULL,
    `address` varchar(255) NOT NULL,
    `salary` varchar(255) NOT NULL,
    PRIMARY KEY (`cust_no`)
) ENGINE=InnoDB
"#;

const SQLITE_CUSTOMERS: &str = r#"
CREATE TABLE IF NOT EXISTS customers (
    cust_no INTEGER PRIMARY KEY AUTOINCREMENT,
    birth_date TEXT NOT NULL,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    create_date TEXT NOT NULL,
    social_security_number TEXT NOT NULL,
    address TEXT NOT NULL,
    salary TEXT NOT NULL
)
"#;

/// Demo rows as plaintext; they are protected on the way in like any other
/// record.
pub const SEED_CUSTOMERS: [(i64, &str, &str, &str, &str, &str, &str, &str); 3] = [
    (
        2,
        "3/14/1969",
        "Larry",
        "Johnson",
        "2020-01-01T14:49:12.301977",
        "360-56-6750",
        "Tyler, Texas",
        "7000000",
    ),
    (
        40,
        "11/26/1969",
        "Shawn",
        "Kemp",
        "2020-02-21T10:24:55.985726",
        "235-32-8091",
        "Elkhart, Indiana",
        "15000000",
    ),
    (
        34,
        "2/20/1963",
        "Charles",
        "Barkley",
        "2019-04-09T01:10:20.548144",
        "531-72-1553",
        "Leeds, Alabama",
        "9000000",
    ),
];

impl DatabaseKind {
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url.split(':').next().unwrap_or_default();
        match scheme {
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(StorageError::UnsupportedUrl(other.to_string())),
        }
    }

    fn create_table(self) -> &'static str {
        match self {
            Self::MySql => MYSQL_CUSTOMERS,
            Self::Sqlite => SQLITE_CUSTOMERS,
        }
    }

    fn insert_ignore(self) -> &'static str {
        match self {
            Self::MySql => "INSERT IGNORE",
            Self::Sqlite => "INSERT OR IGNORE",
        }
    }
}

/// Create the `customers` table if missing.
pub async fn prepare(db: &Database) -> Result<()> {
    let kind = db.kind();
    info!("Preparing customer table");
    db.run("create customers table", |pool| async move {
        sqlx::raw_sql(kind.create_table()).execute(&pool).await
    })
    .await?;
    Ok(())
}

/// Insert with an explicit `cust_no`, skipping rows that already exist.
pub(crate) fn seed_statement(kind: DatabaseKind) -> String {
    format!(
        "{} INTO customers (cust_no, birth_date, first_name, last_name, \
         social_security_number, address, salary, create_date) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        kind.insert_ignore()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_url() {
        assert_eq!(
            DatabaseKind::from_url("mysql://u:p@localhost:3306/my_app").unwrap(),
            DatabaseKind::MySql
        );
        assert_eq!(
            DatabaseKind::from_url("sqlite:///tmp/x.db?mode=rwc").unwrap(),
            DatabaseKind::Sqlite
        );
        assert!(DatabaseKind::from_url("postgres://localhost/db").is_err());
    }

    #[test]
    fn test_seed_statement_ignores_existing_rows() {
        assert!(seed_statement(DatabaseKind::MySql).starts_with("INSERT IGNORE INTO"));
        assert!(seed_statement(DatabaseKind::Sqlite).starts_with("INSERT OR IGNORE INTO"));
    }
}
