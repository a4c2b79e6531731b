//! Connection pool with a single reconnect-and-retry on connection loss

use custvault_gateway::DatabaseCredential;
use sqlx::any::{AnyConnectOptions, AnyPoolOptions};
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{AnyPool, ConnectOptions, Connection};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::schema::DatabaseKind;
use crate::{Result, StorageError};

/// Where to connect.
pub enum DatabaseTarget {
    /// A complete sqlx URL (`mysql://...`, `sqlite://...`).
    Url(String),
    /// A MySQL server plus a credential issued by the secrets gateway. The
    /// database is created if missing.
    MySql {
        host: String,
        port: u16,
        database: String,
        credential: DatabaseCredential,
    },
}

/// Shared pool handle. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

struct Inner {
    /// (generation, pool); the generation bumps on every reconnect
    pool: RwLock<(u64, AnyPool)>,
    options: AnyConnectOptions,
    max_connections: u32,
    kind: DatabaseKind,
}

impl Database {
    pub async fn connect(target: DatabaseTarget, max_connections: u32) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let (kind, options) = match target {
            DatabaseTarget::Url(url) => {
                let kind = DatabaseKind::from_url(&url)?;
                (kind, AnyConnectOptions::from_str(&url)?)
            }
            DatabaseTarget::MySql {
                host,
                port,
                database,
                credential,
            } => {
                let server = MySqlConnectOptions::new()
                    .host(&host)
                    .port(port)
                    .username(&credential.username)
                    .password(credential.password());
                create_mysql_database(&server, &database).await?;
                let url = server.database(&database).to_url_lossy();
                (DatabaseKind::MySql, AnyConnectOptions::from_url(&url)?)
            }
        };

        let pool = open_pool(&options, max_connections).await?;
        info!(backend = ?kind, max_connections, "Database pool ready");

        Ok(Self {
            inner: Arc::new(Inner {
                pool: RwLock::new((0, pool)),
                options,
                max_connections,
                kind,
            }),
        })
    }

    pub fn kind(&self) -> DatabaseKind {
        self.inner.kind
    }

    /// Current pool.
    pub async fn pool(&self) -> AnyPool {
        self.inner.pool.read().await.1.clone()
    }

    /// Run one statement. If it fails because the connection went away, the
    /// pool is rebuilt once from the last-known options and the statement is
    /// retried once. A second failure is reported, never retried.
    pub async fn run<T, F, Fut>(&self, statement: &'static str, op: F) -> Result<T>
    where
        F: Fn(AnyPool) -> Fut,
        Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        let (generation, pool) = {
            let guard = self.inner.pool.read().await;
            (guard.0, guard.1.clone())
        };

        let err = match op(pool).await {
            Ok(value) => return Ok(value),
            Err(err) if is_connection_lost(&err) => err,
            Err(err) => return Err(err.into()),
        };

        warn!(statement, error = %err, "Database connection lost, reconnecting");
        let pool = self.reconnect(generation).await?;

        op(pool).await.map_err(|err| {
            error!(statement, error = %err, "Statement failed after reconnect");
            if is_connection_lost(&err) {
                StorageError::Unavailable(format!("{} failed after reconnect: {}", statement, err))
            } else {
                StorageError::Database(err)
            }
        })
    }

    async fn reconnect(&self, seen_generation: u64) -> Result<AnyPool> {
        let mut guard = self.inner.pool.write().await;
        if guard.0 != seen_generation {
            // another task already replaced the pool
            return Ok(guard.1.clone());
        }

        let pool = open_pool(&self.inner.options, self.inner.max_connections)
            .await
            .map_err(|e| {
                error!(error = %e, "Reconnect failed");
                StorageError::Unavailable(format!("reconnect failed: {}", e))
            })?;

        let old = std::mem::replace(&mut guard.1, pool.clone());
        guard.0 += 1;
        tokio::spawn(async move { old.close().await });

        info!(generation = guard.0, "Database pool rebuilt");
        Ok(pool)
    }

    /// Close the pool, waiting for checked-out connections to come back.
    pub async fn close(&self) {
        self.pool().await.close().await;
    }
}

async fn open_pool(
    options: &AnyConnectOptions,
    max_connections: u32,
) -> std::result::Result<AnyPool, sqlx::Error> {
    AnyPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options.clone())
        .await
}

async fn create_mysql_database(server: &MySqlConnectOptions, database: &str) -> Result<()> {
    if database.is_empty()
        || !database
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(StorageError::InvalidDatabaseName(database.to_string()));
    }

    info!(database, "Preparing database");
    let mut conn = server.connect().await?;
    sqlx::raw_sql(&format!("CREATE DATABASE IF NOT EXISTS `{}`", database))
        .execute(&mut conn)
        .await?;
    conn.close().await?;
    Ok(())
}

/// Errors that mean the connection (not the statement) is the problem.
/// `PoolTimedOut` is saturation, not loss, so it never triggers a rebuild.
pub(crate) fn is_connection_lost(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_lost_classification() {
        assert!(is_connection_lost(&sqlx::Error::PoolClosed));
        assert!(is_connection_lost(&sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "server has gone away"
        ))));
        assert!(!is_connection_lost(&sqlx::Error::RowNotFound));
        assert!(!is_connection_lost(&sqlx::Error::PoolTimedOut));
    }

    #[tokio::test]
    async fn test_rejects_bad_database_name() {
        let server = MySqlConnectOptions::new().host("127.0.0.1");
        let err = create_mysql_database(&server, "my_app`; DROP TABLE x; --")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidDatabaseName(_)));
    }
}
