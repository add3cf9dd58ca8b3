#![cfg_attr(
    not(any(feature = "pg", feature = "sqlite")),
    allow(unused_imports, unused_variables, dead_code, unreachable_code)
)]

//! Database handle shared by the pairing workspace.
//!
//! `DbHandle` owns one sqlx pool and a SeaORM connection over the same pool:
//! repositories go through SeaORM, advisory locks through raw sqlx.
//!
//! # Features
//! - `pg`, `sqlite`: enable the corresponding backend
//!
//! # Example
//! ```rust,no_run
//! #[tokio::main]
//! async fn main() -> db::Result<()> {
//!     use db::{ConnectOpts, DbHandle, LockConfig};
//!
//!     let db = DbHandle::connect("sqlite::memory:", ConnectOpts::default()).await?;
//!     if let Some(guard) = db.try_lock("pairing", "couple-key", LockConfig::default()).await? {
//!         guard.release().await;
//!     }
//!     db.close().await;
//!     Ok(())
//! }
//! ```

pub use advisory_locks::{DbLockGuard, LockConfig};
pub mod advisory_locks;
pub mod errors;

use std::time::Duration;

#[cfg(feature = "pg")]
use sqlx::{postgres::PgPoolOptions, PgPool};
#[cfg(feature = "sqlite")]
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use sqlx::{pool::PoolOptions, Database};

use sea_orm::DatabaseConnection;
#[cfg(feature = "pg")]
use sea_orm::SqlxPostgresConnector;
#[cfg(feature = "sqlite")]
use sea_orm::SqlxSqliteConnector;

use thiserror::Error;

/// Library-local result type.
pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Unknown DSN: {0}")]
    UnknownDsn(String),

    #[error("Feature not enabled: {0}")]
    FeatureDisabled(&'static str),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Sea(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Advisory lock error: {0}")]
    Lock(#[source] anyhow::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbEngine {
    Postgres,
    Sqlite,
}

/// Pool settings; each driver applies the subset it supports.
#[derive(Clone, Debug)]
pub struct ConnectOpts {
    pub max_conns: Option<u32>,
    pub min_conns: Option<u32>,
    pub acquire_timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
    /// SQLite only, applied as `PRAGMA busy_timeout` on every connection.
    pub sqlite_busy_timeout: Option<Duration>,
    /// SQLite file DSNs: create missing parent directories.
    pub create_sqlite_dirs: bool,
}

impl Default for ConnectOpts {
    fn default() -> Self {
        Self {
            max_conns: Some(10),
            min_conns: None,
            acquire_timeout: Some(Duration::from_secs(30)),
            idle_timeout: None,
            sqlite_busy_timeout: Some(Duration::from_millis(5_000)),
            create_sqlite_dirs: true,
        }
    }
}

impl ConnectOpts {
    fn pool_options<DB: Database>(&self, max_conns: Option<u32>) -> PoolOptions<DB> {
        let mut o = PoolOptions::<DB>::new();
        if let Some(n) = max_conns {
            o = o.max_connections(n);
        }
        if let Some(n) = self.min_conns {
            o = o.min_connections(n);
        }
        if let Some(t) = self.acquire_timeout {
            o = o.acquire_timeout(t);
        }
        o.idle_timeout(self.idle_timeout)
    }
}

#[derive(Clone)]
pub enum DbPool {
    #[cfg(feature = "pg")]
    Postgres(PgPool),
    #[cfg(feature = "sqlite")]
    Sqlite(SqlitePool),
}

pub struct DbHandle {
    engine: DbEngine,
    pool: DbPool,
    dsn: String,
    sea: DatabaseConnection,
}

impl DbHandle {
    /// Engine from the DSN scheme.
    pub fn detect(dsn: &str) -> Result<DbEngine> {
        let s = dsn.trim_start();
        if s.starts_with("postgres://") || s.starts_with("postgresql://") {
            Ok(DbEngine::Postgres)
        } else if s.starts_with("sqlite:") {
            Ok(DbEngine::Sqlite)
        } else {
            Err(DbError::UnknownDsn(dsn.to_string()))
        }
    }

    pub async fn connect(dsn: &str, opts: ConnectOpts) -> Result<Self> {
        let engine = Self::detect(dsn)?;
        let handle = match engine {
            DbEngine::Postgres => Self::connect_pg(dsn, &opts).await?,
            DbEngine::Sqlite => Self::connect_sqlite(dsn, &opts).await?,
        };
        tracing::debug!(engine = ?handle.engine, "database pool ready");
        Ok(handle)
    }

    #[cfg(feature = "pg")]
    async fn connect_pg(dsn: &str, opts: &ConnectOpts) -> Result<Self> {
        let options: PgPoolOptions = opts.pool_options(opts.max_conns);
        let pool = options.connect(dsn).await?;
        Ok(Self {
            engine: DbEngine::Postgres,
            sea: SqlxPostgresConnector::from_sqlx_postgres_pool(pool.clone()),
            pool: DbPool::Postgres(pool),
            dsn: dsn.to_string(),
        })
    }

    #[cfg(not(feature = "pg"))]
    async fn connect_pg(_dsn: &str, _opts: &ConnectOpts) -> Result<Self> {
        Err(DbError::FeatureDisabled("PostgreSQL feature not enabled"))
    }

    #[cfg(feature = "sqlite")]
    async fn connect_sqlite(dsn: &str, opts: &ConnectOpts) -> Result<Self> {
        if opts.create_sqlite_dirs {
            create_sqlite_parent(dsn)?;
        }

        // each connection to `:memory:` would open its own empty database
        let max_conns = if dsn.contains(":memory:") {
            Some(1)
        } else {
            opts.max_conns
        };
        let connect_options: SqliteConnectOptions = dsn.parse()?;
        let busy = opts.sqlite_busy_timeout;
        let options: SqlitePoolOptions = opts.pool_options(max_conns);
        let pool = options
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode = WAL")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA foreign_keys = ON")
                        .execute(&mut *conn)
                        .await?;
                    if let Some(ms) = busy {
                        // PRAGMA takes no bind parameters
                        let ms = u64::try_from(ms.as_millis()).unwrap_or(u64::MAX);
                        sqlx::query(&format!("PRAGMA busy_timeout = {ms}"))
                            .execute(&mut *conn)
                            .await?;
                    }
                    Ok(())
                })
            })
            .connect_with(connect_options.create_if_missing(true))
            .await?;

        Ok(Self {
            engine: DbEngine::Sqlite,
            sea: SqlxSqliteConnector::from_sqlx_sqlite_pool(pool.clone()),
            pool: DbPool::Sqlite(pool),
            dsn: dsn.to_string(),
        })
    }

    #[cfg(not(feature = "sqlite"))]
    async fn connect_sqlite(_dsn: &str, _opts: &ConnectOpts) -> Result<Self> {
        Err(DbError::FeatureDisabled("SQLite feature not enabled"))
    }

    pub async fn close(self) {
        match self.pool {
            #[cfg(feature = "pg")]
            DbPool::Postgres(p) => p.close().await,
            #[cfg(feature = "sqlite")]
            DbPool::Sqlite(p) => p.close().await,
        }
    }

    pub fn engine(&self) -> DbEngine {
        self.engine
    }

    /// Owned SeaORM connection; clones share the pool.
    pub fn sea(&self) -> DatabaseConnection {
        self.sea.clone()
    }

    pub fn seaorm(&self) -> &DatabaseConnection {
        &self.sea
    }
}

/// `sqlite://dir/file.db?...` -> create `dir`. In-memory and `file:` URI
/// forms have nothing to create.
#[cfg(feature = "sqlite")]
fn create_sqlite_parent(dsn: &str) -> Result<()> {
    if dsn.contains(":memory:") {
        return Ok(());
    }
    let rest = dsn
        .strip_prefix("sqlite://")
        .or_else(|| dsn.strip_prefix("sqlite:"))
        .unwrap_or(dsn);
    if rest.starts_with("file:") {
        return Ok(());
    }

    let path = rest.split('?').next().unwrap_or(rest);
    match std::path::Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent)?;
            Ok(())
        }
        _ => Ok(()),
    }
}
