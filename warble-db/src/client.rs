use sqlx::{
    Sqlite, SqlitePool, Transaction,
    migrate::{MigrateError, Migrator},
    sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions},
};
use std::{str::FromStr, time::Duration};
use thiserror::Error;
use tracing::debug;
use warble_common::model::ModelValidationError;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

static MIGRATOR: Migrator = sqlx::migrate!();

/// How long a write transaction waits for another writer to finish.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Running migrations failed: {0}")]
    Migrate(#[from] MigrateError),
}

impl DbError {
    /// A `UNIQUE` constraint rejected the write, e.g. a taken handle or email.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Sqlx(sqlx::Error::Database(err)) if err.is_unique_violation())
    }

    /// A referenced row does not exist, e.g. following an unknown user.
    #[must_use]
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, Self::Sqlx(sqlx::Error::Database(err)) if err.is_foreign_key_violation())
    }
}

#[derive(Clone, Debug)]
pub struct DbClient {
    pool: SqlitePool,
}

/// A unit of work against the database.
///
/// Every read and write goes through one of these. Dropping it without
/// calling [`DbTransaction::commit`] rolls back everything it did.
#[derive(Debug)]
pub struct DbTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        Ok(Self::new(pool))
    }

    /// A private in-memory database. SQLite gives every connection its own
    /// memory database, so the pool holds exactly one connection forever.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        debug!("Database migrations applied");

        Ok(())
    }

    /// Starts a read transaction. SQLite cannot upgrade it to a writer while
    /// another writer is active, so anything that writes uses
    /// [`DbClient::begin_write`].
    pub async fn begin(&self) -> Result<DbTransaction> {
        let tx = self.pool.begin().await?;

        Ok(DbTransaction { tx })
    }

    /// Starts a transaction holding the write lock from the first statement.
    /// Concurrent writers queue up for at most [`BUSY_TIMEOUT`].
    pub async fn begin_write(&self) -> Result<DbTransaction> {
        let tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        Ok(DbTransaction { tx })
    }
}

impl DbTransaction {
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }

    pub(crate) fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }
}
