//! Persistence layer: PostgreSQL connection pooling and the ledger store.
//!
//! Balances and game sessions live behind the [`LedgerStore`] trait.
//! [`PgLedgerStore`] is the production backend and [`MemoryLedger`] is a
//! process-local backend with the same locking and atomicity rules.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub mod config;
pub mod errors;
pub mod memory;
pub mod repository;
pub mod timeouts;

pub use config::DatabaseConfig;
pub use errors::{LedgerError, LedgerResult};
pub use memory::MemoryLedger;
pub use repository::{LedgerStore, PgLedgerStore, PgUnitOfWork, UnitOfWork};

/// Schema for the `player` and `game_session` tables
pub const SCHEMA: &str = include_str!("../../migrations/001_initial_schema.sql");

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// # Arguments
    ///
    /// * `config` - Database configuration
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use spicy_dice::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), sqlx::Error> {
    ///     let config = DatabaseConfig::from_env();
    ///     let db = Database::new(&config).await?;
    ///     db.apply_schema().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the ledger tables and indexes if they do not exist yet
    pub async fn apply_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Ledger store sharing this pool
    pub fn ledger(&self) -> PgLedgerStore {
        PgLedgerStore::new(self.pool.clone())
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}
