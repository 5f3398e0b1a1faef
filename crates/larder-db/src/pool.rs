//! # Database Handle
//!
//! One `SqlitePool` shared by every repository.
//!
//! ```text
//!   DbConfig::new(path)  ──►  Database::new  ──►  WAL + foreign keys + busy timeout
//!                                   │
//!                                   ├──► migrations::run_migrations
//!                                   │
//!                                   └──► ingredients() recipes() sales_orders()
//!                                        supplier_orders() ledger()
//! ```
//!
//! The sync sweep registers several items at once and each registration
//! writes its own ledger row, so the file pool is sized above the default
//! sync concurrency. WAL keeps statistics and retry sweeps from blocking
//! those writes.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::ingredient::IngredientRepository;
use crate::repository::ledger::LedgerRepository;
use crate::repository::recipe::RecipeRepository;
use crate::repository::sales_order::SalesOrderRepository;
use crate::repository::supplier_order::SupplierOrderRepository;

/// Where the database lives and how the pool around it is sized.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/larder/larder.db").max_connections(8);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// `None` for a private in-memory database.
    pub path: Option<PathBuf>,
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout: Duration,
    pub run_migrations: bool,
}

impl DbConfig {
    /// A database file, created if missing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: Some(path.into()),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// A fresh, migrated in-memory database.
    ///
    /// Held on a single connection: each `:memory:` connection would
    /// otherwise open its own empty database.
    pub fn in_memory() -> Self {
        DbConfig {
            path: None,
            max_connections: 1,
            busy_timeout: Duration::from_secs(1),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = match &self.path {
            Some(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal),
            None => SqliteConnectOptions::new().in_memory(true),
        };

        // Ledger links and order lines rely on foreign keys.
        options.foreign_keys(true).busy_timeout(self.busy_timeout)
    }
}

/// Storage handle. Cloning shares the pool.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./larder.db")).await?;
/// let pending = db.ingredients().list_unregistered().await?;
/// let stats = db.ledger().statistics().await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and, unless disabled, migrates the schema.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let location = config
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string());

        let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
        if config.path.is_none() {
            // The in-memory database dies with its last connection.
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        }

        let pool = pool_options
            .connect_with(config.connect_options())
            .await
            .map_err(|e| DbError::Open(format!("{location}: {e}")))?;

        info!(%location, max_connections = config.max_connections, "Database opened");

        if config.run_migrations {
            migrations::run_migrations(&pool).await?;
        }

        Ok(Database { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn ingredients(&self) -> IngredientRepository {
        IngredientRepository::new(self.pool.clone())
    }

    pub fn recipes(&self) -> RecipeRepository {
        RecipeRepository::new(self.pool.clone())
    }

    pub fn sales_orders(&self) -> SalesOrderRepository {
        SalesOrderRepository::new(self.pool.clone())
    }

    pub fn supplier_orders(&self) -> SupplierOrderRepository {
        SupplierOrderRepository::new(self.pool.clone())
    }

    /// The fiscal transaction ledger.
    pub fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.pool.clone())
    }

    /// Highest applied migration, `None` on an unmigrated database.
    pub async fn schema_version(&self) -> DbResult<Option<i64>> {
        Ok(migrations::applied_versions(&self.pool).await?.last().copied())
    }

    /// Waits for in-flight queries, then closes every connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
