//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite, and the
//! [`Database`] handle that hands out repositories and services.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Handle                                    │
//! │                                                                         │
//! │  DbConfig::from_env()  ·  LedgerConfig::from_env()                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::connect(db_config, ledger_config).await                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │  SqlitePool        (max_connections)    │                           │
//! │  │  KeyedLocks        one per product id   │  shared by every          │
//! │  │  TtlCache          revenue answers      │  StockLedger/Aggregator   │
//! │  │  LedgerConfig      retries, paging, TTL │  handed out               │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ├── db.products() / stock() / ledger() / sales()   repositories   │
//! │       └── db.stock_ledger() / revenue()                  services       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled so revenue reads do not
//! block stock mutations and vice versa.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::cache::TtlCache;
use crate::config::{parse_var, ConfigError, LedgerConfig};
use crate::error::{DbError, DbResult};
use crate::locks::KeyedLocks;
use crate::migrations;
use crate::repository::ledger::LedgerRepository;
use crate::repository::product::ProductRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::stock::StockRepository;
use crate::service::revenue::{RevenueAggregator, RevenueCache};
use crate::service::stock_ledger::StockLedger;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/stockroom/stockroom.db")
///     .max_connections(8)
///     .min_connections(1);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// Reads `STOCKROOM_DATABASE_PATH` (required) and
    /// `STOCKROOM_DB_MAX_CONNECTIONS` (default 5).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`DbConfig::from_env`] over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = lookup("STOCKROOM_DATABASE_PATH")
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ConfigError::MissingRequired("STOCKROOM_DATABASE_PATH".to_string()))?;

        let max_connections = parse_var(&lookup, "STOCKROOM_DB_MAX_CONNECTIONS", 5u32)?;
        if max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "STOCKROOM_DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(DbConfig::new(path).max_connections(max_connections))
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository and service access.
///
/// Cheap to clone. Every clone shares the pool, the per-product locks and the
/// revenue cache, so services handed out by any clone serialize against each
/// other.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    locks: KeyedLocks,
    revenue_cache: RevenueCache,
    ledger_config: LedgerConfig,
}

impl Database {
    /// Creates a database handle with default service tuning.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        Self::connect(config, LedgerConfig::default()).await
    }

    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous (balance of safety/speed)
    ///    - Foreign keys enabled
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn connect(config: DbConfig, ledger_config: LedgerConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        // sqlite://path creates file if not exists
        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default for backwards compatibility
            .foreign_keys(true)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            cache_ttl_secs = ledger_config.revenue_cache_ttl.as_secs(),
            "Database pool created"
        );

        let db = Database {
            pool,
            locks: KeyedLocks::new(),
            revenue_cache: TtlCache::new(ledger_config.revenue_cache_ttl),
            ledger_config,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations.
    ///
    /// Called by `connect()` when `run_migrations` is set.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Service tuning this handle was built with.
    pub fn ledger_config(&self) -> &LedgerConfig {
        &self.ledger_config
    }

    /// Returns the product repository.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    /// Returns the stock record repository.
    pub fn stock(&self) -> StockRepository {
        StockRepository::new(self.pool.clone())
    }

    /// Returns the ledger repository (read side).
    pub fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.pool.clone())
    }

    /// Returns the sale repository.
    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    /// Returns the stock ledger engine.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let outcome = db
    ///     .stock_ledger()
    ///     .apply_mutation(MutationRequest::new(&id, MutationKind::Add, 10, "restock"))
    ///     .await?;
    /// ```
    pub fn stock_ledger(&self) -> StockLedger {
        StockLedger::new(
            self.pool.clone(),
            self.locks.clone(),
            self.ledger_config.clone(),
        )
    }

    /// Returns the revenue aggregator.
    pub fn revenue(&self) -> RevenueAggregator {
        RevenueAggregator::new(self.pool.clone(), self.revenue_cache.clone())
    }

    /// Closes the database connection pool.
    ///
    /// After calling close, all repository operations will fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_in_memory_database() {
        let config = DbConfig::in_memory();
        let db = Database::new(config).await.unwrap();

        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
    }

    #[test]
    fn test_config_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("STOCKROOM_DATABASE_PATH", "/data/stockroom.db"),
            ("STOCKROOM_DB_MAX_CONNECTIONS", "12"),
        ]
        .into_iter()
        .collect();

        let config = DbConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/data/stockroom.db"));
        assert_eq!(config.max_connections, 12);

        let missing = DbConfig::from_lookup(|_| None).unwrap_err();
        assert!(matches!(missing, ConfigError::MissingRequired(_)));

        let bad = DbConfig::from_lookup(|k| match k {
            "STOCKROOM_DATABASE_PATH" => Some("x.db".to_string()),
            _ => Some("many".to_string()),
        })
        .unwrap_err();
        assert!(matches!(bad, ConfigError::InvalidValue(_)));
    }
}
