//! # Database Layer
//!
//! PostgreSQL connection pool and embedded migrations.
//!
//! Each service owns one schema (`directory`, `inventory`, `pos`,
//! `commission`) and connects with its own DSN; cross-service reads are
//! schema-qualified and read-only. The pool is process-wide: 20 connections,
//! 5 kept idle.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use mercur_core::error::{ServiceError, ServiceResult};

/// Pool sizing and timeouts.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub dsn: String,

    /// Maximum pool size. Default: 20.
    pub max_connections: u32,

    /// Connections kept idle. Default: 5.
    pub min_connections: u32,

    /// Acquire timeout. Default: 5 seconds.
    pub connect_timeout: Duration,

    /// Run embedded migrations on connect. Default: true.
    pub run_migrations: bool,
}

impl DbConfig {
    pub fn new(dsn: impl Into<String>) -> Self {
        DbConfig {
            dsn: dsn.into(),
            max_connections: 20,
            min_connections: 5,
            connect_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }
}

/// Shared database handle.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connects with defaults and runs migrations.
    pub async fn connect(dsn: &str) -> ServiceResult<Self> {
        Database::new(DbConfig::new(dsn)).await
    }

    /// Connects with explicit configuration.
    pub async fn new(config: DbConfig) -> ServiceResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.dsn)
            .await
            .map_err(|e| ServiceError::Unavailable(format!("database connect failed: {e}")))?;

        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "database pool created"
        );

        let db = Database { pool };
        if config.run_migrations {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    /// Applies all pending migrations. Idempotent.
    pub async fn run_migrations(&self) -> ServiceResult<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ServiceError::Internal(format!("migration failed: {e}")))?;
        info!("migrations complete");
        Ok(())
    }

    /// The connection pool. Services begin transactions from here.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// True when the database answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// Closes the pool. Call on shutdown.
    pub async fn close(&self) {
        info!("closing database pool");
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = DbConfig::new("postgres://localhost/mercur")
            .max_connections(30)
            .min_connections(10)
            .run_migrations(false);

        assert_eq!(config.max_connections, 30);
        assert_eq!(config.min_connections, 10);
        assert!(!config.run_migrations);
    }
}
