//! SeaORM-based database implementation
//!
//! Database-agnostic access using SeaORM with support for SQLite,
//! PostgreSQL, and MySQL. SQLite files are auto-created on first start.

use anyhow::{Context, Result};
use sea_orm::{ConnectOptions, Database as SeaOrmDatabase, DatabaseBackend, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DatabaseConfig;

pub mod migrations;
pub mod repositories;

/// Database connection manager with multi-database support
#[derive(Clone)]
pub struct Database {
    /// Main database connection
    pub connection: Arc<DatabaseConnection>,
    /// Database backend type for optimization selection
    pub backend: DatabaseBackend,
    /// Database type for specific optimizations
    pub database_type: DatabaseType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    SQLite,
    PostgreSQL,
    MySQL,
}

impl Database {
    /// Create a new database connection with proper optimizations
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let database_type = Self::detect_database_type(&config.url)?;
        let backend = match database_type {
            DatabaseType::SQLite => DatabaseBackend::Sqlite,
            DatabaseType::PostgreSQL => DatabaseBackend::Postgres,
            DatabaseType::MySQL => DatabaseBackend::MySql,
        };

        info!("Connecting to {} database", database_type.as_str());

        // For SQLite, modify URL to enable auto-creation if needed
        let connection_url = match database_type {
            DatabaseType::SQLite => Self::ensure_sqlite_auto_creation(&config.url)?,
            _ => config.url.clone(),
        };

        let mut connect_options = ConnectOptions::new(&connection_url);
        connect_options
            .max_connections(config.max_connections.unwrap_or(10))
            .min_connections(1)
            .connect_timeout(Duration::from_secs(5))
            .acquire_timeout(Duration::from_secs(3))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .sqlx_logging_level(tracing::log::LevelFilter::Debug);

        let connection = SeaOrmDatabase::connect(connect_options)
            .await
            .with_context(|| format!("Failed to connect to database at '{}'", &config.url))?;

        debug!("Database connection established successfully");

        Ok(Self {
            connection: Arc::new(connection),
            backend,
            database_type,
        })
    }

    /// Wrap an already-open connection. Used by tests running against
    /// in-memory SQLite.
    pub fn from_connection(connection: DatabaseConnection, backend: DatabaseBackend) -> Self {
        let database_type = match backend {
            DatabaseBackend::Sqlite => DatabaseType::SQLite,
            DatabaseBackend::Postgres => DatabaseType::PostgreSQL,
            DatabaseBackend::MySql => DatabaseType::MySQL,
        };
        Self {
            connection: Arc::new(connection),
            backend,
            database_type,
        }
    }

    /// Detect the database type from the URL
    fn detect_database_type(url: &str) -> Result<DatabaseType> {
        if url.starts_with("sqlite:") {
            Ok(DatabaseType::SQLite)
        } else if url.starts_with("postgres:") || url.starts_with("postgresql:") {
            Ok(DatabaseType::PostgreSQL)
        } else if url.starts_with("mysql:") {
            Ok(DatabaseType::MySQL)
        } else {
            anyhow::bail!("Unsupported database URL format: {}", url);
        }
    }

    /// Ensure SQLite URL includes auto-creation mode if needed
    fn ensure_sqlite_auto_creation(url: &str) -> Result<String> {
        // Fast path: if URL already has mode parameter or is in-memory, use as-is
        if url.contains("mode=") || url.contains(":memory:") {
            debug!("SQLite URL needs no modification: {}", url);
            return Ok(url.to_string());
        }

        let file_path = if let Some(path) = url.strip_prefix("sqlite://") {
            path
        } else if let Some(path) = url.strip_prefix("sqlite:") {
            path
        } else {
            anyhow::bail!("Invalid SQLite URL format: {}", url);
        };

        let path = std::path::Path::new(file_path);
        if path.exists() {
            debug!("SQLite database file already exists: {}", file_path);
            return Ok(url.to_string());
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!(
                    "Failed to create directory for SQLite database: {}",
                    parent.display()
                )
            })?;
            info!("Created directory for SQLite database: {}", parent.display());
        }

        // Add mode=rwc to enable auto-creation
        let auto_create_url = if url.contains('?') {
            format!("{url}&mode=rwc")
        } else {
            format!("{url}?mode=rwc")
        };

        info!(
            "Modified SQLite URL to enable auto-creation: {} -> {}",
            url, auto_create_url
        );
        Ok(auto_create_url)
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        use migrations::Migrator;
        use sea_orm_migration::MigratorTrait;

        info!(
            "Running database migrations for {}",
            self.database_type.as_str()
        );

        Migrator::up(&*self.connection, None)
            .await
            .context("Failed to run migrations")?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the database connection
    pub fn connection(&self) -> Arc<DatabaseConnection> {
        self.connection.clone()
    }

    /// Get the database backend type
    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }
}

impl DatabaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseType::SQLite => "SQLite",
            DatabaseType::PostgreSQL => "PostgreSQL",
            DatabaseType::MySQL => "MySQL",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
