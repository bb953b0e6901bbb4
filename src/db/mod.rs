//! Database layer
//!
//! Supports SQLite (default, single-file deployments and tests) and MySQL.
//! The driver is selected from configuration; repositories hold a
//! [`DynDatabasePool`] and branch on [`Backend`] for driver-specific SQL.
//!
//! ```ignore
//! use medconsult::config::DatabaseConfig;
//! use medconsult::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
