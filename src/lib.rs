//! txnest - nested transactions over sqlx pools.
//!
//! A [`Provider`] sits between application code and a database resource.
//! The outermost [`enter_transaction`](Provider::enter_transaction) starts a
//! real transaction; deeper ones become savepoints. Statements go through
//! [`Provider::current_executor`] and land on the transaction or the pool as
//! appropriate.
//!
//! ```no_run
//! use txnest::db::SqlExecutor;
//! use txnest::{ConnectionConfig, PoolOptions, ResourceRegistry};
//!
//! # async fn demo() -> txnest::DbResult<()> {
//! let registry: ResourceRegistry = ResourceRegistry::new();
//! let config = ConnectionConfig::new("app", "sqlite:app.db?mode=rwc", PoolOptions::default())
//!     .map_err(|e| txnest::DbError::invalid_input(e.to_string()))?;
//! registry.register_database(&config).await?;
//!
//! let mut provider = registry.provider("app").await?;
//! provider.enter_transaction().await?; // BEGIN
//! provider.current_executor().execute("INSERT INTO t VALUES (1)", &[]).await?;
//! provider.enter_transaction().await?; // SAVEPOINT
//! provider.current_executor().execute("UPDATE t SET a = 2", &[]).await?;
//! provider.rollback().await?; // ROLLBACK TO SAVEPOINT
//! provider.commit().await?; // COMMIT, the row holds 1
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod provider;
pub mod registry;

pub use config::{Config, DatabaseConfig, PoolOptions};
pub use db::{DbResource, PoolStats, Resource, SqlExecutor, Transaction};
pub use error::{DbError, DbResult};
pub use models::{ConnectionConfig, DatabaseType, QueryParam, QueryRows};
pub use provider::{Executor, Provider, ProviderState, TransactionInfo};
pub use registry::ResourceRegistry;
