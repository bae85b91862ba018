//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - The executor, resource and transaction capabilities
//! - Connection pools and the sqlx-backed resource
//! - Real transactions with savepoints on a dedicated connection
//! - Parameter binding and row decoding per backend

pub mod executor;
#[macro_use]
pub mod macros;
#[cfg(test)]
pub(crate) mod mock;
pub mod params;
pub mod pool;
pub mod resource;
pub mod transaction;
pub mod types;

pub use executor::SqlExecutor;
pub use pool::{DbPool, DbResource};
pub use resource::{PoolStats, Resource, Transaction};
pub use transaction::{DbConnection, DbTransaction, validate_savepoint_name};
