//! Resource and transaction capabilities.
//!
//! A [`Resource`] is a connection pool that can start real transactions. A
//! [`Transaction`] is one such transaction, able to commit, roll back and
//! manage savepoints. Both can run statements through [`SqlExecutor`].

use crate::db::executor::SqlExecutor;
use crate::error::DbResult;
use serde::Serialize;
use std::future::Future;

/// A SQL-executing resource backed by a connection pool.
///
/// Clones share the underlying pool.
pub trait Resource: SqlExecutor + Clone + Sync + 'static {
    type Transaction: Transaction + 'static;

    /// Acquire a connection and start a real transaction on it.
    fn begin(&self) -> impl Future<Output = DbResult<Self::Transaction>> + Send;

    /// Close the pool. Waits for checked-out connections to be returned.
    fn close(&self) -> impl Future<Output = ()> + Send;

    /// Check that the database is reachable.
    fn ping(&self) -> impl Future<Output = DbResult<()>> + Send;

    fn stats(&self) -> PoolStats;
}

/// One real transaction on a dedicated connection.
///
/// Once `commit` or `rollback` has succeeded, every further operation fails
/// with [`DbError::NoActiveTransaction`](crate::error::DbError::NoActiveTransaction).
/// A failed `commit` or `rollback` leaves the transaction usable.
pub trait Transaction: SqlExecutor {
    fn commit(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    fn rollback(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    /// Create a savepoint named `name`.
    fn savepoint(&mut self, name: &str) -> impl Future<Output = DbResult<()>> + Send;

    /// Undo everything since savepoint `name` was created. The savepoint
    /// itself stays in place.
    fn rollback_to_savepoint(&mut self, name: &str)
    -> impl Future<Output = DbResult<()>> + Send;
}

/// Connection pool statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub max_connections: u32,
    /// Connections currently established, idle or in use
    pub open_connections: u32,
    pub idle: u32,
    pub in_use: u32,
    pub closed: bool,
}
