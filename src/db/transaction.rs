//! Real transactions on a dedicated pooled connection.
//!
//! Transaction control is plain SQL (`BEGIN`, `COMMIT`, `ROLLBACK`,
//! `SAVEPOINT`, `ROLLBACK TO SAVEPOINT`) sent on the connection, so a failed
//! `COMMIT` leaves the transaction in the caller's hands instead of consuming
//! it.

use crate::db::executor::SqlExecutor;
use crate::db::resource::Transaction;
use crate::error::{DbError, DbResult};
use crate::impl_db_dispatch;
use crate::models::{DatabaseType, ExecuteResult, QueryParam, QueryRows};
use sqlx::pool::PoolConnection;
use sqlx::{MySql, Postgres, Sqlite};
use std::time::Duration;
use tracing::{debug, warn};

/// A connection checked out of one of the backend pools.
#[derive(Debug)]
pub enum DbConnection {
    MySql(PoolConnection<MySql>),
    Postgres(PoolConnection<Postgres>),
    SQLite(PoolConnection<Sqlite>),
}

impl DbConnection {
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbConnection::MySql(_) => DatabaseType::MySQL,
            DbConnection::Postgres(_) => DatabaseType::PostgreSQL,
            DbConnection::SQLite(_) => DatabaseType::SQLite,
        }
    }

    pub(crate) async fn execute(
        &mut self,
        sql: &str,
        params: &[QueryParam],
        limit: Duration,
    ) -> DbResult<ExecuteResult> {
        impl_db_dispatch!(DbConnection, self, |conn, backend| {
            backend::execute(conn, sql, params, limit).await
        })
    }

    pub(crate) async fn query(
        &mut self,
        sql: &str,
        params: &[QueryParam],
        limit: Duration,
    ) -> DbResult<QueryRows> {
        impl_db_dispatch!(DbConnection, self, |conn, backend| {
            backend::query(conn, sql, params, limit).await
        })
    }

    pub(crate) async fn ping(&mut self, limit: Duration) -> DbResult<()> {
        impl_db_dispatch!(DbConnection, self, |conn, backend| {
            backend::ping(conn, limit).await
        })
    }

    pub(crate) async fn server_version(&mut self, limit: Duration) -> DbResult<String> {
        impl_db_dispatch!(DbConnection, self, |conn, backend| {
            backend::server_version(conn, limit).await
        })
    }

    /// Close the connection on drop instead of returning it to the pool.
    fn close_on_drop(&mut self) {
        impl_db_dispatch!(DbConnection, self, |conn| conn.close_on_drop())
    }
}

/// Check that `name` can be interpolated into a savepoint statement.
pub fn validate_savepoint_name(name: &str) -> DbResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(DbError::invalid_input(format!(
            "Invalid savepoint name '{}': expected letters, digits and underscores, not starting with a digit",
            name
        )))
    }
}

/// One real transaction, holding its connection until it is finished.
///
/// Dropping an unfinished transaction closes the connection rather than
/// returning it to the pool, which makes the server abort the transaction.
#[derive(Debug)]
pub struct DbTransaction {
    /// `None` once committed or rolled back
    connection: Option<DbConnection>,
    query_timeout: Duration,
}

impl DbTransaction {
    /// Issue `BEGIN` on `connection`.
    pub(crate) async fn begin(mut connection: DbConnection, query_timeout: Duration) -> DbResult<Self> {
        if let Err(e) = connection.execute("BEGIN", &[], query_timeout).await {
            // The session state is unknown; don't hand it to the next caller
            connection.close_on_drop();
            return Err(e);
        }
        debug!(db_type = %connection.db_type(), "Transaction started");
        Ok(Self {
            connection: Some(connection),
            query_timeout,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.connection.is_none()
    }

    pub fn db_type(&self) -> Option<DatabaseType> {
        self.connection.as_ref().map(DbConnection::db_type)
    }

    fn connection(&mut self) -> DbResult<&mut DbConnection> {
        self.connection
            .as_mut()
            .ok_or(DbError::NoActiveTransaction)
    }

    async fn control(&mut self, sql: &str) -> DbResult<()> {
        let limit = self.query_timeout;
        self.connection()?.execute(sql, &[], limit).await?;
        Ok(())
    }

    /// Run a final `COMMIT`/`ROLLBACK` and release the connection on success.
    async fn finish(&mut self, sql: &str) -> DbResult<()> {
        self.control(sql).await?;
        // Dropping the pool connection returns it to the pool
        self.connection = None;
        Ok(())
    }
}

impl SqlExecutor for DbTransaction {
    async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<ExecuteResult> {
        debug!(sql = %sql, params = params.len(), "Executing statement in transaction");
        let limit = self.query_timeout;
        self.connection()?.execute(sql, params, limit).await
    }

    async fn query(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<QueryRows> {
        debug!(sql = %sql, params = params.len(), "Executing query in transaction");
        let limit = self.query_timeout;
        self.connection()?.query(sql, params, limit).await
    }
}

impl Transaction for DbTransaction {
    async fn commit(&mut self) -> DbResult<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.finish("ROLLBACK").await
    }

    async fn savepoint(&mut self, name: &str) -> DbResult<()> {
        validate_savepoint_name(name)?;
        self.control(&format!("SAVEPOINT {}", name)).await
    }

    async fn rollback_to_savepoint(&mut self, name: &str) -> DbResult<()> {
        validate_savepoint_name(name)?;
        self.control(&format!("ROLLBACK TO SAVEPOINT {}", name))
            .await
    }
}

impl Drop for DbTransaction {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.as_mut() {
            warn!(
                db_type = %connection.db_type(),
                "Transaction dropped without commit or rollback; closing its connection"
            );
            connection.close_on_drop();
        }
    }
}
