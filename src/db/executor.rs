//! Statement execution.
//!
//! The [`SqlExecutor`] capability is what application code writes against:
//! run a statement, run a query, read a scalar. It is implemented by
//! resources, transactions and the provider's current executor alike.
//!
//! # Architecture
//!
//! The driver-level work happens in the `mysql`, `postgres` and `sqlite`
//! submodules, generated from one template so their structure stays
//! identical. Each operates on a single pooled connection and bounds every
//! statement with a timeout.

use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{ExecuteResult, QueryParam, QueryRows};
use std::future::Future;
use std::time::Duration;

/// Capability to run SQL statements.
///
/// Parameters are bound positionally using the backend's placeholder syntax
/// (`?` for MySQL and SQLite, `$1` for PostgreSQL).
pub trait SqlExecutor: Send {
    /// Run a statement that does not return rows.
    fn execute(
        &mut self,
        sql: &str,
        params: &[QueryParam],
    ) -> impl Future<Output = DbResult<ExecuteResult>> + Send;

    /// Run a statement and collect every row it returns.
    fn query(
        &mut self,
        sql: &str,
        params: &[QueryParam],
    ) -> impl Future<Output = DbResult<QueryRows>> + Send;

    /// First column of the first row as an integer. `None` for no rows or NULL.
    fn select_int(
        &mut self,
        sql: &str,
        params: &[QueryParam],
    ) -> impl Future<Output = DbResult<Option<i64>>> + Send {
        async move { self.query(sql, params).await?.scalar_int() }
    }

    /// First column of the first row as a float. `None` for no rows or NULL.
    fn select_float(
        &mut self,
        sql: &str,
        params: &[QueryParam],
    ) -> impl Future<Output = DbResult<Option<f64>>> + Send {
        async move { self.query(sql, params).await?.scalar_float() }
    }

    /// First column of the first row as a string. `None` for no rows or NULL.
    fn select_str(
        &mut self,
        sql: &str,
        params: &[QueryParam],
    ) -> impl Future<Output = DbResult<Option<String>>> + Send {
        async move { self.query(sql, params).await?.scalar_str() }
    }
}

// =============================================================================
// Common Helper Functions
// =============================================================================

fn collect_rows<R: RowToJson>(rows: &[R]) -> QueryRows {
    // Without rows there is nothing to read column names from
    let columns = rows.first().map(R::column_names).unwrap_or_default();
    QueryRows {
        columns,
        rows: rows.iter().map(R::to_json_values).collect(),
    }
}

fn timeout_error(operation: &str, limit: Duration) -> DbError {
    DbError::timeout(operation, u32::try_from(limit.as_secs()).unwrap_or(u32::MAX))
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================

macro_rules! impl_backend {
    (
        $name:ident, $db:ty,
        version_sql = $version_sql:literal,
        last_insert_id = |$result:ident| $last_insert_id:expr $(,)?
    ) => {
        pub(crate) mod $name {
            use super::*;
            use sqlx::pool::PoolConnection;
            use tokio::time::timeout;

            type Conn = PoolConnection<$db>;

            pub(crate) async fn execute(
                conn: &mut Conn,
                sql: &str,
                params: &[QueryParam],
                limit: Duration,
            ) -> DbResult<ExecuteResult> {
                // Without parameters the text is sent unprepared, which
                // transaction control statements require on some servers
                let outcome = if params.is_empty() {
                    timeout(limit, sqlx::Executor::execute(&mut **conn, sql)).await
                } else {
                    let query = params
                        .iter()
                        .fold(sqlx::query(sql), $crate::db::params::$name::bind);
                    timeout(limit, query.execute(&mut **conn)).await
                };

                let $result = outcome.map_err(|_| timeout_error("statement execution", limit))??;
                Ok(ExecuteResult {
                    rows_affected: $result.rows_affected(),
                    last_insert_id: $last_insert_id,
                })
            }

            pub(crate) async fn query(
                conn: &mut Conn,
                sql: &str,
                params: &[QueryParam],
                limit: Duration,
            ) -> DbResult<QueryRows> {
                let outcome = if params.is_empty() {
                    timeout(limit, sqlx::Executor::fetch_all(&mut **conn, sql)).await
                } else {
                    let query = params
                        .iter()
                        .fold(sqlx::query(sql), $crate::db::params::$name::bind);
                    timeout(limit, query.fetch_all(&mut **conn)).await
                };

                let rows = outcome.map_err(|_| timeout_error("query execution", limit))??;
                Ok(collect_rows(&rows))
            }

            pub(crate) async fn ping(conn: &mut Conn, limit: Duration) -> DbResult<()> {
                timeout(limit, sqlx::Connection::ping(&mut **conn))
                    .await
                    .map_err(|_| timeout_error("ping", limit))??;
                Ok(())
            }

            pub(crate) async fn server_version(
                conn: &mut Conn,
                limit: Duration,
            ) -> DbResult<String> {
                let version = sqlx::query_scalar::<_, String>($version_sql).fetch_one(&mut **conn);
                Ok(timeout(limit, version)
                    .await
                    .map_err(|_| timeout_error("version probe", limit))??)
            }
        }
    };
}

impl_backend!(
    mysql,
    sqlx::MySql,
    version_sql = "SELECT version()",
    last_insert_id = |result| i64::try_from(result.last_insert_id())
        .ok()
        .filter(|id| *id != 0),
);

impl_backend!(
    postgres,
    sqlx::Postgres,
    version_sql = "SELECT version()",
    last_insert_id = |result| None,
);

impl_backend!(
    sqlite,
    sqlx::Sqlite,
    version_sql = "SELECT sqlite_version()",
    last_insert_id = |result| Some(result.last_insert_rowid()).filter(|id| *id != 0),
);
