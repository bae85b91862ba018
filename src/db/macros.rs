//! Backend dispatch macros.
//!
//! `DbPool` and `DbConnection` share the same three variants. These macros
//! write the match once and expand it per backend with the inner value bound
//! to its concrete sqlx type.

/// Match on a backend enum and evaluate `$body` for whichever variant is set.
///
/// The two-binding form also brings the backend's executor module into scope
/// under the given name, so the body can call `backend::execute(..)` and
/// have it resolve to the MySQL, PostgreSQL or SQLite implementation.
///
/// ```ignore
/// impl_db_dispatch!(DbPool, &self.pool, |pool| pool.close().await);
///
/// impl_db_dispatch!(DbConnection, &mut self.connection, |conn, backend| {
///     backend::execute(conn, sql, params, limit).await
/// })
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($enum:ident, $value:expr, |$inner:ident| $body:expr) => {
        match $value {
            $crate::db::$enum::MySql($inner) => $body,
            $crate::db::$enum::Postgres($inner) => $body,
            $crate::db::$enum::SQLite($inner) => $body,
        }
    };
    ($enum:ident, $value:expr, |$inner:ident, $backend:ident| $body:expr) => {
        match $value {
            $crate::db::$enum::MySql($inner) => {
                use $crate::db::executor::mysql as $backend;
                $body
            }
            $crate::db::$enum::Postgres($inner) => {
                use $crate::db::executor::postgres as $backend;
                $body
            }
            $crate::db::$enum::SQLite($inner) => {
                use $crate::db::executor::sqlite as $backend;
                $body
            }
        }
    };
}

pub use impl_db_dispatch;
