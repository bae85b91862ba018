//! Error types for txnest.
//!
//! Every fallible operation in the crate returns [`DbError`]. Failures reported
//! by the underlying resource during a transaction transition are wrapped in a
//! transition-specific variant that keeps the original error as its `source`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("No active transaction")]
    NoActiveTransaction,

    #[error("Database name conflict: '{name}' is already registered")]
    NameConflict { name: String },

    #[error("No such database: '{name}'")]
    NameNotFound { name: String },

    #[error("Failed to begin transaction: {source}")]
    BeginFailed { source: Box<DbError> },

    #[error("Failed to create savepoint '{savepoint}': {source}")]
    SavepointFailed {
        savepoint: String,
        source: Box<DbError>,
    },

    #[error("Failed to commit transaction: {source}")]
    CommitFailed { source: Box<DbError> },

    #[error("Failed to roll back{}: {source}", savepoint_suffix(.savepoint))]
    RollbackFailed {
        /// Target savepoint, `None` for a rollback of the real transaction
        savepoint: Option<String>,
        source: Box<DbError>,
    },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn savepoint_suffix(savepoint: &Option<String>) -> String {
    match savepoint {
        Some(name) => format!(" to savepoint '{}'", name),
        None => String::new(),
    }
}

impl DbError {
    /// Create a name conflict error.
    pub fn name_conflict(name: impl Into<String>) -> Self {
        Self::NameConflict { name: name.into() }
    }

    /// Create a name not found error.
    pub fn name_not_found(name: impl Into<String>) -> Self {
        Self::NameNotFound { name: name.into() }
    }

    pub fn begin_failed(source: DbError) -> Self {
        Self::BeginFailed {
            source: Box::new(source),
        }
    }

    pub fn savepoint_failed(savepoint: impl Into<String>, source: DbError) -> Self {
        Self::SavepointFailed {
            savepoint: savepoint.into(),
            source: Box::new(source),
        }
    }

    pub fn commit_failed(source: DbError) -> Self {
        Self::CommitFailed {
            source: Box::new(source),
        }
    }

    /// Create a rollback error. `savepoint` is `None` when the real
    /// transaction was being rolled back.
    pub fn rollback_failed(savepoint: Option<String>, source: DbError) -> Self {
        Self::RollbackFailed {
            savepoint,
            source: Box::new(source),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    ///
    /// Transition errors report the suggestion of the error they wrap.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            _ => self.underlying().and_then(DbError::suggestion),
        }
    }

    /// The resource error behind a failed begin/savepoint/commit/rollback.
    pub fn underlying(&self) -> Option<&DbError> {
        match self {
            Self::BeginFailed { source }
            | Self::SavepointFailed { source, .. }
            | Self::CommitFailed { source }
            | Self::RollbackFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    ///
    /// A transition error is retryable when the error it wraps is.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { .. } | Self::Timeout { .. } => true,
            _ => self.underlying().is_some_and(DbError::is_retryable),
        }
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => DbError::timeout("connection pool acquire", 30),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Register the database again")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::invalid_input(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
