//! Transaction nesting.
//!
//! A [`Provider`] owns at most one real transaction on its resource and
//! models nested units of work as savepoints inside it:
//!
//! ```text
//!            enter                 enter
//!   Idle ──────────────▶ Open ──────────────▶ Nested(1) ──▶ Nested(2) ...
//!    ▲   BEGIN            │    SAVEPOINT sp_1     │  SAVEPOINT sp_2
//!    │                    │                       │
//!    └── commit/rollback ─┘   ◀── commit (no-op) ─┤
//!        COMMIT/ROLLBACK          rollback ───────┘
//!                                 ROLLBACK TO SAVEPOINT sp_n
//! ```
//!
//! Statements go through [`Provider::current_executor`], which is the open
//! transaction when there is one and the resource otherwise, so the same
//! code works both inside and outside a transaction.

use crate::db::{PoolStats, Resource, SqlExecutor, Transaction};
use crate::error::{DbError, DbResult};
use crate::models::{ExecuteResult, QueryParam, QueryRows};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Where a provider is in its transaction lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "depth", rename_all = "snake_case")]
pub enum ProviderState {
    /// No transaction; statements run on the resource.
    Idle,
    /// A real transaction with no savepoints entered.
    Open,
    /// A real transaction with this many savepoint levels entered (`>= 1`).
    Nested(usize),
}

/// Snapshot of a provider's open transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionInfo {
    pub provider_id: String,
    pub depth: usize,
    pub started_at: DateTime<Utc>,
}

/// Transaction-nesting front end for one resource.
///
/// A provider is used by one task at a time; every transition takes
/// `&mut self`. Independent providers over the same resource each get their
/// own connection and transaction.
///
/// Dropping a provider with an open transaction drops the transaction, which
/// for [`DbTransaction`](crate::db::DbTransaction) closes its connection so
/// the server rolls it back.
pub struct Provider<R: Resource> {
    id: String,
    resource: R,
    transaction: Option<R::Transaction>,
    /// Savepoint levels entered; only meaningful while `transaction` is set
    depth: usize,
    started_at: Option<DateTime<Utc>>,
}

impl<R: Resource> Provider<R> {
    pub fn new(resource: R) -> Self {
        let id = format!("prv_{}", uuid::Uuid::new_v4().simple());
        debug!(provider_id = %id, "Provider created");
        Self {
            id,
            resource,
            transaction: None,
            depth: 0,
            started_at: None,
        }
    }

    /// Identifier used as the savepoint name prefix.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn state(&self) -> ProviderState {
        match (&self.transaction, self.depth) {
            (None, _) => ProviderState::Idle,
            (Some(_), 0) => ProviderState::Open,
            (Some(_), n) => ProviderState::Nested(n),
        }
    }

    /// Number of savepoint levels entered. `0` when idle or in the outermost
    /// transaction.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn transaction_info(&self) -> Option<TransactionInfo> {
        let started_at = self.started_at?;
        self.transaction.as_ref().map(|_| TransactionInfo {
            provider_id: self.id.clone(),
            depth: self.depth,
            started_at,
        })
    }

    /// Name of the savepoint backing nesting level `level`.
    pub fn savepoint_name(&self, level: usize) -> String {
        format!("{}_sp_{}", self.id, level)
    }

    /// Begin a unit of work.
    ///
    /// Starts the real transaction when idle and returns `0`; otherwise
    /// creates a savepoint for the next level and returns that level.
    pub async fn enter_transaction(&mut self) -> DbResult<usize> {
        let Some(transaction) = self.transaction.as_mut() else {
            let transaction = self.resource.begin().await.map_err(|e| {
                warn!(provider_id = %self.id, error = %e, "Failed to begin transaction");
                DbError::begin_failed(e)
            })?;
            self.transaction = Some(transaction);
            self.depth = 0;
            self.started_at = Some(Utc::now());
            info!(provider_id = %self.id, "Transaction started");
            return Ok(0);
        };

        let level = self.depth + 1;
        let savepoint = format!("{}_sp_{}", self.id, level);
        if let Err(e) = transaction.savepoint(&savepoint).await {
            warn!(provider_id = %self.id, savepoint = %savepoint, error = %e, "Failed to create savepoint");
            return Err(DbError::savepoint_failed(savepoint, e));
        }
        self.depth = level;
        debug!(provider_id = %self.id, depth = level, savepoint = %savepoint, "Entered nested transaction");
        Ok(level)
    }

    /// Finish the innermost unit of work, keeping its effects.
    ///
    /// A nested commit only pops a level; its effects become permanent when
    /// the outermost transaction commits.
    pub async fn commit(&mut self) -> DbResult<()> {
        let Some(transaction) = self.transaction.as_mut() else {
            return Err(DbError::NoActiveTransaction);
        };

        if self.depth > 0 {
            self.depth -= 1;
            debug!(provider_id = %self.id, depth = self.depth, "Nested transaction committed");
            return Ok(());
        }

        if let Err(e) = transaction.commit().await {
            warn!(provider_id = %self.id, error = %e, "Commit failed; transaction left open");
            return Err(DbError::commit_failed(e));
        }
        self.finish();
        info!(provider_id = %self.id, "Transaction committed");
        Ok(())
    }

    /// Undo the innermost unit of work.
    ///
    /// Nested levels roll back to their savepoint; the outermost level rolls
    /// back the real transaction.
    pub async fn rollback(&mut self) -> DbResult<()> {
        let Some(transaction) = self.transaction.as_mut() else {
            return Err(DbError::NoActiveTransaction);
        };

        if self.depth > 0 {
            let savepoint = format!("{}_sp_{}", self.id, self.depth);
            if let Err(e) = transaction.rollback_to_savepoint(&savepoint).await {
                warn!(provider_id = %self.id, savepoint = %savepoint, error = %e, "Rollback to savepoint failed");
                return Err(DbError::rollback_failed(Some(savepoint), e));
            }
            self.depth -= 1;
            debug!(provider_id = %self.id, depth = self.depth, savepoint = %savepoint, "Nested transaction rolled back");
            return Ok(());
        }

        if let Err(e) = transaction.rollback().await {
            warn!(provider_id = %self.id, error = %e, "Rollback failed; transaction left open");
            return Err(DbError::rollback_failed(None, e));
        }
        self.finish();
        info!(provider_id = %self.id, "Transaction rolled back");
        Ok(())
    }

    /// Undo everything since nesting level `level` was entered, leaving that
    /// level open.
    ///
    /// A `level` deeper than the current depth has already been committed or
    /// rolled back and is a no-op. Level `0` has no savepoint; use
    /// [`rollback`](Self::rollback) for the real transaction.
    pub async fn rollback_to(&mut self, level: usize) -> DbResult<()> {
        let Some(transaction) = self.transaction.as_mut() else {
            return Err(DbError::NoActiveTransaction);
        };

        if level == 0 {
            return Err(DbError::invalid_input(
                "Level 0 has no savepoint; use rollback() to undo the whole transaction",
            ));
        }
        if level > self.depth {
            debug!(provider_id = %self.id, level, depth = self.depth, "Savepoint already released");
            return Ok(());
        }

        let savepoint = format!("{}_sp_{}", self.id, level);
        if let Err(e) = transaction.rollback_to_savepoint(&savepoint).await {
            warn!(provider_id = %self.id, savepoint = %savepoint, error = %e, "Rollback to savepoint failed");
            return Err(DbError::rollback_failed(Some(savepoint), e));
        }
        self.depth = level;
        debug!(provider_id = %self.id, depth = level, savepoint = %savepoint, "Rolled back to savepoint");
        Ok(())
    }

    /// The executor statements should run on right now.
    pub fn current_executor(&mut self) -> Executor<'_, R> {
        match self.transaction.as_mut() {
            Some(transaction) => Executor::Transaction(transaction),
            None => Executor::Resource(&mut self.resource),
        }
    }

    /// Close the resource.
    ///
    /// An open transaction is abandoned first; the pool cannot finish closing
    /// while a connection is still checked out.
    pub async fn close(&mut self) {
        if self.transaction.is_some() {
            warn!(provider_id = %self.id, depth = self.depth, "Closing with an open transaction; abandoning it");
            self.finish();
        }
        self.resource.close().await;
    }

    pub async fn ping(&self) -> DbResult<()> {
        self.resource.ping().await
    }

    pub fn stats(&self) -> PoolStats {
        self.resource.stats()
    }

    fn finish(&mut self) {
        self.transaction = None;
        self.depth = 0;
        self.started_at = None;
    }
}

impl<R: Resource + std::fmt::Debug> std::fmt::Debug for Provider<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("id", &self.id)
            .field("resource", &self.resource)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// The executor a provider currently routes statements to.
pub enum Executor<'a, R: Resource> {
    Resource(&'a mut R),
    Transaction(&'a mut R::Transaction),
}

impl<R: Resource> Executor<'_, R> {
    pub fn is_transaction(&self) -> bool {
        matches!(self, Executor::Transaction(_))
    }
}

impl<R: Resource> SqlExecutor for Executor<'_, R> {
    async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<ExecuteResult> {
        match self {
            Executor::Resource(resource) => resource.execute(sql, params).await,
            Executor::Transaction(transaction) => transaction.execute(sql, params).await,
        }
    }

    async fn query(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<QueryRows> {
        match self {
            Executor::Resource(resource) => resource.query(sql, params).await,
            Executor::Transaction(transaction) => transaction.query(sql, params).await,
        }
    }
}
