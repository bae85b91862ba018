//! Recording in-memory resource for unit tests.
//!
//! Every call lands in a shared journal so tests can assert the exact
//! sequence of transaction control operations. Operations can be made to
//! fail with [`MockResource::fail`].

use crate::db::executor::SqlExecutor;
use crate::db::resource::{PoolStats, Resource, Transaction};
use crate::error::{DbError, DbResult};
use crate::models::{ExecuteResult, QueryParam, QueryRows};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Begin,
    Commit,
    Rollback,
    Savepoint,
    RollbackTo,
    Statement,
    Ping,
}

#[derive(Debug, Default)]
struct MockState {
    journal: Vec<String>,
    failing: HashSet<MockOp>,
    open_transactions: usize,
    closed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockResource {
    state: Arc<Mutex<MockState>>,
}

impl MockResource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `op` fail until [`recover`](Self::recover) is called.
    pub fn fail(&self, op: MockOp) {
        self.state.lock().unwrap().failing.insert(op);
    }

    pub fn recover(&self, op: MockOp) {
        self.state.lock().unwrap().failing.remove(&op);
    }

    pub fn journal(&self) -> Vec<String> {
        self.state.lock().unwrap().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.state.lock().unwrap().journal.clear();
    }

    /// Transactions begun and not yet committed, rolled back or dropped.
    pub fn open_transactions(&self) -> usize {
        self.state.lock().unwrap().open_transactions
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// Record `entry`, or fail it if `op` is set to fail.
    fn record(&self, op: MockOp, entry: String) -> DbResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing.contains(&op) {
            state.journal.push(format!("FAILED {entry}"));
            return Err(DbError::database(
                format!("injected {op:?} failure"),
                None,
                "Injected by the test",
            ));
        }
        state.journal.push(entry);
        Ok(())
    }
}

impl SqlExecutor for MockResource {
    async fn execute(&mut self, sql: &str, _params: &[QueryParam]) -> DbResult<ExecuteResult> {
        self.record(MockOp::Statement, format!("resource: {sql}"))?;
        Ok(ExecuteResult::default())
    }

    async fn query(&mut self, sql: &str, _params: &[QueryParam]) -> DbResult<QueryRows> {
        self.record(MockOp::Statement, format!("resource: {sql}"))?;
        Ok(QueryRows::default())
    }
}

impl Resource for MockResource {
    type Transaction = MockTransaction;

    async fn begin(&self) -> DbResult<MockTransaction> {
        self.record(MockOp::Begin, "BEGIN".to_string())?;
        self.state.lock().unwrap().open_transactions += 1;
        Ok(MockTransaction {
            resource: self.clone(),
            finished: false,
        })
    }

    async fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.journal.push("CLOSE".to_string());
        state.closed = true;
    }

    async fn ping(&self) -> DbResult<()> {
        self.record(MockOp::Ping, "PING".to_string())
    }

    fn stats(&self) -> PoolStats {
        let state = self.state.lock().unwrap();
        let in_use = u32::try_from(state.open_transactions).unwrap_or(u32::MAX);
        PoolStats {
            max_connections: 5,
            open_connections: in_use,
            idle: 0,
            in_use,
            closed: state.closed,
        }
    }
}

#[derive(Debug)]
pub struct MockTransaction {
    resource: MockResource,
    finished: bool,
}

impl MockTransaction {
    fn ensure_open(&self) -> DbResult<()> {
        if self.finished {
            Err(DbError::NoActiveTransaction)
        } else {
            Ok(())
        }
    }

    fn finish(&mut self, op: MockOp, entry: &str) -> DbResult<()> {
        self.ensure_open()?;
        self.resource.record(op, entry.to_string())?;
        self.finished = true;
        self.resource.state.lock().unwrap().open_transactions -= 1;
        Ok(())
    }
}

impl SqlExecutor for MockTransaction {
    async fn execute(&mut self, sql: &str, _params: &[QueryParam]) -> DbResult<ExecuteResult> {
        self.ensure_open()?;
        self.resource
            .record(MockOp::Statement, format!("tx: {sql}"))?;
        Ok(ExecuteResult::default())
    }

    async fn query(&mut self, sql: &str, _params: &[QueryParam]) -> DbResult<QueryRows> {
        self.ensure_open()?;
        self.resource
            .record(MockOp::Statement, format!("tx: {sql}"))?;
        Ok(QueryRows::default())
    }
}

impl Transaction for MockTransaction {
    async fn commit(&mut self) -> DbResult<()> {
        self.finish(MockOp::Commit, "COMMIT")
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.finish(MockOp::Rollback, "ROLLBACK")
    }

    async fn savepoint(&mut self, name: &str) -> DbResult<()> {
        self.ensure_open()?;
        self.resource
            .record(MockOp::Savepoint, format!("SAVEPOINT {name}"))
    }

    async fn rollback_to_savepoint(&mut self, name: &str) -> DbResult<()> {
        self.ensure_open()?;
        self.resource
            .record(MockOp::RollbackTo, format!("ROLLBACK TO SAVEPOINT {name}"))
    }
}

impl Drop for MockTransaction {
    fn drop(&mut self) {
        if !self.finished {
            let mut state = self.resource.state.lock().unwrap();
            state.journal.push("DISCARD".to_string());
            state.open_transactions -= 1;
        }
    }
}
