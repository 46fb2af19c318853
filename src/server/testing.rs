//! In-memory SPI implementations for unit tests.
//!
//! `FakeQueryExecutor` understands a tiny statement language:
//!
//! - `RETURN a, b, ...` yields one record; integer expressions become
//!   integers, anything else is returned as its text.
//! - statements starting with `FAIL` are rejected with a syntax error.
//! - statements containing `BOOM` are accepted but fail to start.
//! - anything else yields an empty result.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::bolt::{AuthToken, BoltError, BoltErrorCode, BoltFailure, BoltMap, BoltResult, BoltValue};

use super::bookmark::Bookmark;
use super::result::{QueryResult, RecordsResult};
use super::spi::{
    AuthResult, Authenticator, ConnectionInfo, ErrorReporter, QueryExecutor, ResultHandle,
    TransactionHandle,
};

// ============================================================================
// Authentication
// ============================================================================

/// Accepts exactly one principal/credentials pair.
#[derive(Debug, Clone)]
pub struct FakeAuthenticator {
    principal: String,
    credentials: String,
    credentials_expired: bool,
}

impl FakeAuthenticator {
    pub fn accepting(principal: &str, credentials: &str) -> Self {
        Self {
            principal: principal.to_string(),
            credentials: credentials.to_string(),
            credentials_expired: false,
        }
    }

    pub fn with_expired_credentials(mut self) -> Self {
        self.credentials_expired = true;
        self
    }
}

impl Authenticator for FakeAuthenticator {
    fn authenticate(&self, token: &AuthToken, _info: &ConnectionInfo) -> BoltResult<AuthResult> {
        let matches = token.principal.as_deref() == Some(self.principal.as_str())
            && token.credentials.as_deref() == Some(self.credentials.as_str());
        if !matches {
            return Err(BoltError::authentication(
                "The client is unauthorized due to authentication failure.",
            ));
        }
        let mut auth = AuthResult::new(self.principal.clone());
        auth.credentials_expired = self.credentials_expired;
        Ok(auth)
    }
}

// ============================================================================
// Execution
// ============================================================================

#[derive(Debug, Default)]
struct ExecutorLog {
    executed: Vec<String>,
    executed_in_transactions: Vec<String>,
    closed_handles: Vec<bool>,
    terminations: usize,
    transactions_begun: usize,
    begin_bookmarks: Vec<Option<Bookmark>>,
    commits: usize,
    rollbacks: usize,
    last_timeout: Option<Duration>,
    newest_tx_id: u64,
    fail_commits: bool,
    fail_rollbacks: bool,
}

type SharedLog = Arc<Mutex<ExecutorLog>>;

/// Executor recording every call it receives.
#[derive(Debug, Default)]
pub struct FakeQueryExecutor {
    log: SharedLog,
}

impl FakeQueryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_newest_tx_id(&self, tx_id: u64) {
        self.log.lock().newest_tx_id = tx_id;
    }

    pub fn fail_commits(&self) {
        self.log.lock().fail_commits = true;
    }

    pub fn fail_rollbacks(&self) {
        self.log.lock().fail_rollbacks = true;
    }

    /// Auto-commit statements, in order.
    pub fn executed(&self) -> Vec<String> {
        self.log.lock().executed.clone()
    }

    /// Statements run inside explicit transactions, in order.
    pub fn executed_in_transactions(&self) -> Vec<String> {
        self.log.lock().executed_in_transactions.clone()
    }

    /// Success flag of every `ResultHandle::close`, in order.
    pub fn closed_handles(&self) -> Vec<bool> {
        self.log.lock().closed_handles.clone()
    }

    /// Calls to `terminate` on result and transaction handles.
    pub fn terminations(&self) -> usize {
        self.log.lock().terminations
    }

    pub fn transactions_begun(&self) -> usize {
        self.log.lock().transactions_begun
    }

    pub fn begin_bookmarks(&self) -> Vec<Option<Bookmark>> {
        self.log.lock().begin_bookmarks.clone()
    }

    pub fn commits(&self) -> usize {
        self.log.lock().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.log.lock().rollbacks
    }

    pub fn last_timeout(&self) -> Option<Duration> {
        self.log.lock().last_timeout
    }
}

fn plan(log: &SharedLog, statement: &str) -> BoltResult<Arc<dyn ResultHandle>> {
    if statement.trim_start().starts_with("FAIL") {
        return Err(BoltError::client(
            BoltErrorCode::SYNTAX_ERROR,
            format!("Invalid input '{}'", statement),
        ));
    }

    let (fields, records) = match statement.trim().strip_prefix("RETURN ") {
        Some(projection) => {
            let fields: Vec<String> = projection.split(',').map(|f| f.trim().to_string()).collect();
            let record = fields
                .iter()
                .map(|f| match f.parse::<i64>() {
                    Ok(n) => BoltValue::Integer(n),
                    Err(_) => BoltValue::String(f.clone()),
                })
                .collect();
            (fields, vec![record])
        }
        None => (Vec::new(), Vec::new()),
    };

    Ok(Arc::new(FakeResultHandle {
        log: Arc::clone(log),
        fields,
        records,
        fail_start: statement.contains("BOOM"),
    }))
}

impl QueryExecutor for FakeQueryExecutor {
    fn execute_query(
        &self,
        _auth: &AuthResult,
        statement: &str,
        _params: &BoltMap,
        _bookmark: Option<&Bookmark>,
        timeout: Option<Duration>,
        _metadata: Option<&BoltMap>,
    ) -> BoltResult<Arc<dyn ResultHandle>> {
        {
            let mut log = self.log.lock();
            log.executed.push(statement.to_string());
            log.last_timeout = timeout;
        }
        plan(&self.log, statement)
    }

    fn begin_transaction(
        &self,
        _auth: &AuthResult,
        bookmark: Option<&Bookmark>,
        timeout: Option<Duration>,
        _metadata: Option<&BoltMap>,
    ) -> BoltResult<Arc<dyn TransactionHandle>> {
        let mut log = self.log.lock();
        log.transactions_begun += 1;
        log.begin_bookmarks.push(bookmark.copied());
        log.last_timeout = timeout;
        Ok(Arc::new(FakeTransaction {
            log: Arc::clone(&self.log),
        }))
    }

    fn newest_encountered_tx_id(&self) -> u64 {
        self.log.lock().newest_tx_id
    }
}

struct FakeResultHandle {
    log: SharedLog,
    fields: Vec<String>,
    records: Vec<Vec<BoltValue>>,
    fail_start: bool,
}

impl ResultHandle for FakeResultHandle {
    fn start(&self) -> BoltResult<Box<dyn QueryResult>> {
        if self.fail_start {
            return Err(BoltError::database("Statement failed to start"));
        }
        Ok(Box::new(RecordsResult::new(self.fields.clone(), self.records.clone())))
    }

    fn close(&self, success: bool) {
        self.log.lock().closed_handles.push(success);
    }

    fn terminate(&self) {
        self.log.lock().terminations += 1;
    }
}

struct FakeTransaction {
    log: SharedLog,
}

impl TransactionHandle for FakeTransaction {
    fn execute_query(
        &self,
        statement: &str,
        _params: &BoltMap,
    ) -> BoltResult<Arc<dyn ResultHandle>> {
        self.log.lock().executed_in_transactions.push(statement.to_string());
        plan(&self.log, statement)
    }

    fn commit(&self) -> BoltResult<()> {
        let mut log = self.log.lock();
        if log.fail_commits {
            return Err(BoltError::database("Commit failed"));
        }
        log.commits += 1;
        log.newest_tx_id += 1;
        Ok(())
    }

    fn rollback(&self) -> BoltResult<()> {
        let mut log = self.log.lock();
        if log.fail_rollbacks {
            return Err(BoltError::database("Rollback failed"));
        }
        log.rollbacks += 1;
        Ok(())
    }

    fn terminate(&self) {
        self.log.lock().terminations += 1;
    }
}

// ============================================================================
// Reporting
// ============================================================================

/// Keeps every reported failure.
#[derive(Debug, Default)]
pub struct RecordingErrorReporter {
    reported: Mutex<Vec<BoltFailure>>,
}

impl RecordingErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reported(&self) -> Vec<BoltFailure> {
        self.reported.lock().clone()
    }
}

impl ErrorReporter for RecordingErrorReporter {
    fn report(&self, failure: &BoltFailure) {
        self.reported.lock().push(failure.clone());
    }
}
