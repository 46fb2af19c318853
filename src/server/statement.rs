//! Statement processing and the auto-commit / explicit transaction
//! sub-machine.
//!
//! A [`TransactionStateMachine`] owns at most one open result at a time.
//! Every exit path (streaming, consumer failure, rollback, reset, drop)
//! closes the result and its backing handle exactly once.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::bolt::{BoltError, BoltErrorCode, BoltMap, BoltResult};

use super::bookmark::Bookmark;
use super::result::{BookmarkResult, EmptyResult, QueryResult};
use super::spi::{AuthResult, QueryExecutor, ResultHandle, TransactionHandle};

/// Callback handed the open result by [`StatementProcessor::stream_result`].
pub type ResultConsumer<'a> = dyn FnMut(&mut dyn QueryResult) -> BoltResult<()> + 'a;

// ============================================================================
// TxState
// ============================================================================

/// Transaction sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxState {
    /// Every RUN is its own implicit transaction.
    #[default]
    AutoCommit,
    /// A client-opened transaction spans RUNs until COMMIT/ROLLBACK.
    ExplicitTransaction,
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxState::AutoCommit => f.write_str("AUTO_COMMIT"),
            TxState::ExplicitTransaction => f.write_str("EXPLICIT_TRANSACTION"),
        }
    }
}

// ============================================================================
// StatementMetadata
// ============================================================================

/// What RUN reports back about the statement it opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementMetadata {
    field_names: Vec<String>,
}

impl StatementMetadata {
    /// No fields; used by BEGIN/COMMIT/ROLLBACK.
    pub const EMPTY: StatementMetadata = StatementMetadata {
        field_names: Vec::new(),
    };

    /// Metadata with the given column names.
    pub fn new(field_names: Vec<String>) -> Self {
        Self { field_names }
    }

    /// Column names of the opened result.
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }
}

// ============================================================================
// TransactionTerminator
// ============================================================================

/// Cross-thread view of whatever is currently executing.
///
/// The owning session registers handles here; `interrupt()` and
/// `mark_for_termination()` use it from other threads to request
/// cancellation without touching the processor itself.
#[derive(Default)]
pub struct TransactionTerminator {
    transaction: Mutex<Option<Arc<dyn TransactionHandle>>>,
    statement: Mutex<Option<Arc<dyn ResultHandle>>>,
}

impl TransactionTerminator {
    /// Empty terminator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the current transaction and statement.
    /// Never waits for the engine to confirm.
    pub fn terminate(&self) {
        if let Some(statement) = self.statement.lock().as_ref() {
            statement.terminate();
        }
        if let Some(transaction) = self.transaction.lock().as_ref() {
            transaction.terminate();
        }
    }

    /// Whether anything is registered for termination.
    pub fn is_active(&self) -> bool {
        self.statement.lock().is_some() || self.transaction.lock().is_some()
    }

    fn set_transaction(&self, transaction: Option<Arc<dyn TransactionHandle>>) {
        *self.transaction.lock() = transaction;
    }

    fn set_statement(&self, statement: Option<Arc<dyn ResultHandle>>) {
        *self.statement.lock() = statement;
    }
}

impl fmt::Debug for TransactionTerminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionTerminator")
            .field("statement", &self.statement.lock().is_some())
            .field("transaction", &self.transaction.lock().is_some())
            .finish()
    }
}

// ============================================================================
// StatementProcessor
// ============================================================================

/// Drives statement execution for one session.
///
/// Not thread-safe: only the session-owning task may call it. Cross-thread
/// cancellation goes through [`TransactionTerminator`].
pub trait StatementProcessor: Send {
    /// Open an explicit transaction. Fails if one is already open.
    fn begin_transaction(
        &mut self,
        bookmark: Option<Bookmark>,
        timeout: Option<Duration>,
        metadata: Option<BoltMap>,
    ) -> BoltResult<()>;

    /// Execute a statement. Empty text repeats the last statement.
    fn run(
        &mut self,
        statement: &str,
        params: BoltMap,
        bookmark: Option<Bookmark>,
        timeout: Option<Duration>,
        metadata: Option<BoltMap>,
    ) -> BoltResult<StatementMetadata>;

    /// Hand the open result to `consumer`, then close it. Returns a
    /// bookmark when streaming completed an auto-commit transaction.
    fn stream_result(&mut self, consumer: &mut ResultConsumer<'_>) -> BoltResult<Option<Bookmark>>;

    /// Commit the explicit transaction and stage a bookmark-only result.
    fn commit_transaction(&mut self) -> BoltResult<Bookmark>;

    /// Roll back the explicit transaction, if any.
    fn rollback_transaction(&mut self) -> BoltResult<()>;

    /// Terminate and roll back whatever is in flight and return to
    /// auto-commit.
    fn reset(&mut self) -> BoltResult<()>;

    /// Whether a result handle is currently held.
    fn has_open_statement(&self) -> bool;

    /// Current transaction sub-state.
    fn tx_state(&self) -> TxState;
}

// ============================================================================
// TransactionStateMachine
// ============================================================================

/// [`StatementProcessor`] bound to an authenticated identity.
pub struct TransactionStateMachine {
    executor: Arc<dyn QueryExecutor>,
    auth: AuthResult,
    terminator: Arc<TransactionTerminator>,
    state: TxState,
    last_statement: String,
    current_result: Option<Box<dyn QueryResult>>,
    current_result_handle: Option<Arc<dyn ResultHandle>>,
    current_transaction: Option<Arc<dyn TransactionHandle>>,
}

impl TransactionStateMachine {
    /// Processor for an authenticated session.
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        auth: AuthResult,
        terminator: Arc<TransactionTerminator>,
    ) -> Self {
        Self {
            executor,
            auth,
            terminator,
            state: TxState::AutoCommit,
            last_statement: String::new(),
            current_result: None,
            current_result_handle: None,
            current_transaction: None,
        }
    }

    /// Identity the processor executes as.
    pub fn auth(&self) -> &AuthResult {
        &self.auth
    }

    /// Most recently executed statement text.
    pub fn last_statement(&self) -> &str {
        &self.last_statement
    }

    /// Whether a result (possibly without a handle) is staged.
    pub fn has_current_result(&self) -> bool {
        self.current_result.is_some()
    }

    fn statement_to_run(&mut self, statement: &str) -> String {
        if statement.is_empty() {
            self.last_statement.clone()
        } else {
            self.last_statement = statement.to_string();
            statement.to_string()
        }
    }

    fn ensure_no_open_statement(&self) -> BoltResult<()> {
        if self.has_open_statement() {
            return Err(BoltError::client(
                BoltErrorCode::REQUEST_INVALID,
                "A result is still open; consume it with PULL_ALL or DISCARD_ALL first.",
            ));
        }
        Ok(())
    }

    /// Single entry point for starting execution. A handle whose start
    /// fails is closed and forgotten before the error propagates.
    fn start_execution(&mut self, handle: Arc<dyn ResultHandle>) -> BoltResult<StatementMetadata> {
        self.current_result_handle = Some(Arc::clone(&handle));
        self.terminator.set_statement(Some(Arc::clone(&handle)));

        match handle.start() {
            Ok(result) => {
                let metadata = StatementMetadata::new(result.field_names().to_vec());
                self.current_result = Some(result);
                Ok(metadata)
            }
            Err(err) => {
                handle.close(false);
                self.current_result_handle = None;
                self.terminator.set_statement(None);
                Err(err)
            }
        }
    }

    fn close_current_result(&mut self, success: bool) {
        self.current_result = None;
        if let Some(handle) = self.current_result_handle.take() {
            handle.close(success);
            self.terminator.set_statement(None);
        }
    }

    fn end_transaction(&mut self) -> Option<Arc<dyn TransactionHandle>> {
        self.terminator.set_transaction(None);
        self.state = TxState::AutoCommit;
        self.current_transaction.take()
    }

    fn newest_bookmark(&self) -> Bookmark {
        Bookmark::new(self.executor.newest_encountered_tx_id())
    }
}

impl StatementProcessor for TransactionStateMachine {
    fn begin_transaction(
        &mut self,
        bookmark: Option<Bookmark>,
        timeout: Option<Duration>,
        metadata: Option<BoltMap>,
    ) -> BoltResult<()> {
        match self.state {
            TxState::ExplicitTransaction => Err(BoltError::client(
                BoltErrorCode::SEMANTIC_ERROR,
                "Nested transactions are not supported.",
            )),
            TxState::AutoCommit => {
                self.ensure_no_open_statement()?;
                let transaction = self.executor.begin_transaction(
                    &self.auth,
                    bookmark.as_ref(),
                    timeout,
                    metadata.as_ref(),
                )?;
                self.terminator.set_transaction(Some(Arc::clone(&transaction)));
                self.current_transaction = Some(transaction);
                self.current_result = Some(Box::new(EmptyResult));
                self.state = TxState::ExplicitTransaction;
                debug!(principal = %self.auth.principal, "Explicit transaction started");
                Ok(())
            }
        }
    }

    fn run(
        &mut self,
        statement: &str,
        params: BoltMap,
        bookmark: Option<Bookmark>,
        timeout: Option<Duration>,
        metadata: Option<BoltMap>,
    ) -> BoltResult<StatementMetadata> {
        self.ensure_no_open_statement()?;

        match self.state {
            TxState::AutoCommit => {
                let statement = self.statement_to_run(statement);
                let handle = self.executor.execute_query(
                    &self.auth,
                    &statement,
                    &params,
                    bookmark.as_ref(),
                    timeout,
                    metadata.as_ref(),
                )?;
                self.start_execution(handle)
            }
            TxState::ExplicitTransaction => {
                if timeout.is_some() || metadata.is_some() {
                    return Err(BoltError::client(
                        BoltErrorCode::REQUEST_INVALID,
                        "Transaction timeout and metadata can only be set on BEGIN.",
                    ));
                }
                let transaction = self.current_transaction.clone().ok_or_else(|| {
                    BoltError::fatal("Explicit transaction state without an open transaction")
                })?;
                let statement = self.statement_to_run(statement);
                let handle = transaction.execute_query(&statement, &params)?;
                self.start_execution(handle)
            }
        }
    }

    fn stream_result(&mut self, consumer: &mut ResultConsumer<'_>) -> BoltResult<Option<Bookmark>> {
        let outcome = match self.current_result.as_mut() {
            Some(result) => consumer(&mut **result),
            None => Err(BoltError::client(
                BoltErrorCode::REQUEST_INVALID,
                "No result available to stream.",
            )),
        };
        self.close_current_result(outcome.is_ok());
        outcome?;

        match self.state {
            TxState::AutoCommit => Ok(Some(self.newest_bookmark())),
            TxState::ExplicitTransaction => Ok(None),
        }
    }

    fn commit_transaction(&mut self) -> BoltResult<Bookmark> {
        if self.state == TxState::AutoCommit {
            return Err(BoltError::client(
                BoltErrorCode::SEMANTIC_ERROR,
                "No current transaction to commit.",
            ));
        }

        self.close_current_result(true);
        let committed = match self.end_transaction() {
            Some(transaction) => transaction.commit(),
            None => Ok(()),
        };
        committed?;

        let bookmark = self.newest_bookmark();
        self.current_result = Some(Box::new(BookmarkResult::new(bookmark)));
        debug!(%bookmark, "Explicit transaction committed");
        Ok(bookmark)
    }

    fn rollback_transaction(&mut self) -> BoltResult<()> {
        self.close_current_result(false);
        let rolled_back = match self.end_transaction() {
            Some(transaction) => transaction.rollback(),
            None => Ok(()),
        };
        rolled_back?;

        self.current_result = Some(Box::new(EmptyResult));
        Ok(())
    }

    fn reset(&mut self) -> BoltResult<()> {
        if let Some(handle) = self.current_result_handle.as_ref() {
            handle.terminate();
        }
        self.close_current_result(false);

        match self.end_transaction() {
            Some(transaction) => {
                transaction.terminate();
                transaction.rollback()
            }
            None => Ok(()),
        }
    }

    fn has_open_statement(&self) -> bool {
        self.current_result_handle.is_some()
    }

    fn tx_state(&self) -> TxState {
        self.state
    }
}

impl Drop for TransactionStateMachine {
    fn drop(&mut self) {
        self.close_current_result(false);
        if let Some(transaction) = self.end_transaction() {
            if let Err(err) = transaction.rollback() {
                warn!("Rollback on release failed: {}", err);
            }
        }
    }
}

impl fmt::Debug for TransactionStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionStateMachine")
            .field("state", &self.state)
            .field("principal", &self.auth.principal)
            .field("last_statement", &self.last_statement)
            .field("has_current_result", &self.current_result.is_some())
            .field("has_open_statement", &self.current_result_handle.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::bolt::BoltValue;
    use crate::server::testing::FakeQueryExecutor;

    fn processor() -> (
        TransactionStateMachine,
        Arc<FakeQueryExecutor>,
        Arc<TransactionTerminator>,
    ) {
        let executor = Arc::new(FakeQueryExecutor::new());
        let terminator = Arc::new(TransactionTerminator::new());
        let machine = TransactionStateMachine::new(
            executor.clone(),
            AuthResult::new("zeta4g"),
            terminator.clone(),
        );
        (machine, executor, terminator)
    }

    fn run(
        machine: &mut TransactionStateMachine,
        statement: &str,
    ) -> BoltResult<StatementMetadata> {
        machine.run(statement, HashMap::new(), None, None, None)
    }

    fn discard(machine: &mut TransactionStateMachine) -> BoltResult<Option<Bookmark>> {
        machine.stream_result(&mut |result| {
            let mut sink = Vec::new();
            drain(result, &mut sink)
        })
    }

    fn drain(result: &mut dyn QueryResult, sink: &mut Vec<Vec<BoltValue>>) -> BoltResult<()> {
        struct Sink<'a>(&'a mut Vec<Vec<BoltValue>>);
        impl crate::server::result::RecordConsumer for Sink<'_> {
            fn on_record(&mut self, values: &[BoltValue]) -> BoltResult<()> {
                self.0.push(values.to_vec());
                Ok(())
            }
            fn on_metadata(&mut self, _key: &str, _value: BoltValue) {}
        }
        result.accept(&mut Sink(sink))
    }

    #[test]
    fn test_starts_in_auto_commit() {
        let (machine, _, _) = processor();
        assert_eq!(machine.tx_state(), TxState::AutoCommit);
        assert!(!machine.has_open_statement());
        assert_eq!(machine.last_statement(), "");
    }

    #[test]
    fn test_run_reports_fields_and_opens_statement() {
        let (mut machine, executor, terminator) = processor();
        let metadata = run(&mut machine, "RETURN 1, 2").unwrap();
        assert_eq!(metadata.field_names(), ["1".to_string(), "2".to_string()]);
        assert!(machine.has_open_statement());
        assert!(terminator.is_active());
        assert_eq!(executor.executed(), vec!["RETURN 1, 2".to_string()]);
    }

    #[test]
    fn test_empty_statement_repeats_last_in_auto_commit() {
        let (mut machine, executor, _) = processor();
        run(&mut machine, "MATCH (n) RETURN n").unwrap();
        discard(&mut machine).unwrap();
        run(&mut machine, "").unwrap();
        discard(&mut machine).unwrap();

        assert_eq!(
            executor.executed(),
            vec!["MATCH (n) RETURN n".to_string(), "MATCH (n) RETURN n".to_string()]
        );
        assert_eq!(machine.last_statement(), "MATCH (n) RETURN n");
    }

    #[test]
    fn test_empty_statement_repeats_last_in_explicit_transaction() {
        let (mut machine, executor, _) = processor();
        machine.begin_transaction(None, None, None).unwrap();
        run(&mut machine, "MATCH (n) RETURN n").unwrap();
        discard(&mut machine).unwrap();
        run(&mut machine, "").unwrap();
        discard(&mut machine).unwrap();

        assert_eq!(
            executor.executed_in_transactions(),
            vec!["MATCH (n) RETURN n".to_string(), "MATCH (n) RETURN n".to_string()]
        );
        assert_eq!(machine.tx_state(), TxState::ExplicitTransaction);
    }

    #[test]
    fn test_stream_result_yields_bookmark_only_in_auto_commit() {
        let (mut machine, executor, _) = processor();
        executor.set_newest_tx_id(17);
        run(&mut machine, "RETURN 1").unwrap();
        assert_eq!(discard(&mut machine).unwrap(), Some(Bookmark::new(17)));

        machine.begin_transaction(None, None, None).unwrap();
        discard(&mut machine).unwrap();
        run(&mut machine, "RETURN 1").unwrap();
        assert_eq!(discard(&mut machine).unwrap(), None);
    }

    #[test]
    fn test_stream_result_forwards_records() {
        let (mut machine, _, _) = processor();
        run(&mut machine, "RETURN 1, 'a'").unwrap();
        let mut rows = Vec::new();
        machine.stream_result(&mut |result| drain(result, &mut rows)).unwrap();
        assert_eq!(rows, vec![vec![BoltValue::Integer(1), BoltValue::from("'a'")]]);
    }

    #[test]
    fn test_stream_result_closes_on_success() {
        let (mut machine, executor, terminator) = processor();
        run(&mut machine, "RETURN 1").unwrap();
        discard(&mut machine).unwrap();

        assert!(!machine.has_open_statement());
        assert!(!machine.has_current_result());
        assert!(!terminator.is_active());
        assert_eq!(executor.closed_handles(), vec![true]);
    }

    #[test]
    fn test_stream_result_closes_on_consumer_error() {
        let (mut machine, executor, _) = processor();
        run(&mut machine, "RETURN 1").unwrap();
        let err = machine
            .stream_result(&mut |_| Err(BoltError::fatal("client went away")))
            .unwrap_err();

        assert_eq!(err.message(), "client went away");
        assert!(!machine.has_open_statement());
        assert!(!machine.has_current_result());
        assert_eq!(executor.closed_handles(), vec![false]);
    }

    #[test]
    fn test_stream_without_result_fails_cleanly() {
        let (mut machine, _, _) = processor();
        let err = discard(&mut machine).unwrap_err();
        assert_eq!(err.code(), BoltErrorCode::REQUEST_INVALID);
        assert!(!machine.has_open_statement());
    }

    #[test]
    fn test_start_failure_closes_handle() {
        let (mut machine, executor, terminator) = processor();
        let err = run(&mut machine, "RETURN BOOM").unwrap_err();

        assert_eq!(err.code(), BoltErrorCode::EXECUTION_FAILED);
        assert!(!machine.has_open_statement());
        assert!(!terminator.is_active());
        assert_eq!(executor.closed_handles(), vec![false]);
    }

    #[test]
    fn test_execute_failure_leaves_nothing_open() {
        let (mut machine, executor, _) = processor();
        let err = run(&mut machine, "FAIL").unwrap_err();
        assert_eq!(err.code(), BoltErrorCode::SYNTAX_ERROR);
        assert!(!machine.has_open_statement());
        assert!(executor.closed_handles().is_empty());
        assert_eq!(machine.last_statement(), "FAIL");
    }

    #[test]
    fn test_run_rejects_second_open_statement() {
        let (mut machine, _, _) = processor();
        run(&mut machine, "RETURN 1").unwrap();
        let err = run(&mut machine, "RETURN 2").unwrap_err();
        assert_eq!(err.code(), BoltErrorCode::REQUEST_INVALID);
        assert!(machine.has_open_statement());
    }

    #[test]
    fn test_commit_in_auto_commit_fails() {
        let (mut machine, _, _) = processor();
        let err = machine.commit_transaction().unwrap_err();
        assert_eq!(err.message(), "No current transaction to commit.");
        assert!(!err.is_fatal());
        assert_eq!(machine.tx_state(), TxState::AutoCommit);

        machine.commit_transaction().unwrap_err();
        assert_eq!(machine.tx_state(), TxState::AutoCommit);
    }

    #[test]
    fn test_nested_begin_fails_without_side_effects() {
        let (mut machine, executor, _) = processor();
        machine.begin_transaction(None, None, None).unwrap();
        discard(&mut machine).unwrap();
        run(&mut machine, "RETURN 1").unwrap();

        let err = machine.begin_transaction(None, None, None).unwrap_err();
        assert_eq!(err.message(), "Nested transactions are not supported.");
        assert_eq!(machine.tx_state(), TxState::ExplicitTransaction);
        assert_eq!(machine.last_statement(), "RETURN 1");
        assert!(machine.has_open_statement());
        assert!(machine.has_current_result());
        assert_eq!(executor.transactions_begun(), 1);
    }

    #[test]
    fn test_begin_run_stream_commit_round_trip() {
        let (mut machine, executor, terminator) = processor();
        machine.begin_transaction(Some(Bookmark::new(3)), None, None).unwrap();
        assert_eq!(executor.begin_bookmarks(), vec![Some(Bookmark::new(3))]);
        discard(&mut machine).unwrap();

        run(&mut machine, "CREATE (n)").unwrap();
        discard(&mut machine).unwrap();
        let bookmark = machine.commit_transaction().unwrap();

        assert_eq!(machine.tx_state(), TxState::AutoCommit);
        assert!(bookmark.tx_id() > 0);
        assert_eq!(executor.commits(), 1);
        assert!(!terminator.is_active());
        // Commit stages a bookmark-only result.
        assert!(machine.has_current_result());
        assert!(!machine.has_open_statement());
    }

    #[test]
    fn test_begin_run_stream_rollback_round_trip() {
        let (mut machine, executor, _) = processor();
        machine.begin_transaction(None, None, None).unwrap();
        discard(&mut machine).unwrap();
        run(&mut machine, "CREATE (n)").unwrap();
        discard(&mut machine).unwrap();
        machine.rollback_transaction().unwrap();

        assert_eq!(machine.tx_state(), TxState::AutoCommit);
        assert_eq!(executor.rollbacks(), 1);
        assert_eq!(executor.commits(), 0);
        assert!(machine.has_current_result());

        let mut rows = Vec::new();
        machine.stream_result(&mut |result| drain(result, &mut rows)).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_rollback_in_auto_commit_is_noop() {
        let (mut machine, executor, _) = processor();
        machine.rollback_transaction().unwrap();
        machine.rollback_transaction().unwrap();
        assert_eq!(machine.tx_state(), TxState::AutoCommit);
        assert_eq!(executor.rollbacks(), 0);
    }

    #[test]
    fn test_commit_failure_returns_to_auto_commit() {
        let (mut machine, executor, terminator) = processor();
        executor.fail_commits();
        machine.begin_transaction(None, None, None).unwrap();
        discard(&mut machine).unwrap();

        let err = machine.commit_transaction().unwrap_err();
        assert_eq!(err.code(), BoltErrorCode::EXECUTION_FAILED);
        assert_eq!(machine.tx_state(), TxState::AutoCommit);
        assert!(!terminator.is_active());

        // A fresh transaction can be opened afterwards.
        machine.begin_transaction(None, None, None).unwrap();
    }

    #[test]
    fn test_explicit_run_rejects_timeout_and_metadata() {
        let (mut machine, executor, _) = processor();
        machine.begin_transaction(None, Some(Duration::from_secs(5)), None).unwrap();
        discard(&mut machine).unwrap();

        let err = machine
            .run("RETURN 1", HashMap::new(), None, Some(Duration::from_secs(1)), None)
            .unwrap_err();
        assert_eq!(err.code(), BoltErrorCode::REQUEST_INVALID);

        let err = machine
            .run("RETURN 1", HashMap::new(), None, None, Some(HashMap::new()))
            .unwrap_err();
        assert_eq!(err.code(), BoltErrorCode::REQUEST_INVALID);

        assert!(executor.executed_in_transactions().is_empty());
        assert_eq!(machine.tx_state(), TxState::ExplicitTransaction);
    }

    #[test]
    fn test_auto_commit_run_passes_timeout_and_metadata() {
        let (mut machine, executor, _) = processor();
        let mut metadata = HashMap::new();
        metadata.insert("app".to_string(), BoltValue::from("report"));
        machine
            .run("RETURN 1", HashMap::new(), None, Some(Duration::from_secs(1)), Some(metadata))
            .unwrap();
        assert_eq!(executor.last_timeout(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_reset_from_explicit_transaction() {
        let (mut machine, executor, terminator) = processor();
        machine.begin_transaction(None, None, None).unwrap();
        discard(&mut machine).unwrap();
        run(&mut machine, "MATCH (n) RETURN n").unwrap();

        machine.reset().unwrap();

        assert_eq!(machine.tx_state(), TxState::AutoCommit);
        assert!(!machine.has_open_statement());
        assert!(!machine.has_current_result());
        assert!(!terminator.is_active());
        assert_eq!(executor.terminations(), 2);
        assert_eq!(executor.rollbacks(), 1);
        assert_eq!(executor.closed_handles(), vec![false]);
    }

    #[test]
    fn test_reset_in_auto_commit_with_open_result() {
        let (mut machine, executor, _) = processor();
        run(&mut machine, "RETURN 1").unwrap();
        machine.reset().unwrap();
        assert!(!machine.has_open_statement());
        assert_eq!(executor.terminations(), 1);
        assert_eq!(executor.closed_handles(), vec![false]);
    }

    #[test]
    fn test_terminator_reaches_open_handles() {
        let (mut machine, executor, terminator) = processor();
        machine.begin_transaction(None, None, None).unwrap();
        discard(&mut machine).unwrap();
        run(&mut machine, "RETURN 1").unwrap();

        terminator.terminate();
        assert_eq!(executor.terminations(), 2);
        // Termination is a request only; bookkeeping is untouched.
        assert!(machine.has_open_statement());
    }

    #[test]
    fn test_drop_releases_everything() {
        let (mut machine, executor, _) = processor();
        machine.begin_transaction(None, None, None).unwrap();
        discard(&mut machine).unwrap();
        run(&mut machine, "RETURN 1").unwrap();
        drop(machine);

        assert_eq!(executor.closed_handles(), vec![false]);
        assert_eq!(executor.rollbacks(), 1);
    }
}
