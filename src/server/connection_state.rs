//! Per-connection mutable state.
//!
//! [`ConnectionState`] is owned by the session task. The pieces other
//! threads need (interrupt counter, termination flag, handles to cancel)
//! live in [`ConnectionSignals`], shared through an `Arc`.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::bolt::{BoltError, BoltErrorCode, BoltFailure, BoltResult, BoltValue};

use super::bookmark::Bookmark;
use super::handler::BoltResponseHandler;
use super::statement::{StatementProcessor, TransactionTerminator, TxState};

// ============================================================================
// ConnectionSignals
// ============================================================================

/// Flags set from outside the session task.
#[derive(Debug, Default)]
pub struct ConnectionSignals {
    interrupt_counter: AtomicUsize,
    terminated: AtomicBool,
    terminator: Arc<TransactionTerminator>,
}

impl ConnectionSignals {
    /// Fresh signals: not interrupted, not terminated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one interrupt and ask the engine to stop current work.
    pub fn interrupt(&self) {
        let count = self.interrupt_counter.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(interrupts = count, "Connection interrupted");
        self.terminator.terminate();
    }

    /// Request that the connection be closed on its next pass.
    pub fn mark_for_termination(&self) {
        self.terminated.store(true, Ordering::SeqCst);
        self.terminator.terminate();
    }

    /// Whether unacknowledged interrupts are outstanding.
    pub fn is_interrupted(&self) -> bool {
        self.interrupt_count() > 0
    }

    /// Outstanding interrupts.
    pub fn interrupt_count(&self) -> usize {
        self.interrupt_counter.load(Ordering::SeqCst)
    }

    /// Acknowledge one interrupt. Returns the remaining count; never
    /// goes below zero.
    pub fn decrement_interrupt_counter(&self) -> usize {
        match self
            .interrupt_counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        {
            Ok(previous) => previous - 1,
            Err(_) => 0,
        }
    }

    /// Whether termination was requested.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Registry of the handles to cancel on interrupt/termination.
    pub fn terminator(&self) -> &Arc<TransactionTerminator> {
        &self.terminator
    }
}

// ============================================================================
// ConnectionState
// ============================================================================

/// Mutable record owned by one session.
pub struct ConnectionState {
    signals: Arc<ConnectionSignals>,
    statement_processor: Option<Box<dyn StatementProcessor>>,
    pending_error: Option<BoltFailure>,
    pending_ignore: bool,
    closed: bool,
}

impl ConnectionState {
    /// State with no processor bound.
    pub fn new(signals: Arc<ConnectionSignals>) -> Self {
        Self {
            signals,
            statement_processor: None,
            pending_error: None,
            pending_ignore: false,
            closed: false,
        }
    }

    /// Shared cross-thread signals.
    pub fn signals(&self) -> &Arc<ConnectionSignals> {
        &self.signals
    }

    /// Bind the processor created by a successful INIT, releasing any
    /// previous one.
    pub fn set_statement_processor(&mut self, processor: Box<dyn StatementProcessor>) {
        self.statement_processor = Some(processor);
    }

    /// Whether INIT has bound a processor.
    pub fn has_statement_processor(&self) -> bool {
        self.statement_processor.is_some()
    }

    /// The bound processor, or a breach if INIT never succeeded.
    pub fn statement_processor(&mut self) -> BoltResult<&mut (dyn StatementProcessor + 'static)> {
        self.statement_processor
            .as_deref_mut()
            .ok_or_else(|| {
                BoltError::protocol_breach("No statement processor bound; INIT has not succeeded.")
            })
    }

    /// Whether an unstreamed result is held.
    pub fn has_open_statement(&self) -> bool {
        self.statement_processor
            .as_ref()
            .map_or(false, |processor| processor.has_open_statement())
    }

    /// Transaction sub-state, if a processor is bound.
    pub fn tx_state(&self) -> Option<TxState> {
        self.statement_processor.as_ref().map(|processor| processor.tx_state())
    }

    /// Stage a failure to flush at the end of the pass.
    pub fn mark_failed(&mut self, failure: BoltFailure) {
        self.pending_error = Some(failure);
    }

    /// Stage an IGNORED to flush at the end of the pass.
    pub fn mark_ignored(&mut self) {
        self.pending_ignore = true;
    }

    /// Staged failure, if any.
    pub fn pending_error(&self) -> Option<&BoltFailure> {
        self.pending_error.as_ref()
    }

    /// Whether an IGNORED is staged.
    pub fn has_pending_ignore(&self) -> bool {
        self.pending_ignore
    }

    /// Drop both staged flags.
    pub fn reset_pending_failed_and_ignored(&mut self) {
        self.pending_error = None;
        self.pending_ignore = false;
    }

    /// Whether a non-privileged message may be dispatched now.
    pub fn can_process_message(&self) -> bool {
        !self.closed && self.pending_error.is_none() && !self.pending_ignore
    }

    /// Whether the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the processor (rolling back whatever it holds) and mark
    /// closed. Calling it again does nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if let Some(mut processor) = self.statement_processor.take() {
            if let Err(err) = processor.reset() {
                warn!("Failed to release statement processor on close: {}", err);
            }
        }
        self.closed = true;
    }
}

impl fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionState")
            .field("signals", &self.signals)
            .field("tx_state", &self.tx_state())
            .field("pending_error", &self.pending_error)
            .field("pending_ignore", &self.pending_ignore)
            .field("closed", &self.closed)
            .finish()
    }
}

// ============================================================================
// BoundConnection
// ============================================================================

/// A [`ConnectionState`] with a response handler bound for one pass.
///
/// Dropping the binding flushes the staged failure or ignore to the
/// handler, clears both, and calls `on_finish` exactly once. This runs on
/// every exit path, including early returns and unwinding.
pub struct BoundConnection<'a> {
    state: &'a mut ConnectionState,
    handler: &'a mut dyn BoltResponseHandler,
}

impl<'a> BoundConnection<'a> {
    /// Bind `handler` to `state` until the returned value is dropped.
    pub fn bind(state: &'a mut ConnectionState, handler: &'a mut dyn BoltResponseHandler) -> Self {
        Self { state, handler }
    }

    /// The underlying state.
    pub fn state(&self) -> &ConnectionState {
        self.state
    }

    /// The underlying state, mutably.
    pub fn state_mut(&mut self) -> &mut ConnectionState {
        self.state
    }

    /// Attach metadata to this pass's SUCCESS.
    pub fn on_metadata(&mut self, key: &str, value: BoltValue) {
        self.handler.on_metadata(key, value);
    }

    /// Stream the open result into the bound handler.
    pub fn stream_result(&mut self, pull: bool) -> BoltResult<Option<Bookmark>> {
        let handler = &mut *self.handler;
        let processor = self.state.statement_processor.as_deref_mut().ok_or_else(|| {
            BoltError::client(BoltErrorCode::REQUEST_INVALID, "No result available to stream.")
        })?;
        processor.stream_result(&mut |result| handler.on_records(result, pull))
    }
}

impl Drop for BoundConnection<'_> {
    fn drop(&mut self) {
        if let Some(failure) = self.state.pending_error.take() {
            self.handler.mark_failed(&failure);
        } else if self.state.pending_ignore {
            self.handler.mark_ignored();
        }
        self.state.pending_ignore = false;
        self.handler.on_finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolt::BoltResponse;
    use crate::server::handler::ResponseCollector;
    use crate::server::spi::AuthResult;
    use crate::server::statement::TransactionStateMachine;
    use crate::server::testing::FakeQueryExecutor;
    use std::collections::HashMap;

    fn failure() -> BoltFailure {
        BoltFailure {
            code: BoltErrorCode::SYNTAX_ERROR.to_string(),
            message: "bad".to_string(),
            fatal: false,
        }
    }

    fn bound_state() -> (ConnectionState, Arc<FakeQueryExecutor>) {
        let signals = Arc::new(ConnectionSignals::new());
        let executor = Arc::new(FakeQueryExecutor::new());
        let mut state = ConnectionState::new(signals.clone());
        state.set_statement_processor(Box::new(TransactionStateMachine::new(
            executor.clone(),
            AuthResult::new("zeta4g"),
            signals.terminator().clone(),
        )));
        (state, executor)
    }

    #[test]
    fn test_interrupt_counter_saturates() {
        let signals = ConnectionSignals::new();
        assert!(!signals.is_interrupted());
        assert_eq!(signals.decrement_interrupt_counter(), 0);

        signals.interrupt();
        signals.interrupt();
        assert_eq!(signals.interrupt_count(), 2);
        assert_eq!(signals.decrement_interrupt_counter(), 1);
        assert_eq!(signals.decrement_interrupt_counter(), 0);
        assert_eq!(signals.decrement_interrupt_counter(), 0);
        assert!(!signals.is_interrupted());
    }

    #[test]
    fn test_mark_for_termination() {
        let signals = ConnectionSignals::new();
        signals.mark_for_termination();
        assert!(signals.is_terminated());
        assert!(!signals.is_interrupted());
    }

    #[test]
    fn test_interrupt_terminates_running_statement() {
        let (mut state, executor) = bound_state();
        state
            .statement_processor()
            .unwrap()
            .run("RETURN 1", HashMap::new(), None, None, None)
            .unwrap();

        state.signals().clone().interrupt();
        assert_eq!(executor.terminations(), 1);
    }

    #[test]
    fn test_pending_flags_gate_processing() {
        let mut state = ConnectionState::new(Arc::new(ConnectionSignals::new()));
        assert!(state.can_process_message());

        state.mark_ignored();
        assert!(!state.can_process_message());
        state.mark_failed(failure());
        assert!(state.pending_error().is_some());

        state.reset_pending_failed_and_ignored();
        assert!(state.can_process_message());
    }

    #[test]
    fn test_statement_processor_requires_init() {
        let mut state = ConnectionState::new(Arc::new(ConnectionSignals::new()));
        assert!(!state.has_statement_processor());
        assert!(!state.has_open_statement());
        assert_eq!(state.tx_state(), None);
        let Err(err) = state.statement_processor() else {
            panic!("expected no processor before INIT");
        };
        assert!(err.is_fatal());
    }

    #[test]
    fn test_close_releases_processor_once() {
        let (mut state, executor) = bound_state();
        state
            .statement_processor()
            .unwrap()
            .run("RETURN 1", HashMap::new(), None, None, None)
            .unwrap();
        assert!(state.has_open_statement());

        state.close();
        state.close();

        assert!(state.is_closed());
        assert!(!state.can_process_message());
        assert!(!state.has_open_statement());
        assert_eq!(executor.closed_handles(), vec![false]);
    }

    #[test]
    fn test_binding_flushes_failure_before_ignore() {
        let mut state = ConnectionState::new(Arc::new(ConnectionSignals::new()));
        let mut collector = ResponseCollector::new();
        {
            let mut bound = BoundConnection::bind(&mut state, &mut collector);
            bound.state_mut().mark_failed(failure());
            bound.state_mut().mark_ignored();
        }
        assert!(state.can_process_message());

        {
            let mut bound = BoundConnection::bind(&mut state, &mut collector);
            bound.state_mut().mark_ignored();
        }
        {
            let mut bound = BoundConnection::bind(&mut state, &mut collector);
            bound.on_metadata("fields", BoltValue::List(Vec::new()));
        }

        let responses = collector.take_responses();
        assert_eq!(responses.len(), 3);
        assert!(responses[0].is_failure());
        assert!(responses[1].is_ignored());
        assert!(matches!(&responses[2], BoltResponse::Success(s) if s.get("fields").is_some()));
    }

    #[test]
    fn test_binding_streams_into_handler() {
        let (mut state, _) = bound_state();
        state
            .statement_processor()
            .unwrap()
            .run("RETURN 1", HashMap::new(), None, None, None)
            .unwrap();

        let mut collector = ResponseCollector::new();
        {
            let mut bound = BoundConnection::bind(&mut state, &mut collector);
            let bookmark = bound.stream_result(true).unwrap();
            assert!(bookmark.is_some());
        }
        let responses = collector.take_responses();
        assert_eq!(responses.len(), 2);
        assert!(matches!(responses[0], BoltResponse::Record(_)));
        assert!(!state.has_open_statement());
    }
}
