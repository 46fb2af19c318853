//! Bolt session state machine.
//!
//! The session moves between five states. Each request is dispatched
//! through [`transition`], a single match over `(state, request)`; pairs it
//! does not list are protocol breaches and end the connection.
//!
//! ```text
//!             INIT ok              RUN ok
//! CONNECTED ---------> READY -------------> STREAMING
//!     |                 ^  ^  PULL/DISCARD ok   |
//!     | INIT err        |  +--------------------+
//!     v                 |  ACK_FAILURE/RESET
//!   FAILED -------------+
//!
//! READY/STREAMING/FAILED --INTERRUPT--> INTERRUPTED --RESET x N--> READY
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::bolt::{
    BoltConnectionFatality, BoltError, BoltFailure, BoltRequest, BoltResult, BoltValue,
    InitMessage, RunMessage,
};

use super::bookmark::Bookmark;
use super::config::BoltServerConfig;
use super::connection_state::{BoundConnection, ConnectionSignals, ConnectionState};
use super::handler::BoltResponseHandler;
use super::spi::{BoltSpi, ConnectionInfo};
use super::statement::{StatementMetadata, TransactionStateMachine, TxState};

// ============================================================================
// BoltState
// ============================================================================

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BoltState {
    /// Waiting for INIT.
    #[default]
    Connected,
    /// Idle, accepting RUN.
    Ready,
    /// A result is open, waiting for PULL_ALL or DISCARD_ALL.
    Streaming,
    /// A request failed; waiting for ACK_FAILURE or RESET.
    Failed,
    /// Interrupted; waiting for one RESET per interrupt.
    Interrupted,
}

impl BoltState {
    /// State name as used in protocol messages.
    pub fn name(&self) -> &'static str {
        match self {
            BoltState::Connected => "CONNECTED",
            BoltState::Ready => "READY",
            BoltState::Streaming => "STREAMING",
            BoltState::Failed => "FAILED",
            BoltState::Interrupted => "INTERRUPTED",
        }
    }
}

impl fmt::Display for BoltState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Transition function
// ============================================================================

/// Everything a transition may touch during one pass.
struct StateContext<'s, 'a> {
    connection_id: &'s str,
    spi: &'s BoltSpi,
    config: &'s BoltServerConfig,
    connection: BoundConnection<'a>,
    fatality: Option<BoltConnectionFatality>,
}

/// BEGIN/COMMIT/ROLLBACK sent as statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransactionControl {
    Begin,
    Commit,
    Rollback,
}

impl TransactionControl {
    fn parse(statement: &str) -> Option<Self> {
        match statement.trim().to_uppercase().as_str() {
            "BEGIN" => Some(TransactionControl::Begin),
            "COMMIT" => Some(TransactionControl::Commit),
            "ROLLBACK" => Some(TransactionControl::Rollback),
            _ => None,
        }
    }
}

/// Next state for `request` in `state`, or `None` if the pair is illegal.
fn transition(
    state: BoltState,
    request: &BoltRequest,
    ctx: &mut StateContext<'_, '_>,
) -> Option<BoltState> {
    use BoltRequest as R;
    use BoltState as S;

    let next = match (state, request) {
        (S::Connected, R::Init(init)) => on_init(ctx, init),

        (S::Ready, R::Run(run)) => on_run(ctx, run),
        (S::Streaming, R::PullAll) => on_stream(ctx, true),
        (S::Streaming, R::DiscardAll) => on_stream(ctx, false),
        (S::Ready | S::Streaming | S::Failed, R::Reset) => on_reset(ctx, state),

        (S::Failed, R::Run(_) | R::PullAll | R::DiscardAll) => {
            ctx.connection.state_mut().mark_ignored();
            S::Failed
        }
        (S::Failed, R::AckFailure) => {
            ctx.connection.state_mut().reset_pending_failed_and_ignored();
            S::Ready
        }

        (S::Ready | S::Streaming | S::Failed | S::Interrupted, R::Interrupt) => S::Interrupted,
        (S::Interrupted, R::Reset) => on_interrupted_reset(ctx),

        _ => return None,
    };
    Some(next)
}

fn on_init(ctx: &mut StateContext<'_, '_>, init: &InitMessage) -> BoltState {
    let info = ConnectionInfo {
        connection_id: ctx.connection_id.to_string(),
        user_agent: init.user_agent.clone(),
    };

    match ctx.spi.authenticator.authenticate(&init.auth_token, &info) {
        Ok(auth) => {
            let credentials_expired = auth.credentials_expired;
            info!(
                connection_id = %ctx.connection_id,
                user_agent = %init.user_agent,
                principal = %auth.principal,
                "Session initialized"
            );

            let terminator = Arc::clone(ctx.connection.state().signals().terminator());
            let processor =
                TransactionStateMachine::new(Arc::clone(&ctx.spi.executor), auth, terminator);
            ctx.connection.state_mut().set_statement_processor(Box::new(processor));

            ctx.connection
                .on_metadata("server", BoltValue::String(ctx.spi.version.server_version()));
            ctx.connection
                .on_metadata("connection_id", BoltValue::String(ctx.connection_id.to_string()));
            if credentials_expired {
                ctx.connection.on_metadata("credentials_expired", BoltValue::Boolean(true));
            }
            BoltState::Ready
        }
        Err(err) => handle_failure(ctx, BoltState::Connected, err, true),
    }
}

fn on_run(ctx: &mut StateContext<'_, '_>, run: &RunMessage) -> BoltState {
    if ctx.config.log_statements {
        debug!(connection_id = %ctx.connection_id, statement = %run.statement, "RUN");
    }

    let started = Instant::now();
    let outcome = execute_run(ctx, run);
    let available_after = started.elapsed();

    match outcome {
        Ok((metadata, bookmark)) => {
            ctx.connection
                .on_metadata("fields", BoltValue::string_list(metadata.field_names()));
            ctx.connection
                .on_metadata("result_available_after", BoltValue::Integer(millis(available_after)));
            if let Some(bookmark) = bookmark {
                ctx.connection.on_metadata("bookmark", bookmark.to_value());
            }
            BoltState::Streaming
        }
        Err(err) => handle_failure(ctx, BoltState::Ready, err, false),
    }
}

fn execute_run(
    ctx: &mut StateContext<'_, '_>,
    run: &RunMessage,
) -> BoltResult<(StatementMetadata, Option<Bookmark>)> {
    let control = if ctx.config.special_statements {
        TransactionControl::parse(&run.statement)
    } else {
        None
    };
    let extra_bookmark = run.bookmark().map(Bookmark::parse).transpose()?;
    let processor = ctx.connection.state_mut().statement_processor()?;

    match control {
        Some(TransactionControl::Begin) => {
            let bookmark = Bookmark::from_params(&run.parameters)?.or(extra_bookmark);
            processor.begin_transaction(bookmark, run.tx_timeout(), run.tx_metadata().cloned())?;
            Ok((StatementMetadata::EMPTY, None))
        }
        Some(TransactionControl::Commit) => {
            let bookmark = processor.commit_transaction()?;
            Ok((StatementMetadata::EMPTY, Some(bookmark)))
        }
        Some(TransactionControl::Rollback) => {
            processor.rollback_transaction()?;
            Ok((StatementMetadata::EMPTY, None))
        }
        None => {
            let metadata = processor.run(
                &run.statement,
                run.parameters.clone(),
                extra_bookmark,
                run.tx_timeout(),
                run.tx_metadata().cloned(),
            )?;
            Ok((metadata, None))
        }
    }
}

fn on_stream(ctx: &mut StateContext<'_, '_>, pull: bool) -> BoltState {
    let started = Instant::now();
    match ctx.connection.stream_result(pull) {
        Ok(bookmark) => {
            if let Some(bookmark) = bookmark {
                ctx.connection.on_metadata("bookmark", bookmark.to_value());
            }
            let consumed_after = millis(started.elapsed());
            ctx.connection
                .on_metadata("result_consumed_after", BoltValue::Integer(consumed_after));
            BoltState::Ready
        }
        Err(err) => handle_failure(ctx, BoltState::Streaming, err, false),
    }
}

/// Clear staged flags and reset the processor. A failed reset is
/// recoverable unless the session had already failed.
fn on_reset(ctx: &mut StateContext<'_, '_>, current: BoltState) -> BoltState {
    ctx.connection.state_mut().reset_pending_failed_and_ignored();
    let outcome = ctx
        .connection
        .state_mut()
        .statement_processor()
        .and_then(|processor| processor.reset());

    match outcome {
        Ok(()) => BoltState::Ready,
        Err(err) => handle_failure(ctx, current, err, current == BoltState::Failed),
    }
}

fn on_interrupted_reset(ctx: &mut StateContext<'_, '_>) -> BoltState {
    let remaining = ctx.connection.state().signals().decrement_interrupt_counter();
    if remaining > 0 {
        debug!(connection_id = %ctx.connection_id, remaining, "Interrupt acknowledged");
        ctx.connection.state_mut().mark_ignored();
        return BoltState::Interrupted;
    }
    on_reset(ctx, BoltState::Interrupted)
}

/// Classify `cause`, report it, stage it and stash a fatality when the
/// connection cannot survive it.
fn handle_failure(
    ctx: &mut StateContext<'_, '_>,
    current: BoltState,
    cause: BoltError,
    fatal: bool,
) -> BoltState {
    let fatal = fatal || cause.is_fatal();
    debug!(
        connection_id = %ctx.connection_id,
        class = %cause.class(),
        fatal,
        "{} failed: {}",
        current,
        cause
    );
    let failure = if fatal {
        BoltFailure::fatal_from(&cause)
    } else {
        BoltFailure::from_error(&cause)
    };
    fail(ctx, current, failure);

    if fatal {
        ctx.fatality = Some(BoltConnectionFatality::from_error(cause.into_fatal()));
    }
    BoltState::Failed
}

/// Report and stage a failure. A session already in FAILED answers the
/// request with IGNORED instead of failing again.
fn fail(ctx: &mut StateContext<'_, '_>, current: BoltState, failure: BoltFailure) {
    ctx.spi.error_reporter.report(&failure);
    if current == BoltState::Failed {
        ctx.connection.state_mut().mark_ignored();
    } else {
        ctx.connection.state_mut().mark_failed(failure);
    }
}

fn millis(elapsed: Duration) -> i64 {
    i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
}

/// Run one transition and apply its result to `current`.
fn dispatch(
    current: &mut BoltState,
    request: &BoltRequest,
    ctx: &mut StateContext<'_, '_>,
) -> Result<(), BoltConnectionFatality> {
    let previous = *current;

    let Some(next) = transition(previous, request, ctx) else {
        let message = format!(
            "Message '{}' cannot be handled by a session in the {} state.",
            request.name(),
            previous
        );
        warn!(connection_id = %ctx.connection_id, "Protocol breach: {}", message);
        fail(ctx, previous, BoltFailure::fatal_from(&BoltError::protocol_breach(message.clone())));
        *current = BoltState::Failed;
        return Err(BoltConnectionFatality::ProtocolBreach(message));
    };

    *current = next;
    debug!(
        connection_id = %ctx.connection_id,
        message = request.name(),
        from = %previous,
        to = %next,
        "State transition"
    );

    match ctx.fatality.take() {
        Some(fatality) => {
            error!(connection_id = %ctx.connection_id, "{}", fatality);
            Err(fatality)
        }
        None => Ok(()),
    }
}

// ============================================================================
// BoltStateMachine
// ============================================================================

/// State machine for one Bolt session.
///
/// `process` must only be called by the task that owns the session.
/// [`interrupt`](Self::interrupt) and
/// [`mark_for_termination`](Self::mark_for_termination) only touch shared
/// signals; use [`signals`](Self::signals) to call them from elsewhere.
pub struct BoltStateMachine {
    id: String,
    state: BoltState,
    connection_state: ConnectionState,
    spi: BoltSpi,
    config: BoltServerConfig,
}

impl BoltStateMachine {
    /// Session in CONNECTED, waiting for INIT.
    pub fn new(id: impl Into<String>, spi: BoltSpi, config: BoltServerConfig) -> Self {
        let id = id.into();
        debug!(connection_id = %id, "Session created");
        Self {
            id,
            state: BoltState::Connected,
            connection_state: ConnectionState::new(Arc::new(ConnectionSignals::new())),
            spi,
            config,
        }
    }

    /// Process one request, reporting its outcome to `handler`.
    ///
    /// `handler` receives `on_finish` exactly once, whatever happens. An
    /// `Err` means the connection must be closed.
    pub fn process(
        &mut self,
        request: &BoltRequest,
        handler: &mut dyn BoltResponseHandler,
    ) -> Result<(), BoltConnectionFatality> {
        let mut ctx = StateContext {
            connection_id: &self.id,
            spi: &self.spi,
            config: &self.config,
            connection: BoundConnection::bind(&mut self.connection_state, handler),
            fatality: None,
        };
        let signals = Arc::clone(ctx.connection.state().signals());

        if signals.is_terminated() {
            debug!(connection_id = %ctx.connection_id, "Connection terminated; closing");
            ctx.connection.state_mut().close();
            ctx.connection.state_mut().mark_ignored();
            return Ok(());
        }

        if ctx.connection.state().is_closed() {
            ctx.connection.state_mut().mark_ignored();
            return Ok(());
        }

        if signals.is_interrupted() {
            dispatch(&mut self.state, &BoltRequest::Interrupt, &mut ctx)?;
        }

        if request.is_safe_in_any_state() || ctx.connection.state().can_process_message() {
            dispatch(&mut self.state, request, &mut ctx)
        } else {
            ctx.connection.state_mut().mark_ignored();
            Ok(())
        }
    }

    /// Count an interrupt and ask the engine to stop current work.
    pub fn interrupt(&self) {
        self.connection_state.signals().interrupt();
    }

    /// Ask for the connection to be closed on the next pass.
    pub fn mark_for_termination(&self) {
        self.connection_state.signals().mark_for_termination();
    }

    /// Shared signals, for interrupting from another thread.
    pub fn signals(&self) -> Arc<ConnectionSignals> {
        Arc::clone(self.connection_state.signals())
    }

    /// Release the statement processor and mark the connection closed.
    pub fn close(&mut self) {
        if !self.connection_state.is_closed() {
            info!(connection_id = %self.id, state = %self.state, "Session closed");
        }
        self.connection_state.close();
    }

    /// Current state.
    pub fn state(&self) -> BoltState {
        self.state
    }

    /// Connection id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether an unstreamed result is open.
    pub fn has_open_statement(&self) -> bool {
        self.connection_state.has_open_statement()
    }

    /// Transaction sub-state, once INIT has succeeded.
    pub fn transaction_state(&self) -> Option<TxState> {
        self.connection_state.tx_state()
    }

    /// Whether the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.connection_state.is_closed()
    }

    /// Whether interrupts are outstanding.
    pub fn is_interrupted(&self) -> bool {
        self.connection_state.signals().is_interrupted()
    }
}

impl fmt::Debug for BoltStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoltStateMachine")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("connection_state", &self.connection_state)
            .finish_non_exhaustive()
    }
}
