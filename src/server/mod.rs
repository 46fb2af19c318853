//! # Bolt Server Core
//!
//! Everything between a decoded request and the responses sent back for
//! it: the per-session state machine, the transaction layer underneath it,
//! and the actor that runs a session on tokio.
//!
//! ## Layers
//!
//! - [`state_machine`] - CONNECTED/READY/STREAMING/FAILED/INTERRUPTED
//! - [`statement`] - Auto-commit and explicit transactions
//! - [`connection_state`] - Staged failures, interrupts, termination
//! - [`session`] - One tokio task per session
//! - [`spi`] - Ports implemented by the embedding server
//!
//! # Example
//!
//! ```ignore
//! use zeta4g_bolt_server::{BoltSession, BoltStateMachine, BoltServerConfig};
//!
//! let config = BoltServerConfig::default();
//! let machine = BoltStateMachine::new("bolt-1", spi, config.clone());
//! let session = BoltSession::spawn(machine, &config);
//!
//! let outcome = session.process(request).await?;
//! for response in outcome.responses {
//!     transport.send(response.to_structure()).await?;
//! }
//! ```

pub mod bookmark;
pub mod config;
pub mod connection_state;
pub mod handler;
pub mod result;
pub mod session;
pub mod spi;
pub mod state_machine;
pub mod statement;

#[cfg(test)]
pub(crate) mod testing;

pub use bookmark::Bookmark;
pub use config::{load_config, BoltServerConfig, BoltServerConfigBuilder, ConfigError};
pub use connection_state::{BoundConnection, ConnectionSignals, ConnectionState};
pub use handler::{BoltResponseHandler, ResponseCollector};
pub use result::{BookmarkResult, EmptyResult, QueryResult, RecordConsumer, RecordsResult};
pub use session::{BoltSession, ProcessOutcome, SessionError, SessionHandle};
pub use spi::{
    AuthResult, Authenticator, BoltSpi, ConnectionInfo, ErrorReporter, QueryExecutor,
    ResultHandle, StaticVersionProvider, TracingErrorReporter, TransactionHandle,
    VersionProvider,
};
pub use state_machine::{BoltState, BoltStateMachine};
pub use statement::{
    ResultConsumer, StatementMetadata, StatementProcessor, TransactionStateMachine,
    TransactionTerminator, TxState,
};
