//! # Zeta4G Bolt Server
//!
//! Server side of the Bolt protocol for [Zeta4G](https://github.com/zeta9044/zeta4g):
//! the session state machine that decides what each inbound request means
//! in the session's current state, and the transaction layer that turns
//! RUN/PULL_ALL/COMMIT into calls on the query engine.
//!
//! ## Features
//!
//! - **Session state machine** - CONNECTED, READY, STREAMING, FAILED and
//!   INTERRUPTED, with out-of-sequence messages treated as protocol breaches
//! - **Transactions** - Auto-commit and explicit (`BEGIN`/`COMMIT`/`ROLLBACK`)
//!   transactions with bookmarks for causal chaining
//! - **Interrupts** - RESET can cancel in-flight work from another thread;
//!   N interrupts are acknowledged by N RESETs
//! - **Async sessions** - Each session runs as a Tokio task behind a
//!   cloneable handle
//!
//! Socket handling, handshake and PackStream encoding are left to the
//! transport. Requests enter as decoded [`BoltRequest`]s and leave as
//! [`BoltResponse`]s.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zeta4g_bolt_server::{
//!     AuthToken, BoltRequest, BoltServerConfig, BoltSession, BoltSpi, BoltStateMachine,
//!     InitMessage, RunMessage, StaticVersionProvider,
//! };
//! # use zeta4g_bolt_server::{Authenticator, QueryExecutor};
//! # async fn example(
//! #     authenticator: Arc<dyn Authenticator>,
//! #     executor: Arc<dyn QueryExecutor>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = BoltServerConfig::default();
//! let spi = BoltSpi::new(
//!     authenticator,
//!     executor,
//!     Arc::new(StaticVersionProvider::from(&config)),
//! );
//!
//! let machine = BoltStateMachine::new("bolt-1", spi, config.clone());
//! let session = BoltSession::spawn(machine, &config);
//!
//! let init = InitMessage::new("my-client/1.0", AuthToken::basic("zeta4g", "password"));
//! session.process(BoltRequest::Init(init)).await?;
//!
//! session.process(BoltRequest::Run(RunMessage::new("RETURN 1"))).await?;
//! let outcome = session.process(BoltRequest::PullAll).await?;
//! for response in &outcome.responses {
//!     println!("{}", response.name());
//! }
//!
//! session.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every [`BoltError`] carries an [`ErrorClass`] chosen where it is raised.
//! Recoverable errors move the session to FAILED and are answered with a
//! FAILURE; anything else surfaces as a [`BoltConnectionFatality`] and the
//! connection must be closed:
//!
//! ```rust,no_run
//! # use zeta4g_bolt_server::{
//! #     BoltConnectionFatality, BoltRequest, BoltStateMachine, ResponseCollector,
//! # };
//! # fn example(machine: &mut BoltStateMachine, request: BoltRequest) {
//! let mut collector = ResponseCollector::new();
//! match machine.process(&request, &mut collector) {
//!     Ok(()) => {}
//!     Err(BoltConnectionFatality::Authentication(err)) => eprintln!("Login failed: {}", err),
//!     Err(fatality) => eprintln!("Closing connection: {}", fatality),
//! }
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`server`] - Session state machine, transactions and session actor
//! - [`bolt`] - Bolt message, value and error vocabulary
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bolt;
pub mod server;

// Re-exports for convenience
pub use server::{
    load_config, AuthResult, Authenticator, BoltResponseHandler, BoltServerConfig,
    BoltServerConfigBuilder, BoltSession, BoltSpi, BoltState, BoltStateMachine, Bookmark,
    ConfigError, ConnectionInfo, ErrorReporter, ProcessOutcome, QueryExecutor, QueryResult,
    ResponseCollector, ResultHandle, SessionError, SessionHandle, StatementProcessor,
    StaticVersionProvider, TransactionHandle, TransactionStateMachine, TxState,
    VersionProvider,
};

pub use bolt::{
    AuthToken, BoltConnectionFatality, BoltError, BoltErrorCode, BoltFailure, BoltMap,
    BoltRequest, BoltResponse, BoltResult, BoltStructure, BoltValue, ErrorClass,
    FailureMessage, InitMessage, RecordMessage, RunMessage, SuccessMessage,
};
