//! # Bolt Protocol Vocabulary
//!
//! Server-side view of the Bolt v1 protocol: the decoded value model, the
//! request messages the session state machine dispatches on, the responses
//! it produces and the error taxonomy shared by every layer.
//!
//! Framing and PackStream encoding are the transport's job; this module
//! starts where a message has already been decoded into a [`BoltStructure`].
//!
//! ## Submodules
//!
//! - [`value`] - Decoded values and structures
//! - [`message`] - Bolt message types (INIT, RUN, PULL_ALL, ...)
//! - [`error`] - Error classification and status codes

pub mod error;
pub mod message;
pub mod value;

pub use error::{
    BoltConnectionFatality, BoltError, BoltErrorCode, BoltFailure, BoltResult, ErrorClass,
};
pub use message::{
    AuthToken, BoltRequest, BoltResponse, FailureMessage, InitMessage, RecordMessage,
    RunMessage, SuccessMessage,
};
pub use value::{BoltMap, BoltStructure, BoltValue};
