//! Bolt protocol error types.
//!
//! Every [`BoltError`] is classified where it is raised. The session state
//! machine only looks at the [`ErrorClass`] to decide whether the session
//! recovers (FAILED, waiting for ACK_FAILURE/RESET) or the connection dies.

use std::fmt;

use thiserror::Error;

use super::message::FailureMessage;

/// Result type for Bolt operations.
pub type BoltResult<T> = Result<T, BoltError>;

// ============================================================================
// ErrorClass
// ============================================================================

/// How a failure affects the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Message not legal in the current state; tears the connection down.
    Breach,
    /// Statement-level failure; the session moves to FAILED.
    Recoverable,
    /// Authentication failure; fatal, reported separately for auditing.
    AuthFatal,
    /// Anything else the connection cannot survive.
    Fatal,
}

impl ErrorClass {
    /// Whether the connection must be closed.
    pub fn is_fatal(self) -> bool {
        !matches!(self, ErrorClass::Recoverable)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorClass::Breach => "breach",
            ErrorClass::Recoverable => "recoverable",
            ErrorClass::AuthFatal => "auth-fatal",
            ErrorClass::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

// ============================================================================
// BoltError
// ============================================================================

/// An error raised while processing a Bolt request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct BoltError {
    code: String,
    message: String,
    class: ErrorClass,
}

impl BoltError {
    /// Create an error with an explicit classification.
    pub fn new(code: impl Into<String>, message: impl Into<String>, class: ErrorClass) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            class,
        }
    }

    /// Recoverable client error (bad statement, constraint violation, ...).
    pub fn client(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, message, ErrorClass::Recoverable)
    }

    /// Recoverable error raised by the database while executing.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(BoltErrorCode::EXECUTION_FAILED, message, ErrorClass::Recoverable)
    }

    /// Out-of-sequence or malformed request.
    pub fn protocol_breach(message: impl Into<String>) -> Self {
        Self::new(BoltErrorCode::REQUEST_INVALID, message, ErrorClass::Breach)
    }

    /// Authentication failed.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(BoltErrorCode::UNAUTHORIZED, message, ErrorClass::AuthFatal)
    }

    /// Unexpected failure the connection cannot survive.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(BoltErrorCode::GENERAL_ERROR, message, ErrorClass::Fatal)
    }

    /// Status code, e.g. `Neo.ClientError.Statement.SyntaxError`.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Human readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Classification decided at the point of origin.
    pub fn class(&self) -> ErrorClass {
        self.class
    }

    /// Whether the connection must be closed.
    pub fn is_fatal(&self) -> bool {
        self.class.is_fatal()
    }

    /// Escalate to fatal, keeping breach and auth classifications intact.
    pub fn into_fatal(mut self) -> Self {
        if self.class == ErrorClass::Recoverable {
            self.class = ErrorClass::Fatal;
        }
        self
    }
}

// ============================================================================
// BoltFailure
// ============================================================================

/// Client-visible failure staged on the connection and sent as FAILURE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoltFailure {
    /// Status code
    pub code: String,
    /// Error message
    pub message: String,
    /// Whether the failure terminates the connection
    pub fatal: bool,
}

impl BoltFailure {
    /// Failure carrying the error's own classification.
    pub fn from_error(error: &BoltError) -> Self {
        Self {
            code: error.code.clone(),
            message: error.message.clone(),
            fatal: error.is_fatal(),
        }
    }

    /// Failure forced to fatal regardless of the error's classification.
    pub fn fatal_from(error: &BoltError) -> Self {
        Self {
            fatal: true,
            ..Self::from_error(error)
        }
    }

    /// Whether the status code denotes a client error.
    pub fn is_client_error(&self) -> bool {
        self.code.starts_with("Neo.ClientError")
    }
}

impl fmt::Display for BoltFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<&BoltFailure> for FailureMessage {
    fn from(failure: &BoltFailure) -> Self {
        FailureMessage::new(&failure.code, &failure.message)
    }
}

// ============================================================================
// BoltConnectionFatality
// ============================================================================

/// Returned by the state machine when the connection must be torn down.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoltConnectionFatality {
    /// A message arrived that the current state cannot handle.
    #[error("Protocol breach: {0}")]
    ProtocolBreach(String),

    /// Authentication failed. Kept apart so the transport can audit it.
    #[error("Authentication failure: {0}")]
    Authentication(BoltError),

    /// Any other fatal failure.
    #[error("Failed to process a bolt message: {0}")]
    Fatal(BoltError),
}

impl BoltConnectionFatality {
    /// Wrap a fatal error according to its classification.
    pub fn from_error(error: BoltError) -> Self {
        match error.class() {
            ErrorClass::AuthFatal => BoltConnectionFatality::Authentication(error),
            ErrorClass::Breach => BoltConnectionFatality::ProtocolBreach(error.message),
            _ => BoltConnectionFatality::Fatal(error),
        }
    }

    /// Whether this fatality was caused by failed authentication.
    pub fn is_authentication(&self) -> bool {
        matches!(self, BoltConnectionFatality::Authentication(_))
    }
}

// ============================================================================
// Status codes
// ============================================================================

/// Bolt status codes used by the server core.
pub struct BoltErrorCode;

impl BoltErrorCode {
    // Client errors (recoverable)
    pub const REQUEST_INVALID: &'static str = "Neo.ClientError.Request.Invalid";
    pub const INVALID_FORMAT: &'static str = "Neo.ClientError.Request.InvalidFormat";
    pub const UNAUTHORIZED: &'static str = "Neo.ClientError.Security.Unauthorized";
    pub const SYNTAX_ERROR: &'static str = "Neo.ClientError.Statement.SyntaxError";
    pub const SEMANTIC_ERROR: &'static str = "Neo.ClientError.Statement.SemanticError";
    pub const INVALID_BOOKMARK: &'static str = "Neo.ClientError.Transaction.InvalidBookmark";

    // Database errors
    pub const GENERAL_ERROR: &'static str = "Neo.DatabaseError.General.UnknownError";
    pub const EXECUTION_FAILED: &'static str = "Neo.DatabaseError.Statement.ExecutionFailed";
}
