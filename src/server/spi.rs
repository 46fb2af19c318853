//! Ports the session core calls out to.
//!
//! Authentication, statement execution, error reporting and versioning are
//! provided by the embedding server. Everything here must be `Send + Sync`:
//! handles are shared with the thread that delivers interrupts.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::bolt::{AuthToken, BoltFailure, BoltMap, BoltResult};

use super::bookmark::Bookmark;
use super::config::BoltServerConfig;
use super::result::QueryResult;

// ============================================================================
// Authentication
// ============================================================================

/// Identity established by a successful INIT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    /// Authenticated principal
    pub principal: String,
    /// Capabilities granted to the principal
    pub capabilities: HashSet<String>,
    /// Whether the client must change its credentials before doing work
    pub credentials_expired: bool,
}

impl AuthResult {
    /// Identity with no capabilities.
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            capabilities: HashSet::new(),
            credentials_expired: false,
        }
    }

    /// Grant a capability.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    /// Check a capability.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

/// What the authenticator knows about the connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Connection id
    pub connection_id: String,
    /// User agent from INIT
    pub user_agent: String,
}

/// Verifies INIT credentials.
pub trait Authenticator: Send + Sync {
    /// Authenticate. Failures should be classified `AuthFatal`.
    fn authenticate(&self, token: &AuthToken, info: &ConnectionInfo) -> BoltResult<AuthResult>;
}

// ============================================================================
// Execution
// ============================================================================

/// Lower-level handle backing an open result.
pub trait ResultHandle: Send + Sync {
    /// Start execution and obtain the result.
    fn start(&self) -> BoltResult<Box<dyn QueryResult>>;

    /// Release the execution. `success` is false when streaming failed.
    fn close(&self, success: bool);

    /// Best-effort cancellation. May be called from any thread.
    fn terminate(&self);
}

/// An explicit transaction opened by BEGIN.
pub trait TransactionHandle: Send + Sync {
    /// Execute a statement inside the transaction.
    fn execute_query(&self, statement: &str, params: &BoltMap) -> BoltResult<Arc<dyn ResultHandle>>;

    /// Commit.
    fn commit(&self) -> BoltResult<()>;

    /// Roll back.
    fn rollback(&self) -> BoltResult<()>;

    /// Best-effort cancellation. May be called from any thread.
    fn terminate(&self);
}

/// Opaque statement executor (the query engine).
pub trait QueryExecutor: Send + Sync {
    /// Execute a statement in its own implicit transaction.
    fn execute_query(
        &self,
        auth: &AuthResult,
        statement: &str,
        params: &BoltMap,
        bookmark: Option<&Bookmark>,
        timeout: Option<Duration>,
        metadata: Option<&BoltMap>,
    ) -> BoltResult<Arc<dyn ResultHandle>>;

    /// Open an explicit transaction. When a bookmark is given the executor
    /// must not start before that transaction id is visible.
    fn begin_transaction(
        &self,
        auth: &AuthResult,
        bookmark: Option<&Bookmark>,
        timeout: Option<Duration>,
        metadata: Option<&BoltMap>,
    ) -> BoltResult<Arc<dyn TransactionHandle>>;

    /// Id of the newest transaction this executor has seen committed.
    fn newest_encountered_tx_id(&self) -> u64;
}

// ============================================================================
// Reporting and versioning
// ============================================================================

/// Sink for failure diagnostics. Called for every classified failure.
pub trait ErrorReporter: Send + Sync {
    /// Report a failure.
    fn report(&self, failure: &BoltFailure);
}

/// Logs failures through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, failure: &BoltFailure) {
        if failure.is_client_error() && !failure.fatal {
            debug!(code = %failure.code, "Client error: {}", failure.message);
        } else {
            error!(
                code = %failure.code,
                fatal = failure.fatal,
                "Bolt failure: {}",
                failure.message
            );
        }
    }
}

/// Server version surfaced as `server` metadata on INIT.
pub trait VersionProvider: Send + Sync {
    /// Version string, e.g. `Zeta4G/1.0.0`.
    fn server_version(&self) -> String;
}

/// Version provider returning a fixed string.
#[derive(Debug, Clone)]
pub struct StaticVersionProvider {
    version: String,
}

impl StaticVersionProvider {
    /// Provider for `version`.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

impl From<&BoltServerConfig> for StaticVersionProvider {
    fn from(config: &BoltServerConfig) -> Self {
        Self::new(config.server_agent.clone())
    }
}

impl VersionProvider for StaticVersionProvider {
    fn server_version(&self) -> String {
        self.version.clone()
    }
}

// ============================================================================
// BoltSpi
// ============================================================================

/// Bundle of ports shared by every session of a server.
#[derive(Clone)]
pub struct BoltSpi {
    /// Credential verification
    pub authenticator: Arc<dyn Authenticator>,
    /// Query engine
    pub executor: Arc<dyn QueryExecutor>,
    /// Failure diagnostics
    pub error_reporter: Arc<dyn ErrorReporter>,
    /// Server version
    pub version: Arc<dyn VersionProvider>,
}

impl BoltSpi {
    /// Bundle with failures logged through `tracing`.
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        executor: Arc<dyn QueryExecutor>,
        version: Arc<dyn VersionProvider>,
    ) -> Self {
        Self {
            authenticator,
            executor,
            error_reporter: Arc::new(TracingErrorReporter),
            version,
        }
    }

    /// Replace the error reporter.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }
}

impl fmt::Debug for BoltSpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoltSpi")
            .field("version", &self.version.server_version())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_result_capabilities() {
        let auth = AuthResult::new("zeta4g").with_capability("write");
        assert!(auth.has_capability("write"));
        assert!(!auth.has_capability("admin"));
        assert!(!auth.credentials_expired);
    }

    #[test]
    fn test_static_version_provider() {
        let provider = StaticVersionProvider::new("Zeta4G/1.0.0");
        assert_eq!(provider.server_version(), "Zeta4G/1.0.0");

        let config = BoltServerConfig::builder().server_agent("Zeta4G/9.9.9").build();
        assert_eq!(StaticVersionProvider::from(&config).server_version(), "Zeta4G/9.9.9");
    }

    #[test]
    fn test_tracing_reporter_accepts_all_failures() {
        let reporter = TracingErrorReporter;
        reporter.report(&BoltFailure {
            code: "Neo.ClientError.Statement.SyntaxError".to_string(),
            message: "bad".to_string(),
            fatal: false,
        });
        reporter.report(&BoltFailure {
            code: "Neo.DatabaseError.General.UnknownError".to_string(),
            message: "boom".to_string(),
            fatal: true,
        });
    }
}
