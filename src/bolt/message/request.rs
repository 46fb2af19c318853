//! Bolt protocol request messages.
//!
//! Request messages are sent from the client to the server. The codec hands
//! them over as [`BoltStructure`]s; [`BoltRequest::from_structure`] turns
//! them into the typed requests the session state machine dispatches on.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use super::tag;
use crate::bolt::error::{BoltError, BoltErrorCode, BoltResult, ErrorClass};
use crate::bolt::value::{BoltMap, BoltStructure, BoltValue};

fn invalid_format(message: impl Into<String>) -> BoltError {
    BoltError::new(BoltErrorCode::INVALID_FORMAT, message, ErrorClass::Breach)
}

/// Authentication token carried by INIT.
#[derive(Clone, PartialEq)]
pub struct AuthToken {
    /// Authentication scheme (e.g., "basic", "none")
    pub scheme: String,
    /// Principal (username)
    pub principal: Option<String>,
    /// Credentials (password)
    pub credentials: Option<String>,
    /// Realm
    pub realm: Option<String>,
    /// Additional parameters
    pub parameters: BoltMap,
}

impl AuthToken {
    /// Create a basic auth token.
    pub fn basic(principal: &str, credentials: &str) -> Self {
        Self {
            scheme: "basic".to_string(),
            principal: Some(principal.to_string()),
            credentials: Some(credentials.to_string()),
            realm: None,
            parameters: HashMap::new(),
        }
    }

    /// Create an anonymous auth token (no auth).
    pub fn none() -> Self {
        Self {
            scheme: "none".to_string(),
            principal: None,
            credentials: None,
            realm: None,
            parameters: HashMap::new(),
        }
    }

    /// Parse from a decoded auth map. A missing scheme means "none".
    pub fn from_map(map: &BoltMap) -> Self {
        let text = |key: &str| map.get(key).and_then(|v| v.as_str()).map(str::to_string);

        let parameters = map
            .iter()
            .filter(|(k, _)| !["scheme", "principal", "credentials", "realm"].contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Self {
            scheme: text("scheme").unwrap_or_else(|| "none".to_string()),
            principal: text("principal"),
            credentials: text("credentials"),
            realm: text("realm"),
            parameters,
        }
    }
}

// Credentials never reach the logs.
impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("scheme", &self.scheme)
            .field("principal", &self.principal)
            .field("credentials", &self.credentials.as_ref().map(|_| "******"))
            .field("realm", &self.realm)
            .finish()
    }
}

/// All requests the session state machine handles.
#[derive(Debug, Clone)]
pub enum BoltRequest {
    /// INIT - Authenticate and initialize the session
    Init(InitMessage),
    /// RUN - Execute a statement
    Run(RunMessage),
    /// PULL_ALL - Stream all records of the open result
    PullAll,
    /// DISCARD_ALL - Consume the open result without sending records
    DiscardAll,
    /// RESET - Cancel work in flight and return to READY
    Reset,
    /// ACK_FAILURE - Acknowledge a failure and return to READY
    AckFailure,
    /// Internal signal synthesized when the connection has been interrupted.
    /// Never received from the wire.
    Interrupt,
}

impl BoltRequest {
    /// Get the message tag. The internal interrupt signal has none.
    pub fn tag(&self) -> Option<u8> {
        match self {
            BoltRequest::Init(_) => Some(tag::INIT),
            BoltRequest::Run(_) => Some(tag::RUN),
            BoltRequest::PullAll => Some(tag::PULL_ALL),
            BoltRequest::DiscardAll => Some(tag::DISCARD_ALL),
            BoltRequest::Reset => Some(tag::RESET),
            BoltRequest::AckFailure => Some(tag::ACK_FAILURE),
            BoltRequest::Interrupt => None,
        }
    }

    /// Get message name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            BoltRequest::Init(_) => "INIT",
            BoltRequest::Run(_) => "RUN",
            BoltRequest::PullAll => "PULL_ALL",
            BoltRequest::DiscardAll => "DISCARD_ALL",
            BoltRequest::Reset => "RESET",
            BoltRequest::AckFailure => "ACK_FAILURE",
            BoltRequest::Interrupt => "INTERRUPT",
        }
    }

    /// Whether the message is dispatched even when the connection has a
    /// pending failure or ignore staged.
    pub fn is_safe_in_any_state(&self) -> bool {
        matches!(self, BoltRequest::Interrupt)
    }

    /// Parse from a decoded structure.
    pub fn from_structure(s: &BoltStructure) -> BoltResult<Self> {
        match s.tag {
            tag::INIT => Ok(BoltRequest::Init(InitMessage::from_structure(s)?)),
            tag::RUN => Ok(BoltRequest::Run(RunMessage::from_structure(s)?)),
            tag::PULL_ALL => Ok(BoltRequest::PullAll),
            tag::DISCARD_ALL => Ok(BoltRequest::DiscardAll),
            tag::RESET => Ok(BoltRequest::Reset),
            tag::ACK_FAILURE => Ok(BoltRequest::AckFailure),
            _ => Err(invalid_format(format!(
                "Unknown request message tag: 0x{:02X}",
                s.tag
            ))),
        }
    }
}

impl fmt::Display for BoltRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// INIT message - Authenticate and initialize the session.
#[derive(Debug, Clone)]
pub struct InitMessage {
    /// User agent string
    pub user_agent: String,
    /// Authentication token
    pub auth_token: AuthToken,
}

impl InitMessage {
    /// Create a new INIT message.
    pub fn new(user_agent: &str, auth_token: AuthToken) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            auth_token,
        }
    }

    /// Parse from a decoded structure.
    pub fn from_structure(s: &BoltStructure) -> BoltResult<Self> {
        if s.tag != tag::INIT {
            return Err(invalid_format("Expected INIT tag"));
        }

        let user_agent = s
            .fields
            .first()
            .and_then(|v| v.as_str())
            .ok_or_else(|| invalid_format("INIT user agent must be string"))?
            .to_string();

        let auth_token = match s.fields.get(1) {
            Some(BoltValue::Map(map)) => AuthToken::from_map(map),
            Some(BoltValue::Null) | None => AuthToken::none(),
            Some(other) => {
                return Err(invalid_format(format!(
                    "INIT auth token must be map, got {}",
                    other.type_name()
                )))
            }
        };

        Ok(Self {
            user_agent,
            auth_token,
        })
    }
}

/// RUN message - Execute a statement.
#[derive(Debug, Clone)]
pub struct RunMessage {
    /// Statement text. Empty means "repeat the last statement".
    pub statement: String,
    /// Statement parameters
    pub parameters: BoltMap,
    /// Optional extras (`bookmark`, `tx_timeout`, `tx_metadata`)
    pub extra: BoltMap,
}

impl RunMessage {
    /// Create a new RUN message.
    pub fn new(statement: &str) -> Self {
        Self {
            statement: statement.to_string(),
            parameters: HashMap::new(),
            extra: HashMap::new(),
        }
    }

    /// Set statement parameters.
    pub fn with_parameters(mut self, params: BoltMap) -> Self {
        self.parameters = params;
        self
    }

    /// Set a bookmark extra.
    pub fn with_bookmark(mut self, bookmark: &str) -> Self {
        self.extra.insert("bookmark".to_string(), BoltValue::from(bookmark));
        self
    }

    /// Set a transaction timeout extra.
    pub fn with_tx_timeout(mut self, timeout: Duration) -> Self {
        self.extra.insert(
            "tx_timeout".to_string(),
            BoltValue::Integer(i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX)),
        );
        self
    }

    /// Set a transaction metadata extra.
    pub fn with_tx_metadata(mut self, metadata: BoltMap) -> Self {
        self.extra.insert("tx_metadata".to_string(), BoltValue::Map(metadata));
        self
    }

    /// Bookmark text, if supplied.
    pub fn bookmark(&self) -> Option<&str> {
        self.extra.get("bookmark").and_then(|v| v.as_str())
    }

    /// Transaction timeout, if supplied. Negative values are ignored.
    pub fn tx_timeout(&self) -> Option<Duration> {
        self.extra
            .get("tx_timeout")
            .and_then(|v| v.as_int())
            .filter(|ms| *ms >= 0)
            .map(|ms| Duration::from_millis(ms as u64))
    }

    /// Transaction metadata, if supplied.
    pub fn tx_metadata(&self) -> Option<&BoltMap> {
        self.extra.get("tx_metadata").and_then(|v| v.as_map())
    }

    /// Parse from a decoded structure.
    pub fn from_structure(s: &BoltStructure) -> BoltResult<Self> {
        if s.tag != tag::RUN {
            return Err(invalid_format("Expected RUN tag"));
        }
        if s.fields.len() < 2 {
            return Err(invalid_format("RUN requires statement and parameters"));
        }

        let statement = s.fields[0]
            .as_str()
            .ok_or_else(|| invalid_format("RUN statement must be string"))?
            .to_string();

        let parameters = match &s.fields[1] {
            BoltValue::Map(map) => map.clone(),
            BoltValue::Null => HashMap::new(),
            _ => return Err(invalid_format("RUN parameters must be map")),
        };

        let extra = s
            .fields
            .get(2)
            .and_then(|v| v.as_map())
            .cloned()
            .unwrap_or_default();

        Ok(Self {
            statement,
            parameters,
            extra,
        })
    }
}
