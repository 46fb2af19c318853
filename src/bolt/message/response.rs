//! Bolt protocol response messages.
//!
//! Response messages are sent from the server to the client. Each processed
//! request yields zero or more RECORDs followed by exactly one SUCCESS,
//! FAILURE or IGNORED.

use std::collections::HashMap;

use super::tag;
use crate::bolt::value::{BoltMap, BoltStructure, BoltValue};

/// All Bolt response messages.
#[derive(Debug, Clone, PartialEq)]
pub enum BoltResponse {
    /// SUCCESS - Operation completed successfully
    Success(SuccessMessage),
    /// RECORD - Query result record
    Record(RecordMessage),
    /// FAILURE - Operation failed
    Failure(FailureMessage),
    /// IGNORED - Message was ignored (connection in FAILED or INTERRUPTED state)
    Ignored,
}

impl BoltResponse {
    /// Get the message tag.
    pub fn tag(&self) -> u8 {
        match self {
            BoltResponse::Success(_) => tag::SUCCESS,
            BoltResponse::Record(_) => tag::RECORD,
            BoltResponse::Failure(_) => tag::FAILURE,
            BoltResponse::Ignored => tag::IGNORED,
        }
    }

    /// Get message name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            BoltResponse::Success(_) => "SUCCESS",
            BoltResponse::Record(_) => "RECORD",
            BoltResponse::Failure(_) => "FAILURE",
            BoltResponse::Ignored => "IGNORED",
        }
    }

    /// Check if this is a success response.
    pub fn is_success(&self) -> bool {
        matches!(self, BoltResponse::Success(_))
    }

    /// Check if this is a failure response.
    pub fn is_failure(&self) -> bool {
        matches!(self, BoltResponse::Failure(_))
    }

    /// Check if this is an ignored response.
    pub fn is_ignored(&self) -> bool {
        matches!(self, BoltResponse::Ignored)
    }

    /// Convert to a structure for the codec.
    pub fn to_structure(&self) -> BoltStructure {
        match self {
            BoltResponse::Success(msg) => msg.to_structure(),
            BoltResponse::Record(msg) => msg.to_structure(),
            BoltResponse::Failure(msg) => msg.to_structure(),
            BoltResponse::Ignored => BoltStructure::new(tag::IGNORED, vec![]),
        }
    }
}

/// SUCCESS message - Operation completed successfully.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuccessMessage {
    /// Response metadata
    pub metadata: BoltMap,
}

impl SuccessMessage {
    /// Create a new SUCCESS message with empty metadata.
    pub fn new() -> Self {
        Self {
            metadata: HashMap::new(),
        }
    }

    /// Create a SUCCESS message with metadata.
    pub fn with_metadata(metadata: BoltMap) -> Self {
        Self { metadata }
    }

    /// Get metadata entry.
    pub fn get(&self, key: &str) -> Option<&BoltValue> {
        self.metadata.get(key)
    }

    /// Get server agent (INIT).
    pub fn server(&self) -> Option<&str> {
        self.get("server").and_then(|v| v.as_str())
    }

    /// Get field names (RUN).
    pub fn fields(&self) -> Option<Vec<String>> {
        self.get("fields").and_then(|v| v.as_string_list())
    }

    /// Milliseconds until the result was available (RUN).
    pub fn result_available_after(&self) -> Option<i64> {
        self.get("result_available_after").and_then(|v| v.as_int())
    }

    /// Milliseconds until the result was consumed (PULL_ALL/DISCARD_ALL).
    pub fn result_consumed_after(&self) -> Option<i64> {
        self.get("result_consumed_after").and_then(|v| v.as_int())
    }

    /// Get bookmark.
    pub fn bookmark(&self) -> Option<&str> {
        self.get("bookmark").and_then(|v| v.as_str())
    }

    /// Convert to a structure for the codec.
    pub fn to_structure(&self) -> BoltStructure {
        BoltStructure::new(tag::SUCCESS, vec![BoltValue::Map(self.metadata.clone())])
    }
}

/// RECORD message - Query result record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMessage {
    /// Field values
    pub fields: Vec<BoltValue>,
}

impl RecordMessage {
    /// Create a new RECORD message.
    pub fn new(fields: Vec<BoltValue>) -> Self {
        Self { fields }
    }

    /// Get field at index.
    pub fn get(&self, index: usize) -> Option<&BoltValue> {
        self.fields.get(index)
    }

    /// Convert to a structure for the codec.
    pub fn to_structure(&self) -> BoltStructure {
        BoltStructure::new(tag::RECORD, vec![BoltValue::List(self.fields.clone())])
    }
}

/// FAILURE message - Operation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureMessage {
    /// Status code
    pub code: String,
    /// Error message
    pub message: String,
}

impl FailureMessage {
    /// Create a new FAILURE message.
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    /// Check if this is a client error.
    pub fn is_client_error(&self) -> bool {
        self.code.contains("ClientError")
    }

    /// Convert to a structure for the codec.
    pub fn to_structure(&self) -> BoltStructure {
        let mut metadata = HashMap::new();
        metadata.insert("code".to_string(), BoltValue::String(self.code.clone()));
        metadata.insert("message".to_string(), BoltValue::String(self.message.clone()));

        BoltStructure::new(tag::FAILURE, vec![BoltValue::Map(metadata)])
    }
}
