//! Bookmarks: opaque causal tokens wrapping a transaction id.

use std::fmt;

use crate::bolt::{BoltError, BoltErrorCode, BoltMap, BoltResult, BoltValue};

const BOOKMARK_TX_PREFIX: &str = "neo4j:bookmark:v1:tx";

/// Causal consistency token produced on commit and by auto-commit streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bookmark {
    tx_id: u64,
}

impl Bookmark {
    /// Bookmark for the given transaction id.
    pub fn new(tx_id: u64) -> Self {
        Self { tx_id }
    }

    /// Transaction id carried by the bookmark.
    pub fn tx_id(&self) -> u64 {
        self.tx_id
    }

    /// Parse `neo4j:bookmark:v1:tx<id>` or a bare transaction id.
    pub fn parse(text: &str) -> BoltResult<Self> {
        text.strip_prefix(BOOKMARK_TX_PREFIX)
            .unwrap_or(text)
            .parse::<u64>()
            .ok()
            .map(Self::new)
            .ok_or_else(|| {
                BoltError::client(
                    BoltErrorCode::INVALID_BOOKMARK,
                    format!(
                        "Supplied bookmark '{}' does not conform to pattern {}<id>",
                        text, BOOKMARK_TX_PREFIX
                    ),
                )
            })
    }

    /// Read a bookmark from statement parameters.
    ///
    /// Accepts a single `bookmark` string or a `bookmarks` list, in which
    /// case the newest transaction id wins.
    pub fn from_params(params: &BoltMap) -> BoltResult<Option<Self>> {
        if let Some(list) = params.get("bookmarks").and_then(|v| v.as_list()) {
            let mut newest: Option<Bookmark> = None;
            for item in list {
                let text = item.as_str().ok_or_else(|| {
                    BoltError::client(
                        BoltErrorCode::INVALID_BOOKMARK,
                        format!("Bookmark must be a string, got {}", item.type_name()),
                    )
                })?;
                let bookmark = Self::parse(text)?;
                newest = newest.max(Some(bookmark));
            }
            return Ok(newest);
        }

        match params.get("bookmark") {
            None | Some(BoltValue::Null) => Ok(None),
            Some(BoltValue::String(text)) => Self::parse(text).map(Some),
            Some(other) => Err(BoltError::client(
                BoltErrorCode::INVALID_BOOKMARK,
                format!("Bookmark must be a string, got {}", other.type_name()),
            )),
        }
    }

    /// Value attached as `bookmark` metadata.
    pub fn to_value(&self) -> BoltValue {
        BoltValue::String(self.to_string())
    }
}

impl fmt::Display for Bookmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", BOOKMARK_TX_PREFIX, self.tx_id)
    }
}
