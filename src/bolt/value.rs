//! Decoded Bolt values.
//!
//! The wire codec lives outside this crate; it hands the session layer
//! messages whose payloads are already decoded into [`BoltValue`]s.

use std::collections::HashMap;

/// Statement parameters and transaction metadata share this shape.
pub type BoltMap = HashMap<String, BoltValue>;

/// A decoded Bolt value.
#[derive(Debug, Clone, PartialEq)]
pub enum BoltValue {
    /// Null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point
    Float(f64),
    /// Byte array
    Bytes(Vec<u8>),
    /// UTF-8 string
    String(String),
    /// List of values
    List(Vec<BoltValue>),
    /// Map of string keys to values
    Map(BoltMap),
    /// Structure (tag + fields)
    Structure(BoltStructure),
}

/// A tagged structure: either a whole request/response message or a
/// graph/temporal value nested inside one.
#[derive(Debug, Clone, PartialEq)]
pub struct BoltStructure {
    /// Structure tag (identifies the type)
    pub tag: u8,
    /// Structure fields
    pub fields: Vec<BoltValue>,
}

impl BoltStructure {
    /// Create a new structure with given tag and fields.
    pub fn new(tag: u8, fields: Vec<BoltValue>) -> Self {
        Self { tag, fields }
    }

    /// Get the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the structure has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl BoltValue {
    /// Build a list of strings, as used for `fields` metadata.
    pub fn string_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BoltValue::List(items.into_iter().map(|s| BoltValue::String(s.into())).collect())
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, BoltValue::Null)
    }

    /// Try to get as boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BoltValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            BoltValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            BoltValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as list reference.
    pub fn as_list(&self) -> Option<&[BoltValue]> {
        match self {
            BoltValue::List(l) => Some(l),
            _ => None,
        }
    }

    /// Try to get as map reference.
    pub fn as_map(&self) -> Option<&BoltMap> {
        match self {
            BoltValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Collect a list of strings, skipping non-string entries.
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        self.as_list().map(|list| {
            list.iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
    }

    /// Get the type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            BoltValue::Null => "Null",
            BoltValue::Boolean(_) => "Boolean",
            BoltValue::Integer(_) => "Integer",
            BoltValue::Float(_) => "Float",
            BoltValue::Bytes(_) => "Bytes",
            BoltValue::String(_) => "String",
            BoltValue::List(_) => "List",
            BoltValue::Map(_) => "Map",
            BoltValue::Structure(_) => "Structure",
        }
    }
}

impl From<bool> for BoltValue {
    fn from(v: bool) -> Self {
        BoltValue::Boolean(v)
    }
}

impl From<i64> for BoltValue {
    fn from(v: i64) -> Self {
        BoltValue::Integer(v)
    }
}

impl From<f64> for BoltValue {
    fn from(v: f64) -> Self {
        BoltValue::Float(v)
    }
}

impl From<String> for BoltValue {
    fn from(v: String) -> Self {
        BoltValue::String(v)
    }
}

impl From<&str> for BoltValue {
    fn from(v: &str) -> Self {
        BoltValue::String(v.to_string())
    }
}

impl From<Vec<BoltValue>> for BoltValue {
    fn from(v: Vec<BoltValue>) -> Self {
        BoltValue::List(v)
    }
}

impl From<BoltMap> for BoltValue {
    fn from(v: BoltMap) -> Self {
        BoltValue::Map(v)
    }
}
