//! Parsed API responses
//!
//! Response bodies are decoded into an [`ApiValue`] tree in which every
//! mapping key is an interned [`Symbol`]. Insertion order of mappings and
//! index order of sequences are preserved.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Number, Value};
use std::ops::Index;

use crate::error::Result;
use crate::http::error::general_api_error;
use crate::symbol::Symbol;

/// JSON value whose mapping keys are symbols
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum ApiValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<ApiValue>),
    Object(IndexMap<Symbol, ApiValue>),
}

static NULL: ApiValue = ApiValue::Null;

impl ApiValue {
    /// Look up a key when this value is a mapping
    pub fn get(&self, key: &str) -> Option<&ApiValue> {
        match self {
            ApiValue::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ApiValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ApiValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ApiValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<ApiValue>> {
        match self {
            ApiValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<Symbol, ApiValue>> {
        match self {
            ApiValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, ApiValue::Object(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ApiValue::Null)
    }
}

impl From<Value> for ApiValue {
    /// Symbolize every mapping key, recursively
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ApiValue::Null,
            Value::Bool(b) => ApiValue::Bool(b),
            Value::Number(n) => ApiValue::Number(n),
            Value::String(s) => ApiValue::String(s),
            Value::Array(items) => ApiValue::Array(items.into_iter().map(ApiValue::from).collect()),
            Value::Object(map) => ApiValue::Object(
                map.into_iter()
                    .map(|(key, value)| (Symbol::from(key), ApiValue::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&ApiValue> for Value {
    fn from(value: &ApiValue) -> Self {
        match value {
            ApiValue::Null => Value::Null,
            ApiValue::Bool(b) => Value::Bool(*b),
            ApiValue::Number(n) => Value::Number(n.clone()),
            ApiValue::String(s) => Value::String(s.clone()),
            ApiValue::Array(items) => Value::Array(items.iter().map(Value::from).collect()),
            ApiValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.as_str().to_string(), Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl Index<&str> for ApiValue {
    type Output = ApiValue;

    /// Missing keys and non-mappings index to `Null`
    fn index(&self, key: &str) -> &ApiValue {
        self.get(key).unwrap_or(&NULL)
    }
}

impl Index<usize> for ApiValue {
    type Output = ApiValue;

    fn index(&self, index: usize) -> &ApiValue {
        match self {
            ApiValue::Array(items) => items.get(index).unwrap_or(&NULL),
            _ => &NULL,
        }
    }
}

/// A successful response with its body symbolized
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedResponse {
    /// HTTP status code
    pub status: u16,
    /// Decoded body
    pub data: ApiValue,
}

impl ParsedResponse {
    /// Shorthand for `self.data.get(key)`
    pub fn get(&self, key: &str) -> Option<&ApiValue> {
        self.data.get(key)
    }
}

/// Decode a JSON body into symbolized form.
///
/// Malformed JSON becomes a generic API error carrying the status and the
/// raw body.
pub fn parse_response(status: u16, body: &str) -> Result<ParsedResponse> {
    let value: Value =
        serde_json::from_str(body).map_err(|_| general_api_error(status, body))?;

    Ok(ParsedResponse {
        status,
        data: ApiValue::from(value),
    })
}
