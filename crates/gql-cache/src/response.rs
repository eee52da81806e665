//! The wire-level shapes this crate exchanges with an executor (§6): a
//! [`GraphQLError`] and the path segments inside `data` it may point at.

use serde::Deserialize;
use serde::Serialize;

/// A JSON-compatible dynamically-typed value.
///
/// [`serde_json_bytes::Value`] is similar to [`serde_json::Value`] but uses a
/// reference-counted [`serde_json_bytes::ByteString`] for string values and map
/// keys, which is what makes cheap structural sharing of read/write
/// projections possible.
pub type JsonValue = serde_json_bytes::Value;

/// A JSON-compatible object/map with string keys and dynamically-typed values.
pub type JsonMap = serde_json_bytes::Map<serde_json_bytes::ByteString, JsonValue>;

/// A serializable GraphQL error, as found in an executor result (§6
/// `GraphQLError`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphQLError {
    pub message: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub locations: Vec<ErrorLocation>,

    /// If non-empty, the error is a field error for the value found at this
    /// path in the executor result's `data`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub path: Vec<ResponseDataPathSegment>,
}

impl GraphQLError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: Vec::new(),
        }
    }
}

/// A line/column pair within the document the executor ran, as referenced by
/// [`GraphQLError::locations`].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLocation {
    pub line: usize,
    pub column: usize,
}

/// One segment of a path into an executor result's `data`, from the root
/// down to increasingly nested objects or arrays.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseDataPathSegment {
    Field(String),
    ListIndex(usize),
}
