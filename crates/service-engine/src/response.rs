//! The JSON-shaped results of executing an operation.

use serde::Deserialize;
use serde::Serialize;
use service_schema::sources::LineColumn;
use service_schema::Name;
/// The `serde_json_bytes` version behind [`JsonValue`]
pub use serde_json_bytes;

pub type JsonValue = serde_json_bytes::Value;

pub type JsonMap = serde_json_bytes::Map<serde_json_bytes::ByteString, JsonValue>;

/// The result of executing one operation, or one event of a subscription.
///
/// `data` is `None` when the operation could not start, or when a field error
/// propagated all the way up to the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionResponse {
    // Serialized before `data`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub errors: Vec<GraphQLError>,

    pub data: Option<JsonMap>,
}

/// One entry of the `errors` list of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphQLError {
    pub message: String,

    /// Where the failing field was selected in the operation
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub locations: Vec<LineColumn>,

    /// Response path of the field that failed. Empty for request errors.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub path: Vec<ResponseDataPathSegment>,

    #[serde(skip_serializing_if = "JsonMap::is_empty")]
    #[serde(default)]
    pub extensions: JsonMap,
}

/// A response key or a list index.
///
/// The author of the second book of `{"books": [{"author": "A"}, {"author": "B"}]}`
/// is at `[Field("books"), ListIndex(1), Field("author")]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseDataPathSegment {
    Field(Name),

    ListIndex(usize),
}

impl GraphQLError {
    pub fn new(message: impl Into<String>, location: Option<LineColumn>) -> Self {
        Self {
            message: message.into(),
            locations: location.into_iter().collect(),
            path: Default::default(),
            extensions: Default::default(),
        }
    }
}

impl ExecutionResponse {
    /// A response for an operation that could not start executing
    pub fn request_error(message: impl Into<String>) -> Self {
        Self {
            errors: vec![GraphQLError::new(message, None)],
            data: None,
        }
    }
}
