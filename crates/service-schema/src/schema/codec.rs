//! Transport encoding of a generated schema: JSON, then standard base64.
//!
//! The encoded string is what gets attached to the service definition and later
//! decoded by the runtime before any operation executes.

use super::Schema;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to serialize schema: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Schema generation failed due to null schema string")]
    MissingSchema,
    #[error("Schema generation failed due to empty schema string")]
    EmptySchema,
    #[error("schema string is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("schema string does not hold a valid schema: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Encodes a schema into a base64 string.
pub fn encode_schema(schema: &Schema) -> Result<String, EncodeError> {
    let bytes = serde_json::to_vec(schema)?;
    Ok(STANDARD.encode(bytes))
}

/// Decodes a schema previously produced by [`encode_schema`].
///
/// `None` stands for a service definition that carries no schema attribute at all.
pub fn decode_schema(encoded: Option<&str>) -> Result<Schema, DecodeError> {
    let encoded = encoded.ok_or(DecodeError::MissingSchema)?;
    if encoded.trim().is_empty() {
        return Err(DecodeError::EmptySchema);
    }
    let bytes = STANDARD.decode(encoded.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}

impl Schema {
    pub fn encode(&self) -> Result<String, EncodeError> {
        encode_schema(self)
    }

    pub fn decode(encoded: &str) -> Result<Self, DecodeError> {
        decode_schema(Some(encoded))
    }
}
