//! Binary payloads carried on items.
//!
//! Items hold files under `binary.<property>`:
//!
//! ```json
//! { "binary": { "data": { "data": "<base64>", "file_name": "a.png", "mime_type": "image/png", "file_size": 4 } } }
//! ```
//!
//! Download results use the same shape, so they can feed an upload directly.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::OperationError;

/// Key on an item that holds its binary properties.
pub const BINARY_KEY: &str = "binary";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryData {
    /// Base64 (standard alphabet) file content.
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<usize>,
}

impl BinaryData {
    pub fn from_bytes(bytes: &[u8], file_name: Option<String>, mime_type: Option<String>) -> Self {
        Self {
            data: STANDARD.encode(bytes),
            file_name,
            mime_type,
            file_size: Some(bytes.len()),
        }
    }

    pub fn bytes(&self) -> Result<Vec<u8>, OperationError> {
        STANDARD
            .decode(self.data.trim())
            .map_err(|e| OperationError::Validation(format!("binary data is not valid base64: {e}")))
    }

    /// `{ "binary": { <property>: self } }`.
    pub fn into_item(self, property: &str) -> Value {
        json!({ BINARY_KEY: { property: self } })
    }
}

/// The binary property `property` of `item`, if present.
pub fn item_binary(item: &Value, property: &str) -> Option<Result<BinaryData, OperationError>> {
    let value = item.get(BINARY_KEY)?.get(property)?;
    Some(
        serde_json::from_value(value.clone())
            .map_err(|e| OperationError::invalid(property, format!("malformed binary data: {e}"))),
    )
}
