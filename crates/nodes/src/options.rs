//! Shared `options` collection values.

use serde::{Deserialize, Serialize};

/// Value of the `options` parameter shared by non-paginated operations.
///
/// Operations with extra options ignore the fields they do not know.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batching: Option<BatchingOption>,
    /// Response timeout in milliseconds; 0 disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// `options.batching`: present once the user adds the Batching option.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchingOption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_interval: Option<u64>,
}
