//! What a handler hands back, and what the node emits.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Output of one node execution: one record list per output port.
pub type OutputGroups = Vec<Vec<OutputRecord>>;

/// Link from an output record back to the input item that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedItem {
    pub item: usize,
}

/// A single record on an output port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub json: Value,
    #[serde(rename = "pairedItem", default, skip_serializing_if = "Option::is_none")]
    pub paired_item: Option<PairedItem>,
}

impl OutputRecord {
    pub fn for_item(json: Value, item: usize) -> Self {
        Self {
            json,
            paired_item: Some(PairedItem { item }),
        }
    }

    pub fn item_index(&self) -> Option<usize> {
        self.paired_item.map(|p| p.item)
    }
}

/// Result of one handler call.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    /// A payload the engine turns into record(s) on port 0.
    Single(Value),
    /// Pre-built groups that replace the engine's own aggregation.
    Multiple(OutputGroups),
    /// Nothing to emit.
    None,
}

impl From<Value> for OperationResult {
    fn from(value: Value) -> Self {
        Self::Single(value)
    }
}
