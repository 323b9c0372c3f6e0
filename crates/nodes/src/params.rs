//! In-memory [`ParameterSource`] for hosts that resolve parameters up front.

use serde_json::{Map, Value};

use crate::traits::ParameterSource;
use crate::OperationError;

/// Node-level parameters plus optional per-item overrides.
///
/// Lookup checks the item's overrides first, then the node-level value.
#[derive(Debug, Clone, Default)]
pub struct ItemParameters {
    node: Map<String, Value>,
    items: Vec<Map<String, Value>>,
}

impl ItemParameters {
    pub fn new(node: Map<String, Value>) -> Self {
        Self { node, items: Vec::new() }
    }

    /// Build from a JSON object of node-level parameters.
    pub fn from_value(node: Value) -> Result<Self, OperationError> {
        match node {
            Value::Object(map) => Ok(Self::new(map)),
            Value::Null => Ok(Self::default()),
            _ => Err(OperationError::invalid("parameters", "expected a JSON object")),
        }
    }

    /// Per-item overrides, positionally aligned with the input items.
    pub fn with_item_overrides(mut self, items: Vec<Map<String, Value>>) -> Self {
        self.items = items;
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.node.insert(name.into(), value);
    }
}

impl ParameterSource for ItemParameters {
    fn parameter(&self, name: &str, item_index: usize) -> Option<Value> {
        self.items
            .get(item_index)
            .and_then(|item| item.get(name))
            .or_else(|| self.node.get(name))
            .cloned()
    }
}
