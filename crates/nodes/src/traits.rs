//! The `OperationHandler` trait and the execution context handed to it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use client::{RawResponse, RequestOptions, Requester};
use serde_json::Value;
use uuid::Uuid;

use crate::binary::{item_binary, BinaryData};
use crate::options::CommonOptions;
use crate::{OperationError, OperationResult};

/// Host-side parameter resolution, keyed by item index.
///
/// Returns `None` when the parameter is not defined for that item.
pub trait ParameterSource: Send + Sync {
    fn parameter(&self, name: &str, item_index: usize) -> Option<Value>;
}

/// Everything a handler can see during one node execution.
///
/// Shared (behind an `Arc`) by every item of the batch, including items
/// running concurrently.
pub struct ExecutionContext {
    /// ID of the current execution run.
    pub execution_id: Uuid,
    /// Input items, in host order.
    pub items: Vec<Value>,
    /// Whether a failing item becomes an error record instead of aborting.
    pub continue_on_fail: bool,
    parameters: Arc<dyn ParameterSource>,
    client: Option<Arc<dyn Requester>>,
}

impl ExecutionContext {
    pub fn new(items: Vec<Value>, parameters: Arc<dyn ParameterSource>) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            items,
            continue_on_fail: false,
            parameters,
            client: None,
        }
    }

    pub fn with_client(mut self, client: Arc<dyn Requester>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_continue_on_fail(mut self, continue_on_fail: bool) -> Self {
        self.continue_on_fail = continue_on_fail;
        self
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// API client the handlers issue their calls through.
    pub fn client(&self) -> Result<&dyn Requester, OperationError> {
        self.client.as_deref().ok_or(OperationError::MissingClient)
    }

    pub async fn request(&self, options: RequestOptions) -> Result<Value, OperationError> {
        Ok(self.client()?.request(options).await?)
    }

    /// Raw body of a download-style call.
    pub async fn request_raw(&self, options: RequestOptions) -> Result<RawResponse, OperationError> {
        Ok(self.client()?.request_raw(options).await?)
    }

    /// Binary property `property` of the input item.
    pub fn binary(&self, item_index: usize, property: &str) -> Result<BinaryData, OperationError> {
        self.items
            .get(item_index)
            .and_then(|item| item_binary(item, property))
            .unwrap_or_else(|| {
                Err(OperationError::Validation(format!(
                    "item {item_index} has no binary data \"{property}\""
                )))
            })
    }

    /// Raw parameter value; `null` counts as not set.
    pub fn parameter(&self, name: &str, item_index: usize) -> Option<Value> {
        self.parameters
            .parameter(name, item_index)
            .filter(|v| !v.is_null())
    }

    /// A string parameter that must be present and non-empty.
    pub fn required_string(&self, name: &str, item_index: usize) -> Result<String, OperationError> {
        let value = self.string_or_default(name, item_index)?;
        if value.trim().is_empty() {
            return Err(OperationError::MissingParameter(name.to_owned()));
        }
        Ok(value)
    }

    /// A string parameter, empty when unset.
    ///
    /// Resource-locator values (`{ "mode": ..., "value": ... }`) resolve to `value`.
    pub fn string_or_default(&self, name: &str, item_index: usize) -> Result<String, OperationError> {
        match self.parameter(name, item_index) {
            None => Ok(String::new()),
            Some(value) => scalar_to_string(name, locator_value(value)),
        }
    }

    /// A list parameter given either as an array or as comma-separated text.
    /// Blank entries are dropped.
    pub fn string_list(&self, name: &str, item_index: usize) -> Result<Vec<String>, OperationError> {
        let entries = match self.parameter(name, item_index) {
            None => return Ok(Vec::new()),
            Some(Value::Array(values)) => values
                .into_iter()
                .filter(|v| !v.is_null())
                .map(|v| scalar_to_string(name, v))
                .collect::<Result<Vec<_>, _>>()?,
            Some(Value::String(text)) => text.split(',').map(str::to_owned).collect(),
            Some(other) => vec![scalar_to_string(name, other)?],
        };

        Ok(entries
            .into_iter()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect())
    }

    pub fn u64_or(&self, name: &str, item_index: usize, default: u64) -> Result<u64, OperationError> {
        match self.parameter(name, item_index) {
            None => Ok(default),
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .ok_or_else(|| OperationError::invalid(name, "expected a non-negative number")),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(default),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| OperationError::invalid(name, "expected a non-negative number")),
            Some(_) => Err(OperationError::invalid(name, "expected a non-negative number")),
        }
    }

    pub fn bool_or(&self, name: &str, item_index: usize, default: bool) -> Result<bool, OperationError> {
        match self.parameter(name, item_index) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(b),
            Some(_) => Err(OperationError::invalid(name, "expected a boolean")),
        }
    }

    /// A JSON parameter, accepted either as JSON text or as an already
    /// structured value. Unset or blank text yields `null`.
    pub fn json(&self, name: &str, item_index: usize, label: &str) -> Result<Value, OperationError> {
        match self.parameter(name, item_index) {
            None => Ok(Value::Null),
            Some(Value::String(text)) if text.trim().is_empty() => Ok(Value::Null),
            Some(Value::String(text)) => {
                serde_json::from_str(&text).map_err(|e| OperationError::InvalidJson {
                    label: label.to_owned(),
                    message: e.to_string(),
                })
            }
            Some(value) => Ok(value),
        }
    }

    /// The shared `options` collection, or `None` when the operation has none.
    pub fn common_options(&self, item_index: usize) -> Result<Option<CommonOptions>, OperationError> {
        match self.parameter("options", item_index) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| OperationError::invalid("options", e.to_string())),
        }
    }

    /// `options.timeout` for this item, if set.
    pub fn timeout_ms(&self, item_index: usize) -> Result<Option<u64>, OperationError> {
        Ok(self.common_options(item_index)?.and_then(|o| o.timeout))
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("execution_id", &self.execution_id)
            .field("items", &self.items.len())
            .field("continue_on_fail", &self.continue_on_fail)
            .field("has_client", &self.client.is_some())
            .finish_non_exhaustive()
    }
}

fn locator_value(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("mode") => {
            map.remove("value").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn scalar_to_string(name: &str, value: Value) -> Result<String, OperationError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(OperationError::invalid(name, "expected a text value")),
    }
}

/// The core operation trait.
///
/// One implementation per `(resource, operation)` pair. Handlers are
/// stateless between calls; everything item-specific comes from `ctx`.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    /// Perform the operation for the item at `item_index`.
    async fn call(
        &self,
        ctx: &ExecutionContext,
        item_index: usize,
    ) -> Result<OperationResult, OperationError>;
}

/// Shared handlers, so a caller can keep a handle on one it registered.
#[async_trait]
impl<T: OperationHandler + ?Sized> OperationHandler for Arc<T> {
    async fn call(
        &self,
        ctx: &ExecutionContext,
        item_index: usize,
    ) -> Result<OperationResult, OperationError> {
        (**self).call(ctx, item_index).await
    }
}
