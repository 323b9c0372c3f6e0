//! `MockOperation` — a test double for `OperationHandler`.
//!
//! Useful in engine tests where a real HTTP-backed operation is either
//! unavailable or irrelevant.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::traits::{ExecutionContext, OperationHandler};
use crate::{OperationError, OperationResult, OutputGroups};

/// Behaviour injected into `MockOperation` at construction time.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Return a single payload (merged with the operation name and item index).
    ReturnValue(Value),
    /// Return a payload verbatim, e.g. an array.
    ReturnRaw(Value),
    /// Return pre-built output groups.
    ReturnMultiple(OutputGroups),
    /// Return the no-output marker.
    ReturnNone,
    /// Fail with a validation error.
    Fail(String),
    /// Panic inside the handler.
    Panic(String),
}

/// A mock operation that records every call it receives and returns a
/// programmer-specified result, optionally different per item.
pub struct MockOperation {
    /// Label used in test assertions.
    pub name: String,
    default: MockBehaviour,
    per_item: HashMap<usize, MockBehaviour>,
    delays: HashMap<usize, Duration>,
    /// Item indices seen by this operation (in call order).
    pub calls: Arc<Mutex<Vec<usize>>>,
    started: Arc<Mutex<Vec<(usize, Instant)>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockOperation {
    pub fn new(name: impl Into<String>, default: MockBehaviour) -> Self {
        Self {
            name: name.into(),
            default,
            per_item: HashMap::new(),
            delays: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
            started: Arc::new(Mutex::new(Vec::new())),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Create a mock that always succeeds with the given value.
    pub fn returning(name: impl Into<String>, value: Value) -> Self {
        Self::new(name, MockBehaviour::ReturnValue(value))
    }

    /// Create a mock that always fails.
    pub fn failing(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(name, MockBehaviour::Fail(msg.into()))
    }

    /// Override the behaviour for one item.
    pub fn on_item(mut self, item_index: usize, behaviour: MockBehaviour) -> Self {
        self.per_item.insert(item_index, behaviour);
        self
    }

    /// Make one item's call take `delay` before settling.
    pub fn delay_item(mut self, item_index: usize, delay: Duration) -> Self {
        self.delays.insert(item_index, delay);
        self
    }

    /// Number of times this operation has been called.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn called_items(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of calls that were in progress at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// When each item's call started, in call order.
    pub fn start_times(&self) -> Vec<(usize, Instant)> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl OperationHandler for MockOperation {
    async fn call(
        &self,
        _ctx: &ExecutionContext,
        item_index: usize,
    ) -> Result<OperationResult, OperationError> {
        self.calls.lock().unwrap().push(item_index);
        self.started.lock().unwrap().push((item_index, Instant::now()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(&item_index) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let behaviour = self.per_item.get(&item_index).unwrap_or(&self.default);
        match behaviour {
            MockBehaviour::ReturnValue(v) => {
                // Tag the output so tests can trace which item produced it.
                let mut out = json!({ "operation": self.name, "item": item_index });
                if let (Some(out_obj), Some(v_obj)) = (out.as_object_mut(), v.as_object()) {
                    for (k, val) in v_obj {
                        out_obj.insert(k.clone(), val.clone());
                    }
                }
                Ok(OperationResult::Single(out))
            }
            MockBehaviour::ReturnRaw(v) => Ok(OperationResult::Single(v.clone())),
            MockBehaviour::ReturnMultiple(groups) => Ok(OperationResult::Multiple(groups.clone())),
            MockBehaviour::ReturnNone => Ok(OperationResult::None),
            MockBehaviour::Fail(msg) => Err(OperationError::Validation(msg.clone())),
            MockBehaviour::Panic(msg) => panic!("{msg}"),
        }
    }
}
