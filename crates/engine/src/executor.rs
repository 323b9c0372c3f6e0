//! Per-item execution driver.
//!
//! `ItemExecutor` is the node's single entry point:
//! 1. Resolves `resource` / `operation` from item 0 and looks up the handler
//!    (fails before any item runs if there is none).
//! 2. Reads the batching configuration once, from item 0.
//! 3. Runs the handler for every item, either serially or in timed waves of
//!    concurrent tasks.
//! 4. Folds the outcomes, in input order, into output record groups.
//!
//! Result classification differs between the two strategies on purpose: a
//! `None` result ends a serial run with no output, while a parallel run just
//! skips that item. A panicking handler is an item failure in both.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use nodes::{
    ExecutionContext, OperationError, OperationHandler, OperationResult, OutputGroups,
    OutputRecord,
};
use serde_json::Value;
use tracing::{debug, error, info, instrument};

use crate::batching::BatchConfig;
use crate::normalize::{error_record, success_records};
use crate::registry::OperationRegistry;
use crate::EngineError;

pub const RESOURCE_PARAMETER: &str = "resource";
pub const OPERATION_PARAMETER: &str = "operation";

// ---------------------------------------------------------------------------
// Settled outcome of one parallel launch
// ---------------------------------------------------------------------------

/// What one launched item resolved to. Failures are captured here, never
/// propagated out of the task.
#[derive(Debug)]
pub struct RequestResult {
    pub item_index: usize,
    pub outcome: Result<OperationResult, OperationError>,
}

// ---------------------------------------------------------------------------
// ItemExecutor
// ---------------------------------------------------------------------------

/// Dispatches one node execution against the operation registry.
pub struct ItemExecutor {
    registry: Arc<OperationRegistry>,
}

impl ItemExecutor {
    pub fn new(registry: Arc<OperationRegistry>) -> Self {
        Self { registry }
    }

    /// Run the selected operation for every item in `ctx`.
    ///
    /// # Errors
    /// Returns `EngineError` if the selectors are missing, no handler is
    /// registered for them, or an item fails while continue-on-failure is off.
    #[instrument(skip(self, ctx), fields(execution_id = %ctx.execution_id, items = ctx.item_count()))]
    pub async fn execute(&self, ctx: Arc<ExecutionContext>) -> Result<OutputGroups, EngineError> {
        let resource = selector(&ctx, RESOURCE_PARAMETER)?;
        let operation = selector(&ctx, OPERATION_PARAMETER)?;

        let handler = self.registry.get_call(&resource, &operation).ok_or_else(|| {
            EngineError::UnimplementedOperation {
                resource: resource.clone(),
                operation: operation.clone(),
            }
        })?;

        let batch = BatchConfig::resolve(&ctx);
        run_items(ctx, &resource, &operation, handler, batch).await
    }
}

/// Run `handler` over every item with an already resolved batching config.
pub async fn run_items(
    ctx: Arc<ExecutionContext>,
    resource: &str,
    operation: &str,
    handler: Arc<dyn OperationHandler>,
    batch: BatchConfig,
) -> Result<OutputGroups, EngineError> {
    if batch.enabled {
        info!(
            resource,
            operation,
            batch_size = batch.batch_size,
            batch_interval_ms = batch.batch_interval.as_millis() as u64,
            "running {} items in batches",
            ctx.item_count()
        );
        execute_parallel(ctx, resource, operation, handler, batch).await
    } else {
        info!(resource, operation, "running {} items serially", ctx.item_count());
        execute_serial(&ctx, resource, operation, handler.as_ref()).await
    }
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

async fn execute_serial(
    ctx: &ExecutionContext,
    resource: &str,
    operation: &str,
    handler: &dyn OperationHandler,
) -> Result<OutputGroups, EngineError> {
    let mut records = Vec::new();

    for item_index in 0..ctx.item_count() {
        debug!(resource, operation, item_index, "calling operation");

        let outcome = AssertUnwindSafe(handler.call(ctx, item_index))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(OperationError::Aborted(panic_message(payload.as_ref()))));

        match outcome {
            Ok(OperationResult::Multiple(groups)) => return Ok(groups),
            Ok(OperationResult::None) => {
                debug!(item_index, "operation returned no output, ending run");
                return Ok(Vec::new());
            }
            Ok(OperationResult::Single(payload)) => {
                records.extend(success_records(payload, item_index));
            }
            Err(err) => record_failure(ctx, &mut records, item_index, err)?,
        }
    }

    Ok(vec![records])
}

async fn execute_parallel(
    ctx: Arc<ExecutionContext>,
    resource: &str,
    operation: &str,
    handler: Arc<dyn OperationHandler>,
    batch: BatchConfig,
) -> Result<OutputGroups, EngineError> {
    // ------------------------------------------------------------------
    // Launch every item, pausing at each wave boundary.
    // ------------------------------------------------------------------
    let mut launched = Vec::with_capacity(ctx.item_count());

    for item_index in 0..ctx.item_count() {
        if batch.pauses_before(item_index) {
            debug!(batch = batch.wave_of(item_index), "pausing {:?} before next batch", batch.batch_interval);
            tokio::time::sleep(batch.batch_interval).await;
        }

        debug!(resource, operation, item_index, batch = batch.wave_of(item_index), "launching operation");
        let ctx = Arc::clone(&ctx);
        let handler = Arc::clone(&handler);
        launched.push(tokio::spawn(async move { handler.call(&ctx, item_index).await }));
    }

    // ------------------------------------------------------------------
    // Wait for all of them, then settle in input order.
    // ------------------------------------------------------------------
    let settled: Vec<RequestResult> = join_all(launched)
        .await
        .into_iter()
        .enumerate()
        .map(|(item_index, joined)| RequestResult {
            item_index,
            outcome: joined.unwrap_or_else(|e| Err(OperationError::Aborted(e.to_string()))),
        })
        .collect();

    let mut records = Vec::new();
    for RequestResult { item_index, outcome } in settled {
        match outcome {
            Ok(OperationResult::Multiple(groups)) => return Ok(groups),
            Ok(OperationResult::None) => continue,
            Ok(OperationResult::Single(payload)) => {
                records.extend(success_records(payload, item_index));
            }
            Err(err) => record_failure(&ctx, &mut records, item_index, err)?,
        }
    }

    Ok(vec![records])
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn record_failure(
    ctx: &ExecutionContext,
    records: &mut Vec<OutputRecord>,
    item_index: usize,
    err: OperationError,
) -> Result<(), EngineError> {
    error!(item_index, "operation failed: {err}");

    if ctx.continue_on_fail {
        records.push(error_record(&err, item_index));
        Ok(())
    } else {
        Err(EngineError::ItemFailed {
            item_index,
            source: err,
            emitted: std::mem::take(records),
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_owned());
    format!("handler panicked: {message}")
}

fn selector(ctx: &ExecutionContext, name: &'static str) -> Result<String, EngineError> {
    ctx.parameter(name, 0)
        .as_ref()
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .ok_or(EngineError::MissingSelector(name))
}
