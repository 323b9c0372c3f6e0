//! Engine-level error types.

use nodes::{OperationError, OutputRecord};
use thiserror::Error;

/// Errors produced by the dispatcher and the execution driver.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Registry errors ------

    /// Two catalog entries share the same `resource:operation` key.
    #[error("duplicate operation '{0}'")]
    DuplicateOperation(String),

    // ------ Execution errors ------

    /// The `resource` or `operation` selector is not set on item 0.
    #[error("parameter '{0}' must be set to pick an operation")]
    MissingSelector(&'static str),

    /// No handler is registered for the selected pair; no item was run.
    #[error("the operation '{operation}' is not implemented for resource '{resource}'")]
    UnimplementedOperation { resource: String, operation: String },

    /// An item failed and continue-on-failure is off; the batch was aborted.
    ///
    /// `emitted` holds the port-0 records of the items settled before it.
    #[error("item {item_index} failed: {source}")]
    ItemFailed {
        item_index: usize,
        #[source]
        source: OperationError,
        emitted: Vec<OutputRecord>,
    },
}
