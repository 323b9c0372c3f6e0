//! `engine` crate — the operation registry and the per-item execution driver.

pub mod batching;
pub mod error;
pub mod executor;
pub mod normalize;
pub mod registry;

pub use batching::BatchConfig;
pub use error::EngineError;
pub use executor::{run_items, ItemExecutor, RequestResult};
pub use registry::OperationRegistry;

#[cfg(test)]
mod executor_tests;
