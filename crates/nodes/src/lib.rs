//! `nodes` crate — the `OperationHandler` trait and everything a handler
//! works with.
//!
//! Every Feishu Project operation implements [`OperationHandler`]. The engine
//! crate dispatches execution through this trait object.

pub mod binary;
pub mod descriptor;
pub mod error;
pub mod mock;
pub mod options;
pub mod params;
pub mod result;
pub mod schema;
pub mod traits;

pub use binary::BinaryData;
pub use descriptor::{OperationDescriptor, ResourceDescriptor};
pub use error::OperationError;
pub use options::CommonOptions;
pub use params::ItemParameters;
pub use result::{OperationResult, OutputGroups, OutputRecord, PairedItem};
pub use schema::ParameterSchema;
pub use traits::{ExecutionContext, OperationHandler, ParameterSource};
