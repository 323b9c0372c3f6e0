//! Static operation catalog entries.

use std::fmt;
use std::sync::Arc;

use crate::schema::ParameterSchema;
use crate::traits::OperationHandler;

/// One API operation: its UI schema and the handler that performs it.
#[derive(Clone)]
pub struct OperationDescriptor {
    /// Operation id within its resource (`list`, `create`, ...).
    pub operation: &'static str,
    /// Label shown in the operation picker.
    pub name: &'static str,
    /// Sort key inside the resource; ties keep catalog order.
    pub order: u32,
    pub parameters: Vec<ParameterSchema>,
    pub handler: Arc<dyn OperationHandler>,
}

impl OperationDescriptor {
    pub fn new(
        operation: &'static str,
        name: &'static str,
        handler: impl OperationHandler + 'static,
    ) -> Self {
        Self {
            operation,
            name,
            order: 0,
            parameters: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    pub fn order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    pub fn parameters(mut self, parameters: Vec<ParameterSchema>) -> Self {
        self.parameters = parameters;
        self
    }
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("operation", &self.operation)
            .field("name", &self.name)
            .field("order", &self.order)
            .field("parameters", &self.parameters.len())
            .finish_non_exhaustive()
    }
}

/// A group of operations on one kind of API object.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    /// Resource id (`space`, `comment`, ...).
    pub resource: &'static str,
    pub name: &'static str,
    pub order: u32,
    pub operations: Vec<OperationDescriptor>,
}

impl ResourceDescriptor {
    pub fn new(resource: &'static str, name: &'static str, order: u32) -> Self {
        Self {
            resource,
            name,
            order,
            operations: Vec::new(),
        }
    }

    pub fn operation(mut self, operation: OperationDescriptor) -> Self {
        self.operations.push(operation);
        self
    }
}
