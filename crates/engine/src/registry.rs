//! Operation registry — `(resource, operation)` → handler.
//!
//! Built once from the static catalog. After construction it is a pure
//! lookup table; [`OperationRegistry::build`] also renders the full parameter
//! schema for the host UI.

use std::collections::HashMap;
use std::sync::Arc;

use nodes::schema::{ParameterKind, ParameterOption};
use nodes::{OperationHandler, ParameterSchema, ResourceDescriptor};
use serde_json::json;

use crate::EngineError;

/// Composite registry key, `resource:operation`.
pub fn operation_key(resource: &str, operation: &str) -> String {
    format!("{resource}:{operation}")
}

pub struct OperationRegistry {
    resources: Vec<ResourceDescriptor>,
    handlers: HashMap<String, Arc<dyn OperationHandler>>,
}

impl OperationRegistry {
    /// Index the catalog. Resources and their operations are kept sorted by
    /// `order` (stable, so ties keep catalog order).
    ///
    /// # Errors
    /// [`EngineError::DuplicateOperation`] if two entries share a key.
    pub fn new(mut resources: Vec<ResourceDescriptor>) -> Result<Self, EngineError> {
        resources.sort_by_key(|r| r.order);
        let mut handlers = HashMap::new();

        for resource in &mut resources {
            resource.operations.sort_by_key(|op| op.order);
            for op in &resource.operations {
                let key = operation_key(resource.resource, op.operation);
                if handlers.insert(key.clone(), Arc::clone(&op.handler)).is_some() {
                    return Err(EngineError::DuplicateOperation(key));
                }
            }
        }

        Ok(Self { resources, handlers })
    }

    /// Handler registered for the pair, if any.
    pub fn get_call(&self, resource: &str, operation: &str) -> Option<Arc<dyn OperationHandler>> {
        self.handlers.get(&operation_key(resource, operation)).cloned()
    }

    pub fn resources(&self) -> &[ResourceDescriptor] {
        &self.resources
    }

    /// Registered keys in catalog order.
    pub fn keys(&self) -> Vec<String> {
        self.resources
            .iter()
            .flat_map(|r| r.operations.iter().map(|op| operation_key(r.resource, op.operation)))
            .collect()
    }

    /// Full ordered parameter list: the resource picker, one operation picker
    /// per resource, then each operation's own fields.
    pub fn build(&self) -> Vec<ParameterSchema> {
        let mut properties = Vec::new();

        let mut resource_picker = ParameterSchema::new(
            ParameterKind::Options,
            "resource",
            "Resource",
            self.resources
                .first()
                .map(|r| json!(r.resource))
                .unwrap_or(json!("")),
        );
        resource_picker.options = self
            .resources
            .iter()
            .map(|r| ParameterOption::Choice {
                name: r.name.to_owned(),
                value: json!(r.resource),
            })
            .collect();
        properties.push(resource_picker);

        for resource in &self.resources {
            let mut operation_picker = ParameterSchema::new(
                ParameterKind::Options,
                "operation",
                "Operation",
                resource
                    .operations
                    .first()
                    .map(|op| json!(op.operation))
                    .unwrap_or(json!("")),
            )
            .show_when("resource", &[resource.resource]);
            operation_picker.options = resource
                .operations
                .iter()
                .map(|op| ParameterOption::Choice {
                    name: op.name.to_owned(),
                    value: json!(op.operation),
                })
                .collect();
            properties.push(operation_picker);
        }

        for resource in &self.resources {
            for op in &resource.operations {
                properties.extend(op.parameters.iter().cloned().map(|p| {
                    p.show_when("resource", &[resource.resource])
                        .show_when("operation", &[op.operation])
                }));
            }
        }

        properties
    }
}
