//! Workflow details of a work item.

use async_trait::async_trait;
use client::RequestOptions;
use nodes::schema::common_options;
use nodes::{
    ExecutionContext, OperationDescriptor, OperationError, OperationHandler, OperationResult,
    ParameterSchema, ResourceDescriptor,
};
use serde_json::{json, Value};

pub fn resource() -> ResourceDescriptor {
    ResourceDescriptor::new("workflow_node", "Workflow Node", 60).operation(
        OperationDescriptor::new("query", "Get Workflow Details", WorkflowQuery).parameters(vec![
            ParameterSchema::string("project_key", "Project Key").required(),
            ParameterSchema::string("work_item_type_key", "Work Item Type Key").required(),
            ParameterSchema::string("work_item_id", "Work Item ID").required(),
            ParameterSchema::json(
                "body",
                "Request Body",
                json!({
                    "fields": [],
                    "expand": {
                        "need_workflow": true,
                        "relation_fields_detail": true,
                        "need_multi_text": true,
                        "need_user_detail": true,
                        "need_sub_task_parent": true
                    }
                }),
            ),
            common_options(),
        ]),
    )
}

pub struct WorkflowQuery;

#[async_trait]
impl OperationHandler for WorkflowQuery {
    async fn call(&self, ctx: &ExecutionContext, item_index: usize) -> Result<OperationResult, OperationError> {
        let project_key = ctx.required_string("project_key", item_index)?;
        let type_key = ctx.required_string("work_item_type_key", item_index)?;
        let work_item_id = ctx.required_string("work_item_id", item_index)?;
        let body = match ctx.json("body", item_index, "Request Body")? {
            Value::Null => json!({}),
            body => body,
        };

        let options = RequestOptions::post(format!(
            "/open_api/{project_key}/work_item/{type_key}/{work_item_id}/workflow/query"
        ))
        .body(body)
        .timeout_ms(ctx.timeout_ms(item_index)?);
        Ok(ctx.request(options).await?.into())
    }
}
