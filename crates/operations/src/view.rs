//! View configuration listing.

use async_trait::async_trait;
use client::RequestOptions;
use nodes::schema::timeout_only_options;
use nodes::{
    ExecutionContext, OperationDescriptor, OperationError, OperationHandler, OperationResult,
    ParameterSchema, ResourceDescriptor,
};
use serde_json::{json, Value};

pub fn resource() -> ResourceDescriptor {
    ResourceDescriptor::new("view", "View", 70).operation(
        OperationDescriptor::new("list", "List Views", ViewList)
            .order(1)
            .parameters(vec![
                ParameterSchema::project_key(),
                ParameterSchema::json(
                    "body",
                    "Request Body",
                    json!({
                        "work_item_type_key": "",
                        "view_ids": [""],
                        "created_by": "",
                        "created_at": { "start": 0, "end": 0 },
                        "page_size": 10,
                        "page_num": 1,
                        "view_name": ""
                    }),
                ),
                timeout_only_options(),
            ]),
    )
}

pub struct ViewList;

#[async_trait]
impl OperationHandler for ViewList {
    async fn call(&self, ctx: &ExecutionContext, item_index: usize) -> Result<OperationResult, OperationError> {
        let project_key = ctx.required_string("project_key", item_index)?;
        let body = match ctx.json("body", item_index, "Request Body")? {
            Value::Null => json!({}),
            body => body,
        };

        let options = RequestOptions::post(format!("/open_api/{project_key}/view_conf/list"))
            .body(body)
            .timeout_ms(ctx.timeout_ms(item_index)?);
        Ok(ctx.request(options).await?.into())
    }
}
