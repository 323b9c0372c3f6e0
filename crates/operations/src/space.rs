//! Space operations.

use async_trait::async_trait;
use client::RequestOptions;
use nodes::schema::common_options;
use nodes::{
    ExecutionContext, OperationDescriptor, OperationError, OperationHandler, OperationResult,
    ParameterSchema, ResourceDescriptor,
};
use serde_json::{json, Map, Value};

use crate::support::user_key_or_default;

pub fn resource() -> ResourceDescriptor {
    ResourceDescriptor::new("space", "Space", 10)
        .operation(
            OperationDescriptor::new("list", "List Spaces", SpaceList)
                .order(1)
                .parameters(vec![
                    user_key_field(),
                    ParameterSchema::choice(
                        "order",
                        "Order",
                        &[
                            ("None", ""),
                            ("Last Visited", "last_visited"),
                            ("Last Visited Ascending", "+last_visited"),
                            ("Last Visited Descending", "-last_visited"),
                        ],
                    )
                    .description("Sort field with an optional +/- prefix; only last_visited is supported."),
                    common_options(),
                ]),
        )
        .operation(
            OperationDescriptor::new("detail", "Get Space Details", SpaceDetail)
                .order(2)
                .parameters(vec![
                    ParameterSchema::string("project_keys", "Project Keys")
                        .description("Up to 100 project_key values. project_keys and simple_names cannot both be empty."),
                    ParameterSchema::string("simple_names", "Simple Names")
                        .description("Space simple_name values as found in the space URL."),
                    user_key_field(),
                    common_options(),
                ]),
        )
        .operation(
            OperationDescriptor::new("work_item_types", "Get Work Item Types", SpaceWorkItemTypes)
                .order(3)
                .parameters(vec![
                    ParameterSchema::string("project_key", "Project Key").required(),
                    common_options(),
                ]),
        )
}

fn user_key_field() -> ParameterSchema {
    ParameterSchema::string("user_key", "User Key")
        .description("Leave empty to use the user key from the credentials.")
}

pub struct SpaceList;

#[async_trait]
impl OperationHandler for SpaceList {
    async fn call(&self, ctx: &ExecutionContext, item_index: usize) -> Result<OperationResult, OperationError> {
        let mut body = Map::new();
        body.insert("user_key".into(), json!(user_key_or_default(ctx, item_index)?));

        let order = ctx.string_or_default("order", item_index)?;
        if !order.is_empty() {
            body.insert("order".into(), json!([order]));
        }

        let options = RequestOptions::post("/open_api/projects")
            .body(Value::Object(body))
            .timeout_ms(ctx.timeout_ms(item_index)?);
        Ok(ctx.request(options).await?.into())
    }
}

pub struct SpaceDetail;

#[async_trait]
impl OperationHandler for SpaceDetail {
    async fn call(&self, ctx: &ExecutionContext, item_index: usize) -> Result<OperationResult, OperationError> {
        let project_keys = ctx.string_list("project_keys", item_index)?;
        let simple_names = ctx.string_list("simple_names", item_index)?;
        if project_keys.is_empty() && simple_names.is_empty() {
            return Err(OperationError::Validation(
                "project_keys and simple_names cannot both be empty".into(),
            ));
        }

        let mut body = Map::new();
        if !project_keys.is_empty() {
            body.insert("project_keys".into(), json!(project_keys));
        }
        if !simple_names.is_empty() {
            body.insert("simple_names".into(), json!(simple_names));
        }
        body.insert("user_key".into(), json!(user_key_or_default(ctx, item_index)?));

        let options = RequestOptions::post("/open_api/projects/detail")
            .body(Value::Object(body))
            .timeout_ms(ctx.timeout_ms(item_index)?);
        Ok(ctx.request(options).await?.into())
    }
}

pub struct SpaceWorkItemTypes;

#[async_trait]
impl OperationHandler for SpaceWorkItemTypes {
    async fn call(&self, ctx: &ExecutionContext, item_index: usize) -> Result<OperationResult, OperationError> {
        let project_key = ctx.required_string("project_key", item_index)?;
        let options = RequestOptions::get(format!("/open_api/{project_key}/work_item/all-types"))
            .timeout_ms(ctx.timeout_ms(item_index)?);
        Ok(ctx.request(options).await?.into())
    }
}
