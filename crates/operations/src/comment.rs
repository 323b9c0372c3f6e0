//! Work item comments.

use async_trait::async_trait;
use client::RequestOptions;
use nodes::schema::{common_options, timeout_only_options};
use nodes::{
    ExecutionContext, OperationDescriptor, OperationError, OperationHandler, OperationResult,
    ParameterSchema, ResourceDescriptor,
};
use serde_json::json;

use crate::support::comment_body;

pub fn resource() -> ResourceDescriptor {
    ResourceDescriptor::new("comment", "Comment", 100)
        .operation(
            OperationDescriptor::new("create", "Add Comment", CommentCreate)
                .order(10)
                .parameters(
                    [
                        vec![ParameterSchema::project_key()],
                        work_item_fields(),
                        content_fields(),
                        vec![common_options()],
                    ]
                    .concat(),
                ),
        )
        .operation(
            OperationDescriptor::new("query", "Query Comments", CommentQuery)
                .order(20)
                .parameters(
                    [
                        vec![ParameterSchema::string("project_key", "Project Key").required()],
                        work_item_fields(),
                        vec![
                            ParameterSchema::number("page_num", "Page Number", 1),
                            ParameterSchema::number("page_size", "Page Size", 10),
                            timeout_only_options(),
                        ],
                    ]
                    .concat(),
                ),
        )
        .operation(
            OperationDescriptor::new("update", "Update Comment", CommentUpdate)
                .order(30)
                .parameters(
                    [
                        vec![ParameterSchema::string("project_key", "Project Key").required()],
                        work_item_fields(),
                        vec![comment_id_field()],
                        content_fields(),
                        vec![common_options()],
                    ]
                    .concat(),
                ),
        )
        .operation(
            OperationDescriptor::new("delete", "Delete Comment", CommentDelete)
                .order(40)
                .parameters(
                    [
                        vec![ParameterSchema::string("project_key", "Project Key").required()],
                        work_item_fields(),
                        vec![comment_id_field(), common_options()],
                    ]
                    .concat(),
                ),
        )
}

fn work_item_fields() -> Vec<ParameterSchema> {
    vec![
        ParameterSchema::string("work_item_type_key", "Work Item Type Key").required(),
        ParameterSchema::string("work_item_id", "Work Item ID").required(),
    ]
}

fn comment_id_field() -> ParameterSchema {
    ParameterSchema::string("comment_id", "Comment ID").required()
}

fn content_fields() -> Vec<ParameterSchema> {
    vec![
        ParameterSchema::string("content", "Content (Plain Text)"),
        ParameterSchema::json("rich_text", "Content (Rich Text)", json!([]))
            .description("Takes precedence over the plain text content when not empty."),
    ]
}

/// `/open_api/{project}/work_item/{type}/{id}` for this item.
fn work_item_path(ctx: &ExecutionContext, item_index: usize) -> Result<String, OperationError> {
    let project_key = ctx.required_string("project_key", item_index)?;
    let type_key = ctx.required_string("work_item_type_key", item_index)?;
    let work_item_id = ctx.required_string("work_item_id", item_index)?;
    Ok(format!("/open_api/{project_key}/work_item/{type_key}/{work_item_id}"))
}

pub struct CommentCreate;

#[async_trait]
impl OperationHandler for CommentCreate {
    async fn call(&self, ctx: &ExecutionContext, item_index: usize) -> Result<OperationResult, OperationError> {
        let path = work_item_path(ctx, item_index)?;
        let options = RequestOptions::post(format!("{path}/comment/create"))
            .body(comment_body(ctx, item_index)?)
            .timeout_ms(ctx.timeout_ms(item_index)?);
        Ok(ctx.request(options).await?.into())
    }
}

pub struct CommentQuery;

#[async_trait]
impl OperationHandler for CommentQuery {
    async fn call(&self, ctx: &ExecutionContext, item_index: usize) -> Result<OperationResult, OperationError> {
        let path = work_item_path(ctx, item_index)?;
        let page_num = ctx.u64_or("page_num", item_index, 1)?;
        let page_size = ctx.u64_or("page_size", item_index, 10)?;

        let mut options = RequestOptions::get(format!("{path}/comments")).timeout_ms(ctx.timeout_ms(item_index)?);
        if page_num > 0 {
            options = options.query("page_num", page_num);
        }
        if page_size > 0 {
            options = options.query("page_size", page_size);
        }
        Ok(ctx.request(options).await?.into())
    }
}

pub struct CommentUpdate;

#[async_trait]
impl OperationHandler for CommentUpdate {
    async fn call(&self, ctx: &ExecutionContext, item_index: usize) -> Result<OperationResult, OperationError> {
        let path = work_item_path(ctx, item_index)?;
        let comment_id = ctx.required_string("comment_id", item_index)?;
        let options = RequestOptions::put(format!("{path}/comment/{comment_id}"))
            .body(comment_body(ctx, item_index)?)
            .timeout_ms(ctx.timeout_ms(item_index)?);
        Ok(ctx.request(options).await?.into())
    }
}

pub struct CommentDelete;

#[async_trait]
impl OperationHandler for CommentDelete {
    async fn call(&self, ctx: &ExecutionContext, item_index: usize) -> Result<OperationResult, OperationError> {
        let path = work_item_path(ctx, item_index)?;
        let comment_id = ctx.required_string("comment_id", item_index)?;
        let options = RequestOptions::delete(format!("{path}/comment/{comment_id}"))
            .timeout_ms(ctx.timeout_ms(item_index)?);
        Ok(ctx.request(options).await?.into())
    }
}
