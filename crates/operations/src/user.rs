//! Tenant user lookups.

use async_trait::async_trait;
use client::RequestOptions;
use nodes::schema::common_options;
use nodes::{
    ExecutionContext, OperationDescriptor, OperationError, OperationHandler, OperationResult,
    ParameterSchema, ResourceDescriptor,
};
use serde_json::{json, Map, Value};

pub fn resource() -> ResourceDescriptor {
    ResourceDescriptor::new("user", "User", 120)
        .operation(
            OperationDescriptor::new("search", "Search Users", UserSearch)
                .order(1)
                .parameters(vec![
                    ParameterSchema::string("query", "Query"),
                    ParameterSchema::string("project_key", "Project Key")
                        .description("Limit the search to members of this space"),
                    common_options(),
                ]),
        )
        .operation(
            OperationDescriptor::new("query", "Get User Info", UserQuery)
                .order(4)
                .parameters(vec![
                    ParameterSchema::string("user_keys", "User Keys"),
                    ParameterSchema::string("out_ids", "Union IDs"),
                    ParameterSchema::string("emails", "Emails"),
                    ParameterSchema::string("tenant_key", "Tenant Key"),
                    common_options(),
                ]),
        )
}

pub struct UserSearch;

#[async_trait]
impl OperationHandler for UserSearch {
    async fn call(&self, ctx: &ExecutionContext, item_index: usize) -> Result<OperationResult, OperationError> {
        let mut body = Map::new();
        for key in ["query", "project_key"] {
            let value = ctx.string_or_default(key, item_index)?;
            if !value.trim().is_empty() {
                body.insert(key.into(), json!(value.trim()));
            }
        }

        let options = RequestOptions::post("/open_api/user/search")
            .body(Value::Object(body))
            .timeout_ms(ctx.timeout_ms(item_index)?);
        Ok(ctx.request(options).await?.into())
    }
}

pub struct UserQuery;

#[async_trait]
impl OperationHandler for UserQuery {
    async fn call(&self, ctx: &ExecutionContext, item_index: usize) -> Result<OperationResult, OperationError> {
        let mut body = Map::new();
        for key in ["user_keys", "out_ids", "emails"] {
            let values = ctx.string_list(key, item_index)?;
            if !values.is_empty() {
                body.insert(key.into(), json!(values));
            }
        }
        if body.is_empty() {
            return Err(OperationError::Validation(
                "at least one of user_keys, out_ids or emails is required".into(),
            ));
        }

        let tenant_key = ctx.string_or_default("tenant_key", item_index)?;
        if !tenant_key.trim().is_empty() {
            body.insert("tenant_key".into(), json!(tenant_key.trim()));
        }

        let options = RequestOptions::post("/open_api/user/query")
            .body(Value::Object(body))
            .timeout_ms(ctx.timeout_ms(item_index)?);
        Ok(ctx.request(options).await?.into())
    }
}
