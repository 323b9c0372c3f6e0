//! Work item instances (detail, create, update) and single-space search.

use async_trait::async_trait;
use client::RequestOptions;
use nodes::schema::{
    common_options, common_options_with, limit, options_with, return_all, ParameterKind,
};
use nodes::{
    ExecutionContext, OperationDescriptor, OperationError, OperationHandler, OperationResult,
    ParameterSchema, ResourceDescriptor,
};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::support::{field_value_pairs, id_list, split_list, time_range};

/// Page size for every filter request.
pub const SEARCH_PAGE_SIZE: u64 = 50;
/// Hard stop for `returnAll`.
pub const MAX_SEARCH_PAGES: u64 = 1000;

pub fn instance_resource() -> ResourceDescriptor {
    ResourceDescriptor::new("work_item_instance", "Work Item Instance", 20)
        .operation(
            OperationDescriptor::new("query", "Get Work Item Details", WorkItemQuery)
                .order(10)
                .parameters(vec![
                    ParameterSchema::string("project_key", "Project Key").required(),
                    ParameterSchema::string("work_item_type_key", "Work Item Type Key").required(),
                    ParameterSchema::json(
                        "body",
                        "Request Body",
                        json!({
                            "work_item_ids": [],
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
        .operation(
            OperationDescriptor::new("create", "Create Work Item", WorkItemCreate)
                .order(20)
                .parameters(vec![
                    ParameterSchema::project_key(),
                    ParameterSchema::string("work_item_type_key", "Work Item Type Key").required(),
                    ParameterSchema::string("name", "Work Item Name"),
                    field_values("field_value_pairs", "Field Values"),
                    common_options_with(vec![
                        ParameterSchema::string("template_id", "Template ID").description(
                            "Workflow template; the type's first template is used when empty.",
                        ),
                        ParameterSchema::choice(
                            "required_mode",
                            "Required Mode",
                            &[("Skip required checks", "0"), ("Check create-page required fields", "1")],
                        ),
                    ]),
                ]),
        )
        .operation(
            OperationDescriptor::new("update", "Update Work Item", WorkItemUpdate)
                .order(30)
                .parameters(vec![
                    ParameterSchema::project_key(),
                    ParameterSchema::string("work_item_type_key", "Work Item Type Key").required(),
                    ParameterSchema::string("work_item_id", "Work Item ID").required(),
                    field_values("update_fields", "Update Fields"),
                    common_options(),
                ]),
        )
}

fn field_values(name: &str, display_name: &str) -> ParameterSchema {
    ParameterSchema::fixed_collection(
        name,
        display_name,
        ("fields", "Field"),
        vec![
            ParameterSchema::string("field_key", "Field Key").required(),
            ParameterSchema::string("field_value", "Field Value")
                .description("Any value; enter arrays and objects as JSON text."),
        ],
        json!({}),
    )
    .placeholder("Add Field")
}

pub fn search_resource() -> ResourceDescriptor {
    let date = |name: &str, label: &str| ParameterSchema::new(ParameterKind::DateTime, name, label, json!(""));

    ResourceDescriptor::new("work_item_instance_search", "Work Item Search", 30).operation(
        OperationDescriptor::new("single_space", "Search Work Items (Single Space)", SingleSpaceSearch)
            .order(1)
            .parameters(vec![
                ParameterSchema::project_key(),
                ParameterSchema::multi("work_item_type_keys", "Work Item Type Keys").required(),
                return_all(),
                limit(),
                ParameterSchema::string("work_item_name", "Work Item Name"),
                ParameterSchema::string("user_keys", "User Keys").description("Comma-separated user keys"),
                ParameterSchema::string("work_item_ids", "Work Item IDs").description("Comma-separated work item IDs"),
                options_with(vec![
                    date("created_at_start", "Created At Start"),
                    date("created_at_end", "Created At End"),
                    date("updated_at_start", "Updated At Start"),
                    date("updated_at_end", "Updated At End"),
                    ParameterSchema::string("sub_stages", "Sub Stages"),
                    ParameterSchema::json("work_item_status", "Work Item Status", json!([])),
                    ParameterSchema::string("businesses", "Businesses"),
                    ParameterSchema::string("priorities", "Priorities"),
                    ParameterSchema::string("tags", "Tags"),
                    ParameterSchema::string("search_id", "Search ID"),
                    ParameterSchema::boolean("need_workflow", "Need Workflow", false),
                    ParameterSchema::boolean("need_multi_text", "Need Multi Text", false),
                    ParameterSchema::boolean("relation_fields_detail", "Relation Fields Detail", false),
                ]),
            ]),
    )
}

pub struct WorkItemQuery;

#[async_trait]
impl OperationHandler for WorkItemQuery {
    async fn call(&self, ctx: &ExecutionContext, item_index: usize) -> Result<OperationResult, OperationError> {
        let project_key = ctx.required_string("project_key", item_index)?;
        let type_key = ctx.required_string("work_item_type_key", item_index)?;
        let body = ctx.json("body", item_index, "Request Body")?;

        let mut options = RequestOptions::post(format!("/open_api/{project_key}/work_item/{type_key}/query"))
            .timeout_ms(ctx.timeout_ms(item_index)?);
        if !body.is_null() {
            options = options.body(body);
        }
        Ok(ctx.request(options).await?.into())
    }
}

pub struct WorkItemCreate;

#[async_trait]
impl OperationHandler for WorkItemCreate {
    async fn call(&self, ctx: &ExecutionContext, item_index: usize) -> Result<OperationResult, OperationError> {
        let project_key = ctx.required_string("project_key", item_index)?;
        let type_key = ctx.required_string("work_item_type_key", item_index)?;

        let mut body = Map::new();
        body.insert("work_item_type_key".into(), json!(type_key));
        body.insert(
            "field_value_pairs".into(),
            json!(field_value_pairs(ctx, "field_value_pairs", item_index)?),
        );

        let name = ctx.string_or_default("name", item_index)?;
        if !name.is_empty() {
            body.insert("name".into(), json!(name));
        }

        let options = match ctx.parameter("options", item_index) {
            Some(Value::Object(options)) => options,
            _ => Map::new(),
        };
        if let Some(template_id) = options.get("template_id").and_then(parse_template_id) {
            body.insert("template_id".into(), template_id);
        }
        let required_mode = options.get("required_mode").and_then(parse_required_mode).unwrap_or(0);
        if required_mode != 0 {
            body.insert("required_mode".into(), json!(required_mode));
        }

        let body = Value::Object(body);
        let options = RequestOptions::post(format!("/open_api/{project_key}/work_item/create"))
            .body(body.clone())
            .timeout_ms(ctx.timeout_ms(item_index)?);
        let work_item_id = ctx.request(options).await?;
        Ok(json!({ "body": body, "work_item_id": work_item_id }).into())
    }
}

fn parse_template_id(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) => Some(Value::Number(n.clone())),
        Value::String(s) if !s.trim().is_empty() => {
            let text = s.trim();
            Some(text.parse::<i64>().map(Value::from).unwrap_or_else(|_| json!(text)))
        }
        _ => None,
    }
}

fn parse_required_mode(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub struct WorkItemUpdate;

#[async_trait]
impl OperationHandler for WorkItemUpdate {
    async fn call(&self, ctx: &ExecutionContext, item_index: usize) -> Result<OperationResult, OperationError> {
        let project_key = ctx.required_string("project_key", item_index)?;
        let type_key = ctx.required_string("work_item_type_key", item_index)?;
        let work_item_id = ctx.required_string("work_item_id", item_index)?;
        let update_fields = field_value_pairs(ctx, "update_fields", item_index)?;

        let options = RequestOptions::put(format!("/open_api/{project_key}/work_item/{type_key}/{work_item_id}"))
            .body(json!({ "update_fields": update_fields }))
            .timeout_ms(ctx.timeout_ms(item_index)?);
        ctx.request(options).await?;
        Ok(json!({ "update_fields": update_fields }).into())
    }
}

// ---------------------------------------------------------------------------
// Single-space search
// ---------------------------------------------------------------------------

pub struct SingleSpaceSearch;

#[async_trait]
impl OperationHandler for SingleSpaceSearch {
    async fn call(&self, ctx: &ExecutionContext, item_index: usize) -> Result<OperationResult, OperationError> {
        let project_key = ctx.required_string("project_key", item_index)?;
        let search = FilterRequest {
            url: format!("/open_api/{project_key}/work_item/filter"),
            body: filter_body(ctx, item_index)?,
            timeout: ctx.timeout_ms(item_index)?,
        };

        if ctx.bool_or("returnAll", item_index, false)? {
            let all = search.fetch_all(ctx).await?;
            return Ok(Value::Array(all).into());
        }

        let limit = ctx.u64_or("limit", item_index, SEARCH_PAGE_SIZE)?.max(1);
        let mut page = search.fetch_page(ctx, 1, limit.min(SEARCH_PAGE_SIZE)).await?;
        page.items.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(Value::Array(page.items).into())
    }
}

struct FilterRequest {
    url: String,
    body: Map<String, Value>,
    timeout: Option<u64>,
}

struct Page {
    items: Vec<Value>,
    total: u64,
}

impl FilterRequest {
    async fn fetch_page(&self, ctx: &ExecutionContext, page_num: u64, page_size: u64) -> Result<Page, OperationError> {
        let mut body = self.body.clone();
        body.insert("page_num".into(), json!(page_num));
        body.insert("page_size".into(), json!(page_size));

        let options = RequestOptions::post(self.url.clone())
            .body(Value::Object(body))
            .timeout_ms(self.timeout);
        let response = ctx.request(options).await?;

        Ok(match response {
            Value::Array(items) => Page { items, total: 0 },
            envelope => Page {
                total: envelope
                    .pointer("/pagination/total")
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
                items: match envelope.get("data") {
                    Some(Value::Array(items)) => items.clone(),
                    _ => Vec::new(),
                },
            },
        })
    }

    /// Walk pages until `total` is reached, a page comes back empty, or the
    /// page cap is hit.
    async fn fetch_all(&self, ctx: &ExecutionContext) -> Result<Vec<Value>, OperationError> {
        let mut all = Vec::new();
        let mut page_num = 1;

        loop {
            let page = self.fetch_page(ctx, page_num, SEARCH_PAGE_SIZE).await?;
            let fetched = page.items.len();
            all.extend(page.items);
            debug!(page_num, fetched, total = page.total, "fetched work item page");

            if all.len() as u64 >= page.total || fetched == 0 || page_num >= MAX_SEARCH_PAGES {
                if page_num >= MAX_SEARCH_PAGES {
                    warn!("reached the {MAX_SEARCH_PAGES} page limit, stopping");
                }
                return Ok(all);
            }
            page_num += 1;
        }
    }
}

fn filter_body(ctx: &ExecutionContext, item_index: usize) -> Result<Map<String, Value>, OperationError> {
    let mut body = Map::new();

    let type_keys = ctx.string_list("work_item_type_keys", item_index)?;
    if !type_keys.is_empty() {
        body.insert("work_item_type_keys".into(), json!(type_keys));
    }
    let name = ctx.string_or_default("work_item_name", item_index)?;
    if !name.is_empty() {
        body.insert("work_item_name".into(), json!(name));
    }
    let user_keys = ctx.string_list("user_keys", item_index)?;
    if !user_keys.is_empty() {
        body.insert("user_keys".into(), json!(user_keys));
    }
    let ids = id_list(ctx, "work_item_ids", item_index)?;
    if !ids.is_empty() {
        body.insert("work_item_ids".into(), json!(ids));
    }

    let options = match ctx.parameter("options", item_index) {
        Some(Value::Object(options)) => options,
        _ => Map::new(),
    };

    if let Some(range) = time_range(&options, "created_at_start", "created_at_end") {
        body.insert("created_at".into(), range);
    }
    if let Some(range) = time_range(&options, "updated_at_start", "updated_at_end") {
        body.insert("updated_at".into(), range);
    }
    for key in ["sub_stages", "businesses", "priorities", "tags"] {
        let values = options.get(key).map(split_list).unwrap_or_default();
        if !values.is_empty() {
            body.insert(key.into(), json!(values));
        }
    }
    match options.get("work_item_status") {
        Some(Value::String(text)) if !text.trim().is_empty() => {
            let status: Value = serde_json::from_str(text).map_err(|e| OperationError::InvalidJson {
                label: "Work Item Status".into(),
                message: e.to_string(),
            })?;
            body.insert("work_item_status".into(), status);
        }
        Some(status @ Value::Array(_)) => {
            body.insert("work_item_status".into(), status.clone());
        }
        _ => {}
    }
    if let Some(search_id) = options.get("search_id").and_then(Value::as_str).filter(|s| !s.is_empty()) {
        body.insert("search_id".into(), json!(search_id));
    }

    let expand: Map<String, Value> = ["need_workflow", "need_multi_text", "relation_fields_detail"]
        .into_iter()
        .filter(|flag| options.get(*flag).and_then(Value::as_bool).unwrap_or(false))
        .map(|flag| (flag.to_owned(), Value::Bool(true)))
        .collect();
    if !expand.is_empty() {
        body.insert("expand".into(), Value::Object(expand));
    }

    Ok(body)
}
