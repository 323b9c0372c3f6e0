//! Work item attachments: upload, download, delete, plus space-level file upload.

use async_trait::async_trait;
use client::{FormData, RequestOptions, DEFAULT_MIME_TYPE};
use nodes::schema::timeout_only_options;
use nodes::{
    BinaryData, ExecutionContext, OperationDescriptor, OperationError, OperationHandler,
    OperationResult, ParameterSchema, ResourceDescriptor,
};
use serde_json::{json, Value};
use tracing::debug;

/// Input/output binary property used when none is configured.
pub const DEFAULT_BINARY_PROPERTY: &str = "data";

pub fn resource() -> ResourceDescriptor {
    ResourceDescriptor::new("attachment", "Attachment", 110)
        .operation(
            OperationDescriptor::new("upload", "Add Attachment", AttachmentUpload)
                .order(10)
                .parameters(
                    [
                        work_item_fields(),
                        vec![
                            binary_property_field(),
                            ParameterSchema::string("field_key", "Field Key")
                                .description("Target attachment field. Give this or field_alias."),
                            ParameterSchema::string("field_alias", "Field Alias")
                                .description("Target attachment field alias. Give this or field_key."),
                            ParameterSchema::string("index", "Array Index")
                                .description("Position inside a compound field."),
                            timeout_only_options(),
                        ],
                    ]
                    .concat(),
                ),
        )
        .operation(
            OperationDescriptor::new("file_upload", "Upload File", FileUpload)
                .order(20)
                .parameters(vec![
                    ParameterSchema::string("project_key", "Project Key").required(),
                    binary_property_field(),
                    timeout_only_options(),
                ]),
        )
        .operation(
            OperationDescriptor::new("download", "Download Attachment", AttachmentDownload)
                .order(30)
                .parameters(
                    [
                        work_item_fields(),
                        vec![
                            ParameterSchema::string("uuid", "Attachment ID").required(),
                            ParameterSchema::string("outputPropertyName", "Put Output File in Field")
                                .description("Binary property the file is written to."),
                            ParameterSchema::string("file_name", "File Name")
                                .description("Overrides the name sent by the server."),
                            ParameterSchema::string("mime_type", "MIME Type")
                                .description("Overrides the Content-Type sent by the server."),
                            timeout_only_options(),
                        ],
                    ]
                    .concat(),
                ),
        )
        .operation(
            OperationDescriptor::new("delete", "Delete Attachment", AttachmentDelete)
                .order(40)
                .parameters(vec![
                    ParameterSchema::string("project_key", "Project Key").required(),
                    ParameterSchema::string("work_item_id", "Work Item ID").required(),
                    ParameterSchema::multi("uuids", "Attachment UUIDs").required(),
                    ParameterSchema::string("field_key", "Field Key"),
                    ParameterSchema::string("field_alias", "Field Alias"),
                    timeout_only_options(),
                ]),
        )
}

fn work_item_fields() -> Vec<ParameterSchema> {
    vec![
        ParameterSchema::string("project_key", "Project Key").required(),
        ParameterSchema::string("work_item_type_key", "Work Item Type Key").required(),
        ParameterSchema::string("work_item_id", "Work Item ID").required(),
    ]
}

fn binary_property_field() -> ParameterSchema {
    let mut field = ParameterSchema::string("binaryPropertyName", "Input Binary Field")
        .required()
        .description("Binary property of the input item holding the file.");
    field.default = json!(DEFAULT_BINARY_PROPERTY);
    field
}

fn work_item_path(ctx: &ExecutionContext, item_index: usize) -> Result<String, OperationError> {
    let project_key = ctx.required_string("project_key", item_index)?;
    let type_key = ctx.required_string("work_item_type_key", item_index)?;
    let work_item_id = ctx.required_string("work_item_id", item_index)?;
    Ok(format!("/open_api/{project_key}/work_item/{type_key}/{work_item_id}"))
}

fn string_or(ctx: &ExecutionContext, name: &str, item_index: usize, default: &str) -> Result<String, OperationError> {
    let value = ctx.string_or_default(name, item_index)?;
    let value = value.trim();
    Ok(if value.is_empty() { default } else { value }.to_owned())
}

/// Multipart form carrying the item's binary property as `file`.
fn file_form(ctx: &ExecutionContext, item_index: usize) -> Result<FormData, OperationError> {
    let property = string_or(ctx, "binaryPropertyName", item_index, DEFAULT_BINARY_PROPERTY)?;
    let binary = ctx.binary(item_index, &property)?;
    let bytes = binary.bytes()?;
    debug!(item_index, property = %property, len = bytes.len(), "attaching binary data");

    Ok(FormData::file(
        binary.file_name.unwrap_or_else(|| "file".to_owned()),
        binary.mime_type.unwrap_or_else(|| DEFAULT_MIME_TYPE.to_owned()),
        bytes,
    ))
}

pub struct AttachmentUpload;

#[async_trait]
impl OperationHandler for AttachmentUpload {
    async fn call(&self, ctx: &ExecutionContext, item_index: usize) -> Result<OperationResult, OperationError> {
        let path = work_item_path(ctx, item_index)?;
        let mut form = file_form(ctx, item_index)?;

        // field_key wins when both are given.
        let field_key = ctx.string_or_default("field_key", item_index)?;
        let field_alias = ctx.string_or_default("field_alias", item_index)?;
        if !field_key.trim().is_empty() {
            form = form.text("field_key", field_key.trim());
        } else if !field_alias.trim().is_empty() {
            form = form.text("field_alias", field_alias.trim());
        }
        let index = ctx.string_or_default("index", item_index)?;
        if !index.trim().is_empty() {
            form = form.text("index", index.trim());
        }

        let options = RequestOptions::post(format!("{path}/file/upload"))
            .form(form)
            .timeout_ms(ctx.timeout_ms(item_index)?);
        Ok(ctx.request(options).await?.into())
    }
}

pub struct FileUpload;

#[async_trait]
impl OperationHandler for FileUpload {
    async fn call(&self, ctx: &ExecutionContext, item_index: usize) -> Result<OperationResult, OperationError> {
        let project_key = ctx.required_string("project_key", item_index)?;
        let options = RequestOptions::post(format!("/open_api/{project_key}/file/upload"))
            .form(file_form(ctx, item_index)?)
            .timeout_ms(ctx.timeout_ms(item_index)?);
        Ok(ctx.request(options).await?.into())
    }
}

pub struct AttachmentDownload;

#[async_trait]
impl OperationHandler for AttachmentDownload {
    async fn call(&self, ctx: &ExecutionContext, item_index: usize) -> Result<OperationResult, OperationError> {
        let path = work_item_path(ctx, item_index)?;
        let uuid = ctx.required_string("uuid", item_index)?;
        let property = string_or(ctx, "outputPropertyName", item_index, DEFAULT_BINARY_PROPERTY)?;

        let options = RequestOptions::post(format!("{path}/file/download"))
            .body(json!({ "uuid": uuid }))
            .timeout_ms(ctx.timeout_ms(item_index)?);
        let raw = ctx.request_raw(options).await?;

        // A JSON answer that passed the envelope check is returned as data.
        if raw.is_json() {
            let body: Value = serde_json::from_slice(&raw.body)
                .map_err(|e| OperationError::Client(client::ClientError::Json(e)))?;
            return Ok(body.into());
        }

        let file_name = Some(string_or(ctx, "file_name", item_index, "")?)
            .filter(|name| !name.is_empty())
            .or_else(|| raw.file_name())
            .unwrap_or_else(|| uuid.clone());
        let mime_type = Some(string_or(ctx, "mime_type", item_index, "")?)
            .filter(|mime| !mime.is_empty())
            .or_else(|| raw.mime_type());

        let binary = BinaryData::from_bytes(&raw.body, Some(file_name), mime_type);
        Ok(binary.into_item(&property).into())
    }
}

pub struct AttachmentDelete;

#[async_trait]
impl OperationHandler for AttachmentDelete {
    async fn call(&self, ctx: &ExecutionContext, item_index: usize) -> Result<OperationResult, OperationError> {
        let project_key = ctx.required_string("project_key", item_index)?;
        let work_item_id = ctx.required_string("work_item_id", item_index)?;
        let work_item_id: i64 = work_item_id
            .trim()
            .parse()
            .map_err(|_| OperationError::invalid("work_item_id", "expected a numeric id"))?;

        let uuids = ctx.string_list("uuids", item_index)?;
        if uuids.is_empty() {
            return Err(OperationError::Validation(
                "uuids cannot be empty, give at least one attachment UUID".into(),
            ));
        }

        let field_key = ctx.string_or_default("field_key", item_index)?;
        let field_alias = ctx.string_or_default("field_alias", item_index)?;
        let (field_key, field_alias) = (field_key.trim(), field_alias.trim());

        let mut body = json!({
            "work_item_id": work_item_id,
            "project_key": project_key,
            "uuids": uuids,
        });
        match (field_key.is_empty(), field_alias.is_empty()) {
            (false, false) => {
                return Err(OperationError::Validation(
                    "give either field_key or field_alias, not both".into(),
                ))
            }
            (true, true) => {
                return Err(OperationError::Validation(
                    "one of field_key or field_alias is required".into(),
                ))
            }
            (false, true) => body["field_key"] = json!(field_key),
            (true, false) => body["field_alias"] = json!(field_alias),
        }

        let options = RequestOptions::post("/open_api/file/delete")
            .body(body)
            .timeout_ms(ctx.timeout_ms(item_index)?);
        Ok(ctx.request(options).await?.into())
    }
}
