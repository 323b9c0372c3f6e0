//! Parameter helpers shared by several operations.

use chrono::{DateTime, NaiveDateTime};
use nodes::{ExecutionContext, OperationError};
use serde_json::{json, Map, Value};

/// `user_key` for this item, falling back to the credential's user.
pub(crate) fn user_key_or_default(
    ctx: &ExecutionContext,
    item_index: usize,
) -> Result<String, OperationError> {
    let user_key = ctx.string_or_default("user_key", item_index)?;
    if user_key.trim().is_empty() {
        return Ok(ctx.client()?.user_key().to_owned());
    }
    Ok(user_key.trim().to_owned())
}

/// Body for comment create/update: `rich_text` wins over `content`, and one
/// of them must carry something.
pub(crate) fn comment_body(ctx: &ExecutionContext, item_index: usize) -> Result<Value, OperationError> {
    let rich_text = ctx.json("rich_text", item_index, "Rich text comment")?;
    let mut body = Map::new();

    if has_content(&rich_text) {
        body.insert("rich_text".into(), rich_text);
    } else {
        let content = ctx.string_or_default("content", item_index)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(OperationError::Validation(
                "content and rich_text cannot both be empty".into(),
            ));
        }
        body.insert("content".into(), Value::String(content.to_owned()));
    }

    Ok(Value::Object(body))
}

/// Field/value pairs from a `fields` collection (`{ "fields": [...] }`, or the
/// bare list). Text values shaped like a JSON array or object are parsed;
/// text that does not parse is sent unchanged.
pub(crate) fn field_value_pairs(
    ctx: &ExecutionContext,
    name: &str,
    item_index: usize,
) -> Result<Vec<Value>, OperationError> {
    let collection = ctx.json(name, item_index, name)?;
    let entries = match collection {
        Value::Null => return Ok(Vec::new()),
        Value::Object(mut map) => match map.remove("fields") {
            Some(Value::Array(entries)) => entries,
            None | Some(Value::Null) => Vec::new(),
            Some(_) => return Err(OperationError::invalid(name, "fields must be a list")),
        },
        Value::Array(entries) => entries,
        _ => return Err(OperationError::invalid(name, "expected a list of fields")),
    };

    entries
        .into_iter()
        .map(|entry| {
            let field_key = entry
                .get("field_key")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .ok_or_else(|| OperationError::invalid(name, "every field needs a field_key"))?;
            let field_value = entry.get("field_value").cloned().map(parse_field_value).unwrap_or(Value::Null);
            Ok(json!({ "field_key": field_key, "field_value": field_value }))
        })
        .collect()
}

fn parse_field_value(value: Value) -> Value {
    let Value::String(text) = &value else {
        return value;
    };
    let trimmed = text.trim();
    let structured = (trimmed.starts_with('[') && trimmed.ends_with(']'))
        || (trimmed.starts_with('{') && trimmed.ends_with('}'));
    if structured {
        if let Ok(parsed) = serde_json::from_str(trimmed) {
            return parsed;
        }
    }
    value
}

fn has_content(value: &Value) -> bool {
    match value {
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => false,
    }
}

/// Comma-separated text or an array, as a list of trimmed non-empty strings.
pub(crate) fn split_list(value: &Value) -> Vec<String> {
    let entries: Vec<String> = match value {
        Value::String(text) => text.split(',').map(str::to_owned).collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Numeric ids from a list parameter; entries that are not integers are dropped.
pub(crate) fn id_list(ctx: &ExecutionContext, name: &str, item_index: usize) -> Result<Vec<i64>, OperationError> {
    Ok(ctx
        .string_list(name, item_index)?
        .iter()
        .filter_map(|id| id.parse().ok())
        .collect())
}

/// Milliseconds since the epoch for a date-time option.
///
/// Accepts a number, a digit string, RFC 3339 text or a naive
/// `YYYY-MM-DDTHH:MM:SS` value (read as UTC). Anything else is `None`.
pub(crate) fn to_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                None
            } else if text.bytes().all(|b| b.is_ascii_digit()) {
                text.parse().ok()
            } else if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                Some(dt.timestamp_millis())
            } else {
                NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
                    .ok()
                    .map(|dt| dt.and_utc().timestamp_millis())
            }
        }
        _ => None,
    }
}

/// `{start, end}` range from two date-time options; `None` when neither parses.
pub(crate) fn time_range(options: &Map<String, Value>, start: &str, end: &str) -> Option<Value> {
    let mut range = Map::new();
    if let Some(ts) = options.get(start).and_then(to_timestamp) {
        range.insert("start".into(), ts.into());
    }
    if let Some(ts) = options.get(end).and_then(to_timestamp) {
        range.insert("end".into(), ts.into());
    }
    (!range.is_empty()).then_some(Value::Object(range))
}
