//! Turning handler outcomes into output records.

use nodes::{OperationError, OutputRecord};
use serde_json::{json, Map, Value};

/// Records for one successful payload: an array yields one record per
/// element, anything else a single record.
pub fn success_records(payload: Value, item_index: usize) -> Vec<OutputRecord> {
    match payload {
        Value::Array(values) => values
            .into_iter()
            .map(|value| OutputRecord::for_item(wrap(value), item_index))
            .collect(),
        other => vec![OutputRecord::for_item(wrap(other), item_index)],
    }
}

/// Record emitted in place of a failed item when continue-on-failure is on.
///
/// `error` holds the API troubleshooting hint when there is one, the error
/// message otherwise.
pub fn error_record(err: &OperationError, item_index: usize) -> OutputRecord {
    let mut body = Map::new();
    let error = match err.description() {
        Some(description) => description.to_owned(),
        None => err.to_string(),
    };
    body.insert("error".to_owned(), json!(error));
    if let Some(details) = err.details() {
        body.insert("details".to_owned(), details.clone());
    }
    OutputRecord::for_item(Value::Object(body), item_index)
}

// Record payloads are always objects; scalars are boxed under `data`.
fn wrap(value: Value) -> Value {
    match value {
        Value::Object(_) => value,
        other => json!({ "data": other }),
    }
}
