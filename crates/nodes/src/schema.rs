//! UI parameter schema carried by every operation descriptor.
//!
//! The schema only has to exist and serialize for the host UI; nothing at
//! call time reads it.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterKind {
    String,
    Number,
    Boolean,
    Options,
    MultiOptions,
    Json,
    DateTime,
    Collection,
    FixedCollection,
    ResourceLocator,
}

/// Visibility rule: show the field only when every listed parameter has one
/// of the listed values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplayOptions {
    pub show: BTreeMap<String, Vec<Value>>,
}

/// Entries that can appear in a field's `options` list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParameterOption {
    /// A choice of an `options` / `multiOptions` field.
    Choice { name: String, value: Value },
    /// A named group of a `fixedCollection`.
    Group {
        #[serde(rename = "displayName")]
        display_name: String,
        name: String,
        values: Vec<ParameterSchema>,
    },
    /// A nested field of a `collection`.
    Field(ParameterSchema),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSchema {
    pub display_name: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    pub default: Value,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ParameterOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_options: Option<DisplayOptions>,
}

impl ParameterSchema {
    pub fn new(kind: ParameterKind, name: &str, display_name: &str, default: Value) -> Self {
        Self {
            display_name: display_name.to_owned(),
            name: name.to_owned(),
            kind,
            default,
            required: false,
            description: None,
            placeholder: None,
            options: Vec::new(),
            display_options: None,
        }
    }

    pub fn string(name: &str, display_name: &str) -> Self {
        Self::new(ParameterKind::String, name, display_name, json!(""))
    }

    pub fn number(name: &str, display_name: &str, default: u64) -> Self {
        Self::new(ParameterKind::Number, name, display_name, json!(default))
    }

    pub fn boolean(name: &str, display_name: &str, default: bool) -> Self {
        Self::new(ParameterKind::Boolean, name, display_name, json!(default))
    }

    pub fn json(name: &str, display_name: &str, default: Value) -> Self {
        let text = serde_json::to_string_pretty(&default).unwrap_or_default();
        Self::new(ParameterKind::Json, name, display_name, Value::String(text))
    }

    /// A single-choice field; the first choice is the default.
    pub fn choice(name: &str, display_name: &str, choices: &[(&str, &str)]) -> Self {
        let default = choices.first().map(|(_, v)| json!(v)).unwrap_or(json!(""));
        let mut schema = Self::new(ParameterKind::Options, name, display_name, default);
        schema.options = choices
            .iter()
            .map(|(label, value)| ParameterOption::Choice {
                name: (*label).to_owned(),
                value: json!(value),
            })
            .collect();
        schema
    }

    /// A field accepting a list of ids (array or comma separated text).
    pub fn multi(name: &str, display_name: &str) -> Self {
        Self::new(ParameterKind::MultiOptions, name, display_name, json!([]))
    }

    /// Project picker: pick from the space list or type a `project_key`.
    pub fn project_key() -> Self {
        Self::new(
            ParameterKind::ResourceLocator,
            "project_key",
            "Space",
            json!({ "mode": "id", "value": "" }),
        )
        .required()
        .description("Feishu Project space; pick from the list or enter a project_key.")
    }

    /// A `fixedCollection` with one repeatable group of `values`.
    pub fn fixed_collection(
        name: &str,
        display_name: &str,
        group: (&str, &str),
        values: Vec<ParameterSchema>,
        default: Value,
    ) -> Self {
        let mut schema = Self::new(ParameterKind::FixedCollection, name, display_name, default);
        schema.options = vec![ParameterOption::Group {
            display_name: group.1.to_owned(),
            name: group.0.to_owned(),
            values,
        }];
        schema
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_owned());
        self
    }

    pub fn placeholder(mut self, text: &str) -> Self {
        self.placeholder = Some(text.to_owned());
        self
    }

    /// Add a visibility condition, keeping the ones already present.
    pub fn show_when(mut self, parameter: &str, values: &[&str]) -> Self {
        let display = self.display_options.get_or_insert_with(DisplayOptions::default);
        display
            .show
            .entry(parameter.to_owned())
            .or_default()
            .extend(values.iter().map(|v| json!(v)));
        self
    }

    pub fn show_when_bool(mut self, parameter: &str, value: bool) -> Self {
        let display = self.display_options.get_or_insert_with(DisplayOptions::default);
        display.show.entry(parameter.to_owned()).or_default().push(json!(value));
        self
    }
}

// ---------------------------------------------------------------------------
// Shared options
// ---------------------------------------------------------------------------

/// `batching`: adding it switches the node to batched concurrent execution.
pub fn batching_option() -> ParameterSchema {
    ParameterSchema::fixed_collection(
        "batching",
        "Batching",
        ("batch", "Batching"),
        vec![
            ParameterSchema::number("batchSize", "Items per Batch", 50)
                .description("Requests sent concurrently per batch. Adding this option enables concurrent mode; 0 is treated as 1."),
            ParameterSchema::number("batchInterval", "Batch Interval (ms)", 1000)
                .description("Time to wait between batches, in milliseconds. 0 disables the pause."),
        ],
        json!({ "batch": {} }),
    )
    .placeholder("Add Batching")
}

pub fn timeout_option() -> ParameterSchema {
    ParameterSchema::number("timeout", "Timeout", 0).description(
        "Time in milliseconds to wait for the response headers before aborting. 0 means no timeout.",
    )
}

fn options_collection(fields: Vec<ParameterSchema>) -> ParameterSchema {
    let mut schema = ParameterSchema::new(ParameterKind::Collection, "options", "Options", json!({}))
        .placeholder("Add option");
    schema.options = fields.into_iter().map(ParameterOption::Field).collect();
    schema
}

/// Batching + timeout; used by non-paginated operations.
pub fn common_options() -> ParameterSchema {
    options_collection(vec![batching_option(), timeout_option()])
}

/// Timeout only; paginated operations fetch pages themselves and do not batch.
pub fn timeout_only_options() -> ParameterSchema {
    options_collection(vec![timeout_option()])
}

/// `options` collection with operation-specific fields followed by the timeout.
pub fn options_with(mut fields: Vec<ParameterSchema>) -> ParameterSchema {
    fields.push(timeout_option());
    options_collection(fields)
}

/// `options` collection with operation-specific fields, batching and the timeout.
pub fn common_options_with(mut fields: Vec<ParameterSchema>) -> ParameterSchema {
    fields.extend([batching_option(), timeout_option()]);
    options_collection(fields)
}

pub fn return_all() -> ParameterSchema {
    ParameterSchema::boolean("returnAll", "Return All", false)
        .description("Whether to return all results or only up to a given limit")
}

pub fn limit() -> ParameterSchema {
    ParameterSchema::number("limit", "Limit", 50)
        .description("Max number of results to return")
        .show_when_bool("returnAll", false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_defaults_to_first_value() {
        let schema = ParameterSchema::choice("order", "Order", &[("None", ""), ("Last visited", "last_visited")]);
        assert_eq!(schema.default, json!(""));
        assert_eq!(schema.options.len(), 2);
    }

    #[test]
    fn show_conditions_accumulate() {
        let schema = ParameterSchema::string("x", "X")
            .show_when("resource", &["space"])
            .show_when("operation", &["list"]);
        let show = schema.display_options.unwrap().show;
        assert_eq!(show["resource"], vec![json!("space")]);
        assert_eq!(show["operation"], vec![json!("list")]);
    }

    #[test]
    fn extra_options_come_before_batching() {
        let schema = common_options_with(vec![ParameterSchema::string("template_id", "Template ID")]);
        let names: Vec<&str> = schema
            .options
            .iter()
            .map(|o| match o {
                ParameterOption::Field(field) => field.name.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(names, vec!["template_id", "batching", "timeout"]);
    }

    #[test]
    fn common_options_serialize_in_host_shape() {
        let out = serde_json::to_value(common_options()).unwrap();
        assert_eq!(out["type"], "collection");
        assert_eq!(out["options"][0]["name"], "batching");
        assert_eq!(out["options"][0]["options"][0]["values"][0]["name"], "batchSize");
        assert_eq!(out["options"][1]["name"], "timeout");
        assert!(out.get("required").is_none());
    }
}
