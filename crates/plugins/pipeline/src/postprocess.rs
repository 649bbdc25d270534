//! Field post-processing.
//!
//! Projects structured tracker values onto plain strings so the final
//! document holds only primitives, arrays and shallow objects.

use jira_prompts_core::{Error, IssueRef, JiraUser, Result};
use serde_json::{json, Value};

use crate::document::{NormalizedDocument, RawDocument};

/// Value of `assignee` when nobody is assigned.
pub const UNASSIGNED: &str = "Unassigned";

/// Fields whose value is an object identified by `name`.
const NAMED_FIELDS: &[&str] = &["status", "priority", "issuetype", "resolution"];

/// Fields whose value is an array of objects identified by `name`.
const NAMED_LIST_FIELDS: &[&str] = &["components", "fixVersions", "versions"];

/// Rewrite structured values of an extracted document.
///
/// | Field                             | Result                       |
/// |-----------------------------------|------------------------------|
/// | status, priority, issuetype, resolution | `name`                 |
/// | assignee                          | display name or `"Unassigned"` |
/// | reporter                          | display name or null         |
/// | parent                            | `{key, summary, status}`     |
/// | components, fixVersions, versions | array of names               |
///
/// Everything else is kept as extracted.
pub fn postprocess(document: RawDocument) -> Result<NormalizedDocument> {
    let mut fields = document.into_fields();

    for (name, value) in fields.iter_mut() {
        let raw = value.take();
        *value = match name.as_str() {
            field if NAMED_FIELDS.contains(&field) => name_of(field, raw)?,
            field if NAMED_LIST_FIELDS.contains(&field) => names_of(field, raw)?,
            "assignee" => user_label("assignee", raw, Value::String(UNASSIGNED.into()))?,
            "reporter" => user_label("reporter", raw, Value::Null)?,
            "parent" => parent_summary(raw)?,
            _ => raw,
        };
    }

    Ok(NormalizedDocument::from_fields(fields))
}

fn name_of(field: &str, value: Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Object(ref obj) => match obj.get("name") {
            Some(Value::String(name)) => Ok(Value::String(name.clone())),
            _ => Err(Error::Schema(format!("Field '{}' has no name: {}", field, value))),
        },
        other => Err(Error::Schema(format!(
            "Field '{}' is not an object: {}",
            field, other
        ))),
    }
}

fn names_of(field: &str, value: Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Array(items) => items
            .into_iter()
            .map(|item| name_of(field, item))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        other => Err(Error::Schema(format!(
            "Field '{}' is not a list: {}",
            field, other
        ))),
    }
}

fn user_label(field: &str, value: Value, unset: Value) -> Result<Value> {
    if value.is_null() {
        return Ok(unset);
    }

    let user: JiraUser = serde_json::from_value(value)
        .map_err(|e| Error::Schema(format!("Field '{}' is not a user: {}", field, e)))?;
    user.label()
        .map(|label| Value::String(label.to_string()))
        .ok_or_else(|| Error::Schema(format!("User in field '{}' has no name", field)))
}

fn parent_summary(value: Value) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    let parent: IssueRef = serde_json::from_value(value)
        .map_err(|e| Error::Schema(format!("Field 'parent' is not an issue: {}", e)))?;
    Ok(json!({
        "key": &parent.key,
        "summary": parent.summary(),
        "status": parent.fields.status.as_ref().map(|s| s.name.as_str()),
    }))
}
