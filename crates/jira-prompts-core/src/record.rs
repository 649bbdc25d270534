//! Issue record model.
//!
//! An [`IssueRecord`] keeps the tracker's raw field map untouched so that
//! field selection can ask "does this record have this attribute" without a
//! fixed schema. Structured sub-objects (comments, links, subtasks) are read
//! through typed views that report drift in the remote schema as
//! [`Error::Schema`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// =============================================================================
// Issue record
// =============================================================================

/// Raw issue as returned by the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    /// Issue ID
    #[serde(default)]
    pub id: String,
    /// Issue key (e.g., "PROJ-123")
    pub key: String,
    /// Raw field map, including fields whose value is null
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl IssueRecord {
    /// Create a record from a key and a raw field map.
    pub fn new(key: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: String::new(),
            key: key.into(),
            fields,
        }
    }

    /// Whether the record exposes the attribute at all (a null value counts).
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Raw value of a field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Issue summary, if present and textual.
    pub fn summary(&self) -> Option<&str> {
        self.field("summary").and_then(Value::as_str)
    }

    /// Name of the issue type (e.g., "Epic", "Story").
    pub fn issue_type_name(&self) -> Option<&str> {
        self.field("issuetype")
            .and_then(|t| t.get("name"))
            .and_then(Value::as_str)
    }

    /// Name of the current status.
    pub fn status_name(&self) -> Option<&str> {
        self.field("status")
            .and_then(|s| s.get("name"))
            .and_then(Value::as_str)
    }

    /// Comment thread in source order. A record without a comment field has
    /// no comments.
    pub fn comments(&self) -> Result<Vec<JiraComment>> {
        Ok(self
            .typed_field::<CommentPage>("comment")?
            .map(|page| page.comments)
            .unwrap_or_default())
    }

    /// Issue links in source order.
    pub fn issue_links(&self) -> Result<Vec<JiraIssueLink>> {
        Ok(self.typed_field("issuelinks")?.unwrap_or_default())
    }

    /// Subtasks in source order.
    pub fn subtasks(&self) -> Result<Vec<IssueRef>> {
        Ok(self.typed_field("subtasks")?.unwrap_or_default())
    }

    /// Deserialize a field into a typed view. Absent and null fields are `None`.
    fn typed_field<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.fields.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| {
                    Error::Schema(format!(
                        "Unexpected shape of field '{}' on {}: {}",
                        name, self.key, e
                    ))
                }),
        }
    }
}

// =============================================================================
// Typed views
// =============================================================================

/// Jira user representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JiraUser {
    /// Account ID (Cloud only)
    #[serde(default, rename = "accountId")]
    pub account_id: Option<String>,
    /// Username (Server/Data Center only)
    #[serde(default)]
    pub name: Option<String>,
    /// Display name
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
    /// Email address
    #[serde(default, rename = "emailAddress")]
    pub email_address: Option<String>,
}

impl JiraUser {
    /// Best human-readable label: display name, then username, then account ID.
    pub fn label(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .or(self.name.as_deref())
            .or(self.account_id.as_deref())
    }
}

/// Any object identified by its `name` (status, priority, issue type, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Named {
    pub name: String,
}

/// Reference to another issue as embedded in links, subtasks, parents and
/// search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRef {
    pub key: String,
    #[serde(default)]
    pub fields: IssueRefFields,
}

/// Subset of fields carried by an embedded issue reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueRefFields {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub status: Option<Named>,
    #[serde(default)]
    pub issuetype: Option<Named>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

impl IssueRef {
    /// Status name, required on every embedded reference.
    pub fn status_name(&self) -> Result<&str> {
        self.fields
            .status
            .as_ref()
            .map(|s| s.name.as_str())
            .ok_or_else(|| Error::Schema(format!("Issue {} has no status", self.key)))
    }

    /// Issue type name, required on every embedded reference.
    pub fn type_name(&self) -> Result<&str> {
        self.fields
            .issuetype
            .as_ref()
            .map(|t| t.name.as_str())
            .ok_or_else(|| Error::Schema(format!("Issue {} has no issue type", self.key)))
    }

    /// Summary, empty when the tracker omits it.
    pub fn summary(&self) -> &str {
        self.fields.summary.as_deref().unwrap_or_default()
    }
}

impl TryFrom<IssueRecord> for IssueRef {
    type Error = Error;

    fn try_from(record: IssueRecord) -> Result<Self> {
        let fields = serde_json::from_value(Value::Object(record.fields))
            .map_err(|e| Error::Schema(format!("Issue {} has malformed fields: {}", record.key, e)))?;
        Ok(Self {
            key: record.key,
            fields,
        })
    }
}

/// Jira comment representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JiraComment {
    /// Comment ID
    pub id: String,
    /// Comment author
    #[serde(default)]
    pub author: Option<JiraUser>,
    /// Comment body: wiki markup (v2) or ADF document (v3)
    #[serde(default)]
    pub body: Option<Value>,
    /// Created timestamp
    #[serde(default)]
    pub created: Option<String>,
    /// Updated timestamp
    #[serde(default)]
    pub updated: Option<String>,
}

/// The `comment` field of an issue.
#[derive(Debug, Clone, Deserialize)]
struct CommentPage {
    #[serde(default)]
    comments: Vec<JiraComment>,
}

/// Link type with its two relationship labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JiraLinkType {
    #[serde(default)]
    pub name: Option<String>,
    /// Label seen from the inward issue (e.g., "is blocked by")
    pub inward: String,
    /// Label seen from the outward issue (e.g., "blocks")
    pub outward: String,
}

/// Directional link between two issues. Exactly one side is expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JiraIssueLink {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub link_type: JiraLinkType,
    #[serde(default, rename = "inwardIssue")]
    pub inward_issue: Option<IssueRef>,
    #[serde(default, rename = "outwardIssue")]
    pub outward_issue: Option<IssueRef>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(fields: Value) -> IssueRecord {
        serde_json::from_value(json!({"id": "1", "key": "PROJ-1", "fields": fields})).unwrap()
    }

    #[test]
    fn test_has_field_counts_null_values() {
        let issue = record(json!({"summary": "x", "assignee": null}));
        assert!(issue.has_field("summary"));
        assert!(issue.has_field("assignee"));
        assert!(!issue.has_field("parent"));
    }

    #[test]
    fn test_accessors() {
        let issue = record(json!({
            "summary": "Epic work",
            "issuetype": {"name": "Epic"},
            "status": {"name": "Open"}
        }));
        assert_eq!(issue.summary(), Some("Epic work"));
        assert_eq!(issue.issue_type_name(), Some("Epic"));
        assert_eq!(issue.status_name(), Some("Open"));
    }

    #[test]
    fn test_missing_collections_are_empty() {
        let issue = record(json!({"summary": "x", "comment": null}));
        assert!(issue.comments().unwrap().is_empty());
        assert!(issue.issue_links().unwrap().is_empty());
        assert!(issue.subtasks().unwrap().is_empty());
    }

    #[test]
    fn test_comments_parsed() {
        let issue = record(json!({
            "comment": {
                "comments": [{
                    "id": "10",
                    "author": {"displayName": "Jane"},
                    "body": "hello",
                    "created": "2024-01-01T10:00:00.000+0000"
                }],
                "total": 1
            }
        }));
        let comments = issue.comments().unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id, "10");
        assert_eq!(
            comments[0].author.as_ref().and_then(|a| a.label()),
            Some("Jane")
        );
    }

    #[test]
    fn test_malformed_links_are_schema_errors() {
        let issue = record(json!({"issuelinks": [{"inwardIssue": {"key": "X-1"}}]}));
        assert!(matches!(issue.issue_links(), Err(Error::Schema(_))));
    }

    #[test]
    fn test_issue_ref_requires_status_and_type() {
        let reference: IssueRef = serde_json::from_value(json!({
            "key": "PROJ-2",
            "fields": {"summary": "Child"}
        }))
        .unwrap();
        assert_eq!(reference.summary(), "Child");
        assert!(matches!(reference.status_name(), Err(Error::Schema(_))));
        assert!(matches!(reference.type_name(), Err(Error::Schema(_))));
    }

    #[test]
    fn test_issue_ref_from_record() {
        let reference = IssueRef::try_from(record(json!({
            "summary": "Child",
            "status": {"name": "Open"},
            "issuetype": {"name": "Story"},
            "created": "2024-01-01T10:00:00.000+0000",
            "labels": ["extra"]
        })))
        .unwrap();
        assert_eq!(reference.key, "PROJ-1");
        assert_eq!(reference.status_name().unwrap(), "Open");
        assert_eq!(reference.fields.created.as_deref(), Some("2024-01-01T10:00:00.000+0000"));
    }

    #[test]
    fn test_issue_ref_from_drifted_record() {
        let numeric_created = IssueRef::try_from(record(json!({"created": 1704103200})));
        match numeric_created {
            Err(Error::Schema(message)) => assert!(message.contains("PROJ-1")),
            other => panic!("Expected Schema, got {:?}", other),
        }

        let nameless_status = IssueRef::try_from(record(json!({"status": {"id": "3"}})));
        assert!(matches!(nameless_status, Err(Error::Schema(_))));
    }

    #[test]
    fn test_user_label_fallbacks() {
        let user = JiraUser {
            account_id: Some("abc".into()),
            name: None,
            display_name: None,
            email_address: None,
        };
        assert_eq!(user.label(), Some("abc"));
    }
}
