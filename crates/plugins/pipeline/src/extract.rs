//! Field extraction.

use jira_prompts_core::{Error, FieldSet, IssueRecord, IssueTracker, Result};
use tracing::debug;

use crate::document::RawDocument;
use crate::markup;

/// Fetch an issue and project the requested fields.
///
/// Returns the projected document together with the fetched record, which
/// later stages (collectors) read from.
pub async fn extract(
    tracker: &dyn IssueTracker,
    issue_key: &str,
    fields: &FieldSet,
) -> Result<(RawDocument, IssueRecord)> {
    let issue_key = issue_key.trim();
    if issue_key.is_empty() {
        return Err(Error::Validation("Issue key must not be empty".into()));
    }

    let issue = tracker.fetch_issue(issue_key).await?;
    let document = project(&issue, fields);
    debug!(
        issue = %issue.key,
        requested = fields.len(),
        extracted = document.len(),
        "Extracted issue fields"
    );

    Ok((document, issue))
}

/// Best-effort projection of `fields` onto `issue`.
///
/// Fields the record does not expose are skipped; the output keeps the
/// order of `fields`. `description` is cleaned of wiki markup.
pub fn project(issue: &IssueRecord, fields: &FieldSet) -> RawDocument {
    let mut document = RawDocument::new();
    for name in fields.iter() {
        let Some(value) = issue.field(name) else {
            continue;
        };
        let value = if name == "description" {
            markup::clean_value(value)
        } else {
            value.clone()
        };
        document.insert(name, value);
    }
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{issue, MockTracker};
    use serde_json::json;

    #[test]
    fn test_project_skips_absent_fields() {
        let record = issue(
            "PROJ-1",
            json!({"summary": "Login fails", "labels": ["auth"], "assignee": null}),
        );
        let fields = FieldSet::parse("labels,priority,summary,assignee");

        let document = project(&record, &fields);
        assert_eq!(
            document.keys().collect::<Vec<_>>(),
            ["labels", "summary", "assignee"]
        );
        assert_eq!(document.get("assignee"), Some(&json!(null)));
    }

    #[test]
    fn test_project_cleans_description() {
        let record = issue("PROJ-1", json!({"description": "h2. Steps\n* open app"}));
        let document = project(&record, &FieldSet::brief());
        assert_eq!(
            document.get("description"),
            Some(&json!("## Steps\n- open app"))
        );

        let record = issue("PROJ-1", json!({"description": null}));
        let document = project(&record, &FieldSet::brief());
        assert_eq!(document.get("description"), Some(&json!(null)));
    }

    #[test]
    fn test_project_empty_field_set() {
        let record = issue("PROJ-1", json!({"summary": "x"}));
        assert!(project(&record, &FieldSet::default()).is_empty());
    }

    #[tokio::test]
    async fn test_extract_fetches_once() {
        let mut tracker = MockTracker::new();
        tracker
            .expect_fetch_issue()
            .withf(|key| key == "PROJ-1")
            .times(1)
            .returning(|key| Ok(issue(key, json!({"summary": "Login fails"}))));

        let (document, record) = extract(&tracker, " PROJ-1 ", &FieldSet::brief())
            .await
            .unwrap();
        assert_eq!(record.key, "PROJ-1");
        assert_eq!(document.get("summary"), Some(&json!("Login fails")));
        assert_eq!(document.len(), 1);
    }

    #[tokio::test]
    async fn test_extract_propagates_not_found() {
        let mut tracker = MockTracker::new();
        tracker
            .expect_fetch_issue()
            .returning(|key| Err(Error::NotFound(format!("Issue {} does not exist", key))));

        let result = extract(&tracker, "NOPE-1", &FieldSet::brief()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_extract_rejects_blank_key() {
        let mut tracker = MockTracker::new();
        tracker.expect_fetch_issue().times(0);

        let result = extract(&tracker, "  ", &FieldSet::brief()).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
