//! Related-entity collectors.
//!
//! Each collector flattens one kind of related entity (comments, links,
//! subtasks, epic children) into a fixed-shape summary that serializes to a
//! flat JSON object.

use chrono::{DateTime, FixedOffset};
use jira_prompts_core::config::DEFAULT_EPIC_CHILDREN_LIMIT;
use jira_prompts_core::{Error, IssueRecord, IssueRef, IssueTracker, JiraIssueLink, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::markup;

/// Issue type required by [`collect_epic_children`].
pub const EPIC_TYPE: &str = "Epic";

// =============================================================================
// Summaries
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentSummary {
    pub id: String,
    pub author: Option<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
    /// Normalized body (string), or null if the comment had none
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkSummary {
    /// Relationship label of the populated side (e.g., "is blocked by")
    pub relationship: String,
    pub key: String,
    pub summary: String,
    pub status: String,
    #[serde(rename = "type")]
    pub issue_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtaskSummary {
    pub key: String,
    pub summary: String,
    pub status: String,
    #[serde(rename = "type")]
    pub issue_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpicChildSummary {
    pub key: String,
    pub summary: String,
    pub status: String,
    #[serde(rename = "type")]
    pub issue_type: String,
    pub created: Option<String>,
    pub updated: Option<String>,
}

// =============================================================================
// Collectors
// =============================================================================

/// Comments, newest first.
///
/// `limit` keeps at most that many entries; `None` keeps all of them. The
/// result for any limit is a prefix of the unlimited result.
pub fn collect_comments(issue: &IssueRecord, limit: Option<usize>) -> Result<Vec<CommentSummary>> {
    let mut comments = issue.comments()?;
    comments.sort_by(|a, b| {
        creation_key(b.created.as_deref()).cmp(&creation_key(a.created.as_deref()))
    });
    if let Some(limit) = limit {
        comments.truncate(limit);
    }

    Ok(comments
        .into_iter()
        .map(|comment| CommentSummary {
            author: comment
                .author
                .as_ref()
                .and_then(|a| a.label())
                .map(str::to_string),
            body: comment
                .body
                .as_ref()
                .map(markup::clean_value)
                .unwrap_or(Value::Null),
            id: comment.id,
            created: comment.created,
            updated: comment.updated,
        })
        .collect())
}

/// Issue links in source order.
///
/// The inward side is reported when present, otherwise the outward side. A
/// link with neither side is a [`Error::Schema`].
pub fn collect_links(issue: &IssueRecord) -> Result<Vec<LinkSummary>> {
    issue
        .issue_links()?
        .iter()
        .map(|link| summarize_link(&issue.key, link))
        .collect()
}

fn summarize_link(issue_key: &str, link: &JiraIssueLink) -> Result<LinkSummary> {
    let (relationship, other) = match (&link.inward_issue, &link.outward_issue) {
        (Some(inward), _) => (&link.link_type.inward, inward),
        (None, Some(outward)) => (&link.link_type.outward, outward),
        (None, None) => {
            return Err(Error::Schema(format!(
                "Link {} on {} has neither an inward nor an outward issue",
                link.id.as_deref().unwrap_or("?"),
                issue_key
            )))
        }
    };

    Ok(LinkSummary {
        relationship: relationship.clone(),
        key: other.key.clone(),
        summary: other.summary().to_string(),
        status: other.status_name()?.to_string(),
        issue_type: other.type_name()?.to_string(),
    })
}

/// Subtasks in source order.
pub fn collect_subtasks(issue: &IssueRecord) -> Result<Vec<SubtaskSummary>> {
    issue
        .subtasks()?
        .iter()
        .map(|subtask| {
            Ok(SubtaskSummary {
                key: subtask.key.clone(),
                summary: subtask.summary().to_string(),
                status: subtask.status_name()?.to_string(),
                issue_type: subtask.type_name()?.to_string(),
            })
        })
        .collect()
}

/// Options for [`collect_epic_children`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpicChildrenOptions {
    /// Maximum number of children fetched
    pub max_results: u32,
    /// Restrict the search to these project keys (empty = all projects)
    pub projects: Vec<String>,
}

impl Default for EpicChildrenOptions {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_EPIC_CHILDREN_LIMIT,
            projects: Vec::new(),
        }
    }
}

/// Children of an epic, oldest first.
///
/// Fails with [`Error::Precondition`] before any remote call if `issue` is
/// not an epic.
pub async fn collect_epic_children(
    tracker: &dyn IssueTracker,
    issue: &IssueRecord,
    options: &EpicChildrenOptions,
) -> Result<Vec<EpicChildSummary>> {
    match issue.issue_type_name() {
        Some(EPIC_TYPE) => {}
        other => {
            return Err(Error::Precondition(format!(
                "{} is not an {} (issue type: {})",
                issue.key,
                EPIC_TYPE,
                other.unwrap_or("unknown")
            )))
        }
    }

    let jql = children_query(&issue.key, &options.projects);
    debug!(jql = %jql, max = options.max_results, "Searching epic children");

    let mut children: Vec<IssueRef> = tracker
        .search_issues(&jql, options.max_results)
        .await?
        .into_iter()
        .map(IssueRef::try_from)
        .collect::<Result<_>>()?;
    children.sort_by(|a, b| {
        creation_key(a.fields.created.as_deref()).cmp(&creation_key(b.fields.created.as_deref()))
    });

    children
        .into_iter()
        .map(|child| {
            Ok(EpicChildSummary {
                summary: child.summary().to_string(),
                status: child.status_name()?.to_string(),
                issue_type: child.type_name()?.to_string(),
                created: child.fields.created.clone(),
                updated: child.fields.updated.clone(),
                key: child.key,
            })
        })
        .collect()
}

fn children_query(epic_key: &str, projects: &[String]) -> String {
    let mut jql = format!("parent = \"{}\"", epic_key.replace('"', "\\\""));
    if !projects.is_empty() {
        jql.push_str(&format!(" AND project in ({})", projects.join(", ")));
    }
    jql
}

// =============================================================================
// Timestamps
// =============================================================================

/// Sort key for a Jira timestamp.
///
/// Parsed timestamps order by instant. Unparseable or missing ones sort
/// before all parsed ones, by their raw text.
fn creation_key(raw: Option<&str>) -> (Option<DateTime<FixedOffset>>, String) {
    let raw = raw.unwrap_or_default();
    (parse_timestamp(raw), raw.to_string())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
}
