//! Jira API response types.
//!
//! Issues themselves are kept as raw [`IssueRecord`]s; these types only
//! describe the envelopes around them.

use jira_prompts_core::IssueRecord;
use serde::Deserialize;

// =============================================================================
// Search Response
// =============================================================================

/// Search response from Self-Hosted Jira (GET /search).
#[derive(Debug, Clone, Deserialize)]
pub struct JiraSearchResponse {
    /// Issues
    #[serde(default)]
    pub issues: Vec<IssueRecord>,
    /// Starting index
    #[serde(default, rename = "startAt")]
    pub start_at: Option<u32>,
    /// Max results per page
    #[serde(default, rename = "maxResults")]
    pub max_results: Option<u32>,
    /// Total number of results
    #[serde(default)]
    pub total: Option<u32>,
}

/// Search response from Jira Cloud (GET /search/jql).
#[derive(Debug, Clone, Deserialize)]
pub struct JiraCloudSearchResponse {
    /// Issues
    #[serde(default)]
    pub issues: Vec<IssueRecord>,
    /// Token for next page
    #[serde(default, rename = "nextPageToken")]
    pub next_page_token: Option<String>,
    /// Whether this is the last page
    #[serde(default, rename = "isLast")]
    pub is_last: Option<bool>,
}

// =============================================================================
// Errors
// =============================================================================

/// Error body returned by Jira on 4xx/5xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JiraErrorResponse {
    #[serde(default, rename = "errorMessages")]
    pub error_messages: Vec<String>,
    #[serde(default)]
    pub errors: serde_json::Map<String, serde_json::Value>,
}

impl JiraErrorResponse {
    /// Flatten all messages into one line, or `None` if the body had none.
    pub fn summary(&self) -> Option<String> {
        let mut messages = self.error_messages.clone();
        messages.extend(self.errors.iter().map(|(field, message)| match message {
            serde_json::Value::String(s) => format!("{}: {}", field, s),
            other => format!("{}: {}", field, other),
        }));
        if messages.is_empty() {
            None
        } else {
            Some(messages.join("; "))
        }
    }
}
