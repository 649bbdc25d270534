//! Tracker trait for the remote issue tracker session.

use async_trait::async_trait;

use crate::error::Result;
use crate::record::IssueRecord;

/// Read-only session with a remote issue tracker (Jira Cloud, Server, ...).
///
/// One instance is built at startup and shared by every request.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Get the tracker name (e.g., "jira")
    fn name(&self) -> &str;

    /// Fetch a single issue with all of its fields.
    async fn fetch_issue(&self, key: &str) -> Result<IssueRecord>;

    /// Run a query and return at most `max_results` issues.
    async fn search_issues(&self, query: &str, max_results: u32) -> Result<Vec<IssueRecord>>;
}
