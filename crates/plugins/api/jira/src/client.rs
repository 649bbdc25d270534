//! Jira API client implementation.
//!
//! Uses REST API v2 for both Jira Cloud and Jira Self-Hosted/Data Center, so
//! descriptions and comments arrive as wiki markup. Flavor is derived from
//! the URL and only decides which search endpoint is used.

use async_trait::async_trait;
use base64::Engine;
use jira_prompts_core::{AuthMode, Error, IssueRecord, IssueTracker, JiraConfig, Result};
use tracing::{debug, warn};

use crate::types::{JiraCloudSearchResponse, JiraErrorResponse, JiraSearchResponse};

/// Largest page requested from the search endpoints.
const SEARCH_PAGE_SIZE: u32 = 100;

/// Fields requested for search results.
const SEARCH_FIELDS: &str = "*navigable";

/// Jira deployment flavor.
#[derive(Debug, Clone, Copy, PartialEq)]
enum JiraFlavor {
    /// Jira Cloud: token-paginated `/search/jql`
    Cloud,
    /// Jira Self-Hosted / Data Center: offset-paginated `/search`
    SelfHosted,
}

/// Jira API client.
///
/// Holds the HTTP connection pool and the precomputed `Authorization`
/// header; built once at startup and shared for the process lifetime.
pub struct JiraClient {
    base_url: String,
    auth_header: String,
    flavor: JiraFlavor,
    client: reqwest::Client,
}

impl JiraClient {
    /// Create a new Jira client from resolved configuration.
    pub fn new(config: &JiraConfig) -> Result<Self> {
        let flavor = if config.is_cloud() {
            JiraFlavor::Cloud
        } else {
            JiraFlavor::SelfHosted
        };
        Self::build(api_base(&config.url), &config.auth, flavor)
    }

    /// Create a new Jira client with explicit base URL (for testing with httpmock).
    /// The base URL is used as-is (no `/rest/api/2` suffix appended).
    pub fn with_base_url(base_url: impl Into<String>, auth: &AuthMode, cloud: bool) -> Result<Self> {
        let flavor = if cloud {
            JiraFlavor::Cloud
        } else {
            JiraFlavor::SelfHosted
        };
        Self::build(base_url.into().trim_end_matches('/').to_string(), auth, flavor)
    }

    fn build(base_url: String, auth: &AuthMode, flavor: JiraFlavor) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("jira-prompts/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            auth_header: auth_header(auth),
            flavor,
            client,
        })
    }

    /// Build request with auth header.
    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("Accept", "application/json")
            .header("Authorization", &self.auth_header)
    }

    /// Make an authenticated GET request.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        debug!(url = url, params = ?query, "Jira GET request");

        let response = self
            .request(url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        self.handle_response(response).await
    }

    /// Handle response and map errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            let status_code = status.as_u16();
            let message = serde_json::from_str::<JiraErrorResponse>(&body)
                .ok()
                .and_then(|e| e.summary())
                .unwrap_or(body);
            warn!(
                status = status_code,
                message = %message,
                "Jira API error response"
            );
            return Err(Error::from_status(status_code, message));
        }

        serde_json::from_str(&body)
            .map_err(|e| Error::Schema(format!("Failed to parse response: {}", e)))
    }

    /// URL of a single issue. The key is trimmed and pushed as one
    /// percent-encoded path segment.
    fn issue_url(&self, key: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("Invalid Jira URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("Jira URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .push("issue")
            .push(key.trim());
        Ok(url)
    }

    async fn search_cloud(&self, jql: &str, max_results: u32) -> Result<Vec<IssueRecord>> {
        let url = format!("{}/search/jql", self.base_url);
        let mut issues: Vec<IssueRecord> = Vec::new();
        let mut next_page_token: Option<String> = None;

        loop {
            let remaining = max_results - issues.len() as u32;
            let mut params: Vec<(&str, String)> = vec![
                ("jql", jql.to_string()),
                ("maxResults", remaining.min(SEARCH_PAGE_SIZE).to_string()),
                ("fields", SEARCH_FIELDS.to_string()),
            ];
            if let Some(token) = &next_page_token {
                params.push(("nextPageToken", token.clone()));
            }

            let page: JiraCloudSearchResponse = self.get(&url, &params).await?;
            let page_len = page.issues.len();
            issues.extend(page.issues.into_iter().take(remaining as usize));

            if issues.len() as u32 >= max_results || page_len == 0 || page.is_last == Some(true) {
                break;
            }
            match page.next_page_token {
                Some(token) => next_page_token = Some(token),
                None => break,
            }
        }

        Ok(issues)
    }

    async fn search_self_hosted(&self, jql: &str, max_results: u32) -> Result<Vec<IssueRecord>> {
        let url = format!("{}/search", self.base_url);
        let mut issues: Vec<IssueRecord> = Vec::new();

        loop {
            let start_at = issues.len() as u32;
            let remaining = max_results - start_at;
            let params: Vec<(&str, String)> = vec![
                ("jql", jql.to_string()),
                ("startAt", start_at.to_string()),
                ("maxResults", remaining.min(SEARCH_PAGE_SIZE).to_string()),
                ("fields", SEARCH_FIELDS.to_string()),
            ];

            let page: JiraSearchResponse = self.get(&url, &params).await?;
            let page_len = page.issues.len();
            issues.extend(page.issues.into_iter().take(remaining as usize));

            let total = page.total.unwrap_or(0);
            if issues.len() as u32 >= max_results || page_len == 0 || issues.len() as u32 >= total
            {
                break;
            }
        }

        Ok(issues)
    }
}

// =============================================================================
// URL building and auth
// =============================================================================

/// Build the API base URL from the instance URL.
fn api_base(url: &str) -> String {
    format!("{}/rest/api/2", url.trim_end_matches('/'))
}

/// Compute the `Authorization` header value for an auth mode.
fn auth_header(auth: &AuthMode) -> String {
    match auth {
        AuthMode::Basic {
            username,
            api_token,
        } => {
            let credentials = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", username, api_token));
            format!("Basic {}", credentials)
        }
        AuthMode::Token { personal_token } => format!("Bearer {}", personal_token),
    }
}

// =============================================================================
// Trait implementation
// =============================================================================

#[async_trait]
impl IssueTracker for JiraClient {
    fn name(&self) -> &str {
        "jira"
    }

    async fn fetch_issue(&self, key: &str) -> Result<IssueRecord> {
        let url = self.issue_url(key)?;
        let issue: IssueRecord = self.get(url.as_str(), &[]).await?;
        debug!(
            issue = %issue.key,
            fields = issue.fields.len(),
            "Fetched Jira issue"
        );
        Ok(issue)
    }

    async fn search_issues(&self, query: &str, max_results: u32) -> Result<Vec<IssueRecord>> {
        if max_results == 0 {
            return Ok(vec![]);
        }

        let issues = match self.flavor {
            JiraFlavor::Cloud => self.search_cloud(query, max_results).await?,
            JiraFlavor::SelfHosted => self.search_self_hosted(query, max_results).await?,
        };

        debug!(jql = query, count = issues.len(), "Jira search finished");
        Ok(issues)
    }
}

// =============================================================================
// Tests
// =============================================================================
