//! Configuration management for jira-prompts.
//!
//! Two layers are combined at startup:
//!
//! - An optional TOML file with non-secret defaults, stored in a
//!   platform-specific location:
//!   - **macOS/Linux**: `~/.config/jira-prompts/config.toml`
//!   - **Windows**: `%APPDATA%\jira-prompts\config.toml`
//! - Environment variables (`JIRA_URL`, `JIRA_USERNAME`, `JIRA_API_TOKEN`,
//!   `JIRA_PERSONAL_TOKEN`, `JIRA_PROJECTS_FILTER`), which always win.
//!
//! The result is a [`JiraConfig`] with a resolved [`AuthMode`]. Failing to
//! resolve one is fatal: the server never starts without credentials.
//!
//! # Example
//!
//! ```ignore
//! use jira_prompts_core::config::{Config, Credentials, JiraConfig};
//!
//! let file = Config::load()?;
//! let credentials = Credentials::from_lookup(|name| std::env::var(name).ok())
//!     .or_section(file.jira.as_ref());
//! let jira = JiraConfig::from_credentials(credentials)?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Error, Result};

/// Config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config directory name.
const CONFIG_DIR_NAME: &str = "jira-prompts";

/// Default comment limit; negative means "all comments".
pub const DEFAULT_COMMENT_LIMIT: i64 = -1;

/// Default cap on epic children returned by one search.
pub const DEFAULT_EPIC_CHILDREN_LIMIT: u32 = 256;

// =============================================================================
// Configuration file
// =============================================================================

/// Contents of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Jira connection defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira: Option<JiraSection>,

    /// Prompt rendering settings
    #[serde(default)]
    pub prompts: PromptSettings,
}

/// Non-secret Jira settings. Tokens are only read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JiraSection {
    /// Jira instance URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Username or email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Comma-separated project keys used to narrow searches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects_filter: Option<String>,
}

/// Settings that shape prompt output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSettings {
    /// Number of comments in the full view; negative keeps all of them
    #[serde(default = "default_comment_limit")]
    pub comment_limit: i64,
    /// Maximum number of children listed for an epic
    #[serde(default = "default_epic_children_limit")]
    pub epic_children_limit: u32,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            comment_limit: DEFAULT_COMMENT_LIMIT,
            epic_children_limit: DEFAULT_EPIC_CHILDREN_LIMIT,
        }
    }
}

impl PromptSettings {
    /// Comment limit as an optional count (`None` keeps every comment).
    pub fn comment_limit(&self) -> Option<usize> {
        usize::try_from(self.comment_limit).ok()
    }
}

fn default_comment_limit() -> i64 {
    DEFAULT_COMMENT_LIMIT
}

fn default_epic_children_limit() -> u32 {
    DEFAULT_EPIC_CHILDREN_LIMIT
}

impl Config {
    /// Get the configuration directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join(CONFIG_DIR_NAME))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from the default location.
    ///
    /// Returns a default (empty) config if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// Returns a default (empty) config if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = ?path, "Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        debug!(path = ?path, "Loading config");

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

        info!(path = ?path, "Config loaded successfully");
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        debug!(path = ?path, "Saving config");

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        info!(path = ?path, "Config saved successfully");
        Ok(())
    }

    /// Set a configuration value by key path.
    ///
    /// Key format: `section.field` (e.g., `jira.url`, `prompts.comment_limit`)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let (section, field) = split_key(key)?;

        match section {
            "jira" => {
                let config = self.jira.get_or_insert_with(JiraSection::default);
                let value = Some(value.to_string());
                match field {
                    "url" => config.url = value,
                    "username" | "email" => config.username = value,
                    "projects_filter" | "projects" => config.projects_filter = value,
                    _ => {
                        return Err(Error::Config(format!(
                            "Unknown Jira config field: {}",
                            field
                        )))
                    }
                }
            }
            "prompts" => match field {
                "comment_limit" => {
                    self.prompts.comment_limit = value.parse().map_err(|_| {
                        Error::Config(format!("Invalid comment limit: {}", value))
                    })?
                }
                "epic_children_limit" => {
                    self.prompts.epic_children_limit = value.parse().map_err(|_| {
                        Error::Config(format!("Invalid epic children limit: {}", value))
                    })?
                }
                _ => {
                    return Err(Error::Config(format!(
                        "Unknown prompts config field: {}",
                        field
                    )))
                }
            },
            _ => return Err(Error::Config(format!("Unknown section: {}", section))),
        }

        Ok(())
    }

    /// Get a configuration value by key path.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let (section, field) = split_key(key)?;

        match section {
            "jira" => {
                let Some(config) = &self.jira else {
                    return Ok(None);
                };
                match field {
                    "url" => Ok(config.url.clone()),
                    "username" | "email" => Ok(config.username.clone()),
                    "projects_filter" | "projects" => Ok(config.projects_filter.clone()),
                    _ => Err(Error::Config(format!(
                        "Unknown Jira config field: {}",
                        field
                    ))),
                }
            }
            "prompts" => match field {
                "comment_limit" => Ok(Some(self.prompts.comment_limit.to_string())),
                "epic_children_limit" => Ok(Some(self.prompts.epic_children_limit.to_string())),
                _ => Err(Error::Config(format!(
                    "Unknown prompts config field: {}",
                    field
                ))),
            },
            _ => Err(Error::Config(format!("Unknown section: {}", section))),
        }
    }
}

fn split_key(key: &str) -> Result<(&str, &str)> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.len() != 2 {
        return Err(Error::Config(format!(
            "Invalid config key '{}'. Expected format: section.field",
            key
        )));
    }
    Ok((parts[0], parts[1]))
}

// =============================================================================
// Credentials and auth mode
// =============================================================================

/// Raw connection inputs, before the auth mode is decided.
#[derive(Clone, Default)]
pub struct Credentials {
    pub url: Option<String>,
    pub username: Option<String>,
    pub api_token: Option<String>,
    pub personal_token: Option<String>,
    pub projects_filter: Option<String>,
}

impl Credentials {
    /// Read credentials through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            url: read("JIRA_URL"),
            username: read("JIRA_USERNAME"),
            api_token: read("JIRA_API_TOKEN"),
            personal_token: read("JIRA_PERSONAL_TOKEN"),
            projects_filter: read("JIRA_PROJECTS_FILTER"),
        }
    }

    /// Fill values missing here from the config file section.
    pub fn or_section(mut self, section: Option<&JiraSection>) -> Self {
        if let Some(section) = section {
            self.url = self.url.or_else(|| section.url.clone());
            self.username = self.username.or_else(|| section.username.clone());
            self.projects_filter = self
                .projects_filter
                .or_else(|| section.projects_filter.clone());
        }
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("personal_token", &self.personal_token.as_ref().map(|_| "***"))
            .field("projects_filter", &self.projects_filter)
            .finish()
    }
}

/// How requests authenticate against the tracker.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Username/email + API token (Cloud, or Server with basic auth)
    Basic { username: String, api_token: String },
    /// Personal access token (Server/Data Center)
    Token { personal_token: String },
}

impl AuthMode {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthMode::Basic { .. } => "basic",
            AuthMode::Token { .. } => "token",
        }
    }
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("api_token", &"***")
                .finish(),
            AuthMode::Token { .. } => f
                .debug_struct("Token")
                .field("personal_token", &"***")
                .finish(),
        }
    }
}

/// Resolved Jira connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JiraConfig {
    /// Jira instance URL (no trailing slash)
    pub url: String,
    /// Authentication mode
    pub auth: AuthMode,
    /// Project keys used to narrow searches
    pub projects_filter: Vec<String>,
}

impl JiraConfig {
    /// Resolve the auth mode from raw credentials.
    ///
    /// Cloud instances require username + API token. Server/Data Center
    /// prefers a personal token and falls back to username + API token.
    pub fn from_credentials(credentials: Credentials) -> Result<Self> {
        let url = credentials
            .url
            .ok_or_else(|| Error::Config("Missing required JIRA_URL".to_string()))?;
        let url = url.trim().trim_end_matches('/').to_string();

        let basic = match (credentials.username, credentials.api_token) {
            (Some(username), Some(api_token)) => Some(AuthMode::Basic {
                username,
                api_token,
            }),
            _ => None,
        };

        let auth = if is_atlassian_cloud_url(&url) {
            basic.ok_or_else(|| {
                Error::Config(
                    "Cloud authentication requires JIRA_USERNAME and JIRA_API_TOKEN".to_string(),
                )
            })?
        } else {
            credentials
                .personal_token
                .map(|personal_token| AuthMode::Token { personal_token })
                .or(basic)
                .ok_or_else(|| {
                    Error::Config(
                        "Server/Data Center authentication requires JIRA_PERSONAL_TOKEN \
                         or JIRA_USERNAME and JIRA_API_TOKEN"
                            .to_string(),
                    )
                })?
        };

        let projects_filter = credentials
            .projects_filter
            .map(|filter| {
                filter
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        debug!(url = %url, auth = auth.kind(), "Resolved Jira configuration");

        Ok(Self {
            url,
            auth,
            projects_filter,
        })
    }

    /// Whether this is an Atlassian Cloud instance.
    pub fn is_cloud(&self) -> bool {
        is_atlassian_cloud_url(&self.url)
    }
}

/// Determine whether a URL belongs to Atlassian Cloud.
///
/// Localhost and private-network addresses are always Server/Data Center.
pub fn is_atlassian_cloud_url(url: &str) -> bool {
    let Ok(parsed) = url::Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };

    if host == "localhost" || is_private_ipv4(host) {
        return false;
    }

    host.ends_with(".atlassian.net") || host.ends_with(".jira.com") || host.ends_with(".jira-dev.com")
}

fn is_private_ipv4(host: &str) -> bool {
    let Ok(ip) = host.parse::<std::net::Ipv4Addr>() else {
        return false;
    };
    ip.is_loopback() || ip.is_private()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    fn credentials(vars: &[(&str, &str)]) -> Credentials {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Credentials::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_cloud_url_detection() {
        assert!(is_atlassian_cloud_url("https://company.atlassian.net"));
        assert!(is_atlassian_cloud_url("https://team.jira.com/"));
        assert!(is_atlassian_cloud_url("https://x.jira-dev.com"));
        assert!(!is_atlassian_cloud_url("https://jira.company.com"));
        assert!(!is_atlassian_cloud_url("http://localhost:8080"));
        assert!(!is_atlassian_cloud_url("http://192.168.1.10"));
        assert!(!is_atlassian_cloud_url("http://10.0.0.1"));
        assert!(!is_atlassian_cloud_url("http://172.16.0.5"));
        assert!(!is_atlassian_cloud_url("not a url"));
        assert!(!is_atlassian_cloud_url(""));
    }

    #[test]
    fn test_cloud_requires_basic_auth() {
        let config = JiraConfig::from_credentials(credentials(&[
            ("JIRA_URL", "https://company.atlassian.net/"),
            ("JIRA_USERNAME", "me@example.com"),
            ("JIRA_API_TOKEN", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.url, "https://company.atlassian.net");
        assert!(config.is_cloud());
        assert_eq!(config.auth.kind(), "basic");

        let result = JiraConfig::from_credentials(credentials(&[
            ("JIRA_URL", "https://company.atlassian.net"),
            ("JIRA_PERSONAL_TOKEN", "pat"),
        ]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_server_prefers_personal_token() {
        let config = JiraConfig::from_credentials(credentials(&[
            ("JIRA_URL", "https://jira.company.com"),
            ("JIRA_USERNAME", "me"),
            ("JIRA_API_TOKEN", "secret"),
            ("JIRA_PERSONAL_TOKEN", "pat"),
        ]))
        .unwrap();
        assert_eq!(
            config.auth,
            AuthMode::Token {
                personal_token: "pat".to_string()
            }
        );

        let config = JiraConfig::from_credentials(credentials(&[
            ("JIRA_URL", "https://jira.company.com"),
            ("JIRA_USERNAME", "me"),
            ("JIRA_API_TOKEN", "secret"),
        ]))
        .unwrap();
        assert_eq!(config.auth.kind(), "basic");
    }

    #[test]
    fn test_missing_values_are_fatal() {
        assert!(matches!(
            JiraConfig::from_credentials(credentials(&[])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            JiraConfig::from_credentials(credentials(&[("JIRA_URL", "https://jira.local")])),
            Err(Error::Config(_))
        ));
        // Blank values count as missing
        assert!(matches!(
            JiraConfig::from_credentials(credentials(&[("JIRA_URL", "  ")])),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_projects_filter() {
        let config = JiraConfig::from_credentials(credentials(&[
            ("JIRA_URL", "https://jira.company.com"),
            ("JIRA_PERSONAL_TOKEN", "pat"),
            ("JIRA_PROJECTS_FILTER", "PROJ, OPS,,"),
        ]))
        .unwrap();
        assert_eq!(config.projects_filter, vec!["PROJ", "OPS"]);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = credentials(&[
            ("JIRA_URL", "https://jira.company.com"),
            ("JIRA_API_TOKEN", "super-secret"),
        ]);
        assert!(!format!("{:?}", creds).contains("super-secret"));

        let auth = AuthMode::Basic {
            username: "me".into(),
            api_token: "super-secret".into(),
        };
        assert!(!format!("{:?}", auth).contains("super-secret"));
    }

    #[test]
    fn test_env_wins_over_file() {
        let section = JiraSection {
            url: Some("https://file.example.com".into()),
            username: Some("file-user".into()),
            projects_filter: Some("FILE".into()),
        };
        let merged = credentials(&[("JIRA_URL", "https://env.example.com")])
            .or_section(Some(&section));

        assert_eq!(merged.url.as_deref(), Some("https://env.example.com"));
        assert_eq!(merged.username.as_deref(), Some("file-user"));
        assert_eq!(merged.projects_filter.as_deref(), Some("FILE"));
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();
        config.set("jira.url", "https://jira.example.com").unwrap();
        config.set("prompts.comment_limit", "5").unwrap();

        assert_eq!(
            config.get("jira.url").unwrap(),
            Some("https://jira.example.com".to_string())
        );
        assert_eq!(config.get("jira.username").unwrap(), None);
        assert_eq!(
            config.get("prompts.comment_limit").unwrap(),
            Some("5".to_string())
        );
        assert_eq!(config.prompts.comment_limit(), Some(5));
    }

    #[test]
    fn test_invalid_key() {
        let mut config = Config::default();
        assert!(config.set("invalid", "value").is_err());
        assert!(config.set("too.many.parts", "value").is_err());
        assert!(config.set("unknown.field", "value").is_err());
        assert!(config.set("prompts.comment_limit", "many").is_err());
        assert_eq!(config.get("jira.url").unwrap(), None);
    }

    #[test]
    fn test_default_prompt_settings() {
        let settings = PromptSettings::default();
        assert_eq!(settings.comment_limit(), None);
        assert_eq!(settings.epic_children_limit, 256);
    }

    #[test]
    fn test_save_and_load() {
        let mut config = Config::default();
        config.set("jira.url", "https://jira.example.com").unwrap();
        config.set("prompts.epic_children_limit", "50").unwrap();

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();
        config.save_to(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("url = \"https://jira.example.com\""));

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_nonexistent() {
        let path = PathBuf::from("/nonexistent/path/config.toml");
        let config = Config::load_from(&path).unwrap();
        assert!(config.jira.is_none());
        assert_eq!(config.prompts, PromptSettings::default());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[prompts]\ncomment_limit = 3\n").unwrap();
        assert_eq!(config.prompts.comment_limit(), Some(3));
        assert_eq!(config.prompts.epic_children_limit, DEFAULT_EPIC_CHILDREN_LIMIT);
    }
}
