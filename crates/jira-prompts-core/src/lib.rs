//! Core traits, types, and error handling for jira-prompts.
//!
//! This crate provides the foundational abstractions used across all jira-prompts components.

pub mod config;
pub mod error;
pub mod fields;
pub mod record;
pub mod tracker;

pub use config::{AuthMode, Config, Credentials, JiraConfig, PromptSettings};
pub use error::{Error, Result};
pub use fields::FieldSet;
pub use record::{IssueRecord, IssueRef, JiraComment, JiraIssueLink, JiraUser, Named};
pub use tracker::IssueTracker;
