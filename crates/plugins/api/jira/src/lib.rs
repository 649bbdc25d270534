//! Jira provider implementation for jira-prompts.
//!
//! This crate provides a read-only session with the Jira REST API v2, which
//! returns descriptions and comments as wiki markup on both Jira Cloud and
//! Jira Self-Hosted/Data Center.

mod client;
mod types;

pub use client::JiraClient;
pub use types::*;
