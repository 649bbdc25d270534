//! MCP (Model Context Protocol) server for jira-prompts.
//!
//! Exposes Jira issues to AI assistants as prompts: `prompts/list` returns
//! the registry, `prompts/get` renders one issue as a JSON document.

pub mod prompts;
pub mod protocol;
pub mod server;
pub mod transport;

pub use prompts::{DispatchSettings, PromptDispatcher, PROMPTS};
pub use server::McpServer;
