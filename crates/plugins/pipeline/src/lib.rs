//! Issue aggregation pipeline.
//!
//! Turns a raw tracker issue into a prompt-ready JSON document:
//!
//! - **Extract**: fetch the issue and project the requested fields
//! - **Post-process**: flatten statuses, users and the parent into plain values
//! - **Collect**: summarize comments, links, subtasks and epic children
//! - **Render**: pretty-print the document
//!
//! # Example
//!
//! ```ignore
//! use jira_prompts_core::FieldSet;
//! use jira_prompts_pipeline::{collect_comments, extract, postprocess, render_json};
//!
//! let (raw, issue) = extract(&tracker, "PROJ-1", &FieldSet::full()).await?;
//! let mut document = postprocess(raw)?;
//! document.insert("comments", serde_json::to_value(collect_comments(&issue, None)?)?);
//!
//! let text = render_json(&document);
//! ```

pub mod collect;
pub mod document;
pub mod extract;
pub mod markup;
pub mod postprocess;
pub mod render;

pub use collect::{
    collect_comments, collect_epic_children, collect_links, collect_subtasks, CommentSummary,
    EpicChildSummary, EpicChildrenOptions, LinkSummary, SubtaskSummary,
};
pub use document::{NormalizedDocument, RawDocument};
pub use extract::extract;
pub use markup::clean;
pub use postprocess::{postprocess, UNASSIGNED};
pub use render::render_json;
