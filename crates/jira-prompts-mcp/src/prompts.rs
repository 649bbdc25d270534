//! Prompt registry and dispatcher.
//!
//! The registry is a static table; the dispatcher runs one prompt request
//! through the pipeline:
//!
//! ```text
//! Idle -> Resolving -> Extracting -> [Collecting] -> Serializing -> Done
//!              \             \              \              \
//!               +-------------+--------------+--------------+--> Failed
//! ```
//!
//! No partial document is ever returned; the first error ends the request.

use std::collections::BTreeMap;
use std::sync::Arc;

use jira_prompts_core::{Error, FieldSet, IssueTracker, PromptSettings, Result};
use jira_prompts_pipeline::{
    collect_comments, collect_epic_children, collect_links, collect_subtasks, extract,
    postprocess, render_json, EpicChildrenOptions, NormalizedDocument,
};
use tracing::{debug, info, warn};

use crate::protocol::{GetPromptResult, PromptArgument, PromptDefinition};

/// Name of the argument carrying the issue key.
pub const ISSUE_KEY_ARG: &str = "issue-key";

// =============================================================================
// Registry
// =============================================================================

/// What a prompt renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Core fields only
    Brief,
    /// Full field set plus links, subtasks and comments
    Full,
    /// Core fields of an epic plus its children
    EpicChildren,
}

impl PromptKind {
    fn fields(self) -> FieldSet {
        match self {
            PromptKind::Brief | PromptKind::EpicChildren => FieldSet::brief(),
            PromptKind::Full => FieldSet::full(),
        }
    }
}

/// Registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: PromptKind,
}

impl PromptEntry {
    pub fn definition(&self) -> PromptDefinition {
        PromptDefinition {
            name: self.name.to_string(),
            description: self.description.to_string(),
            arguments: vec![PromptArgument {
                name: ISSUE_KEY_ARG.to_string(),
                description: "Jira issue key (e.g., PROJ-123)".to_string(),
                required: true,
            }],
        }
    }
}

pub const PROMPTS: &[PromptEntry] = &[
    PromptEntry {
        name: "jira-issue-brief",
        description: "Get a brief summary of a Jira issue: core fields only",
        kind: PromptKind::Brief,
    },
    PromptEntry {
        name: "jira-issue-full",
        description: "Get the full details of a Jira issue with its links, subtasks and comments",
        kind: PromptKind::Full,
    },
    PromptEntry {
        name: "jira-epic-children",
        description: "Get a Jira epic with the issues that belong to it, oldest first",
        kind: PromptKind::EpicChildren,
    },
];

/// Look up a prompt by name.
pub fn find_prompt(name: &str) -> Option<&'static PromptEntry> {
    PROMPTS.iter().find(|p| p.name == name)
}

/// Definitions of every registered prompt, in registry order.
pub fn prompt_definitions() -> Vec<PromptDefinition> {
    PROMPTS.iter().map(PromptEntry::definition).collect()
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Stage of a prompt request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Resolving,
    Extracting,
    Collecting,
    Serializing,
    Done,
    Failed,
}

impl DispatchState {
    /// Whether `next` may follow this state.
    pub fn can_advance_to(self, next: DispatchState) -> bool {
        use DispatchState::*;

        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => self != Idle,
            (Idle, Resolving)
            | (Resolving, Extracting)
            | (Extracting, Collecting)
            | (Extracting, Serializing)
            | (Collecting, Serializing)
            | (Serializing, Done) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DispatchState::Done | DispatchState::Failed)
    }
}

/// Settings applied to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Maximum comments in the full view (`None` = all)
    pub comment_limit: Option<usize>,
    pub epic_children: EpicChildrenOptions,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&PromptSettings::default(), Vec::new())
    }
}

impl DispatchSettings {
    pub fn from_config(prompts: &PromptSettings, projects_filter: Vec<String>) -> Self {
        Self {
            comment_limit: prompts.comment_limit(),
            epic_children: EpicChildrenOptions {
                max_results: prompts.epic_children_limit,
                projects: projects_filter,
            },
        }
    }
}

/// Runs prompt requests against one tracker session.
pub struct PromptDispatcher {
    tracker: Arc<dyn IssueTracker>,
    settings: DispatchSettings,
}

/// State of one request, logged on every transition.
struct Dispatch<'a> {
    prompt: &'a str,
    state: DispatchState,
}

impl Dispatch<'_> {
    fn enter(&mut self, next: DispatchState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(prompt = self.prompt, from = ?self.state, to = ?next, "Prompt state");
        self.state = next;
    }
}

impl PromptDispatcher {
    pub fn new(tracker: Arc<dyn IssueTracker>, settings: DispatchSettings) -> Self {
        Self { tracker, settings }
    }

    /// Render the prompt `name` for the given arguments.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: &BTreeMap<String, String>,
    ) -> Result<GetPromptResult> {
        let mut dispatch = Dispatch {
            prompt: name,
            state: DispatchState::Idle,
        };

        match self.run(&mut dispatch, arguments).await {
            Ok(result) => {
                dispatch.enter(DispatchState::Done);
                Ok(result)
            }
            Err(e) => {
                warn!(prompt = name, stage = ?dispatch.state, error = %e, "Prompt failed");
                dispatch.enter(DispatchState::Failed);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        dispatch: &mut Dispatch<'_>,
        arguments: &BTreeMap<String, String>,
    ) -> Result<GetPromptResult> {
        dispatch.enter(DispatchState::Resolving);
        let prompt = find_prompt(dispatch.prompt)
            .ok_or_else(|| Error::NotFound(format!("prompt not found: {}", dispatch.prompt)))?;
        let issue_key = arguments
            .get(ISSUE_KEY_ARG)
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                Error::Validation(format!("Missing required argument '{}'", ISSUE_KEY_ARG))
            })?;

        info!(prompt = prompt.name, issue_key, "Rendering prompt");

        dispatch.enter(DispatchState::Extracting);
        let (raw, issue) = extract(self.tracker.as_ref(), issue_key, &prompt.kind.fields()).await?;
        let mut document = postprocess(raw)?;
        document.insert("issue_key", issue_key);

        match prompt.kind {
            PromptKind::Brief => {}
            PromptKind::Full => {
                dispatch.enter(DispatchState::Collecting);
                insert(&mut document, "links", &collect_links(&issue)?)?;
                insert(&mut document, "subtasks", &collect_subtasks(&issue)?)?;
                insert(
                    &mut document,
                    "comments",
                    &collect_comments(&issue, self.settings.comment_limit)?,
                )?;
            }
            PromptKind::EpicChildren => {
                dispatch.enter(DispatchState::Collecting);
                let children = collect_epic_children(
                    self.tracker.as_ref(),
                    &issue,
                    &self.settings.epic_children,
                )
                .await?;
                insert(&mut document, "children", &children)?;
            }
        }

        dispatch.enter(DispatchState::Serializing);
        Ok(GetPromptResult::user_text(
            prompt.description,
            render_json(&document),
        ))
    }
}

fn insert<T: serde::Serialize>(
    document: &mut NormalizedDocument,
    name: &str,
    value: &T,
) -> Result<()> {
    document.insert(name, serde_json::to_value(value)?);
    Ok(())
}
