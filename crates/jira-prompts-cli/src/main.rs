//! jira-prompts CLI - MCP prompt server for Jira issues.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::{Parser, Subcommand};
use jira_prompts_core::{Config, Credentials, IssueTracker, JiraConfig};
use jira_prompts_jira::JiraClient;
use jira_prompts_mcp::prompts::{prompt_definitions, ISSUE_KEY_ARG};
use jira_prompts_mcp::{DispatchSettings, McpServer, PromptDispatcher};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Keys accepted by `config get` / `config set`.
const CONFIG_KEYS: &[&str] = &[
    "jira.url",
    "jira.username",
    "jira.projects_filter",
    "prompts.comment_limit",
    "prompts.epic_children_limit",
];

#[derive(Parser)]
#[command(name = "jira-prompts")]
#[command(author, version, about = "Jira issues as MCP prompts", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Jira instance URL
    #[arg(long, global = true, env = "JIRA_URL")]
    url: Option<String>,

    /// Jira username or email
    #[arg(long, global = true, env = "JIRA_USERNAME")]
    username: Option<String>,

    /// Jira API token (used with --username)
    #[arg(long, global = true, env = "JIRA_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Personal access token (Server/Data Center)
    #[arg(long, global = true, env = "JIRA_PERSONAL_TOKEN", hide_env_values = true)]
    personal_token: Option<String>,

    /// Comma-separated project keys to search in
    #[arg(long, global = true, env = "JIRA_PROJECTS_FILTER")]
    projects_filter: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server on stdin/stdout (default)
    Serve,

    /// Print the brief view of an issue
    Brief {
        /// Issue key (e.g., PROJ-123)
        key: String,
    },

    /// Print the full view of an issue
    Full {
        /// Issue key (e.g., PROJ-123)
        key: String,
    },

    /// Print an epic with its children
    Epic {
        /// Epic key (e.g., PROJ-100)
        key: String,
    },

    /// List available prompts
    Prompts,

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set a value (e.g., `jira.url https://example.atlassian.net`)
    Set { key: String, value: String },

    /// Print a value
    Get { key: String },

    /// Show current configuration
    Show,

    /// Print the config file location
    Path,
}

impl Cli {
    /// Connection flags, looked up by the environment variable each one is
    /// bound to. Blank values count as missing.
    fn credentials(&self) -> Credentials {
        Credentials::from_lookup(|name| match name {
            "JIRA_URL" => self.url.clone(),
            "JIRA_USERNAME" => self.username.clone(),
            "JIRA_API_TOKEN" => self.api_token.clone(),
            "JIRA_PERSONAL_TOKEN" => self.personal_token.clone(),
            "JIRA_PROJECTS_FILTER" => self.projects_filter.clone(),
            _ => None,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    match &cli.command {
        None | Some(Commands::Serve) => {
            let dispatcher = build_dispatcher(&cli)?;
            McpServer::new(dispatcher).run().await?;
        }
        Some(Commands::Brief { key }) => render_once(&cli, "jira-issue-brief", key).await?,
        Some(Commands::Full { key }) => render_once(&cli, "jira-issue-full", key).await?,
        Some(Commands::Epic { key }) => render_once(&cli, "jira-epic-children", key).await?,
        Some(Commands::Prompts) => {
            for prompt in prompt_definitions() {
                println!("{:<20} {}", prompt.name, prompt.description);
            }
        }
        Some(Commands::Config { command }) => run_config(command)?,
    }

    Ok(())
}

/// Log to stderr, and optionally to a file. stdout belongs to the MCP channel.
fn init_logging(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

/// Resolve configuration and open the tracker session. Missing credentials
/// are fatal.
fn build_dispatcher(cli: &Cli) -> anyhow::Result<PromptDispatcher> {
    let config = Config::load().context("Failed to load config file")?;
    let credentials = cli.credentials().or_section(config.jira.as_ref());
    let jira = JiraConfig::from_credentials(credentials).context("Jira is not configured")?;

    tracing::info!(url = %jira.url, auth = jira.auth.kind(), "Connecting to Jira");

    let settings = DispatchSettings::from_config(&config.prompts, jira.projects_filter.clone());
    let tracker: Arc<dyn IssueTracker> = Arc::new(JiraClient::new(&jira)?);
    tracing::debug!(tracker = tracker.name(), ?settings, "Tracker session ready");
    Ok(PromptDispatcher::new(tracker, settings))
}

async fn render_once(cli: &Cli, prompt: &str, key: &str) -> anyhow::Result<()> {
    let dispatcher = build_dispatcher(cli)?;
    let arguments = BTreeMap::from([(ISSUE_KEY_ARG.to_string(), key.to_string())]);

    let result = dispatcher.dispatch(prompt, &arguments).await?;
    if let Some(text) = result.text() {
        println!("{}", text);
    }
    Ok(())
}

fn run_config(command: &ConfigCommands) -> anyhow::Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(key, value)?;
            config.save()?;
            println!("Set {} = {}", key, value);
        }
        ConfigCommands::Get { key } => match Config::load()?.get(key)? {
            Some(value) => println!("{}", value),
            None => println!("{} is not set", key),
        },
        ConfigCommands::Show => {
            let config = Config::load()?;
            for key in CONFIG_KEYS {
                let value = config.get(key)?.unwrap_or_else(|| "(not set)".to_string());
                println!("{} = {}", key, value);
            }
        }
        ConfigCommands::Path => println!("{}", Config::config_path()?.display()),
    }
    Ok(())
}
