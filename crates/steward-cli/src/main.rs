//! Command-line shell for the Steward pipeline. Loads an agent definition,
//! builds the run context from flags, and drives gate -> context ->
//! execution handoff -> output application -> audit against the GitHub API.
//!
//! The agent execution itself is external: this binary writes the assembled
//! context bundle for the executor and applies whatever artifacts the
//! executor left in the outputs directory.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use steward_core::agent_definition::AgentDefinition;
use steward_core::audit::RunMetrics;
use steward_core::run_context::{EventKind, RepoRef, RunContext};
use steward_github::GithubApiClient;
use steward_outputs::registry::{CapabilityRegistry, UnknownCapabilityMode};
use steward_pipeline::{
    ArtifactCollector, CredentialConfig, ExecutionOutcome, Pipeline, TicketConfig,
};

#[derive(Debug, Parser)]
#[command(name = "steward", about = "Delegated side-effect pipeline for repository agents")]
struct Cli {
    /// Agent definition JSON file.
    #[arg(long)]
    agent_file: PathBuf,

    /// Repository as owner/name.
    #[arg(long)]
    repo: String,

    /// Triggering event kind: issue, pull_request, discussion, schedule, manual.
    #[arg(long, default_value = "manual")]
    event: String,

    /// Triggering issue or PR number, for subject-bearing events.
    #[arg(long)]
    subject: Option<u64>,

    /// Actor who triggered the run.
    #[arg(long)]
    actor: String,

    /// Unique run identifier.
    #[arg(long)]
    run_id: String,

    /// Directory the execution stage writes artifact files into.
    #[arg(long, default_value = "steward-outputs")]
    outputs_dir: PathBuf,

    /// Where to write the assembled context bundle for the executor.
    #[arg(long)]
    context_out: Option<PathBuf>,

    /// Optional collected-input text file included in the context bundle.
    #[arg(long)]
    input_file: Option<PathBuf>,

    /// Optional execution metrics JSON ({"cost_usd", "duration_ms", "turns"}).
    #[arg(long)]
    metrics_file: Option<PathBuf>,

    /// GitHub API base URL.
    #[arg(long, default_value = "https://api.github.com", env = "GITHUB_API_URL")]
    api_url: String,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: String,

    /// Agent API key (one of the two recognized credential mechanisms).
    #[arg(long, env = "AGENT_API_KEY", hide_env_values = true)]
    agent_api_key: Option<String>,

    /// Agent subscription access token (the other credential mechanism).
    #[arg(long, env = "AGENT_ACCESS_TOKEN", hide_env_values = true)]
    agent_access_token: Option<String>,

    /// Open a tracking issue when the run fails.
    #[arg(long)]
    ticket: bool,

    /// Labels applied to the failure ticket.
    #[arg(long = "ticket-label")]
    ticket_labels: Vec<String>,

    /// Assignees applied to the failure ticket.
    #[arg(long = "ticket-assignee")]
    ticket_assignees: Vec<String>,

    /// Skip configured capabilities with no registered handler instead of
    /// failing the run.
    #[arg(long)]
    skip_unknown_capabilities: bool,

    /// HTTP request timeout in milliseconds.
    #[arg(long, default_value_t = 30_000)]
    request_timeout_ms: u64,

    /// Maximum attempts for retryable GitHub API failures.
    #[arg(long, default_value_t = 3)]
    retry_max_attempts: usize,

    /// Base delay for retry backoff in milliseconds.
    #[arg(long, default_value_t = 500)]
    retry_base_delay_ms: u64,

    /// Emit the audit report as JSON instead of markdown.
    #[arg(long)]
    json: bool,
}

fn parse_event_kind(raw: &str) -> Result<EventKind> {
    match raw {
        "issue" => Ok(EventKind::Issue),
        "pull_request" => Ok(EventKind::PullRequest),
        "discussion" => Ok(EventKind::Discussion),
        "schedule" => Ok(EventKind::Schedule),
        "manual" => Ok(EventKind::Manual),
        other => bail!(
            "unknown event kind '{other}', expected issue, pull_request, discussion, schedule, or manual"
        ),
    }
}

fn load_metrics(path: &PathBuf) -> Result<RunMetrics> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read metrics file {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).context("failed to parse metrics file")?;
    Ok(RunMetrics {
        cost_usd: value.get("cost_usd").and_then(serde_json::Value::as_f64),
        duration_ms: value.get("duration_ms").and_then(serde_json::Value::as_u64),
        turns: value.get("turns").and_then(serde_json::Value::as_u64),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let raw_definition = std::fs::read_to_string(&cli.agent_file).with_context(|| {
        format!("failed to read agent definition {}", cli.agent_file.display())
    })?;
    let definition: AgentDefinition =
        serde_json::from_str(&raw_definition).context("failed to parse agent definition")?;

    let repo = RepoRef::parse(&cli.repo)?;
    let event = parse_event_kind(&cli.event)?;
    let run = RunContext {
        repo: repo.clone(),
        event,
        subject_number: cli.subject,
        actor: cli.actor.clone(),
        run_id: cli.run_id.clone(),
    };

    let client = GithubApiClient::new(
        cli.api_url.clone(),
        cli.github_token.clone(),
        repo,
        cli.request_timeout_ms,
        cli.retry_max_attempts,
        cli.retry_base_delay_ms,
    )?;

    let mode = if cli.skip_unknown_capabilities {
        UnknownCapabilityMode::Skip
    } else {
        UnknownCapabilityMode::Strict
    };
    let registry = CapabilityRegistry::standard().with_mode(mode);
    let collector = ArtifactCollector::new(&cli.outputs_dir);

    let collected_input = match &cli.input_file {
        Some(path) => Some(std::fs::read_to_string(path).with_context(|| {
            format!("failed to read collected input {}", path.display())
        })?),
        None => None,
    };

    let pipeline = Pipeline {
        registry: &registry,
        collector: &collector,
        credentials: CredentialConfig {
            api_key: cli.agent_api_key.clone(),
            access_token: cli.agent_access_token.clone(),
        },
        ticket: TicketConfig {
            enabled: cli.ticket,
            labels: cli.ticket_labels.clone(),
            assignees: cli.ticket_assignees.clone(),
        },
    };

    let context_out = cli.context_out.clone();
    let metrics_file = cli.metrics_file.clone();
    let report = pipeline
        .run(
            &run,
            &definition,
            &client,
            collected_input.as_deref(),
            |bundle| async move {
                if let Some(path) = &context_out {
                    std::fs::write(path, &bundle).with_context(|| {
                        format!("failed to write context bundle {}", path.display())
                    })?;
                    tracing::info!(path = %path.display(), "wrote context bundle");
                }
                let metrics = match &metrics_file {
                    Some(path) => load_metrics(path)?,
                    None => RunMetrics::default(),
                };
                Ok(ExecutionOutcome { metrics })
            },
        )
        .await?;

    if !report.gate.should_run {
        for reason in &report.gate.reasons {
            tracing::warn!(%reason, "run blocked");
        }
    }

    if cli.json {
        println!("{}", report.record.render_report_json());
    } else {
        println!("{}", report.record.render_report());
    }

    if report.record.status == steward_core::audit::RunStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}
