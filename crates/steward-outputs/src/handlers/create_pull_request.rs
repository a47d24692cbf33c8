use anyhow::Result;
use async_trait::async_trait;
use steward_core::artifact::OutputArtifact;
use steward_core::capability::{Capability, CapabilityConstraint};
use steward_core::ledger::ErrorLedger;
use steward_core::platform::NewPullRequest;

use crate::handler::{HandlerContext, OutputHandler};
use crate::payload::{optional_str, require_str};

use super::create_issue::MAX_TITLE_CHARS;

pub const DEFAULT_BASE_BRANCH: &str = "main";

/// Opens pull requests from an existing head branch.
pub struct CreatePullRequestHandler;

fn pull_request_from_payload(payload: &serde_json::Value) -> NewPullRequest {
    NewPullRequest {
        title: payload
            .get("title")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string(),
        body: payload
            .get("body")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string(),
        head: payload
            .get("head")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string(),
        base: payload
            .get("base")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(DEFAULT_BASE_BRANCH)
            .to_string(),
    }
}

#[async_trait]
impl OutputHandler for CreatePullRequestHandler {
    fn capability(&self) -> Capability {
        Capability::CreatePullRequest
    }

    fn file_noun(&self) -> &'static str {
        "pull request"
    }

    fn describe_usage(&self, constraint: &CapabilityConstraint) -> String {
        format!(
            "### create-pull-request\n\n\
             Write `create-pull-request.json`:\n\n\
             ```json\n{{\"title\": \"...\", \"body\": \"...\", \"head\": \"feature-branch\", \"base\": \"main\"}}\n```\n\n\
             - Title must be non-empty and at most {MAX_TITLE_CHARS} characters\n\
             - head: existing branch carrying the changes\n\
             - base defaults to `{DEFAULT_BASE_BRANCH}`\n\
             - Maximum pull requests: {}",
            constraint.max_label()
        )
    }

    async fn validate(
        &self,
        context: &HandlerContext<'_>,
        artifacts: &[OutputArtifact],
        ledger: &mut ErrorLedger,
    ) -> Result<()> {
        for artifact in artifacts {
            match require_str(&artifact.payload, "title") {
                Ok(title) if title.trim().is_empty() => ledger.record(
                    self.capability(),
                    Some(&artifact.file_name),
                    "title is required".to_string(),
                ),
                Ok(title) if title.chars().count() > MAX_TITLE_CHARS => ledger.record(
                    self.capability(),
                    Some(&artifact.file_name),
                    format!("title exceeds {MAX_TITLE_CHARS} characters"),
                ),
                Ok(_) => {}
                Err(message) => {
                    ledger.record(self.capability(), Some(&artifact.file_name), message)
                }
            }
            match require_str(&artifact.payload, "head") {
                Ok(head) if head.trim().is_empty() => ledger.record(
                    self.capability(),
                    Some(&artifact.file_name),
                    "head is required".to_string(),
                ),
                Ok(head) => {
                    if !context.client.branch_exists(head).await? {
                        ledger.record(
                            self.capability(),
                            Some(&artifact.file_name),
                            format!("Branch '{head}' does not exist"),
                        );
                    }
                }
                Err(message) => {
                    ledger.record(self.capability(), Some(&artifact.file_name), message)
                }
            }
            if let Err(message) = optional_str(&artifact.payload, "base") {
                ledger.record(self.capability(), Some(&artifact.file_name), message);
            }
        }
        Ok(())
    }

    async fn commit(
        &self,
        context: &HandlerContext<'_>,
        artifacts: &[OutputArtifact],
        ledger: &mut ErrorLedger,
    ) -> Result<()> {
        for artifact in artifacts {
            let pull_request = pull_request_from_payload(&artifact.payload);
            match context.client.create_pull_request(&pull_request).await {
                Ok(number) => {
                    tracing::info!(pull_request = number, head = %pull_request.head, "created pull request");
                }
                Err(_) => ledger.record(
                    self.capability(),
                    None,
                    format!("Failed to create pull request from '{}'", pull_request.head),
                ),
            }
        }
        Ok(())
    }
}
