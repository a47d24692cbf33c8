use std::collections::BTreeSet;

use anyhow::Result;
use async_trait::async_trait;
use steward_core::artifact::OutputArtifact;
use steward_core::capability::{Capability, CapabilityConstraint};
use steward_core::ledger::ErrorLedger;
use steward_core::platform::NewIssue;

use crate::handler::{HandlerContext, OutputHandler};
use crate::payload::{optional_string_array, require_str};

pub const MAX_TITLE_CHARS: usize = 256;

/// Opens new issues. Optional labels are checked against the repository's
/// label set; assignees pass through unchecked.
pub struct CreateIssueHandler;

fn issue_from_payload(payload: &serde_json::Value) -> NewIssue {
    NewIssue {
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
        labels: optional_string_array(payload, "labels")
            .ok()
            .flatten()
            .unwrap_or_default(),
        assignees: optional_string_array(payload, "assignees")
            .ok()
            .flatten()
            .unwrap_or_default(),
    }
}

#[async_trait]
impl OutputHandler for CreateIssueHandler {
    fn capability(&self) -> Capability {
        Capability::CreateIssue
    }

    fn file_noun(&self) -> &'static str {
        "issue"
    }

    fn describe_usage(&self, constraint: &CapabilityConstraint) -> String {
        format!(
            "### create-issue\n\n\
             Write `create-issue.json` (additional issues: `create-issue-2.json`, ...):\n\n\
             ```json\n{{\"title\": \"...\", \"body\": \"...\", \"labels\": [\"bug\"], \"assignees\": [\"octocat\"]}}\n```\n\n\
             - Title must be non-empty and at most {MAX_TITLE_CHARS} characters\n\
             - body is required\n\
             - labels (optional) must already exist in the repository\n\
             - assignees (optional) are passed through unchecked\n\
             - Maximum issues: {}",
            constraint.max_label()
        )
    }

    async fn validate(
        &self,
        context: &HandlerContext<'_>,
        artifacts: &[OutputArtifact],
        ledger: &mut ErrorLedger,
    ) -> Result<()> {
        let mut requested_labels = BTreeSet::new();
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
            match require_str(&artifact.payload, "body") {
                Ok(body) if body.trim().is_empty() => ledger.record(
                    self.capability(),
                    Some(&artifact.file_name),
                    "body is required".to_string(),
                ),
                Ok(_) => {}
                Err(message) => {
                    ledger.record(self.capability(), Some(&artifact.file_name), message)
                }
            }
            match optional_string_array(&artifact.payload, "labels") {
                Ok(Some(labels)) => requested_labels.extend(labels),
                Ok(None) => {}
                Err(message) => {
                    ledger.record(self.capability(), Some(&artifact.file_name), message)
                }
            }
            if let Err(message) = optional_string_array(&artifact.payload, "assignees") {
                ledger.record(self.capability(), Some(&artifact.file_name), message);
            }
        }
        if !requested_labels.is_empty() {
            let existing: BTreeSet<String> =
                context.client.list_repo_labels().await?.into_iter().collect();
            for label in requested_labels {
                if !existing.contains(&label) {
                    ledger.record(
                        self.capability(),
                        None,
                        format!("Label '{label}' does not exist in repository"),
                    );
                }
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
            let issue = issue_from_payload(&artifact.payload);
            match context.client.create_issue(&issue).await {
                Ok(number) => {
                    tracing::info!(issue = number, title = %issue.title, "created issue");
                }
                Err(_) => ledger.record(
                    self.capability(),
                    None,
                    format!("Failed to create issue '{}'", issue.title),
                ),
            }
        }
        Ok(())
    }
}
