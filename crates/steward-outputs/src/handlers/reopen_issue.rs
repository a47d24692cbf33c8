use anyhow::Result;
use async_trait::async_trait;
use steward_core::artifact::OutputArtifact;
use steward_core::capability::{Capability, CapabilityConstraint};
use steward_core::ledger::ErrorLedger;

use crate::handler::{HandlerContext, OutputHandler};
use crate::payload::{optional_str, require_u64};

/// Reopens a closed issue or PR, posting an optional trailing comment after
/// the state change.
pub struct ReopenIssueHandler;

#[async_trait]
impl OutputHandler for ReopenIssueHandler {
    fn capability(&self) -> Capability {
        Capability::ReopenIssue
    }

    fn file_noun(&self) -> &'static str {
        "reopen"
    }

    fn describe_usage(&self, constraint: &CapabilityConstraint) -> String {
        format!(
            "### reopen-issue\n\n\
             Write `reopen-issue.json` (additional reopens: `reopen-issue-2.json`, ...):\n\n\
             ```json\n{{\"issue_number\": 123, \"comment\": \"Reopening: regression in v2.1\"}}\n```\n\n\
             - issue_number: closed issue or PR to reopen\n\
             - comment (optional) is posted after reopening\n\
             - Maximum reopens: {}",
            constraint.max_label()
        )
    }

    async fn validate(
        &self,
        _context: &HandlerContext<'_>,
        artifacts: &[OutputArtifact],
        ledger: &mut ErrorLedger,
    ) -> Result<()> {
        for artifact in artifacts {
            if let Err(message) = require_u64(&artifact.payload, "issue_number") {
                ledger.record(self.capability(), Some(&artifact.file_name), message);
            }
            if let Err(message) = optional_str(&artifact.payload, "comment") {
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
            let Some(number) = artifact.payload.get("issue_number").and_then(serde_json::Value::as_u64)
            else {
                continue;
            };
            if context.client.reopen_issue(number).await.is_err() {
                ledger.record(
                    self.capability(),
                    None,
                    format!("Failed to reopen issue #{number}"),
                );
                continue;
            }
            if let Some(comment) = artifact
                .payload
                .get("comment")
                .and_then(serde_json::Value::as_str)
            {
                if !comment.trim().is_empty()
                    && context.client.create_comment(number, comment).await.is_err()
                {
                    ledger.record(
                        self.capability(),
                        None,
                        format!("Failed to add comment to issue #{number}"),
                    );
                }
            }
        }
        Ok(())
    }
}
