use anyhow::Result;
use async_trait::async_trait;
use steward_core::artifact::OutputArtifact;
use steward_core::capability::{Capability, CapabilityConstraint};
use steward_core::ledger::ErrorLedger;

use crate::handler::{HandlerContext, OutputHandler};
use crate::payload::{optional_str, require_u64};

pub const DEFAULT_APPROVAL_BODY: &str = "Automated approval";

/// Submits an approving review on a pull request.
pub struct ApprovePrHandler;

#[async_trait]
impl OutputHandler for ApprovePrHandler {
    fn capability(&self) -> Capability {
        Capability::ApprovePr
    }

    fn file_noun(&self) -> &'static str {
        "approval"
    }

    fn describe_usage(&self, constraint: &CapabilityConstraint) -> String {
        format!(
            "### approve-pr\n\n\
             Write `approve-pr.json` (additional approvals: `approve-pr-2.json`, ...):\n\n\
             ```json\n{{\"pr_number\": 123, \"body\": \"LGTM\"}}\n```\n\n\
             - body (optional) defaults to \"{DEFAULT_APPROVAL_BODY}\"\n\
             - Maximum approvals: {}",
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
            if let Err(message) = require_u64(&artifact.payload, "pr_number") {
                ledger.record(self.capability(), Some(&artifact.file_name), message);
            }
            if let Err(message) = optional_str(&artifact.payload, "body") {
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
            let Some(number) = artifact.payload.get("pr_number").and_then(serde_json::Value::as_u64)
            else {
                continue;
            };
            let body = artifact
                .payload
                .get("body")
                .and_then(serde_json::Value::as_str)
                .filter(|body| !body.trim().is_empty())
                .unwrap_or(DEFAULT_APPROVAL_BODY);
            if context
                .client
                .approve_pull_request(number, body)
                .await
                .is_err()
            {
                ledger.record(
                    self.capability(),
                    None,
                    format!("Failed to approve PR #{number}"),
                );
            }
        }
        Ok(())
    }
}
