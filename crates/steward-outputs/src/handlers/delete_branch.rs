use anyhow::Result;
use async_trait::async_trait;
use steward_core::artifact::OutputArtifact;
use steward_core::capability::{Capability, CapabilityConstraint};
use steward_core::ledger::ErrorLedger;

use crate::handler::{HandlerContext, OutputHandler};
use crate::payload::require_str;

/// Branches that can never be deleted, regardless of configuration.
pub const PROTECTED_BRANCHES: &[&str] = &["main", "master", "develop", "staging", "production"];

pub struct DeleteBranchHandler;

#[async_trait]
impl OutputHandler for DeleteBranchHandler {
    fn capability(&self) -> Capability {
        Capability::DeleteBranch
    }

    fn file_noun(&self) -> &'static str {
        "deletion"
    }

    fn describe_usage(&self, constraint: &CapabilityConstraint) -> String {
        format!(
            "### delete-branch\n\n\
             Write `delete-branch.json` (additional deletions: `delete-branch-2.json`, ...):\n\n\
             ```json\n{{\"branch\": \"fix/merged-work\"}}\n```\n\n\
             - Protected branches can never be deleted: {}\n\
             - Maximum deletions: {}",
            PROTECTED_BRANCHES.join(", "),
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
            match require_str(&artifact.payload, "branch") {
                Ok(branch) if branch.trim().is_empty() => ledger.record(
                    self.capability(),
                    Some(&artifact.file_name),
                    "branch is required".to_string(),
                ),
                Ok(branch) if PROTECTED_BRANCHES.contains(&branch) => ledger.record(
                    self.capability(),
                    Some(&artifact.file_name),
                    format!("Cannot delete protected branch '{branch}'"),
                ),
                Ok(_) => {}
                Err(message) => {
                    ledger.record(self.capability(), Some(&artifact.file_name), message)
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
            let Some(branch) = artifact.payload.get("branch").and_then(serde_json::Value::as_str)
            else {
                continue;
            };
            if context.client.delete_branch(branch).await.is_err() {
                ledger.record(
                    self.capability(),
                    None,
                    format!("Failed to delete branch '{branch}'"),
                );
            }
        }
        Ok(())
    }
}
