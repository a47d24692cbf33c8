use anyhow::Result;
use async_trait::async_trait;
use steward_core::artifact::OutputArtifact;
use steward_core::capability::{Capability, CapabilityConstraint};
use steward_core::ledger::ErrorLedger;

use crate::handler::{HandlerContext, OutputHandler};
use crate::payload::{optional_str, require_str};

pub const DEFAULT_SOURCE_REF: &str = "main";

/// Creates branches from an explicit commit sha or a named ref.
pub struct CreateBranchHandler;

/// Branch names: first character alphanumeric, remainder limited to
/// alphanumerics, `/`, `_`, `.` and `-`.
pub fn is_valid_branch_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '/' | '_' | '.' | '-'))
}

#[async_trait]
impl OutputHandler for CreateBranchHandler {
    fn capability(&self) -> Capability {
        Capability::CreateBranch
    }

    fn file_noun(&self) -> &'static str {
        "branch"
    }

    fn describe_usage(&self, constraint: &CapabilityConstraint) -> String {
        let mut contract = format!(
            "### create-branch\n\n\
             Write `create-branch.json` (additional branches: `create-branch-2.json`, ...):\n\n\
             ```json\n{{\"branch\": \"fix/flaky-test\", \"from_ref\": \"main\"}}\n```\n\n\
             - branch: new branch name (no spaces, starts with a letter or number)\n\
             - from_sha (optional) pins the start point; otherwise from_ref, default `{DEFAULT_SOURCE_REF}`\n\
             - The branch must not already exist\n"
        );
        if constraint.sign {
            contract.push_str("- Commits must be signed (configured)\n");
        }
        contract.push_str(&format!("- Maximum branches: {}", constraint.max_label()));
        contract
    }

    async fn validate(
        &self,
        context: &HandlerContext<'_>,
        artifacts: &[OutputArtifact],
        ledger: &mut ErrorLedger,
    ) -> Result<()> {
        for artifact in artifacts {
            let branch = match require_str(&artifact.payload, "branch") {
                Ok(branch) if branch.trim().is_empty() => {
                    ledger.record(
                        self.capability(),
                        Some(&artifact.file_name),
                        "branch is required".to_string(),
                    );
                    continue;
                }
                Ok(branch) => branch,
                Err(message) => {
                    ledger.record(self.capability(), Some(&artifact.file_name), message);
                    continue;
                }
            };
            if !is_valid_branch_name(branch) {
                ledger.record(
                    self.capability(),
                    Some(&artifact.file_name),
                    format!("Invalid branch name '{branch}'"),
                );
                continue;
            }
            if context.client.branch_exists(branch).await? {
                ledger.record(
                    self.capability(),
                    Some(&artifact.file_name),
                    format!("Branch '{branch}' already exists"),
                );
            }
            if let Err(message) = optional_str(&artifact.payload, "from_sha") {
                ledger.record(self.capability(), Some(&artifact.file_name), message);
            }
            if let Err(message) = optional_str(&artifact.payload, "from_ref") {
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
            let Some(branch) = artifact.payload.get("branch").and_then(serde_json::Value::as_str)
            else {
                continue;
            };
            let sha = match artifact
                .payload
                .get("from_sha")
                .and_then(serde_json::Value::as_str)
            {
                Some(sha) if !sha.trim().is_empty() => sha.to_string(),
                _ => {
                    let from_ref = artifact
                        .payload
                        .get("from_ref")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or(DEFAULT_SOURCE_REF);
                    match context.client.resolve_ref_sha(from_ref).await {
                        Ok(Some(sha)) => sha,
                        _ => {
                            ledger.record(
                                self.capability(),
                                None,
                                format!("Failed to resolve from_ref '{from_ref}'"),
                            );
                            continue;
                        }
                    }
                }
            };
            if context.client.create_branch(branch, &sha).await.is_err() {
                ledger.record(
                    self.capability(),
                    None,
                    format!("Failed to create branch '{branch}'"),
                );
            }
        }
        Ok(())
    }
}
