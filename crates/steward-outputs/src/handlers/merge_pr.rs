use anyhow::Result;
use async_trait::async_trait;
use steward_core::artifact::OutputArtifact;
use steward_core::capability::{Capability, CapabilityConstraint};
use steward_core::ledger::ErrorLedger;
use steward_core::platform::{MergeMethod, MergeOptions};

use crate::handler::{HandlerContext, OutputHandler};
use crate::payload::{optional_str, require_u64};

/// Merges open pull requests with a configurable merge method.
pub struct MergePrHandler;

fn requested_method(payload: &serde_json::Value) -> Result<MergeMethod, String> {
    match payload.get("merge_method") {
        None | Some(serde_json::Value::Null) => Ok(MergeMethod::Merge),
        Some(value) => value
            .as_str()
            .and_then(MergeMethod::parse)
            .ok_or_else(|| "merge_method must be 'merge', 'squash', or 'rebase'".to_string()),
    }
}

#[async_trait]
impl OutputHandler for MergePrHandler {
    fn capability(&self) -> Capability {
        Capability::MergePr
    }

    fn file_noun(&self) -> &'static str {
        "merge"
    }

    fn describe_usage(&self, constraint: &CapabilityConstraint) -> String {
        format!(
            "### merge-pr\n\n\
             Write `merge-pr.json` (additional merges: `merge-pr-2.json`, ...):\n\n\
             ```json\n{{\"pr_number\": 123, \"merge_method\": \"squash\"}}\n```\n\n\
             - merge_method: merge, squash, or rebase (default merge)\n\
             - The PR must be open\n\
             - commit_title / commit_message (optional) override the merge commit\n\
             - Maximum merges: {}",
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
            let number = match require_u64(&artifact.payload, "pr_number") {
                Ok(number) => number,
                Err(message) => {
                    ledger.record(self.capability(), Some(&artifact.file_name), message);
                    continue;
                }
            };
            if let Err(message) = requested_method(&artifact.payload) {
                ledger.record(self.capability(), Some(&artifact.file_name), message);
            }
            for field in ["commit_title", "commit_message"] {
                if let Err(message) = optional_str(&artifact.payload, field) {
                    ledger.record(self.capability(), Some(&artifact.file_name), message);
                }
            }
            match context.client.pull_request_state(number).await? {
                Some(state) if state == "open" => {}
                Some(state) => ledger.record(
                    self.capability(),
                    Some(&artifact.file_name),
                    format!("PR #{number} is not open (state: {state})"),
                ),
                None => ledger.record(
                    self.capability(),
                    Some(&artifact.file_name),
                    format!("PR #{number} not found"),
                ),
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
            let method = requested_method(&artifact.payload).unwrap_or(MergeMethod::Merge);
            let options = MergeOptions {
                commit_title: artifact
                    .payload
                    .get("commit_title")
                    .and_then(serde_json::Value::as_str)
                    .map(ToString::to_string),
                commit_message: artifact
                    .payload
                    .get("commit_message")
                    .and_then(serde_json::Value::as_str)
                    .map(ToString::to_string),
            };
            if context
                .client
                .merge_pull_request(number, method, &options)
                .await
                .is_err()
            {
                ledger.record(
                    self.capability(),
                    None,
                    format!("Failed to merge PR #{number}"),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use steward_core::agent_definition::AgentDefinition;
    use steward_core::artifact::OutputArtifact;
    use steward_core::capability::Capability;
    use steward_core::ledger::ErrorLedger;
    use steward_core::platform::MergeMethod;
    use steward_core::run_context::{EventKind, RepoRef, RunContext};
    use steward_core::testing::{InMemoryPlatform, PlatformState};

    use super::MergePrHandler;
    use crate::handler::{HandlerContext, OutputHandler};

    fn context_pieces() -> (AgentDefinition, RunContext) {
        (
            AgentDefinition::default(),
            RunContext {
                repo: RepoRef::parse("octo/steward").expect("repo"),
                event: EventKind::PullRequest,
                subject_number: Some(9),
                actor: "octocat".to_string(),
                run_id: "run-1".to_string(),
            },
        )
    }

    fn artifact(payload: serde_json::Value) -> OutputArtifact {
        OutputArtifact {
            capability: Capability::MergePr,
            ordinal: None,
            file_name: "merge-pr.json".to_string(),
            payload,
        }
    }

    #[tokio::test]
    async fn functional_validate_rejects_closed_pull_request() {
        let mut state = PlatformState::default();
        state.pull_request_states.insert(9, "closed".to_string());
        let platform = InMemoryPlatform::new(state);
        let (definition, run) = context_pieces();
        let context = HandlerContext {
            run: &run,
            definition: &definition,
            client: &platform,
        };
        let artifacts = vec![artifact(json!({ "pr_number": 9 }))];
        let mut ledger = ErrorLedger::default();
        MergePrHandler
            .validate(&context, &artifacts, &mut ledger)
            .await
            .expect("validate");
        assert_eq!(
            ledger.capability_errors(Capability::MergePr)[0].message,
            "PR #9 is not open (state: closed)"
        );
    }

    #[tokio::test]
    async fn unit_validate_rejects_unknown_merge_method() {
        let mut state = PlatformState::default();
        state.pull_request_states.insert(9, "open".to_string());
        let platform = InMemoryPlatform::new(state);
        let (definition, run) = context_pieces();
        let context = HandlerContext {
            run: &run,
            definition: &definition,
            client: &platform,
        };
        let artifacts = vec![artifact(json!({ "pr_number": 9, "merge_method": "fast-forward" }))];
        let mut ledger = ErrorLedger::default();
        MergePrHandler
            .validate(&context, &artifacts, &mut ledger)
            .await
            .expect("validate");
        assert_eq!(
            ledger.capability_errors(Capability::MergePr)[0].message,
            "merge_method must be 'merge', 'squash', or 'rebase'"
        );
    }

    #[tokio::test]
    async fn functional_commit_defaults_to_merge_method() {
        let mut state = PlatformState::default();
        state.pull_request_states.insert(9, "open".to_string());
        let platform = InMemoryPlatform::new(state);
        let (definition, run) = context_pieces();
        let context = HandlerContext {
            run: &run,
            definition: &definition,
            client: &platform,
        };
        let artifacts = vec![artifact(json!({ "pr_number": 9 }))];
        let mut ledger = ErrorLedger::default();
        MergePrHandler
            .commit(&context, &artifacts, &mut ledger)
            .await
            .expect("commit");
        assert!(ledger.is_empty());
        assert_eq!(
            platform.state.lock().expect("state").merged_pull_requests,
            vec![(9, MergeMethod::Merge)]
        );
    }
}
