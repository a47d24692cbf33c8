use anyhow::Result;
use async_trait::async_trait;
use steward_core::artifact::OutputArtifact;
use steward_core::capability::{Capability, CapabilityConstraint};
use steward_core::ledger::ErrorLedger;
use steward_core::run_context::RunContext;

use crate::handler::{HandlerContext, OutputHandler};
use crate::payload::optional_str;

pub const MAX_COMMENT_CHARS: usize = 65_536;

/// Posts comments on the triggering issue or pull request.
pub struct AddCommentHandler;

fn attribution_footer(run: &RunContext, agent_name: &str) -> String {
    format!(
        "\n\n---\n*Automated comment by `{}` (run {})*",
        agent_name, run.run_id
    )
}

#[async_trait]
impl OutputHandler for AddCommentHandler {
    fn capability(&self) -> Capability {
        Capability::AddComment
    }

    fn file_noun(&self) -> &'static str {
        "comment"
    }

    fn describe_usage(&self, constraint: &CapabilityConstraint) -> String {
        format!(
            "### add-comment\n\n\
             Write `add-comment.json` (additional comments: `add-comment-2.json`, ...):\n\n\
             ```json\n{{\"body\": \"Comment text in markdown\"}}\n```\n\n\
             - body: non-empty, at most {MAX_COMMENT_CHARS} characters\n\
             - Comments are posted on the triggering issue or PR\n\
             - An attribution footer is appended automatically\n\
             - Maximum comments: {}",
            constraint.max_label()
        )
    }

    async fn validate(
        &self,
        context: &HandlerContext<'_>,
        artifacts: &[OutputArtifact],
        ledger: &mut ErrorLedger,
    ) -> Result<()> {
        if context.run.subject().is_none() {
            ledger.record(
                self.capability(),
                None,
                "No triggering issue or PR to comment on".to_string(),
            );
            return Ok(());
        }
        for artifact in artifacts {
            match optional_str(&artifact.payload, "body") {
                Ok(Some(body)) if !body.trim().is_empty() => {
                    if body.chars().count() > MAX_COMMENT_CHARS {
                        ledger.record(
                            self.capability(),
                            Some(&artifact.file_name),
                            format!("Comment body exceeds {MAX_COMMENT_CHARS} characters"),
                        );
                    }
                }
                Ok(_) => ledger.record(
                    self.capability(),
                    Some(&artifact.file_name),
                    "Comment body is empty or missing".to_string(),
                ),
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
        let Some(subject) = context.run.subject() else {
            return Ok(());
        };
        let footer = attribution_footer(context.run, &context.definition.name);
        for artifact in artifacts {
            let body = artifact
                .payload
                .get("body")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            let message = format!("{body}{footer}");
            if context.client.create_comment(subject, &message).await.is_err() {
                ledger.record(
                    self.capability(),
                    None,
                    format!("Failed to post comment from {} via GitHub API", artifact.file_name),
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
    use steward_core::run_context::{EventKind, RepoRef, RunContext};
    use steward_core::testing::InMemoryPlatform;

    use super::{AddCommentHandler, MAX_COMMENT_CHARS};
    use crate::handler::{HandlerContext, OutputHandler};

    fn run_context() -> RunContext {
        RunContext {
            repo: RepoRef::parse("octo/steward").expect("repo"),
            event: EventKind::Issue,
            subject_number: Some(12),
            actor: "octocat".to_string(),
            run_id: "run-42".to_string(),
        }
    }

    fn artifact(file_name: &str, payload: serde_json::Value) -> OutputArtifact {
        OutputArtifact {
            capability: Capability::AddComment,
            ordinal: None,
            file_name: file_name.to_string(),
            payload,
        }
    }

    #[tokio::test]
    async fn unit_validate_flags_empty_and_oversized_bodies() {
        let platform = InMemoryPlatform::default();
        let definition = AgentDefinition::default();
        let run = run_context();
        let context = HandlerContext {
            run: &run,
            definition: &definition,
            client: &platform,
        };
        let artifacts = vec![
            artifact("add-comment.json", json!({ "body": "  " })),
            artifact(
                "add-comment-2.json",
                json!({ "body": "x".repeat(MAX_COMMENT_CHARS + 1) }),
            ),
        ];
        let mut ledger = ErrorLedger::default();
        AddCommentHandler
            .validate(&context, &artifacts, &mut ledger)
            .await
            .expect("validate");
        let errors = ledger.capability_errors(Capability::AddComment);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "Comment body is empty or missing");
        assert!(errors[1].message.contains("exceeds 65536 characters"));
    }

    #[tokio::test]
    async fn functional_commit_appends_attribution_footer() {
        let platform = InMemoryPlatform::default();
        let definition = AgentDefinition {
            name: "triage-bot".to_string(),
            ..AgentDefinition::default()
        };
        let run = run_context();
        let context = HandlerContext {
            run: &run,
            definition: &definition,
            client: &platform,
        };
        let artifacts = vec![artifact("add-comment.json", json!({ "body": "Looks good" }))];
        let mut ledger = ErrorLedger::default();
        AddCommentHandler
            .commit(&context, &artifacts, &mut ledger)
            .await
            .expect("commit");
        assert!(ledger.is_empty());
        let state = platform.state.lock().expect("state");
        assert_eq!(state.comments.len(), 1);
        assert_eq!(state.comments[0].0, 12);
        assert!(state.comments[0].1.starts_with("Looks good"));
        assert!(state.comments[0].1.contains("triage-bot"));
        assert!(state.comments[0].1.contains("run-42"));
    }

    #[tokio::test]
    async fn regression_validate_requires_a_triggering_subject() {
        let platform = InMemoryPlatform::default();
        let definition = AgentDefinition::default();
        let run = RunContext {
            event: EventKind::Schedule,
            ..run_context()
        };
        let context = HandlerContext {
            run: &run,
            definition: &definition,
            client: &platform,
        };
        let artifacts = vec![artifact("add-comment.json", json!({ "body": "hi" }))];
        let mut ledger = ErrorLedger::default();
        AddCommentHandler
            .validate(&context, &artifacts, &mut ledger)
            .await
            .expect("validate");
        assert_eq!(
            ledger.capability_errors(Capability::AddComment)[0].message,
            "No triggering issue or PR to comment on"
        );
    }
}
