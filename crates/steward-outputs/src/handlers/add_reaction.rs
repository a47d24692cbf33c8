use anyhow::Result;
use async_trait::async_trait;
use steward_core::artifact::OutputArtifact;
use steward_core::capability::{Capability, CapabilityConstraint};
use steward_core::ledger::ErrorLedger;

use crate::handler::{HandlerContext, OutputHandler};
use crate::payload::{optional_u64, require_str};

pub const VALID_REACTIONS: &[&str] = &[
    "+1", "-1", "laugh", "confused", "heart", "hooray", "rocket", "eyes",
];

/// Adds an emoji reaction to an issue/PR or to a single comment. Exactly one
/// of `issue_number` and `comment_id` must be present.
pub struct AddReactionHandler;

#[async_trait]
impl OutputHandler for AddReactionHandler {
    fn capability(&self) -> Capability {
        Capability::AddReaction
    }

    fn file_noun(&self) -> &'static str {
        "reaction"
    }

    fn describe_usage(&self, constraint: &CapabilityConstraint) -> String {
        format!(
            "### add-reaction\n\n\
             Write `add-reaction.json` (additional reactions: `add-reaction-2.json`, ...):\n\n\
             ```json\n{{\"reaction\": \"heart\", \"issue_number\": 123}}\n```\n\n\
             - reaction: one of {}\n\
             - Target exactly one of issue_number or comment_id\n\
             - Maximum reactions: {}",
            VALID_REACTIONS.join(", "),
            constraint.max_label()
        )
    }

    async fn dynamic_context(&self, _context: &HandlerContext<'_>) -> Result<Option<String>> {
        Ok(Some(format!(
            "Supported reactions: {}",
            VALID_REACTIONS.join(", ")
        )))
    }

    async fn validate(
        &self,
        _context: &HandlerContext<'_>,
        artifacts: &[OutputArtifact],
        ledger: &mut ErrorLedger,
    ) -> Result<()> {
        for artifact in artifacts {
            match require_str(&artifact.payload, "reaction") {
                Ok(reaction) if !VALID_REACTIONS.contains(&reaction) => ledger.record(
                    self.capability(),
                    Some(&artifact.file_name),
                    format!(
                        "Invalid reaction '{reaction}'. Must be one of: {}",
                        VALID_REACTIONS.join(", ")
                    ),
                ),
                Ok(_) => {}
                Err(_) => ledger.record(
                    self.capability(),
                    Some(&artifact.file_name),
                    "reaction is required".to_string(),
                ),
            }
            let issue_number = optional_u64(&artifact.payload, "issue_number");
            let comment_id = optional_u64(&artifact.payload, "comment_id");
            match (issue_number, comment_id) {
                (Ok(None), Ok(None)) => ledger.record(
                    self.capability(),
                    Some(&artifact.file_name),
                    "Either issue_number or comment_id must be specified".to_string(),
                ),
                (Ok(Some(_)), Ok(Some(_))) => ledger.record(
                    self.capability(),
                    Some(&artifact.file_name),
                    "Cannot specify both issue_number and comment_id".to_string(),
                ),
                (Err(message), _) | (_, Err(message)) => {
                    ledger.record(self.capability(), Some(&artifact.file_name), message)
                }
                _ => {}
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
            let reaction = artifact
                .payload
                .get("reaction")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            if let Some(number) = artifact.payload.get("issue_number").and_then(serde_json::Value::as_u64)
            {
                if context
                    .client
                    .add_issue_reaction(number, reaction)
                    .await
                    .is_err()
                {
                    ledger.record(
                        self.capability(),
                        None,
                        format!("Failed to add reaction to issue #{number}"),
                    );
                }
            } else if let Some(comment_id) = artifact
                .payload
                .get("comment_id")
                .and_then(serde_json::Value::as_u64)
            {
                if context
                    .client
                    .add_comment_reaction(comment_id, reaction)
                    .await
                    .is_err()
                {
                    ledger.record(
                        self.capability(),
                        None,
                        format!("Failed to add reaction to comment #{comment_id}"),
                    );
                }
            }
        }
        Ok(())
    }
}
