use anyhow::Result;
use async_trait::async_trait;
use steward_core::artifact::OutputArtifact;
use steward_core::capability::{Capability, CapabilityConstraint};
use steward_core::ledger::ErrorLedger;

use crate::handler::{HandlerContext, OutputHandler};
use crate::payload::require_str;

/// Removes one label per artifact from the triggering subject. Passthrough:
/// no pre-existence check, a label absent from the subject is a no-op on the
/// platform side.
pub struct RemoveLabelHandler;

#[async_trait]
impl OutputHandler for RemoveLabelHandler {
    fn capability(&self) -> Capability {
        Capability::RemoveLabel
    }

    fn file_noun(&self) -> &'static str {
        "label removal"
    }

    fn describe_usage(&self, constraint: &CapabilityConstraint) -> String {
        format!(
            "### remove-label\n\n\
             Write `remove-label.json` (additional removals: `remove-label-2.json`, ...):\n\n\
             ```json\n{{\"label\": \"needs-triage\"}}\n```\n\n\
             - label: name of one label to remove from the triggering issue or PR\n\
             - Maximum label removals: {}",
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
                "No triggering issue or PR to unlabel".to_string(),
            );
            return Ok(());
        }
        for artifact in artifacts {
            match require_str(&artifact.payload, "label") {
                Ok(label) if !label.trim().is_empty() => {}
                Ok(_) => ledger.record(
                    self.capability(),
                    Some(&artifact.file_name),
                    "label is required".to_string(),
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
        for artifact in artifacts {
            let label = artifact
                .payload
                .get("label")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            if context.client.remove_label(subject, label).await.is_err() {
                ledger.record(
                    self.capability(),
                    None,
                    format!("Failed to remove label '{label}'"),
                );
            }
        }
        Ok(())
    }
}
