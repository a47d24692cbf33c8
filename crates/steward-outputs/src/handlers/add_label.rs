use std::collections::BTreeSet;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use steward_core::artifact::OutputArtifact;
use steward_core::capability::{Capability, CapabilityConstraint};
use steward_core::ledger::ErrorLedger;

use crate::handler::{HandlerContext, OutputHandler};

/// Adds labels to the triggering subject. The batch is union-merged across
/// artifacts and with the subject's current labels, then applied as a single
/// replacement call, so existing labels are never removed.
pub struct AddLabelHandler;

fn requested_labels(payload: &Value) -> Result<Vec<String>, String> {
    match payload.get("labels") {
        Some(Value::Array(items)) => {
            if items.is_empty() {
                return Err("labels array cannot be empty".to_string());
            }
            let mut labels = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(label) => labels.push(label.to_string()),
                    None => return Err("labels entries must be strings".to_string()),
                }
            }
            Ok(labels)
        }
        _ => Err("labels field must be an array".to_string()),
    }
}

fn batch_union(artifacts: &[OutputArtifact]) -> BTreeSet<String> {
    let mut union = BTreeSet::new();
    for artifact in artifacts {
        if let Ok(labels) = requested_labels(&artifact.payload) {
            union.extend(labels);
        }
    }
    union
}

#[async_trait]
impl OutputHandler for AddLabelHandler {
    fn capability(&self) -> Capability {
        Capability::AddLabel
    }

    fn file_noun(&self) -> &'static str {
        "label"
    }

    fn describe_usage(&self, constraint: &CapabilityConstraint) -> String {
        format!(
            "### add-label\n\n\
             Write `add-label.json`:\n\n\
             ```json\n{{\"labels\": [\"bug\", \"needs-triage\"]}}\n```\n\n\
             - Labels array must be non-empty\n\
             - Every label must already exist in the repository\n\
             - Labels are merged with the subject's current labels, never replaced\n\
             - Maximum label files: {}",
            constraint.max_label()
        )
    }

    async fn dynamic_context(&self, context: &HandlerContext<'_>) -> Result<Option<String>> {
        let labels = context.client.list_repo_labels().await?;
        if labels.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!("Available labels: {}", labels.join(", "))))
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
                "No triggering issue or PR to label".to_string(),
            );
            return Ok(());
        }
        let mut requested = BTreeSet::new();
        for artifact in artifacts {
            match requested_labels(&artifact.payload) {
                Ok(labels) => requested.extend(labels),
                Err(message) => {
                    ledger.record(self.capability(), Some(&artifact.file_name), message)
                }
            }
        }
        if requested.is_empty() {
            return Ok(());
        }
        let existing: BTreeSet<String> = context.client.list_repo_labels().await?.into_iter().collect();
        for label in requested {
            if !existing.contains(&label) {
                ledger.record(
                    self.capability(),
                    None,
                    format!("Label '{label}' does not exist in repository"),
                );
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
        let mut merged = batch_union(artifacts);
        merged.extend(context.client.subject_labels(subject).await?);
        let labels: Vec<String> = merged.into_iter().collect();
        if context.client.set_labels(subject, &labels).await.is_err() {
            ledger.record(
                self.capability(),
                None,
                format!("Failed to apply labels to #{subject}"),
            );
        }
        Ok(())
    }
}
