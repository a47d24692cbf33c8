use anyhow::Result;
use async_trait::async_trait;
use steward_core::artifact::OutputArtifact;
use steward_core::capability::{Capability, CapabilityConstraint};
use steward_core::ledger::ErrorLedger;

use crate::handler::{HandlerContext, OutputHandler};
use crate::payload::{require_str, require_u64};

/// Converts an issue into a discussion under a named category. The operation
/// is terminal for the issue.
pub struct ConvertToDiscussionHandler;

#[async_trait]
impl OutputHandler for ConvertToDiscussionHandler {
    fn capability(&self) -> Capability {
        Capability::ConvertToDiscussion
    }

    fn file_noun(&self) -> &'static str {
        "conversion"
    }

    fn describe_usage(&self, constraint: &CapabilityConstraint) -> String {
        format!(
            "### convert-to-discussion\n\n\
             Write `convert-to-discussion.json`:\n\n\
             ```json\n{{\"issue_number\": 123, \"category\": \"Q&A\"}}\n```\n\n\
             - category must name an existing discussion category\n\
             - Conversion is terminal: the issue becomes a discussion\n\
             - Maximum conversions: {}",
            constraint.max_label()
        )
    }

    async fn dynamic_context(&self, context: &HandlerContext<'_>) -> Result<Option<String>> {
        let categories = context.client.discussion_categories().await?;
        if categories.is_empty() {
            return Ok(None);
        }
        let names: Vec<String> = categories.into_iter().map(|category| category.name).collect();
        Ok(Some(format!(
            "Available discussion categories: {}",
            names.join(", ")
        )))
    }

    async fn validate(
        &self,
        context: &HandlerContext<'_>,
        artifacts: &[OutputArtifact],
        ledger: &mut ErrorLedger,
    ) -> Result<()> {
        for artifact in artifacts {
            if let Err(message) = require_u64(&artifact.payload, "issue_number") {
                ledger.record(self.capability(), Some(&artifact.file_name), message);
            }
            match require_str(&artifact.payload, "category") {
                Ok(category) if category.trim().is_empty() => ledger.record(
                    self.capability(),
                    Some(&artifact.file_name),
                    "category is required".to_string(),
                ),
                Ok(category) => {
                    let categories = context.client.discussion_categories().await?;
                    if !categories.iter().any(|existing| existing.name == category) {
                        ledger.record(
                            self.capability(),
                            Some(&artifact.file_name),
                            format!("Category '{category}' not found in repository"),
                        );
                    }
                }
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
        let categories = context.client.discussion_categories().await?;
        for artifact in artifacts {
            let Some(number) = artifact.payload.get("issue_number").and_then(serde_json::Value::as_u64)
            else {
                continue;
            };
            let category_name = artifact
                .payload
                .get("category")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            let Some(category) = categories
                .iter()
                .find(|existing| existing.name == category_name)
            else {
                ledger.record(
                    self.capability(),
                    None,
                    format!("Category '{category_name}' not found in repository"),
                );
                continue;
            };
            if context
                .client
                .convert_issue_to_discussion(number, &category.id)
                .await
                .is_err()
            {
                ledger.record(
                    self.capability(),
                    None,
                    format!("Failed to convert issue #{number}"),
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
    use steward_core::platform::DiscussionCategory;
    use steward_core::run_context::{EventKind, RepoRef, RunContext};
    use steward_core::testing::{InMemoryPlatform, PlatformState};

    use super::ConvertToDiscussionHandler;
    use crate::handler::{HandlerContext, OutputHandler};

    fn platform_with_categories() -> InMemoryPlatform {
        let mut state = PlatformState::default();
        state.discussion_categories = vec![
            DiscussionCategory {
                id: "DIC_1".to_string(),
                name: "Q&A".to_string(),
            },
            DiscussionCategory {
                id: "DIC_2".to_string(),
                name: "Ideas".to_string(),
            },
        ];
        InMemoryPlatform::new(state)
    }

    fn context_pieces() -> (AgentDefinition, RunContext) {
        (
            AgentDefinition::default(),
            RunContext {
                repo: RepoRef::parse("octo/steward").expect("repo"),
                event: EventKind::Issue,
                subject_number: Some(6),
                actor: "octocat".to_string(),
                run_id: "run-1".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn functional_validate_requires_known_category() {
        let platform = platform_with_categories();
        let (definition, run) = context_pieces();
        let context = HandlerContext {
            run: &run,
            definition: &definition,
            client: &platform,
        };
        let artifacts = vec![OutputArtifact {
            capability: Capability::ConvertToDiscussion,
            ordinal: None,
            file_name: "convert-to-discussion.json".to_string(),
            payload: json!({ "issue_number": 6, "category": "Announcements" }),
        }];
        let mut ledger = ErrorLedger::default();
        ConvertToDiscussionHandler
            .validate(&context, &artifacts, &mut ledger)
            .await
            .expect("validate");
        assert_eq!(
            ledger.capability_errors(Capability::ConvertToDiscussion)[0].message,
            "Category 'Announcements' not found in repository"
        );
    }

    #[tokio::test]
    async fn functional_commit_resolves_category_id() {
        let platform = platform_with_categories();
        let (definition, run) = context_pieces();
        let context = HandlerContext {
            run: &run,
            definition: &definition,
            client: &platform,
        };
        let artifacts = vec![OutputArtifact {
            capability: Capability::ConvertToDiscussion,
            ordinal: None,
            file_name: "convert-to-discussion.json".to_string(),
            payload: json!({ "issue_number": 6, "category": "Ideas" }),
        }];
        let mut ledger = ErrorLedger::default();
        ConvertToDiscussionHandler
            .commit(&context, &artifacts, &mut ledger)
            .await
            .expect("commit");
        assert!(ledger.is_empty());
        assert_eq!(
            platform.state.lock().expect("state").conversions,
            vec![(6, "DIC_2".to_string())]
        );
    }
}
