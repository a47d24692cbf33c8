use anyhow::Result;
use steward_core::agent_definition::AgentDefinition;
use steward_core::artifact::OutputArtifact;
use steward_core::capability::Capability;
use steward_core::ledger::ErrorLedger;
use steward_core::platform::PlatformClient;
use steward_core::run_context::RunContext;
use steward_outputs::handler::HandlerContext;
use steward_outputs::registry::CapabilityRegistry;

use crate::collector::ArtifactCollector;

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub ledger: ErrorLedger,
    /// Artifacts handed to phase 2 across all capabilities.
    pub committed: usize,
}

/// The two-phase validate-then-commit engine. Each capability's batch is
/// processed independently: a failure in one never blocks another. Within a
/// batch, phase 2 runs only when phase 1 recorded zero errors, and commits
/// sequentially in discovery order because later artifacts may observe state
/// mutated by earlier ones.
pub struct BatchValidator<'a> {
    registry: &'a CapabilityRegistry,
    collector: &'a ArtifactCollector,
}

impl<'a> BatchValidator<'a> {
    pub fn new(registry: &'a CapabilityRegistry, collector: &'a ArtifactCollector) -> Self {
        Self {
            registry,
            collector,
        }
    }

    pub async fn apply_all(
        &self,
        run: &RunContext,
        definition: &AgentDefinition,
        client: &dyn PlatformClient,
    ) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        let handler_context = HandlerContext {
            run,
            definition,
            client,
        };
        for entry in &definition.capabilities {
            let Some(handler) = self.registry.resolve(entry.capability)? else {
                continue;
            };
            let committed = self
                .apply_capability(
                    &handler_context,
                    entry.capability,
                    handler,
                    &entry.constraint,
                    &mut outcome.ledger,
                )
                .await;
            outcome.committed += committed;
        }
        Ok(outcome)
    }

    async fn apply_capability(
        &self,
        handler_context: &HandlerContext<'_>,
        capability: Capability,
        handler: &dyn steward_outputs::handler::OutputHandler,
        constraint: &steward_core::capability::CapabilityConstraint,
        ledger: &mut ErrorLedger,
    ) -> usize {
        let files = match self.collector.collect(capability) {
            Ok(files) => files,
            Err(error) => {
                ledger.record(capability, None, format!("{error:#}"));
                return 0;
            }
        };
        if files.is_empty() {
            return 0;
        }

        // Cardinality first: exceeding the maximum records exactly one error
        // and skips every per-file check.
        if let Some(max) = constraint.max {
            if files.len() > max as usize {
                ledger.record(
                    capability,
                    None,
                    format!(
                        "Too many {} files ({}). Maximum allowed: {}",
                        handler.file_noun(),
                        files.len(),
                        max
                    ),
                );
                return 0;
            }
        }

        let mut artifacts = Vec::with_capacity(files.len());
        for file in files {
            let raw = match self.collector.read_payload(&file.file_name) {
                Ok(raw) => raw,
                Err(error) => {
                    ledger.record(capability, Some(&file.file_name), format!("{error:#}"));
                    continue;
                }
            };
            match serde_json::from_str(&raw) {
                Ok(payload) => artifacts.push(OutputArtifact {
                    capability,
                    ordinal: file.ordinal,
                    file_name: file.file_name,
                    payload,
                }),
                Err(_) => {
                    ledger.record(
                        capability,
                        Some(&file.file_name),
                        "Invalid JSON format".to_string(),
                    );
                }
            }
        }

        if let Err(error) = handler.validate(handler_context, &artifacts, ledger).await {
            ledger.record(capability, None, format!("Validation failed: {error:#}"));
        }

        // The phase1 -> phase2 gate is the atomicity boundary.
        if !ledger.capability_errors(capability).is_empty() {
            return 0;
        }
        if let Err(error) = handler.commit(handler_context, &artifacts, ledger).await {
            ledger.record(capability, None, format!("Commit failed: {error:#}"));
        }
        artifacts.len()
    }
}

#[cfg(test)]
mod tests {
    use steward_core::agent_definition::AgentDefinition;
    use steward_core::capability::Capability;
    use steward_core::platform::PermissionLevel;
    use steward_core::run_context::{EventKind, RepoRef, RunContext};
    use steward_core::testing::{InMemoryPlatform, PlatformState};
    use steward_outputs::registry::CapabilityRegistry;
    use tempfile::TempDir;

    use super::BatchValidator;
    use crate::collector::ArtifactCollector;

    fn run_context() -> RunContext {
        RunContext {
            repo: RepoRef::parse("octo/steward").expect("repo"),
            event: EventKind::Issue,
            subject_number: Some(5),
            actor: "octocat".to_string(),
            run_id: "run-1".to_string(),
        }
    }

    fn definition(raw: &str) -> AgentDefinition {
        serde_json::from_str(raw).expect("definition")
    }

    fn write(dir: &TempDir, name: &str, contents: &str) {
        std::fs::write(dir.path().join(name), contents).expect("write artifact");
    }

    fn platform() -> InMemoryPlatform {
        let mut state = PlatformState::default();
        state
            .permissions
            .insert("octocat".to_string(), PermissionLevel::Write);
        state.repo_labels.extend(["a".to_string(), "b".to_string(), "c".to_string()]);
        state.subject_labels.insert(5, vec!["a".to_string(), "b".to_string()]);
        InMemoryPlatform::new(state)
    }

    #[tokio::test]
    async fn functional_count_over_max_yields_single_error_and_zero_commits() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(&dir, "add-comment.json", r#"{"body":"one"}"#);
        write(&dir, "add-comment-2.json", r#"{"body":"two"}"#);
        let platform = platform();
        let registry = CapabilityRegistry::standard();
        let collector = ArtifactCollector::new(dir.path());
        let engine = BatchValidator::new(&registry, &collector);
        let definition = definition(
            r#"{"name":"bot","capabilities":[{"capability":"add-comment","constraint":{"max":1}}]}"#,
        );
        let outcome = engine
            .apply_all(&run_context(), &definition, &platform)
            .await
            .expect("apply");
        let errors = outcome.ledger.capability_errors(Capability::AddComment);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            "Too many comment files (2). Maximum allowed: 1"
        );
        assert_eq!(outcome.committed, 0);
        assert!(platform.state.lock().expect("state").comments.is_empty());
    }

    #[tokio::test]
    async fn functional_phase_one_failure_blocks_every_commit_in_batch() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(&dir, "add-comment.json", r#"{"body":"fine"}"#);
        write(&dir, "add-comment-2.json", r#"{"body":""}"#);
        let platform = platform();
        let registry = CapabilityRegistry::standard();
        let collector = ArtifactCollector::new(dir.path());
        let engine = BatchValidator::new(&registry, &collector);
        let definition =
            definition(r#"{"name":"bot","capabilities":[{"capability":"add-comment"}]}"#);
        let outcome = engine
            .apply_all(&run_context(), &definition, &platform)
            .await
            .expect("apply");
        assert_eq!(outcome.committed, 0);
        assert!(!outcome.ledger.is_empty());
        assert!(platform.state.lock().expect("state").comments.is_empty());
    }

    #[tokio::test]
    async fn functional_clean_batch_commits_every_artifact() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(&dir, "add-comment.json", r#"{"body":"one"}"#);
        write(&dir, "add-comment-2.json", r#"{"body":"two"}"#);
        write(&dir, "add-comment-3.json", r#"{"body":"three"}"#);
        let platform = platform();
        let registry = CapabilityRegistry::standard();
        let collector = ArtifactCollector::new(dir.path());
        let engine = BatchValidator::new(&registry, &collector);
        let definition =
            definition(r#"{"name":"bot","capabilities":[{"capability":"add-comment"}]}"#);
        let outcome = engine
            .apply_all(&run_context(), &definition, &platform)
            .await
            .expect("apply");
        assert!(outcome.ledger.is_empty());
        assert_eq!(outcome.committed, 3);
        assert_eq!(platform.state.lock().expect("state").comments.len(), 3);
    }

    #[tokio::test]
    async fn functional_capabilities_are_mutually_isolated() {
        let dir = tempfile::tempdir().expect("tempdir");
        // merge-pr batch fails validation; add-label batch is clean.
        write(&dir, "merge-pr.json", r#"{"pr_number":9}"#);
        write(&dir, "add-label.json", r#"{"labels":["c"]}"#);
        let mut state = PlatformState::default();
        state.repo_labels.extend(["a".to_string(), "b".to_string(), "c".to_string()]);
        state.subject_labels.insert(5, vec!["a".to_string(), "b".to_string()]);
        state.pull_request_states.insert(9, "closed".to_string());
        let platform = InMemoryPlatform::new(state);
        let registry = CapabilityRegistry::standard();
        let collector = ArtifactCollector::new(dir.path());
        let engine = BatchValidator::new(&registry, &collector);
        let definition = definition(
            r#"{"name":"bot","capabilities":[{"capability":"merge-pr"},{"capability":"add-label"}]}"#,
        );
        let outcome = engine
            .apply_all(&run_context(), &definition, &platform)
            .await
            .expect("apply");
        assert_eq!(
            outcome.ledger.capability_errors(Capability::MergePr)[0].message,
            "PR #9 is not open (state: closed)"
        );
        assert!(outcome
            .ledger
            .capability_errors(Capability::AddLabel)
            .is_empty());
        let state = platform.state.lock().expect("state");
        assert!(state.merged_pull_requests.is_empty());
        // Union of current {a,b} and requested {c}.
        assert_eq!(
            state.label_puts,
            vec![(5, vec!["a".to_string(), "b".to_string(), "c".to_string()])]
        );
    }

    #[tokio::test]
    async fn regression_malformed_json_marks_batch_failed() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(&dir, "add-comment.json", "{not json");
        write(&dir, "add-comment-2.json", r#"{"body":"ok"}"#);
        let platform = platform();
        let registry = CapabilityRegistry::standard();
        let collector = ArtifactCollector::new(dir.path());
        let engine = BatchValidator::new(&registry, &collector);
        let definition =
            definition(r#"{"name":"bot","capabilities":[{"capability":"add-comment"}]}"#);
        let outcome = engine
            .apply_all(&run_context(), &definition, &platform)
            .await
            .expect("apply");
        let errors = outcome.ledger.capability_errors(Capability::AddComment);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Invalid JSON format");
        assert_eq!(errors[0].artifact_ref.as_deref(), Some("add-comment.json"));
        assert!(platform.state.lock().expect("state").comments.is_empty());
    }

    #[tokio::test]
    async fn regression_commit_failure_is_recorded_but_does_not_roll_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(&dir, "reopen-issue.json", r#"{"issue_number":1}"#);
        write(&dir, "reopen-issue-2.json", r#"{"issue_number":2}"#);
        let mut state = PlatformState::default();
        state.failing_operations.insert("reopen_issue".to_string());
        let platform = InMemoryPlatform::new(state);
        let registry = CapabilityRegistry::standard();
        let collector = ArtifactCollector::new(dir.path());
        let engine = BatchValidator::new(&registry, &collector);
        let definition =
            definition(r#"{"name":"bot","capabilities":[{"capability":"reopen-issue"}]}"#);
        let outcome = engine
            .apply_all(&run_context(), &definition, &platform)
            .await
            .expect("apply");
        // Both artifacts entered phase 2; both failures were recorded and the
        // loop continued to the second artifact.
        assert_eq!(outcome.committed, 2);
        let errors = outcome.ledger.capability_errors(Capability::ReopenIssue);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "Failed to reopen issue #1");
        assert_eq!(errors[1].message, "Failed to reopen issue #2");
    }
}
