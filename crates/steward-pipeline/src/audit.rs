use anyhow::Result;
use steward_core::agent_definition::AgentDefinition;
use steward_core::audit::{AuditRecord, RunMetrics, RunStatus, StageResults};
use steward_core::ledger::ErrorLedger;
use steward_core::platform::{NewIssue, PlatformClient};
use steward_core::run_context::RunContext;

#[derive(Debug, Clone, Default)]
/// Failure-ticket settings. Disabled by default; labels and assignees are
/// applied to the tracking issue when one is opened.
pub struct TicketConfig {
    pub enabled: bool,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
}

/// Always-run finalizer. Produces the run's audit record exactly once,
/// posts the error report back on the triggering subject when one exists,
/// and on failure opens at most one tracking ticket. A ticket-creation
/// failure is logged and never retried or escalated.
pub struct AuditAggregator;

impl AuditAggregator {
    pub async fn finalize(
        run: &RunContext,
        definition: &AgentDefinition,
        stages: StageResults,
        errors: ErrorLedger,
        metrics: RunMetrics,
        ticket: &TicketConfig,
        client: &dyn PlatformClient,
    ) -> Result<AuditRecord> {
        let status = AuditRecord::compute_status(&stages, &errors);
        let mut record = AuditRecord {
            agent_name: definition.name.clone(),
            run_id: run.run_id.clone(),
            stages,
            errors,
            metrics,
            status,
            ticket_ref: None,
        };

        if !record.errors.is_empty() {
            if let Some(subject) = run.subject() {
                let comment = format!(
                    "## Agent run errors\n\n{}\n\nRun: `{}`",
                    record.errors.render_markdown(),
                    run.run_id
                );
                if let Err(error) = client.create_comment(subject, &comment).await {
                    tracing::warn!(%error, subject, "failed to post error report comment");
                }
            }
        }

        if record.status == RunStatus::Failed && ticket.enabled {
            let issue = NewIssue {
                title: format!("Agent run failed: {} ({})", definition.name, run.run_id),
                body: record.render_report(),
                labels: ticket.labels.clone(),
                assignees: ticket.assignees.clone(),
            };
            match client.create_issue(&issue).await {
                Ok(number) => record.ticket_ref = Some(number),
                Err(error) => {
                    tracing::warn!(%error, "failed to create failure tracking ticket");
                }
            }
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use steward_core::agent_definition::AgentDefinition;
    use steward_core::audit::{RunMetrics, RunStatus, StageResult, StageResults};
    use steward_core::capability::Capability;
    use steward_core::ledger::ErrorLedger;
    use steward_core::run_context::{EventKind, RepoRef, RunContext};
    use steward_core::testing::{InMemoryPlatform, PlatformState};

    use super::{AuditAggregator, TicketConfig};

    fn run_context(event: EventKind) -> RunContext {
        RunContext {
            repo: RepoRef::parse("octo/steward").expect("repo"),
            event,
            subject_number: Some(11),
            actor: "octocat".to_string(),
            run_id: "run-3".to_string(),
        }
    }

    fn all_success() -> StageResults {
        StageResults {
            gate: StageResult::Success,
            context: StageResult::Success,
            execution: StageResult::Success,
            outputs: StageResult::Success,
        }
    }

    #[tokio::test]
    async fn functional_errors_are_posted_back_on_the_subject() {
        let platform = InMemoryPlatform::default();
        let mut errors = ErrorLedger::default();
        errors.record(Capability::MergePr, None, "PR #9 is not open (state: closed)".into());
        let record = AuditAggregator::finalize(
            &run_context(EventKind::PullRequest),
            &AgentDefinition::default(),
            all_success(),
            errors,
            RunMetrics::default(),
            &TicketConfig::default(),
            &platform,
        )
        .await
        .expect("finalize");
        assert_eq!(record.status, RunStatus::Failed);
        let state = platform.state.lock().expect("state");
        assert_eq!(state.comments.len(), 1);
        assert_eq!(state.comments[0].0, 11);
        assert!(state.comments[0].1.contains("PR #9 is not open"));
    }

    #[tokio::test]
    async fn functional_failure_with_ticketing_opens_exactly_one_issue() {
        let platform = InMemoryPlatform::default();
        let mut stages = all_success();
        stages.gate = StageResult::Failure;
        let ticket = TicketConfig {
            enabled: true,
            labels: vec!["agent-failure".to_string()],
            assignees: vec![],
        };
        let record = AuditAggregator::finalize(
            &run_context(EventKind::Schedule),
            &AgentDefinition {
                name: "nightly-bot".to_string(),
                ..AgentDefinition::default()
            },
            stages,
            ErrorLedger::default(),
            RunMetrics::default(),
            &ticket,
            &platform,
        )
        .await
        .expect("finalize");
        assert_eq!(record.status, RunStatus::Failed);
        let state = platform.state.lock().expect("state");
        assert_eq!(state.created_issues.len(), 1);
        assert!(state.created_issues[0].title.contains("nightly-bot"));
        assert_eq!(state.created_issues[0].labels, vec!["agent-failure".to_string()]);
        assert_eq!(record.ticket_ref, Some(101));
    }

    #[tokio::test]
    async fn regression_ticket_creation_failure_is_swallowed() {
        let mut state = PlatformState::default();
        state.failing_operations.insert("create_issue".to_string());
        let platform = InMemoryPlatform::new(state);
        let mut stages = all_success();
        stages.execution = StageResult::Failure;
        let ticket = TicketConfig {
            enabled: true,
            ..TicketConfig::default()
        };
        let record = AuditAggregator::finalize(
            &run_context(EventKind::Manual),
            &AgentDefinition::default(),
            stages,
            ErrorLedger::default(),
            RunMetrics::default(),
            &ticket,
            &platform,
        )
        .await
        .expect("finalize");
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.ticket_ref, None);
    }

    #[tokio::test]
    async fn unit_success_run_posts_nothing() {
        let platform = InMemoryPlatform::default();
        let record = AuditAggregator::finalize(
            &run_context(EventKind::Issue),
            &AgentDefinition::default(),
            all_success(),
            ErrorLedger::default(),
            RunMetrics::default(),
            &TicketConfig {
                enabled: true,
                ..TicketConfig::default()
            },
            &platform,
        )
        .await
        .expect("finalize");
        assert_eq!(record.status, RunStatus::Success);
        let state = platform.state.lock().expect("state");
        assert!(state.comments.is_empty());
        assert!(state.created_issues.is_empty());
    }
}
