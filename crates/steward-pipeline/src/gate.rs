use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use steward_core::agent_definition::AgentDefinition;
use steward_core::platform::PlatformClient;
use steward_core::run_context::RunContext;

#[derive(Debug, Clone, Default)]
/// Agent authentication material available to the run. Either mechanism
/// satisfies the credential check.
pub struct CredentialConfig {
    pub api_key: Option<String>,
    pub access_token: Option<String>,
}

impl CredentialConfig {
    pub fn has_agent_credentials(&self) -> bool {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(|raw| !raw.trim().is_empty())
                .unwrap_or(false)
        };
        present(&self.api_key) || present(&self.access_token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub should_run: bool,
    pub reasons: Vec<String>,
}

/// Pre-flight eligibility check. All four checks run unconditionally, each
/// appending a reason on failure; the run proceeds only with zero reasons.
/// Read-only: the gate never mutates platform state.
pub struct AuthorizationGate;

impl AuthorizationGate {
    pub async fn evaluate(
        run: &RunContext,
        definition: &AgentDefinition,
        credentials: &CredentialConfig,
        client: &dyn PlatformClient,
        now: DateTime<Utc>,
    ) -> Result<GateDecision> {
        let mut reasons = Vec::new();

        if !credentials.has_agent_credentials() {
            reasons.push("No agent credentials configured".to_string());
        }

        if !Self::actor_authorized(run, definition, client).await? {
            reasons.push("User not authorized".to_string());
        }

        if let Some(missing) = Self::trigger_label_missing(run, definition, client).await? {
            reasons.push(missing);
        }

        if let Some(rate_limited) = Self::rate_limited(definition, client, now).await? {
            reasons.push(rate_limited);
        }

        Ok(GateDecision {
            should_run: reasons.is_empty(),
            reasons,
        })
    }

    /// Any one of: write access, org membership, explicit allow-list, or an
    /// allowed team.
    async fn actor_authorized(
        run: &RunContext,
        definition: &AgentDefinition,
        client: &dyn PlatformClient,
    ) -> Result<bool> {
        if client.permission_level(&run.actor).await?.can_write() {
            return Ok(true);
        }
        if client.is_org_member(&run.actor).await? {
            return Ok(true);
        }
        if definition
            .authorization
            .allowed_users
            .iter()
            .any(|user| user == &run.actor)
        {
            return Ok(true);
        }
        for team in &definition.authorization.allowed_teams {
            if client.is_team_member(team, &run.actor).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Vacuously satisfied when no trigger labels are configured or the event
    /// carries no issue/PR subject.
    async fn trigger_label_missing(
        run: &RunContext,
        definition: &AgentDefinition,
        client: &dyn PlatformClient,
    ) -> Result<Option<String>> {
        let trigger_labels = &definition.authorization.trigger_labels;
        if trigger_labels.is_empty() {
            return Ok(None);
        }
        let Some(subject) = run.subject() else {
            return Ok(None);
        };
        let current = client.subject_labels(subject).await?;
        if current
            .iter()
            .any(|label| trigger_labels.iter().any(|trigger| trigger == label))
        {
            return Ok(None);
        }
        Ok(Some(format!(
            "Trigger label not present (requires one of: {})",
            trigger_labels.join(", ")
        )))
    }

    /// First run (no prior successful runs) always passes.
    async fn rate_limited(
        definition: &AgentDefinition,
        client: &dyn PlatformClient,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        let minutes = definition.authorization.rate_limit_minutes();
        let window = Duration::minutes(minutes as i64);
        let recent = client.recent_successful_runs().await?;
        for started_at in recent {
            if now.signed_duration_since(started_at) < window {
                return Ok(Some(format!(
                    "Rate limited: a successful run completed within the last {minutes} minutes"
                )));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use steward_core::agent_definition::{AgentDefinition, AuthorizationRules};
    use steward_core::platform::PermissionLevel;
    use steward_core::run_context::{EventKind, RepoRef, RunContext};
    use steward_core::testing::{InMemoryPlatform, PlatformState};

    use super::{AuthorizationGate, CredentialConfig};

    fn run_context() -> RunContext {
        RunContext {
            repo: RepoRef::parse("octo/steward").expect("repo"),
            event: EventKind::Issue,
            subject_number: Some(10),
            actor: "octocat".to_string(),
            run_id: "run-1".to_string(),
        }
    }

    fn credentials() -> CredentialConfig {
        CredentialConfig {
            api_key: Some("key".to_string()),
            access_token: None,
        }
    }

    fn writer_platform() -> InMemoryPlatform {
        let mut state = PlatformState::default();
        state
            .permissions
            .insert("octocat".to_string(), PermissionLevel::Write);
        InMemoryPlatform::new(state)
    }

    #[tokio::test]
    async fn functional_authorized_writer_passes_all_checks() {
        let platform = writer_platform();
        let decision = AuthorizationGate::evaluate(
            &run_context(),
            &AgentDefinition::default(),
            &credentials(),
            &platform,
            Utc::now(),
        )
        .await
        .expect("gate");
        assert!(decision.should_run);
        assert!(decision.reasons.is_empty());
    }

    #[tokio::test]
    async fn functional_unauthorized_actor_collects_reason() {
        let platform = InMemoryPlatform::default();
        let decision = AuthorizationGate::evaluate(
            &run_context(),
            &AgentDefinition::default(),
            &credentials(),
            &platform,
            Utc::now(),
        )
        .await
        .expect("gate");
        assert!(!decision.should_run);
        assert_eq!(decision.reasons, vec!["User not authorized".to_string()]);
    }

    #[tokio::test]
    async fn unit_checks_are_not_short_circuited() {
        let platform = InMemoryPlatform::default();
        let decision = AuthorizationGate::evaluate(
            &run_context(),
            &AgentDefinition::default(),
            &CredentialConfig::default(),
            &platform,
            Utc::now(),
        )
        .await
        .expect("gate");
        assert_eq!(decision.reasons.len(), 2);
        assert_eq!(decision.reasons[0], "No agent credentials configured");
        assert_eq!(decision.reasons[1], "User not authorized");
    }

    #[tokio::test]
    async fn functional_allow_list_and_team_membership_authorize() {
        let mut state = PlatformState::default();
        state
            .team_members
            .insert(("triagers".to_string(), "octocat".to_string()));
        let platform = InMemoryPlatform::new(state);
        let definition = AgentDefinition {
            authorization: AuthorizationRules {
                allowed_teams: vec!["triagers".to_string()],
                ..AuthorizationRules::default()
            },
            ..AgentDefinition::default()
        };
        let decision = AuthorizationGate::evaluate(
            &run_context(),
            &definition,
            &credentials(),
            &platform,
            Utc::now(),
        )
        .await
        .expect("gate");
        assert!(decision.should_run);

        let platform = InMemoryPlatform::default();
        let definition = AgentDefinition {
            authorization: AuthorizationRules {
                allowed_users: vec!["octocat".to_string()],
                ..AuthorizationRules::default()
            },
            ..AgentDefinition::default()
        };
        let decision = AuthorizationGate::evaluate(
            &run_context(),
            &definition,
            &credentials(),
            &platform,
            Utc::now(),
        )
        .await
        .expect("gate");
        assert!(decision.should_run);
    }

    #[tokio::test]
    async fn functional_trigger_labels_gate_subject_events_only() {
        let mut state = PlatformState::default();
        state
            .permissions
            .insert("octocat".to_string(), PermissionLevel::Write);
        state.subject_labels.insert(10, vec!["docs".to_string()]);
        let platform = InMemoryPlatform::new(state);
        let definition = AgentDefinition {
            authorization: AuthorizationRules {
                trigger_labels: vec!["needs-triage".to_string()],
                ..AuthorizationRules::default()
            },
            ..AgentDefinition::default()
        };
        let decision = AuthorizationGate::evaluate(
            &run_context(),
            &definition,
            &credentials(),
            &platform,
            Utc::now(),
        )
        .await
        .expect("gate");
        assert!(!decision.should_run);
        assert!(decision.reasons[0].contains("needs-triage"));

        // Schedule events carry no subject, so label gating is vacuous.
        let schedule = RunContext {
            event: EventKind::Schedule,
            ..run_context()
        };
        let platform = writer_platform();
        let decision = AuthorizationGate::evaluate(
            &schedule,
            &definition,
            &credentials(),
            &platform,
            Utc::now(),
        )
        .await
        .expect("gate");
        assert!(decision.should_run);
    }

    #[tokio::test]
    async fn functional_rate_limit_boundaries() {
        let now = Utc::now();
        let mut state = PlatformState::default();
        state
            .permissions
            .insert("octocat".to_string(), PermissionLevel::Write);
        state.recent_runs = vec![now - Duration::minutes(2)];
        let platform = InMemoryPlatform::new(state);
        let decision = AuthorizationGate::evaluate(
            &run_context(),
            &AgentDefinition::default(),
            &credentials(),
            &platform,
            now,
        )
        .await
        .expect("gate");
        assert!(!decision.should_run);
        assert!(decision.reasons[0].starts_with("Rate limited"));

        let mut state = PlatformState::default();
        state
            .permissions
            .insert("octocat".to_string(), PermissionLevel::Write);
        state.recent_runs = vec![now - Duration::minutes(6)];
        let platform = InMemoryPlatform::new(state);
        let decision = AuthorizationGate::evaluate(
            &run_context(),
            &AgentDefinition::default(),
            &credentials(),
            &platform,
            now,
        )
        .await
        .expect("gate");
        assert!(decision.should_run);
    }

    #[tokio::test]
    async fn regression_first_run_always_passes_rate_limit() {
        let platform = writer_platform();
        let decision = AuthorizationGate::evaluate(
            &run_context(),
            &AgentDefinition::default(),
            &credentials(),
            &platform,
            Utc::now(),
        )
        .await
        .expect("gate");
        assert!(decision.should_run);
    }
}
