use std::future::Future;

use anyhow::Result;
use chrono::Utc;
use steward_core::agent_definition::AgentDefinition;
use steward_core::audit::{AuditRecord, RunMetrics, StageResult, StageResults};
use steward_core::ledger::ErrorLedger;
use steward_core::platform::PlatformClient;
use steward_core::run_context::RunContext;
use steward_outputs::registry::CapabilityRegistry;

use crate::audit::{AuditAggregator, TicketConfig};
use crate::batch::BatchValidator;
use crate::collector::ArtifactCollector;
use crate::context::ContextAssembler;
use crate::gate::{AuthorizationGate, CredentialConfig, GateDecision};

#[derive(Debug, Clone, Default)]
/// What the opaque execution stage reports back.
pub struct ExecutionOutcome {
    pub metrics: RunMetrics,
}

#[derive(Debug)]
pub struct PipelineReport {
    pub gate: GateDecision,
    pub record: AuditRecord,
    /// Artifacts handed to phase 2 across all capabilities.
    pub committed: usize,
}

/// Strict dependency-ordered stage sequence: gate, context assembly, the
/// external execution stage, output application, and the audit finalizer.
/// The audit record is produced exactly once per run no matter which stage
/// failed; stage errors are captured, never propagated past the finalizer.
pub struct Pipeline<'a> {
    pub registry: &'a CapabilityRegistry,
    pub collector: &'a ArtifactCollector,
    pub credentials: CredentialConfig,
    pub ticket: TicketConfig,
}

impl<'a> Pipeline<'a> {
    pub async fn run<F, Fut>(
        &self,
        run: &RunContext,
        definition: &AgentDefinition,
        client: &dyn PlatformClient,
        collected_input: Option<&str>,
        execute: F,
    ) -> Result<PipelineReport>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<ExecutionOutcome>>,
    {
        let mut stages = StageResults::all_skipped();
        let mut ledger = ErrorLedger::default();
        let mut metrics = RunMetrics::default();

        let gate = match AuthorizationGate::evaluate(
            run,
            definition,
            &self.credentials,
            client,
            Utc::now(),
        )
        .await
        {
            Ok(decision) => {
                stages.gate = if decision.should_run {
                    StageResult::Success
                } else {
                    StageResult::Failure
                };
                decision
            }
            Err(error) => {
                tracing::warn!(%error, "authorization gate evaluation failed");
                stages.gate = StageResult::Failure;
                GateDecision {
                    should_run: false,
                    reasons: vec![format!("Gate evaluation failed: {error:#}")],
                }
            }
        };

        if stages.gate == StageResult::Success {
            match ContextAssembler::assemble(run, definition, self.registry, client, collected_input)
                .await
            {
                Ok(bundle) => {
                    stages.context = StageResult::Success;
                    match execute(bundle).await {
                        Ok(outcome) => {
                            stages.execution = StageResult::Success;
                            metrics = outcome.metrics;
                        }
                        Err(error) => {
                            tracing::warn!(%error, "execution stage failed");
                            stages.execution = StageResult::Failure;
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, "context assembly failed");
                    stages.context = StageResult::Failure;
                }
            }
        } else {
            for reason in &gate.reasons {
                tracing::info!(%reason, "run blocked by authorization gate");
            }
        }

        let mut committed = 0;
        if stages.execution == StageResult::Success {
            let engine = BatchValidator::new(self.registry, self.collector);
            match engine.apply_all(run, definition, client).await {
                Ok(outcome) => {
                    stages.outputs = if outcome.ledger.is_empty() {
                        StageResult::Success
                    } else {
                        StageResult::Failure
                    };
                    committed = outcome.committed;
                    ledger.merge(outcome.ledger);
                }
                Err(error) => {
                    tracing::warn!(%error, "output application failed");
                    stages.outputs = StageResult::Failure;
                }
            }
        }

        let record = AuditAggregator::finalize(
            run,
            definition,
            stages,
            ledger,
            metrics,
            &self.ticket,
            client,
        )
        .await?;

        Ok(PipelineReport {
            gate,
            record,
            committed,
        })
    }
}
