use serde::Serialize;

use crate::ledger::ErrorLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `StageResult` values.
pub enum StageResult {
    Success,
    Failure,
    Skipped,
}

impl StageResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
/// Overall run status computed by the audit aggregator.
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
/// Execution metrics reported by the opaque execution stage, when available.
pub struct RunMetrics {
    pub cost_usd: Option<f64>,
    pub duration_ms: Option<u64>,
    pub turns: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
/// Per-stage outcomes in pipeline order.
pub struct StageResults {
    pub gate: StageResult,
    pub context: StageResult,
    pub execution: StageResult,
    pub outputs: StageResult,
}

impl StageResults {
    /// Initial record: nothing has run yet.
    pub fn all_skipped() -> Self {
        Self {
            gate: StageResult::Skipped,
            context: StageResult::Skipped,
            execution: StageResult::Skipped,
            outputs: StageResult::Skipped,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
/// The run's status record, produced exactly once per run.
pub struct AuditRecord {
    pub agent_name: String,
    pub run_id: String,
    pub stages: StageResults,
    pub errors: ErrorLedger,
    pub metrics: RunMetrics,
    pub status: RunStatus,
    pub ticket_ref: Option<u64>,
}

impl AuditRecord {
    /// Overall status: failed when the gate or execution stage did not
    /// succeed, or any error was accumulated.
    pub fn compute_status(stages: &StageResults, errors: &ErrorLedger) -> RunStatus {
        if stages.gate != StageResult::Success
            || stages.execution != StageResult::Success
            || !errors.is_empty()
        {
            RunStatus::Failed
        } else {
            RunStatus::Success
        }
    }

    pub fn render_report(&self) -> String {
        let mut lines = vec![
            format!("# Agent run report: {}", self.agent_name),
            String::new(),
            format!(
                "Run `{}` finished with status `{}`.",
                self.run_id,
                self.status.as_str()
            ),
            String::new(),
            format!(
                "Stages: gate={} context={} execution={} outputs={}",
                self.stages.gate.as_str(),
                self.stages.context.as_str(),
                self.stages.execution.as_str(),
                self.stages.outputs.as_str()
            ),
        ];
        if self.metrics.cost_usd.is_some()
            || self.metrics.duration_ms.is_some()
            || self.metrics.turns.is_some()
        {
            lines.push(format!(
                "Metrics: cost_usd={} duration_ms={} turns={}",
                self.metrics
                    .cost_usd
                    .map(|value| format!("{value:.4}"))
                    .unwrap_or_else(|| "unavailable".to_string()),
                self.metrics
                    .duration_ms
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| "unavailable".to_string()),
                self.metrics
                    .turns
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| "unavailable".to_string()),
            ));
        }
        if !self.errors.is_empty() {
            lines.push(String::new());
            lines.push("## Errors".to_string());
            lines.push(String::new());
            lines.push(self.errors.render_markdown());
        }
        if let Some(ticket) = self.ticket_ref {
            lines.push(String::new());
            lines.push(format!("Tracking ticket: #{ticket}"));
        }
        lines.join("\n")
    }

    pub fn render_report_json(&self) -> String {
        serde_json::json!({
            "agent": self.agent_name,
            "run_id": self.run_id,
            "status": self.status.as_str(),
            "stages": {
                "gate": self.stages.gate.as_str(),
                "context": self.stages.context.as_str(),
                "execution": self.stages.execution.as_str(),
                "outputs": self.stages.outputs.as_str(),
            },
            "error_count": self.errors.error_count(),
            "errors": self.errors.iter().map(|error| {
                serde_json::json!({
                    "capability": error.capability.as_str(),
                    "artifact_ref": error.artifact_ref,
                    "message": error.message,
                })
            }).collect::<Vec<_>>(),
            "metrics": {
                "cost_usd": self.metrics.cost_usd,
                "duration_ms": self.metrics.duration_ms,
                "turns": self.metrics.turns,
            },
            "ticket_ref": self.ticket_ref,
        })
        .to_string()
    }
}
