use anyhow::Result;
use async_trait::async_trait;
use steward_core::agent_definition::AgentDefinition;
use steward_core::artifact::OutputArtifact;
use steward_core::capability::{Capability, CapabilityConstraint};
use steward_core::ledger::ErrorLedger;
use steward_core::platform::PlatformClient;
use steward_core::run_context::RunContext;

/// Shared read-only view handed to every handler call.
pub struct HandlerContext<'a> {
    pub run: &'a RunContext,
    pub definition: &'a AgentDefinition,
    pub client: &'a dyn PlatformClient,
}

/// One capability's contract: usage briefing, optional dynamic context,
/// batch validation rules, and the commit action.
///
/// `validate` runs over the full parsed batch and records rule violations in
/// the ledger; the engine invokes `commit` only when the batch produced zero
/// validation errors. `commit` walks artifacts sequentially in discovery
/// order and records per-artifact call failures without aborting the loop.
#[async_trait]
pub trait OutputHandler: Send + Sync {
    fn capability(&self) -> Capability;

    /// Noun used in the batch-size error, e.g. "comment" in
    /// "Too many comment files".
    fn file_noun(&self) -> &'static str;

    /// Operation contract shown to the execution stage.
    fn describe_usage(&self, constraint: &CapabilityConstraint) -> String;

    /// Live context fragment (available labels, categories, ...). `None`
    /// when the capability contributes nothing.
    async fn dynamic_context(&self, _context: &HandlerContext<'_>) -> Result<Option<String>> {
        Ok(None)
    }

    async fn validate(
        &self,
        context: &HandlerContext<'_>,
        artifacts: &[OutputArtifact],
        ledger: &mut ErrorLedger,
    ) -> Result<()>;

    async fn commit(
        &self,
        context: &HandlerContext<'_>,
        artifacts: &[OutputArtifact],
        ledger: &mut ErrorLedger,
    ) -> Result<()>;
}
