use anyhow::Result;
use async_trait::async_trait;
use steward_core::artifact::OutputArtifact;
use steward_core::capability::{Capability, CapabilityConstraint};
use steward_core::ledger::ErrorLedger;

use crate::handler::{HandlerContext, OutputHandler};

/// File edits happen directly in the execution sandbox, which enforces the
/// allowed-path glob list; this handler only briefs the execution stage and
/// never validates or commits artifacts itself.
pub struct UpdateFileHandler;

#[async_trait]
impl OutputHandler for UpdateFileHandler {
    fn capability(&self) -> Capability {
        Capability::UpdateFile
    }

    fn file_noun(&self) -> &'static str {
        "file update"
    }

    fn describe_usage(&self, constraint: &CapabilityConstraint) -> String {
        let mut contract = String::from(
            "### update-file\n\n\
             Edit files directly in the workspace; changes are committed by the sandbox.\n\n\
             - Only paths matching the allowed-path globs may be modified\n",
        );
        if constraint.sign {
            contract.push_str("- Commits must be signed (configured)\n");
        }
        contract.push_str(&format!("- Maximum file updates: {}", constraint.max_label()));
        contract
    }

    async fn dynamic_context(&self, context: &HandlerContext<'_>) -> Result<Option<String>> {
        if context.definition.allowed_paths.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!(
            "Editable paths: {}",
            context.definition.allowed_paths.join(", ")
        )))
    }

    async fn validate(
        &self,
        _context: &HandlerContext<'_>,
        _artifacts: &[OutputArtifact],
        _ledger: &mut ErrorLedger,
    ) -> Result<()> {
        Ok(())
    }

    async fn commit(
        &self,
        _context: &HandlerContext<'_>,
        _artifacts: &[OutputArtifact],
        _ledger: &mut ErrorLedger,
    ) -> Result<()> {
        Ok(())
    }
}
