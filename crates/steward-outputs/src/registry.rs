use std::collections::BTreeMap;

use anyhow::{bail, Result};
use steward_core::capability::Capability;

use crate::handler::OutputHandler;
use crate::handlers::{
    add_comment::AddCommentHandler, add_label::AddLabelHandler, add_reaction::AddReactionHandler,
    approve_pr::ApprovePrHandler, close_issue::CloseIssueHandler,
    convert_to_discussion::ConvertToDiscussionHandler, create_branch::CreateBranchHandler,
    create_issue::CreateIssueHandler, create_pull_request::CreatePullRequestHandler,
    delete_branch::DeleteBranchHandler, merge_pr::MergePrHandler, remove_label::RemoveLabelHandler,
    reopen_issue::ReopenIssueHandler, update_file::UpdateFileHandler,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How to treat a configured capability with no registered handler. `Strict`
/// treats it as a configuration error; `Skip` logs a warning and ignores it
/// for the run (compatibility behavior).
pub enum UnknownCapabilityMode {
    Strict,
    Skip,
}

/// Maps the closed capability set to handlers.
pub struct CapabilityRegistry {
    handlers: BTreeMap<Capability, Box<dyn OutputHandler>>,
    mode: UnknownCapabilityMode,
}

impl CapabilityRegistry {
    /// Registry with every built-in handler, strict about unknowns.
    pub fn standard() -> Self {
        let mut registry = Self {
            handlers: BTreeMap::new(),
            mode: UnknownCapabilityMode::Strict,
        };
        registry.register(Box::new(AddCommentHandler));
        registry.register(Box::new(AddLabelHandler));
        registry.register(Box::new(RemoveLabelHandler));
        registry.register(Box::new(CreateIssueHandler));
        registry.register(Box::new(CreatePullRequestHandler));
        registry.register(Box::new(UpdateFileHandler));
        registry.register(Box::new(CloseIssueHandler));
        registry.register(Box::new(ReopenIssueHandler));
        registry.register(Box::new(AddReactionHandler));
        registry.register(Box::new(CreateBranchHandler));
        registry.register(Box::new(DeleteBranchHandler));
        registry.register(Box::new(MergePrHandler));
        registry.register(Box::new(ApprovePrHandler));
        registry.register(Box::new(ConvertToDiscussionHandler));
        registry
    }

    pub fn with_mode(mut self, mode: UnknownCapabilityMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn register(&mut self, handler: Box<dyn OutputHandler>) {
        self.handlers.insert(handler.capability(), handler);
    }

    /// Resolve a configured capability to its handler. `Ok(None)` only in
    /// `Skip` mode, after logging the skipped capability.
    pub fn resolve(&self, capability: Capability) -> Result<Option<&dyn OutputHandler>> {
        match self.handlers.get(&capability) {
            Some(handler) => Ok(Some(handler.as_ref())),
            None => match self.mode {
                UnknownCapabilityMode::Strict => {
                    bail!("no handler registered for capability '{capability}'")
                }
                UnknownCapabilityMode::Skip => {
                    tracing::warn!(%capability, "skipping capability with no registered handler");
                    Ok(None)
                }
            },
        }
    }
}
