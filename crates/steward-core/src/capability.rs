use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Enumerates supported `Capability` values.
pub enum Capability {
    AddComment,
    AddLabel,
    RemoveLabel,
    CreateIssue,
    CreatePullRequest,
    UpdateFile,
    CloseIssue,
    ReopenIssue,
    AddReaction,
    CreateBranch,
    DeleteBranch,
    MergePr,
    ApprovePr,
    ConvertToDiscussion,
}

pub const ALL_CAPABILITIES: &[Capability] = &[
    Capability::AddComment,
    Capability::AddLabel,
    Capability::RemoveLabel,
    Capability::CreateIssue,
    Capability::CreatePullRequest,
    Capability::UpdateFile,
    Capability::CloseIssue,
    Capability::ReopenIssue,
    Capability::AddReaction,
    Capability::CreateBranch,
    Capability::DeleteBranch,
    Capability::MergePr,
    Capability::ApprovePr,
    Capability::ConvertToDiscussion,
];

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddComment => "add-comment",
            Self::AddLabel => "add-label",
            Self::RemoveLabel => "remove-label",
            Self::CreateIssue => "create-issue",
            Self::CreatePullRequest => "create-pull-request",
            Self::UpdateFile => "update-file",
            Self::CloseIssue => "close-issue",
            Self::ReopenIssue => "reopen-issue",
            Self::AddReaction => "add-reaction",
            Self::CreateBranch => "create-branch",
            Self::DeleteBranch => "delete-branch",
            Self::MergePr => "merge-pr",
            Self::ApprovePr => "approve-pr",
            Self::ConvertToDiscussion => "convert-to-discussion",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        ALL_CAPABILITIES
            .iter()
            .copied()
            .find(|capability| capability.as_str() == raw.trim())
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Per-capability constraint attached to an agent definition entry.
pub struct CapabilityConstraint {
    #[serde(default)]
    pub max: Option<u32>,
    #[serde(default)]
    pub sign: bool,
}

impl CapabilityConstraint {
    pub fn max_label(&self) -> String {
        match self.max {
            Some(max) => max.to_string(),
            None => "unlimited".to_string(),
        }
    }
}
