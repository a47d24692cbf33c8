use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `PermissionLevel` values.
pub enum PermissionLevel {
    Admin,
    Write,
    Read,
    None,
}

impl PermissionLevel {
    pub fn can_write(&self) -> bool {
        matches!(self, Self::Admin | Self::Write)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Enumerates supported `MergeMethod` values.
pub enum MergeMethod {
    Merge,
    Squash,
    Rebase,
}

impl MergeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Squash => "squash",
            Self::Rebase => "rebase",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "merge" => Some(Self::Merge),
            "squash" => Some(Self::Squash),
            "rebase" => Some(Self::Rebase),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// One discussion category available in the repository.
pub struct DiscussionCategory {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Fields accepted by the issue-creation write operation.
pub struct NewIssue {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Fields accepted by the pull-request-creation write operation.
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Optional commit overrides for a merge operation.
pub struct MergeOptions {
    pub commit_title: Option<String>,
    pub commit_message: Option<String>,
}

/// Abstract code-host API surface consumed by the pipeline: read-only
/// identity/state lookups plus one write operation per capability. The
/// pipeline never talks to the platform except through this trait.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    // Reads.
    async fn permission_level(&self, actor: &str) -> Result<PermissionLevel>;
    async fn is_org_member(&self, actor: &str) -> Result<bool>;
    async fn is_team_member(&self, team: &str, actor: &str) -> Result<bool>;
    async fn list_repo_labels(&self) -> Result<Vec<String>>;
    async fn subject_labels(&self, number: u64) -> Result<Vec<String>>;
    async fn pull_request_state(&self, number: u64) -> Result<Option<String>>;
    async fn discussion_categories(&self) -> Result<Vec<DiscussionCategory>>;
    async fn branch_exists(&self, branch: &str) -> Result<bool>;
    async fn resolve_ref_sha(&self, reference: &str) -> Result<Option<String>>;
    /// Start times of the most recent successful runs, newest first.
    async fn recent_successful_runs(&self) -> Result<Vec<DateTime<Utc>>>;

    // Writes, one per capability.
    async fn create_comment(&self, number: u64, body: &str) -> Result<()>;
    async fn set_labels(&self, number: u64, labels: &[String]) -> Result<()>;
    async fn remove_label(&self, number: u64, label: &str) -> Result<()>;
    async fn create_issue(&self, issue: &NewIssue) -> Result<u64>;
    async fn create_pull_request(&self, pull_request: &NewPullRequest) -> Result<u64>;
    async fn close_issue(&self, number: u64) -> Result<()>;
    async fn reopen_issue(&self, number: u64) -> Result<()>;
    async fn add_issue_reaction(&self, number: u64, reaction: &str) -> Result<()>;
    async fn add_comment_reaction(&self, comment_id: u64, reaction: &str) -> Result<()>;
    async fn create_branch(&self, branch: &str, sha: &str) -> Result<()>;
    async fn delete_branch(&self, branch: &str) -> Result<()>;
    async fn merge_pull_request(
        &self,
        number: u64,
        method: MergeMethod,
        options: &MergeOptions,
    ) -> Result<()>;
    async fn approve_pull_request(&self, number: u64, body: &str) -> Result<()>;
    async fn convert_issue_to_discussion(&self, number: u64, category_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::{MergeMethod, PermissionLevel};

    #[test]
    fn unit_permission_level_write_access() {
        assert!(PermissionLevel::Admin.can_write());
        assert!(PermissionLevel::Write.can_write());
        assert!(!PermissionLevel::Read.can_write());
        assert!(!PermissionLevel::None.can_write());
    }

    #[test]
    fn unit_merge_method_parse_round_trip() {
        for method in [MergeMethod::Merge, MergeMethod::Squash, MergeMethod::Rebase] {
            assert_eq!(MergeMethod::parse(method.as_str()), Some(method));
        }
        assert_eq!(MergeMethod::parse("fast-forward"), None);
    }
}
