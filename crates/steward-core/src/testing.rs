//! In-memory platform client used by unit and functional tests across the
//! workspace. State lives behind a mutex; write operations append to journal
//! vectors so tests can assert on exactly what was committed.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::platform::{
    DiscussionCategory, MergeMethod, MergeOptions, NewIssue, NewPullRequest, PermissionLevel,
    PlatformClient,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Tracked open/closed state of a fake issue or PR.
pub enum SubjectState {
    Open,
    Closed,
}

#[derive(Debug, Default)]
pub struct PlatformState {
    pub permissions: BTreeMap<String, PermissionLevel>,
    pub org_members: BTreeSet<String>,
    pub team_members: BTreeSet<(String, String)>,
    pub repo_labels: BTreeSet<String>,
    pub subject_labels: BTreeMap<u64, Vec<String>>,
    pub subject_states: BTreeMap<u64, SubjectState>,
    pub pull_request_states: BTreeMap<u64, String>,
    pub discussion_categories: Vec<DiscussionCategory>,
    pub branches: BTreeMap<String, String>,
    pub recent_runs: Vec<DateTime<Utc>>,
    pub next_issue_number: u64,
    /// Operation names that should fail with an error when invoked.
    pub failing_operations: BTreeSet<String>,

    // Write journals.
    pub comments: Vec<(u64, String)>,
    pub label_puts: Vec<(u64, Vec<String>)>,
    pub removed_labels: Vec<(u64, String)>,
    pub created_issues: Vec<NewIssue>,
    pub created_pull_requests: Vec<NewPullRequest>,
    pub closed_issues: Vec<u64>,
    pub reopened_issues: Vec<u64>,
    pub issue_reactions: Vec<(u64, String)>,
    pub comment_reactions: Vec<(u64, String)>,
    pub created_branches: Vec<(String, String)>,
    pub deleted_branches: Vec<String>,
    pub merged_pull_requests: Vec<(u64, MergeMethod)>,
    pub approvals: Vec<(u64, String)>,
    pub conversions: Vec<(u64, String)>,
}

#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    pub state: Mutex<PlatformState>,
}

impl InMemoryPlatform {
    pub fn new(state: PlatformState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    fn check_failure(&self, operation: &str) -> Result<()> {
        let state = self.lock();
        if state.failing_operations.contains(operation) {
            bail!("simulated {operation} failure");
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PlatformState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl PlatformClient for InMemoryPlatform {
    async fn permission_level(&self, actor: &str) -> Result<PermissionLevel> {
        Ok(self
            .lock()
            .permissions
            .get(actor)
            .copied()
            .unwrap_or(PermissionLevel::None))
    }

    async fn is_org_member(&self, actor: &str) -> Result<bool> {
        Ok(self.lock().org_members.contains(actor))
    }

    async fn is_team_member(&self, team: &str, actor: &str) -> Result<bool> {
        Ok(self
            .lock()
            .team_members
            .contains(&(team.to_string(), actor.to_string())))
    }

    async fn list_repo_labels(&self) -> Result<Vec<String>> {
        Ok(self.lock().repo_labels.iter().cloned().collect())
    }

    async fn subject_labels(&self, number: u64) -> Result<Vec<String>> {
        Ok(self
            .lock()
            .subject_labels
            .get(&number)
            .cloned()
            .unwrap_or_default())
    }

    async fn pull_request_state(&self, number: u64) -> Result<Option<String>> {
        Ok(self.lock().pull_request_states.get(&number).cloned())
    }

    async fn discussion_categories(&self) -> Result<Vec<DiscussionCategory>> {
        Ok(self.lock().discussion_categories.clone())
    }

    async fn branch_exists(&self, branch: &str) -> Result<bool> {
        Ok(self.lock().branches.contains_key(branch))
    }

    async fn resolve_ref_sha(&self, reference: &str) -> Result<Option<String>> {
        Ok(self.lock().branches.get(reference).cloned())
    }

    async fn recent_successful_runs(&self) -> Result<Vec<DateTime<Utc>>> {
        Ok(self.lock().recent_runs.clone())
    }

    async fn create_comment(&self, number: u64, body: &str) -> Result<()> {
        self.check_failure("create_comment")?;
        self.lock().comments.push((number, body.to_string()));
        Ok(())
    }

    async fn set_labels(&self, number: u64, labels: &[String]) -> Result<()> {
        self.check_failure("set_labels")?;
        let mut state = self.lock();
        state.label_puts.push((number, labels.to_vec()));
        state.subject_labels.insert(number, labels.to_vec());
        Ok(())
    }

    async fn remove_label(&self, number: u64, label: &str) -> Result<()> {
        self.check_failure("remove_label")?;
        let mut state = self.lock();
        state.removed_labels.push((number, label.to_string()));
        if let Some(labels) = state.subject_labels.get_mut(&number) {
            labels.retain(|existing| existing != label);
        }
        Ok(())
    }

    async fn create_issue(&self, issue: &NewIssue) -> Result<u64> {
        self.check_failure("create_issue")?;
        let mut state = self.lock();
        state.created_issues.push(issue.clone());
        state.next_issue_number = state.next_issue_number.max(100).saturating_add(1);
        Ok(state.next_issue_number)
    }

    async fn create_pull_request(&self, pull_request: &NewPullRequest) -> Result<u64> {
        self.check_failure("create_pull_request")?;
        let mut state = self.lock();
        state.created_pull_requests.push(pull_request.clone());
        state.next_issue_number = state.next_issue_number.max(100).saturating_add(1);
        Ok(state.next_issue_number)
    }

    async fn close_issue(&self, number: u64) -> Result<()> {
        self.check_failure("close_issue")?;
        let mut state = self.lock();
        state.closed_issues.push(number);
        state.subject_states.insert(number, SubjectState::Closed);
        Ok(())
    }

    async fn reopen_issue(&self, number: u64) -> Result<()> {
        self.check_failure("reopen_issue")?;
        let mut state = self.lock();
        state.reopened_issues.push(number);
        state.subject_states.insert(number, SubjectState::Open);
        Ok(())
    }

    async fn add_issue_reaction(&self, number: u64, reaction: &str) -> Result<()> {
        self.check_failure("add_issue_reaction")?;
        self.lock()
            .issue_reactions
            .push((number, reaction.to_string()));
        Ok(())
    }

    async fn add_comment_reaction(&self, comment_id: u64, reaction: &str) -> Result<()> {
        self.check_failure("add_comment_reaction")?;
        self.lock()
            .comment_reactions
            .push((comment_id, reaction.to_string()));
        Ok(())
    }

    async fn create_branch(&self, branch: &str, sha: &str) -> Result<()> {
        self.check_failure("create_branch")?;
        let mut state = self.lock();
        state
            .created_branches
            .push((branch.to_string(), sha.to_string()));
        state.branches.insert(branch.to_string(), sha.to_string());
        Ok(())
    }

    async fn delete_branch(&self, branch: &str) -> Result<()> {
        self.check_failure("delete_branch")?;
        let mut state = self.lock();
        state.deleted_branches.push(branch.to_string());
        state.branches.remove(branch);
        Ok(())
    }

    async fn merge_pull_request(
        &self,
        number: u64,
        method: MergeMethod,
        _options: &MergeOptions,
    ) -> Result<()> {
        self.check_failure("merge_pull_request")?;
        let mut state = self.lock();
        state.merged_pull_requests.push((number, method));
        state
            .pull_request_states
            .insert(number, "closed".to_string());
        Ok(())
    }

    async fn approve_pull_request(&self, number: u64, body: &str) -> Result<()> {
        self.check_failure("approve_pull_request")?;
        self.lock().approvals.push((number, body.to_string()));
        Ok(())
    }

    async fn convert_issue_to_discussion(&self, number: u64, category_id: &str) -> Result<()> {
        self.check_failure("convert_issue_to_discussion")?;
        self.lock()
            .conversions
            .push((number, category_id.to_string()));
        Ok(())
    }
}
