use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use steward_core::platform::{
    DiscussionCategory, MergeMethod, MergeOptions, NewIssue, NewPullRequest, PermissionLevel,
    PlatformClient,
};
use steward_core::run_context::RepoRef;

use crate::transport::{
    is_retryable_github_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_for_error,
};

#[derive(Debug, Clone, Deserialize)]
struct PermissionResponse {
    permission: String,
}

#[derive(Debug, Clone, Deserialize)]
struct LabelRow {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct IssueStateResponse {
    state: String,
    #[serde(default)]
    labels: Vec<LabelRow>,
    #[serde(default)]
    node_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CreatedNumberResponse {
    number: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Debug, Clone, Deserialize)]
struct WorkflowRunRow {
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
struct WorkflowRunsResponse {
    #[serde(default)]
    workflow_runs: Vec<WorkflowRunRow>,
}

/// GitHub REST/GraphQL client backing the platform trait. All requests share
/// default headers, a request timeout, and a bounded retry loop for
/// rate-limited or server-fault statuses.
#[derive(Clone)]
pub struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    repo: RepoRef,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl GithubApiClient {
    pub fn new(
        api_base: String,
        token: String,
        repo: RepoRef,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("steward-output-pipeline"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .context("invalid github authorization header")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create github api client")?;
        Ok(Self {
            http: client,
            api_base: api_base.trim_end_matches('/').to_string(),
            repo,
            retry_max_attempts: retry_max_attempts.max(1),
            retry_base_delay_ms: retry_base_delay_ms.max(1),
        })
    }

    fn repo_url(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.repo.owner, self.repo.name, tail
        )
    }

    async fn send_with_retry<F>(&self, operation: &str, mut request_builder: F) -> Result<reqwest::Response>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            match request_builder().send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success()
                        && attempt < self.retry_max_attempts
                        && is_retryable_github_status(status.as_u16())
                    {
                        let retry_after = parse_retry_after(response.headers());
                        tracing::warn!(
                            operation,
                            status = status.as_u16(),
                            attempt,
                            "retrying github api request"
                        );
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }
                    return Ok(response);
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tracing::warn!(operation, %error, attempt, "retrying github api request");
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(error)
                        .with_context(|| format!("github api {operation} request failed"));
                }
            }
        }
    }

    async fn request_json<T, F>(&self, operation: &str, request_builder: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(operation, request_builder).await?;
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .with_context(|| format!("failed to decode github {operation}"));
        }
        let body = response.text().await.unwrap_or_default();
        bail!(
            "github api {operation} failed with status {}: {}",
            status.as_u16(),
            truncate_for_error(&body, 800)
        );
    }

    /// Like `request_json`, mapping a 404 to `None`.
    async fn request_json_opt<T, F>(&self, operation: &str, request_builder: F) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(operation, request_builder).await?;
        let status = response.status();
        if status.is_success() {
            let parsed = response
                .json::<T>()
                .await
                .with_context(|| format!("failed to decode github {operation}"))?;
            return Ok(Some(parsed));
        }
        if status.as_u16() == 404 {
            return Ok(None);
        }
        let body = response.text().await.unwrap_or_default();
        bail!(
            "github api {operation} failed with status {}: {}",
            status.as_u16(),
            truncate_for_error(&body, 800)
        );
    }

    /// Existence probe: success is `true`, 403/404 is `false`.
    async fn request_exists<F>(&self, operation: &str, request_builder: F) -> Result<bool>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(operation, request_builder).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if matches!(status.as_u16(), 403 | 404) {
            return Ok(false);
        }
        let body = response.text().await.unwrap_or_default();
        bail!(
            "github api {operation} failed with status {}: {}",
            status.as_u16(),
            truncate_for_error(&body, 800)
        );
    }

    async fn request_unit<F>(&self, operation: &str, request_builder: F) -> Result<()>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(operation, request_builder).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        bail!(
            "github api {operation} failed with status {}: {}",
            status.as_u16(),
            truncate_for_error(&body, 800)
        );
    }

    async fn graphql(&self, operation: &str, query: &str, variables: Value) -> Result<Value> {
        let payload = json!({ "query": query, "variables": variables });
        let response: Value = self
            .request_json(operation, || {
                self.http
                    .post(format!("{}/graphql", self.api_base))
                    .json(&payload)
            })
            .await?;
        if let Some(errors) = response.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                bail!(
                    "github graphql {operation} failed: {}",
                    truncate_for_error(&errors[0].to_string(), 400)
                );
            }
        }
        Ok(response)
    }

    async fn issue_node_id(&self, number: u64) -> Result<String> {
        let issue: IssueStateResponse = self
            .request_json("fetch issue node id", || {
                self.http.get(self.repo_url(&format!("issues/{number}")))
            })
            .await?;
        issue
            .node_id
            .with_context(|| format!("issue #{number} has no node id"))
    }
}

#[async_trait]
impl PlatformClient for GithubApiClient {
    async fn permission_level(&self, actor: &str) -> Result<PermissionLevel> {
        let response: Option<PermissionResponse> = self
            .request_json_opt("read collaborator permission", || {
                self.http
                    .get(self.repo_url(&format!("collaborators/{actor}/permission")))
            })
            .await?;
        Ok(match response.map(|payload| payload.permission) {
            Some(permission) if permission == "admin" => PermissionLevel::Admin,
            Some(permission) if permission == "write" => PermissionLevel::Write,
            Some(permission) if permission == "read" => PermissionLevel::Read,
            _ => PermissionLevel::None,
        })
    }

    async fn is_org_member(&self, actor: &str) -> Result<bool> {
        self.request_exists("read org membership", || {
            self.http.get(format!(
                "{}/orgs/{}/members/{}",
                self.api_base, self.repo.owner, actor
            ))
        })
        .await
    }

    async fn is_team_member(&self, team: &str, actor: &str) -> Result<bool> {
        self.request_exists("read team membership", || {
            self.http.get(format!(
                "{}/orgs/{}/teams/{}/memberships/{}",
                self.api_base, self.repo.owner, team, actor
            ))
        })
        .await
    }

    async fn list_repo_labels(&self) -> Result<Vec<String>> {
        let rows: Vec<LabelRow> = self
            .request_json("list repository labels", || {
                self.http
                    .get(self.repo_url("labels"))
                    .query(&[("per_page", "100")])
            })
            .await?;
        Ok(rows.into_iter().map(|row| row.name).collect())
    }

    async fn subject_labels(&self, number: u64) -> Result<Vec<String>> {
        let issue: IssueStateResponse = self
            .request_json("read issue labels", || {
                self.http.get(self.repo_url(&format!("issues/{number}")))
            })
            .await?;
        Ok(issue.labels.into_iter().map(|row| row.name).collect())
    }

    async fn pull_request_state(&self, number: u64) -> Result<Option<String>> {
        let response: Option<IssueStateResponse> = self
            .request_json_opt("read pull request state", || {
                self.http.get(self.repo_url(&format!("pulls/{number}")))
            })
            .await?;
        Ok(response.map(|payload| payload.state))
    }

    async fn discussion_categories(&self) -> Result<Vec<DiscussionCategory>> {
        let query = "query($owner: String!, $name: String!) { repository(owner: $owner, name: $name) { discussionCategories(first: 20) { nodes { id name } } } }";
        let response = self
            .graphql(
                "list discussion categories",
                query,
                json!({ "owner": self.repo.owner, "name": self.repo.name }),
            )
            .await?;
        let nodes = response
            .pointer("/data/repository/discussionCategories/nodes")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut categories = Vec::new();
        for node in nodes {
            let category: DiscussionCategory = serde_json::from_value(node)
                .context("failed to decode discussion category node")?;
            categories.push(category);
        }
        Ok(categories)
    }

    async fn branch_exists(&self, branch: &str) -> Result<bool> {
        self.request_exists("read branch ref", || {
            self.http
                .get(self.repo_url(&format!("git/ref/heads/{branch}")))
        })
        .await
    }

    async fn resolve_ref_sha(&self, reference: &str) -> Result<Option<String>> {
        let head: Option<RefResponse> = self
            .request_json_opt("resolve branch ref", || {
                self.http
                    .get(self.repo_url(&format!("git/ref/heads/{reference}")))
            })
            .await?;
        if let Some(head) = head {
            return Ok(Some(head.object.sha));
        }
        let tag: Option<RefResponse> = self
            .request_json_opt("resolve tag ref", || {
                self.http
                    .get(self.repo_url(&format!("git/ref/tags/{reference}")))
            })
            .await?;
        Ok(tag.map(|payload| payload.object.sha))
    }

    async fn recent_successful_runs(&self) -> Result<Vec<DateTime<Utc>>> {
        let response: WorkflowRunsResponse = self
            .request_json("list recent workflow runs", || {
                self.http.get(self.repo_url("actions/runs")).query(&[
                    ("status", "success"),
                    ("per_page", "5"),
                ])
            })
            .await?;
        Ok(response
            .workflow_runs
            .into_iter()
            .map(|run| run.created_at)
            .collect())
    }

    async fn create_comment(&self, number: u64, body: &str) -> Result<()> {
        let payload = json!({ "body": body });
        self.request_unit("create comment", || {
            self.http
                .post(self.repo_url(&format!("issues/{number}/comments")))
                .json(&payload)
        })
        .await
    }

    async fn set_labels(&self, number: u64, labels: &[String]) -> Result<()> {
        let payload = json!({ "labels": labels });
        self.request_unit("set labels", || {
            self.http
                .put(self.repo_url(&format!("issues/{number}/labels")))
                .json(&payload)
        })
        .await
    }

    async fn remove_label(&self, number: u64, label: &str) -> Result<()> {
        self.request_unit("remove label", || {
            self.http
                .delete(self.repo_url(&format!("issues/{number}/labels/{label}")))
        })
        .await
    }

    async fn create_issue(&self, issue: &NewIssue) -> Result<u64> {
        let payload = json!({
            "title": issue.title,
            "body": issue.body,
            "labels": issue.labels,
            "assignees": issue.assignees,
        });
        let created: CreatedNumberResponse = self
            .request_json("create issue", || {
                self.http.post(self.repo_url("issues")).json(&payload)
            })
            .await?;
        Ok(created.number)
    }

    async fn create_pull_request(&self, pull_request: &NewPullRequest) -> Result<u64> {
        let payload = json!({
            "title": pull_request.title,
            "body": pull_request.body,
            "head": pull_request.head,
            "base": pull_request.base,
        });
        let created: CreatedNumberResponse = self
            .request_json("create pull request", || {
                self.http.post(self.repo_url("pulls")).json(&payload)
            })
            .await?;
        Ok(created.number)
    }

    async fn close_issue(&self, number: u64) -> Result<()> {
        let payload = json!({ "state": "closed" });
        self.request_unit("close issue", || {
            self.http
                .patch(self.repo_url(&format!("issues/{number}")))
                .json(&payload)
        })
        .await
    }

    async fn reopen_issue(&self, number: u64) -> Result<()> {
        let payload = json!({ "state": "open" });
        self.request_unit("reopen issue", || {
            self.http
                .patch(self.repo_url(&format!("issues/{number}")))
                .json(&payload)
        })
        .await
    }

    async fn add_issue_reaction(&self, number: u64, reaction: &str) -> Result<()> {
        let payload = json!({ "content": reaction });
        self.request_unit("add issue reaction", || {
            self.http
                .post(self.repo_url(&format!("issues/{number}/reactions")))
                .json(&payload)
        })
        .await
    }

    async fn add_comment_reaction(&self, comment_id: u64, reaction: &str) -> Result<()> {
        let payload = json!({ "content": reaction });
        self.request_unit("add comment reaction", || {
            self.http
                .post(self.repo_url(&format!("issues/comments/{comment_id}/reactions")))
                .json(&payload)
        })
        .await
    }

    async fn create_branch(&self, branch: &str, sha: &str) -> Result<()> {
        let payload = json!({ "ref": format!("refs/heads/{branch}"), "sha": sha });
        self.request_unit("create branch", || {
            self.http.post(self.repo_url("git/refs")).json(&payload)
        })
        .await
    }

    async fn delete_branch(&self, branch: &str) -> Result<()> {
        self.request_unit("delete branch", || {
            self.http
                .delete(self.repo_url(&format!("git/refs/heads/{branch}")))
        })
        .await
    }

    async fn merge_pull_request(
        &self,
        number: u64,
        method: MergeMethod,
        options: &MergeOptions,
    ) -> Result<()> {
        let mut payload = json!({ "merge_method": method.as_str() });
        if let Some(commit_title) = options.commit_title.as_deref() {
            payload["commit_title"] = json!(commit_title);
        }
        if let Some(commit_message) = options.commit_message.as_deref() {
            payload["commit_message"] = json!(commit_message);
        }
        self.request_unit("merge pull request", || {
            self.http
                .put(self.repo_url(&format!("pulls/{number}/merge")))
                .json(&payload)
        })
        .await
    }

    async fn approve_pull_request(&self, number: u64, body: &str) -> Result<()> {
        let payload = json!({ "body": body, "event": "APPROVE" });
        self.request_unit("approve pull request", || {
            self.http
                .post(self.repo_url(&format!("pulls/{number}/reviews")))
                .json(&payload)
        })
        .await
    }

    async fn convert_issue_to_discussion(&self, number: u64, category_id: &str) -> Result<()> {
        let issue_id = self.issue_node_id(number).await?;
        let mutation = "mutation($issueId: ID!, $categoryId: ID!) { convertIssueToDiscussion(input: {issueId: $issueId, categoryId: $categoryId}) { discussion { id url } } }";
        self.graphql(
            "convert issue to discussion",
            mutation,
            json!({ "issueId": issue_id, "categoryId": category_id }),
        )
        .await?;
        Ok(())
    }
}
