use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Repository identity as `owner/name`.
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (owner, name) = trimmed
            .split_once('/')
            .ok_or_else(|| anyhow!("invalid repository '{raw}', expected owner/repo"))?;
        let owner = owner.trim();
        let name = name.trim();
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            bail!("invalid repository '{raw}', expected owner/repo");
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn as_slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `EventKind` values.
pub enum EventKind {
    Issue,
    PullRequest,
    Discussion,
    Schedule,
    Manual,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::PullRequest => "pull_request",
            Self::Discussion => "discussion",
            Self::Schedule => "schedule",
            Self::Manual => "manual",
        }
    }

    /// Issue and pull-request events carry a labelable subject number.
    pub fn has_subject(&self) -> bool {
        matches!(self, Self::Issue | Self::PullRequest)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Per-run identity created once at pipeline start, read-only thereafter.
pub struct RunContext {
    pub repo: RepoRef,
    pub event: EventKind,
    pub subject_number: Option<u64>,
    pub actor: String,
    pub run_id: String,
}

impl RunContext {
    /// Triggering issue/PR number, present only for subject-bearing events.
    pub fn subject(&self) -> Option<u64> {
        if self.event.has_subject() {
            self.subject_number
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EventKind, RepoRef, RunContext};

    #[test]
    fn unit_repo_ref_parse_accepts_owner_slash_name() {
        let repo = RepoRef::parse(" octo/steward ").expect("parse repo");
        assert_eq!(repo.owner, "octo");
        assert_eq!(repo.name, "steward");
        assert_eq!(repo.as_slug(), "octo/steward");
    }

    #[test]
    fn unit_repo_ref_parse_rejects_malformed_slugs() {
        assert!(RepoRef::parse("no-slash").is_err());
        assert!(RepoRef::parse("/name").is_err());
        assert!(RepoRef::parse("owner/a/b").is_err());
    }

    #[test]
    fn functional_subject_is_suppressed_for_subjectless_events() {
        let context = RunContext {
            repo: RepoRef::parse("o/r").expect("repo"),
            event: EventKind::Schedule,
            subject_number: Some(7),
            actor: "octocat".to_string(),
            run_id: "run-1".to_string(),
        };
        assert_eq!(context.subject(), None);

        let context = RunContext {
            event: EventKind::PullRequest,
            ..context
        };
        assert_eq!(context.subject(), Some(7));
    }
}
