//! GitHub API types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A GitHub repository, identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repo {
    /// Owning user or organization.
    pub owner: String,

    /// Repository name.
    pub name: String,
}

impl Repo {
    /// Create a repository reference.
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// GitHub logins and repository names are case-insensitive.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.owner.eq_ignore_ascii_case(&other.owner) && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl FromStr for Repo {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self::new(owner, name))
            }
            _ => Err(Error::InvalidRepo(s.to_string())),
        }
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// One end of a pull request: the branch name, the commit it points at, and
/// the repository it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestBranch {
    /// Branch name.
    #[serde(rename = "ref")]
    pub ref_name: String,

    /// Commit the branch points at.
    pub sha: String,

    /// Repository holding the branch. `None` if it was deleted.
    pub repo: Option<Repo>,
}

/// A GitHub Pull Request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR number.
    pub number: u64,

    /// PR title.
    pub title: String,

    /// PR body/description.
    pub body: Option<String>,

    /// PR URL.
    pub html_url: String,

    /// Login of the user who opened the PR.
    pub author: String,

    /// Branch being merged.
    pub head: PullRequestBranch,

    /// Branch being merged into.
    pub base: PullRequestBranch,
}

impl fmt::Display for PullRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.html_url)
    }
}

/// Combined state of the commit statuses on a ref.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildState {
    /// All statuses succeeded.
    Success,
    /// At least one status is still running, or none were reported.
    Pending,
    /// At least one status failed.
    Failure,
    /// At least one status errored.
    Error,
    /// A state this client does not know about.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Pending => "pending",
            Self::Failure => "failure",
            Self::Error => "error",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A single commit status reported by CI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCheck {
    /// Name of the check (the status context).
    pub name: String,

    /// State of this check.
    pub state: BuildState,

    /// Human-readable description, if any.
    pub message: Option<String>,
}

/// Combined build status of a ref.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStatus {
    /// Overall state.
    pub state: BuildState,

    /// Individual checks.
    pub statuses: Vec<StatusCheck>,
}

/// State of a pull request review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
    #[serde(other)]
    Unknown,
}

/// A review left on a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Login of the reviewer.
    pub user: String,

    /// Review verdict.
    pub state: ReviewState,

    /// When the review was submitted. Pending reviews have none.
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Request to update a pull request.
#[derive(Debug, Default, Serialize)]
pub struct UpdatePullRequest {
    /// New title (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// New body (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// New base branch (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
}

/// Method used to merge a pull request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    /// Create a merge commit.
    Merge,
    /// Squash all commits into one.
    #[default]
    Squash,
    /// Rebase commits onto base.
    Rebase,
}

/// Request to merge a pull request.
#[derive(Debug, Serialize)]
pub struct MergePullRequest {
    /// Commit title (for squash/merge).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_title: Option<String>,

    /// Commit message (for squash/merge).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,

    /// Merge method.
    pub merge_method: MergeMethod,
}

/// Result of merging a pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeResult {
    /// SHA of the merge commit.
    pub sha: String,

    /// Whether the merge was successful.
    pub merged: bool,

    /// Message from the API.
    pub message: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_from_str() {
        let repo: Repo = "octo/hello".parse().unwrap();
        assert_eq!(repo, Repo::new("octo", "hello"));
        assert_eq!(repo.to_string(), "octo/hello");
    }

    #[test]
    fn test_repo_from_str_rejects_malformed() {
        for input in ["", "octo", "octo/", "/hello", "octo/hello/extra"] {
            assert!(
                matches!(input.parse::<Repo>(), Err(Error::InvalidRepo(_))),
                "{input:?} should not parse"
            );
        }
    }

    #[test]
    fn test_repo_same_as_ignores_case() {
        assert!(Repo::new("Octo", "Hello").same_as(&Repo::new("octo", "hello")));
        assert!(!Repo::new("octo", "hello").same_as(&Repo::new("octo", "world")));
    }

    #[test]
    fn test_review_state_unknown_value() {
        let state: ReviewState = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(state, ReviewState::Unknown);

        let state: ReviewState = serde_json::from_str("\"CHANGES_REQUESTED\"").unwrap();
        assert_eq!(state, ReviewState::ChangesRequested);
    }
}
