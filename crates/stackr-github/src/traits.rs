//! Trait abstractions for GitHub API operations.
//!
//! This module defines the `GitHubApi` trait which abstracts GitHub API operations,
//! enabling dependency injection and testability.

use crate::{BuildStatus, MergeResult, PullRequest, PullRequestBranch, Repo, Result, Review};

/// Trait for GitHub API operations.
///
/// An implementation is bound to a single repository; every method acts on
/// that repository. Implementations are shared across concurrent tasks.
#[allow(clippy::missing_errors_doc)]
pub trait GitHubApi: Send + Sync {
    /// The repository this client operates on.
    fn repo(&self) -> &Repo;

    /// Whether the branch lives in this client's repository.
    ///
    /// Branches from forks, or whose repository was deleted, are not owned.
    fn is_owned(&self, branch: &PullRequestBranch) -> bool {
        branch.repo.as_ref().is_some_and(|r| r.same_as(self.repo()))
    }

    // === PR Queries ===

    /// List open pull requests whose head is `branch`.
    ///
    /// `owner` qualifies the head branch for pull requests opened from
    /// forks. `None` means this repository's owner.
    fn list_pull_requests_by_head(
        &self,
        owner: Option<&str>,
        branch: &str,
    ) -> impl std::future::Future<Output = Result<Vec<PullRequest>>> + Send;

    /// List open pull requests whose base is `branch`.
    fn list_pull_requests_by_base(
        &self,
        branch: &str,
    ) -> impl std::future::Future<Output = Result<Vec<PullRequest>>> + Send;

    /// Fetch the raw patch of a pull request.
    fn get_pull_request_patch(
        &self,
        number: u64,
    ) -> impl std::future::Future<Output = Result<String>> + Send;

    // === PR Mutations ===

    /// Retarget a pull request onto another base branch.
    fn set_pull_request_base(
        &self,
        number: u64,
        base: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Squash-merge a pull request with the given commit title and body.
    fn squash_pull_request(
        &self,
        number: u64,
        title: &str,
        body: &str,
    ) -> impl std::future::Future<Output = Result<MergeResult>> + Send;

    /// Delete a branch from the repository.
    fn delete_branch(&self, name: &str)
    -> impl std::future::Future<Output = Result<()>> + Send;

    // === Land Checks ===

    /// Combined build status of a ref.
    fn get_build_status(
        &self,
        git_ref: &str,
    ) -> impl std::future::Future<Output = Result<BuildStatus>> + Send;

    /// All reviews left on a pull request, oldest first.
    fn list_pull_request_reviews(
        &self,
        number: u64,
    ) -> impl std::future::Future<Output = Result<Vec<Review>>> + Send;
}
