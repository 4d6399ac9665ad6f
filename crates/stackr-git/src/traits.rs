//! Trait abstractions for git operations.
//!
//! This module defines the `GitOps` trait which abstracts git operations,
//! enabling dependency injection and testability.

use std::collections::BTreeMap;

use crate::Result;

/// A request to fetch from a remote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    /// Name of the remote.
    pub remote: String,
    /// Ref to fetch. Empty fetches the remote's default refspecs.
    pub remote_ref: String,
    /// If set, the fetched ref is stored under this local name.
    pub local_ref: Option<String>,
}

impl FetchRequest {
    /// Fetch everything the remote is configured to fetch.
    #[must_use]
    pub fn all(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            ..Self::default()
        }
    }

    /// The refspec passed to `git fetch`, if any.
    #[must_use]
    pub fn refspec(&self) -> Option<String> {
        match (self.remote_ref.as_str(), &self.local_ref) {
            ("", _) => None,
            (remote_ref, Some(local)) => Some(format!("{remote_ref}:{local}")),
            (remote_ref, None) => Some(remote_ref.to_string()),
        }
    }
}

/// A request to push several refs in one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushRequest {
    /// Name of the remote.
    pub remote: String,
    /// Local ref to remote branch. An empty remote name pushes to the
    /// branch of the same name.
    pub refs: BTreeMap<String, String>,
    /// Whether to force-push.
    pub force: bool,
}

impl PushRequest {
    /// Refspecs in the form `local:remote`, ordered by local ref.
    #[must_use]
    pub fn refspecs(&self) -> Vec<String> {
        self.refs
            .iter()
            .map(|(local, remote)| {
                if remote.is_empty() {
                    local.clone()
                } else {
                    format!("{local}:{remote}")
                }
            })
            .collect()
    }
}

/// A request to rebase a branch, with `git rebase --onto` semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebaseRequest {
    /// New base for the replayed commits.
    pub onto: String,
    /// Old base: commits reachable from here are not replayed.
    pub from: String,
    /// Branch to rebase. Its ref is moved to the rebased tip.
    pub branch: String,
}

/// Trait for git repository operations.
///
/// All operations are blocking. Implementations must be safe to share across
/// threads; callers serialize anything that touches the working copy.
#[allow(clippy::missing_errors_doc)]
pub trait GitOps: Send + Sync {
    // === Repository Info ===

    /// Get the current branch name.
    ///
    /// Returns an error if HEAD is detached or not on a branch.
    fn current_branch(&self) -> Result<String>;

    /// Resolve a revision to its commit hash.
    fn sha1(&self, rev: &str) -> Result<String>;

    /// Get the URL of a remote.
    fn remote_url(&self, remote: &str) -> Result<String>;

    // === Branch Operations ===

    /// Check if a local branch exists.
    fn branch_exists(&self, name: &str) -> bool;

    /// Create a branch at `head` without switching to it.
    fn create_branch(&self, name: &str, head: &str) -> Result<()>;

    /// Create a branch at `head` and switch to it.
    ///
    /// Fails if the branch already exists.
    fn create_branch_and_checkout(&self, name: &str, head: &str) -> Result<()>;

    /// Checkout a branch, or detach HEAD at any other revision.
    fn checkout(&self, rev: &str) -> Result<()>;

    /// Delete a local branch.
    fn delete_branch(&self, name: &str) -> Result<()>;

    /// Delete the remote tracking branch `remote/name`.
    fn delete_remote_tracking_branch(&self, remote: &str, name: &str) -> Result<()>;

    /// Point a branch at `head`. Hard-resets the work tree if the branch is
    /// checked out.
    fn reset_branch(&self, branch: &str, head: &str) -> Result<()>;

    // === Rebase Operations ===

    /// Replay `from..branch` onto `onto`, moving `branch` to the result.
    fn rebase(&self, req: &RebaseRequest) -> Result<()>;

    /// Abort a rebase in progress. A no-op if none is in progress.
    fn rebase_abort(&self) -> Result<()>;

    // === Remote Operations ===

    /// Fetch from a remote.
    fn fetch(&self, req: &FetchRequest) -> Result<()>;

    /// Push refs to a remote.
    fn push(&self, req: &PushRequest) -> Result<()>;

    /// Pull a branch from a remote into the current branch.
    fn pull(&self, remote: &str, branch: &str) -> Result<()>;
}
