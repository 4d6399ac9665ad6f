//! Error types for stackr-git.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during git operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Not inside a git repository.
    #[error("not a git repository")]
    NotARepository,

    /// Branch not found.
    #[error("branch not found: {0}")]
    BranchNotFound(String),

    /// Branch already exists.
    #[error("branch already exists: {0}")]
    BranchExists(String),

    /// Reference could not be resolved.
    #[error("could not resolve ref {0:?}")]
    RefNotFound(String),

    /// HEAD is detached (not on a branch).
    #[error("HEAD is detached - checkout a branch first")]
    DetachedHead,

    /// Rebase stopped on conflicts and was aborted.
    #[error("rebase of {branch:?} conflicted in: {files:?}")]
    RebaseConflict {
        /// Branch being rebased.
        branch: String,
        /// Paths with conflicts.
        files: Vec<String>,
    },

    /// Rebase failed.
    #[error("failed to rebase {0:?}: {1}")]
    RebaseFailed(String, String),

    /// Remote not found.
    #[error("remote not found: {0}")]
    RemoteNotFound(String),

    /// Invalid remote URL.
    #[error("invalid remote URL: {0}")]
    InvalidRemoteUrl(String),

    /// Push failed.
    #[error("failed to push refs to {remote:?}: {message}")]
    PushFailed { remote: String, message: String },

    /// Fetch failed.
    #[error("failed to fetch {refspec:?} from {remote:?}: {message}")]
    FetchFailed {
        remote: String,
        refspec: String,
        message: String,
    },

    /// Pull failed.
    #[error("failed to pull {branch:?} from {remote:?}: {message}")]
    PullFailed {
        remote: String,
        branch: String,
        message: String,
    },

    /// The `git` executable could not be run.
    #[error("failed to run git: {0}")]
    Io(#[from] std::io::Error),

    /// Underlying git2 error.
    #[error("git error: {0}")]
    Git2(#[from] git2::Error),
}
