//! # stackr-github
//!
//! GitHub API integration for stackr: listing pull requests by head or base
//! branch, retargeting their base branch, landing them, and reading the
//! review and build state that decides whether they may land.
//!
//! # Security
//!
//! Authentication tokens are stored using `SecretString` which automatically
//! zeroizes memory when dropped, reducing credential exposure in memory dumps.

mod auth;
mod client;
mod error;
mod traits;
mod types;

pub use auth::Auth;
pub use client::GitHubClient;
pub use error::{Error, Result};
// Re-export SecretString for constructing Auth::Token
pub use secrecy::SecretString;
pub use traits::GitHubApi;
pub use types::{
    BuildState, BuildStatus, MergeMethod, MergePullRequest, MergeResult, PullRequest,
    PullRequestBranch, Repo, Review, ReviewState, StatusCheck, UpdatePullRequest,
};
