//! # stackr-core
//!
//! Engine behind stackr: a concurrent walker over stacked pull requests, a
//! coordinator that rebases them on disposable local branches, and the
//! services that publish the result and land pull requests.
//!
//! Git and GitHub access go through the [`stackr_git::GitOps`] and
//! [`stackr_github::GitHubApi`] traits so everything here can be exercised
//! against mocks.

pub mod config;
pub mod error;
pub mod land;
pub mod message;
pub mod rebase;
pub mod rebaser;
pub mod review;
pub mod walk;

#[cfg(test)]
pub(crate) mod test_mocks;

pub use config::Config;
pub use error::{Error, MultiError, Result};
pub use land::{LandRequest, LandResponse, LandService};
pub use message::{CommitMessage, KeepMessage, MessageEditor};
pub use rebase::{RebaseConfig, RebaseRequest, RebaseResponse, RebaseService, RebasedPullRequest};
pub use rebaser::{BulkRebaser, RebaseError, RebaseHandle, checkout_unique_branch};
pub use review::ReviewStatus;
pub use walk::{Visitor, WalkConfig, walk};
