//! # stackr-git
//!
//! Local git access for stackr. Branch and ref manipulation and rebasing go
//! through git2-rs; fetch, push, and pull shell out to the `git` executable
//! so the user's credential helpers and transport configuration apply.

mod error;
mod remote;
mod repository;
mod traits;

pub use error::{Error, Result};
pub use remote::parse_github_remote;
pub use repository::Repository;
pub use traits::{FetchRequest, GitOps, PushRequest, RebaseRequest};
