//! Landing pull requests.
//!
//! Landing squash-merges a pull request, brings the local base branch up to
//! date, and moves every pull request that was stacked on it onto the base
//! so the stack stays reviewable.

use std::sync::Arc;

use stackr_git::GitOps;
use stackr_github::{BuildState, BuildStatus, GitHubApi, PullRequest};
use tracing::{debug, info};

use crate::error::{Error, MultiError, Result};
use crate::message::{CommitMessage, MessageEditor};
use crate::rebase::{RebaseConfig, RebaseRequest, RebaseService};
use crate::review::{ReviewStatus, review_status};

/// A request to land a single pull request.
#[derive(Debug, Clone)]
pub struct LandRequest {
    /// The pull request to land.
    pub pull_request: PullRequest,

    /// Local branch tracking the pull request, if there is one. It must match
    /// the pull request's head and is deleted after landing.
    pub local_branch: Option<String>,

    /// Require approval and a green build first.
    pub check: bool,
}

/// Outcome of landing a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LandResponse {
    /// Local branches of dependents that were not reset after rebasing.
    pub branches_not_updated: Vec<String>,
}

/// Lands pull requests and restacks their dependents.
pub struct LandService<G, H> {
    git: Arc<G>,
    github: Arc<H>,
    remote: String,
    rebase: RebaseService<G, H>,
}

impl<G, H> LandService<G, H>
where
    G: GitOps + 'static,
    H: GitHubApi + 'static,
{
    /// Create a new land service.
    #[must_use]
    pub fn new(git: Arc<G>, github: Arc<H>, config: RebaseConfig) -> Self {
        Self {
            remote: config.remote.clone(),
            rebase: RebaseService::new(Arc::clone(&git), Arc::clone(&github), config),
            git,
            github,
        }
    }

    /// Squash-merge `request.pull_request` and rebase its dependents onto its
    /// base.
    ///
    /// # Errors
    /// Fails before merging if the checks fail, the message is rejected, or
    /// the local branch is out of sync. Failures after merging are wrapped so
    /// the caller can tell the pull request has landed.
    pub async fn land(
        &self,
        request: LandRequest,
        editor: &impl MessageEditor,
    ) -> Result<LandResponse> {
        let pr = &request.pull_request;
        let base = &pr.base.ref_name;

        if request.check {
            self.check(pr).await?;
        }

        let message = CommitMessage::parse(&editor.edit(&CommitMessage::render(pr))?)?;

        if !self.git.branch_exists(base) {
            debug!(%base, "creating local base branch");
            self.git.create_branch(base, &format!("{}/{base}", self.remote))?;
        }

        if let Some(local) = &request.local_branch {
            if self.git.sha1(local)? != pr.head.sha {
                return Err(Error::StaleLocalBranch {
                    branch: local.clone(),
                    url: pr.html_url.clone(),
                });
            }
        }

        info!(number = pr.number, title = %message.title, "squash-merging pull request");
        self.github
            .squash_pull_request(pr.number, &message.title, &message.body)
            .await?;

        self.git.checkout(base)?;
        self.git.pull(&self.remote, base)?;
        if let Some(local) = &request.local_branch {
            self.git.delete_branch(local)?;
        }

        // Branches in forks are not ours to restack or delete.
        if !self.github.is_owned(&pr.head) {
            return Ok(LandResponse::default());
        }

        let mut response = LandResponse::default();
        let dependents = self.github.list_pull_requests_by_base(&pr.head.ref_name).await?;
        if !dependents.is_empty() {
            info!(count = dependents.len(), %base, "rebasing dependents");
            let rebased = self
                .rebase
                .rebase(RebaseRequest {
                    pull_requests: dependents,
                    base: base.clone(),
                    author: None,
                })
                .await
                .map_err(|e| Error::RebaseDependents {
                    url: pr.html_url.clone(),
                    source: Box::new(e),
                })?;
            response.branches_not_updated = rebased.branches_not_updated;
        }

        debug!(branch = %pr.head.ref_name, "deleting remote branch");
        self.github.delete_branch(&pr.head.ref_name).await?;
        if request.local_branch.is_some() {
            self.git
                .delete_remote_tracking_branch(&self.remote, &pr.head.ref_name)?;
        }

        Ok(response)
    }

    /// Verify that `pr` is approved and its build is green.
    async fn check(&self, pr: &PullRequest) -> Result<()> {
        let (reviews, build) = tokio::join!(
            review_status(self.github.as_ref(), pr.number),
            self.github.get_build_status(&pr.head.sha),
        );

        let mut reasons = MultiError::new();
        if let Some(reviews) = reasons.check(reviews) {
            reasons.extend(review_problems(&reviews, &pr.html_url));
        }
        if let Some(build) = reasons.check(build.map_err(Error::from)) {
            reasons.extend(build_problems(&build));
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(Error::NotLandable {
                url: pr.html_url.clone(),
                reasons,
            })
        }
    }
}

fn review_problems(reviews: &ReviewStatus, url: &str) -> Vec<Error> {
    if reviews.is_approved() {
        return Vec::new();
    }

    let mut problems: Vec<Error> = reviews
        .changes_requested_by
        .iter()
        .map(|user| Error::Check(format!("{user} has requested changes on {url}")))
        .collect();
    if reviews.approvers.is_empty() {
        problems.push(Error::Check(format!("{url} has not been approved by anyone")));
    }
    problems
}

fn build_problems(build: &BuildStatus) -> Vec<Error> {
    if build.state == BuildState::Success {
        return Vec::new();
    }

    let problems: Vec<Error> = build
        .statuses
        .iter()
        .filter(|check| check.state != BuildState::Success)
        .map(|check| match check.state {
            BuildState::Pending => Error::Check(format!("{} is still running", check.name)),
            state => Error::Check(format!(
                "{} state is {state}: {}",
                check.name,
                check.message.as_deref().unwrap_or_default()
            )),
        })
        .collect();

    if problems.is_empty() {
        vec![Error::Check(format!("build state is {}", build.state))]
    } else {
        problems
    }
}
