//! Rebasing stacks of pull requests.
//!
//! [`RebaseService::rebase`] moves a set of pull requests, and every pull
//! request stacked on top of them, onto a new base. Nothing is published
//! until every rebase succeeded locally: the walk runs entirely on temporary
//! branches, then the results are force-pushed in one go, local branches that
//! still match GitHub are reset to the new heads, and the requested pull
//! requests are retargeted onto the new base.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::{StreamExt, stream};
use stackr_git::{FetchRequest, GitOps, PushRequest};
use stackr_github::{GitHubApi, PullRequest};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, MultiError, Result};
use crate::rebaser::{BulkRebaser, RebaseHandle};
use crate::walk::{Visitor, WalkConfig, walk};

/// A request to rebase pull requests and their dependents.
#[derive(Debug, Clone, Default)]
pub struct RebaseRequest {
    /// Pull requests to rebase. Their dependents follow.
    pub pull_requests: Vec<PullRequest>,

    /// Branch to rebase onto, as named on the remote.
    pub base: String,

    /// Only rebase pull requests opened by this user.
    pub author: Option<String>,
}

/// Outcome of a rebase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebaseResponse {
    /// Local branches left alone because they no longer matched GitHub.
    pub branches_not_updated: Vec<String>,
}

/// A pull request whose commits now live on a local branch.
#[derive(Debug, Clone)]
pub struct RebasedPullRequest {
    /// The pull request as it was before rebasing.
    pub pull_request: PullRequest,

    /// Local branch holding the rebased commits. Pushed to the pull
    /// request's head branch.
    pub local_branch: String,
}

/// Settings for [`RebaseService`].
#[derive(Debug, Clone)]
pub struct RebaseConfig {
    /// Remote the pull request branches live on.
    pub remote: String,

    /// Maximum number of pull requests handled at once. Zero means the
    /// available parallelism.
    pub concurrency: usize,

    /// Prefix for temporary branches.
    pub branch_prefix: String,

    /// Give up on discovery and retargeting after this long.
    pub timeout: Option<Duration>,
}

impl Default for RebaseConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl RebaseConfig {
    /// Settings taken from the repository configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            remote: config.general.remote.clone(),
            concurrency: config.general.concurrency.unwrap_or(0),
            branch_prefix: config.general.branch_prefix.clone(),
            timeout: None,
        }
    }
}

/// Visits one pull request per node: rebases it onto the handle inherited
/// from its parent and hands the new handle to its dependents.
struct RebaseVisitor<G, H> {
    github: Arc<H>,
    author: Option<Arc<str>>,
    handle: RebaseHandle<G>,
    results: Arc<Mutex<HashMap<u64, RebasedPullRequest>>>,
}

impl<G, H> Clone for RebaseVisitor<G, H> {
    fn clone(&self) -> Self {
        Self {
            github: Arc::clone(&self.github),
            author: self.author.clone(),
            handle: self.handle.clone(),
            results: Arc::clone(&self.results),
        }
    }
}

impl<G, H> RebaseVisitor<G, H>
where
    G: GitOps + 'static,
    H: GitHubApi + 'static,
{
    fn should_rebase(&self, pr: &PullRequest) -> bool {
        if !self.github.is_owned(&pr.head) {
            debug!(number = pr.number, branch = %pr.head.ref_name, "skipping pull request from another repository");
            return false;
        }
        if let Some(author) = &self.author {
            if !pr.author.eq_ignore_ascii_case(author) {
                debug!(number = pr.number, author = %pr.author, "skipping pull request by another author");
                return false;
            }
        }
        true
    }
}

impl<G, H> Visitor<PullRequest> for RebaseVisitor<G, H>
where
    G: GitOps + 'static,
    H: GitHubApi + 'static,
{
    async fn visit(&self, pr: &PullRequest) -> Result<Option<Self>> {
        if !self.should_rebase(pr) {
            return Ok(None);
        }

        let handle = self.handle.clone();
        let (from, to) = (pr.base.sha.clone(), pr.head.sha.clone());
        let next = match tokio::task::spawn_blocking(move || handle.rebase(&from, &to)).await {
            Ok(next) => next,
            Err(e) => match e.try_into_panic() {
                Ok(payload) => std::panic::resume_unwind(payload),
                Err(e) => return Err(Error::Interrupted(e.to_string())),
            },
        };

        match next.base() {
            Ok(branch) => {
                info!(number = pr.number, branch = %pr.head.ref_name, local = %branch, "rebased pull request");
                self.results
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(
                        pr.number,
                        RebasedPullRequest {
                            pull_request: pr.clone(),
                            local_branch: branch.to_string(),
                        },
                    );
            }
            Err(e) => warn!(number = pr.number, error = %e, "could not rebase pull request"),
        }

        Ok(Some(Self {
            handle: next,
            ..self.clone()
        }))
    }
}

/// Rebase `pull_requests` and everything stacked on them onto `base`.
///
/// Dependents are found by asking GitHub which pull requests are based on
/// each head branch, and are rebased onto their parent's rebased commits.
///
/// # Errors
/// Fails if any dependent lookup or rebase step fails. Partial results are
/// discarded.
pub async fn rebase_pull_requests<G, H>(
    github: &Arc<H>,
    rebaser: &Arc<BulkRebaser<G>>,
    base: &str,
    pull_requests: Vec<PullRequest>,
    author: Option<&str>,
    concurrency: usize,
) -> Result<HashMap<u64, RebasedPullRequest>>
where
    G: GitOps + 'static,
    H: GitHubApi + 'static,
{
    let results = Arc::new(Mutex::new(HashMap::new()));
    let visitor = RebaseVisitor {
        github: Arc::clone(github),
        author: author.map(Arc::from),
        handle: rebaser.onto(base),
        results: Arc::clone(&results),
    };

    let dependents = Arc::clone(github);
    let config = WalkConfig {
        concurrency,
        children: move |pr: PullRequest| {
            let github = Arc::clone(&dependents);
            async move {
                github
                    .list_pull_requests_by_base(&pr.head.ref_name)
                    .await
                    .map_err(Error::from)
            }
        },
    };

    walk(config, pull_requests, visitor).await?;
    rebaser.err()?;

    let results = std::mem::take(&mut *results.lock().unwrap_or_else(PoisonError::into_inner));
    Ok(results)
}

/// Rebases stacks of pull requests and publishes the result.
pub struct RebaseService<G, H> {
    git: Arc<G>,
    github: Arc<H>,
    config: RebaseConfig,
}

impl<G, H> RebaseService<G, H>
where
    G: GitOps + 'static,
    H: GitHubApi + 'static,
{
    /// Create a new rebase service.
    #[must_use]
    pub const fn new(git: Arc<G>, github: Arc<H>, config: RebaseConfig) -> Self {
        Self {
            git,
            github,
            config,
        }
    }

    /// Rebase the requested pull requests and their dependents onto
    /// `request.base`, push them, and retarget the requested pull requests.
    ///
    /// The branch checked out beforehand is checked out again afterwards,
    /// whatever the outcome.
    ///
    /// # Errors
    /// Fails without publishing anything if fetching, discovery, or any
    /// rebase fails, or if the push is rejected. Failures after the push are
    /// reported as [`Error::PartiallyPublished`].
    pub async fn rebase(&self, request: RebaseRequest) -> Result<RebaseResponse> {
        if request.pull_requests.is_empty() {
            return Ok(RebaseResponse::default());
        }

        let original = self.git.current_branch()?;
        let result = self.fetch_and_rebase(&request).await;
        debug!(branch = %original, "restoring checkout");
        release(result, self.git.checkout(&original).map_err(Error::from))
    }

    async fn fetch_and_rebase(&self, request: &RebaseRequest) -> Result<RebaseResponse> {
        let remote = &self.config.remote;
        self.git.fetch(&FetchRequest::all(remote.as_str()))?;
        let base = self.git.sha1(&format!("{remote}/{}", request.base))?;
        info!(base = %request.base, sha = %base, "rebasing onto");

        let rebaser = BulkRebaser::new(Arc::clone(&self.git), self.config.branch_prefix.as_str());
        let result = self.rebase_and_publish(&rebaser, &base, request).await;
        release(result, rebaser.cleanup())
    }

    async fn rebase_and_publish(
        &self,
        rebaser: &Arc<BulkRebaser<G>>,
        base: &str,
        request: &RebaseRequest,
    ) -> Result<RebaseResponse> {
        let results = self
            .with_timeout(rebase_pull_requests(
                &self.github,
                rebaser,
                base,
                request.pull_requests.clone(),
                request.author.as_deref(),
                self.config.concurrency,
            ))
            .await??;

        if results.is_empty() {
            return Ok(RebaseResponse::default());
        }

        let mut rebased: Vec<_> = results.into_values().collect();
        rebased.sort_by_key(|r| r.pull_request.number);

        let mut to_reset = Vec::new();
        let mut response = RebaseResponse::default();
        let mut pushes = BTreeMap::new();
        for r in rebased {
            let branch = r.pull_request.head.ref_name.clone();
            if self.git.branch_exists(&branch) {
                if self.git.sha1(&branch)? == r.pull_request.head.sha {
                    to_reset.push(branch.clone());
                } else {
                    warn!(%branch, "local branch differs from GitHub, leaving it alone");
                    response.branches_not_updated.push(branch.clone());
                }
            }
            pushes.insert(r.local_branch, branch);
        }

        info!(branches = pushes.len(), "pushing rebased branches");
        self.git.push(&PushRequest {
            remote: self.config.remote.clone(),
            refs: pushes,
            force: true,
        })?;

        let mut errors = MultiError::new();
        for branch in &to_reset {
            let upstream = format!("{}/{branch}", self.config.remote);
            debug!(%branch, %upstream, "resetting local branch");
            errors.check(self.git.reset_branch(branch, &upstream).map_err(Error::from));
        }

        match self.with_timeout(self.update_bases(request)).await {
            Ok(base_errors) => errors.extend(base_errors),
            Err(e) => errors.push(e),
        }

        if errors.is_empty() {
            Ok(response)
        } else {
            Err(Error::PartiallyPublished { response, errors })
        }
    }

    /// Point every requested pull request that is not already on the new
    /// base at it.
    async fn update_bases(&self, request: &RebaseRequest) -> MultiError {
        let updates = request
            .pull_requests
            .iter()
            .filter(|pr| pr.base.ref_name != request.base)
            .map(|pr| async move {
                debug!(number = pr.number, base = %request.base, "updating base");
                self.github
                    .set_pull_request_base(pr.number, &request.base)
                    .await
                    .map_err(|source| Error::SetBase {
                        url: pr.html_url.clone(),
                        base: request.base.clone(),
                        source,
                    })
            });

        let results: Vec<Result<()>> = stream::iter(updates)
            .buffer_unordered(self.fan_out())
            .collect()
            .await;

        results.into_iter().filter_map(Result::err).collect()
    }

    fn fan_out(&self) -> usize {
        if self.config.concurrency > 0 {
            self.config.concurrency
        } else {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        }
    }

    async fn with_timeout<T>(&self, fut: impl std::future::Future<Output = T>) -> Result<T> {
        match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| Error::TimedOut(limit)),
            None => Ok(fut.await),
        }
    }
}

/// Combine the outcome of an operation with the outcome of releasing what it
/// held. A release failure after a successful rebase keeps the response.
fn release(result: Result<RebaseResponse>, released: Result<()>) -> Result<RebaseResponse> {
    let Err(release_err) = released else {
        return result;
    };
    warn!(error = %release_err, "cleanup failed");

    match result {
        Ok(response) => {
            let mut errors = MultiError::new();
            errors.push(release_err);
            Err(Error::PartiallyPublished { response, errors })
        }
        Err(Error::PartiallyPublished { response, mut errors }) => {
            errors.push(release_err);
            Err(Error::PartiallyPublished { response, errors })
        }
        Err(err) => {
            let mut errors = MultiError::new();
            errors.push(err);
            errors.push(release_err);
            Err(Error::Multiple(errors))
        }
    }
}
