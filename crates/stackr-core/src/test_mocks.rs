//! Mock implementations for testing.
//!
//! Both mocks record what they were asked to do behind a `Mutex` so they can
//! be shared across the tasks of a walk.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use stackr_git::{FetchRequest, GitOps, PushRequest, RebaseRequest};
use stackr_github::{
    BuildState, BuildStatus, GitHubApi, MergeResult, PullRequest, PullRequestBranch, Repo,
    Review, ReviewState, StatusCheck,
};

// === Git ===

#[derive(Default)]
struct GitState {
    branches: BTreeMap<String, String>,
    /// Resolvable refs that are not local branches, such as `origin/main`.
    refs: HashMap<String, String>,
    head: String,

    calls: Vec<String>,
    rebases: Vec<RebaseRequest>,
    pushes: Vec<PushRequest>,

    fail_rebase: HashSet<String>,
    fail_delete: HashSet<String>,
    fail_abort: bool,
    fail_push: bool,
    fail_fetch: bool,
}

impl GitState {
    fn resolve(&self, rev: &str) -> String {
        self.branches
            .get(rev)
            .or_else(|| self.refs.get(rev))
            .cloned()
            .unwrap_or_else(|| rev.to_string())
    }
}

/// In-memory repository with a `main` branch checked out.
pub struct MockGit {
    state: Mutex<GitState>,
}

impl MockGit {
    pub fn new() -> Self {
        let mut state = GitState {
            head: "main".into(),
            ..GitState::default()
        };
        state.branches.insert("main".into(), "main-sha".into());
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn with_branch(self, name: &str, sha: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .branches
            .insert(name.into(), sha.into());
        self
    }

    pub fn with_ref(self, name: &str, sha: &str) -> Self {
        self.state.lock().unwrap().refs.insert(name.into(), sha.into());
        self
    }

    pub fn with_head(self, name: &str) -> Self {
        self.state.lock().unwrap().head = name.into();
        self
    }

    pub fn fail_rebase_of(self, branch: &str) -> Self {
        self.state.lock().unwrap().fail_rebase.insert(branch.into());
        self
    }

    pub fn fail_abort(self) -> Self {
        self.state.lock().unwrap().fail_abort = true;
        self
    }

    pub fn fail_push(self) -> Self {
        self.state.lock().unwrap().fail_push = true;
        self
    }

    pub fn fail_fetch(self) -> Self {
        self.state.lock().unwrap().fail_fetch = true;
        self
    }

    pub fn fail_delete_of(&self, branch: &str) {
        self.state.lock().unwrap().fail_delete.insert(branch.into());
    }

    pub fn head(&self) -> String {
        self.state.lock().unwrap().head.clone()
    }

    pub fn branch_sha(&self, name: &str) -> Option<String> {
        self.state.lock().unwrap().branches.get(name).cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn rebases(&self) -> Vec<RebaseRequest> {
        self.state.lock().unwrap().rebases.clone()
    }

    pub fn pushes(&self) -> Vec<PushRequest> {
        self.state.lock().unwrap().pushes.clone()
    }

    pub fn temporary_branches(&self, prefix: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .branches
            .keys()
            .filter(|b| b.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

impl GitOps for MockGit {
    fn current_branch(&self) -> stackr_git::Result<String> {
        let state = self.state.lock().unwrap();
        if state.branches.contains_key(&state.head) {
            Ok(state.head.clone())
        } else {
            Err(stackr_git::Error::DetachedHead)
        }
    }

    fn sha1(&self, rev: &str) -> stackr_git::Result<String> {
        let state = self.state.lock().unwrap();
        state
            .branches
            .get(rev)
            .or_else(|| state.refs.get(rev))
            .cloned()
            .ok_or_else(|| stackr_git::Error::RefNotFound(rev.into()))
    }

    fn remote_url(&self, remote: &str) -> stackr_git::Result<String> {
        Err(stackr_git::Error::RemoteNotFound(remote.into()))
    }

    fn branch_exists(&self, name: &str) -> bool {
        self.state.lock().unwrap().branches.contains_key(name)
    }

    fn create_branch(&self, name: &str, head: &str) -> stackr_git::Result<()> {
        self.record(format!("create_branch {name} {head}"));
        let mut state = self.state.lock().unwrap();
        if state.branches.contains_key(name) {
            return Err(stackr_git::Error::BranchExists(name.into()));
        }
        let sha = state.resolve(head);
        state.branches.insert(name.into(), sha);
        Ok(())
    }

    fn create_branch_and_checkout(&self, name: &str, head: &str) -> stackr_git::Result<()> {
        self.record(format!("create_branch_and_checkout {name} {head}"));
        let mut state = self.state.lock().unwrap();
        if state.branches.contains_key(name) {
            return Err(stackr_git::Error::BranchExists(name.into()));
        }
        let sha = state.resolve(head);
        state.branches.insert(name.into(), sha);
        state.head = name.into();
        Ok(())
    }

    fn checkout(&self, rev: &str) -> stackr_git::Result<()> {
        self.record(format!("checkout {rev}"));
        self.state.lock().unwrap().head = rev.into();
        Ok(())
    }

    fn delete_branch(&self, name: &str) -> stackr_git::Result<()> {
        self.record(format!("delete_branch {name}"));
        let mut state = self.state.lock().unwrap();
        if state.fail_delete.contains(name) || state.head == name {
            return Err(stackr_git::Error::BranchNotFound(name.into()));
        }
        state
            .branches
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| stackr_git::Error::BranchNotFound(name.into()))
    }

    fn delete_remote_tracking_branch(&self, remote: &str, name: &str) -> stackr_git::Result<()> {
        self.record(format!("delete_remote_tracking_branch {remote} {name}"));
        let tracking = format!("{remote}/{name}");
        let mut state = self.state.lock().unwrap();
        if state.fail_delete.contains(&tracking) {
            return Err(stackr_git::Error::BranchNotFound(tracking));
        }
        state.refs.remove(&tracking);
        Ok(())
    }

    fn reset_branch(&self, branch: &str, head: &str) -> stackr_git::Result<()> {
        self.record(format!("reset_branch {branch} {head}"));
        let mut state = self.state.lock().unwrap();
        let sha = state.resolve(head);
        state.branches.insert(branch.into(), sha);
        Ok(())
    }

    fn rebase(&self, req: &RebaseRequest) -> stackr_git::Result<()> {
        self.record(format!(
            "rebase {} --onto {} {}",
            req.branch, req.onto, req.from
        ));
        let mut state = self.state.lock().unwrap();
        state.rebases.push(req.clone());
        if state.fail_rebase.contains(&req.branch) {
            return Err(stackr_git::Error::RebaseConflict {
                branch: req.branch.clone(),
                files: vec!["conflict.txt".into()],
            });
        }
        let onto = state.resolve(&req.onto);
        let old = state.resolve(&req.branch);
        state
            .branches
            .insert(req.branch.clone(), format!("{old}@{onto}"));
        Ok(())
    }

    fn rebase_abort(&self) -> stackr_git::Result<()> {
        self.record("rebase_abort".into());
        if self.state.lock().unwrap().fail_abort {
            return Err(stackr_git::Error::RebaseFailed(
                "abort".into(),
                "could not remove rebase state".into(),
            ));
        }
        Ok(())
    }

    fn fetch(&self, req: &FetchRequest) -> stackr_git::Result<()> {
        self.record(format!("fetch {}", req.remote));
        if self.state.lock().unwrap().fail_fetch {
            return Err(stackr_git::Error::FetchFailed {
                remote: req.remote.clone(),
                refspec: String::new(),
                message: "network unreachable".into(),
            });
        }
        Ok(())
    }

    fn push(&self, req: &PushRequest) -> stackr_git::Result<()> {
        self.record(format!("push {} {}", req.remote, req.refspecs().join(" ")));
        let mut state = self.state.lock().unwrap();
        state.pushes.push(req.clone());
        if state.fail_push {
            return Err(stackr_git::Error::PushFailed {
                remote: req.remote.clone(),
                message: "rejected".into(),
            });
        }
        for (local, remote) in &req.refs {
            let sha = state.resolve(local);
            state.refs.insert(format!("{}/{remote}", req.remote), sha);
        }
        Ok(())
    }

    fn pull(&self, remote: &str, branch: &str) -> stackr_git::Result<()> {
        self.record(format!("pull {remote} {branch}"));
        Ok(())
    }
}

// === GitHub ===

#[derive(Default)]
struct GitHubState {
    by_base: HashMap<String, Vec<PullRequest>>,
    reviews: HashMap<u64, Vec<Review>>,
    build_status: HashMap<String, BuildStatus>,

    base_queries: Vec<String>,
    base_updates: Vec<(u64, String)>,
    squashed: Vec<(u64, String, String)>,
    deleted_branches: Vec<String>,

    fail_set_base: HashSet<u64>,
    fail_list_base: HashSet<String>,
    fail_squash: bool,
}

/// GitHub bound to `owner/repo`.
pub struct MockGitHub {
    repo: Repo,
    state: Mutex<GitHubState>,
    list_delay: Option<Duration>,
}

impl MockGitHub {
    pub fn new() -> Self {
        Self {
            repo: Repo::new("owner", "repo"),
            state: Mutex::new(GitHubState::default()),
            list_delay: None,
        }
    }

    /// Register `pr` as a dependent of its base branch.
    pub fn with_pull_request(self, pr: PullRequest) -> Self {
        self.state
            .lock()
            .unwrap()
            .by_base
            .entry(pr.base.ref_name.clone())
            .or_default()
            .push(pr);
        self
    }

    pub fn with_reviews(self, number: u64, reviews: Vec<Review>) -> Self {
        self.state.lock().unwrap().reviews.insert(number, reviews);
        self
    }

    pub fn with_build_status(self, sha: &str, status: BuildStatus) -> Self {
        self.state
            .lock()
            .unwrap()
            .build_status
            .insert(sha.into(), status);
        self
    }

    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    pub fn fail_set_base_of(self, number: u64) -> Self {
        self.state.lock().unwrap().fail_set_base.insert(number);
        self
    }

    pub fn fail_list_base_of(self, branch: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_list_base
            .insert(branch.into());
        self
    }

    pub fn fail_squash(self) -> Self {
        self.state.lock().unwrap().fail_squash = true;
        self
    }

    pub fn base_queries(&self) -> Vec<String> {
        self.state.lock().unwrap().base_queries.clone()
    }

    pub fn base_updates(&self) -> Vec<(u64, String)> {
        let mut updates = self.state.lock().unwrap().base_updates.clone();
        updates.sort();
        updates
    }

    pub fn squashed(&self) -> Vec<(u64, String, String)> {
        self.state.lock().unwrap().squashed.clone()
    }

    pub fn deleted_branches(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_branches.clone()
    }
}

impl GitHubApi for MockGitHub {
    fn repo(&self) -> &Repo {
        &self.repo
    }

    async fn list_pull_requests_by_head(
        &self,
        _owner: Option<&str>,
        branch: &str,
    ) -> stackr_github::Result<Vec<PullRequest>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .by_base
            .values()
            .flatten()
            .filter(|pr| pr.head.ref_name == branch)
            .cloned()
            .collect())
    }

    async fn list_pull_requests_by_base(
        &self,
        branch: &str,
    ) -> stackr_github::Result<Vec<PullRequest>> {
        self.state
            .lock()
            .unwrap()
            .base_queries
            .push(branch.into());
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock().unwrap();
        if state.fail_list_base.contains(branch) {
            return Err(stackr_github::Error::ApiError {
                status: 502,
                message: "bad gateway".into(),
            });
        }
        Ok(state.by_base.get(branch).cloned().unwrap_or_default())
    }

    async fn get_pull_request_patch(&self, number: u64) -> stackr_github::Result<String> {
        Ok(format!("patch for #{number}"))
    }

    async fn set_pull_request_base(&self, number: u64, base: &str) -> stackr_github::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_set_base.contains(&number) {
            return Err(stackr_github::Error::ApiError {
                status: 422,
                message: "Validation Failed".into(),
            });
        }
        state.base_updates.push((number, base.into()));
        Ok(())
    }

    async fn squash_pull_request(
        &self,
        number: u64,
        title: &str,
        body: &str,
    ) -> stackr_github::Result<MergeResult> {
        let mut state = self.state.lock().unwrap();
        if state.fail_squash {
            return Err(stackr_github::Error::MergeFailed {
                number,
                message: "Head branch was modified".into(),
            });
        }
        state.squashed.push((number, title.into(), body.into()));
        Ok(MergeResult {
            sha: "merged-sha".into(),
            merged: true,
            message: "Pull Request successfully merged".into(),
        })
    }

    async fn delete_branch(&self, name: &str) -> stackr_github::Result<()> {
        self.state
            .lock()
            .unwrap()
            .deleted_branches
            .push(name.into());
        Ok(())
    }

    async fn get_build_status(&self, git_ref: &str) -> stackr_github::Result<BuildStatus> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .build_status
            .get(git_ref)
            .cloned()
            .unwrap_or_else(|| success()))
    }

    async fn list_pull_request_reviews(&self, number: u64) -> stackr_github::Result<Vec<Review>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .reviews
            .get(&number)
            .cloned()
            .unwrap_or_default())
    }
}

// === Fixtures ===

fn branch(name: &str, repo: Option<Repo>) -> PullRequestBranch {
    PullRequestBranch {
        ref_name: name.into(),
        sha: format!("{name}-sha"),
        repo,
    }
}

/// An open pull request from `head` into `base`, both in `owner/repo`.
pub fn pull_request(number: u64, head: &str, base: &str) -> PullRequest {
    PullRequest {
        number,
        title: format!("Change {number}"),
        body: Some(format!("Body of change {number}")),
        html_url: format!("https://github.com/owner/repo/pull/{number}"),
        author: "octocat".into(),
        head: branch(head, Some(Repo::new("owner", "repo"))),
        base: branch(base, Some(Repo::new("owner", "repo"))),
    }
}

/// Like [`pull_request`] but opened from a fork.
pub fn fork_pull_request(number: u64, head: &str, base: &str) -> PullRequest {
    PullRequest {
        head: branch(head, Some(Repo::new("someone", "repo"))),
        ..pull_request(number, head, base)
    }
}

pub fn review(user: &str, state: ReviewState) -> Review {
    Review {
        user: user.into(),
        state,
        submitted_at: None,
    }
}

pub fn success() -> BuildStatus {
    BuildStatus {
        state: BuildState::Success,
        statuses: Vec::new(),
    }
}

pub fn status(state: BuildState, checks: &[(&str, BuildState, &str)]) -> BuildStatus {
    BuildStatus {
        state,
        statuses: checks
            .iter()
            .map(|(name, state, message)| StatusCheck {
                name: (*name).into(),
                state: *state,
                message: Some((*message).into()),
            })
            .collect(),
    }
}
