//! Repository wrapper providing high-level git operations.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::{Mutex, MutexGuard, PoisonError};

use git2::{BranchType, ErrorCode, RepositoryState, Signature};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::traits::{FetchRequest, GitOps, PushRequest, RebaseRequest};

/// High-level wrapper around a git repository.
///
/// The underlying `git2::Repository` is not `Sync`, so every operation takes
/// a lock on it. Commands run through the `git` executable hold the same lock.
pub struct Repository {
    inner: Mutex<git2::Repository>,
    workdir: PathBuf,
}

impl Repository {
    /// Open the repository containing `path`, searching parent directories.
    ///
    /// # Errors
    /// Returns error if no repository is found at path or any parent, or if
    /// the repository is bare.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let inner = git2::Repository::discover(path).map_err(|_| Error::NotARepository)?;
        let workdir = inner
            .workdir()
            .ok_or(Error::NotARepository)?
            .to_path_buf();

        Ok(Self {
            inner: Mutex::new(inner),
            workdir,
        })
    }

    /// Open the repository containing the current directory.
    ///
    /// # Errors
    /// Returns error if not inside a git repository.
    pub fn open_current() -> Result<Self> {
        Self::open(".")
    }

    /// Get the path to the repository root (workdir).
    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Get the path to the .git directory.
    #[must_use]
    pub fn git_dir(&self) -> PathBuf {
        self.repo().path().to_path_buf()
    }

    /// Check if there's a rebase in progress.
    #[must_use]
    pub fn is_rebasing(&self) -> bool {
        is_rebasing(&self.repo())
    }

    fn repo(&self) -> MutexGuard<'_, git2::Repository> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `git` in the work tree. The caller holds the repository lock.
    fn run_git(&self, _guard: &git2::Repository, args: &[&str]) -> Result<Output> {
        debug!(?args, "running git");
        Ok(Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()?)
    }
}

fn is_rebasing(repo: &git2::Repository) -> bool {
    matches!(
        repo.state(),
        RepositoryState::Rebase | RepositoryState::RebaseInteractive | RepositoryState::RebaseMerge
    )
}

fn resolve_commit<'r>(repo: &'r git2::Repository, rev: &str) -> Result<git2::Commit<'r>> {
    repo.revparse_single(rev)
        .and_then(|object| object.peel_to_commit())
        .map_err(|_| Error::RefNotFound(rev.to_string()))
}

fn checkout_in(repo: &git2::Repository, rev: &str) -> Result<()> {
    if let Ok(branch) = repo.find_branch(rev, BranchType::Local) {
        let object = branch.get().peel(git2::ObjectType::Commit)?;
        repo.checkout_tree(&object, None)?;
        repo.set_head(&format!("refs/heads/{rev}"))?;
        return Ok(());
    }

    let commit = resolve_commit(repo, rev)?;
    repo.checkout_tree(commit.as_object(), None)?;
    repo.set_head_detached(commit.id())?;
    Ok(())
}

fn current_branch_in(repo: &git2::Repository) -> Result<String> {
    let head = repo.head()?;
    if !head.is_branch() {
        return Err(Error::DetachedHead);
    }

    head.shorthand()
        .map(String::from)
        .ok_or(Error::DetachedHead)
}

fn conflicted_paths(index: &git2::Index) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for conflict in index.conflicts()? {
        let conflict = conflict?;
        if let Some(entry) = conflict.their.or(conflict.our).or(conflict.ancestor) {
            files.push(String::from_utf8_lossy(&entry.path).into_owned());
        }
    }
    Ok(files)
}

/// Apply every pending rebase operation, committing each one.
fn apply_rebase(
    repo: &git2::Repository,
    rebase: &mut git2::Rebase<'_>,
    committer: &Signature<'_>,
    branch: &str,
) -> Result<()> {
    while let Some(operation) = rebase.next() {
        operation?;

        let index = repo.index()?;
        if index.has_conflicts() {
            return Err(Error::RebaseConflict {
                branch: branch.to_string(),
                files: conflicted_paths(&index)?,
            });
        }

        match rebase.commit(None, committer, None) {
            Ok(_) => {}
            // The change already exists upstream; nothing to commit.
            Err(e) if e.code() == ErrorCode::Applied => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

impl GitOps for Repository {
    fn current_branch(&self) -> Result<String> {
        current_branch_in(&self.repo())
    }

    fn sha1(&self, rev: &str) -> Result<String> {
        let repo = self.repo();
        Ok(resolve_commit(&repo, rev)?.id().to_string())
    }

    fn remote_url(&self, remote: &str) -> Result<String> {
        let repo = self.repo();
        let found = repo
            .find_remote(remote)
            .map_err(|_| Error::RemoteNotFound(remote.into()))?;

        found
            .url()
            .map(String::from)
            .ok_or_else(|| Error::InvalidRemoteUrl(remote.into()))
    }

    fn branch_exists(&self, name: &str) -> bool {
        self.repo().find_branch(name, BranchType::Local).is_ok()
    }

    fn create_branch(&self, name: &str, head: &str) -> Result<()> {
        let repo = self.repo();
        let commit = resolve_commit(&repo, head)?;
        repo.branch(name, &commit, false).map_err(|e| {
            if e.code() == ErrorCode::Exists {
                Error::BranchExists(name.into())
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    fn create_branch_and_checkout(&self, name: &str, head: &str) -> Result<()> {
        let repo = self.repo();
        let commit = resolve_commit(&repo, head)?;
        repo.branch(name, &commit, false).map_err(|e| {
            if e.code() == ErrorCode::Exists {
                Error::BranchExists(name.into())
            } else {
                e.into()
            }
        })?;
        checkout_in(&repo, name)
    }

    fn checkout(&self, rev: &str) -> Result<()> {
        checkout_in(&self.repo(), rev)
    }

    fn delete_branch(&self, name: &str) -> Result<()> {
        let repo = self.repo();
        let mut branch = repo
            .find_branch(name, BranchType::Local)
            .map_err(|_| Error::BranchNotFound(name.into()))?;
        branch.delete()?;
        Ok(())
    }

    fn delete_remote_tracking_branch(&self, remote: &str, name: &str) -> Result<()> {
        let repo = self.repo();
        let tracking = format!("{remote}/{name}");
        let mut branch = repo
            .find_branch(&tracking, BranchType::Remote)
            .map_err(|_| Error::BranchNotFound(tracking.clone()))?;
        branch.delete()?;
        Ok(())
    }

    fn reset_branch(&self, branch: &str, head: &str) -> Result<()> {
        let repo = self.repo();
        let commit = resolve_commit(&repo, head)?;
        let target = commit.id();

        repo.reference(
            &format!("refs/heads/{branch}"),
            target,
            true, // force
            &format!("stackr: reset to {head}"),
        )?;

        // If this is the current branch, also update working directory
        if current_branch_in(&repo).ok().as_deref() == Some(branch) {
            repo.reset(commit.as_object(), git2::ResetType::Hard, None)?;
        }

        Ok(())
    }

    fn rebase(&self, req: &RebaseRequest) -> Result<()> {
        let repo = self.repo();

        let branch_ref = repo
            .find_reference(&format!("refs/heads/{}", req.branch))
            .map_err(|_| Error::BranchNotFound(req.branch.clone()))?;
        let branch = repo.reference_to_annotated_commit(&branch_ref)?;
        let upstream = repo.find_annotated_commit(resolve_commit(&repo, &req.from)?.id())?;
        let onto = repo.find_annotated_commit(resolve_commit(&repo, &req.onto)?.id())?;

        let committer = repo.signature()?;
        let mut rebase = repo
            .rebase(Some(&branch), Some(&upstream), Some(&onto), None)
            .map_err(|e| Error::RebaseFailed(req.branch.clone(), e.message().to_string()))?;

        if let Err(e) = apply_rebase(&repo, &mut rebase, &committer, &req.branch) {
            if let Err(abort_err) = rebase.abort() {
                warn!(branch = %req.branch, error = %abort_err, "failed to abort rebase");
            }
            return Err(e);
        }

        rebase.finish(Some(&committer))?;
        Ok(())
    }

    fn rebase_abort(&self) -> Result<()> {
        let repo = self.repo();
        if !is_rebasing(&repo) {
            return Ok(());
        }
        repo.open_rebase(None)?.abort()?;
        Ok(())
    }

    fn fetch(&self, req: &FetchRequest) -> Result<()> {
        let repo = self.repo();
        let refspec = req.refspec();

        let mut args = vec!["fetch", req.remote.as_str()];
        if let Some(refspec) = &refspec {
            args.push(refspec);
        }

        let output = self.run_git(&repo, &args)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::FetchFailed {
                remote: req.remote.clone(),
                refspec: refspec.unwrap_or_default(),
                message: stderr_of(&output),
            })
        }
    }

    fn push(&self, req: &PushRequest) -> Result<()> {
        if req.refs.is_empty() {
            return Ok(());
        }

        let repo = self.repo();
        let refspecs = req.refspecs();

        let mut args = vec!["push"];
        if req.force {
            args.push("--force");
        }
        args.push(&req.remote);
        args.extend(refspecs.iter().map(String::as_str));

        let output = self.run_git(&repo, &args)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::PushFailed {
                remote: req.remote.clone(),
                message: stderr_of(&output),
            })
        }
    }

    fn pull(&self, remote: &str, branch: &str) -> Result<()> {
        let repo = self.repo();
        let output = self.run_git(&repo, &["pull", remote, branch])?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::PullFailed {
                remote: remote.into(),
                branch: branch.into(),
                message: stderr_of(&output),
            })
        }
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("workdir", &self.workdir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn init_test_repo() -> (TempDir, Repository) {
        let temp = TempDir::new().unwrap();
        let repo = git2::Repository::init(temp.path()).unwrap();

        // Create initial commit (scoped to drop borrows before moving repo)
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Test User").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();

            let sig = repo.signature().unwrap();
            let tree_id = repo.index().unwrap().write_tree().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])
                .unwrap();
        }

        let wrapped = Repository::open(temp.path()).unwrap();
        (temp, wrapped)
    }

    /// Commit `content` to `file` on the current branch and return the new hash.
    fn commit_file(temp: &TempDir, repo: &Repository, file: &str, content: &str) -> String {
        fs::write(temp.path().join(file), content).unwrap();

        let inner = repo.repo();
        let mut index = inner.index().unwrap();
        index.add_path(Path::new(file)).unwrap();
        index.write().unwrap();

        let tree = inner.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = inner.signature().unwrap();
        let parent = inner.head().unwrap().peel_to_commit().unwrap();
        inner
            .commit(Some("HEAD"), &sig, &sig, file, &tree, &[&parent])
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_current_branch() {
        let (_temp, repo) = init_test_repo();
        // Default branch after init
        let branch = repo.current_branch().unwrap();
        assert!(branch == "main" || branch == "master");
    }

    #[test]
    fn test_create_and_checkout_branch() {
        let (_temp, repo) = init_test_repo();

        repo.create_branch_and_checkout("feature/test", "HEAD").unwrap();
        assert!(repo.branch_exists("feature/test"));
        assert_eq!(repo.current_branch().unwrap(), "feature/test");
    }

    #[test]
    fn test_create_existing_branch_fails() {
        let (_temp, repo) = init_test_repo();

        repo.create_branch("feature", "HEAD").unwrap();
        assert!(matches!(
            repo.create_branch_and_checkout("feature", "HEAD"),
            Err(Error::BranchExists(name)) if name == "feature"
        ));
    }

    #[test]
    fn test_sha1_unknown_ref() {
        let (_temp, repo) = init_test_repo();
        assert!(matches!(
            repo.sha1("does-not-exist"),
            Err(Error::RefNotFound(_))
        ));
    }

    #[test]
    fn test_checkout_detached_and_delete() {
        let (temp, repo) = init_test_repo();
        let trunk = repo.current_branch().unwrap();
        let first = repo.sha1("HEAD").unwrap();
        commit_file(&temp, &repo, "a.txt", "a");

        repo.create_branch_and_checkout("scratch", &first).unwrap();
        repo.checkout(&first).unwrap();
        assert!(matches!(repo.current_branch(), Err(Error::DetachedHead)));

        repo.delete_branch("scratch").unwrap();
        assert!(!repo.branch_exists("scratch"));

        repo.checkout(&trunk).unwrap();
        assert_eq!(repo.current_branch().unwrap(), trunk);
    }

    #[test]
    fn test_reset_branch() {
        let (temp, repo) = init_test_repo();
        let first = repo.sha1("HEAD").unwrap();
        repo.create_branch("other", "HEAD").unwrap();
        let second = commit_file(&temp, &repo, "a.txt", "a");

        repo.reset_branch("other", &second).unwrap();
        assert_eq!(repo.sha1("other").unwrap(), second);

        // Resetting the checked-out branch also resets the work tree.
        let trunk = repo.current_branch().unwrap();
        repo.reset_branch(&trunk, &first).unwrap();
        assert_eq!(repo.sha1("HEAD").unwrap(), first);
        assert!(!temp.path().join("a.txt").exists());
    }

    #[test]
    fn test_rebase_onto() {
        let (temp, repo) = init_test_repo();
        let trunk = repo.current_branch().unwrap();
        let fork_point = repo.sha1("HEAD").unwrap();

        repo.create_branch_and_checkout("feature", &fork_point).unwrap();
        let feature = commit_file(&temp, &repo, "feature.txt", "feature");

        repo.checkout(&trunk).unwrap();
        let upstream = commit_file(&temp, &repo, "upstream.txt", "upstream");

        repo.create_branch_and_checkout("rebased", &feature).unwrap();
        repo.rebase(&RebaseRequest {
            onto: upstream.clone(),
            from: fork_point,
            branch: "rebased".into(),
        })
        .unwrap();

        assert_eq!(repo.current_branch().unwrap(), "rebased");
        assert!(temp.path().join("feature.txt").exists());
        assert!(temp.path().join("upstream.txt").exists());

        let inner = repo.repo();
        let tip = resolve_commit(&inner, "rebased").unwrap();
        assert_eq!(tip.parent_id(0).unwrap().to_string(), upstream);
        // The original branch is untouched.
        assert_eq!(resolve_commit(&inner, "feature").unwrap().id().to_string(), feature);
    }

    #[test]
    fn test_rebase_conflict_aborts() {
        let (temp, repo) = init_test_repo();
        let trunk = repo.current_branch().unwrap();
        let fork_point = repo.sha1("HEAD").unwrap();

        repo.create_branch_and_checkout("feature", &fork_point).unwrap();
        let feature = commit_file(&temp, &repo, "shared.txt", "feature side");

        repo.checkout(&trunk).unwrap();
        let upstream = commit_file(&temp, &repo, "shared.txt", "upstream side");

        repo.create_branch_and_checkout("rebased", &feature).unwrap();
        let err = repo
            .rebase(&RebaseRequest {
                onto: upstream,
                from: fork_point,
                branch: "rebased".into(),
            })
            .unwrap_err();

        assert!(
            matches!(&err, Error::RebaseConflict { branch, files }
                if branch == "rebased" && files == &vec!["shared.txt".to_string()]),
            "unexpected error: {err}"
        );
        assert!(!repo.is_rebasing());
        assert_eq!(repo.sha1("rebased").unwrap(), feature);
        repo.rebase_abort().unwrap();
    }

    #[test]
    fn test_remote_url_missing() {
        let (_temp, repo) = init_test_repo();
        assert!(matches!(
            repo.remote_url("origin"),
            Err(Error::RemoteNotFound(_))
        ));
    }

    #[test]
    fn test_push_nothing_is_noop() {
        let (_temp, repo) = init_test_repo();
        repo.push(&PushRequest {
            remote: "nowhere".into(),
            ..PushRequest::default()
        })
        .unwrap();
    }
}
