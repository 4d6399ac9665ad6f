//! Chained rebases on disposable local branches.
//!
//! [`BulkRebaser`] never touches the branches it rebases. Every step creates a
//! temporary branch at the commit being replayed and rebases that instead, so
//! a failed batch leaves the repository as it was once [`BulkRebaser::cleanup`]
//! has removed the temporary branches.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stackr_git::{GitOps, RebaseRequest};
use tracing::{debug, warn};

use crate::error::{MultiError, Result};

/// Attempts made to find an unused branch name.
const UNIQUE_BRANCH_ATTEMPTS: usize = 10;

/// Why a rebase step did not produce a branch.
///
/// Cloned into every handle chained off a failed step.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RebaseError {
    /// Every candidate name was taken, or the ref could not be branched from.
    #[error(
        "could not find a unique branch name with prefix {prefix:?} after {attempts} attempts; \
         {reference:?} may not be a valid git ref: {source}"
    )]
    NoUniqueBranch {
        prefix: String,
        reference: String,
        attempts: usize,
        source: Arc<stackr_git::Error>,
    },

    /// Git could not replay the commits.
    #[error("failed to rebase {from}..{to} onto {onto}: {source}")]
    Step {
        onto: String,
        from: String,
        to: String,
        source: Arc<stackr_git::Error>,
    },

    /// A failed step left a rebase in progress that could not be aborted.
    #[error("failed to abort rebase of {from}..{to}; the working copy may still be mid-rebase: {source}")]
    Abort {
        from: String,
        to: String,
        source: Arc<stackr_git::Error>,
    },

    /// The rebaser was used after cleanup.
    #[error("rebaser has already been cleaned up")]
    Closed,
}

/// A branch created by the rebaser, and the branch to return to before
/// deleting it.
#[derive(Debug)]
struct TemporaryBranch {
    name: String,
    parent: String,
}

#[derive(Debug, Default)]
struct State {
    /// In creation order.
    branches: Vec<TemporaryBranch>,
    errors: Vec<RebaseError>,
    closed: bool,
}

/// Issues chained rebases onto temporary branches and removes them afterwards.
#[derive(Debug)]
pub struct BulkRebaser<G> {
    git: Arc<G>,
    prefix: String,
    /// Held for the whole of each step: steps share the working copy.
    state: Mutex<State>,
}

impl<G: GitOps> BulkRebaser<G> {
    /// Create a rebaser whose temporary branches are named `<prefix>/<ref>`.
    #[must_use]
    pub fn new(git: Arc<G>, prefix: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            git,
            prefix: prefix.into(),
            state: Mutex::new(State::default()),
        })
    }

    /// Start a chain of rebases on top of `base`.
    #[must_use]
    pub fn onto(self: &Arc<Self>, base: impl Into<String>) -> RebaseHandle<G> {
        RebaseHandle {
            rebaser: Arc::clone(self),
            state: HandleState::Valid { base: base.into() },
        }
    }

    /// Every step failure recorded so far. Cleanup failures are not included.
    ///
    /// # Errors
    /// Returns the aggregate of all failed steps.
    pub fn err(&self) -> Result<()> {
        self.lock().errors.iter().cloned().collect::<MultiError>().into_result()
    }

    /// Delete every temporary branch, newest first, checking out its parent
    /// before deleting it.
    ///
    /// Later steps and a second cleanup fail with [`RebaseError::Closed`].
    ///
    /// # Errors
    /// Returns the aggregate of checkout and delete failures.
    pub fn cleanup(&self) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(RebaseError::Closed.into());
        }
        state.closed = true;

        let mut errors = MultiError::new();
        while let Some(branch) = state.branches.pop() {
            debug!(branch = %branch.name, parent = %branch.parent, "removing temporary branch");
            if let Err(e) = self.git.checkout(&branch.parent) {
                warn!(branch = %branch.name, error = %e, "could not leave temporary branch");
                errors.push(e);
                continue;
            }
            if let Err(e) = self.git.delete_branch(&branch.name) {
                warn!(branch = %branch.name, error = %e, "could not delete temporary branch");
                errors.push(e);
            }
        }
        errors.into_result()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replay `from..to` onto `base` in a new temporary branch.
    fn step(&self, base: &str, from: &str, to: &str) -> std::result::Result<String, RebaseError> {
        let mut state = self.lock();
        if state.closed {
            return Err(RebaseError::Closed);
        }

        let name = match checkout_unique_branch(
            self.git.as_ref(),
            &format!("{}/{to}", self.prefix),
            to,
        ) {
            Ok(name) => name,
            Err(e) => {
                state.errors.push(e.clone());
                return Err(e);
            }
        };
        state.branches.push(TemporaryBranch {
            name: name.clone(),
            parent: base.to_string(),
        });

        debug!(%base, %from, %to, branch = %name, "rebasing");
        let request = RebaseRequest {
            onto: base.to_string(),
            from: from.to_string(),
            branch: name.clone(),
        };
        if let Err(source) = self.git.rebase(&request) {
            let err = RebaseError::Step {
                onto: base.to_string(),
                from: from.to_string(),
                to: to.to_string(),
                source: Arc::new(source),
            };
            warn!(error = %err, "rebase step failed");
            state.errors.push(err.clone());
            if let Err(source) = self.git.rebase_abort() {
                warn!(error = %source, "could not abort rebase");
                state.errors.push(RebaseError::Abort {
                    from: from.to_string(),
                    to: to.to_string(),
                    source: Arc::new(source),
                });
            }
            return Err(err);
        }

        Ok(name)
    }
}

#[derive(Debug, Clone)]
enum HandleState {
    Valid { base: String },
    Failed(RebaseError),
}

/// Where the next rebase in a chain goes.
///
/// Handles are values: rebasing returns a new handle and leaves this one
/// usable, so sibling pull requests can branch off the same base.
#[derive(Debug)]
pub struct RebaseHandle<G> {
    rebaser: Arc<BulkRebaser<G>>,
    state: HandleState,
}

impl<G> Clone for RebaseHandle<G> {
    fn clone(&self) -> Self {
        Self {
            rebaser: Arc::clone(&self.rebaser),
            state: self.state.clone(),
        }
    }
}

impl<G: GitOps> RebaseHandle<G> {
    /// Rebase the commits in `from..to` onto this handle's base.
    ///
    /// The returned handle's base is the temporary branch holding the result.
    /// A failed handle returns itself without doing anything.
    #[must_use]
    pub fn rebase(&self, from: &str, to: &str) -> Self {
        let HandleState::Valid { base } = &self.state else {
            return self.clone();
        };

        let state = match self.rebaser.step(base, from, to) {
            Ok(branch) => HandleState::Valid { base: branch },
            Err(e) => HandleState::Failed(e),
        };
        Self {
            rebaser: Arc::clone(&self.rebaser),
            state,
        }
    }

    /// The branch or ref the next rebase goes onto.
    ///
    /// # Errors
    /// Returns the failure that ended this chain.
    pub fn base(&self) -> std::result::Result<&str, &RebaseError> {
        match &self.state {
            HandleState::Valid { base } => Ok(base),
            HandleState::Failed(e) => Err(e),
        }
    }

    /// The failure that ended this chain, if any.
    #[must_use]
    pub const fn err(&self) -> Option<&RebaseError> {
        match &self.state {
            HandleState::Valid { .. } => None,
            HandleState::Failed(e) => Some(e),
        }
    }
}

/// Create and check out a branch at `reference`, named `prefix` or, if that
/// is taken, `prefix-2`, `prefix-3`, and so on.
///
/// # Errors
/// Returns [`RebaseError::NoUniqueBranch`] with the last failure once the
/// attempts run out.
pub fn checkout_unique_branch<G: GitOps + ?Sized>(
    git: &G,
    prefix: &str,
    reference: &str,
) -> std::result::Result<String, RebaseError> {
    let mut last_error = None;
    for attempt in 1..=UNIQUE_BRANCH_ATTEMPTS {
        let name = if attempt == 1 {
            prefix.to_string()
        } else {
            format!("{prefix}-{attempt}")
        };

        match git.create_branch_and_checkout(&name, reference) {
            Ok(()) => return Ok(name),
            Err(e) => {
                debug!(branch = %name, error = %e, "branch name unavailable");
                last_error = Some(e);
            }
        }
    }

    Err(RebaseError::NoUniqueBranch {
        prefix: prefix.to_string(),
        reference: reference.to_string(),
        attempts: UNIQUE_BRANCH_ATTEMPTS,
        source: Arc::new(
            last_error.unwrap_or_else(|| stackr_git::Error::BranchExists(prefix.to_string())),
        ),
    })
}
