//! Error types for stackr-core.

use std::fmt;
use std::time::Duration;

use crate::rebase::RebaseResponse;
use crate::rebaser::RebaseError;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in stackr-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Git operation error.
    #[error("git error: {0}")]
    Git(#[from] stackr_git::Error),

    /// GitHub API error.
    #[error("github error: {0}")]
    GitHub(#[from] stackr_github::Error),

    /// A rebase step or temporary branch could not be created.
    #[error(transparent)]
    Rebase(#[from] RebaseError),

    /// Several independent failures.
    #[error("{0}")]
    Multiple(MultiError),

    /// A failure while visiting `node` during a walk.
    #[error("{node}: {source}")]
    Node { node: String, source: Box<Error> },

    /// A visit panicked with a non-error value.
    #[error("panic: {0}")]
    Panic(String),

    /// A background task was cancelled before it finished.
    #[error("task interrupted: {0}")]
    Interrupted(String),

    /// The operation did not finish in time.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// Rebased branches were pushed but some later step failed.
    #[error("rebased branches were pushed, but some follow-up steps failed:\n{errors}")]
    PartiallyPublished {
        /// What was published, including branches left alone.
        response: RebaseResponse,
        /// Every failure after the push.
        errors: MultiError,
    },

    /// GitHub refused to retarget a pull request.
    #[error("failed to set base for {url} to {base:?}: {source}")]
    SetBase {
        url: String,
        base: String,
        source: stackr_github::Error,
    },

    /// A check that must pass before landing did not.
    #[error("{0}")]
    Check(String),

    /// The pull request failed its landing checks.
    #[error("cannot land {url}:\n{reasons}")]
    NotLandable { url: String, reasons: MultiError },

    /// The local branch of a pull request differs from what GitHub has.
    #[error(
        "SHA1 of local branch {branch} of pull request {url} does not match GitHub. \
         Make sure that your local checkout of {branch} is in sync."
    )]
    StaleLocalBranch { branch: String, url: String },

    /// Dependents of a landed pull request could not be rebased.
    #[error("failed to rebase dependents of {url}: {source}")]
    RebaseDependents { url: String, source: Box<Error> },

    /// The edited commit message has no content.
    #[error("commit message is empty, aborting")]
    EmptyMessage,

    /// The edited commit message has text directly after the title.
    #[error("there must be an empty line between the title and the body")]
    MissingBlankLine,

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("toml error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Accumulates independent errors without losing any of them.
///
/// Renders one error per line, in the order they were added.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<Error>,
}

impl MultiError {
    /// Create an empty accumulator.
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Add an error. Nested aggregates are flattened.
    pub fn push(&mut self, err: impl Into<Error>) {
        match err.into() {
            Error::Multiple(inner) => self.errors.extend(inner.errors),
            err => self.errors.push(err),
        }
    }

    /// Add the error of `result`, if any.
    pub fn check<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.push(err);
                None
            }
        }
    }

    /// Whether no errors were added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of errors added.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// The errors, in insertion order.
    #[must_use]
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// `Ok` if empty, the lone error if there is one, the aggregate otherwise.
    ///
    /// # Errors
    /// Returns an error if any were added.
    pub fn into_result(mut self) -> Result<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(Error::Multiple(self)),
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl<E: Into<Error>> Extend<E> for MultiError {
    fn extend<I: IntoIterator<Item = E>>(&mut self, iter: I) {
        for err in iter {
            self.push(err);
        }
    }
}

impl<E: Into<Error>> FromIterator<E> for MultiError {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let mut errors = Self::new();
        errors.extend(iter);
        errors
    }
}

impl IntoIterator for MultiError {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
