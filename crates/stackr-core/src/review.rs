//! Review state of a pull request.

use std::collections::{BTreeMap, BTreeSet};

use stackr_github::{GitHubApi, Review, ReviewState};

use crate::error::Result;

/// Who currently approves a pull request and who blocks it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewStatus {
    /// Reviewers whose latest verdict is an approval.
    pub approvers: BTreeSet<String>,

    /// Reviewers whose latest verdict requests changes.
    pub changes_requested_by: BTreeSet<String>,
}

impl ReviewStatus {
    /// Reduce reviews, oldest first, to each reviewer's current verdict.
    ///
    /// Only a reviewer's latest review counts: a comment or dismissal after
    /// an approval withdraws it.
    #[must_use]
    pub fn from_reviews(reviews: &[Review]) -> Self {
        let latest: BTreeMap<&str, ReviewState> = reviews
            .iter()
            .map(|review| (review.user.as_str(), review.state))
            .collect();

        let mut status = Self::default();
        for (user, state) in latest {
            match state {
                ReviewState::Approved => {
                    status.approvers.insert(user.to_string());
                }
                ReviewState::ChangesRequested => {
                    status.changes_requested_by.insert(user.to_string());
                }
                _ => {}
            }
        }
        status
    }

    /// Approved by someone and blocked by no one.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        !self.approvers.is_empty() && self.changes_requested_by.is_empty()
    }
}

/// Fetch and reduce the reviews of pull request `number`.
///
/// # Errors
/// Returns error if the reviews cannot be listed.
pub async fn review_status<H: GitHubApi>(github: &H, number: u64) -> Result<ReviewStatus> {
    let reviews = github.list_pull_request_reviews(number).await?;
    Ok(ReviewStatus::from_reviews(&reviews))
}
