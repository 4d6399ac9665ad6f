//! Commit messages for landed pull requests.

use stackr_github::PullRequest;

use crate::error::{Error, Result};

/// Lets the user change a commit message before it is used.
pub trait MessageEditor {
    /// Return the edited version of `template`.
    ///
    /// # Errors
    /// Returns error if the editor fails or is cancelled.
    fn edit(&self, template: &str) -> Result<String>;
}

/// Uses the template unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepMessage;

impl MessageEditor for KeepMessage {
    fn edit(&self, template: &str) -> Result<String> {
        Ok(template.to_string())
    }
}

/// Title and body of a squash commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessage {
    pub title: String,
    pub body: String,
}

impl CommitMessage {
    /// The editable message for landing `pr`.
    ///
    /// The title carries the pull request number so the commit links back to
    /// it. Trailing comment lines explain the format and are dropped by
    /// [`CommitMessage::parse`].
    #[must_use]
    pub fn render(pr: &PullRequest) -> String {
        let body = pr.body.as_deref().unwrap_or_default().trim();
        format!(
            "{title} (#{number})\n\
             \n\
             {body}\n\
             \n\
             # Landing Pull Request: {url}\n\
             #\n\
             # Enter the commit message above. Lines starting with '#' will be\n\
             # ignored. There must be an empty line between the title and the body.\n\
             # Leaving this file empty will abort the operation.\n",
            title = pr.title.trim(),
            number = pr.number,
            url = pr.html_url,
        )
    }

    /// Parse an edited message.
    ///
    /// Lines starting with `#` are dropped, as are blank lines before the
    /// title and after the body.
    ///
    /// # Errors
    /// Returns [`Error::EmptyMessage`] if nothing is left and
    /// [`Error::MissingBlankLine`] if the title runs into the body.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines: Vec<&str> = text
            .lines()
            .filter(|line| !line.starts_with('#'))
            .map(str::trim_end)
            .skip_while(|line| line.is_empty())
            .collect();
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }

        let Some((title, rest)) = lines.split_first() else {
            return Err(Error::EmptyMessage);
        };
        if rest.first().is_some_and(|line| !line.is_empty()) {
            return Err(Error::MissingBlankLine);
        }

        Ok(Self {
            title: (*title).to_string(),
            body: rest.iter().skip(1).copied().collect::<Vec<_>>().join("\n"),
        })
    }
}
