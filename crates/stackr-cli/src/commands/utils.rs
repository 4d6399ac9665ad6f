use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use stackr_core::{Config, RebaseConfig};
use stackr_git::{GitOps, Repository, parse_github_remote};
use stackr_github::{Auth, GitHubApi, GitHubClient, PullRequest, Repo, SecretString};

use super::GlobalArgs;

/// Everything a command needs to talk to git and GitHub.
pub struct Session {
    pub repo: Arc<Repository>,
    pub github: Arc<GitHubClient>,
    pub config: Config,
}

impl Session {
    /// Open the repository in the current directory and connect to GitHub.
    pub fn open(global: &GlobalArgs) -> Result<Self> {
        let repo = Repository::open_current().context("Not inside a git repository")?;
        let config = Config::load(Config::path_in(repo.git_dir()))
            .context("Failed to load stackr config")?;

        let target = match &global.repo {
            Some(name) => name.parse::<Repo>()?,
            None => {
                let remote = &config.general.remote;
                let url = repo.remote_url(remote).with_context(|| {
                    format!("Cannot determine GitHub repository from remote {remote:?}; pass --repo")
                })?;
                let (owner, name) = parse_github_remote(&url)?;
                Repo::new(owner, name)
            }
        };

        let auth = global
            .token
            .clone()
            .map_or(Auth::GhCli, |token| Auth::Token(SecretString::from(token)));
        let github = match &config.github.api_url {
            Some(url) => GitHubClient::with_base_url(&auth, url.as_str(), target)?,
            None => GitHubClient::new(&auth, target)?,
        };

        Ok(Self {
            repo: Arc::new(repo),
            github: Arc::new(github),
            config,
        })
    }

    pub fn rebase_config(&self) -> RebaseConfig {
        RebaseConfig::from_config(&self.config)
    }

    /// `branch`, or the checked-out branch.
    pub fn branch_or_current(&self, branch: Option<String>) -> Result<String> {
        match branch {
            Some(branch) => Ok(branch),
            None => Ok(self.repo.current_branch()?),
        }
    }

    /// Open pull requests in this repository whose head is `branch`.
    pub async fn pull_requests_for(&self, branch: &str) -> Result<Vec<PullRequest>> {
        let prs = self.github.list_pull_requests_by_head(None, branch).await?;
        if prs.is_empty() {
            bail!("could not find pull requests with head {branch:?}");
        }
        Ok(prs)
    }
}
