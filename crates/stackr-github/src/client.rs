//! GitHub API client.

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::Auth;
use crate::error::{Error, Result};
use crate::traits::GitHubApi;
use crate::types::{
    BuildState, BuildStatus, MergeMethod, MergePullRequest, MergeResult, PullRequest,
    PullRequestBranch, Repo, Review, ReviewState, StatusCheck, UpdatePullRequest,
};

/// Page size for list endpoints. GitHub caps it at 100.
const PER_PAGE: usize = 100;

/// Media type that makes the pull request endpoint return a patch.
const PATCH_MEDIA_TYPE: &str = "application/vnd.github.patch";

// === Internal API response types (shared across methods) ===

/// Internal representation of a PR from the GitHub API.
#[derive(serde::Deserialize)]
struct ApiPullRequest {
    number: u64,
    title: String,
    body: Option<String>,
    html_url: String,
    user: ApiUser,
    head: ApiBranch,
    base: ApiBranch,
}

#[derive(serde::Deserialize)]
struct ApiUser {
    login: String,
}

/// Internal representation of a branch ref from the GitHub API.
#[derive(serde::Deserialize)]
struct ApiBranch {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: String,
    /// Null when the repository behind the branch was deleted.
    repo: Option<ApiRepo>,
}

#[derive(serde::Deserialize)]
struct ApiRepo {
    name: String,
    owner: ApiUser,
}

impl ApiBranch {
    fn into_branch(self) -> PullRequestBranch {
        PullRequestBranch {
            ref_name: self.ref_name,
            sha: self.sha,
            repo: self.repo.map(|r| Repo::new(r.owner.login, r.name)),
        }
    }
}

impl ApiPullRequest {
    /// Convert API response to domain type.
    fn into_pull_request(self) -> PullRequest {
        PullRequest {
            number: self.number,
            title: self.title,
            body: self.body,
            html_url: self.html_url,
            author: self.user.login,
            head: self.head.into_branch(),
            base: self.base.into_branch(),
        }
    }
}

#[derive(serde::Deserialize)]
struct ApiCombinedStatus {
    state: BuildState,
    #[serde(default)]
    statuses: Vec<ApiStatus>,
}

#[derive(serde::Deserialize)]
struct ApiStatus {
    state: BuildState,
    context: String,
    description: Option<String>,
}

#[derive(serde::Deserialize)]
struct ApiReview {
    /// Null for reviews left by deleted accounts.
    user: Option<ApiUser>,
    state: ReviewState,
    submitted_at: Option<DateTime<Utc>>,
}

/// GitHub API client bound to one repository.
pub struct GitHubClient {
    client: Client,
    base_url: String,
    /// Token stored as `SecretString` for automatic zeroization on drop.
    token: SecretString,
    repo: Repo,
}

impl GitHubClient {
    /// Default GitHub API URL.
    pub const DEFAULT_API_URL: &'static str = "https://api.github.com";

    /// Create a new GitHub client for `repo`.
    ///
    /// # Errors
    /// Returns error if authentication fails.
    pub fn new(auth: &Auth, repo: Repo) -> Result<Self> {
        Self::with_base_url(auth, Self::DEFAULT_API_URL, repo)
    }

    /// Create a new GitHub client with a custom API URL (for GitHub Enterprise).
    ///
    /// # Errors
    /// Returns error if authentication fails.
    pub fn with_base_url(auth: &Auth, base_url: impl Into<String>, repo: Repo) -> Result<Self> {
        let token = auth.resolve()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("stackr-cli"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            repo,
        })
    }

    /// Path prefix of every endpoint for this client's repository.
    fn repo_path(&self) -> String {
        format!("/repos/{}/{}", self.repo.owner, self.repo.name)
    }

    /// Start an authenticated request.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("GitHub request: {method} {url}");
        self.client.request(method, url).header(
            AUTHORIZATION,
            format!("Bearer {}", self.token.expose_secret()),
        )
    }

    /// Make a GET request for every page of a list endpoint.
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let per_page = PER_PAGE.to_string();
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let page_str = page.to_string();
            let response = self
                .request(Method::GET, path)
                .query(query)
                .query(&[("per_page", per_page.as_str()), ("page", page_str.as_str())])
                .send()
                .await?;
            let batch: Vec<T> = handle_response(response).await?;

            let done = batch.len() < PER_PAGE;
            items.extend(batch);
            if done {
                return Ok(items);
            }
            page += 1;
        }
    }

    /// List open pull requests matching a single filter.
    async fn list_open_pulls(&self, filter: (&str, &str)) -> Result<Vec<PullRequest>> {
        let pulls: Vec<ApiPullRequest> = self
            .get_all(
                &format!("{}/pulls", self.repo_path()),
                &[("state", "open"), filter],
            )
            .await?;

        Ok(pulls
            .into_iter()
            .map(ApiPullRequest::into_pull_request)
            .collect())
    }

    // === PR Operations ===

    /// List open pull requests whose head is `owner:branch`.
    ///
    /// # Errors
    /// Returns error if API call fails.
    pub async fn list_pull_requests_by_head(
        &self,
        owner: Option<&str>,
        branch: &str,
    ) -> Result<Vec<PullRequest>> {
        let head = format!("{}:{branch}", owner.unwrap_or(&self.repo.owner));
        self.list_open_pulls(("head", &head)).await
    }

    /// List open pull requests whose base is `branch`.
    ///
    /// # Errors
    /// Returns error if API call fails.
    pub async fn list_pull_requests_by_base(&self, branch: &str) -> Result<Vec<PullRequest>> {
        self.list_open_pulls(("base", branch)).await
    }

    /// Fetch a pull request as a patch.
    ///
    /// # Errors
    /// Returns error if PR not found or API call fails.
    pub async fn get_pull_request_patch(&self, number: u64) -> Result<String> {
        let response = self
            .request(
                Method::GET,
                &format!("{}/pulls/{number}", self.repo_path()),
            )
            .header(ACCEPT, PATCH_MEDIA_TYPE)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response.text().await?);
        }
        Err(error_for(response).await)
    }

    /// Change the base branch of a pull request.
    ///
    /// # Errors
    /// Returns error if update fails.
    pub async fn set_pull_request_base(&self, number: u64, base: &str) -> Result<()> {
        let update = UpdatePullRequest {
            base: Some(base.to_string()),
            ..UpdatePullRequest::default()
        };
        let response = self
            .request(
                Method::PATCH,
                &format!("{}/pulls/{number}", self.repo_path()),
            )
            .json(&update)
            .send()
            .await?;

        let _: ApiPullRequest = handle_response(response).await?;
        Ok(())
    }

    /// Squash-merge a pull request.
    ///
    /// # Errors
    /// Returns error if merge fails or GitHub reports it did not merge.
    pub async fn squash_pull_request(
        &self,
        number: u64,
        title: &str,
        body: &str,
    ) -> Result<MergeResult> {
        let merge = MergePullRequest {
            commit_title: Some(title.to_string()),
            commit_message: Some(body.to_string()),
            merge_method: MergeMethod::Squash,
        };
        let response = self
            .request(
                Method::PUT,
                &format!("{}/pulls/{number}/merge", self.repo_path()),
            )
            .json(&merge)
            .send()
            .await?;

        let result: MergeResult = handle_response(response).await?;
        if !result.merged {
            return Err(Error::MergeFailed {
                number,
                message: result.message,
            });
        }
        Ok(result)
    }

    // === Ref Operations ===

    /// Delete a branch.
    ///
    /// # Errors
    /// Returns error if deletion fails.
    pub async fn delete_branch(&self, name: &str) -> Result<()> {
        let response = self
            .request(
                Method::DELETE,
                &format!("{}/git/refs/heads/{name}", self.repo_path()),
            )
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }
        Err(error_for(response).await)
    }

    // === Check Operations ===

    /// Get the combined commit status of a ref.
    ///
    /// # Errors
    /// Returns error if API call fails.
    pub async fn get_build_status(&self, git_ref: &str) -> Result<BuildStatus> {
        let response = self
            .request(
                Method::GET,
                &format!("{}/commits/{git_ref}/status", self.repo_path()),
            )
            .send()
            .await?;
        let combined: ApiCombinedStatus = handle_response(response).await?;

        Ok(BuildStatus {
            state: combined.state,
            statuses: combined
                .statuses
                .into_iter()
                .map(|s| StatusCheck {
                    name: s.context,
                    state: s.state,
                    message: s.description.filter(|d| !d.is_empty()),
                })
                .collect(),
        })
    }

    /// List the reviews left on a pull request.
    ///
    /// # Errors
    /// Returns error if API call fails.
    pub async fn list_pull_request_reviews(&self, number: u64) -> Result<Vec<Review>> {
        let reviews: Vec<ApiReview> = self
            .get_all(&format!("{}/pulls/{number}/reviews", self.repo_path()), &[])
            .await?;

        Ok(reviews
            .into_iter()
            .filter_map(|r| {
                Some(Review {
                    user: r.user?.login,
                    state: r.state,
                    submitted_at: r.submitted_at,
                })
            })
            .collect())
    }
}

/// Decode a successful response, or map the failure to an [`Error`].
async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    if response.status().is_success() {
        let body = response.json().await?;
        return Ok(body);
    }
    Err(error_for(response).await)
}

/// Map an unsuccessful response to an [`Error`].
async fn error_for(response: reqwest::Response) -> Error {
    let status_code = response.status().as_u16();

    match status_code {
        401 => Error::AuthenticationFailed,
        403 if response
            .headers()
            .get("x-ratelimit-remaining")
            .is_some_and(|v| v == "0") =>
        {
            Error::RateLimited
        }
        404 => Error::NotFound(response.url().path().to_string()),
        _ => {
            let text = response.text().await.unwrap_or_default();
            Error::ApiError {
                status: status_code,
                message: text,
            }
        }
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base_url", &self.base_url)
            .field("repo", &self.repo)
            .field("token", &"[redacted]")
            .finish_non_exhaustive()
    }
}

// === Trait Implementation ===

impl GitHubApi for GitHubClient {
    fn repo(&self) -> &Repo {
        &self.repo
    }

    async fn list_pull_requests_by_head(
        &self,
        owner: Option<&str>,
        branch: &str,
    ) -> Result<Vec<PullRequest>> {
        self.list_pull_requests_by_head(owner, branch).await
    }

    async fn list_pull_requests_by_base(&self, branch: &str) -> Result<Vec<PullRequest>> {
        self.list_pull_requests_by_base(branch).await
    }

    async fn get_pull_request_patch(&self, number: u64) -> Result<String> {
        self.get_pull_request_patch(number).await
    }

    async fn set_pull_request_base(&self, number: u64, base: &str) -> Result<()> {
        self.set_pull_request_base(number, base).await
    }

    async fn squash_pull_request(
        &self,
        number: u64,
        title: &str,
        body: &str,
    ) -> Result<MergeResult> {
        self.squash_pull_request(number, title, body).await
    }

    async fn delete_branch(&self, name: &str) -> Result<()> {
        self.delete_branch(name).await
    }

    async fn get_build_status(&self, git_ref: &str) -> Result<BuildStatus> {
        self.get_build_status(git_ref).await
    }

    async fn list_pull_request_reviews(&self, number: u64) -> Result<Vec<Review>> {
        self.list_pull_request_reviews(number).await
    }
}
