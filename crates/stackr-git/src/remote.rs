//! Remote URL parsing.

use crate::error::{Error, Result};

const SSH_PREFIX: &str = "git@github.com:";
const SSH_URL_PREFIX: &str = "ssh://git@github.com/";
const HTTPS_PREFIX: &str = "https://github.com/";

/// Extract `(owner, name)` from a GitHub remote URL.
///
/// Accepts scp-style SSH (`git@github.com:owner/repo.git`), `ssh://` URLs,
/// and HTTPS URLs, with or without the `.git` suffix.
///
/// # Errors
/// Returns `InvalidRemoteUrl` if the URL is not a GitHub repository URL.
pub fn parse_github_remote(url: &str) -> Result<(String, String)> {
    let url = url.trim();
    let path = [SSH_PREFIX, SSH_URL_PREFIX, HTTPS_PREFIX]
        .iter()
        .find_map(|prefix| url.strip_prefix(prefix))
        .ok_or_else(|| Error::InvalidRemoteUrl(url.to_string()))?;

    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);

    match path.split('/').collect::<Vec<_>>().as_slice() {
        [owner, name] if !owner.is_empty() && !name.is_empty() => {
            Ok(((*owner).to_string(), (*name).to_string()))
        }
        _ => Err(Error::InvalidRemoteUrl(url.to_string())),
    }
}
