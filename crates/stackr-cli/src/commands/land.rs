//! `stackr land` command - Squash-merge a pull request and restack its
//! dependents.

use std::sync::Arc;

use anyhow::{Result, bail};
use serde::Serialize;
use stackr_core::{KeepMessage, LandRequest, LandResponse, LandService};
use stackr_git::GitOps;

use super::GlobalArgs;
use super::utils::Session;
use crate::editor::InteractiveEditor;
use crate::output;

/// JSON output for land command.
#[derive(Debug, Serialize)]
struct LandOutput<'a> {
    number: u64,
    url: &'a str,
    base: &'a str,
    branches_not_updated: &'a [String],
}

/// Run the land command.
pub fn run(
    global: &GlobalArgs,
    branch: Option<String>,
    no_check: bool,
    no_edit: bool,
    json: bool,
) -> Result<()> {
    let session = Session::open(global)?;
    let branch = session.branch_or_current(branch)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let mut prs = session.pull_requests_for(&branch).await?;
        if prs.len() > 1 {
            let urls: Vec<_> = prs.iter().map(|pr| pr.html_url.as_str()).collect();
            bail!(
                "found {} pull requests with head {branch:?}, expected one:\n{}",
                prs.len(),
                urls.join("\n")
            );
        }
        let Some(pr) = prs.pop() else {
            bail!("could not find pull requests with head {branch:?}");
        };

        let number = pr.number;
        let url = pr.html_url.clone();
        let base = pr.base.ref_name.clone();
        if !json {
            output::info(&format!(
                "Landing {} ({branch}) into {base}...",
                output::pr_ref(number)
            ));
        }

        let request = LandRequest {
            pull_request: pr,
            local_branch: session
                .repo
                .branch_exists(&branch)
                .then(|| branch.clone()),
            check: !no_check && session.config.land.check,
        };
        let service = LandService::new(
            Arc::clone(&session.repo),
            Arc::clone(&session.github),
            session.rebase_config(),
        );
        let response: LandResponse = if no_edit {
            service.land(request, &KeepMessage).await?
        } else {
            service.land(request, &InteractiveEditor).await?
        };

        if json {
            let out = LandOutput {
                number,
                url: &url,
                base: &base,
                branches_not_updated: &response.branches_not_updated,
            };
            output::essential(&serde_json::to_string_pretty(&out)?);
        } else {
            output::branches_not_updated(&response.branches_not_updated);
            output::success(&format!("Landed {} into {base}", output::pr_ref(number)));
            output::essential(&url);
        }
        Ok(())
    })
}
