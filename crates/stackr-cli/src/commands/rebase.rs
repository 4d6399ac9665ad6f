//! `stackr rebase` command - Move a stack of pull requests onto a new base.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use stackr_core::{Error, RebaseRequest, RebaseService};

use super::GlobalArgs;
use super::utils::Session;
use crate::output;

/// JSON output for rebase command.
#[derive(Debug, Serialize)]
struct RebaseOutput<'a> {
    onto: &'a str,
    pull_requests: Vec<u64>,
    branches_not_updated: &'a [String],
}

/// Run the rebase command.
pub fn run(
    global: &GlobalArgs,
    onto: &str,
    branch: Option<String>,
    author: Option<String>,
    json: bool,
) -> Result<()> {
    let session = Session::open(global)?;
    let branch = session.branch_or_current(branch)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let prs = session.pull_requests_for(&branch).await?;
        let numbers: Vec<u64> = prs.iter().map(|pr| pr.number).collect();

        if !json {
            for pr in &prs {
                output::info(&format!(
                    "Rebasing {} ({}) onto {onto}...",
                    output::pr_ref(pr.number),
                    pr.head.ref_name
                ));
            }
        }

        let service = RebaseService::new(
            Arc::clone(&session.repo),
            Arc::clone(&session.github),
            session.rebase_config(),
        );
        let result = service
            .rebase(RebaseRequest {
                pull_requests: prs,
                base: onto.to_string(),
                author,
            })
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                if let Error::PartiallyPublished { response, .. } = &e {
                    output::branches_not_updated(&response.branches_not_updated);
                }
                return Err(e.into());
            }
        };

        if json {
            let out = RebaseOutput {
                onto,
                pull_requests: numbers,
                branches_not_updated: &response.branches_not_updated,
            };
            output::essential(&serde_json::to_string_pretty(&out)?);
        } else {
            output::branches_not_updated(&response.branches_not_updated);
            output::success(&format!("Rebased {branch} and its dependents onto {onto}"));
        }
        Ok(())
    })
}
