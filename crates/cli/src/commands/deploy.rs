use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use launch_core::execution::ShellRunner;
use launch_core::pipeline::{run_deployment, DeployParams};
use launch_core::report;

/// Pipeline parameters; each falls back to the environment variable of the same name
#[derive(Args)]
pub struct DeployArgs {
    /// Branch being deployed
    #[arg(long, env = "branch")]
    branch: Option<String>,
    /// Revision to deploy
    #[arg(long, env = "rev")]
    rev: Option<String>,
    /// Source repository to clone from
    #[arg(long, env = "repo")]
    repo: Option<String>,
    /// Deployment directory; revisions land next to it, branch links inside it
    #[arg(long, env = "dir")]
    dir: Option<String>,
    /// Remove sibling `<dir>.<hex revision>` directories no branch link inside `dir` points at
    #[arg(long)]
    clean: bool,
}

pub async fn execute(args: DeployArgs) -> Result<()> {
    let params = DeployParams {
        branch: args.branch,
        rev: args.rev,
        repo: args.repo,
        dir: args.dir,
        clean: args.clean,
    };

    let target = run_deployment(Arc::new(ShellRunner::new()), params)
        .await
        .context("Deployment failed")?;

    report::print_item(
        &format!("{}", target.branch.color(report::branch_color(&target.branch))),
        &[
            ("revision", target.rev.as_str()),
            ("checkout", target.dst.as_str()),
            ("link", target.ln.as_str()),
        ],
    );

    Ok(())
}
