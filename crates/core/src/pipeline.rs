//! Deployment pipeline
//!
//! Wires the deployment stages into a [`TaskGraph`]:
//!
//! ```text
//! validate -> clone -> checkout -> build (-> npm | jake) -> symlink -> clean -> deploy
//! ```
//!
//! `npm` and `jake` have no prerequisites of their own. `build` invokes one of them
//! depending on whether the checkout carries a Jakefile.

pub mod context;
pub mod stages;

use std::sync::Arc;

use crate::execution::command::CommandRunner;
use crate::execution::graph::TaskGraph;
use crate::types::LaunchResult;

pub use context::{DeployContext, DeployParams, DeployTarget};
use stages::{
    BuildStage, CheckoutStage, CleanStage, CloneStage, DeployStage, JakeStage, NpmStage,
    SymlinkStage, ValidateStage,
};

/// The task that runs the whole pipeline
pub const DEPLOY_TASK: &str = "deploy";

/// Build the pipeline graph with every command going through `runner`
pub fn build_pipeline(runner: Arc<dyn CommandRunner>) -> LaunchResult<TaskGraph<DeployContext>> {
    let mut graph = TaskGraph::new();

    graph
        .define("validate", &[], ValidateStage)?
        .describe("Validate parameters");
    graph
        .define(
            "clone",
            &["validate"],
            CloneStage {
                runner: runner.clone(),
            },
        )?
        .describe("Clone project");
    graph
        .define(
            "checkout",
            &["clone"],
            CheckoutStage {
                runner: runner.clone(),
            },
        )?
        .describe("Checkout project");
    graph
        .define("build", &["checkout"], BuildStage)?
        .describe("Build project");
    graph
        .define(
            "npm",
            &[],
            NpmStage {
                runner: runner.clone(),
            },
        )?
        .describe("Install dependencies via npm");
    graph
        .define(
            "jake",
            &[],
            JakeStage {
                runner: runner.clone(),
            },
        )?
        .describe("Build project with Jake");
    graph
        .define(
            "symlink",
            &["build"],
            SymlinkStage {
                runner: runner.clone(),
            },
        )?
        .describe("Set symbolic link");
    graph
        .define("clean", &["symlink"], CleanStage { runner })?
        .describe("Remove old deployments");
    graph
        .define(DEPLOY_TASK, &["clean"], DeployStage)?
        .describe("Deploy a new revision");

    graph.check()?;
    Ok(graph)
}

/// Run the full pipeline for `params`
pub async fn run_deployment(
    runner: Arc<dyn CommandRunner>,
    params: DeployParams,
) -> LaunchResult<DeployTarget> {
    let graph = build_pipeline(runner)?;
    let context = graph
        .execute(DEPLOY_TASK, DeployContext::new(params))
        .await?;
    context.into_target()
}
