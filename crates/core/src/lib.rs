//! Launch Core Library
//!
//! Core of the `launch` git push deployment tool. It provides the task graph
//! executor, the deployment pipeline built on top of it, and the post-receive
//! dispatcher that routes pushed branches to their configured actions.
//!
//! ## Architecture
//!
//! - [`execution`] - Task graph executor and the command runner seam
//! - [`pipeline`] - Deployment stages from `validate` to `deploy`
//! - [`dispatch`] - Post-receive input parsing and branch action dispatch
//! - [`configs`] - `launch.yml` parsing and JSON schema
//! - [`hook`] - Installing the dispatcher into a repository
//! - [`report`] - Operator console output
//! - [`types`] - Common error types and type aliases
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use launch_core::execution::ShellRunner;
//! use launch_core::pipeline::{run_deployment, DeployParams};
//!
//! # async fn example() -> launch_core::LaunchResult<()> {
//! let target = run_deployment(
//!     Arc::new(ShellRunner::new()),
//!     DeployParams {
//!         branch: Some("master".to_string()),
//!         rev: Some("4b6f".to_string()),
//!         repo: Some("/srv/git/app.git".to_string()),
//!         dir: Some("/srv/node/app".to_string()),
//!         clean: false,
//!     },
//! )
//! .await?;
//! println!("{} -> {}", target.ln, target.dst);
//! # Ok(())
//! # }
//! ```

pub mod configs;
pub mod dispatch;
pub mod execution;
pub mod hook;
pub mod pipeline;
pub mod report;
pub mod types;

#[cfg(test)]
mod testing;

pub use types::{LaunchError, LaunchResult};
