//! Task bodies of the deployment pipeline

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::execution::command::{shell_quote, CommandRunner, CommandSpec};
use crate::execution::graph::{GraphRun, TaskBody};
use crate::pipeline::context::{DeployContext, DeployTarget};
use crate::report;
use crate::types::{LaunchError, LaunchResult};

/// Run one command for `stage`, turning a nonzero exit into a failure of the stage
async fn run_stage(
    runner: &dyn CommandRunner,
    stage: &str,
    command: CommandSpec,
    failure: &str,
) -> LaunchResult<()> {
    let output = runner.run(&command).await?;
    if output.status.success() {
        Ok(())
    } else {
        report::error(failure);
        Err(LaunchError::command(stage, output.status.code(), failure))
    }
}

fn target(run: &GraphRun<'_, DeployContext>) -> LaunchResult<DeployTarget> {
    run.context().target().cloned()
}

pub struct ValidateStage;

#[async_trait]
impl TaskBody<DeployContext> for ValidateStage {
    async fn run(&self, run: &mut GraphRun<'_, DeployContext>) -> LaunchResult<()> {
        let target = match DeployTarget::resolve(run.context().params()) {
            Ok(target) => target,
            Err(err) => {
                if let LaunchError::Config(message) = &err {
                    report::error(message);
                }
                return Err(err);
            }
        };
        run.context_mut().set_target(target)?;
        report::success("Command line parameters valid.");
        Ok(())
    }
}

pub struct CloneStage {
    pub runner: Arc<dyn CommandRunner>,
}

#[async_trait]
impl TaskBody<DeployContext> for CloneStage {
    async fn run(&self, run: &mut GraphRun<'_, DeployContext>) -> LaunchResult<()> {
        let target = target(run)?;

        run_stage(
            self.runner.as_ref(),
            "clone",
            CommandSpec::shell(format!("rm -rf {}", shell_quote(&target.dst))),
            &format!("Could not remove {}", target.dst),
        )
        .await?;

        run_stage(
            self.runner.as_ref(),
            "clone",
            CommandSpec::shell(format!(
                "git clone {} {}",
                shell_quote(&target.repo),
                shell_quote(&target.dst)
            )),
            "Could not clone repository.",
        )
        .await?;

        report::success("Clone successful.");
        Ok(())
    }
}

pub struct CheckoutStage {
    pub runner: Arc<dyn CommandRunner>,
}

#[async_trait]
impl TaskBody<DeployContext> for CheckoutStage {
    async fn run(&self, run: &mut GraphRun<'_, DeployContext>) -> LaunchResult<()> {
        let target = target(run)?;

        // Checks out the clone's own HEAD; the pushed revision is not named here
        let command = format!(
            "git --git-dir={} --work-tree={} checkout",
            shell_quote(&format!("{}/.git", target.dst)),
            shell_quote(&target.dst)
        );
        run_stage(
            self.runner.as_ref(),
            "checkout",
            CommandSpec::shell(command),
            &format!("Could not checkout {}", target.rev),
        )
        .await?;

        report::success("Checkout successful.");
        Ok(())
    }
}

/// Build descriptors that switch the build from npm to jake
pub const JAKEFILES: &[&str] = &["Jakefile", "Jakefile.js"];

async fn has_jakefile(dst: &str) -> bool {
    for name in JAKEFILES {
        if tokio::fs::metadata(Path::new(dst).join(name)).await.is_ok() {
            return true;
        }
    }
    false
}

pub struct BuildStage;

#[async_trait]
impl TaskBody<DeployContext> for BuildStage {
    async fn run(&self, run: &mut GraphRun<'_, DeployContext>) -> LaunchResult<()> {
        let target = target(run)?;

        if has_jakefile(&target.dst).await {
            run.invoke("jake").await?;
        } else {
            run.invoke("npm").await?;
        }

        report::success("Build successful");
        Ok(())
    }
}

pub struct NpmStage {
    pub runner: Arc<dyn CommandRunner>,
}

#[async_trait]
impl TaskBody<DeployContext> for NpmStage {
    async fn run(&self, run: &mut GraphRun<'_, DeployContext>) -> LaunchResult<()> {
        let target = target(run)?;

        run_stage(
            self.runner.as_ref(),
            "npm",
            CommandSpec::shell(format!(
                "cd {} && npm install --production",
                shell_quote(&target.dst)
            )),
            "Failed to install dependencies",
        )
        .await?;

        report::success("Dependencies installed");
        Ok(())
    }
}

pub struct JakeStage {
    pub runner: Arc<dyn CommandRunner>,
}

#[async_trait]
impl TaskBody<DeployContext> for JakeStage {
    async fn run(&self, run: &mut GraphRun<'_, DeployContext>) -> LaunchResult<()> {
        let target = target(run)?;

        run_stage(
            self.runner.as_ref(),
            "jake",
            CommandSpec::shell(format!("cd {} && jake install", shell_quote(&target.dst))),
            "Failed to build with jake. Does the target Jakefile[.js] have an \"install\" task?",
        )
        .await?;

        report::success("Jake build complete");
        Ok(())
    }
}

pub struct SymlinkStage {
    pub runner: Arc<dyn CommandRunner>,
}

#[async_trait]
impl TaskBody<DeployContext> for SymlinkStage {
    async fn run(&self, run: &mut GraphRun<'_, DeployContext>) -> LaunchResult<()> {
        let target = target(run)?;

        // `dir` only holds the branch links, so it may not exist before the first deploy
        let command = format!(
            "mkdir -p {dir} && rm -f {ln} && ln -s {dst} {ln}",
            dir = shell_quote(&target.dir),
            ln = shell_quote(&target.ln),
            dst = shell_quote(&target.dst),
        );
        run_stage(
            self.runner.as_ref(),
            "symlink",
            CommandSpec::shell(command),
            "Could not update symbolic link.",
        )
        .await?;

        report::success("Symbolic link updated.");
        Ok(())
    }
}

pub struct CleanStage {
    pub runner: Arc<dyn CommandRunner>,
}

#[async_trait]
impl TaskBody<DeployContext> for CleanStage {
    async fn run(&self, run: &mut GraphRun<'_, DeployContext>) -> LaunchResult<()> {
        let target = target(run)?;

        if !run.context().params().clean {
            report::notice("No cleanup policy configured, keeping previous deployments.");
            return Ok(());
        }

        let stale = stale_deployments(&target).await?;
        for path in &stale {
            let path = path.to_string_lossy();
            run_stage(
                self.runner.as_ref(),
                "clean",
                CommandSpec::shell(format!("rm -rf {}", shell_quote(&path))),
                &format!("Could not remove {}", path),
            )
            .await?;
        }

        report::success(&format!("Removed {} outdated deployment(s).", stale.len()));
        Ok(())
    }
}

/// Suffixes that look like an abbreviated or full git object id
fn is_revision(suffix: &str) -> bool {
    suffix.len() >= 7 && suffix.chars().all(|c| c.is_ascii_hexdigit())
}

/// Revision directories (`<dir>.<hex revision>`) next to `dst` that no branch
/// link inside `dir` points at
pub async fn stale_deployments(target: &DeployTarget) -> LaunchResult<Vec<PathBuf>> {
    let dir = Path::new(&target.dir);
    let Some(base) = dir.file_name().and_then(|name| name.to_str()) else {
        return Ok(Vec::new());
    };
    let parent = match dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let prefix = format!("{}.", base);
    let linked = linked_targets(dir).await?;

    let mut stale = Vec::new();
    let mut entries = tokio::fs::read_dir(&parent).await?;
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(suffix) = name.strip_prefix(&prefix) else {
            continue;
        };
        if !is_revision(suffix) {
            continue;
        }

        let path = parent.join(name);
        if path == Path::new(&target.dst) || linked.contains(&path) {
            continue;
        }
        if entry.file_type().await?.is_dir() {
            stale.push(path);
        }
    }

    stale.sort();
    Ok(stale)
}

async fn linked_targets(dir: &Path) -> LaunchResult<HashSet<PathBuf>> {
    let mut linked = HashSet::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(linked),
        Err(err) => return Err(err.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_symlink() {
            linked.insert(tokio::fs::read_link(entry.path()).await?);
        }
    }

    Ok(linked)
}

pub struct DeployStage;

#[async_trait]
impl TaskBody<DeployContext> for DeployStage {
    async fn run(&self, run: &mut GraphRun<'_, DeployContext>) -> LaunchResult<()> {
        let target = target(run)?;
        report::success(&format!("Deployed {} @ {}.", target.branch, target.rev));
        Ok(())
    }
}
