//! Post-receive dispatcher
//!
//! Reads the ref updates git hands a `post-receive` hook, matches each against
//! the branch action table and runs every matching action. Actions of one
//! batch run concurrently, optionally bounded by `max_parallel`, and the
//! dispatcher returns once all of them have finished.

pub mod action;
pub mod refs;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::configs::launch::LaunchConfig;
use crate::execution::command::{shell_quote, CommandRunner, CommandSpec, ExitStatus};
use crate::report;
use crate::types::{LaunchError, LaunchResult};

pub use action::{Action, ActionCallback, ActionEntry, ActionKind};
pub use refs::{parse_ref_updates, RefUpdate};

/// Deploy command used when the configuration names none
pub const DEFAULT_DEPLOY_COMMAND: &str = "launch deploy";

/// A deployment that finished, handed to the completion callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub branch: String,
    pub rev: String,
    pub dir: String,
}

pub type CompletionCallback = Arc<dyn Fn(&Deployment) + Send + Sync>;

/// Result of one dispatched action
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub branch: String,
    pub rev: String,
    pub kind: ActionKind,
    pub status: ExitStatus,
    pub error: Option<String>,
}

impl ActionOutcome {
    fn new(update: &RefUpdate, kind: ActionKind, status: ExitStatus) -> Self {
        Self {
            branch: update.branch.clone(),
            rev: update.rev_new.clone(),
            kind,
            status,
            error: None,
        }
    }

    fn failed(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.status.success()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<ActionOutcome>,
}

impl DispatchReport {
    pub fn failures(&self) -> Vec<&ActionOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success()).collect()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(ActionOutcome::is_success)
    }
}

pub struct Dispatcher {
    repo: PathBuf,
    launch_app: PathBuf,
    deploy_command: String,
    max_parallel: Option<usize>,
    table: Vec<ActionEntry>,
    runner: Arc<dyn CommandRunner>,
    on_complete: Option<CompletionCallback>,
}

impl Dispatcher {
    /// Build a dispatcher from `config`. `repo` and `launch_app` must name
    /// existing directories.
    pub fn new(config: &LaunchConfig, runner: Arc<dyn CommandRunner>) -> LaunchResult<Self> {
        let repo = existing_dir(
            config.repo.as_deref(),
            "Repository path not set (repo=xxxx).",
            "Repository path",
        )?;
        let launch_app = existing_dir(
            config.launch_app.as_deref(),
            "Launch application path not set (launch_app=xxxx).",
            "Launch application path",
        )?;

        let table = config
            .table
            .iter()
            .cloned()
            .map(ActionEntry::try_from)
            .collect::<LaunchResult<Vec<_>>>()?;

        Ok(Self {
            repo,
            launch_app,
            deploy_command: config
                .deploy_command
                .clone()
                .unwrap_or_else(|| DEFAULT_DEPLOY_COMMAND.to_string()),
            max_parallel: config.max_parallel,
            table,
            runner,
            on_complete: None,
        })
    }

    pub fn with_entry(mut self, entry: ActionEntry) -> Self {
        self.table.push(entry);
        self
    }

    pub fn with_deploy_command(mut self, command: impl Into<String>) -> Self {
        self.deploy_command = command.into();
        self
    }

    /// Called after every successful deployment, once its relaunch has run
    pub fn on_complete(mut self, callback: impl Fn(&Deployment) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(callback));
        self
    }

    /// Absolute path of the source repository
    pub fn repo(&self) -> &Path {
        &self.repo
    }

    pub fn table(&self) -> &[ActionEntry] {
        &self.table
    }

    /// Read `input` to the end, then dispatch it
    pub async fn run<R: AsyncRead + Unpin>(&self, mut input: R) -> LaunchResult<DispatchReport> {
        let mut buffer = String::new();
        input.read_to_string(&mut buffer).await?;
        Ok(self.dispatch(&buffer).await)
    }

    pub async fn dispatch(&self, input: &str) -> DispatchReport {
        let updates = parse_ref_updates(input);
        let semaphore = self.max_parallel.map(|limit| Semaphore::new(limit.max(1)));
        let semaphore = semaphore.as_ref();

        let jobs = updates.iter().flat_map(|update| {
            self.table
                .iter()
                .filter(move |entry| entry.matches(update))
                .map(move |entry| (update, entry))
        });

        let outcomes = join_all(jobs.map(|(update, entry)| async move {
            let _permit = match semaphore {
                Some(semaphore) => semaphore.acquire().await.ok(),
                None => None,
            };
            self.run_action(update, entry).await
        }))
        .await;

        info!(
            updates = updates.len(),
            actions = outcomes.len(),
            "post-receive batch dispatched"
        );
        DispatchReport { outcomes }
    }

    async fn run_action(&self, update: &RefUpdate, entry: &ActionEntry) -> ActionOutcome {
        debug!(branch = %update.branch, kind = %entry.action.kind(), "dispatching action");

        match &entry.action {
            Action::Command(exec) => {
                let line = format!(
                    "{} {} {} {}",
                    exec,
                    shell_quote(&update.rev_old),
                    shell_quote(&update.rev_new),
                    shell_quote(&update.branch)
                );
                self.run_command(update, ActionKind::Command, remote(line, entry))
                    .await
            }
            Action::Callback(callback) => {
                callback.call(update);
                ActionOutcome::new(update, ActionKind::Callback, ExitStatus::SUCCESS)
            }
            Action::Deploy { dir } => self.deploy(update, entry, dir).await,
        }
    }

    async fn deploy(&self, update: &RefUpdate, entry: &ActionEntry, dir: &str) -> ActionOutcome {
        let line = format!(
            "{} --branch {} --rev {} --repo {} --dir {}",
            self.deploy_command,
            shell_quote(&update.branch),
            shell_quote(&update.rev_new),
            shell_quote(&self.repo.to_string_lossy()),
            shell_quote(dir)
        );
        let command = CommandSpec::shell(line).in_dir(&self.launch_app);

        let outcome = self.run_command(update, ActionKind::Deploy, command).await;
        if !outcome.is_success() {
            report::error(&format!(
                "Deployment of {} @ {} failed (exit code {}).",
                update.branch, update.rev_new, outcome.status
            ));
            return outcome;
        }

        let outcome = match &entry.relaunch {
            Some(relaunch) => {
                let relaunched = self
                    .run_command(update, ActionKind::Deploy, remote(relaunch.clone(), entry))
                    .await;
                if relaunched.is_success() {
                    outcome
                } else {
                    let message = format!("Relaunch after deploying {} failed.", update.branch);
                    report::error(&message);
                    relaunched.failed(message)
                }
            }
            None => outcome,
        };

        // Reported whether or not the relaunch succeeded
        if let Some(callback) = &self.on_complete {
            callback(&Deployment {
                branch: update.branch.clone(),
                rev: update.rev_new.clone(),
                dir: dir.to_string(),
            });
        }
        outcome
    }

    async fn run_command(
        &self,
        update: &RefUpdate,
        kind: ActionKind,
        command: CommandSpec,
    ) -> ActionOutcome {
        match self.runner.run(&command).await {
            Ok(output) => ActionOutcome::new(update, kind, output.status),
            Err(err) => ActionOutcome::new(update, kind, ExitStatus::from_code(-1))
                .failed(format!("{}: {}", command.display_line(), err)),
        }
    }
}

fn remote(line: String, entry: &ActionEntry) -> CommandSpec {
    let command = CommandSpec::shell(line);
    match &entry.host {
        Some(host) => command.on_host(host.clone()),
        None => command,
    }
}

fn existing_dir(path: Option<&Path>, missing: &str, label: &str) -> LaunchResult<PathBuf> {
    let path = path.ok_or_else(|| LaunchError::Dispatch(missing.to_string()))?;
    if !path.is_dir() {
        return Err(LaunchError::Dispatch(format!(
            "{} {} is invalid.",
            label,
            path.display()
        )));
    }
    // Deploy commands run from `launch_app`, so relative paths must be resolved here
    Ok(path.canonicalize()?)
}
