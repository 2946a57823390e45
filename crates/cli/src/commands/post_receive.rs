use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use launch_core::configs::launch::load_launch_config;
use launch_core::dispatch::Dispatcher;
use launch_core::execution::ShellRunner;
use launch_core::report;

pub async fn execute(config_path: &Path) -> Result<()> {
    let mut config = load_launch_config(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    config.apply_overrides(|key| std::env::var(key).ok());
    tracing::debug!(
        config = %config_path.display(),
        entries = config.table.len(),
        "configuration loaded"
    );

    let mut dispatcher = Dispatcher::new(&config, Arc::new(ShellRunner::new()))
        .context("Failed to initialize dispatcher")?
        .on_complete(|deployment| {
            report::success(&format!(
                "{} @ {} is live in {}.",
                deployment.branch, deployment.rev, deployment.dir
            ));
        });

    // Re-enter this binary unless the configuration names another deploy command
    if config.deploy_command.is_none() {
        let exe = std::env::current_exe().context("Failed to locate the launch binary")?;
        dispatcher = dispatcher.with_deploy_command(format!(
            "{} deploy",
            launch_core::execution::command::shell_quote(&exe.to_string_lossy())
        ));
    }

    let result = dispatcher
        .run(tokio::io::stdin())
        .await
        .context("Failed to read post-receive input")?;

    let failures = result.failures();
    if !failures.is_empty() {
        let summary = failures
            .iter()
            .map(|o| format!("{} {} ({})", o.kind, o.branch, o.status))
            .collect::<Vec<_>>()
            .join(", ");
        anyhow::bail!("{} action(s) failed: {}", failures.len(), summary);
    }

    Ok(())
}
