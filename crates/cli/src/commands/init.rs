use std::path::Path;

use anyhow::{Context, Result};
use colored::*;
use launch_core::hook::{install_post_receive_hook, sample_config};

pub fn execute(repo: &Path, config_path: &Path, force: bool) -> Result<()> {
    let repo = repo
        .canonicalize()
        .with_context(|| format!("Repository {} not found", repo.display()))?;
    let launcher = std::env::current_exe().context("Failed to locate the launch binary")?;

    let config_path = if config_path.is_absolute() {
        config_path.to_path_buf()
    } else {
        std::env::current_dir()?.join(config_path)
    };

    let hook = install_post_receive_hook(&repo, &launcher, &config_path, force)
        .context("Failed to install post-receive hook")?;
    println!("{} {}", "Installed".green().bold(), hook.display());

    if config_path.exists() {
        println!(
            "{} {}",
            "Keeping existing".dimmed(),
            config_path.display()
        );
        return Ok(());
    }

    let launch_app = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or(std::env::current_dir()?);
    let sample = sample_config(&repo, &launch_app).context("Failed to render sample config")?;
    std::fs::write(&config_path, sample)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!("{} {}", "Wrote".green().bold(), config_path.display());

    Ok(())
}
