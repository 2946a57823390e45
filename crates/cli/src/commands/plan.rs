use std::sync::Arc;

use anyhow::{Context, Result};
use colored::*;
use launch_core::execution::ShellRunner;
use launch_core::pipeline::build_pipeline;

pub fn execute(task: &str) -> Result<()> {
    println!("{} {}", "Execution plan for".bold(), task.cyan());

    let graph =
        build_pipeline(Arc::new(ShellRunner::new())).context("Failed to build task graph")?;
    let plan = graph
        .plan(task)
        .with_context(|| format!("Failed to get execution plan for '{}'", task))?;

    println!("\n{}:", "Execution order".bold());
    for (i, name) in plan.iter().enumerate() {
        println!("  {}. {}", i + 1, name);
    }
    println!(
        "\n{}",
        "build invokes npm or jake at run time depending on the checkout".dimmed()
    );

    Ok(())
}
