use std::sync::Arc;

use anyhow::{Context, Result};
use colored::*;
use launch_core::execution::ShellRunner;
use launch_core::pipeline::build_pipeline;

pub fn execute() -> Result<()> {
    println!("{}", "Deployment Task Graph:".bold().underline());

    let graph =
        build_pipeline(Arc::new(ShellRunner::new())).context("Failed to build task graph")?;

    for task in graph.tasks() {
        print!("{}", task.name().blue().bold());
        match task.description() {
            Some(description) => println!("  {}", description.dimmed()),
            None => println!(),
        }

        if !task.prerequisites().is_empty() {
            println!(
                "  {} {}",
                "depends on:".dimmed(),
                task.prerequisites().join(", ")
            );
        } else {
            println!("  {}", "no prerequisites".dimmed());
        }
        println!();
    }

    Ok(())
}
