use anyhow::{Context, Result};
use launch_core::configs::launch::launch_config_schema;

pub fn execute() -> Result<()> {
    let schema = launch_config_schema().context("Failed to generate schema")?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
