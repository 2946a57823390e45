use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::{LaunchError, LaunchResult};

/// Default file name of the dispatcher configuration
pub const CONFIG_FILE: &str = "launch.yml";

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LaunchConfig {
    /// Path to the bare source repository
    pub repo: Option<PathBuf>,
    /// Directory the deploy command is launched from
    pub launch_app: Option<PathBuf>,
    /// Command that runs the deployment pipeline; `--branch`, `--rev`, `--repo`
    /// and `--dir` are appended
    pub deploy_command: Option<String>,
    /// Upper bound on actions running at once during one push
    pub max_parallel: Option<usize>,
    /// What to do when a specific branch is modified
    #[serde(default)]
    pub table: Vec<ActionConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ActionConfig {
    pub branch: String,
    /// Deploy the branch into this directory
    pub dir: Option<String>,
    /// Command run as `<exec> <old-rev> <new-rev> <branch>`; takes precedence over `dir`
    pub exec: Option<String>,
    /// Command run after a successful deployment
    pub relaunch: Option<String>,
    /// Run `exec` and `relaunch` on this host over ssh
    pub host: Option<String>,
    #[serde(alias = "port_min")]
    pub port_min: Option<u16>,
    #[serde(alias = "port_max")]
    pub port_max: Option<u16>,
}

impl LaunchConfig {
    /// Environment-style overrides for `repo` and `launch_app`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(repo) = lookup("repo").filter(|v| !v.is_empty()) {
            self.repo = Some(PathBuf::from(repo));
        }
        if let Some(launch_app) = lookup("launch_app").filter(|v| !v.is_empty()) {
            self.launch_app = Some(PathBuf::from(launch_app));
        }
    }
}

pub fn parse_launch_config(yaml_str: &str) -> LaunchResult<LaunchConfig> {
    let config: LaunchConfig = serde_yaml::from_str(yaml_str)?;
    Ok(config)
}

/// Load `path`, falling back to an empty configuration when the file is absent
pub fn load_launch_config(path: &Path) -> LaunchResult<LaunchConfig> {
    if !path.exists() {
        return Ok(LaunchConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        LaunchError::Config(format!(
            "Failed to read config {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_launch_config(&content)
}

/// JSON schema describing `launch.yml`
pub fn launch_config_schema() -> LaunchResult<serde_json::Value> {
    let schema = schemars::schema_for!(LaunchConfig);
    Ok(serde_json::to_value(&schema)?)
}
