use std::fmt;
use std::sync::Arc;

use crate::configs::launch::ActionConfig;
use crate::dispatch::refs::RefUpdate;
use crate::types::{LaunchError, LaunchResult};

/// In-process handler for a ref update
#[derive(Clone)]
pub struct ActionCallback(Arc<dyn Fn(&RefUpdate) + Send + Sync>);

impl ActionCallback {
    pub fn new(callback: impl Fn(&RefUpdate) + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    pub fn call(&self, update: &RefUpdate) {
        (self.0)(update)
    }
}

impl fmt::Debug for ActionCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ActionCallback")
    }
}

/// What to do when a matching branch is pushed
#[derive(Debug, Clone)]
pub enum Action {
    /// Shell command, run with `<old-rev> <new-rev> <branch>` appended
    Command(String),
    /// Callback invoked with the parsed ref update
    Callback(ActionCallback),
    /// Launch the deployment pipeline into `dir`
    Deploy { dir: String },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Command(_) => ActionKind::Command,
            Action::Callback(_) => ActionKind::Callback,
            Action::Deploy { .. } => ActionKind::Deploy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Command,
    Callback,
    Deploy,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActionKind::Command => "command",
            ActionKind::Callback => "callback",
            ActionKind::Deploy => "deploy",
        };
        f.write_str(label)
    }
}

/// One row of the branch action table
#[derive(Debug, Clone)]
pub struct ActionEntry {
    pub branch: String,
    pub action: Action,
    pub relaunch: Option<String>,
    pub host: Option<String>,
    /// Reserved; not used when dispatching
    pub port_min: Option<u16>,
    /// Reserved; not used when dispatching
    pub port_max: Option<u16>,
}

impl ActionEntry {
    pub fn new(branch: impl Into<String>, action: Action) -> Self {
        Self {
            branch: branch.into(),
            action,
            relaunch: None,
            host: None,
            port_min: None,
            port_max: None,
        }
    }

    pub fn command(branch: impl Into<String>, command: impl Into<String>) -> Self {
        Self::new(branch, Action::Command(command.into()))
    }

    pub fn callback(
        branch: impl Into<String>,
        callback: impl Fn(&RefUpdate) + Send + Sync + 'static,
    ) -> Self {
        Self::new(branch, Action::Callback(ActionCallback::new(callback)))
    }

    pub fn deploy(branch: impl Into<String>, dir: impl Into<String>) -> Self {
        Self::new(branch, Action::Deploy { dir: dir.into() })
    }

    pub fn with_relaunch(mut self, relaunch: impl Into<String>) -> Self {
        self.relaunch = Some(relaunch.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn matches(&self, update: &RefUpdate) -> bool {
        self.branch == update.branch
    }
}

impl TryFrom<ActionConfig> for ActionEntry {
    type Error = LaunchError;

    fn try_from(config: ActionConfig) -> LaunchResult<Self> {
        let action = match (config.exec, config.dir) {
            (Some(exec), _) => Action::Command(exec),
            (None, Some(dir)) => Action::Deploy { dir },
            (None, None) => {
                return Err(LaunchError::Config(format!(
                    "Action for branch '{}' defines neither 'exec' nor 'dir'",
                    config.branch
                )))
            }
        };

        Ok(Self {
            branch: config.branch,
            action,
            relaunch: config.relaunch,
            host: config.host,
            port_min: config.port_min,
            port_max: config.port_max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_takes_precedence_over_dir() {
        let entry = ActionEntry::try_from(ActionConfig {
            branch: "master".to_string(),
            dir: Some("/srv/node/app".to_string()),
            exec: Some("echo".to_string()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(entry.action.kind(), ActionKind::Command);
    }

    #[test]
    fn test_dir_becomes_deploy() {
        let entry = ActionEntry::try_from(ActionConfig {
            branch: "live".to_string(),
            dir: Some("/srv/node/app".to_string()),
            relaunch: Some("echo done".to_string()),
            ..Default::default()
        })
        .unwrap();

        assert!(matches!(entry.action, Action::Deploy { ref dir } if dir == "/srv/node/app"));
        assert_eq!(entry.relaunch.as_deref(), Some("echo done"));
    }

    #[test]
    fn test_entry_without_target_is_rejected() {
        let err = ActionEntry::try_from(ActionConfig {
            branch: "live".to_string(),
            ..Default::default()
        })
        .unwrap_err();

        assert!(err.to_string().contains("'live'"));
    }
}
