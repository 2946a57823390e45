//! Parameters and shared state of one deployment run

use crate::types::{LaunchError, LaunchResult};

/// Raw pipeline parameters as supplied by the caller (command line or environment)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployParams {
    pub branch: Option<String>,
    pub rev: Option<String>,
    pub repo: Option<String>,
    pub dir: Option<String>,
    /// Remove stale revision directories after the symlink moves
    pub clean: bool,
}

/// Validated parameters plus the paths derived from them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTarget {
    pub branch: String,
    pub rev: String,
    pub repo: String,
    pub dir: String,
    /// Revision-specific checkout, `dir + "." + rev`
    pub dst: String,
    /// Stable symlink clients use, `dir + "/" + branch`
    pub ln: String,
}

impl DeployTarget {
    pub fn resolve(params: &DeployParams) -> LaunchResult<Self> {
        let rev = required(&params.rev, "Git revision not specified (rev=xxxx).")?;
        let branch = required(&params.branch, "Git branch not specified (branch=xxxx).")?;
        let repo = required(
            &params.repo,
            "Git source repository not specified (repo=xxxx).",
        )?;
        let dir = required(
            &params.dir,
            "Destination directory not specified (dir=xxxx).",
        )?;

        Ok(Self {
            dst: format!("{}.{}", dir, rev),
            ln: format!("{}/{}", dir, branch),
            branch,
            rev,
            repo,
            dir,
        })
    }
}

fn required(value: &Option<String>, message: &str) -> LaunchResult<String> {
    match value.as_deref() {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(LaunchError::Config(message.to_string())),
    }
}

/// State threaded through every pipeline task. The target is written once, by
/// `validate`, and only read afterwards.
#[derive(Debug, Clone)]
pub struct DeployContext {
    params: DeployParams,
    target: Option<DeployTarget>,
}

impl DeployContext {
    pub fn new(params: DeployParams) -> Self {
        Self {
            params,
            target: None,
        }
    }

    pub fn params(&self) -> &DeployParams {
        &self.params
    }

    pub fn target(&self) -> LaunchResult<&DeployTarget> {
        self.target.as_ref().ok_or_else(|| {
            LaunchError::Task("Deployment target read before 'validate' completed".to_string())
        })
    }

    pub(crate) fn set_target(&mut self, target: DeployTarget) -> LaunchResult<()> {
        if self.target.is_some() {
            return Err(LaunchError::Task(
                "Deployment target is already set".to_string(),
            ));
        }
        self.target = Some(target);
        Ok(())
    }

    pub fn into_target(self) -> LaunchResult<DeployTarget> {
        self.target.ok_or_else(|| {
            LaunchError::Task("Deployment finished without a validated target".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(rev: &str, branch: &str, repo: &str, dir: &str) -> DeployParams {
        let value = |v: &str| (!v.is_empty()).then(|| v.to_string());
        DeployParams {
            branch: value(branch),
            rev: value(rev),
            repo: value(repo),
            dir: value(dir),
            clean: false,
        }
    }

    #[test]
    fn test_paths_are_plain_concatenation() {
        let target = DeployTarget::resolve(&params(
            "4b6f",
            "master",
            "/srv/git/app.git",
            "/srv/node/app/",
        ))
        .unwrap();

        assert_eq!(target.dst, "/srv/node/app/.4b6f");
        assert_eq!(target.ln, "/srv/node/app//master");
    }

    #[test]
    fn test_missing_repo_is_named() {
        let err = DeployTarget::resolve(&params("b2", "master", "", "/x")).unwrap_err();

        assert!(matches!(err, LaunchError::Config(_)));
        assert!(err.to_string().contains("repo=xxxx"));
    }

    #[test]
    fn test_fields_are_checked_in_order() {
        let err = DeployTarget::resolve(&params("", "", "", "")).unwrap_err();
        assert!(err.to_string().contains("rev=xxxx"));

        let err = DeployTarget::resolve(&params("b2", "master", "/r", "")).unwrap_err();
        assert!(err.to_string().contains("dir=xxxx"));
    }

    #[test]
    fn test_target_is_written_once() {
        let mut context = DeployContext::new(params("b2", "master", "/r", "/x"));
        assert!(context.target().is_err());

        let target = DeployTarget::resolve(context.params()).unwrap();
        context.set_target(target.clone()).unwrap();

        assert!(context.set_target(target).is_err());
        assert_eq!(context.target().unwrap().dst, "/x.b2");
    }
}
