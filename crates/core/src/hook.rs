//! Installing the dispatcher as a git `post-receive` hook

use std::path::{Path, PathBuf};

use crate::execution::command::shell_quote;
use crate::types::{LaunchError, LaunchResult};

/// Hooks directory of `repo`, bare or with a working tree
pub fn hooks_dir(repo: &Path) -> LaunchResult<PathBuf> {
    if !repo.is_dir() {
        return Err(LaunchError::Config(format!(
            "Repository path {} is invalid.",
            repo.display()
        )));
    }

    let git_dir = repo.join(".git");
    if git_dir.is_dir() {
        Ok(git_dir.join("hooks"))
    } else {
        Ok(repo.join("hooks"))
    }
}

pub fn post_receive_script(launcher: &Path, config: &Path) -> String {
    format!(
        "#!/bin/sh\nexec {} --config {} post-receive\n",
        shell_quote(&launcher.to_string_lossy()),
        shell_quote(&config.to_string_lossy())
    )
}

/// Write `hooks/post-receive` so every push is handed to `launcher`.
/// An existing hook is only replaced when `force` is set.
pub fn install_post_receive_hook(
    repo: &Path,
    launcher: &Path,
    config: &Path,
    force: bool,
) -> LaunchResult<PathBuf> {
    let hooks = hooks_dir(repo)?;
    std::fs::create_dir_all(&hooks)?;

    let hook = hooks.join("post-receive");
    if hook.exists() && !force {
        return Err(LaunchError::Config(format!(
            "{} already exists; pass --force to replace it",
            hook.display()
        )));
    }

    std::fs::write(&hook, post_receive_script(launcher, config))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755))?;
    }

    Ok(hook)
}

/// Starter `launch.yml` for a repository
pub fn sample_config(repo: &Path, launch_app: &Path) -> LaunchResult<String> {
    Ok(format!(
        r#"repo: {repo}
launchApp: {launch_app}
table:
  - branch: live
    dir: /srv/node/app
    relaunch: echo "relaunch the live app here"
  - branch: master
    dir: /srv/node/app
"#,
        repo = yaml_scalar(repo)?,
        launch_app = yaml_scalar(launch_app)?,
    ))
}

/// A path as a YAML scalar, quoted when it would otherwise not parse back
fn yaml_scalar(path: &Path) -> LaunchResult<String> {
    let value = serde_yaml::to_string(&*path.to_string_lossy())?;
    Ok(value.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::launch::parse_launch_config;

    #[test]
    fn test_installs_into_bare_repository() {
        let temp_dir = tempfile::tempdir().unwrap();

        let hook = install_post_receive_hook(
            temp_dir.path(),
            Path::new("/usr/local/bin/launch"),
            Path::new("/srv/launch/launch.yml"),
            false,
        )
        .unwrap();

        assert_eq!(hook, temp_dir.path().join("hooks").join("post-receive"));
        let script = std::fs::read_to_string(&hook).unwrap();
        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains(
            "exec /usr/local/bin/launch --config /srv/launch/launch.yml post-receive"
        ));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&hook).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_working_tree_uses_git_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(temp_dir.path().join(".git")).unwrap();

        assert_eq!(
            hooks_dir(temp_dir.path()).unwrap(),
            temp_dir.path().join(".git").join("hooks")
        );
    }

    #[test]
    fn test_existing_hook_needs_force() {
        let temp_dir = tempfile::tempdir().unwrap();
        let launcher = Path::new("launch");
        let config = Path::new("launch.yml");

        install_post_receive_hook(temp_dir.path(), launcher, config, false).unwrap();
        assert!(install_post_receive_hook(temp_dir.path(), launcher, config, false).is_err());
        assert!(install_post_receive_hook(temp_dir.path(), launcher, config, true).is_ok());
    }

    #[test]
    fn test_sample_config_parses() {
        let sample = sample_config(Path::new("/srv/git/app.git"), Path::new("/srv")).unwrap();
        let config = parse_launch_config(&sample).unwrap();

        assert_eq!(config.table.len(), 2);
        assert_eq!(config.repo, Some(PathBuf::from("/srv/git/app.git")));
    }

    #[test]
    fn test_sample_config_quotes_awkward_paths() {
        let repo = Path::new("/srv/git/my: app #1.git");
        let launch_app = Path::new("/srv/it's here");

        let config = parse_launch_config(&sample_config(repo, launch_app).unwrap()).unwrap();

        assert_eq!(config.repo.as_deref(), Some(repo));
        assert_eq!(config.launch_app.as_deref(), Some(launch_app));
    }
}
