//! policy::hooks
//!
//! Generation of the delegate `pre-receive` script.
//!
//! The script carries no policy of its own. It re-invokes this executable's
//! hook entry point and points it at the repository's policy sidecar:
//!
//! ```text
//! #!/usr/bin/env sh
//! '/usr/local/bin/hostgit' hook --policy='/srv/repos/alice/notes.git/protected_branches.json' pre-receive
//! ```
//!
//! Standard input (the ref updates) is inherited by the re-invoked process,
//! and the script's exit status is that process's exit status.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::PolicyError;
use crate::core::config::Config;
use crate::core::paths::HostPaths;

/// Parameters of a generated hook script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookScript {
    /// Executable re-invoked by the script.
    pub app_path: PathBuf,
    /// Interpreter named in the shebang.
    pub script_type: String,
}

impl HookScript {
    pub fn new(app_path: impl Into<PathBuf>, script_type: impl Into<String>) -> Self {
        Self {
            app_path: app_path.into(),
            script_type: script_type.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.hook_app_path(), config.hook_script_type())
    }

    /// Script text for a repository whose policy lives at `policy_path`.
    pub fn render(&self, policy_path: &Path) -> String {
        format!(
            "#!/usr/bin/env {}\n{} hook --policy={} pre-receive\n",
            self.script_type,
            shell_quote(&self.app_path.to_string_lossy()),
            shell_quote(&policy_path.to_string_lossy()),
        )
    }

    /// Write the `pre-receive` script of the bare repository at `repo_path`
    /// with mode 0755. Returns the script path.
    pub fn install(&self, repo_path: &Path) -> Result<PathBuf, PolicyError> {
        let hook = HostPaths::pre_receive_hook_at(repo_path);
        let dir = hook
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| repo_path.join("hooks"));
        std::fs::create_dir_all(&dir).map_err(|e| PolicyError::io(&dir, e))?;

        let text = self.render(&HostPaths::policy_at(repo_path));
        let mut temp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| PolicyError::io(&dir, e))?;
        temp.write_all(text.as_bytes())
            .map_err(|e| PolicyError::io(&hook, e))?;
        set_executable(temp.path())?;
        temp.persist(&hook)
            .map_err(|e| PolicyError::io(&hook, e.error))?;

        debug!(hook = %hook.display(), "installed pre-receive hook");
        Ok(hook)
    }
}

/// Install every delegate hook of the bare repository at `repo_path`.
pub fn install_hooks(repo_path: &Path, script: &HookScript) -> Result<Vec<PathBuf>, PolicyError> {
    Ok(vec![script.install(repo_path)?])
}

/// Quote for a POSIX shell: wrap in single quotes, escaping embedded ones.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<(), PolicyError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| PolicyError::io(path, e))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<(), PolicyError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn render_reinvokes_hook_entry_point() {
        let script = HookScript::new("/usr/local/bin/hostgit", "sh");
        let text = script.render(Path::new("/srv/a.git/protected_branches.json"));
        assert_eq!(
            text,
            "#!/usr/bin/env sh\n'/usr/local/bin/hostgit' hook --policy='/srv/a.git/protected_branches.json' pre-receive\n"
        );
    }

    #[test]
    fn render_escapes_single_quotes() {
        let script = HookScript::new("/opt/it's/hostgit", "bash");
        let text = script.render(Path::new("/p.json"));
        assert!(text.starts_with("#!/usr/bin/env bash\n"));
        assert!(text.contains(r"'/opt/it'\''s/hostgit'"));
    }

    #[test]
    fn install_writes_script_in_hooks_dir() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("notes.git");
        std::fs::create_dir_all(&repo).unwrap();

        let hook = HookScript::new("hostgit", "sh").install(&repo).unwrap();

        assert_eq!(hook, repo.join("hooks").join("pre-receive"));
        let text = std::fs::read_to_string(&hook).unwrap();
        assert!(text.contains("protected_branches.json"));
    }

    #[cfg(unix)]
    #[test]
    fn installed_script_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let hook = HookScript::new("hostgit", "sh").install(temp.path()).unwrap();
        let mode = std::fs::metadata(&hook).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
