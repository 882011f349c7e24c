//! `init bare`: scaffold a function project in a directory.
//!
//! Writes the manifest, the action file and an empty ignore list, then
//! optionally runs `git init`. Files already written are not rolled back when
//! a later step fails; re-running `init` recreates them.

use super::{ACTION_FILE, IGNORE_FILE};
use crate::context::ExecContext;
use crate::manifest::{BareOptions, Manifest, MANIFEST_FILE};
use crate::process;
use crate::utils::errors::{CtlError, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Version-control tool invoked with `init`.
const VCS_TOOL: &str = "git";

/// What `init_bare` produced.
#[derive(Debug)]
pub struct ScaffoldReport {
    pub manifest: Manifest,
    pub files: Vec<PathBuf>,
    pub repository: bool,
}

/// Default action file body.
pub fn default_action_file(git: bool) -> String {
    let mut content = String::from("# define actions here\n");
    if git {
        content.push_str("update: git pull origin master\n");
    }
    content
}

pub async fn init_bare(ctx: &ExecContext, dir: &Path, options: &BareOptions) -> Result<ScaffoldReport> {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            CtlError::InvalidManifest(format!("cannot derive a name from {}", dir.display()))
        })?;

    let manifest = Manifest::bare(&name, options)?;

    let manifest_path = dir.join(MANIFEST_FILE);
    manifest.save_as(&manifest_path)?;

    let action_path = dir.join(ACTION_FILE);
    std::fs::write(&action_path, default_action_file(options.git))
        .map_err(CtlError::io("writing", action_path.clone()))?;

    let ignore_path = dir.join(IGNORE_FILE);
    std::fs::write(&ignore_path, "").map_err(CtlError::io("writing", ignore_path.clone()))?;

    info!("Scaffolded project '{}' in {}", manifest.name, dir.display());

    if options.git {
        init_repository(ctx, dir).await?;
    }

    Ok(ScaffoldReport {
        manifest,
        files: vec![manifest_path, action_path, ignore_path],
        repository: options.git,
    })
}

async fn init_repository(ctx: &ExecContext, dir: &Path) -> Result<()> {
    let status = match process::run_inherited(ctx, VCS_TOOL, &["init".to_string()], dir).await {
        Ok(status) => status,
        Err(CtlError::Cancelled) => return Err(CtlError::Cancelled),
        Err(e) => return Err(CtlError::VersionControlInitFailed(e.to_string())),
    };

    if !status.success() {
        return Err(CtlError::VersionControlInitFailed(format!(
            "{} init exited with code {}",
            VCS_TOOL,
            process::exit_code(status)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::actionfile::ActionFile;
    use std::time::Duration;

    fn project_dir(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_defaults() {
        let root = tempfile::TempDir::new().unwrap();
        let dir = project_dir(root.path(), "foo");
        let ctx = ExecContext::detached();

        let report = init_bare(&ctx, &dir, &BareOptions::default()).await.unwrap();
        assert_eq!(report.files.len(), 3);
        assert!(!report.repository);

        let manifest = Manifest::load(&dir.join(MANIFEST_FILE)).unwrap();
        assert_eq!(manifest.name, "foo");
        assert!(manifest.public);
        assert_eq!(manifest.time_limit, Duration::from_secs(10));
        assert_eq!(manifest.maximum_payload, 8192);

        assert_eq!(std::fs::read_to_string(dir.join(IGNORE_FILE)).unwrap(), "");
        let actions = ActionFile::load(&dir.join(ACTION_FILE)).unwrap();
        assert!(actions.names().is_empty());
        assert!(!dir.join(".git").exists());
    }

    #[tokio::test]
    async fn test_options_flow_into_manifest() {
        let root = tempfile::TempDir::new().unwrap();
        let dir = project_dir(root.path(), "bar");
        let ctx = ExecContext::detached();
        let options = BareOptions {
            description: "resizes images".into(),
            private: true,
            time_limit: Duration::from_secs(30),
            max_payload: 1024,
            ..BareOptions::default()
        };

        init_bare(&ctx, &dir, &options).await.unwrap();
        let manifest = Manifest::load(&dir.join(MANIFEST_FILE)).unwrap();
        assert_eq!(manifest.description, "resizes images");
        assert!(!manifest.public);
        assert_eq!(manifest.time_limit, Duration::from_secs(30));
        assert_eq!(manifest.maximum_payload, 1024);
    }

    #[tokio::test]
    async fn test_zero_time_limit_writes_nothing() {
        let root = tempfile::TempDir::new().unwrap();
        let dir = project_dir(root.path(), "baz");
        let ctx = ExecContext::detached();
        let options = BareOptions {
            time_limit: Duration::ZERO,
            ..BareOptions::default()
        };

        let err = init_bare(&ctx, &dir, &options).await.unwrap_err();
        assert!(matches!(err, CtlError::InvalidManifest(_)));
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_git_repository_and_update_action() {
        if std::process::Command::new(VCS_TOOL).arg("--version").output().is_err() {
            eprintln!("git not available, skipping");
            return;
        }

        let root = tempfile::TempDir::new().unwrap();
        let dir = project_dir(root.path(), "withgit");
        let ctx = ExecContext::detached();
        let options = BareOptions {
            git: true,
            ..BareOptions::default()
        };

        let report = init_bare(&ctx, &dir, &options).await.unwrap();
        assert!(report.repository);
        assert!(dir.join(".git").is_dir());

        let actions = ActionFile::load(&dir.join(ACTION_FILE)).unwrap();
        assert_eq!(actions.names(), vec!["update"]);
        assert_eq!(actions.get("update").unwrap().command, "git pull origin master");
    }

    #[tokio::test]
    async fn test_cancelled_before_git_init() {
        let root = tempfile::TempDir::new().unwrap();
        let dir = project_dir(root.path(), "cancelled");
        let ctx = ExecContext::detached();
        ctx.cancel();
        let options = BareOptions {
            git: true,
            ..BareOptions::default()
        };

        let err = init_bare(&ctx, &dir, &options).await.unwrap_err();
        assert!(matches!(err, CtlError::Cancelled));
        // Documented limitation: project files stay behind.
        assert!(dir.join(MANIFEST_FILE).exists());
    }
}
