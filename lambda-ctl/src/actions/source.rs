//! Where named actions come from: the local `Actionfile` or the remote host.

use crate::context::ExecContext;
use crate::process::{exit_code, run_inherited, shell_command};
use crate::project::actionfile::ActionFile;
use crate::project::tracking::RemoteIdentity;
use crate::project::ACTION_FILE;
use crate::remote::RemoteClient;
use crate::utils::errors::{CtlError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Result of running one action to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionOutcome {
    pub exit_code: i32,
}

impl ActionOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// A provider of named actions.
#[allow(async_fn_in_trait)]
pub trait ActionSource {
    /// Short description for logs.
    fn describe(&self) -> String;

    async fn list(&self, ctx: &ExecContext) -> Result<Vec<String>>;

    async fn invoke(&self, ctx: &ExecContext, action: &str, args: &[String]) -> Result<ActionOutcome>;
}

/// Actions declared in the project's `Actionfile`, run through `sh -c` in the
/// project root with inherited stdio.
#[derive(Debug, Clone)]
pub struct LocalFileSource {
    dir: PathBuf,
    actions: ActionFile,
}

impl LocalFileSource {
    /// Load the action file of `dir`; a missing file yields no actions.
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            dir: dir.to_path_buf(),
            actions: ActionFile::load(&dir.join(ACTION_FILE))?,
        })
    }
}

impl ActionSource for LocalFileSource {
    fn describe(&self) -> String {
        self.dir.join(ACTION_FILE).display().to_string()
    }

    async fn list(&self, _ctx: &ExecContext) -> Result<Vec<String>> {
        Ok(self.actions.names())
    }

    async fn invoke(&self, ctx: &ExecContext, action: &str, args: &[String]) -> Result<ActionOutcome> {
        let entry = self
            .actions
            .get(action)
            .ok_or_else(|| CtlError::LocalActionNotFound(action.to_string()))?;

        let (program, argv) = shell_command(&entry.command, args);
        info!("Running local action '{}': {}", action, entry.command);
        let status = run_inherited(ctx, &program, &argv, &self.dir).await?;
        Ok(ActionOutcome {
            exit_code: exit_code(status),
        })
    }
}

/// Actions defined by the host for a tracked function. Output is relayed to
/// stdout as it streams back.
#[derive(Clone)]
pub struct RemoteHostSource {
    client: RemoteClient,
    identity: RemoteIdentity,
}

impl RemoteHostSource {
    pub fn new(identity: RemoteIdentity, token: Option<&str>) -> Result<Self> {
        Ok(Self {
            client: RemoteClient::new(&identity.url, token)?,
            identity,
        })
    }
}

impl ActionSource for RemoteHostSource {
    fn describe(&self) -> String {
        self.identity.to_string()
    }

    async fn list(&self, ctx: &ExecContext) -> Result<Vec<String>> {
        self.client.list_actions(ctx, &self.identity.name).await
    }

    async fn invoke(&self, ctx: &ExecContext, action: &str, args: &[String]) -> Result<ActionOutcome> {
        debug!("Invoking remote action '{}' on {}", action, self.identity);
        let mut stdout = tokio::io::stdout();
        let exit_code = self
            .client
            .invoke_action(ctx, &self.identity.name, action, args, &mut stdout)
            .await?;
        Ok(ActionOutcome { exit_code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_source_runs_in_project_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(ACTION_FILE),
            "touch: touch marker\nfail: exit 4\nargs: printf '%s|' > args.txt\n",
        )
        .unwrap();
        let source = LocalFileSource::load(dir.path()).unwrap();
        let ctx = ExecContext::detached();

        assert_eq!(source.list(&ctx).await.unwrap(), vec!["touch", "fail", "args"]);

        let outcome = source.invoke(&ctx, "touch", &[]).await.unwrap();
        assert!(outcome.succeeded());
        assert!(dir.path().join("marker").exists());

        let outcome = source.invoke(&ctx, "fail", &[]).await.unwrap();
        assert_eq!(outcome.exit_code, 4);

        // Extra arguments reach the command as separate, quoted words.
        let outcome = source
            .invoke(&ctx, "args", &["two words".to_string(), "x".to_string()])
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(fs::read_to_string(dir.path().join("args.txt")).unwrap(), "two words|x|");
    }

    #[tokio::test]
    async fn test_local_source_cancellation_kills_action() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(ACTION_FILE), "wait: sleep 30\n").unwrap();
        let source = LocalFileSource::load(dir.path()).unwrap();
        let ctx = ExecContext::detached();

        let started = std::time::Instant::now();
        let (result, ()) = tokio::join!(source.invoke(&ctx, "wait", &[]), async {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            ctx.cancel();
        });
        assert!(matches!(result, Err(CtlError::Cancelled)), "got: {result:?}");
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }
}
