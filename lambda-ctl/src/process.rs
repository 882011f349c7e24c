//! Subprocess execution bounded by the execution context.

use crate::context::ExecContext;
use crate::utils::errors::{CtlError, Result};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tracing::{debug, info};

/// Run `program` with inherited stdio in `cwd` and wait for it.
///
/// On cancellation the child is killed and `Cancelled` is returned. Spawn
/// failures surface as `Io`.
pub async fn run_inherited(
    ctx: &ExecContext,
    program: &str,
    args: &[String],
    cwd: &Path,
) -> Result<ExitStatus> {
    ctx.check()?;

    debug!("Spawning {} {:?} in {}", program, args, cwd.display());
    let mut child = tokio::process::Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(CtlError::io("spawning", program))?;

    tokio::select! {
        status = child.wait() => status.map_err(CtlError::io("waiting for", program)),
        _ = ctx.cancelled() => {
            info!("Killing {} after cancellation", program);
            let _ = child.kill().await;
            Err(CtlError::Cancelled)
        }
    }
}

/// Exit code of a finished child; `128 + signal` when killed by a signal.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

/// Build the `sh -c` invocation for an action command line plus extra arguments.
pub fn shell_command(command: &str, args: &[String]) -> (String, Vec<String>) {
    let script = if args.is_empty() {
        command.to_string()
    } else {
        format!("{} {}", command, shell_words::join(args))
    };
    ("sh".to_string(), vec!["-c".to_string(), script])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_shell_command_quotes_args() {
        let (program, args) = shell_command("echo", &["a b".to_string(), "c".to_string()]);
        assert_eq!(program, "sh");
        assert_eq!(args, vec!["-c".to_string(), "echo 'a b' c".to_string()]);
    }

    #[test]
    fn test_shell_command_without_args() {
        let (_, args) = shell_command("make build", &[]);
        assert_eq!(args[1], "make build");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_is_relayed() {
        let ctx = ExecContext::detached();
        let dir = tempfile::TempDir::new().unwrap();
        let (program, args) = shell_command("exit 7", &[]);
        let status = run_inherited(&ctx, &program, &args, dir.path()).await.unwrap();
        assert_eq!(exit_code(status), 7);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_kills_child() {
        let ctx = ExecContext::detached();
        let dir = tempfile::TempDir::new().unwrap();
        let (program, args) = shell_command("sleep 30", &[]);

        let started = std::time::Instant::now();
        let (result, ()) = tokio::join!(run_inherited(&ctx, &program, &args, dir.path()), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            ctx.cancel();
        });
        assert!(matches!(result, Err(CtlError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_program_is_io_error() {
        let ctx = ExecContext::detached();
        let dir = tempfile::TempDir::new().unwrap();
        let err = run_inherited(&ctx, "definitely-not-a-real-program-xyz", &[], dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, CtlError::Io { .. }), "got: {err:?}");
    }
}
