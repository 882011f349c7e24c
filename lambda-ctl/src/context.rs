//! Cancellable execution context driven by SIGINT / SIGTERM.
//!
//! One context is installed per process at command start and threaded into
//! every subprocess and network call. The first signal cancels the context;
//! a second signal, or the grace period running out, forces the process to
//! exit.

use crate::utils::errors::{CtlError, Result, EXIT_CANCELLED};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Shared cancellation token plus the signal task that drives it.
pub struct ExecContext {
    token: CancellationToken,
    signal_task: Option<JoinHandle<()>>,
}

impl ExecContext {
    /// Install the process-wide context and its signal handlers.
    ///
    /// Fails if a context has already been installed in this process.
    pub fn install(grace: Duration) -> Result<Self> {
        if INSTALLED.swap(true, Ordering::SeqCst) {
            return Err(CtlError::Config("execution context already installed".into()));
        }

        let token = CancellationToken::new();
        let signal_token = token.clone();
        let signal_task = tokio::spawn(async move {
            wait_for_signal().await;
            warn!("Interrupt received, cancelling (press Ctrl+C again to force exit)");
            signal_token.cancel();

            tokio::select! {
                _ = wait_for_signal() => warn!("Second interrupt, forcing exit"),
                _ = tokio::time::sleep(grace) => warn!("Grace period of {:?} elapsed, forcing exit", grace),
            }
            std::process::exit(EXIT_CANCELLED);
        });

        Ok(Self {
            token,
            signal_task: Some(signal_task),
        })
    }

    /// A context without signal handling. Cancelled only through [`cancel`](Self::cancel).
    pub fn detached() -> Self {
        Self {
            token: CancellationToken::new(),
            signal_task: None,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the context is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Fail with `Cancelled` if the context is already cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CtlError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run `fut` unless the context is cancelled first.
    ///
    /// Cancellation wins ties; the future is dropped, which aborts in-flight
    /// HTTP exchanges and kills `kill_on_drop` children.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                debug!("Operation aborted by cancellation");
                Err(CtlError::Cancelled)
            }
            result = fut => result,
        }
    }
}

impl Drop for ExecContext {
    fn drop(&mut self) {
        if let Some(task) = self.signal_task.take() {
            task.abort();
            INSTALLED.store(false, Ordering::SeqCst);
        }
    }
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => debug!("Received SIGINT"),
        _ = terminate => debug!("Received SIGTERM"),
    }
}
