//! Action dispatch for a project directory.
//!
//! A directory that tracks a remote function takes its actions from the host;
//! any other directory uses its local `Actionfile`. The choice is made once per
//! run, from the presence of the tracking record alone.
//!
//! ```text
//! Idle -> Resolving -> Executing -> Succeeded
//!              \            \----> Failed(kind)
//!               \            \---> Cancelled
//!                \---------------> Failed(kind)
//! ```

pub mod source;

use crate::context::ExecContext;
use crate::project::tracking;
use crate::utils::errors::{CtlError, Result};
use source::{ActionOutcome, ActionSource, LocalFileSource, RemoteHostSource};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Resolving,
    Executing,
    Succeeded,
    /// Holds the error kind that ended the run.
    Failed(&'static str),
    Cancelled,
}

/// What a dispatch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// No action was named; these are the available ones.
    Listed(Vec<String>),
    Ran(ActionOutcome),
}

enum Selected {
    Local(LocalFileSource),
    Remote(RemoteHostSource),
}

/// Runs or lists the actions of one project directory.
pub struct Dispatcher {
    dir: PathBuf,
    token: Option<String>,
    state: DispatchState,
}

impl Dispatcher {
    pub fn for_project(dir: &Path, token: Option<&str>) -> Self {
        Self {
            dir: dir.to_path_buf(),
            token: token.map(str::to_string),
            state: DispatchState::Idle,
        }
    }

    pub fn state(&self) -> &DispatchState {
        &self.state
    }

    /// Invoke `action` with `args`, or list the available actions when no
    /// action is named.
    pub async fn run(&mut self, ctx: &ExecContext, action: Option<&str>, args: &[String]) -> Result<Dispatched> {
        self.state = DispatchState::Resolving;
        let selected = match self.select() {
            Ok(selected) => selected,
            Err(e) => {
                self.state = DispatchState::Failed(e.kind());
                return Err(e);
            }
        };

        self.state = DispatchState::Executing;
        let result = match &selected {
            Selected::Local(source) => execute(source, ctx, action, args).await,
            Selected::Remote(source) => execute(source, ctx, action, args).await,
        };

        self.state = match &result {
            Ok(Dispatched::Ran(outcome)) if !outcome.succeeded() => DispatchState::Failed("ActionFailed"),
            Ok(_) => DispatchState::Succeeded,
            Err(CtlError::Cancelled) => DispatchState::Cancelled,
            Err(e) => DispatchState::Failed(e.kind()),
        };
        result
    }

    fn select(&self) -> Result<Selected> {
        match tracking::load(&self.dir)? {
            Some(record) => {
                debug!("{} tracks {}, using remote actions", self.dir.display(), record.remote);
                Ok(Selected::Remote(RemoteHostSource::new(
                    record.remote,
                    self.token.as_deref(),
                )?))
            }
            None => Ok(Selected::Local(LocalFileSource::load(&self.dir)?)),
        }
    }
}

async fn execute<S: ActionSource>(
    source: &S,
    ctx: &ExecContext,
    action: Option<&str>,
    args: &[String],
) -> Result<Dispatched> {
    let Some(action) = action else {
        return source.list(ctx).await.map(Dispatched::Listed);
    };

    let outcome = source.invoke(ctx, action, args).await?;
    if !outcome.succeeded() {
        warn!(
            "Action '{}' from {} exited with status {}",
            action,
            source.describe(),
            outcome.exit_code
        );
    }
    Ok(Dispatched::Ran(outcome))
}
