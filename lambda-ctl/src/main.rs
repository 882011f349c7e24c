//! lambda-ctl - Main entry point

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use lambda_ctl::actions::{Dispatched, Dispatcher};
use lambda_ctl::context::ExecContext;
use lambda_ctl::manifest::BareOptions;
use lambda_ctl::project::scaffold::init_bare;
use lambda_ctl::remote::RemoteClient;
use lambda_ctl::sync::{self, DownloadTarget};
use lambda_ctl::{utils, Config, CtlError};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", env = "LAMBDA_CTL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new project in the current directory
    Init {
        #[command(subcommand)]
        template: InitTemplate,
    },

    /// Download the packaged content of a remote function
    Download {
        #[command(flatten)]
        target: RemoteArgs,

        /// Write the archive here instead of standard output ("-" for stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Package the project and replace the remote content with it
    Upload {
        #[command(flatten)]
        target: RemoteArgs,
    },

    /// Copy a remote function into a local directory and track it
    Clone {
        /// Remote function name
        #[arg(long)]
        name: String,

        /// Remote host URL (defaults to the configured one)
        #[arg(long)]
        url: Option<String>,

        /// Destination directory (defaults to ./<name>)
        dir: Option<PathBuf>,
    },

    /// Run a named action, or list the available actions
    Do {
        /// Project directory
        #[arg(short = 'C', value_name = "DIR", default_value = ".")]
        dir: PathBuf,

        /// Action name
        action: Option<String>,

        /// Arguments passed to the action
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum InitTemplate {
    /// Minimal project echoing a fixed JSON body
    Bare(BareArgs),
}

#[derive(ClapArgs, Debug)]
struct BareArgs {
    /// Initialize a git repository and add an update action
    #[arg(long, env = "GIT")]
    git: bool,

    /// Project description
    #[arg(short, long, env = "DESCRIPTION", default_value = "Bare project")]
    description: String,

    /// Mark the function private
    #[arg(short = 'P', long, env = "PRIVATE")]
    private: bool,

    /// Per-request time limit
    #[arg(short, long, env = "TIME_LIMIT", default_value = "10s", value_parser = humantime::parse_duration)]
    time_limit: Duration,

    /// Maximum request/response payload in bytes
    #[arg(short = 'p', long, env = "MAX_PAYLOAD", default_value_t = 8192)]
    max_payload: u64,
}

impl From<BareArgs> for BareOptions {
    fn from(args: BareArgs) -> Self {
        BareOptions {
            git: args.git,
            description: args.description,
            private: args.private,
            time_limit: args.time_limit,
            max_payload: args.max_payload,
        }
    }
}

#[derive(ClapArgs, Debug)]
struct RemoteArgs {
    /// Remote host URL (defaults to the tracked or configured one)
    #[arg(long)]
    url: Option<String>,

    /// Remote function name (defaults to the tracked one)
    #[arg(long)]
    name: Option<String>,

    /// Project directory
    #[arg(short = 'C', value_name = "DIR", default_value = ".")]
    dir: PathBuf,
}

impl RemoteArgs {
    fn connect(&self, config: &Config) -> lambda_ctl::Result<(RemoteClient, String)> {
        let identity = sync::resolve_identity(
            &self.dir,
            self.url.as_deref(),
            self.name.as_deref(),
            &config.remote.url,
        )?;
        debug!("Using remote {}", identity);
        let client = RemoteClient::new(&identity.url, config.token())?;
        Ok((client, identity.name))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match bootstrap(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("lambda-ctl: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(args.command, &config).await {
        Ok(code) => exit_status(code),
        Err(e) => {
            error!("{}", e);
            exit_status(e.exit_code())
        }
    }
}

/// Load configuration and initialize logging.
fn bootstrap(args: &Args) -> anyhow::Result<Config> {
    let config = Config::load(args.config.as_deref()).context("loading configuration")?;
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level).context("initializing logging")?;
    Ok(config)
}

async fn run(command: Command, config: &Config) -> lambda_ctl::Result<i32> {
    let ctx = ExecContext::install(config.grace_period())?;

    match command {
        Command::Init {
            template: InitTemplate::Bare(bare),
        } => {
            let dir = current_dir()?;
            let report = init_bare(&ctx, &dir, &bare.into()).await?;
            info!(
                "Initialized {} in {} ({} files{})",
                report.manifest.name,
                dir.display(),
                report.files.len(),
                if report.repository { ", git repository" } else { "" }
            );
            Ok(0)
        }

        Command::Download { target, output } => {
            let (client, name) = target.connect(config)?;
            let destination = match output {
                Some(path) if path != Path::new("-") => DownloadTarget::File(path),
                _ => DownloadTarget::Stdout,
            };
            sync::download(&ctx, &client, &name, &destination).await?;
            Ok(0)
        }

        Command::Upload { target } => {
            let (client, name) = target.connect(config)?;
            let report = sync::upload(&ctx, &client, &name, &target.dir).await?;
            info!(
                "Uploaded {} files ({} bytes) to {}",
                report.files, report.source_bytes, name
            );
            Ok(0)
        }

        Command::Clone { name, url, dir } => {
            let url = url.unwrap_or_else(|| config.remote.url.clone());
            let client = RemoteClient::new(&url, config.token())?;
            let dir = dir.unwrap_or_else(|| PathBuf::from(&name));
            sync::clone(&ctx, &client, &name, &dir).await?;
            Ok(0)
        }

        Command::Do { dir, action, args } => {
            let mut dispatcher = Dispatcher::for_project(&dir, config.token());
            let result = dispatcher.run(&ctx, action.as_deref(), &args).await;
            debug!("Dispatch finished in state {:?}", dispatcher.state());
            match result? {
                Dispatched::Listed(names) => {
                    for name in names {
                        println!("{}", name);
                    }
                    Ok(0)
                }
                Dispatched::Ran(outcome) => Ok(outcome.exit_code),
            }
        }
    }
}

fn current_dir() -> lambda_ctl::Result<PathBuf> {
    std::env::current_dir().map_err(CtlError::io("resolving", "current directory"))
}

fn exit_status(code: i32) -> ExitCode {
    ExitCode::from(exit_byte(code))
}

/// Reduce a relayed status to the low 8 bits, as a shell reports it.
fn exit_byte(code: i32) -> u8 {
    let byte = (code & 0xff) as u8;
    if i32::from(byte) != code {
        debug!("Exit status {} reported as {}", code, byte);
    }
    byte
}
