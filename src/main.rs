#![forbid(unsafe_code)]

//! `replwire` — evaluator session client binary.
//!
//! Bootstraps configuration and logging, opens a session (spawn a local
//! evaluator or connect to a listening one), runs a single command, and
//! tears the session down.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use replwire::config::GlobalConfig;
use replwire::{complete, resolver};
use replwire::{AppError, EvalHandle, EvalOutcome, ModuleRef, ReplSession, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "replwire", about = "Evaluator session client", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Connect to this host, overriding the configured evaluator.
    #[arg(long, requires = "port")]
    host: Option<String>,

    /// Connect to this port, overriding the configured evaluator.
    #[arg(long, requires = "host")]
    port: Option<u16>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Evaluate an expression and print the result.
    Eval {
        /// Expression to evaluate.
        expr: String,

        /// Text supplied on the evaluation's standard input.
        #[arg(long, default_value = "")]
        stdin_data: String,

        /// Evaluate in this module (`#f`, a name, or a quoted name).
        #[arg(long)]
        module: Option<String>,

        /// Resolve the module context from this source file path.
        #[arg(long, conflicts_with = "module")]
        file: Option<PathBuf>,

        /// Cancel the evaluation after this many seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Use the legacy plain framing instead of sentinel framing.
        #[arg(long)]
        legacy_framing: bool,

        /// Render the result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print completion candidates for a symbol prefix.
    Complete {
        /// Symbol prefix to complete.
        prefix: String,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = GlobalConfig::load_from_path(&args.config)?;
    let mut session = open_session(&args, &config).await?;

    let result = run_command(&args.command, &mut session, &config).await;
    session.quit().await;
    result
}

/// Open a session per CLI overrides and configuration: explicit host/port
/// wins, then `[remote]`, then spawning `[evaluator]`.
async fn open_session(args: &Cli, config: &GlobalConfig) -> Result<ReplSession> {
    if let (Some(host), Some(port)) = (&args.host, args.port) {
        info!(host = %host, port, "connecting to evaluator");
        return ReplSession::connect(host, port).await;
    }

    if let Some(remote) = &config.remote {
        info!(host = %remote.host, port = remote.port, "connecting to configured evaluator");
        return ReplSession::connect(&remote.host, remote.port).await;
    }

    let Some(evaluator) = &config.evaluator else {
        return Err(AppError::Config(
            "config must define [evaluator] or [remote]".into(),
        ));
    };
    info!(command = %evaluator.command, "spawning evaluator");
    ReplSession::spawn(evaluator).await
}

async fn run_command(
    command: &CliCommand,
    session: &mut ReplSession,
    config: &GlobalConfig,
) -> Result<()> {
    match command {
        CliCommand::Eval {
            expr,
            stdin_data,
            module,
            file,
            timeout_secs,
            legacy_framing,
            json,
        } => {
            let module = resolve_module(module.as_deref(), file.as_deref(), config)?;
            session.set_module_context(module);

            let handle = if *legacy_framing {
                session.submit_legacy(expr).await?
            } else {
                session
                    .submit(expr, stdin_data, session.module_context())
                    .await?
            };
            let outcome = await_with_interrupt(session, handle, *timeout_secs).await?;
            render_outcome(&outcome, *json)
        }
        CliCommand::Complete { prefix } => {
            for candidate in complete::completions(session, prefix).await? {
                println!("{candidate}");
            }
            Ok(())
        }
    }
}

/// Determine the module context from an explicit designator, a source file
/// path, or default to the top level.
fn resolve_module(
    module: Option<&str>,
    file: Option<&Path>,
    config: &GlobalConfig,
) -> Result<ModuleRef> {
    if let Some(designator) = module {
        return ModuleRef::decode(designator);
    }

    if let Some(file) = file {
        let root = match &config.workspace_root {
            Some(root) => root.clone(),
            None => std::env::current_dir()
                .map_err(|err| AppError::Io(format!("cannot determine working directory: {err}")))?,
        };
        let canonical = file
            .canonicalize()
            .map_err(|err| AppError::Config(format!("invalid --file path: {err}")))?;
        return Ok(resolver::module_for_path(
            &root,
            &config.source_dirs,
            &canonical,
        ));
    }

    Ok(ModuleRef::TopLevel)
}

/// Await a pending evaluation, cancelling it on timeout or Ctrl-C.
///
/// Cancellation resolves the handle with a cancellation outcome, so the
/// wait future is resumed afterwards rather than abandoned.
async fn await_with_interrupt(
    session: &ReplSession,
    handle: EvalHandle,
    timeout_secs: Option<u64>,
) -> Result<EvalOutcome> {
    let wait = handle.wait();
    tokio::pin!(wait);

    let timer = async {
        match timeout_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        outcome = &mut wait => outcome,

        () = timer => {
            warn!("evaluation timed out, cancelling");
            if let Err(err) = session.cancel().await {
                warn!(%err, "cancel after timeout failed");
            }
            wait.await
        }

        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, cancelling evaluation");
            if let Err(err) = session.cancel().await {
                warn!(%err, "cancel after interrupt failed");
            }
            wait.await
        }
    }
}

fn render_outcome(outcome: &EvalOutcome, json: bool) -> Result<()> {
    match outcome {
        EvalOutcome::Completed(result) => {
            if json {
                let doc = serde_json::json!({
                    "values": result.values,
                    "stdout": result.stdout,
                    "stderr": result.stderr,
                });
                println!("{doc}");
            } else {
                for value in &result.values {
                    println!("{value}");
                }
                if !result.stdout.is_empty() {
                    print!("{}", result.stdout);
                }
                if !result.stderr.is_empty() {
                    eprint!("{}", result.stderr);
                }
            }
            Ok(())
        }
        EvalOutcome::DecodeFailed { raw, reason } => Err(AppError::Decode(format!(
            "response payload did not decode ({reason}): {raw}"
        ))),
        EvalOutcome::Cancelled => {
            if json {
                println!("{}", serde_json::json!({ "cancelled": true }));
            } else {
                eprintln!("evaluation cancelled");
            }
            Ok(())
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
