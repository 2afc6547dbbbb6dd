use std::{env, path::PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use pave_core::{
    bootstrap_error, CommandStatus, ExecutionOutcome, LinkMode, RunRequest,
};
use serde_json::json;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = PaveCli::parse();
    init_tracing(cli.trace, cli.verbose);

    let code = match &cli.command {
        PaveCommand::Run(args) => run(&cli, args)?,
    };

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

#[derive(Parser)]
#[command(
    name = "pave",
    version,
    about = "Replay a pinned lockfile into an isolated environment and run your app inside it"
)]
struct PaveCli {
    /// Emit the outcome as JSON on stdout.
    #[arg(long, global = true)]
    json: bool,

    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: PaveCommand,
}

#[derive(Subcommand)]
enum PaveCommand {
    /// Build the environment from pave.lock, then launch an entrypoint in it.
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Program to launch; bare names resolve inside the environment first.
    entrypoint: String,

    /// Arguments passed through to the entrypoint.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Require the lockfile to satisfy the manifest exactly; never resolve.
    #[arg(long, default_value_t = true, action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true")]
    frozen: bool,

    /// Skip development-only dependencies.
    #[arg(long)]
    no_dev: bool,

    /// Byte-compile installed modules after install (first-run latency only).
    #[arg(long)]
    compile_bytecode: bool,

    /// How cached package trees land in the environment.
    #[arg(long, value_enum, default_value_t = LinkModeArg::Copy)]
    link_mode: LinkModeArg,

    /// Skip the bootstrap and trust the existing environment.
    #[arg(long)]
    no_sync: bool,

    /// Project root (defaults to the current directory).
    #[arg(long, value_name = "DIR")]
    project_dir: Option<PathBuf>,

    /// Artifact cache location.
    #[arg(long, value_name = "DIR", env = "PAVE_CACHE_PATH")]
    cache_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LinkModeArg {
    Copy,
    Hardlink,
}

impl From<LinkModeArg> for LinkMode {
    fn from(value: LinkModeArg) -> Self {
        match value {
            LinkModeArg::Copy => Self::Copy,
            LinkModeArg::Hardlink => Self::Hardlink,
        }
    }
}

fn init_tracing(trace: bool, verbose: u8) {
    let level = if trace {
        "trace"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("pave_cli={level},pave_core={level},pave_domain={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run(cli: &PaveCli, args: &RunArgs) -> Result<i32> {
    let project_dir = match &args.project_dir {
        Some(dir) => dir.clone(),
        None => env::current_dir()?,
    };
    let request = RunRequest {
        project_dir,
        cache_dir: args.cache_dir.clone(),
        entrypoint: args.entrypoint.clone(),
        args: args.args.clone(),
        frozen: args.frozen,
        no_dev: args.no_dev,
        compile_bytecode: args.compile_bytecode,
        link_mode: args.link_mode.into(),
        no_sync: args.no_sync,
    };

    match pave_core::run_project(&request) {
        Ok(outcome) => {
            let code = outcome.exit_code().unwrap_or(0);
            emit_outcome(cli, &outcome);
            Ok(code)
        }
        Err(err) => match bootstrap_error(&err) {
            Some(bootstrap) => {
                let outcome = ExecutionOutcome::failure(
                    format!("{err:#}"),
                    json!({ "code": bootstrap.code() }),
                );
                emit_outcome(cli, &outcome);
                Ok(bootstrap.exit_code())
            }
            None => Err(eyre!("{err:?}")),
        },
    }
}

/// Stdout belongs to the launched application; pave's own reporting goes to
/// stdout only when `--json` asks for it, and to stderr otherwise.
fn emit_outcome(cli: &PaveCli, outcome: &ExecutionOutcome) {
    if cli.json {
        if let Ok(body) = serde_json::to_string_pretty(outcome) {
            println!("{body}");
        }
        return;
    }
    match outcome.status {
        CommandStatus::Ok => tracing::info!("{}", outcome.message),
        CommandStatus::Failure => eprintln!("pave: {}", outcome.message),
    }
}
