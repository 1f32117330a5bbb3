mod commands;

use clap::{ArgAction, Parser};
use projds_core::domain::ProjdsError;
use tracing_subscriber::{EnvFilter, fmt};

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let compatibility_error = error.as_projds_error();
            eprintln!("{}", compatibility_error.diagnostic_line());
            if let Some(summary_line) = compatibility_error.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            compatibility_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("projds".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            init_tracing(cli.verbose);
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "projds", about = "Batched voxel projection of trial datasets")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Project every voxel's weights onto every trial of a dataset
    Project(commands::ProjectArgs),
    /// Print the shape and header of a projection file
    Inspect(commands::InspectArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Project(args) => commands::run_project_command(args),
        CliCommand::Inspect(args) => commands::run_inspect_command(args),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A subscriber may already be installed when `run` is called in-process.
    let _ = fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(ProjdsError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ProjdsError> for CliError {
    fn from(error: ProjdsError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_projds_error(&self) -> ProjdsError {
        match self {
            Self::Usage(message) => {
                ProjdsError::input_validation("INPUT.CLI_USAGE", message.clone())
            }
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => ProjdsError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
