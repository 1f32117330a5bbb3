use super::CliError;
use anyhow::Context;
use projds_core::common::ProjectionDefaults;
use projds_core::domain::ExecutionMode;
use projds_core::modules::{ModuleExecutor, VoxelProjectionModule, read_projection};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

#[derive(clap::Args)]
pub(super) struct ProjectArgs {
    /// Trial dataset JSON file
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Voxel weight table JSON file
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Projection output JSON file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Parameter file supplying defaults for the options above
    #[arg(long)]
    param: Option<PathBuf>,

    /// Execution mode: serial or parallel
    #[arg(long, value_parser = parse_execution_mode)]
    mode: Option<ExecutionMode>,

    /// Drop voxels whose weights sum to zero
    #[arg(long)]
    skip_zero_voxels: bool,
}

#[derive(clap::Args)]
pub(super) struct InspectArgs {
    /// Projection JSON file written by `projds project`
    #[arg(value_name = "projection")]
    projection: PathBuf,
}

#[derive(Serialize)]
struct ProjectSummary {
    output: PathBuf,
    shape: Vec<usize>,
    mode: String,
}

pub(super) fn run_project_command(args: ProjectArgs) -> Result<i32, CliError> {
    let from_file = match &args.param {
        Some(path) => ProjectionDefaults::load(path)?,
        None => ProjectionDefaults::default(),
    };
    let explicit = ProjectionDefaults {
        dataset_path: args.dataset,
        weights_path: args.weights,
        output_path: args.output,
        execution_mode: args.mode,
        skip_zero_voxels: args.skip_zero_voxels.then_some(true),
    };
    let request = from_file.merged_with(explicit).into_request()?;
    debug!(?request, "resolved projection request");

    let artifacts = VoxelProjectionModule::new().execute(&request)?;

    let mut stdout = std::io::stdout().lock();
    for artifact in artifacts {
        let summary = ProjectSummary {
            output: artifact.path,
            shape: artifact.shape,
            mode: request.execution_mode.to_string(),
        };
        let line =
            serde_json::to_string(&summary).context("failed to render projection summary")?;
        writeln!(stdout, "{line}").context("failed to write projection summary")?;
    }

    Ok(0)
}

pub(super) fn run_inspect_command(args: InspectArgs) -> Result<i32, CliError> {
    let projection = read_projection(&args.projection)?;
    let (voxels, trials, samples) = projection.shape()?;

    let indices = projection
        .voxel_indices()?
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let head_keys = projection
        .head
        .keys()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    let mut stdout = std::io::stdout().lock();
    writeln!(
        stdout,
        "Projection: {}\nShape: {voxels} x {trials} x {samples}\nVoxel indices: {indices}\nHead keys: {head_keys}",
        args.projection.display()
    )
    .context("failed to write projection summary")?;

    Ok(0)
}

fn parse_execution_mode(value: &str) -> Result<ExecutionMode, String> {
    value
        .parse::<ExecutionMode>()
        .map_err(|error| error.message().to_string())
}
