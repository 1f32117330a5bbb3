use super::model::{
    DatasetFile, HEAD_AFFINE_KEY, HEAD_INDEX_KEY, HEAD_SHAPE_KEY, ProjectionCube, ProjectionFile,
    TrialSet, VoxelGrid, WeightTable, WeightsFile,
};
use crate::domain::{ComputeResult, ProjdsError};
use crate::numerics::{matrices_from_json, matrix_from_json, vector_from_json};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::info;

pub(super) fn read_dataset(path: &Path) -> ComputeResult<(Map<String, Value>, TrialSet)> {
    let file: DatasetFile = read_json(path, "dataset")?;
    let trials = matrices_from_json(&file.trials).map_err(|error| {
        with_context(ProjdsError::from(error), format!("'{}'", path.display()))
    })?;
    Ok((file.head, TrialSet::new(trials)?))
}

pub(super) fn read_weights(path: &Path) -> ComputeResult<WeightTable> {
    let file: WeightsFile = read_json(path, "weights")?;
    match file.affine {
        Some(affine) => read_grid_weights(path, &file.weights, affine),
        None => read_flat_weights(path, &file.weights),
    }
}

fn read_flat_weights(path: &Path, weights: &Value) -> ComputeResult<WeightTable> {
    let Value::Array(rows) = weights else {
        return Err(ProjdsError::input_validation(
            "INPUT.TYPE_MISMATCH",
            format!(
                "weights in '{}' must be an array of per-voxel weight vectors",
                path.display()
            ),
        ));
    };

    let voxels = rows
        .iter()
        .enumerate()
        .map(|(voxel, row)| {
            vector_from_json(row).map_err(|source| {
                with_context(
                    ProjdsError::from(source),
                    format!("voxel {voxel} in '{}'", path.display()),
                )
            })
        })
        .collect::<ComputeResult<Vec<_>>>()?;

    Ok(WeightTable::new(voxels))
}

/// Reads `weights[z][y][x][channel]`; the affine must be a numeric matrix.
fn read_grid_weights(path: &Path, weights: &Value, affine: Value) -> ComputeResult<WeightTable> {
    matrix_from_json(&affine).map_err(|source| {
        with_context(
            ProjdsError::from(source),
            format!("affine in '{}'", path.display()),
        )
    })?;

    let planes = grid_axis(weights, || {
        format!(
            "weights in '{}' must be a (z, y, x, channel) grid when an affine is given",
            path.display()
        )
    })?;
    let height = planes
        .first()
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    let width = planes
        .first()
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .and_then(Value::as_array)
        .map_or(0, Vec::len);

    let mut cells = Vec::new();
    for (z, plane) in planes.iter().enumerate() {
        let rows = grid_axis(plane, || {
            format!("grid plane z={z} in '{}' is not an array", path.display())
        })?;
        if rows.len() != height {
            return Err(ragged_grid(
                path,
                format!("plane z={z} has {} rows, expected {height}", rows.len()),
            ));
        }
        for (y, row) in rows.iter().enumerate() {
            let row_cells = grid_axis(row, || {
                format!(
                    "grid row (z={z}, y={y}) in '{}' is not an array",
                    path.display()
                )
            })?;
            if row_cells.len() != width {
                return Err(ragged_grid(
                    path,
                    format!(
                        "row (z={z}, y={y}) has {} cells, expected {width}",
                        row_cells.len()
                    ),
                ));
            }
            for (x, cell) in row_cells.iter().enumerate() {
                let weights = vector_from_json(cell).map_err(|source| {
                    with_context(
                        ProjdsError::from(source),
                        format!("voxel ({z}, {y}, {x}) in '{}'", path.display()),
                    )
                })?;
                cells.push(weights);
            }
        }
    }

    let total = cells.len();
    let grid = VoxelGrid::new([planes.len(), height, width], affine);
    let table = WeightTable::from_grid(grid, cells);
    info!(
        cells = total,
        kept = table.len(),
        "read grid weights and dropped zero-sum voxels"
    );
    Ok(table)
}

fn grid_axis<'a>(
    value: &'a Value,
    message: impl FnOnce() -> String,
) -> ComputeResult<&'a [Value]> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(ProjdsError::input_validation("INPUT.TYPE_MISMATCH", message())),
    }
}

fn ragged_grid(path: &Path, detail: String) -> ProjdsError {
    ProjdsError::input_validation(
        "INPUT.SHAPE_MISMATCH",
        format!("weight grid in '{}' is ragged: {detail}", path.display()),
    )
}

pub fn read_projection(path: &Path) -> ComputeResult<ProjectionFile> {
    read_json(path, "projection")
}

/// Writes the cube with `head.shape` and `head.idx` set, plus `head.affine`
/// for grid weights. Nothing is written when any value is infinite or NaN.
pub(super) fn write_projection(
    path: &Path,
    head: &Map<String, Value>,
    cube: &ProjectionCube,
    grid: Option<&VoxelGrid>,
) -> ComputeResult<()> {
    if let Some((voxel, trial, sample, value)) = cube.first_non_finite() {
        return Err(ProjdsError::computation(
            "RUN.NON_FINITE_RESULT",
            format!(
                "projection of voxel {voxel} onto trial {trial} sample {sample} is {value}; refusing to write '{}'",
                path.display()
            ),
        ));
    }

    let mut head = head.clone();
    let (voxels, _, _) = cube.shape();
    let shape = grid.map_or_else(|| vec![voxels], |grid| grid.shape().to_vec());
    head.insert(HEAD_SHAPE_KEY.to_string(), Value::from(shape));
    head.insert(
        HEAD_INDEX_KEY.to_string(),
        serde_json::to_value(cube.voxel_indices()).map_err(serialize_failed)?,
    );
    if let Some(grid) = grid {
        head.insert(HEAD_AFFINE_KEY.to_string(), grid.affine().clone());
    }

    let file = ProjectionFile {
        head,
        cube: cube.to_nested(),
    };
    let rendered = serde_json::to_string(&file).map_err(serialize_failed)?;

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| {
            ProjdsError::io_system(
                "IO.OUTPUT_DIRECTORY",
                format!(
                    "failed to create output directory '{}': {}",
                    parent.display(),
                    source
                ),
            )
        })?;
    }

    fs::write(path, rendered).map_err(|source| {
        ProjdsError::io_system(
            "IO.OUTPUT_WRITE",
            format!(
                "failed to write projection file '{}': {}",
                path.display(),
                source
            ),
        )
    })
}

fn read_json<T: DeserializeOwned>(path: &Path, label: &str) -> ComputeResult<T> {
    let source = fs::read_to_string(path).map_err(|source| {
        ProjdsError::io_system(
            "IO.INPUT_READ",
            format!(
                "failed to read {label} file '{}': {}",
                path.display(),
                source
            ),
        )
    })?;

    serde_json::from_str(&source).map_err(|source| {
        ProjdsError::input_validation(
            "INPUT.JSON_PARSE",
            format!(
                "failed to parse {label} file '{}': {}",
                path.display(),
                source
            ),
        )
    })
}

fn serialize_failed(source: serde_json::Error) -> ProjdsError {
    ProjdsError::internal(
        "RUN.PROJECTION_SERIALIZE",
        format!("failed to serialize projection cube: {source}"),
    )
}

fn with_context(error: ProjdsError, context: String) -> ProjdsError {
    ProjdsError::new(
        error.category(),
        error.placeholder(),
        format!("{context}: {}", error.message()),
    )
}
