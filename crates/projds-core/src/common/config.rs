//! Projection settings read from a parameter file.
//!
//! Recognised keys are `dataset`, `weights`, `output`, `mode` and
//! `skip_zero_voxels`. Relative paths resolve against the directory of the
//! parameter file. Unknown keys are ignored so one file can carry settings
//! for other tools.

use super::params::ParamDict;
use crate::domain::{ComputeResult, ExecutionMode, ProjdsError, ProjectionRequest};
use std::path::{Path, PathBuf};

pub const DATASET_KEY: &str = "dataset";
pub const WEIGHTS_KEY: &str = "weights";
pub const OUTPUT_KEY: &str = "output";
pub const MODE_KEY: &str = "mode";
pub const SKIP_ZERO_VOXELS_KEY: &str = "skip_zero_voxels";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionDefaults {
    pub dataset_path: Option<PathBuf>,
    pub weights_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub execution_mode: Option<ExecutionMode>,
    pub skip_zero_voxels: Option<bool>,
}

impl ProjectionDefaults {
    pub fn load(path: &Path) -> ComputeResult<Self> {
        let params = ParamDict::load(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_params(&params, base_dir)
    }

    pub fn from_params(params: &ParamDict, base_dir: &Path) -> ComputeResult<Self> {
        let resolve = |key: &str| -> ComputeResult<Option<PathBuf>> {
            Ok(params.text(key)?.map(|value| {
                let candidate = PathBuf::from(value);
                if candidate.is_absolute() {
                    candidate
                } else {
                    base_dir.join(candidate)
                }
            }))
        };

        let execution_mode = params
            .text(MODE_KEY)?
            .map(|value| value.parse::<ExecutionMode>())
            .transpose()?;

        Ok(Self {
            dataset_path: resolve(DATASET_KEY)?,
            weights_path: resolve(WEIGHTS_KEY)?,
            output_path: resolve(OUTPUT_KEY)?,
            execution_mode,
            skip_zero_voxels: params.flag(SKIP_ZERO_VOXELS_KEY)?,
        })
    }

    /// Fields set in `overrides` replace the ones in `self`.
    pub fn merged_with(self, overrides: Self) -> Self {
        Self {
            dataset_path: overrides.dataset_path.or(self.dataset_path),
            weights_path: overrides.weights_path.or(self.weights_path),
            output_path: overrides.output_path.or(self.output_path),
            execution_mode: overrides.execution_mode.or(self.execution_mode),
            skip_zero_voxels: overrides.skip_zero_voxels.or(self.skip_zero_voxels),
        }
    }

    pub fn into_request(self) -> ComputeResult<ProjectionRequest> {
        let dataset = self
            .dataset_path
            .ok_or_else(|| missing_setting(DATASET_KEY))?;
        let weights = self
            .weights_path
            .ok_or_else(|| missing_setting(WEIGHTS_KEY))?;
        let output = self.output_path.ok_or_else(|| missing_setting(OUTPUT_KEY))?;

        Ok(ProjectionRequest::new(dataset, weights, output)
            .with_execution_mode(self.execution_mode.unwrap_or_default())
            .with_skip_zero_voxels(self.skip_zero_voxels.unwrap_or(false)))
    }
}

fn missing_setting(key: &str) -> ProjdsError {
    ProjdsError::input_validation(
        "INPUT.MISSING_SETTING",
        format!("no {key} path given; pass --{key} or set '{key}' in the parameter file"),
    )
}
