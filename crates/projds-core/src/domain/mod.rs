pub mod errors;

pub use errors::{
    ComputeResult, ExitStatus, ProjdsError, ProjdsErrorCategory, ProjdsResult,
};

use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutionMode {
    #[default]
    Serial,
    Parallel,
}

impl ExecutionMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Parallel => "parallel",
        }
    }
}

impl Display for ExecutionMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = ProjdsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "serial" => Ok(Self::Serial),
            "parallel" => Ok(Self::Parallel),
            other => Err(ProjdsError::input_validation(
                "INPUT.EXECUTION_MODE",
                format!("unknown execution mode '{other}', expected 'serial' or 'parallel'"),
            )),
        }
    }
}

/// One voxel projection run: a trial dataset, a weight table, and where the
/// projection cube should be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionRequest {
    pub dataset_path: PathBuf,
    pub weights_path: PathBuf,
    pub output_path: PathBuf,
    pub execution_mode: ExecutionMode,
    pub skip_zero_voxels: bool,
}

impl ProjectionRequest {
    pub fn new(
        dataset_path: impl Into<PathBuf>,
        weights_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            dataset_path: dataset_path.into(),
            weights_path: weights_path.into(),
            output_path: output_path.into(),
            execution_mode: ExecutionMode::Serial,
            skip_zero_voxels: false,
        }
    }

    pub fn with_execution_mode(mut self, execution_mode: ExecutionMode) -> Self {
        self.execution_mode = execution_mode;
        self
    }

    pub fn with_skip_zero_voxels(mut self, skip_zero_voxels: bool) -> Self {
        self.skip_zero_voxels = skip_zero_voxels;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeArtifact {
    pub path: PathBuf,
    pub shape: Vec<usize>,
}

impl ComputeArtifact {
    pub fn new(path: impl Into<PathBuf>, shape: Vec<usize>) -> Self {
        Self {
            path: path.into(),
            shape,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ExecutionMode, ProjectionRequest};

    #[test]
    fn projection_request_defaults_to_serial_mode() {
        let request = ProjectionRequest::new("trials.json", "weights.json", "proj.json");
        assert_eq!(request.execution_mode, ExecutionMode::Serial);
        assert!(!request.skip_zero_voxels);
        assert_eq!(request.execution_mode.to_string(), "serial");
    }

    #[test]
    fn execution_mode_parses_case_insensitively() {
        assert_eq!("Parallel".parse::<ExecutionMode>(), Ok(ExecutionMode::Parallel));
        assert_eq!(" serial ".parse::<ExecutionMode>(), Ok(ExecutionMode::Serial));

        let error = "threads".parse::<ExecutionMode>().expect_err("unknown mode");
        assert_eq!(error.placeholder(), "INPUT.EXECUTION_MODE");
    }
}
