use crate::domain::{ComputeArtifact, ComputeResult, ProjectionRequest};

pub trait ModuleExecutor {
    fn execute(&self, request: &ProjectionRequest) -> ComputeResult<Vec<ComputeArtifact>>;
}
