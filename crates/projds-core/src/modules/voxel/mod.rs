mod model;
mod parser;

use super::ModuleExecutor;
use crate::domain::{ComputeArtifact, ComputeResult, ProjdsError, ProjectionRequest};
use crate::numerics::{BatchProjector, CancellationToken};
use tracing::{debug, info, warn};

pub use model::{ProjectionCube, ProjectionFile, TrialSet, VoxelGrid, VoxelIndex, WeightTable};
pub use parser::read_projection;

use parser::{read_dataset, read_weights, write_projection};

/// Projects every voxel's channel weights onto every trial of a dataset.
///
/// Output `H[v][t][s]` is `weights[v] . trials[t][:, s]`. With
/// `skip_zero_voxels`, voxels whose weights sum to exactly zero are dropped
/// and the kept source indices are recorded alongside the cube. Grid weight
/// tables arrive with their zero-sum cells already dropped.
#[derive(Debug, Clone, Default)]
pub struct VoxelProjectionModule {
    cancellation: Option<CancellationToken>,
}

impl VoxelProjectionModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn project(
        &self,
        trials: &TrialSet,
        weights: &WeightTable,
        request: &ProjectionRequest,
    ) -> ComputeResult<ProjectionCube> {
        let mut projector = BatchProjector::new(request.execution_mode);
        if let Some(token) = &self.cancellation {
            projector = projector.with_cancellation(token.clone());
        }

        let views = trials.views();
        let mut cube = ProjectionCube::new(trials.len(), trials.samples());
        let mut skipped = 0_usize;

        for (voxel, voxel_weights) in weights.iter() {
            if !trials.is_empty() && voxel_weights.len() != trials.channels() {
                return Err(ProjdsError::input_validation(
                    "INPUT.SHAPE_MISMATCH",
                    format!(
                        "wrong number of weights for this dataset: voxel {voxel} has {} weights, dataset has {} channels",
                        voxel_weights.len(),
                        trials.channels()
                    ),
                ));
            }

            if request.skip_zero_voxels && voxel_weights.iter().sum::<f64>() == 0.0 {
                skipped += 1;
                continue;
            }

            if self
                .cancellation
                .as_ref()
                .is_some_and(CancellationToken::is_cancelled)
            {
                return Err(ProjdsError::computation(
                    "RUN.CANCELLED",
                    format!("voxel projection cancelled before voxel {voxel}"),
                ));
            }

            debug!(%voxel, "projecting voxel");
            let projection = projector.project(voxel_weights, &views)?;
            cube.push_voxel(voxel, projection.as_slice());
        }

        if skipped > 0 {
            warn!(skipped, "dropped voxels with zero-sum weights");
        }

        Ok(cube)
    }
}

impl ModuleExecutor for VoxelProjectionModule {
    fn execute(&self, request: &ProjectionRequest) -> ComputeResult<Vec<ComputeArtifact>> {
        let (head, trials) = read_dataset(&request.dataset_path)?;
        let weights = read_weights(&request.weights_path)?;
        info!(
            trials = trials.len(),
            channels = trials.channels(),
            samples = trials.samples(),
            voxels = weights.len(),
            mode = %request.execution_mode,
            "loaded projection inputs"
        );

        let cube = self.project(&trials, &weights, request)?;
        write_projection(&request.output_path, &head, &cube, weights.grid())?;

        let (voxels, trial_count, samples) = cube.shape();
        info!(
            voxels,
            trials = trial_count,
            samples,
            output = %request.output_path.display(),
            "wrote projection cube"
        );

        Ok(vec![ComputeArtifact::new(
            request.output_path.clone(),
            vec![voxels, trial_count, samples],
        )])
    }
}
