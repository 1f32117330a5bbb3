pub mod voxel;

mod traits;

pub use traits::ModuleExecutor;
pub use voxel::{
    ProjectionCube, ProjectionFile, TrialSet, VoxelGrid, VoxelIndex, VoxelProjectionModule,
    WeightTable, read_projection,
};
